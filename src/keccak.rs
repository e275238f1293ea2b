// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Vapash.

// Vapash is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Vapash is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Vapash.  If not, see <http://www.gnu.org/licenses/>.

//! Keccak-256 and Keccak-512 one-shot hashing.
//!
//! This is the original Keccak as submitted to the SHA-3 competition
//! (0x01 domain padding), not FIPS-202 SHA-3. Lanes are absorbed and
//! squeezed little-endian.

/// 256-bit hash in canonical byte form.
pub type H256 = [u8; 32];
/// 512-bit hash in canonical byte form.
pub type H512 = [u8; 64];

const KECCAKF_RNDC: [u64; 24] = [
    0x0000000000000001,
    0x0000000000008082,
    0x800000000000808a,
    0x8000000080008000,
    0x000000000000808b,
    0x0000000080000001,
    0x8000000080008081,
    0x8000000000008009,
    0x000000000000008a,
    0x0000000000000088,
    0x0000000080008009,
    0x000000008000000a,
    0x000000008000808b,
    0x800000000000008b,
    0x8000000000008089,
    0x8000000000008003,
    0x8000000000008002,
    0x8000000000000080,
    0x000000000000800a,
    0x800000008000000a,
    0x8000000080008081,
    0x8000000000008080,
    0x0000000080000001,
    0x8000000080008008,
];

const KECCAKF_ROTC: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];

const KECCAKF_PILN: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// The Keccak-f[1600] permutation over 25 64-bit lanes.
///
/// Control flow depends only on the (fixed) round structure, never on
/// lane values.
pub fn keccak_f1600(st: &mut [u64; 25]) {
    for r in 0..24 {
        // Theta
        let mut bc = [0u64; 5];
        for i in 0..bc.len() {
            bc[i] = st[i] ^ st[i + 5] ^ st[i + 10] ^ st[i + 15] ^ st[i + 20];
        }

        for i in 0..bc.len() {
            let t = bc[(i + 4) % 5] ^ bc[(i + 1) % 5].rotate_left(1);
            for j in (0..st.len()).step_by(5) {
                st[j + i] ^= t;
            }
        }

        // Rho Pi
        let mut t = st[1];

        debug_assert_eq!(KECCAKF_ROTC.len(), 24);
        for i in 0..24 {
            let j = KECCAKF_PILN[i];
            bc[0] = st[j];
            st[j] = t.rotate_left(KECCAKF_ROTC[i]);
            t = bc[0];
        }

        // Chi
        for j in (0..st.len()).step_by(5) {
            for i in 0..bc.len() {
                bc[i] = st[j + i];
            }
            for i in 0..bc.len() {
                st[j + i] ^= (!bc[(i + 1) % 5]) & bc[(i + 2) % 5];
            }
        }

        // Iota
        st[0] ^= KECCAKF_RNDC[r];
    }
}

/// Absorb `data` and squeeze `out.len()` bytes. The rate is derived from
/// the output size: r = 200 - 2 * out.len(), which covers exactly the
/// Keccak-256 and Keccak-512 parameter sets used here.
fn keccak(data: &[u8], out: &mut [u8]) {
    let rate = 200 - 2 * out.len();
    let mut st = [0u64; 25];

    let mut blocks = data.chunks_exact(rate);
    for block in &mut blocks {
        for (lane, bytes) in st.iter_mut().zip(block.chunks_exact(8)) {
            *lane ^= le_u64(bytes);
        }
        keccak_f1600(&mut st);
    }

    // Final block: append 0x01, zero-fill, OR 0x80 into the last rate byte.
    let tail = blocks.remainder();
    let mut last = [0u8; 200];
    last[..tail.len()].copy_from_slice(tail);
    last[tail.len()] = 0x01;
    last[rate - 1] |= 0x80;
    for (lane, bytes) in st.iter_mut().zip(last[..rate].chunks_exact(8)) {
        *lane ^= le_u64(bytes);
    }
    keccak_f1600(&mut st);

    for (lane, bytes) in st.iter().zip(out.chunks_exact_mut(8)) {
        bytes.copy_from_slice(&lane.to_le_bytes());
    }
}

#[inline]
fn le_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}

/// One-shot Keccak-256.
pub fn keccak256(data: &[u8]) -> H256 {
    let mut out = [0u8; 32];
    keccak(data, &mut out);
    out
}

/// One-shot Keccak-512.
pub fn keccak512(data: &[u8]) -> H512 {
    let mut out = [0u8; 64];
    keccak(data, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hex::FromHex;

    fn h(s: &str) -> Vec<u8> {
        s.from_hex().unwrap()
    }

    #[test]
    fn permutation_of_zero_state() {
        let mut st = [0u64; 25];
        keccak_f1600(&mut st);
        assert_eq!(st[0], 0xf1258f7940e1dde7);
        assert_eq!(st[1], 0x84d5ccf933c0478a);
        assert_eq!(st[2], 0xd598261ea65aa9ee);
        assert_eq!(st[3], 0xbd1547306f80494d);
        assert_eq!(st[24], 0xeaf1ff7b5ceca249);
    }

    #[test]
    fn keccak256_empty() {
        assert_eq!(
            keccak256(&[]).to_vec(),
            h("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn keccak256_abc() {
        assert_eq!(
            keccak256(b"abc").to_vec(),
            h("4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45")
        );
    }

    #[test]
    fn keccak512_empty() {
        assert_eq!(
            keccak512(&[]).to_vec(),
            h("0eab42de4c3ceb9235fc91acffe746b29c29a8c366b7c60e4e67c466f36a4304\
               c00fa9caf9d87976ba469bcbe06713b435f091ef2769fb160cdab33d3670680e")
        );
    }

    #[test]
    fn keccak512_abc() {
        assert_eq!(
            keccak512(b"abc").to_vec(),
            h("18587dc2ea106b9a1563e32b3312421ca164c7f1f07bc922a9c83d77cea3a1e5\
               d0c69910739025372dc14ac9642629379540c17e2a65b19d77aa511a9d00bb96")
        );
    }

    #[test]
    fn keccak256_multi_block() {
        // 200 bytes exceeds the 136-byte rate, exercising the absorb loop.
        assert_eq!(
            keccak256(&[0xa5; 200]).to_vec(),
            h("c716e17d494244a52e5de866ca8109aad858714034537ad2957b257d611d092e")
        );
        // Exactly one full rate block leaves an empty padded block.
        let data: Vec<u8> = (0..136).collect();
        assert_eq!(
            keccak256(&data).to_vec(),
            h("7ce759f1ab7f9ce437719970c26b0a66ff11fe3e38e17df89cf5d29c7d7f807e")
        );
    }

    #[test]
    fn keccak512_multi_block() {
        // The Keccak-512 rate is 72 bytes; both inputs cross it.
        assert_eq!(
            keccak512(&[0xa5; 200]).to_vec(),
            h("8874e1afd8c41b6908430c3e11e7a97edfb9177009f430f635224e535aa0be9f\
               7e3fdefbc9c3bda3291c7e502bb1dca94610492fbd0c340145e504023ca6d6ec")
        );
        let data: Vec<u8> = (0..72).collect();
        assert_eq!(
            keccak512(&data).to_vec(),
            h("76fa23369085405345fe6a2831f334113bee6b111056e21072082af56e7c1ab4\
               458858dbdb5f88e0d86d38ca654310c9a30712319c1f4f9783fe9f3ac0469527")
        );
    }
}
