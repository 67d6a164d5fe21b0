//! Table-driven (T-table lookup) SM4 block transform.
//!
//! Pure-Rust reference strategy, always available. Encryption and decryption
//! are the same routine; only the order of the round keys differs.

use super::tables::Sm4Tables;
use super::SM4_BLOCK_SIZE;

#[inline]
fn load_words(block: &[u8; SM4_BLOCK_SIZE]) -> [u32; 4] {
    [
        u32::from_be_bytes([block[0], block[1], block[2], block[3]]),
        u32::from_be_bytes([block[4], block[5], block[6], block[7]]),
        u32::from_be_bytes([block[8], block[9], block[10], block[11]]),
        u32::from_be_bytes([block[12], block[13], block[14], block[15]]),
    ]
}

/// Run the 32 rounds over `block` in place with the given round-key order.
pub(crate) fn crypt_block(tables: &Sm4Tables, rk: &[u32; 32], block: &mut [u8; SM4_BLOCK_SIZE]) {
    let mut x = load_words(block);

    for &k in rk.iter() {
        let t = x[1] ^ x[2] ^ x[3] ^ k;
        let x4 = x[0] ^ tables.round_t(t);
        x = [x[1], x[2], x[3], x4];
    }

    // Reverse transform R: output (X35, X34, X33, X32).
    block[0..4].copy_from_slice(&x[3].to_be_bytes());
    block[4..8].copy_from_slice(&x[2].to_be_bytes());
    block[8..12].copy_from_slice(&x[1].to_be_bytes());
    block[12..16].copy_from_slice(&x[0].to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::super::tables::{l_enc, tables, tau};
    use super::*;

    // Straight-line round function without tables, used as an oracle.
    fn crypt_block_direct(rk: &[u32; 32], block: &mut [u8; 16]) {
        let mut x = load_words(block);
        for &k in rk.iter() {
            let x4 = x[0] ^ l_enc(tau(x[1] ^ x[2] ^ x[3] ^ k));
            x = [x[1], x[2], x[3], x4];
        }
        let mut out = [0u8; 16];
        for (i, w) in x.iter().rev().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
        }
        *block = out;
    }

    #[test]
    fn test_table_round_matches_direct_round() {
        let mut rk = [0u32; 32];
        for (i, k) in rk.iter_mut().enumerate() {
            *k = (i as u32).wrapping_mul(0x9e3779b9) ^ 0x5a5a5a5a;
        }
        let mut a: [u8; 16] = core::array::from_fn(|i| (i * 17) as u8);
        let mut b = a;
        crypt_block(tables(), &rk, &mut a);
        crypt_block_direct(&rk, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_words_big_endian() {
        let block: [u8; 16] = core::array::from_fn(|i| i as u8);
        let w = load_words(&block);
        assert_eq!(w, [0x00010203, 0x04050607, 0x08090a0b, 0x0c0d0e0f]);
    }
}
