//! CTR (Counter) mode with a 32-bit counter field.
//!
//! The counter block is a 12-byte prefix followed by a 32-bit big-endian
//! tail. Only the tail is incremented, wrapping modulo 2^32 without carrying
//! into the prefix (`inc32`, NIST SP 800-38D 6.2).

use crate::sm4::{Sm4Key, SM4_BLOCK_SIZE};
use sm4kit_types::CryptoError;
use zeroize::Zeroize;

/// Maximum keystream blocks for one message: 2^32 - 2.
///
/// This is GCM's plaintext bound of 2^39 - 256 bits. Staying below it means
/// no tail value is produced twice and the tail never returns to the value
/// reserved for the tag mask (`J0`).
pub const CTR32_MAX_BLOCKS: u64 = (1 << 32) - 2;

/// Increment the last 4 bytes of a 16-byte counter (big-endian INC32).
pub fn inc32(counter: &mut [u8; SM4_BLOCK_SIZE]) {
    let ctr =
        u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]).wrapping_add(1);
    counter[12..16].copy_from_slice(&ctr.to_be_bytes());
}

/// Number of keystream blocks needed for `len` bytes.
pub(crate) fn blocks_for(len: u64) -> u64 {
    len / SM4_BLOCK_SIZE as u64 + u64::from(len % SM4_BLOCK_SIZE as u64 != 0)
}

/// Fail with `LengthExceeded` when `len` bytes need more than
/// [`CTR32_MAX_BLOCKS`] keystream blocks.
pub fn check_len(len: u64) -> Result<(), CryptoError> {
    if blocks_for(len) > CTR32_MAX_BLOCKS {
        return Err(CryptoError::LengthExceeded);
    }
    Ok(())
}

/// A finite, non-restartable keystream over one message.
///
/// Yields `E_K(counter)`, `E_K(inc32(counter))`, ... for exactly as many
/// blocks as the declared message length requires.
pub struct Ctr32Keystream<'a> {
    cipher: &'a Sm4Key,
    counter: [u8; SM4_BLOCK_SIZE],
    remaining: u64,
}

impl<'a> Ctr32Keystream<'a> {
    /// Start a keystream at `counter` for a message of `len` bytes.
    pub fn new(
        cipher: &'a Sm4Key,
        counter: [u8; SM4_BLOCK_SIZE],
        len: u64,
    ) -> Result<Self, CryptoError> {
        check_len(len)?;
        Ok(Self {
            cipher,
            counter,
            remaining: blocks_for(len),
        })
    }

    /// The counter block the next keystream block will be derived from.
    pub fn counter(&self) -> [u8; SM4_BLOCK_SIZE] {
        self.counter
    }

    /// Keystream blocks still available.
    pub fn remaining_blocks(&self) -> u64 {
        self.remaining
    }

    /// XOR the next keystream bytes into `data`.
    ///
    /// A trailing partial chunk consumes a whole keystream block.
    pub fn apply_keystream(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        if blocks_for(data.len() as u64) > self.remaining {
            return Err(CryptoError::LengthExceeded);
        }

        let mut ks = [[0u8; SM4_BLOCK_SIZE]; 4];
        for batch in data.chunks_mut(SM4_BLOCK_SIZE * 4) {
            let n = (batch.len() + SM4_BLOCK_SIZE - 1) / SM4_BLOCK_SIZE;
            for slot in ks.iter_mut().take(n) {
                *slot = self.counter;
                inc32(&mut self.counter);
            }
            if n == 4 {
                self.cipher.encrypt_blocks4(&mut ks);
            } else {
                for slot in ks.iter_mut().take(n) {
                    self.cipher.encrypt_block(slot);
                }
            }
            for (chunk, k) in batch.chunks_mut(SM4_BLOCK_SIZE).zip(ks.iter()) {
                for (d, &b) in chunk.iter_mut().zip(k.iter()) {
                    *d ^= b;
                }
            }
            self.remaining -= n as u64;
        }
        ks.zeroize();
        Ok(())
    }
}

impl Iterator for Ctr32Keystream<'_> {
    type Item = [u8; SM4_BLOCK_SIZE];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let mut block = self.counter;
        self.cipher.encrypt_block(&mut block);
        inc32(&mut self.counter);
        self.remaining -= 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).ok();
        (n.unwrap_or(usize::MAX), n)
    }
}

/// Encrypt or decrypt `data` in place with the keystream starting at
/// `counter`.
pub fn ctr32_apply(
    cipher: &Sm4Key,
    counter: &[u8; SM4_BLOCK_SIZE],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    if data.is_empty() {
        return Ok(());
    }
    Ctr32Keystream::new(cipher, *counter, data.len() as u64)?.apply_keystream(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4::Sm4Strategy;
    use std::collections::HashSet;

    fn test_key() -> Sm4Key {
        Sm4Key::new(&[
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54,
            0x32, 0x10,
        ])
        .unwrap()
    }

    #[test]
    fn test_inc32_wraps_tail_only() {
        let mut ctr = [0xffu8; 16];
        inc32(&mut ctr);
        assert_eq!(&ctr[..12], &[0xffu8; 12]);
        assert_eq!(&ctr[12..], &[0u8; 4]);

        let mut ctr = [0u8; 16];
        ctr[15] = 0xff;
        inc32(&mut ctr);
        assert_eq!(&ctr[12..], &[0, 0, 1, 0]);
    }

    #[test]
    fn test_keystream_is_encrypted_counters() {
        let key = test_key();
        let mut start = [0u8; 16];
        start[..12].copy_from_slice(b"nonce-prefix");
        start[15] = 2;

        let blocks: Vec<[u8; 16]> = Ctr32Keystream::new(&key, start, 48).unwrap().collect();
        assert_eq!(blocks.len(), 3);

        let mut ctr = start;
        for ks in &blocks {
            let mut expected = ctr;
            key.encrypt_block(&mut expected);
            assert_eq!(ks, &expected);
            inc32(&mut ctr);
        }
    }

    #[test]
    fn test_keystream_is_finite() {
        let key = test_key();
        let mut ks = Ctr32Keystream::new(&key, [0u8; 16], 17).unwrap();
        assert_eq!(ks.size_hint(), (2, Some(2)));
        assert!(ks.next().is_some());
        assert!(ks.next().is_some());
        assert!(ks.next().is_none());
        assert!(ks.next().is_none());
    }

    #[test]
    fn test_apply_matches_iterator_for_all_lengths() {
        let key = test_key();
        let start = [0x5au8; 16];
        for len in 0..=100usize {
            let pt: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut ct = pt.clone();
            ctr32_apply(&key, &start, &mut ct).unwrap();

            let expected: Vec<u8> = Ctr32Keystream::new(&key, start, len as u64)
                .unwrap()
                .flatten()
                .zip(pt.iter())
                .map(|(k, &p)| k ^ p)
                .collect();
            assert_eq!(ct, expected, "len = {len}");

            ctr32_apply(&key, &start, &mut ct).unwrap();
            assert_eq!(ct, pt);
        }
    }

    #[test]
    fn test_apply_same_for_both_strategies() {
        let raw = [0x3cu8; 16];
        let table = Sm4Key::with_strategy(&raw, Sm4Strategy::Table).unwrap();
        let auto = Sm4Key::new(&raw).unwrap();
        let start = [0xabu8; 16];
        let mut a = vec![0u8; 333];
        let mut b = a.clone();
        ctr32_apply(&table, &start, &mut a).unwrap();
        ctr32_apply(&auto, &start, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_counters_never_repeat_across_wrap() {
        let key = test_key();
        let mut start = [0x42u8; 16];
        start[12..].copy_from_slice(&0xffff_fff0u32.to_be_bytes());

        let mut ks = Ctr32Keystream::new(&key, start, 64 * 16).unwrap();
        let mut seen = HashSet::new();
        while ks.remaining_blocks() > 0 {
            let ctr = ks.counter();
            assert_eq!(&ctr[..12], &start[..12], "prefix must not change");
            assert!(seen.insert(ctr), "counter repeated");
            ks.next().unwrap();
        }
        assert_eq!(seen.len(), 64);
    }

    #[test]
    fn test_length_bound() {
        let key = test_key();
        let max = CTR32_MAX_BLOCKS * 16;
        assert!(Ctr32Keystream::new(&key, [0u8; 16], max).is_ok());
        assert!(matches!(
            Ctr32Keystream::new(&key, [0u8; 16], max + 1),
            Err(CryptoError::LengthExceeded)
        ));
        assert_eq!(check_len(u64::MAX), Err(CryptoError::LengthExceeded));
        assert_eq!(check_len(0), Ok(()));
    }

    #[test]
    fn test_apply_more_than_declared() {
        let key = test_key();
        let mut ks = Ctr32Keystream::new(&key, [0u8; 16], 16).unwrap();
        let mut data = [0u8; 17];
        assert_eq!(ks.apply_keystream(&mut data), Err(CryptoError::LengthExceeded));
        assert_eq!(data, [0u8; 17]);
    }
}
