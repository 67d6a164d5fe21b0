//! SM4 block cipher implementation.
//!
//! SM4 is a 128-bit block cipher standardized by the Chinese government
//! (GB/T 32907-2016). It uses a 128-bit key and 32 unbalanced Feistel rounds,
//! and is widely used in Chinese commercial cryptography.
//!
//! Two block-transform strategies are provided with byte-identical output:
//! a table-driven one (always available) and a vectorised one (SSSE3 on
//! x86-64, NEON on AArch64). The strategy is chosen once when an [`Sm4Key`]
//! is constructed; for modes of operation see [`modes`](crate::modes).

mod soft;
pub mod tables;

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
mod sm4_neon;
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod sm4_ssse3;

use crate::provider::BlockCipher;
use sm4kit_types::{CipherAlgId, CryptoError};
use zeroize::{Zeroize, ZeroizeOnDrop};

use self::tables::{l_key, tau, Sm4Tables, CK, FK};

/// SM4 block size in bytes (128 bits).
pub const SM4_BLOCK_SIZE: usize = 16;

/// SM4 key size in bytes (128 bits).
pub const SM4_KEY_SIZE: usize = 16;

/// Number of rounds (and round keys).
pub const SM4_ROUNDS: usize = 32;

/// The 32 round keys derived from one SM4 key, in schedule order.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RoundKeys([u32; SM4_ROUNDS]);

impl RoundKeys {
    /// The round keys as words, in schedule order.
    pub fn as_words(&self) -> &[u32; SM4_ROUNDS] {
        &self.0
    }

    /// The same keys in reverse order (the decryption order).
    pub fn reversed(&self) -> RoundKeys {
        let mut rk = self.0;
        rk.reverse();
        RoundKeys(rk)
    }
}

impl core::fmt::Debug for RoundKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RoundKeys(..)")
    }
}

/// Expand a 16-byte key into 32 round keys.
pub fn key_schedule(key: &[u8]) -> Result<RoundKeys, CryptoError> {
    if key.len() != SM4_KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: SM4_KEY_SIZE,
            got: key.len(),
        });
    }

    let mut k = [0u32; 4];
    for (i, w) in k.iter_mut().enumerate() {
        *w = u32::from_be_bytes([key[4 * i], key[4 * i + 1], key[4 * i + 2], key[4 * i + 3]])
            ^ FK[i];
    }

    let mut rk = [0u32; SM4_ROUNDS];
    for (i, out) in rk.iter_mut().enumerate() {
        let next = k[0] ^ l_key(tau(k[1] ^ k[2] ^ k[3] ^ CK[i]));
        *out = next;
        k = [k[1], k[2], k[3], next];
    }
    k.zeroize();

    Ok(RoundKeys(rk))
}

/// Encrypt one block with the table-driven strategy.
pub fn block_encrypt(block: &[u8; SM4_BLOCK_SIZE], keys: &RoundKeys) -> [u8; SM4_BLOCK_SIZE] {
    let mut out = *block;
    soft::crypt_block(tables::tables(), &keys.0, &mut out);
    out
}

/// Decrypt one block with the table-driven strategy.
///
/// `keys` is the schedule as returned by [`key_schedule`]; the keys are
/// consumed in reverse order.
pub fn block_decrypt(block: &[u8; SM4_BLOCK_SIZE], keys: &RoundKeys) -> [u8; SM4_BLOCK_SIZE] {
    block_encrypt(block, &keys.reversed())
}

/// Whether a vectorised SM4 strategy can run on this CPU.
pub fn accelerated_available() -> bool {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        sm4_ssse3::is_supported()
    }
    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        sm4_neon::is_supported()
    }
    #[cfg(not(all(feature = "simd", any(target_arch = "x86_64", target_arch = "aarch64"))))]
    {
        false
    }
}

/// Block-transform strategy requested for an [`Sm4Key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sm4Strategy {
    /// Vectorised when available, otherwise table-driven.
    #[default]
    Auto,
    /// T-table lookups.
    Table,
    /// SIMD S-box and linear transform. Falls back to `Table` when the CPU
    /// lacks support.
    Accelerated,
}

/// An SM4 key with precomputed round keys.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Sm4Key {
    /// Round keys in encryption order.
    enc_keys: RoundKeys,
    /// Round keys in decryption order.
    dec_keys: RoundKeys,
    #[zeroize(skip)]
    tables: &'static Sm4Tables,
    /// Active strategy, never `Auto`.
    #[zeroize(skip)]
    strategy: Sm4Strategy,
}

impl Sm4Key {
    /// Create a new SM4 key from 16 raw bytes, picking the fastest strategy.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        Self::with_strategy(key, Sm4Strategy::Auto)
    }

    /// Create a new SM4 key using the requested strategy.
    pub fn with_strategy(key: &[u8], strategy: Sm4Strategy) -> Result<Self, CryptoError> {
        let enc_keys = key_schedule(key)?;
        let dec_keys = enc_keys.reversed();

        let accel = accelerated_available();
        let active = match strategy {
            Sm4Strategy::Table => Sm4Strategy::Table,
            Sm4Strategy::Auto | Sm4Strategy::Accelerated if accel => Sm4Strategy::Accelerated,
            Sm4Strategy::Auto => Sm4Strategy::Table,
            Sm4Strategy::Accelerated => {
                tracing::debug!("vectorised sm4 unavailable, falling back to table-driven");
                Sm4Strategy::Table
            }
        };
        tracing::trace!(requested = ?strategy, active = ?active, "sm4 key scheduled");

        Ok(Self {
            enc_keys,
            dec_keys,
            tables: tables::tables(),
            strategy: active,
        })
    }

    /// The strategy actually in use (`Table` or `Accelerated`).
    pub fn strategy(&self) -> Sm4Strategy {
        self.strategy
    }

    /// Encrypt a single 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; SM4_BLOCK_SIZE]) {
        self.crypt_one(&self.enc_keys, block);
    }

    /// Decrypt a single 16-byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8; SM4_BLOCK_SIZE]) {
        self.crypt_one(&self.dec_keys, block);
    }

    /// Encrypt four independent blocks in place.
    pub fn encrypt_blocks4(&self, blocks: &mut [[u8; SM4_BLOCK_SIZE]; 4]) {
        self.crypt_four(&self.enc_keys, blocks);
    }

    /// Decrypt four independent blocks in place.
    pub fn decrypt_blocks4(&self, blocks: &mut [[u8; SM4_BLOCK_SIZE]; 4]) {
        self.crypt_four(&self.dec_keys, blocks);
    }

    fn crypt_one(&self, rk: &RoundKeys, block: &mut [u8; SM4_BLOCK_SIZE]) {
        match self.strategy {
            Sm4Strategy::Accelerated => {
                let mut blocks = [[0u8; SM4_BLOCK_SIZE]; 4];
                blocks[0] = *block;
                self.crypt_four(rk, &mut blocks);
                *block = blocks[0];
                blocks.zeroize();
            }
            _ => soft::crypt_block(self.tables, &rk.0, block),
        }
    }

    fn crypt_four(&self, rk: &RoundKeys, blocks: &mut [[u8; SM4_BLOCK_SIZE]; 4]) {
        if self.strategy == Sm4Strategy::Accelerated {
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            {
                // Safety: the strategy is only `Accelerated` when SSSE3 was detected.
                unsafe { sm4_ssse3::crypt_blocks4(&rk.0, blocks) };
                return;
            }
            #[cfg(all(feature = "simd", target_arch = "aarch64"))]
            {
                // Safety: the strategy is only `Accelerated` when NEON was detected.
                unsafe { sm4_neon::crypt_blocks4(&rk.0, blocks) };
                return;
            }
        }
        for block in blocks.iter_mut() {
            soft::crypt_block(self.tables, &rk.0, block);
        }
    }
}

impl core::fmt::Debug for Sm4Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sm4Key")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl BlockCipher for Sm4Key {
    fn alg_id(&self) -> CipherAlgId {
        CipherAlgId::Sm4
    }

    fn block_size(&self) -> usize {
        SM4_BLOCK_SIZE
    }

    fn key_size(&self) -> usize {
        SM4_KEY_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let blk: &mut [u8; SM4_BLOCK_SIZE] =
            block.try_into().map_err(|_| CryptoError::InvalidArg)?;
        Sm4Key::encrypt_block(self, blk);
        Ok(())
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        let blk: &mut [u8; SM4_BLOCK_SIZE] =
            block.try_into().map_err(|_| CryptoError::InvalidArg)?;
        Sm4Key::decrypt_block(self, blk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn block(s: &str) -> [u8; 16] {
        hex_to_bytes(s).try_into().unwrap()
    }

    // GB/T 32907-2016 Appendix A, example 1
    #[test]
    fn test_sm4_encrypt_standard_vector() {
        let key = hex_to_bytes("0123456789abcdeffedcba9876543210");
        let pt = block("0123456789abcdeffedcba9876543210");
        let rk = key_schedule(&key).unwrap();
        let ct = block_encrypt(&pt, &rk);
        assert_eq!(hex(&ct), "681edf34d206965e86b3e94f536e4246");
        assert_eq!(block_decrypt(&ct, &rk), pt);
    }

    #[test]
    fn test_sm4_key_schedule_standard_vector() {
        let key = hex_to_bytes("0123456789abcdeffedcba9876543210");
        let rk = key_schedule(&key).unwrap();
        let w = rk.as_words();
        assert_eq!(w[0], 0xf12186f9);
        assert_eq!(w[1], 0x41662b61);
        assert_eq!(w[2], 0x5a6ab19a);
        assert_eq!(w[3], 0x7ba92077);
        assert_eq!(w[31], 0x9124a012);
    }

    // GB/T 32907-2016 Appendix A, example 2: one million encryptions.
    #[test]
    #[ignore = "slow in debug builds"]
    fn test_sm4_million_iterations() {
        let key = Sm4Key::new(&hex_to_bytes("0123456789abcdeffedcba9876543210")).unwrap();
        let mut blk = block("0123456789abcdeffedcba9876543210");
        for _ in 0..1_000_000 {
            key.encrypt_block(&mut blk);
        }
        assert_eq!(hex(&blk), "595298c7c6fd271f0402f804c33d3f66");
    }

    #[test]
    fn test_sm4_key_both_strategies_standard_vector() {
        let key = hex_to_bytes("0123456789abcdeffedcba9876543210");
        for strategy in [Sm4Strategy::Table, Sm4Strategy::Accelerated, Sm4Strategy::Auto] {
            let cipher = Sm4Key::with_strategy(&key, strategy).unwrap();
            let mut blk = block("0123456789abcdeffedcba9876543210");
            cipher.encrypt_block(&mut blk);
            assert_eq!(hex(&blk), "681edf34d206965e86b3e94f536e4246", "{strategy:?}");
            cipher.decrypt_block(&mut blk);
            assert_eq!(hex(&blk), "0123456789abcdeffedcba9876543210", "{strategy:?}");
        }
    }

    #[test]
    fn test_sm4_invalid_key_length() {
        for len in [0usize, 15, 17, 32] {
            let key = vec![0u8; len];
            assert_eq!(
                key_schedule(&key).unwrap_err(),
                CryptoError::InvalidKeyLength { expected: 16, got: len }
            );
            assert!(Sm4Key::new(&key).is_err());
        }
    }

    #[test]
    fn test_sm4_roundtrip_random() {
        let mut rng = ChaCha20Rng::seed_from_u64(0x5345_4d34);
        for _ in 0..256 {
            let key: [u8; 16] = rng.gen();
            let pt: [u8; 16] = rng.gen();
            let rk = key_schedule(&key).unwrap();
            let ct = block_encrypt(&pt, &rk);
            assert_eq!(block_decrypt(&ct, &rk), pt);
            // Decryption is encryption with the reversed schedule.
            assert_eq!(block_encrypt(&ct, &rk.reversed()), pt);
        }
    }

    #[test]
    fn test_strategy_equivalence_random_corpus() {
        if !accelerated_available() {
            return;
        }
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..512 {
            let key: [u8; 16] = rng.gen();
            let table = Sm4Key::with_strategy(&key, Sm4Strategy::Table).unwrap();
            let accel = Sm4Key::with_strategy(&key, Sm4Strategy::Accelerated).unwrap();
            assert_eq!(accel.strategy(), Sm4Strategy::Accelerated);

            let mut blocks: [[u8; 16]; 4] = rng.gen();
            let mut expected = blocks;
            for b in expected.iter_mut() {
                table.encrypt_block(b);
            }
            let mut single = blocks[0];
            accel.encrypt_block(&mut single);
            assert_eq!(single, expected[0]);

            accel.encrypt_blocks4(&mut blocks);
            assert_eq!(blocks, expected);

            accel.decrypt_blocks4(&mut blocks);
            table.decrypt_blocks4(&mut expected);
            assert_eq!(blocks, expected);
        }
    }

    #[test]
    fn test_strategy_selection() {
        let key = [7u8; 16];
        let table = Sm4Key::with_strategy(&key, Sm4Strategy::Table).unwrap();
        assert_eq!(table.strategy(), Sm4Strategy::Table);

        let auto = Sm4Key::new(&key).unwrap();
        let expected = if accelerated_available() {
            Sm4Strategy::Accelerated
        } else {
            Sm4Strategy::Table
        };
        assert_eq!(auto.strategy(), expected);
        assert_ne!(auto.strategy(), Sm4Strategy::Auto);
    }

    #[test]
    fn test_block_cipher_trait_rejects_wrong_block_size() {
        let cipher = Sm4Key::new(&[0u8; 16]).unwrap();
        let c: &dyn BlockCipher = &cipher;
        assert_eq!(c.block_size(), 16);
        assert_eq!(c.key_size(), 16);
        let mut short = [0u8; 8];
        assert_eq!(c.encrypt_block(&mut short), Err(CryptoError::InvalidArg));
        assert_eq!(c.decrypt_block(&mut short), Err(CryptoError::InvalidArg));
        let mut long = [0u8; 17];
        assert_eq!(c.encrypt_block(&mut long), Err(CryptoError::InvalidArg));
    }

    #[test]
    fn test_block_cipher_trait_roundtrip() {
        let cipher = Sm4Key::new(&hex_to_bytes("0123456789abcdeffedcba9876543210")).unwrap();
        let c: &dyn BlockCipher = &cipher;
        let mut data = hex_to_bytes("0123456789abcdeffedcba9876543210");
        c.encrypt_block(&mut data).unwrap();
        assert_eq!(hex(&data), "681edf34d206965e86b3e94f536e4246");
        c.decrypt_block(&mut data).unwrap();
        assert_eq!(hex(&data), "0123456789abcdeffedcba9876543210");
    }

    #[test]
    fn test_debug_does_not_leak_keys() {
        let cipher = Sm4Key::new(&[0x11u8; 16]).unwrap();
        let s = format!("{cipher:?}");
        assert!(s.starts_with("Sm4Key"));
        let rk = key_schedule(&[0x11u8; 16]).unwrap();
        assert_eq!(format!("{rk:?}"), "RoundKeys(..)");
    }
}
