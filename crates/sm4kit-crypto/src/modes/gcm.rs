//! GCM (Galois/Counter Mode) authenticated encryption over SM4.
//!
//! Implements GCM as defined in NIST SP 800-38D with SM4 as the block
//! cipher (the SM4-GCM construction of RFC 8998). Provides authenticated
//! encryption with associated data (AEAD) and a 128-bit tag.
//!
//! # Security
//!
//! A (key, nonce) pair must never be used to seal two different messages.
//! Nonce reuse reveals the XOR of the plaintexts and lets an attacker
//! recover the hash key `H` and forge tags. This is a caller contract; the
//! context does not track nonces.

use crate::modes::ctr::{self, inc32};
use crate::provider::Aead;
use crate::sm4::{Sm4Key, Sm4Strategy, SM4_BLOCK_SIZE, SM4_KEY_SIZE};
use sm4kit_types::{AeadAlgId, CryptoError};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// GCM tag size in bytes.
pub const GCM_TAG_SIZE: usize = 16;

/// Nonce size that takes the `nonce || 0^31 || 1` fast path.
pub const GCM_NONCE_SIZE: usize = 12;

// Reduction table for 4-bit GHASH: TABLE_P4[i] = i * R >> 120, where R = 0xE1 << 120.
const TABLE_P4: [u64; 16] = [
    0x0000000000000000,
    0x1c20000000000000,
    0x3840000000000000,
    0x2460000000000000,
    0x7080000000000000,
    0x6ca0000000000000,
    0x48c0000000000000,
    0x54e0000000000000,
    0xe100000000000000,
    0xfd20000000000000,
    0xd940000000000000,
    0xc560000000000000,
    0x9180000000000000,
    0x8da0000000000000,
    0xa9c0000000000000,
    0xb5e0000000000000,
];

/// R = x^128 + x^7 + x^2 + x + 1 in GCM's reflected bit order.
const GF128_R: u64 = 0xe100000000000000;

/// GF(2^128) element as (high, low) u64 pair, GCM bit order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Zeroize)]
pub struct Gf128 {
    h: u64,
    l: u64,
}

impl Gf128 {
    pub fn from_bytes(b: &[u8; 16]) -> Self {
        Self {
            h: u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            l: u64::from_be_bytes([b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]]),
        }
    }

    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.h.to_be_bytes());
        out[8..].copy_from_slice(&self.l.to_be_bytes());
        out
    }

    pub fn xor(self, other: Self) -> Self {
        Self {
            h: self.h ^ other.h,
            l: self.l ^ other.l,
        }
    }

    /// Right shift by 4 bits in GF(2^128).
    fn shr4(self) -> Self {
        Self {
            h: self.h >> 4,
            l: (self.l >> 4) | (self.h << 60),
        }
    }

    /// Bit-by-bit multiplication (SP 800-38D, Algorithm 1).
    ///
    /// Reference multiplier; the table path in [`GhashTable`] must agree
    /// with it for every input.
    pub fn mul(self, y: Gf128) -> Gf128 {
        let mut z = Gf128::default();
        let mut v = y;
        for i in 0..128 {
            let bit = if i < 64 {
                (self.h >> (63 - i)) & 1
            } else {
                (self.l >> (127 - i)) & 1
            };
            let mask = 0u64.wrapping_sub(bit);
            z.h ^= v.h & mask;
            z.l ^= v.l & mask;

            let lsb = v.l & 1;
            v.l = (v.l >> 1) | (v.h << 63);
            v.h = (v.h >> 1) ^ (GF128_R & 0u64.wrapping_sub(lsb));
        }
        z
    }
}

impl core::fmt::Debug for Gf128 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Gf128(..)")
    }
}

/// Precomputed GHASH table (16 entries for 4-bit multiplication by H).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GhashTable {
    table: [Gf128; 16],
}

impl GhashTable {
    pub fn new(h: &[u8; 16]) -> Self {
        let mut table = [Gf128::default(); 16];
        // table[0] = 0 (already default)
        table[8] = Gf128::from_bytes(h);

        // Build by halving: table[4] = table[8] >> 1, etc.
        // >> 1 in GF(2^128): shift right, reduce if low bit was set
        let mut cur = table[8];
        for &idx in &[4u8, 2, 1] {
            let carry = (cur.l & 1) != 0;
            cur = Gf128 {
                h: cur.h >> 1,
                l: (cur.l >> 1) | (cur.h << 63),
            };
            if carry {
                cur.h ^= GF128_R;
            }
            table[idx as usize] = cur;
        }

        // Fill remaining entries by XOR
        for i in 2..16u8 {
            if i.count_ones() > 1 {
                // Find highest set bit
                let msb = 1u8 << (7 - i.leading_zeros());
                table[i as usize] = table[msb as usize].xor(table[(i ^ msb) as usize]);
            }
        }

        Self { table }
    }

    /// Multiply `x` by H.
    pub fn mul_h(&self, x: Gf128) -> Gf128 {
        let mut z = Gf128::default();

        // Process each byte from low to high (LSB-first for correct GF multiplication)
        let x_bytes = x.to_bytes();
        for &byte in x_bytes.iter().rev() {
            // Low nibble first (less significant within byte)
            let lo = (byte & 0x0f) as usize;
            let rem_bits = (z.l & 0x0f) as usize;
            z = z.shr4();
            z.h ^= TABLE_P4[rem_bits];
            z = z.xor(self.table[lo]);

            // High nibble second (more significant within byte)
            let hi = (byte >> 4) as usize;
            let rem_bits = (z.l & 0x0f) as usize;
            z = z.shr4();
            z.h ^= TABLE_P4[rem_bits];
            z = z.xor(self.table[hi]);
        }
        z
    }

    /// GHASH step: state = (state XOR block) * H.
    pub(crate) fn ghash_block(&self, state: &mut Gf128, block: &[u8; 16]) {
        *state = self.mul_h(state.xor(Gf128::from_bytes(block)));
    }

    /// GHASH over variable-length data (pad to block boundary).
    pub(crate) fn ghash_data(&self, state: &mut Gf128, data: &[u8]) {
        for chunk in data.chunks(16) {
            let mut block = [0u8; 16];
            block[..chunk.len()].copy_from_slice(chunk);
            self.ghash_block(state, &block);
        }
    }
}

/// One GHASH computation: absorb AAD, then ciphertext, then the lengths.
pub struct Ghash<'a> {
    table: &'a GhashTable,
    acc: Gf128,
}

impl<'a> Ghash<'a> {
    pub fn new(table: &'a GhashTable) -> Self {
        Self {
            table,
            acc: Gf128::default(),
        }
    }

    /// Absorb `data`, zero-padding the final partial block.
    pub fn absorb(&mut self, data: &[u8]) {
        self.table.ghash_data(&mut self.acc, data);
    }

    /// Absorb the length block `[aad_bits]_64 || [ct_bits]_64` and return
    /// the accumulator.
    pub fn finalize(mut self, aad_bits: u64, ct_bits: u64) -> [u8; 16] {
        let mut len_block = [0u8; 16];
        len_block[..8].copy_from_slice(&aad_bits.to_be_bytes());
        len_block[8..].copy_from_slice(&ct_bits.to_be_bytes());
        self.table.ghash_block(&mut self.acc, &len_block);
        self.acc.to_bytes()
    }
}

impl Drop for Ghash<'_> {
    fn drop(&mut self) {
        self.acc.zeroize();
    }
}

/// Length of `data` in bits, if representable.
fn bit_len(len: usize) -> Option<u64> {
    u64::try_from(len).ok()?.checked_mul(8)
}

/// SM4-GCM context: a scheduled key plus the GHASH table for
/// `H = E_K(0^128)`. Reusable across messages with distinct nonces.
#[derive(Clone)]
pub struct Sm4Gcm {
    cipher: Sm4Key,
    table: GhashTable,
}

impl Sm4Gcm {
    /// Create a context from a 16-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        Self::with_strategy(key, Sm4Strategy::Auto)
    }

    /// Create a context whose block cipher uses `strategy`.
    pub fn with_strategy(key: &[u8], strategy: Sm4Strategy) -> Result<Self, CryptoError> {
        let cipher = Sm4Key::with_strategy(key, strategy)?;

        // Compute H = Encrypt(0^128)
        let mut h_block = [0u8; SM4_BLOCK_SIZE];
        cipher.encrypt_block(&mut h_block);
        let table = GhashTable::new(&h_block);
        h_block.zeroize();

        tracing::trace!(alg = AeadAlgId::Sm4Gcm.name(), strategy = ?cipher.strategy(), "aead context ready");
        Ok(Self { cipher, table })
    }

    /// The underlying block cipher.
    pub fn cipher(&self) -> &Sm4Key {
        &self.cipher
    }

    /// Compute J0 (initial counter) from the nonce.
    fn derive_j0(&self, nonce: &[u8]) -> Result<[u8; SM4_BLOCK_SIZE], CryptoError> {
        let nonce_bits = match bit_len(nonce.len()) {
            Some(bits) if bits > 0 => bits,
            _ => return Err(CryptoError::InvalidNonceLength),
        };

        let mut j0 = [0u8; SM4_BLOCK_SIZE];
        if nonce.len() == GCM_NONCE_SIZE {
            j0[..GCM_NONCE_SIZE].copy_from_slice(nonce);
            j0[15] = 1;
        } else {
            // GHASH(nonce || 0^s || 0^64 || [len(nonce)]_64)
            let mut ghash = Ghash::new(&self.table);
            ghash.absorb(nonce);
            j0 = ghash.finalize(0, nonce_bits);
        }
        Ok(j0)
    }

    /// Validate lengths before any work is done; returns (J0, AAD bits).
    fn prepare(
        &self,
        nonce: &[u8],
        aad: &[u8],
        data_len: usize,
    ) -> Result<([u8; SM4_BLOCK_SIZE], u64), CryptoError> {
        let aad_bits = bit_len(aad.len()).ok_or(CryptoError::LengthExceeded)?;
        ctr::check_len(data_len as u64)?;
        let j0 = self.derive_j0(nonce)?;
        Ok((j0, aad_bits))
    }

    /// Tag = GHASH(AAD, C, lengths) XOR E_K(J0).
    fn compute_tag(
        &self,
        j0: &[u8; SM4_BLOCK_SIZE],
        aad: &[u8],
        aad_bits: u64,
        ciphertext: &[u8],
    ) -> [u8; GCM_TAG_SIZE] {
        let mut ghash = Ghash::new(&self.table);
        ghash.absorb(aad);
        ghash.absorb(ciphertext);
        // Bounded by check_len, so the bit length fits.
        let mut tag = ghash.finalize(aad_bits, ciphertext.len() as u64 * 8);

        let mut ek0 = *j0;
        self.cipher.encrypt_block(&mut ek0);
        for (t, &e) in tag.iter_mut().zip(ek0.iter()) {
            *t ^= e;
        }
        ek0.zeroize();
        tag
    }

    /// Encrypt `buffer` in place and return the detached tag.
    pub fn seal_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<[u8; GCM_TAG_SIZE], CryptoError> {
        let (j0, aad_bits) = self.prepare(nonce, aad, buffer.len())?;

        // CTR encryption starting from inc32(J0)
        let mut counter = j0;
        inc32(&mut counter);
        ctr::ctr32_apply(&self.cipher, &counter, buffer)?;

        Ok(self.compute_tag(&j0, aad, aad_bits, buffer))
    }

    /// Verify `tag` over `buffer` and, only if it matches, decrypt in place.
    ///
    /// On failure the buffer is left untouched.
    pub fn open_in_place(
        &self,
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8; GCM_TAG_SIZE],
    ) -> Result<(), CryptoError> {
        let (j0, aad_bits) = self.prepare(nonce, aad, buffer.len())?;

        let mut expected = self.compute_tag(&j0, aad, aad_bits, buffer);
        let ok: bool = expected[..].ct_eq(&tag[..]).into();
        expected.zeroize();
        if !ok {
            tracing::debug!(alg = AeadAlgId::Sm4Gcm.name(), "tag verification failed");
            return Err(CryptoError::AuthenticationFailure);
        }

        let mut counter = j0;
        inc32(&mut counter);
        ctr::ctr32_apply(&self.cipher, &counter, buffer)
    }

    /// Encrypt and authenticate. Returns (ciphertext, tag).
    pub fn seal(
        &self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; GCM_TAG_SIZE]), CryptoError> {
        let mut output = plaintext.to_vec();
        let tag = self.seal_in_place(nonce, aad, &mut output)?;
        Ok((output, tag))
    }

    /// Verify and decrypt. No plaintext is produced unless the tag matches.
    pub fn open(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; GCM_TAG_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut output = ciphertext.to_vec();
        self.open_in_place(nonce, aad, &mut output, tag)?;
        Ok(output)
    }
}

impl core::fmt::Debug for Sm4Gcm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sm4Gcm")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

impl Aead for Sm4Gcm {
    fn alg_id(&self) -> AeadAlgId {
        AeadAlgId::Sm4Gcm
    }

    fn tag_size(&self) -> usize {
        GCM_TAG_SIZE
    }

    fn nonce_size(&self) -> usize {
        GCM_NONCE_SIZE
    }

    fn key_size(&self) -> usize {
        SM4_KEY_SIZE
    }

    fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (mut ct, tag) = self.seal(nonce, aad, plaintext)?;
        ct.extend_from_slice(&tag);
        Ok(ct)
    }

    fn decrypt(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < GCM_TAG_SIZE {
            return Err(CryptoError::InvalidTagLength);
        }
        let ct_len = ciphertext.len() - GCM_TAG_SIZE;
        let (ct_data, received_tag) = ciphertext.split_at(ct_len);
        let tag: &[u8; GCM_TAG_SIZE] = received_tag
            .try_into()
            .map_err(|_| CryptoError::InvalidTagLength)?;
        self.open(nonce, aad, ct_data, tag)
    }
}

/// Encrypt and authenticate data using SM4-GCM.
/// Returns ciphertext || 16-byte tag.
pub fn sm4_gcm_encrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    Sm4Gcm::new(key)?.encrypt(nonce, aad, plaintext)
}

/// Decrypt and verify data using SM4-GCM.
/// `ciphertext` includes the appended 16-byte tag.
/// Returns plaintext on success, or error if authentication fails.
pub fn sm4_gcm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    Sm4Gcm::new(key)?.decrypt(nonce, aad, ciphertext)
}
