//! Vectorised SM4 using AArch64 NEON intrinsics.
//!
//! This module is only compiled on `aarch64` targets with the `simd` feature.
//! Same transposed four-block layout as the SSSE3 path. The S-box is looked
//! up with `TBL`/`TBX` over four 64-byte slices of the real SM4 S-box; an
//! index outside the current slice leaves the lane untouched, so after four
//! passes every byte has been substituted exactly once.

use core::arch::aarch64::*;

use super::tables::SBOX;
use super::SM4_BLOCK_SIZE;

macro_rules! rotl32 {
    ($x:ident, $n:literal) => {
        vorrq_u32(vshlq_n_u32::<$n>($x), vshrq_n_u32::<{ 32 - $n }>($x))
    };
}

/// τ: substitute every byte of `x` through the S-box.
#[target_feature(enable = "neon")]
#[inline]
unsafe fn sub_bytes(x: uint8x16_t, sbox: &[uint8x16x4_t; 4]) -> uint8x16_t {
    let step = vdupq_n_u8(64);
    let mut idx = x;
    let mut out = vqtbl4q_u8(sbox[0], idx);
    idx = vsubq_u8(idx, step);
    out = vqtbx4q_u8(out, sbox[1], idx);
    idx = vsubq_u8(idx, step);
    out = vqtbx4q_u8(out, sbox[2], idx);
    idx = vsubq_u8(idx, step);
    vqtbx4q_u8(out, sbox[3], idx)
}

/// L on each 32-bit lane.
#[target_feature(enable = "neon")]
#[inline]
unsafe fn linear(b: uint32x4_t) -> uint32x4_t {
    let r2 = rotl32!(b, 2);
    let r10 = rotl32!(b, 10);
    let r18 = rotl32!(b, 18);
    let r24 = rotl32!(b, 24);
    veorq_u32(veorq_u32(b, r2), veorq_u32(veorq_u32(r10, r18), r24))
}

/// Run the 32 rounds over four independent blocks in place.
///
/// # Safety
///
/// The caller must ensure the CPU supports NEON.
#[target_feature(enable = "neon")]
pub(crate) unsafe fn crypt_blocks4(rk: &[u32; 32], blocks: &mut [[u8; SM4_BLOCK_SIZE]; 4]) {
    let sbox = [
        vld1q_u8_x4(SBOX.as_ptr()),
        vld1q_u8_x4(SBOX.as_ptr().add(64)),
        vld1q_u8_x4(SBOX.as_ptr().add(128)),
        vld1q_u8_x4(SBOX.as_ptr().add(192)),
    ];

    let mut x = [vdupq_n_u32(0); 4];
    for (j, reg) in x.iter_mut().enumerate() {
        let o = 4 * j;
        let lanes: [u32; 4] = core::array::from_fn(|b| {
            u32::from_be_bytes([blocks[b][o], blocks[b][o + 1], blocks[b][o + 2], blocks[b][o + 3]])
        });
        *reg = vld1q_u32(lanes.as_ptr());
    }

    for &k in rk.iter() {
        let t = veorq_u32(veorq_u32(x[1], x[2]), veorq_u32(x[3], vdupq_n_u32(k)));
        let s = vreinterpretq_u32_u8(sub_bytes(vreinterpretq_u8_u32(t), &sbox));
        let x4 = veorq_u32(x[0], linear(s));
        x = [x[1], x[2], x[3], x4];
    }

    let mut words = [[0u32; 4]; 4];
    for (j, reg) in x.iter().enumerate() {
        vst1q_u32(words[j].as_mut_ptr(), *reg);
    }
    for (b, block) in blocks.iter_mut().enumerate() {
        for j in 0..4 {
            block[4 * j..4 * j + 4].copy_from_slice(&words[3 - j][b].to_be_bytes());
        }
    }
}

/// Whether the running CPU supports this strategy.
pub(crate) fn is_supported() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(test)]
mod tests {
    use super::super::soft;
    use super::super::tables::tables;
    use super::*;

    #[test]
    fn test_neon_matches_table_driven() {
        if !is_supported() {
            return;
        }
        let mut rk = [0u32; 32];
        for (i, k) in rk.iter_mut().enumerate() {
            *k = (i as u32 + 1).wrapping_mul(0x01000193) ^ 0xa5a5_0f0f;
        }
        let mut blocks: [[u8; 16]; 4] =
            core::array::from_fn(|b| core::array::from_fn(|i| (b * 37 + i * 11) as u8));
        let mut expected = blocks;
        for block in expected.iter_mut() {
            soft::crypt_block(tables(), &rk, block);
        }
        unsafe { crypt_blocks4(&rk, &mut blocks) };
        assert_eq!(blocks, expected);
    }
}
