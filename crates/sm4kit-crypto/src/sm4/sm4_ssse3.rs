//! Vectorised SM4 using x86-64 SSSE3 intrinsics.
//!
//! This module is only compiled on `x86_64` targets with the `simd` feature.
//! Four blocks are processed per pass in transposed form: register `x[j]`
//! holds word `j` of each block, one block per 32-bit lane. The S-box is
//! evaluated with `pshufb` against sixteen 16-byte rows of the real SM4
//! S-box, selected by the high nibble, so the output matches the table-driven
//! strategy bit for bit and has no secret-dependent memory access.

use core::arch::x86_64::*;

use super::tables::SBOX;
use super::SM4_BLOCK_SIZE;

macro_rules! rotl32 {
    ($x:ident, $n:literal) => {
        _mm_or_si128(_mm_slli_epi32::<$n>($x), _mm_srli_epi32::<{ 32 - $n }>($x))
    };
}

/// Load the S-box as sixteen rows of sixteen bytes.
#[target_feature(enable = "ssse3")]
unsafe fn load_sbox_rows() -> [__m128i; 16] {
    let mut rows = [_mm_setzero_si128(); 16];
    for (h, row) in rows.iter_mut().enumerate() {
        *row = _mm_loadu_si128(SBOX.as_ptr().add(h * 16) as *const __m128i);
    }
    rows
}

/// τ: substitute every byte of `x` through the S-box.
#[target_feature(enable = "ssse3")]
#[inline]
unsafe fn sub_bytes(x: __m128i, rows: &[__m128i; 16]) -> __m128i {
    let nibble = _mm_set1_epi8(0x0f);
    let lo = _mm_and_si128(x, nibble);
    let hi = _mm_and_si128(_mm_srli_epi16::<4>(x), nibble);

    let mut out = _mm_setzero_si128();
    for (h, row) in rows.iter().enumerate() {
        let sel = _mm_cmpeq_epi8(hi, _mm_set1_epi8(h as i8));
        out = _mm_or_si128(out, _mm_and_si128(sel, _mm_shuffle_epi8(*row, lo)));
    }
    out
}

/// L on each 32-bit lane.
#[target_feature(enable = "ssse3")]
#[inline]
unsafe fn linear(b: __m128i) -> __m128i {
    let r2 = rotl32!(b, 2);
    let r10 = rotl32!(b, 10);
    let r18 = rotl32!(b, 18);
    let r24 = rotl32!(b, 24);
    _mm_xor_si128(_mm_xor_si128(b, r2), _mm_xor_si128(_mm_xor_si128(r10, r18), r24))
}

/// Run the 32 rounds over four independent blocks in place.
///
/// # Safety
///
/// The caller must ensure the CPU supports SSSE3.
#[target_feature(enable = "ssse3")]
pub(crate) unsafe fn crypt_blocks4(rk: &[u32; 32], blocks: &mut [[u8; SM4_BLOCK_SIZE]; 4]) {
    let rows = load_sbox_rows();

    let mut x = [_mm_setzero_si128(); 4];
    for (j, reg) in x.iter_mut().enumerate() {
        let o = 4 * j;
        let lanes: [u32; 4] = core::array::from_fn(|b| {
            u32::from_be_bytes([blocks[b][o], blocks[b][o + 1], blocks[b][o + 2], blocks[b][o + 3]])
        });
        *reg = _mm_loadu_si128(lanes.as_ptr() as *const __m128i);
    }

    for &k in rk.iter() {
        let t = _mm_xor_si128(
            _mm_xor_si128(x[1], x[2]),
            _mm_xor_si128(x[3], _mm_set1_epi32(k as i32)),
        );
        let x4 = _mm_xor_si128(x[0], linear(sub_bytes(t, &rows)));
        x = [x[1], x[2], x[3], x4];
    }

    let mut words = [[0u32; 4]; 4];
    for (j, reg) in x.iter().enumerate() {
        _mm_storeu_si128(words[j].as_mut_ptr() as *mut __m128i, *reg);
    }
    for (b, block) in blocks.iter_mut().enumerate() {
        for j in 0..4 {
            block[4 * j..4 * j + 4].copy_from_slice(&words[3 - j][b].to_be_bytes());
        }
    }
}

/// Whether the running CPU supports this strategy.
pub(crate) fn is_supported() -> bool {
    is_x86_feature_detected!("ssse3")
}
