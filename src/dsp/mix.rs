//! Block summing and hard-clip PCM quantization.

/*
Mixing and Quantization
=======================

Polyphony is addition: each voice renders into its own scratch buffer and
the buffers are summed sample-by-sample into one composite block. Summing
has no built-in headroom - eight voices near full scale add up to eight
times full scale - so the composite is only bounded at the very end of the
render path, when it is quantized to 16-bit PCM.

Quantization maps the float range [-1.0, 1.0] onto the signed 16-bit range
and HARD-CLIPS anything outside it:

    pcm = clamp(x × 32767, -32768, 32767)

Hard clipping is deliberate. A soft limiter would color every loud chord;
the clip only engages on overload and keeps the quiet path bit-exact.
*/

/// Add signal `b` into signal `a` in place.
#[inline]
pub fn sum_in_place(a: &mut [f32], b: &[f32]) {
    debug_assert_eq!(a.len(), b.len());

    for (sa, &sb) in a.iter_mut().zip(b.iter()) {
        *sa += sb;
    }
}

/// Quantize one sample to 16-bit PCM with a hard clip.
#[inline]
pub fn quantize(x: f32) -> i16 {
    (x * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Scale a float block by `gain` and quantize it into a PCM block.
#[inline]
pub fn quantize_block(src: &[f32], out: &mut [i16], gain: f32) {
    debug_assert_eq!(src.len(), out.len());

    for (&s, o) in src.iter().zip(out.iter_mut()) {
        *o = quantize(s * gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summing_accumulates() {
        let mut a = [0.25, -0.5, 1.0, 0.0];
        let b = [0.25, -0.5, 1.0, 0.0];

        sum_in_place(&mut a, &b);

        assert_eq!(a, [0.5, -1.0, 2.0, 0.0]);
    }

    #[test]
    fn quantize_maps_full_scale() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), i16::MAX);
        assert_eq!(quantize(-1.0), -i16::MAX);
    }

    #[test]
    fn quantize_hard_clips_overload() {
        assert_eq!(quantize(2.0), i16::MAX);
        assert_eq!(quantize(-2.0), i16::MIN);
        assert_eq!(quantize(100.0), i16::MAX);
    }

    #[test]
    fn quantize_block_applies_gain() {
        let src = [1.0, -1.0, 0.5, 2.0];
        let mut out = [0i16; 4];

        quantize_block(&src, &mut out, 0.5);

        assert_eq!(out[0], (0.5 * i16::MAX as f32) as i16);
        assert_eq!(out[2], (0.25 * i16::MAX as f32) as i16);
        // 2.0 × 0.5 = 1.0, right at full scale
        assert_eq!(out[3], i16::MAX);
    }
}
