//! Vector codec and similarity math.
//!
//! Embedding vectors are stored as flat BLOBs: each `f32` component is
//! written as 4 little-endian bytes, producing `len × 4` bytes with no
//! header and no compression. This is the layout sqlite-vec reads
//! natively, so the same payload serves both search strategies.

use crate::error::CodecError;

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use incident_recall_core::codec::{decode, encode};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = encode(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(decode(&blob).unwrap(), v);
/// ```
pub fn encode(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`encode`]. Fails with [`CodecError::MalformedVector`] if the
/// payload length is not a multiple of 4.
pub fn decode(blob: &[u8]) -> Result<Vec<f32>, CodecError> {
    if blob.len() % 4 != 0 {
        return Err(CodecError::MalformedVector { len: blob.len() });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine distance, `1 - cos(θ)`, rounded to `f32`.
///
/// Accumulates in `f32` and divides in `f64`, the way sqlite-vec's
/// `vec_distance_cosine` does, so in-process and in-database distances
/// agree bit for bit. Degenerate inputs (empty, mismatched lengths, zero
/// norm) have distance `1.0`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = f64::from(norm_a).sqrt() * f64::from(norm_b).sqrt();
    if denom == 0.0 {
        return 1.0;
    }

    (1.0 - f64::from(dot) / denom) as f32
}

/// Cosine similarity as both search strategies report it: `1 - distance`,
/// clamped to `[-1.0, 1.0]`.
///
/// - `1.0` = identical direction
/// - `0.0` = orthogonal, or a degenerate input (empty, mismatched
///   lengths, zero norm, non-finite components)
/// - `-1.0` = opposite direction
///
/// The native strategy evaluates the same expression in SQLite's double
/// arithmetic, where a non-finite distance comes back as `NULL` and is
/// coalesced to `0.0`.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn similarity_score(a: &[f32], b: &[f32]) -> f64 {
    let score = 1.0 - f64::from(cosine_distance(a, b));
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001, f32::MAX, f32::MIN_POSITIVE];
        let blob = encode(&vec);
        assert_eq!(blob.len(), vec.len() * 4);
        assert_eq!(decode(&blob).unwrap(), vec);
    }

    #[test]
    fn test_encode_is_little_endian() {
        assert_eq!(encode(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_decode_rejects_ragged_payload() {
        let err = decode(&[0, 0, 128, 63, 1]).unwrap_err();
        assert_eq!(err, CodecError::MalformedVector { len: 5 });
    }

    #[test]
    fn test_similarity_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((similarity_score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_self_match_never_exceeds_one() {
        // Rounding in the f32 accumulators can push 1 - distance above 1.
        let mut seed = 0x2545_f491u32;
        for _ in 0..500 {
            let v: Vec<f32> = (0..16)
                .map(|_| {
                    seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5
                })
                .collect();
            let score = similarity_score(&v, &v);
            assert!(score <= 1.0, "self score {} above 1.0", score);
            assert!(score > 0.999);
        }
    }

    #[test]
    fn test_similarity_symmetric() {
        let a = vec![0.3, -1.2, 4.0, 0.0];
        let b = vec![2.0, 0.5, -0.7, 1.1];
        assert_eq!(similarity_score(&a, &b), similarity_score(&b, &a));
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(similarity_score(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = similarity_score(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
        assert!(sim >= -1.0);
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(similarity_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_similarity_zero_norm() {
        assert_eq!(similarity_score(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_similarity_different_lengths() {
        assert_eq!(similarity_score(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_similarity_non_finite_is_zero() {
        assert_eq!(similarity_score(&[f32::NAN, 1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(similarity_score(&[f32::INFINITY, 1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_similarity_score_tracks_cosine() {
        let a = vec![1.0, 1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let expected = std::f64::consts::FRAC_1_SQRT_2;
        assert!((similarity_score(&a, &b) - expected).abs() < 1e-6);
        assert!((f64::from(cosine_distance(&a, &b)) - (1.0 - expected)).abs() < 1e-6);
        assert!((similarity_score(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_degenerate_is_one() {
        assert_eq!(cosine_distance(&[], &[]), 1.0);
        assert_eq!(cosine_distance(&[0.0], &[3.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
    }
}
