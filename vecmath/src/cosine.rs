/// Distance reported when two vectors cannot be compared: length mismatch,
/// zero norm or non-finite input. Such pairs read as orthogonal.
pub const MAX_DISTANCE: f32 = 1.0;

/// Dot product of two equal-length vectors, accumulated in f64.
///
/// Extra trailing components of the longer input are ignored.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

/// Euclidean (L2) norm, accumulated in f64.
pub fn norm(a: &[f32]) -> f64 {
    a.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Compute the cosine distance `1 - cos(a, b)` between two vectors.
///
/// Returns a value in `[0, 2]` where 0 means identical direction and
/// 2 means opposite direction. Embeddings are expected to be roughly
/// unit-normalized, so matching thresholds live in `[0, 1]`.
///
/// Returns [`MAX_DISTANCE`] for empty inputs, zero vectors, non-finite
/// components or dimension mismatches.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return MAX_DISTANCE;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let ai = x as f64;
        let bi = y as f64;
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    if norm_a == 0.0
        || norm_b == 0.0
        || !dot.is_finite()
        || !norm_a.is_finite()
        || !norm_b.is_finite()
    {
        return MAX_DISTANCE;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Clamp to [-1, 1] to handle floating point errors.
    let similarity = similarity.clamp(-1.0, 1.0);
    (1.0 - similarity) as f32
}
