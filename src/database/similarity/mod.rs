
/// Dot product of two vectors.
///
/// Vectors of different lengths are not comparable and yield `0.0`, which downstream reads
/// as "no match" rather than an error.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum::<f64>() as f32
}

/// Euclidean norm
#[inline]
pub fn magnitude(a: &[f32]) -> f32 {
    a.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt() as f32
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns `0.0` for mismatched lengths and for zero-magnitude vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let denominator = magnitude(a) * magnitude(b);
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    // Adding 0.0 turns a -0.0 from an all-negative-zero dot product into 0.0
    (dot_product(a, b) / denominator).clamp(-1.0, 1.0) + 0.0
}
