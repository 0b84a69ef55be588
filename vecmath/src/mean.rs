//! Two ways of maintaining the mean of a vector set.
//!
//! [`mean`] recomputes from scratch and copes with removals of arbitrary
//! members. [`running_mean_add`] / [`running_mean_remove`] maintain an exact
//! running mean one member at a time and need the current member count.

use crate::error::VecError;

/// Reports whether `v` is a usable embedding of dimension `dim`.
pub fn is_valid(v: &[f32], dim: usize) -> bool {
    !v.is_empty() && v.len() == dim && v.iter().all(|x| x.is_finite())
}

/// Arithmetic mean of every vector of length `dim`.
///
/// Vectors of another length or with non-finite components are skipped.
/// Returns `None` when nothing usable remains.
pub fn mean<'a, I>(vectors: I, dim: usize) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if dim == 0 {
        return None;
    }
    let mut sum = vec![0.0f64; dim];
    let mut n = 0usize;
    for v in vectors {
        if !is_valid(v, dim) {
            continue;
        }
        for (s, &x) in sum.iter_mut().zip(v.iter()) {
            *s += x as f64;
        }
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let n = n as f64;
    Some(sum.into_iter().map(|s| (s / n) as f32).collect())
}

/// Folds `v` into a running mean over `count` members.
///
/// `new[i] = (old[i] * count + v[i]) / (count + 1)`. Every member weighs the
/// same regardless of arrival order. Returns the new member count.
pub fn running_mean_add(centroid: &mut [f32], count: u64, v: &[f32]) -> Result<u64, VecError> {
    if centroid.len() != v.len() {
        return Err(VecError::DimensionMismatch {
            got: v.len(),
            want: centroid.len(),
        });
    }
    let old = count as f64;
    let new = old + 1.0;
    for (c, &x) in centroid.iter_mut().zip(v.iter()) {
        *c = ((*c as f64 * old + x as f64) / new) as f32;
    }
    Ok(count + 1)
}

/// Removes `v` from a running mean over `count` members.
///
/// Exact inverse of [`running_mean_add`]. Removing the last member keeps the
/// centroid as-is and returns zero; the caller decides what an empty group
/// means.
pub fn running_mean_remove(centroid: &mut [f32], count: u64, v: &[f32]) -> Result<u64, VecError> {
    if centroid.len() != v.len() {
        return Err(VecError::DimensionMismatch {
            got: v.len(),
            want: centroid.len(),
        });
    }
    if count <= 1 {
        return Ok(0);
    }
    let old = count as f64;
    let new = old - 1.0;
    for (c, &x) in centroid.iter_mut().zip(v.iter()) {
        *c = ((*c as f64 * old - x as f64) / new) as f32;
    }
    Ok(count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_mean_basic() {
        let a = [1.0f32, 0.0];
        let b = [0.99f32, 0.14];
        let m = mean([&a[..], &b[..]], 2).unwrap();
        assert!(approx(&m, &[0.995, 0.07]), "got {m:?}");
    }

    #[test]
    fn test_mean_filters_bad_dimensions() {
        let a = [1.0f32, 1.0];
        let bad = [5.0f32, 5.0, 5.0];
        let nan = [f32::NAN, 0.0];
        let m = mean([&a[..], &bad[..], &nan[..]], 2).unwrap();
        assert!(approx(&m, &[1.0, 1.0]));
    }

    #[test]
    fn test_mean_empty() {
        assert!(mean(std::iter::empty::<&[f32]>(), 2).is_none());
        let bad = [1.0f32];
        assert!(mean([&bad[..]], 2).is_none());
        assert!(mean([&bad[..]], 0).is_none());
    }

    #[test]
    fn test_running_mean_matches_batch_mean() {
        let vs: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0, 0.5],
            vec![0.2, 0.8, 0.1],
            vec![-0.3, 0.4, 0.9],
            vec![0.7, -0.7, 0.0],
        ];
        let mut centroid = vs[0].clone();
        let mut count = 1;
        for v in &vs[1..] {
            count = running_mean_add(&mut centroid, count, v).unwrap();
        }
        assert_eq!(count, 4);
        let batch = mean(vs.iter().map(|v| v.as_slice()), 3).unwrap();
        assert!(approx(&centroid, &batch), "{centroid:?} vs {batch:?}");
    }

    #[test]
    fn test_running_mean_order_independent() {
        let vs = [[1.0f32, 2.0], [3.0, -1.0], [0.5, 0.5]];
        let mut fwd = vs[0].to_vec();
        let mut n = 1;
        for v in &vs[1..] {
            n = running_mean_add(&mut fwd, n, v).unwrap();
        }
        let mut rev = vs[2].to_vec();
        let mut m = 1;
        for v in vs[..2].iter().rev() {
            m = running_mean_add(&mut rev, m, v).unwrap();
        }
        assert_eq!(n, m);
        assert!(approx(&fwd, &rev));
    }

    #[test]
    fn test_running_mean_remove_inverts_add() {
        let mut c = vec![1.0f32, 0.0];
        let n = running_mean_add(&mut c, 1, &[0.0, 1.0]).unwrap();
        assert!(approx(&c, &[0.5, 0.5]));
        let n = running_mean_remove(&mut c, n, &[0.0, 1.0]).unwrap();
        assert_eq!(n, 1);
        assert!(approx(&c, &[1.0, 0.0]));

        let n = running_mean_remove(&mut c, n, &[1.0, 0.0]).unwrap();
        assert_eq!(n, 0);
        assert!(approx(&c, &[1.0, 0.0]), "last removal keeps centroid");
    }

    #[test]
    fn test_running_mean_dimension_mismatch() {
        let mut c = vec![1.0f32, 0.0];
        assert!(running_mean_add(&mut c, 1, &[1.0]).is_err());
        assert!(running_mean_remove(&mut c, 2, &[1.0, 0.0, 0.0]).is_err());
    }
}
