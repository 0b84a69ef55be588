use crate::cosine::cosine_distance;

/// Match is the closest candidate found by [`nearest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<K> {
    /// Identifier of the matched vector.
    pub id: K,

    /// Cosine distance between the query and the matched vector.
    /// Lower values indicate higher similarity.
    pub distance: f32,
}

/// Exact linear scan for the candidate closest to `query`.
///
/// Equal distances resolve to the lowest id so results are reproducible
/// regardless of candidate order. Returns `None` if there are no candidates.
pub fn nearest<'a, K, I>(query: &[f32], candidates: I) -> Option<Match<K>>
where
    K: Ord + Copy,
    I: IntoIterator<Item = (K, &'a [f32])>,
{
    let mut best: Option<Match<K>> = None;
    for (id, v) in candidates {
        let distance = cosine_distance(query, v);
        let better = match &best {
            None => true,
            Some(b) => distance < b.distance || (distance == b.distance && id < b.id),
        };
        if better {
            best = Some(Match { id, distance });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_picks_min() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let c = [0.9f32, 0.1];
        let m = nearest(&[0.8, 0.2], [(1u64, &a[..]), (2, &b[..]), (3, &c[..])]).unwrap();
        assert_eq!(m.id, 3);
    }

    #[test]
    fn test_nearest_tie_lowest_id() {
        let a = [1.0f32, 0.0];
        let m = nearest(&[1.0, 0.0], [(7u64, &a[..]), (2, &a[..]), (5, &a[..])]).unwrap();
        assert_eq!(m.id, 2);
        assert!(m.distance.abs() < 1e-6);
    }

    #[test]
    fn test_nearest_empty() {
        assert!(nearest::<u64, _>(&[1.0], std::iter::empty()).is_none());
    }
}
