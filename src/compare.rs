use log::debug;
use rayon::prelude::*;
use std::collections::HashSet;

/// Jaccard similarity of two hash sets, identified by index into the input.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSimilarity {
    pub a: usize,
    pub b: usize,
    pub intersection_count: usize,
    pub union_count: usize,
    pub jaccard_index: f64,
}

pub fn jaccard(set1: &HashSet<u64>, set2: &HashSet<u64>) -> (usize, usize, f64) {
    let intersection_count = set1.intersection(set2).count();
    let union_count = set1.len() + set2.len() - intersection_count;
    let jaccard_index = if union_count > 0 {
        intersection_count as f64 / union_count as f64
    } else {
        0.0
    };
    (intersection_count, union_count, jaccard_index)
}

/// Similarity for every unordered pair `(i, j)` with `i < j` that
/// `include` accepts.
pub fn all_pairwise<F>(sets: &[&HashSet<u64>], include: F) -> Vec<PairSimilarity>
where
    F: Fn(usize, usize) -> bool,
{
    let pairs = (0..sets.len())
        .flat_map(|i| ((i + 1)..sets.len()).map(move |j| (i, j)))
        .filter(|(i, j)| include(*i, *j))
        .collect::<Vec<(_, _)>>();
    debug!("comparing {} pairs", pairs.len());

    let mut similarities: Vec<PairSimilarity> = pairs
        .into_par_iter()
        .map(|(a, b)| {
            let (intersection_count, union_count, jaccard_index) = jaccard(sets[a], sets[b]);
            PairSimilarity {
                a,
                b,
                intersection_count,
                union_count,
                jaccard_index,
            }
        })
        .collect();

    similarities.sort_by(|x, y| (x.a, x.b).cmp(&(y.a, y.b)));
    similarities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard() {
        let a: HashSet<u64> = [1, 2, 3, 4].into_iter().collect();
        let b: HashSet<u64> = [3, 4, 5, 6].into_iter().collect();
        let (i, u, j) = jaccard(&a, &b);
        assert_eq!((i, u), (2, 6));
        assert!((j - 1.0 / 3.0).abs() < 1e-9);

        let empty = HashSet::new();
        assert_eq!(jaccard(&empty, &empty).2, 0.0);
    }

    #[test]
    fn test_all_pairwise_respects_filter() {
        let a: HashSet<u64> = [1, 2].into_iter().collect();
        let b: HashSet<u64> = [2, 3].into_iter().collect();
        let c: HashSet<u64> = [9].into_iter().collect();
        let sets = vec![&a, &b, &c];

        let all = all_pairwise(&sets, |_, _| true);
        assert_eq!(all.len(), 3);
        assert_eq!((all[0].a, all[0].b), (0, 1));

        let some = all_pairwise(&sets, |i, _| i == 0);
        assert_eq!(some.len(), 2);
        assert_eq!(some[1].jaccard_index, 0.0);
    }
}
