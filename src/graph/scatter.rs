//! Row-offset computation for batched per-row scatter, plus permutation
//! helpers.
//!
//! When per-row results are computed in a batched order (for example rows
//! sorted by degree for load balancing), each worker needs to know where in
//! a shared flat buffer its row's output belongs. `calculate_starts` turns
//! the reference matrix's row pointers and the batch order into cumulative
//! offsets, so the write phase needs no synchronization.

use std::cmp::Ordering;

/// Cumulative output offsets for the rows in `ixs`, in subset order.
///
/// `starts[0] == 0` and `starts[j]` is the total non-zero count of the first
/// `j` rows of the subset, so row `ixs[j]`'s output occupies
/// `starts[j]..starts[j + 1]` of the flat buffer. The returned vector has
/// length `ixs.len() + 1`.
pub fn calculate_starts(indptr: &[usize], ixs: &[usize]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(ixs.len() + 1);
    let mut total = 0;
    starts.push(0);
    for &row in ixs {
        total += indptr[row + 1] - indptr[row];
        starts.push(total);
    }
    starts
}

/// Indices that would sort `values` ascending (stable).
pub fn argsort<T: PartialOrd>(values: &[T]) -> Vec<usize> {
    let mut ixs: Vec<usize> = (0..values.len()).collect();
    ixs.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    ixs
}

/// Inverse of a permutation: `inv[perm[k]] == k`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    argsort(perm)
}

/// Reorder `values` so that output position `k` holds `values[perm[k]]`.
pub fn apply_permutation<T: Clone>(values: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().map(|&i| values[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_identity_subset() {
        // Matches the original cumulative pattern over all rows.
        let indptr = [0, 2, 5, 7];
        assert_eq!(calculate_starts(&indptr, &[0, 1, 2]), vec![0, 2, 5, 7]);
    }

    #[test]
    fn test_starts_reordered_subset() {
        // Row 2 has 2 nnz, row 0 has 2 nnz.
        let indptr = [0, 2, 5, 7];
        assert_eq!(calculate_starts(&indptr, &[2, 0]), vec![0, 2, 4]);
    }

    #[test]
    fn test_starts_empty_subset() {
        let indptr = [0, 2, 5, 7];
        assert_eq!(calculate_starts(&indptr, &[]), vec![0]);
    }

    #[test]
    fn test_starts_rows_with_no_entries() {
        let indptr = [0, 0, 3, 3];
        assert_eq!(calculate_starts(&indptr, &[0, 1, 2]), vec![0, 0, 3, 3]);
    }

    #[test]
    fn test_argsort() {
        assert_eq!(argsort(&[3.0, 1.0, 2.0]), vec![1, 2, 0]);
        assert_eq!(argsort(&[5usize, 2, 9, 2]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_permutation_round_trip() {
        let values = vec![10, 20, 30, 40, 50];
        let perm = vec![3, 0, 4, 1, 2];
        let permuted = apply_permutation(&values, &perm);
        let restored = apply_permutation(&permuted, &invert_permutation(&perm));
        assert_eq!(restored, values);
    }

    #[test]
    fn test_invert_permutation() {
        let perm = vec![2, 0, 1];
        let inv = invert_permutation(&perm);
        assert_eq!(inv, vec![1, 2, 0]);
        for (k, &p) in perm.iter().enumerate() {
            assert_eq!(inv[p], k);
        }
    }
}
