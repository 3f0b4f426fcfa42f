use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::ClassifyError;

/// Row positions of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Positions of each class label, in input order.
fn class_members(y: &[u8]) -> [Vec<usize>; 2] {
    let mut members = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        members[usize::from(label == 1)].push(i);
    }
    members
}

/// Split `n_total` items into per-class counts proportional to `sizes`,
/// handing leftover units to the largest fractional remainders.
fn allocate(sizes: &[usize], n_total: usize) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    let exact: Vec<f64> = sizes
        .iter()
        .map(|&s| s as f64 * n_total as f64 / n as f64)
        .collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(sizes[b].cmp(&sizes[a]))
    });
    let mut left = n_total - counts.iter().sum::<usize>();
    for &c in order.iter().cycle() {
        if left == 0 {
            break;
        }
        if counts[c] < sizes[c] {
            counts[c] += 1;
            left -= 1;
        }
    }
    counts
}

/// Stratified train/test split of 0/1 labels.
///
/// The test partition holds `ceil(test_size * n)` rows, divided between the
/// classes in proportion to their sizes. Rows are drawn from each class after
/// a seeded shuffle, so the same seed always yields the same partition. Both
/// partitions are returned in ascending row order.
pub fn train_test_split(y: &[u8], test_size: f64, seed: u64) -> Result<Split, ClassifyError> {
    let n = y.len();
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ClassifyError::Split(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let members = class_members(y);
    if members.iter().any(|m| m.len() < 2) {
        return Err(ClassifyError::Split(format!(
            "each class needs at least 2 samples, got {} negatives and {} positives",
            members[0].len(),
            members[1].len()
        )));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test < 2 || n_test > n - 2 {
        return Err(ClassifyError::Split(format!(
            "test size {n_test} leaves no room for both classes in {n} samples"
        )));
    }

    let sizes = [members[0].len(), members[1].len()];
    let test_counts = allocate(&sizes, n_test);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(n - n_test),
        test: Vec::with_capacity(n_test),
    };
    for (class, mut rows) in members.into_iter().enumerate() {
        rows.shuffle(&mut rng);
        let (test, train) = rows.split_at(test_counts[class]);
        split.test.extend_from_slice(test);
        split.train.extend_from_slice(train);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Stratified k-fold partition without shuffling.
///
/// Each class is cut, in input order, into `k` contiguous chunks whose sizes
/// differ by at most one; fold `i` tests on chunk `i` of every class.
pub fn stratified_k_fold(y: &[u8], k: usize) -> Result<Vec<Split>, ClassifyError> {
    let members = class_members(y);
    if k < 2 {
        return Err(ClassifyError::Split(format!("need at least 2 folds, got {k}")));
    }
    if let Some(small) = members.iter().find(|m| m.len() < k) {
        return Err(ClassifyError::Split(format!(
            "a class has only {} members, fewer than {k} folds",
            small.len()
        )));
    }

    let mut fold_of = vec![0usize; y.len()];
    for rows in &members {
        let base = rows.len() / k;
        let extra = rows.len() % k;
        let mut pos = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            for &row in &rows[pos..pos + size] {
                fold_of[row] = fold;
            }
            pos += size;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| fold_of[i] == fold);
            Split { train, test }
        })
        .collect())
}
