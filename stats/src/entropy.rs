use std::collections::HashMap;

/// Highest number of low address bits dropped when building the
/// spatial-locality histograms; levels run from 0 to this bound inclusive.
pub const MAX_SKIPPED_BITS: usize = 10;

/// Branch history window length. Window patterns are packed into a `u16`,
/// so the window is exactly the width of the pattern word.
pub const BRANCH_HISTORY: usize = 16;

/// Count accesses per address at every shift level 0..=[`MAX_SKIPPED_BITS`].
///
/// Level k maps `address >> k` to its access count; level 0 is the exact
/// address histogram. Every level carries the same total mass.
#[must_use]
pub fn address_histograms(addresses: &[u64]) -> Vec<HashMap<u64, u64>> {
    let mut histograms = vec![HashMap::new(); MAX_SKIPPED_BITS + 1];
    for &address in addresses {
        for (nskip, histogram) in histograms.iter_mut().enumerate() {
            *histogram.entry(address >> nskip).or_insert(0) += 1;
        }
    }
    histograms
}

/// Shannon entropy of a histogram, with each probability normalized by
/// `total` rather than the histogram's own mass.
///
/// Keys are visited in sorted order so that repeated runs accumulate in the
/// same order and emit bit-identical values.
#[must_use]
pub fn shannon_entropy(histogram: &HashMap<u64, u64>, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let mut keys: Vec<_> = histogram.keys().copied().collect();
    keys.sort_unstable();
    let total = total as f64;
    let mut entropy = 0.0;
    for key in keys {
        let probability = histogram[&key] as f64 / total;
        entropy -= probability * probability.log2();
    }
    entropy
}

/// Smallest prefix of descending-sorted `counts` whose cumulative sum
/// reaches ⌈coverage × total⌉, as an element count.
#[must_use]
pub fn coverage_prefix<I>(counts: I, total: u64, coverage: f64) -> usize
where
    I: IntoIterator<Item = u64>,
{
    let target = (total as f64 * coverage).ceil() as u64;
    let mut covered = 0;
    let mut taken = 0;
    for count in counts {
        if covered >= target {
            break;
        }
        covered += count;
        taken += 1;
    }
    taken
}

/// Median with integer arithmetic: the mean of the two middle elements for
/// even lengths, truncating the division. Empty input yields 0.
#[must_use]
pub fn median(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    } else {
        sorted[n / 2]
    }
}

/// Branch-predictability entropies over an m = [`BRANCH_HISTORY`] window.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BranchEntropy {
    /// Yokota entropy: −Σ c·p·log₂(p) over distinct window patterns, where
    /// p is the taken-rate *within* the pattern and c its occurrence count.
    pub yokota: f64,
    /// The same sum without the occurrence weighting.
    pub yokota_per_workload: f64,
    /// Mean of 2·min(p, 1−p) over all windows.
    pub average_linear: f64,
}

/// Slide an m-wide window over every branch's history, count distinct
/// taken/not-taken patterns, and reduce them to the three entropies.
///
/// Branches with fewer than m recorded outcomes are excluded. The per-window
/// probability is the pattern's own taken-rate, popcount / m, not the
/// empirical pattern frequency.
#[must_use]
pub fn branch_entropy(branch_ops: &HashMap<u32, Vec<bool>>) -> BranchEntropy {
    let mut entropy = BranchEntropy::default();
    let mut windows = 0u64;
    let mut linear_sum = 0.0;

    let mut lines: Vec<_> = branch_ops.keys().copied().collect();
    lines.sort_unstable();

    for line in lines {
        let history = &branch_ops[&line];
        if history.len() < BRANCH_HISTORY {
            continue;
        }

        let mut patterns: HashMap<u16, u64> = HashMap::new();
        let mut pattern = 0u16;
        for (i, &taken) in history.iter().enumerate() {
            pattern = (pattern << 1) | u16::from(taken);
            if i + 1 >= BRANCH_HISTORY {
                *patterns.entry(pattern).or_insert(0) += 1;
            }
        }

        let mut distinct: Vec<_> = patterns.into_iter().collect();
        distinct.sort_unstable();
        for (pattern, occurrences) in distinct {
            let taken_rate = f64::from(pattern.count_ones()) / BRANCH_HISTORY as f64;
            if taken_rate != 0.0 {
                entropy.yokota -= occurrences as f64 * taken_rate * taken_rate.log2();
                entropy.yokota_per_workload -= taken_rate * taken_rate.log2();
            }
            linear_sum += occurrences as f64 * 2.0 * taken_rate.min(1.0 - taken_rate);
            windows += occurrences;
        }
    }

    if windows > 0 {
        entropy.average_linear = linear_sum / windows as f64;
    }
    entropy
}
