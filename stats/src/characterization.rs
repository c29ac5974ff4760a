use crate::entropy::{self, BranchEntropy, BRANCH_HISTORY, MAX_SKIPPED_BITS};
use crate::Kernel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum, maximum and integer median of a sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spread {
    pub min: u64,
    pub max: u64,
    pub median: u64,
}

impl Spread {
    #[must_use]
    pub fn of(values: &[u64]) -> Self {
        Self {
            min: values.iter().copied().min().unwrap_or(0),
            max: values.iter().copied().max().unwrap_or(0),
            median: entropy::median(values),
        }
    }
}

/// Moments of the SIMD element-count distribution of instruction results.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimdWidths {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    /// Population standard deviation.
    pub stdev: f64,
}

/// Every derived metric of one kernel invocation, ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characterization {
    pub kernel_name: String,
    /// Opcode execution counts, descending, ties broken by mnemonic.
    pub opcode_counts: Vec<(String, u64)>,
    pub total_instruction_count: u64,
    /// Most-executed opcodes covering 90% of dynamic instructions.
    pub opcodes_for_90_percent: Vec<String>,
    /// Mean instruction distance between consecutive loads/stores.
    pub freedom_to_reorder: f64,
    /// Load + store label references per work-item.
    pub resource_pressure: f64,
    pub workitems: u64,
    pub granularity: f64,
    pub barriers_hit: u64,
    pub instructions_to_barrier: Spread,
    pub barriers_per_instruction: f64,
    pub instructions_per_workitem: Spread,
    pub simd: SimdWidths,
    /// Σ width × count over instruction results, the operand total.
    pub operand_sum: u64,
    pub instructions_per_operand: f64,
    pub memory_access_count: u64,
    /// Distinct addresses accessed.
    pub total_memory_footprint: u64,
    /// Distinct addresses covering 90% of accesses.
    pub footprint_for_90_percent: u64,
    pub global_address_entropy: f64,
    /// Entropy with 1..=10 low bits dropped; index 0 is one bit skipped.
    pub local_address_entropy: Vec<f64>,
    pub global_accesses: u64,
    pub local_accesses: u64,
    pub constant_accesses: u64,
    /// Percentage of classified accesses that hit local memory.
    pub relative_local_usage: f64,
    /// Percentage of classified accesses that hit constant memory.
    pub relative_constant_usage: f64,
    /// Outcome counts per branch line, descending, ties broken by line.
    pub branch_counts: Vec<(u32, u64)>,
    pub unique_branches: u64,
    pub branches_for_90_percent: u64,
    pub branch_entropy: BranchEntropy,
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<u64>() as f64 / values.len() as f64
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl Characterization {
    /// Reduce a kernel invocation's aggregate into its derived metrics.
    ///
    /// Every division guards its denominator, so degenerate aggregates (no
    /// instructions, no memory ops, zero work-items) yield zeroed metrics
    /// rather than NaN or infinities.
    #[must_use]
    pub fn from_kernel(kernel_name: &str, kernel: &Kernel) -> Self {
        let mut opcode_counts: Vec<(String, u64)> = kernel
            .compute_ops
            .iter()
            .map(|(op, &count)| (op.clone(), count))
            .collect();
        opcode_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total_instruction_count: u64 = opcode_counts.iter().map(|(_, count)| count).sum();
        let major = entropy::coverage_prefix(
            opcode_counts.iter().map(|(_, count)| *count),
            total_instruction_count,
            0.9,
        );
        let opcodes_for_90_percent = opcode_counts[..major]
            .iter()
            .map(|(op, _)| op.clone())
            .collect();

        let label_references: u64 = kernel
            .load_labels
            .values()
            .chain(kernel.store_labels.values())
            .sum();

        let mut widths: Vec<(u32, u64)> = kernel
            .instruction_width
            .iter()
            .map(|(&width, &count)| (width, count))
            .collect();
        widths.sort_unstable();
        let operand_sum: u64 = widths
            .iter()
            .map(|&(width, count)| u64::from(width) * count)
            .sum();
        let width_samples: u64 = widths.iter().map(|&(_, count)| count).sum();
        let simd = if widths.is_empty() {
            SimdWidths::default()
        } else {
            let simd_mean = operand_sum as f64 / width_samples as f64;
            let variance = widths
                .iter()
                .map(|&(width, count)| (f64::from(width) - simd_mean).powi(2) * count as f64)
                .sum::<f64>()
                / width_samples as f64;
            SimdWidths {
                min: widths.first().map_or(0, |&(width, _)| width),
                max: widths.last().map_or(0, |&(width, _)| width),
                mean: simd_mean,
                stdev: variance.sqrt(),
            }
        };

        let histograms = entropy::address_histograms(&kernel.memory_ops);
        let memory_access_count = kernel.memory_ops.len() as u64;
        let mut address_counts: Vec<(u64, u64)> = histograms[0]
            .iter()
            .map(|(&address, &count)| (address, count))
            .collect();
        address_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let footprint_for_90_percent = entropy::coverage_prefix(
            address_counts.iter().map(|&(_, count)| count),
            memory_access_count,
            0.9,
        ) as u64;
        let local_address_entropy = histograms[1..=MAX_SKIPPED_BITS]
            .iter()
            .map(|histogram| entropy::shannon_entropy(histogram, memory_access_count))
            .collect();

        let classified_accesses =
            kernel.global_accesses + kernel.local_accesses + kernel.constant_accesses;

        let mut branch_counts: Vec<(u32, u64)> = kernel
            .branch_ops
            .iter()
            .map(|(&line, history)| (line, history.len() as u64))
            .collect();
        branch_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total_branch_count: u64 = branch_counts.iter().map(|&(_, count)| count).sum();
        let branches_for_90_percent = entropy::coverage_prefix(
            branch_counts.iter().map(|&(_, count)| count),
            total_branch_count,
            0.9,
        ) as u64;

        Self {
            kernel_name: kernel_name.to_string(),
            total_instruction_count,
            opcodes_for_90_percent,
            freedom_to_reorder: mean(&kernel.instructions_between_load_store),
            resource_pressure: ratio(label_references as f64, kernel.threads_invoked as f64),
            workitems: kernel.threads_invoked,
            granularity: ratio(1.0, kernel.threads_invoked as f64),
            barriers_hit: kernel.barriers_hit,
            instructions_to_barrier: Spread::of(&kernel.instructions_to_barrier),
            barriers_per_instruction: ratio(
                (kernel.barriers_hit + kernel.threads_invoked) as f64,
                total_instruction_count as f64,
            ),
            instructions_per_workitem: Spread::of(&kernel.instructions_per_workitem),
            simd,
            operand_sum,
            instructions_per_operand: ratio(total_instruction_count as f64, operand_sum as f64),
            memory_access_count,
            total_memory_footprint: histograms[0].len() as u64,
            footprint_for_90_percent,
            global_address_entropy: entropy::shannon_entropy(&histograms[0], memory_access_count),
            local_address_entropy,
            global_accesses: kernel.global_accesses,
            local_accesses: kernel.local_accesses,
            constant_accesses: kernel.constant_accesses,
            relative_local_usage: ratio(
                kernel.local_accesses as f64 * 100.0,
                classified_accesses as f64,
            ),
            relative_constant_usage: ratio(
                kernel.constant_accesses as f64 * 100.0,
                classified_accesses as f64,
            ),
            unique_branches: branch_counts.len() as u64,
            branches_for_90_percent,
            branch_entropy: entropy::branch_entropy(&kernel.branch_ops),
            opcode_counts,
            branch_counts,
        }
    }

    /// CSV rows as `(metric, value)` pairs, in the canonical emission order.
    #[must_use]
    pub fn csv_rows(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = Vec::with_capacity(41);
        let mut row = |metric: &str, value: String| rows.push((metric.to_string(), value));

        row("opcode", self.opcodes_for_90_percent.len().to_string());
        row(
            "total instruction count",
            self.total_instruction_count.to_string(),
        );
        row("freedom to reorder", self.freedom_to_reorder.to_string());
        row("resource pressure", self.resource_pressure.to_string());
        row("workitems", self.workitems.to_string());
        row("operand sum", self.operand_sum.to_string());
        row("total # of barriers hit", self.barriers_hit.to_string());
        row(
            "min instructions to barrier",
            self.instructions_to_barrier.min.to_string(),
        );
        row(
            "max instructions to barrier",
            self.instructions_to_barrier.max.to_string(),
        );
        row(
            "median instructions to barrier",
            self.instructions_to_barrier.median.to_string(),
        );
        row(
            "min instructions executed by a work-item",
            self.instructions_per_workitem.min.to_string(),
        );
        row(
            "max instructions executed by a work-item",
            self.instructions_per_workitem.max.to_string(),
        );
        row(
            "median instructions executed by a work-item",
            self.instructions_per_workitem.median.to_string(),
        );
        row("max simd width", self.simd.max.to_string());
        row("mean simd width", self.simd.mean.to_string());
        row("stdev simd width", self.simd.stdev.to_string());
        row("granularity", self.granularity.to_string());
        row(
            "barriers per instruction",
            self.barriers_per_instruction.to_string(),
        );
        row(
            "instructions per operand",
            self.instructions_per_operand.to_string(),
        );
        row(
            "total memory footprint",
            self.total_memory_footprint.to_string(),
        );
        row(
            "90% memory footprint",
            self.footprint_for_90_percent.to_string(),
        );
        row(
            "global memory address entropy",
            self.global_address_entropy.to_string(),
        );
        for (skipped, entropy) in self.local_address_entropy.iter().enumerate() {
            row(
                &format!(
                    "local memory address entropy -- {} LSBs skipped",
                    skipped + 1
                ),
                entropy.to_string(),
            );
        }
        row(
            "total global memory accessed",
            self.global_accesses.to_string(),
        );
        row(
            "total local memory accessed",
            self.local_accesses.to_string(),
        );
        row(
            "total constant memory accessed",
            self.constant_accesses.to_string(),
        );
        row(
            "relative local memory usage",
            self.relative_local_usage.to_string(),
        );
        row(
            "relative constant memory usage",
            self.relative_constant_usage.to_string(),
        );
        row(
            "total unique branch instructions",
            self.unique_branches.to_string(),
        );
        row(
            "90% branch instructions",
            self.branches_for_90_percent.to_string(),
        );
        row(
            "branch entropy (yokota)",
            self.branch_entropy.yokota_per_workload.to_string(),
        );
        row(
            "branch entropy (average linear)",
            self.branch_entropy.average_linear.to_string(),
        );
        rows
    }
}

impl fmt::Display for Characterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# Architecture-Independent Workload Characterization of kernel: {}",
            self.kernel_name
        )?;

        writeln!(f, "\n## Compute\n")?;
        writeln!(f, "|{:<20}|{:>12}|", "Opcode", "count")?;
        writeln!(f, "|--------------------|-----------:|")?;
        for (op, count) in &self.opcode_counts {
            writeln!(f, "|{op:<20}|{count:>12}|")?;
        }
        writeln!(
            f,
            "\nunique opcodes required to cover 90% of dynamic instructions: {}",
            self.opcodes_for_90_percent.join(", ")
        )?;
        writeln!(
            f,
            "\nnum unique opcodes required to cover 90% of dynamic instructions: {}",
            self.opcodes_for_90_percent.len()
        )?;
        writeln!(
            f,
            "\nTotal Instruction Count: {}",
            self.total_instruction_count
        )?;

        writeln!(f, "\n## Parallelism")?;
        writeln!(f, "\n### Utilization\n")?;
        writeln!(f, "Freedom to Reorder: {:.4}", self.freedom_to_reorder)?;
        writeln!(f, "\nResource Pressure: {:.4}", self.resource_pressure)?;

        writeln!(f, "\n### Thread-Level Parallelism\n")?;
        writeln!(f, "Work-items: {}", self.workitems)?;
        writeln!(f, "\nGranularity: {:.4}", self.granularity)?;
        writeln!(f, "\nTotal Barriers Hit: {}", self.barriers_hit)?;
        writeln!(
            f,
            "\nInstructions to Barrier (min/max/median): {}/{}/{}",
            self.instructions_to_barrier.min,
            self.instructions_to_barrier.max,
            self.instructions_to_barrier.median
        )?;
        writeln!(
            f,
            "\nBarriers per Instruction: {:.4}",
            self.barriers_per_instruction
        )?;

        writeln!(f, "\n### Work Distribution\n")?;
        writeln!(
            f,
            "Instructions per Thread (min/max/median): {}/{}/{}",
            self.instructions_per_workitem.min,
            self.instructions_per_workitem.max,
            self.instructions_per_workitem.median
        )?;

        writeln!(f, "\n### Data Parallelism\n")?;
        writeln!(
            f,
            "SIMD Width (min/max/mean/stdev): {}/{}/{:.4}/{:.4}",
            self.simd.min, self.simd.max, self.simd.mean, self.simd.stdev
        )?;
        writeln!(
            f,
            "\nInstructions per Operand: {:.4}",
            self.instructions_per_operand
        )?;

        writeln!(f, "\n## Memory")?;
        writeln!(f, "\n### Memory Footprint\n")?;
        writeln!(f, "num memory accesses: {}", self.memory_access_count)?;
        writeln!(
            f,
            "\nTotal Memory Footprint -- num unique memory addresses accessed: {}",
            self.total_memory_footprint
        )?;
        writeln!(
            f,
            "\n90% of memory accesses: {}",
            (self.memory_access_count as f64 * 0.9).ceil() as u64
        )?;
        writeln!(
            f,
            "\n90% Memory Footprint -- num unique memory addresses that cover 90% of memory accesses: {}",
            self.footprint_for_90_percent
        )?;

        writeln!(f, "\n### Memory Entropy\n")?;
        writeln!(
            f,
            "Global Memory Address Entropy -- measure of the randomness of memory addresses: {:.4}",
            self.global_address_entropy
        )?;
        writeln!(
            f,
            "\nLocal Memory Address Entropy -- measure of the spatial locality of memory addresses\n"
        )?;
        writeln!(f, "|{:>12}|{:>8}|", "LSBs skipped", "Entropy")?;
        writeln!(f, "|-----------:|-------:|")?;
        for (skipped, entropy) in self.local_address_entropy.iter().enumerate() {
            writeln!(f, "|{:>12}|{:>8.4}|", skipped + 1, entropy)?;
        }

        writeln!(
            f,
            "\n### Memory Diversity -- Usage of local and constant memory relative to global memory\n"
        )?;
        writeln!(f, "num global memory accesses: {}", self.global_accesses)?;
        writeln!(f, "\nnum local memory accesses: {}", self.local_accesses)?;
        writeln!(
            f,
            "\nnum constant memory accesses: {}",
            self.constant_accesses
        )?;
        writeln!(
            f,
            "\n% local memory accesses (local/total): {:.4}",
            self.relative_local_usage
        )?;
        writeln!(
            f,
            "\n% constant memory accesses (constant/total): {:.4}",
            self.relative_constant_usage
        )?;

        writeln!(f, "\n## Control\n")?;
        writeln!(
            f,
            "Unique Branch Instructions -- Total number of unique branch instructions to cover 90% of the branches\n"
        )?;
        writeln!(f, "|{:<14}|{:>23}|", "Branch At Line", "Count (hit and miss)")?;
        writeln!(f, "|--------------|----------------------:|")?;
        for (line, count) in &self.branch_counts {
            writeln!(f, "|{line:<14}|{count:>23}|")?;
        }
        writeln!(
            f,
            "\nNumber of unique branches that cover 90% of all branch instructions: {}",
            self.branches_for_90_percent
        )?;

        writeln!(
            f,
            "\n### Branch Entropy -- measure of the randomness of branch behaviour, representing branch predictability\n"
        )?;
        writeln!(f, "Using a branch history of {BRANCH_HISTORY}")?;
        writeln!(f, "\nYokota Branch Entropy: {:.4}", self.branch_entropy.yokota)?;
        writeln!(
            f,
            "\nYokota Branch Entropy per Workload: {:.4}",
            self.branch_entropy.yokota_per_workload
        )?;
        write!(
            f,
            "\nAverage Linear Branch Entropy: {:.4}",
            self.branch_entropy.average_linear
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Characterization, Spread};
    use crate::Kernel;
    use similar_asserts as diff;

    fn three_adds() -> Kernel {
        let mut kernel = Kernel::default();
        kernel.compute_ops.insert("add".to_string(), 3);
        kernel.instruction_width.insert(1, 3);
        kernel.instructions_to_barrier.push(3);
        kernel.instructions_per_workitem.push(3);
        kernel.threads_invoked = 1;
        kernel
    }

    #[test]
    fn characterizes_a_single_workitem_of_three_adds() {
        let chr = Characterization::from_kernel("vecadd", &three_adds());
        diff::assert_eq!(have: chr.total_instruction_count, want: 3);
        diff::assert_eq!(
            have: chr.opcodes_for_90_percent,
            want: vec!["add".to_string()]
        );
        diff::assert_eq!(have: chr.workitems, want: 1);
        diff::assert_eq!(have: chr.granularity, want: 1.0);
        diff::assert_eq!(have: chr.simd.min, want: 1);
        diff::assert_eq!(have: chr.simd.max, want: 1);
        diff::assert_eq!(have: chr.simd.mean, want: 1.0);
        diff::assert_eq!(have: chr.simd.stdev, want: 0.0);
        diff::assert_eq!(have: chr.operand_sum, want: 3);
        diff::assert_eq!(have: chr.instructions_per_operand, want: 1.0);
    }

    #[test]
    fn barrier_spread_and_rate() {
        // two work-items, each 4 instructions, a barrier, then 2 more
        let mut kernel = Kernel::default();
        kernel.compute_ops.insert("add".to_string(), 12);
        kernel.instruction_width.insert(1, 12);
        kernel.instructions_to_barrier = vec![4, 4, 2, 2];
        kernel.instructions_per_workitem = vec![6, 6];
        kernel.threads_invoked = 2;
        kernel.barriers_hit = 2;

        let chr = Characterization::from_kernel("stencil", &kernel);
        diff::assert_eq!(
            have: chr.instructions_to_barrier,
            want: Spread { min: 2, max: 4, median: 3 }
        );
        assert!(approx::abs_diff_eq!(
            chr.barriers_per_instruction,
            4.0 / 12.0,
            epsilon = 1e-12
        ));
        diff::assert_eq!(
            have: chr.instructions_per_workitem,
            want: Spread { min: 6, max: 6, median: 6 }
        );
    }

    #[test]
    fn memory_footprint_and_entropy() {
        let mut kernel = Kernel::default();
        kernel.memory_ops = vec![0x1000, 0x1000, 0x1000, 0x1000, 0x2000];
        kernel.global_accesses = 4;
        kernel.local_accesses = 1;

        let chr = Characterization::from_kernel("copy", &kernel);
        diff::assert_eq!(have: chr.memory_access_count, want: 5);
        diff::assert_eq!(have: chr.total_memory_footprint, want: 2);
        // ceil(0.9 * 5) = 5 accesses to cover, needing both addresses
        diff::assert_eq!(have: chr.footprint_for_90_percent, want: 2);
        assert!(approx::abs_diff_eq!(
            chr.global_address_entropy,
            0.721_928,
            epsilon = 1e-5
        ));
        diff::assert_eq!(have: chr.local_address_entropy.len(), want: 10);
        assert!(approx::abs_diff_eq!(chr.relative_local_usage, 20.0, epsilon = 1e-12));
        diff::assert_eq!(have: chr.relative_constant_usage, want: 0.0);
    }

    #[test]
    fn identical_addresses_have_zero_entropy_and_unit_footprint() {
        let mut kernel = Kernel::default();
        kernel.memory_ops = vec![0xbeef; 8];
        let chr = Characterization::from_kernel("fill", &kernel);
        diff::assert_eq!(have: chr.global_address_entropy, want: 0.0);
        diff::assert_eq!(have: chr.footprint_for_90_percent, want: 1);
    }

    #[test]
    fn a_degenerate_kernel_yields_zeroed_metrics() {
        let chr = Characterization::from_kernel("empty", &Kernel::default());
        diff::assert_eq!(have: chr.total_instruction_count, want: 0);
        diff::assert_eq!(have: chr.freedom_to_reorder, want: 0.0);
        diff::assert_eq!(have: chr.resource_pressure, want: 0.0);
        diff::assert_eq!(have: chr.granularity, want: 0.0);
        diff::assert_eq!(have: chr.barriers_per_instruction, want: 0.0);
        diff::assert_eq!(have: chr.instructions_per_operand, want: 0.0);
        diff::assert_eq!(have: chr.relative_local_usage, want: 0.0);
        diff::assert_eq!(have: chr.branch_entropy.average_linear, want: 0.0);
        for (_, value) in chr.csv_rows() {
            assert!(value.parse::<f64>().expect("numeric cell").is_finite());
        }
    }

    #[test]
    fn csv_rows_follow_the_canonical_order() {
        let chr = Characterization::from_kernel("vecadd", &three_adds());
        let rows = chr.csv_rows();
        diff::assert_eq!(have: rows.len(), want: 41);
        diff::assert_eq!(have: rows[0].clone(), want: ("opcode".to_string(), "1".to_string()));
        diff::assert_eq!(
            have: rows[1].clone(),
            want: ("total instruction count".to_string(), "3".to_string())
        );
        diff::assert_eq!(have: rows[4].0.as_str(), want: "workitems");
        diff::assert_eq!(
            have: rows[21].0.as_str(),
            want: "global memory address entropy"
        );
        diff::assert_eq!(
            have: rows[22].0.as_str(),
            want: "local memory address entropy -- 1 LSBs skipped"
        );
        diff::assert_eq!(
            have: rows[31].0.as_str(),
            want: "local memory address entropy -- 10 LSBs skipped"
        );
        diff::assert_eq!(
            have: rows[40].0.as_str(),
            want: "branch entropy (average linear)"
        );
    }

    #[test]
    fn report_carries_the_section_headings() {
        let report = Characterization::from_kernel("vecadd", &three_adds()).to_string();
        assert!(report
            .starts_with("# Architecture-Independent Workload Characterization of kernel: vecadd"));
        for heading in [
            "## Compute",
            "### Utilization",
            "### Thread-Level Parallelism",
            "### Work Distribution",
            "### Data Parallelism",
            "### Memory Footprint",
            "### Memory Entropy",
            "### Memory Diversity",
            "## Control",
            "### Branch Entropy",
        ] {
            assert!(report.contains(heading), "missing heading {heading:?}");
        }
        assert!(report.contains("Total Instruction Count: 3"));
        assert!(report.contains("|add                 |           3|"));
    }
}
