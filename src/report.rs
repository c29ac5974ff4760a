use crate::fs;
use crate::transfers::TransferSummary;
use color_eyre::eyre;
use std::path::{Path, PathBuf};

/// Smallest-suffix path `<dir>/<stem>_<n>.csv` that does not yet exist.
///
/// Probe-then-create races under contention; kernel ends are serialized by
/// the host, so the window is tolerated.
#[must_use]
pub fn sequenced_csv_path(dir: &Path, stem: &str) -> PathBuf {
    let mut count = 0usize;
    loop {
        let path = dir.join(format!("{stem}_{count}.csv"));
        if !path.exists() {
            return path;
        }
        count += 1;
    }
}

/// Write a kernel's characterization as `aiwc_<kernel>_<n>.csv`.
pub fn write_kernel_csv(
    dir: &Path,
    characterization: &stats::Characterization,
) -> eyre::Result<PathBuf> {
    let path = sequenced_csv_path(dir, &format!("aiwc_{}", characterization.kernel_name));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(fs::open_writable(&path)?);
    writer.write_record(["metric", "count"])?;
    for (metric, value) in characterization.csv_rows() {
        writer.write_record([metric.as_str(), value.as_str()])?;
    }
    writer.flush()?;
    Ok(path)
}

/// Write the per-kernel transfer counts as `aiwc_memory_transfers_<n>.csv`.
pub fn write_transfers_csv(dir: &Path, summary: &TransferSummary) -> eyre::Result<PathBuf> {
    let path = sequenced_csv_path(dir, "aiwc_memory_transfers");
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(fs::open_writable(&path)?);
    writer.write_record(["metric", "kernel", "count"])?;
    for row in summary.csv_rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}
