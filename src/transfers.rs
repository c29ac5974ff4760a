use itertools::Itertools;
use serde::Serialize;
use std::fmt;

pub const HOST_TO_DEVICE: &str = "transfer: host to device";
pub const DEVICE_TO_HOST: &str = "transfer: device to host";

/// Host↔device copy log, kept for the plugin lifetime.
///
/// Applications usually write their buffers before enqueueing the kernel
/// that consumes them, so host-to-device copies are first tagged with the
/// last known kernel name and the next kernel enqueue retroactively claims
/// every copy seen since the previous one. Device-to-host copies keep the
/// last-named kernel and are never relabeled.
#[derive(Debug, Default)]
pub struct TransferLog {
    host_to_device: Vec<String>,
    device_to_host: Vec<String>,
    unclaimed_host_to_device: usize,
    last_kernel: String,
}

impl TransferLog {
    /// A host-side write into a device buffer.
    pub fn host_write(&mut self) {
        self.host_to_device.push(self.last_kernel.clone());
        self.unclaimed_host_to_device += 1;
    }

    /// A host-side read out of a device buffer.
    pub fn host_read(&mut self) {
        self.device_to_host.push(self.last_kernel.clone());
    }

    /// A kernel enqueue: claim the pending host-to-device copies for it.
    pub fn kernel_enqueued(&mut self, name: &str) {
        self.last_kernel = name.to_owned();
        let claimed = self.host_to_device.len() - self.unclaimed_host_to_device;
        for entry in &mut self.host_to_device[claimed..] {
            entry.clear();
            entry.push_str(name);
        }
        self.unclaimed_host_to_device = 0;
    }

    #[must_use]
    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            host_to_device: per_kernel_counts(&self.host_to_device),
            device_to_host: per_kernel_counts(&self.device_to_host),
        }
    }
}

/// Count copies per distinct kernel name, in first-appearance order.
fn per_kernel_counts(copies: &[String]) -> Vec<(String, u64)> {
    copies
        .iter()
        .unique()
        .map(|kernel| {
            let count = copies.iter().filter(|name| *name == kernel).count() as u64;
            (kernel.clone(), count)
        })
        .collect()
}

/// Per-kernel transfer counts, ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub host_to_device: Vec<(String, u64)>,
    pub device_to_host: Vec<(String, u64)>,
}

#[derive(Debug, Serialize)]
pub struct CsvRow {
    pub metric: &'static str,
    pub kernel: String,
    pub count: u64,
}

impl TransferSummary {
    #[must_use]
    pub fn csv_rows(&self) -> Vec<CsvRow> {
        self.host_to_device
            .iter()
            .map(|(kernel, count)| CsvRow {
                metric: HOST_TO_DEVICE,
                kernel: kernel.clone(),
                count: *count,
            })
            .chain(self.device_to_host.iter().map(|(kernel, count)| CsvRow {
                metric: DEVICE_TO_HOST,
                kernel: kernel.clone(),
                count: *count,
            }))
            .collect()
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "+-------------------------------------------------------------------------------------------------------+")?;
        writeln!(f, "|Memory Transfers -- statistics around host to device and device to host memory transfers               |")?;
        writeln!(f, "+=======================================================================================================+")?;
        writeln!(f, "Total Host To Device Transfers (#) for kernel:")?;
        for (kernel, count) in &self.host_to_device {
            writeln!(f, "\t{kernel}: {count}")?;
        }
        writeln!(f, "Total Device To Host Transfers (#) for kernel:")?;
        for (kernel, count) in &self.device_to_host {
            writeln!(f, "\t{kernel}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TransferLog;
    use similar_asserts as diff;

    #[test]
    fn stores_before_an_enqueue_are_claimed_by_the_kernel() {
        let mut log = TransferLog::default();
        log.host_write();
        log.host_write();
        log.kernel_enqueued("K");
        log.host_read();

        let summary = log.summary();
        diff::assert_eq!(have: summary.host_to_device, want: vec![("K".to_string(), 2)]);
        diff::assert_eq!(have: summary.device_to_host, want: vec![("K".to_string(), 1)]);
    }

    #[test]
    fn only_unclaimed_stores_are_relabeled() {
        let mut log = TransferLog::default();
        log.host_write();
        log.kernel_enqueued("first");
        log.host_write();
        log.kernel_enqueued("second");

        let summary = log.summary();
        diff::assert_eq!(
            have: summary.host_to_device,
            want: vec![("first".to_string(), 1), ("second".to_string(), 1)]
        );
    }

    #[test]
    fn interleaved_kernels_still_get_one_row_each() {
        let mut log = TransferLog::default();
        log.kernel_enqueued("a");
        log.host_read();
        log.kernel_enqueued("b");
        log.host_read();
        log.kernel_enqueued("a");
        log.host_read();

        let summary = log.summary();
        diff::assert_eq!(
            have: summary.device_to_host,
            want: vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn csv_rows_pair_metric_and_kernel() {
        let mut log = TransferLog::default();
        log.kernel_enqueued("K");
        log.host_write();
        log.kernel_enqueued("K");
        log.host_read();

        let rows = log.summary().csv_rows();
        diff::assert_eq!(have: rows.len(), want: 2);
        diff::assert_eq!(have: rows[0].metric, want: super::HOST_TO_DEVICE);
        diff::assert_eq!(have: rows[0].kernel.as_str(), want: "K");
        diff::assert_eq!(have: rows[1].metric, want: super::DEVICE_TO_HOST);
    }
}
