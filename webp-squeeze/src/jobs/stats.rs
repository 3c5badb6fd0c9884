//! Dashboard figures.

use super::{HistoryEntry, Progress};
use crate::catalog::LibrarySummary;
use serde::{Deserialize, Serialize};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Human-readable size: `x.xx MB` from one MiB upwards, otherwise `x.xx KB`.
///
/// # Example
///
/// ```rust
/// use webp_squeeze::jobs::format_bytes;
///
/// assert_eq!(format_bytes(512), "0.50 KB");
/// assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    }
}

/// Figures shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Convertible items in the library.
    pub total_items: u64,
    /// Items with a WebP derivative.
    pub optimized_items: u64,
    /// Items whose last attempt failed.
    pub failed_items: u64,
    /// Items still lacking a derivative.
    pub unoptimized_items: u64,
    /// Bytes saved by every logged run.
    pub total_saved_bytes: u64,
    /// `total_saved_bytes`, formatted.
    pub total_saved: String,
    /// Most recent run, if any.
    pub last_run: Option<HistoryEntry>,
    /// Bytes saved by the most recent run, formatted.
    pub last_run_saved: Option<String>,
    /// Job currently in the slot.
    pub active_job: Option<Progress>,
}

impl DashboardStats {
    /// Assemble the dashboard from its sources.
    #[must_use]
    pub fn new(
        library: LibrarySummary,
        total_saved_bytes: u64,
        last_run: Option<HistoryEntry>,
        active_job: Option<Progress>,
    ) -> Self {
        Self {
            total_items: library.total,
            optimized_items: library.optimized,
            failed_items: library.failed,
            unoptimized_items: library.unoptimized(),
            total_saved_bytes,
            total_saved: format_bytes(total_saved_bytes),
            last_run_saved: last_run.as_ref().map(|entry| format_bytes(entry.saved_bytes)),
            last_run,
            active_job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_threshold() {
        assert_eq!(format_bytes(0), "0.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(MIB - 1), "1024.00 KB");
        assert_eq!(format_bytes(MIB), "1.00 MB");
        assert_eq!(format_bytes(5 * MIB + MIB / 4), "5.25 MB");
    }

    #[test]
    fn test_stats_without_runs() {
        let stats = DashboardStats::new(
            LibrarySummary {
                total: 4,
                optimized: 1,
                failed: 1,
            },
            0,
            None,
            None,
        );
        assert_eq!(stats.unoptimized_items, 3);
        assert_eq!(stats.total_saved, "0.00 KB");
        assert!(stats.last_run_saved.is_none());
    }
}
