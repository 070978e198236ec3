//! Operation counters
//!
//! The action provider records every conversion, analysis and batch; the
//! readable-item provider publishes a snapshot at
//! `cad://statistics/recent-operations`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::formats::{ExportFormat, NativeKind};

#[derive(Debug, Default)]
struct Counters {
    conversions: u64,
    failed_conversions: u64,
    analyses: u64,
    batch_operations: u64,
    formats: BTreeMap<ExportFormat, u64>,
    file_types: BTreeMap<NativeKind, u64>,
    last_operation: Option<DateTime<Utc>>,
}

/// Thread-safe operation counters for one server process
#[derive(Debug)]
pub struct OperationStats {
    started: DateTime<Utc>,
    counters: Mutex<Counters>,
}

impl OperationStats {
    pub fn new() -> Self {
        Self {
            started: Utc::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Record one finished conversion
    pub fn record_conversion(&self, format: ExportFormat, kind: NativeKind, success: bool) {
        let mut counters = self.counters.lock();
        if success {
            counters.conversions += 1;
            *counters.formats.entry(format).or_default() += 1;
            *counters.file_types.entry(kind).or_default() += 1;
        } else {
            counters.failed_conversions += 1;
        }
        counters.last_operation = Some(Utc::now());
    }

    pub fn record_analysis(&self, kind: NativeKind) {
        let mut counters = self.counters.lock();
        counters.analyses += 1;
        *counters.file_types.entry(kind).or_default() += 1;
        counters.last_operation = Some(Utc::now());
    }

    pub fn record_batch(&self) {
        let mut counters = self.counters.lock();
        counters.batch_operations += 1;
        counters.last_operation = Some(Utc::now());
    }

    /// Copy the counters out
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters.lock();

        // Ties go to the format listed first
        let most_common_format = counters
            .formats
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(format, _)| format.name());

        StatsSnapshot {
            since_start: Totals {
                conversions: counters.conversions,
                failed_conversions: counters.failed_conversions,
                analyses: counters.analyses,
                batch_operations: counters.batch_operations,
                most_common_format,
            },
            format_breakdown: counters
                .formats
                .iter()
                .map(|(format, count)| (format.name(), *count))
                .collect(),
            file_type_breakdown: NativeKind::ALL
                .iter()
                .map(|kind| (kind.plural(), counters.file_types.get(kind).copied().unwrap_or(0)))
                .collect(),
            started_at: self.started,
            last_operation: counters.last_operation,
            last_updated: Utc::now(),
        }
    }
}

impl Default for OperationStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub conversions: u64,
    pub failed_conversions: u64,
    pub analyses: u64,
    pub batch_operations: u64,
    pub most_common_format: Option<&'static str>,
}

/// Point-in-time copy of [`OperationStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub since_start: Totals,
    pub format_breakdown: BTreeMap<&'static str, u64>,
    pub file_type_breakdown: BTreeMap<&'static str, u64>,
    pub started_at: DateTime<Utc>,
    pub last_operation: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}
