// Engine Metrics
//
// Counts and times discount calculations, points awards, level recomputes
// and imports so slow paths show up in the logs and on /api/metrics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Operations slower than this are counted as slow and logged at warn
const SLOW_OPERATION_THRESHOLD_MS: u128 = 100;

/// Kind of engine operation being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DiscountCalculation,
    PointsAward,
    LevelRecompute,
    Import,
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::DiscountCalculation => "discount calculation",
            Operation::PointsAward => "points award",
            Operation::LevelRecompute => "level recompute",
            Operation::Import => "import",
        }
    }
}

#[derive(Debug, Default)]
struct OperationCounters {
    count: AtomicU64,
    total_time_us: AtomicU64,
    slow: AtomicU64,
}

impl OperationCounters {
    fn record(&self, operation: Operation, duration: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.total_time_us.fetch_add(micros, Ordering::Relaxed);

        if duration.as_millis() > SLOW_OPERATION_THRESHOLD_MS {
            self.slow.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow {}: {}ms", operation.label(), duration.as_millis());
        }
    }

    fn snapshot(&self) -> OperationStats {
        let count = self.count.load(Ordering::Relaxed);
        let total_us = self.total_time_us.load(Ordering::Relaxed);
        let avg_time_ms = if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        };

        OperationStats {
            count,
            avg_time_ms,
            slow: self.slow.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct MetricsInner {
    discount_calculations: OperationCounters,
    points_awards: OperationCounters,
    level_recomputes: OperationCounters,
    imports: OperationCounters,
}

/// Shared, cheaply clonable metrics handle
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing an operation; the duration is recorded when the timer drops
    pub fn start(&self, operation: Operation) -> OperationTimer {
        OperationTimer {
            start: Instant::now(),
            operation,
            metrics: self.clone(),
        }
    }

    fn counters(&self, operation: Operation) -> &OperationCounters {
        match operation {
            Operation::DiscountCalculation => &self.inner.discount_calculations,
            Operation::PointsAward => &self.inner.points_awards,
            Operation::LevelRecompute => &self.inner.level_recomputes,
            Operation::Import => &self.inner.imports,
        }
    }

    fn record(&self, operation: Operation, duration: Duration) {
        self.counters(operation).record(operation, duration);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            discount_calculations: self.inner.discount_calculations.snapshot(),
            points_awards: self.inner.points_awards.snapshot(),
            level_recomputes: self.inner.level_recomputes.snapshot(),
            imports: self.inner.imports.snapshot(),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let s = self.summary();
        tracing::info!(
            "Engine metrics: discounts {} (avg {:.2}ms, {} slow), awards {} (avg {:.2}ms, {} slow), \
             level recomputes {} (avg {:.2}ms, {} slow), imports {} (avg {:.2}ms, {} slow)",
            s.discount_calculations.count,
            s.discount_calculations.avg_time_ms,
            s.discount_calculations.slow,
            s.points_awards.count,
            s.points_awards.avg_time_ms,
            s.points_awards.slow,
            s.level_recomputes.count,
            s.level_recomputes.avg_time_ms,
            s.level_recomputes.slow,
            s.imports.count,
            s.imports.avg_time_ms,
            s.imports.slow,
        );
    }
}

/// Records the elapsed time of one operation on drop
pub struct OperationTimer {
    start: Instant,
    operation: Operation,
    metrics: EngineMetrics,
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.metrics.record(self.operation, self.start.elapsed());
    }
}

/// Per-operation figures
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub avg_time_ms: f64,
    pub slow: u64,
}

/// Snapshot served by GET /api/metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub discount_calculations: OperationStats,
    pub points_awards: OperationStats,
    pub level_recomputes: OperationStats,
    pub imports: OperationStats,
}
