//! Page performance observation and threshold alerts.

use siteline_core::capability::PerformanceTimings;
use siteline_core::config::PerformanceThresholds;
use std::sync::atomic::{AtomicBool, Ordering};

/// A metric that crossed its configured threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceAlert {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
}

/// Evaluates timings against thresholds while attached.
///
/// Detaching models removing the host's performance observers; a detached
/// monitor evaluates nothing.
pub struct PerformanceMonitor {
    thresholds: PerformanceThresholds,
    attached: AtomicBool,
}

impl PerformanceMonitor {
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self {
            thresholds,
            attached: AtomicBool::new(false),
        }
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            tracing::debug!("[PerformanceMonitor] Observers detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Returns every metric above its threshold, or nothing when detached.
    pub fn evaluate(&self, timings: &PerformanceTimings) -> Vec<PerformanceAlert> {
        if !self.is_attached() {
            return Vec::new();
        }
        let t = &self.thresholds;
        [
            ("page_load_ms", timings.page_load_ms, t.page_load_ms),
            (
                "first_contentful_paint_ms",
                timings.first_contentful_paint_ms,
                t.first_contentful_paint_ms,
            ),
            (
                "largest_contentful_paint_ms",
                timings.largest_contentful_paint_ms,
                t.largest_contentful_paint_ms,
            ),
            (
                "first_input_delay_ms",
                timings.first_input_delay_ms,
                t.first_input_delay_ms,
            ),
            (
                "cumulative_layout_shift",
                timings.cumulative_layout_shift,
                t.cumulative_layout_shift,
            ),
        ]
        .into_iter()
        .filter_map(|(metric, value, threshold)| {
            value
                .filter(|v| *v > threshold)
                .map(|value| PerformanceAlert {
                    metric,
                    value,
                    threshold,
                })
        })
        .collect()
    }
}

/// Flattens timings into record data, skipping absent metrics.
pub fn timings_data(timings: &PerformanceTimings) -> Vec<(&'static str, String)> {
    [
        ("page_load_ms", timings.page_load_ms),
        ("first_contentful_paint_ms", timings.first_contentful_paint_ms),
        ("largest_contentful_paint_ms", timings.largest_contentful_paint_ms),
        ("first_input_delay_ms", timings.first_input_delay_ms),
        ("cumulative_layout_shift", timings.cumulative_layout_shift),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
    .collect()
}
