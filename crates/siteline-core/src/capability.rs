//! Host capability abstraction.
//!
//! The instrumentation layer never probes its host directly. Everything it
//! needs to know about the surrounding environment (navigation context,
//! performance timings) comes through a [`CapabilityProvider`] injected at
//! construction. Hosts without a given capability return `None` and the
//! dependent feature is skipped.

use crate::record::PageId;
use serde::{Deserialize, Serialize};

/// Navigation context captured at session start and attached to analytics
/// payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub user_agent: String,
    /// `"{width}x{height}"` of the physical screen
    pub screen_size: String,
    /// `"{width}x{height}"` of the viewport
    pub viewport: String,
    pub referrer: String,
    pub page: PageId,
    pub language: String,
    pub timezone: String,
}

/// Page load metrics, in milliseconds except for layout shift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTimings {
    pub page_load_ms: Option<f64>,
    pub first_contentful_paint_ms: Option<f64>,
    pub largest_contentful_paint_ms: Option<f64>,
    pub first_input_delay_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
}

/// Source of host-provided context.
pub trait CapabilityProvider: Send + Sync {
    /// Snapshot of the current navigation context.
    fn environment(&self) -> EnvironmentSnapshot;

    /// Performance timings, or `None` when the host cannot observe them.
    fn performance(&self) -> Option<PerformanceTimings>;
}

/// Provider for hosts with no capabilities at all.
pub struct NoopCapabilities;

impl CapabilityProvider for NoopCapabilities {
    fn environment(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::default()
    }

    fn performance(&self) -> Option<PerformanceTimings> {
        None
    }
}

/// Provider returning fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    environment: EnvironmentSnapshot,
    performance: Option<PerformanceTimings>,
}

impl StaticCapabilities {
    pub fn new(environment: EnvironmentSnapshot) -> Self {
        Self {
            environment,
            performance: None,
        }
    }

    pub fn with_performance(mut self, timings: PerformanceTimings) -> Self {
        self.performance = Some(timings);
        self
    }
}

impl CapabilityProvider for StaticCapabilities {
    fn environment(&self) -> EnvironmentSnapshot {
        self.environment.clone()
    }

    fn performance(&self) -> Option<PerformanceTimings> {
        self.performance.clone()
    }
}
