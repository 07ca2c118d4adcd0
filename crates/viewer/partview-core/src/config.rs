//! Core configuration for partview-core.

use serde::{Deserialize, Serialize};

/// Configuration for history bounds, event retention and animation shaping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Maximum undo-history entries; oldest are evicted FIFO on overflow.
    pub history_cap: usize,

    /// Published-event retention in the bus ring buffer; `None` disables
    /// event history entirely.
    pub event_history: Option<usize>,

    /// Explosion spread: the displacement of a leaf section is
    /// (bounds center - model centroid) scaled by this factor.
    pub spread_factor: f32,

    /// Minimum progress delta between transient `animation.progress`
    /// writes while a run is ticking. Completion always publishes.
    pub progress_publish_step: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            history_cap: 50,
            event_history: Some(100),
            spread_factor: 1.5,
            progress_publish_step: 0.05,
        }
    }
}
