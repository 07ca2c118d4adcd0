//! Adapter contracts for the excluded collaborators.
//!
//! The core never touches rendering primitives; it calls these narrow
//! interfaces and observes finished load results. Implementations must
//! be idempotent: repeating a call with unchanged values is free of
//! side effects.

use std::collections::BTreeMap;

use crate::error::ViewerError;
use crate::section::{Model, Section};
use crate::transform::Transform;

/// Renderer-side sink for per-section visual state.
pub trait RendererAdapter {
    fn apply_section_transform(&mut self, id: &str, transform: &Transform);
    fn set_section_visibility(&mut self, id: &str, visible: bool);
    fn set_section_highlight(&mut self, id: &str, on: bool);
}

/// A finished (or failed) asynchronous model load.
pub type LoadOutcome = Result<(Model, Vec<Section>), LoadFailure>;

/// Failure report from a loading adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadFailure {
    pub message: String,
    pub cause: Option<String>,
}

/// Model-loading adapter: parsing runs outside the core, which only
/// polls for finished results and never blocks.
pub trait ModelLoader {
    /// Return a finished outcome if one is ready.
    fn poll(&mut self) -> Option<LoadOutcome>;
}

impl From<ViewerError> for LoadFailure {
    fn from(err: ViewerError) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(err.category().to_string()),
        }
    }
}

/// Renderer that ignores everything; for headless hosts and tests that
/// only exercise state.
#[derive(Default)]
pub struct NullRenderer;

impl RendererAdapter for NullRenderer {
    fn apply_section_transform(&mut self, _id: &str, _transform: &Transform) {}
    fn set_section_visibility(&mut self, _id: &str, _visible: bool) {}
    fn set_section_highlight(&mut self, _id: &str, _on: bool) {}
}

/// Renderer that records the last value per section, for tests and
/// tooling.
#[derive(Default)]
pub struct RecordingRenderer {
    transforms: BTreeMap<String, Transform>,
    visibility: BTreeMap<String, bool>,
    highlights: BTreeMap<String, bool>,
    transform_calls: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(&self, id: &str) -> Option<&Transform> {
        self.transforms.get(id)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visibility.get(id).copied().unwrap_or(true)
    }

    pub fn is_highlighted(&self, id: &str) -> bool {
        self.highlights.get(id).copied().unwrap_or(false)
    }

    pub fn transform_call_count(&self) -> usize {
        self.transform_calls
    }
}

impl RendererAdapter for RecordingRenderer {
    fn apply_section_transform(&mut self, id: &str, transform: &Transform) {
        self.transform_calls += 1;
        self.transforms.insert(id.to_string(), *transform);
    }

    fn set_section_visibility(&mut self, id: &str, visible: bool) {
        self.visibility.insert(id.to_string(), visible);
    }

    fn set_section_highlight(&mut self, id: &str, on: bool) {
        self.highlights.insert(id.to_string(), on);
    }
}
