//! partview-core (renderer-agnostic)
//!
//! Event-driven state and coordination layer for sectioned 3D model
//! viewers: a typed publish/subscribe [`EventBus`], an immutable
//! [`StateStore`] with bounded undo/redo history, a [`SectionRegistry`]
//! for hierarchy navigation, selection and isolation, and an
//! [`AnimationCoordinator`] driving reversible disassemble/reassemble
//! runs. The [`Viewer`] facade wires them to renderer and loader
//! adapters; rendering, format parsing and UI live outside this crate.

pub mod adapters;
pub mod animation;
pub mod config;
pub mod error;
pub mod event;
pub mod interp;
pub mod section;
pub mod state;
pub mod stored_model;
pub mod transform;
pub mod viewer;

// Re-exports for consumers (adapters, hosts, tests)
pub use adapters::{LoadFailure, LoadOutcome, ModelLoader, NullRenderer, RecordingRenderer, RendererAdapter};
pub use animation::{AnimationCoordinator, AnimationPlan};
pub use config::ViewerConfig;
pub use error::ViewerError;
pub use event::{Event, EventBus, EventFilter, EventPayload, EventSink, EventType, SubscriptionId};
pub use section::{Model, ModelFormat, Section, SectionRegistry};
pub use state::{
    AnimationDirection, AnimationState, AnimationStatus, AppState, HistoryEntry, ListenerId,
    ModelsState, SectionView, SectionsState, StateStore, Theme, ViewState,
};
pub use stored_model::parse_stored_model_json;
pub use transform::{Aabb, Transform};
pub use viewer::Viewer;
