//! Event system: typed publish/subscribe hub.
//!
//! All cross-component communication flows through the [`EventBus`].
//! Publishing is synchronous and breadth-first re-entrant: a handler may
//! enqueue follow-up events on its [`EventSink`], and the bus drains them
//! after the current handler list finishes. A handler returning `Err`
//! never reaches the publisher; it is converted to a single
//! [`EventType::Error`] event (failures while handling an `Error` event
//! are only logged, so error handling cannot loop).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::state::{AnimationDirection, AppState};

/// Types of viewer events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EventType {
    /// A model load was initiated
    ModelLoadStart,
    /// A model finished loading and its hierarchy is ready
    ModelLoadSuccess,
    /// A model load failed
    ModelLoadError,
    /// A section was added to (or replaced) the selection
    SectionSelect,
    /// A section was removed from the selection
    SectionDeselect,
    /// The camera should frame a section
    SectionFocus,
    /// The isolation set changed
    SectionIsolate,
    /// A section gained the hover highlight
    SectionHighlight,
    /// A section lost the hover highlight
    SectionDehighlight,
    /// The view was reset to its home pose
    ViewReset,
    /// The view zoomed
    ViewZoom,
    /// A disassembly/reassembly run started
    AnimationStart,
    /// A disassembly/reassembly run finished
    AnimationComplete,
    /// The application state snapshot was replaced
    StateUpdate,
    /// A recoverable failure surfaced for the UI
    Error,
    /// Custom host-defined event
    Custom(String),
}

impl EventType {
    /// Get the name of this event type
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Self::ModelLoadStart => "model_load_start",
            Self::ModelLoadSuccess => "model_load_success",
            Self::ModelLoadError => "model_load_error",
            Self::SectionSelect => "section_select",
            Self::SectionDeselect => "section_deselect",
            Self::SectionFocus => "section_focus",
            Self::SectionIsolate => "section_isolate",
            Self::SectionHighlight => "section_highlight",
            Self::SectionDehighlight => "section_dehighlight",
            Self::ViewReset => "view_reset",
            Self::ViewZoom => "view_zoom",
            Self::AnimationStart => "animation_start",
            Self::AnimationComplete => "animation_complete",
            Self::StateUpdate => "state_update",
            Self::Error => "error",
            Self::Custom(name) => name,
        }
    }

    /// Check if this is a model lifecycle event
    #[inline]
    pub fn is_model_event(&self) -> bool {
        matches!(
            self,
            Self::ModelLoadStart | Self::ModelLoadSuccess | Self::ModelLoadError
        )
    }

    /// Check if this is a section interaction event
    #[inline]
    pub fn is_section_event(&self) -> bool {
        matches!(
            self,
            Self::SectionSelect
                | Self::SectionDeselect
                | Self::SectionFocus
                | Self::SectionIsolate
                | Self::SectionHighlight
                | Self::SectionDehighlight
        )
    }

    /// Check if this is a camera/view event
    #[inline]
    pub fn is_view_event(&self) -> bool {
        matches!(self, Self::ViewReset | Self::ViewZoom)
    }

    /// Check if this is an animation lifecycle event
    #[inline]
    pub fn is_animation_event(&self) -> bool {
        matches!(self, Self::AnimationStart | Self::AnimationComplete)
    }

    /// Check if this is an error or load-failure event
    #[inline]
    pub fn is_diagnostic_event(&self) -> bool {
        matches!(self, Self::Error | Self::ModelLoadError)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "model_load_start" => Self::ModelLoadStart,
            "model_load_success" => Self::ModelLoadSuccess,
            "model_load_error" => Self::ModelLoadError,
            "section_select" => Self::SectionSelect,
            "section_deselect" => Self::SectionDeselect,
            "section_focus" => Self::SectionFocus,
            "section_isolate" => Self::SectionIsolate,
            "section_highlight" => Self::SectionHighlight,
            "section_dehighlight" => Self::SectionDehighlight,
            "view_reset" => Self::ViewReset,
            "view_zoom" => Self::ViewZoom,
            "animation_start" => Self::AnimationStart,
            "animation_complete" => Self::AnimationComplete,
            "state_update" => Self::StateUpdate,
            "error" => Self::Error,
            custom => Self::Custom(custom.to_string()),
        }
    }
}

/// Typed payload carried by each event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EventPayload {
    None,
    ModelLoadStart {
        filename: String,
    },
    ModelLoadSuccess {
        model_id: String,
        section_count: usize,
    },
    ModelLoadError {
        message: String,
        cause: Option<String>,
    },
    /// Select and deselect share this shape
    SectionSelection {
        section_id: String,
        additive: bool,
    },
    SectionFocus {
        section_id: String,
    },
    SectionIsolate {
        section_ids: Vec<String>,
    },
    SectionHighlight {
        section_id: String,
    },
    ViewReset {
        animate: bool,
    },
    ViewZoom {
        delta: f32,
        origin: [f32; 2],
    },
    Animation {
        direction: AnimationDirection,
    },
    StateUpdate {
        previous: Arc<AppState>,
        next: Arc<AppState>,
    },
    Error {
        message: String,
        original_event_type: Option<EventType>,
    },
}

/// Viewer event: immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    /// Milliseconds on the host's logical clock (see [`EventBus::now_ms`]).
    pub timestamp_ms: u64,
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event
    #[inline]
    pub fn new(event_type: EventType, timestamp_ms: u64, payload: EventPayload) -> Self {
        Self {
            event_type,
            timestamp_ms,
            payload,
        }
    }

    #[inline]
    pub fn model_load_start(filename: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::ModelLoadStart,
            timestamp_ms,
            EventPayload::ModelLoadStart {
                filename: filename.into(),
            },
        )
    }

    #[inline]
    pub fn model_load_success(
        model_id: impl Into<String>,
        section_count: usize,
        timestamp_ms: u64,
    ) -> Self {
        Self::new(
            EventType::ModelLoadSuccess,
            timestamp_ms,
            EventPayload::ModelLoadSuccess {
                model_id: model_id.into(),
                section_count,
            },
        )
    }

    #[inline]
    pub fn model_load_error(
        message: impl Into<String>,
        cause: Option<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self::new(
            EventType::ModelLoadError,
            timestamp_ms,
            EventPayload::ModelLoadError {
                message: message.into(),
                cause,
            },
        )
    }

    #[inline]
    pub fn section_select(section_id: impl Into<String>, additive: bool, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::SectionSelect,
            timestamp_ms,
            EventPayload::SectionSelection {
                section_id: section_id.into(),
                additive,
            },
        )
    }

    #[inline]
    pub fn section_deselect(section_id: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::SectionDeselect,
            timestamp_ms,
            EventPayload::SectionSelection {
                section_id: section_id.into(),
                additive: false,
            },
        )
    }

    #[inline]
    pub fn section_focus(section_id: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::SectionFocus,
            timestamp_ms,
            EventPayload::SectionFocus {
                section_id: section_id.into(),
            },
        )
    }

    #[inline]
    pub fn section_isolate(section_ids: Vec<String>, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::SectionIsolate,
            timestamp_ms,
            EventPayload::SectionIsolate { section_ids },
        )
    }

    #[inline]
    pub fn section_highlight(section_id: impl Into<String>, on: bool, timestamp_ms: u64) -> Self {
        Self::new(
            if on {
                EventType::SectionHighlight
            } else {
                EventType::SectionDehighlight
            },
            timestamp_ms,
            EventPayload::SectionHighlight {
                section_id: section_id.into(),
            },
        )
    }

    #[inline]
    pub fn view_reset(animate: bool, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::ViewReset,
            timestamp_ms,
            EventPayload::ViewReset { animate },
        )
    }

    #[inline]
    pub fn view_zoom(delta: f32, origin: [f32; 2], timestamp_ms: u64) -> Self {
        Self::new(
            EventType::ViewZoom,
            timestamp_ms,
            EventPayload::ViewZoom { delta, origin },
        )
    }

    #[inline]
    pub fn animation_start(direction: AnimationDirection, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::AnimationStart,
            timestamp_ms,
            EventPayload::Animation { direction },
        )
    }

    #[inline]
    pub fn animation_complete(direction: AnimationDirection, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::AnimationComplete,
            timestamp_ms,
            EventPayload::Animation { direction },
        )
    }

    #[inline]
    pub fn state_update(previous: Arc<AppState>, next: Arc<AppState>, timestamp_ms: u64) -> Self {
        Self::new(
            EventType::StateUpdate,
            timestamp_ms,
            EventPayload::StateUpdate { previous, next },
        )
    }

    #[inline]
    pub fn error(
        message: impl Into<String>,
        original_event_type: Option<EventType>,
        timestamp_ms: u64,
    ) -> Self {
        Self::new(
            EventType::Error,
            timestamp_ms,
            EventPayload::Error {
                message: message.into(),
                original_event_type,
            },
        )
    }
}

/// Result type handlers report with; `Err` is caught at the bus boundary.
pub type HandlerResult = Result<(), ViewerError>;

/// Follow-up queue handed to every handler. Events published here are
/// dispatched after the current handler list finishes (breadth-first),
/// so handler chains never grow the stack.
#[derive(Default)]
pub struct EventSink {
    queued: Vec<Event>,
}

impl EventSink {
    #[inline]
    pub fn publish(&mut self, event: Event) {
        self.queued.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

type BoxedHandler = Box<dyn FnMut(&Event, &mut EventSink) -> HandlerResult>;

/// Capability returned by `subscribe`; passing it to
/// [`EventBus::unsubscribe`] removes the registration idempotently.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

struct Registration {
    id: SubscriptionId,
    handler: BoxedHandler,
}

/// Filter for querying the bus history ring.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
    pub limit: Option<usize>,
}

/// Typed publish/subscribe hub.
pub struct EventBus {
    by_type: HashMap<EventType, Vec<Registration>>,
    wildcard: Vec<Registration>,
    pending: VecDeque<Event>,
    dispatching: bool,
    next_id: u64,
    history: Option<VecDeque<Event>>,
    history_cap: usize,
    now_ms: u64,
}

impl EventBus {
    /// Create a bus without event history.
    pub fn new() -> Self {
        Self::with_history(None)
    }

    /// Create a bus retaining the last `cap` published events when
    /// `cap` is `Some`.
    pub fn with_history(cap: Option<usize>) -> Self {
        Self {
            by_type: HashMap::new(),
            wildcard: Vec::new(),
            pending: VecDeque::new(),
            dispatching: false,
            next_id: 0,
            history: cap.map(|_| VecDeque::new()),
            history_cap: cap.unwrap_or(0),
            now_ms: 0,
        }
    }

    /// Current logical time in milliseconds. Advanced by the host via
    /// [`EventBus::advance_time`]; used to stamp events.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance the logical clock. The facade calls this once per tick.
    #[inline]
    pub fn advance_time(&mut self, delta_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
    }

    /// Set the logical clock; never moves backwards.
    #[inline]
    pub fn set_time_ms(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn alloc_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Register `handler` for exactly one event type.
    pub fn subscribe(
        &mut self,
        event_type: EventType,
        handler: impl FnMut(&Event, &mut EventSink) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.by_type.entry(event_type).or_default().push(Registration {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Register `handler` for every published event, in publish order.
    pub fn subscribe_all(
        &mut self,
        handler: impl FnMut(&Event, &mut EventSink) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.wildcard.push(Registration {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a registration. Returns `true` when something was removed;
    /// repeated calls with the same id are no-ops.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for regs in self.by_type.values_mut() {
            if let Some(pos) = regs.iter().position(|r| r.id == id) {
                regs.remove(pos);
                return true;
            }
        }
        if let Some(pos) = self.wildcard.iter().position(|r| r.id == id) {
            self.wildcard.remove(pos);
            return true;
        }
        false
    }

    /// Remove all subscriptions. History, if tracked, is kept.
    pub fn clear(&mut self) {
        self.by_type.clear();
        self.wildcard.clear();
    }

    /// Number of live registrations (type-specific plus wildcard).
    pub fn subscription_count(&self) -> usize {
        self.by_type.values().map(|v| v.len()).sum::<usize>() + self.wildcard.len()
    }

    /// Publish an event, synchronously invoking type-specific handlers
    /// first, then wildcard handlers, each in registration order.
    ///
    /// Re-entrant publishes (from inside a handler, via the sink) are
    /// queued and processed after the current handler list. Publishing
    /// with zero subscribers is a no-op beyond history recording.
    pub fn publish(&mut self, event: Event) {
        self.pending.push_back(event);
        if self.dispatching {
            // The outer dispatch loop will pick it up (breadth-first).
            return;
        }
        self.dispatching = true;
        while let Some(event) = self.pending.pop_front() {
            self.record(&event);
            self.dispatch(&event);
        }
        self.dispatching = false;
    }

    fn record(&mut self, event: &Event) {
        if let Some(ring) = self.history.as_mut() {
            if ring.len() == self.history_cap {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
    }

    fn dispatch(&mut self, event: &Event) {
        let mut sink = EventSink::default();
        let mut failures: Vec<ViewerError> = Vec::new();

        if let Some(regs) = self.by_type.get_mut(&event.event_type) {
            for reg in regs.iter_mut() {
                if let Err(err) = (reg.handler)(event, &mut sink) {
                    failures.push(err);
                }
            }
        }
        for reg in self.wildcard.iter_mut() {
            if let Err(err) = (reg.handler)(event, &mut sink) {
                failures.push(err);
            }
        }

        for err in failures {
            if event.event_type == EventType::Error {
                // Never convert a failing Error handler back into an
                // Error event; that would loop.
                log::warn!("error-event handler failed: {err}");
            } else {
                log::warn!(
                    "handler for {} failed: {err}",
                    event.event_type.name()
                );
                self.pending.push_back(Event::error(
                    err.to_string(),
                    Some(event.event_type.clone()),
                    self.now_ms,
                ));
            }
        }

        self.pending.extend(sink.queued);
    }

    /// Query recent events from the history ring, oldest first.
    /// Returns an empty list when history is disabled.
    pub fn recent(&self, filter: &EventFilter) -> Vec<Event> {
        let Some(ring) = self.history.as_ref() else {
            return Vec::new();
        };
        let mut out: Vec<Event> = ring
            .iter()
            .filter(|e| {
                filter
                    .event_type
                    .as_ref()
                    .map_or(true, |t| &e.event_type == t)
                    && filter.since_ms.map_or(true, |s| e.timestamp_ms >= s)
                    && filter.until_ms.map_or(true, |u| e.timestamp_ms <= u)
            })
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            if out.len() > limit {
                out.drain(..out.len() - limit);
            }
        }
        out
    }

    /// Number of events currently retained.
    pub fn history_len(&self) -> usize {
        self.history.as_ref().map_or(0, |r| r.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
