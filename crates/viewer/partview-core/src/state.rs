//! Immutable application-state snapshots and the serialized store.
//!
//! Every mutation produces a fresh [`AppState`] value wrapped in an
//! `Arc`; nothing ever writes through a published snapshot. The store is
//! the only producer of new snapshots, and its `&mut self` receivers
//! serialize transitions by construction (hosts with real parallelism
//! wrap the facade in a mutex).
//!
//! Ordered containers (`BTreeMap`/`BTreeSet`) keep snapshot comparison
//! and serialization deterministic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::event::{Event, EventBus};
use crate::section::Model;

/// Disassembly state machine status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationStatus {
    #[default]
    Idle,
    Disassembling,
    Reassembling,
}

impl AnimationStatus {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Disassembling => "disassembling",
            Self::Reassembling => "reassembling",
        }
    }
}

/// Direction of a disassembly/reassembly run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationDirection {
    Disassemble,
    Reassemble,
}

impl AnimationDirection {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disassemble => "disassemble",
            Self::Reassemble => "reassemble",
        }
    }
}

/// Lightweight per-section record carried in snapshots. The heavy
/// geometry (rest transform, bounds) stays in the registry arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionView {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

/// Model repository view: at most one active model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsState {
    pub active: Option<String>,
    pub items: BTreeMap<String, Model>,
}

/// Section interaction state: selection and isolation are independent
/// sets over the active model's section ids.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionsState {
    pub items: BTreeMap<String, SectionView>,
    pub selected: BTreeSet<String>,
    /// `None` means no isolation (everything shown).
    pub isolated: Option<BTreeSet<String>>,
}

/// Animation status mirror for UI consumption. Written through the
/// transient path only; never an undo step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    pub status: AnimationStatus,
    /// 0..1 over the current run; stays at the last value when idle.
    pub progress: f32,
    pub direction: Option<AnimationDirection>,
}

/// Color theme flag, persisted externally by the host.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Camera/zoom/theme flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f32,
    pub theme: Theme,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            theme: Theme::default(),
        }
    }
}

/// Full application-state snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub models: ModelsState,
    pub sections: SectionsState,
    pub animation: AnimationState,
    pub view: ViewState,
}

impl AppState {
    /// The canonical initial snapshot.
    pub fn initial() -> Self {
        Self::default()
    }
}

/// One undo step: the snapshot that was current before a transition.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub state: Arc<AppState>,
    pub label: String,
}

/// Listener handle; dense ids in the allocator style used for
/// subscriptions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

type BoxedListener = Box<dyn FnMut(&Arc<AppState>)>;

/// Snapshot container with subscription and bounded undo/redo history.
pub struct StateStore {
    current: Arc<AppState>,
    history: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    history_cap: usize,
    listeners: Vec<(ListenerId, BoxedListener)>,
    next_listener: u64,
}

impl StateStore {
    pub fn new(history_cap: usize) -> Self {
        Self::with_initial(AppState::initial(), history_cap)
    }

    pub fn with_initial(initial: AppState, history_cap: usize) -> Self {
        Self {
            current: Arc::new(initial),
            history: VecDeque::new(),
            redo: Vec::new(),
            history_cap,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Current snapshot, O(1).
    #[inline]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.current)
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Invoke `listener` with the new snapshot after every accepted
    /// transition (including transient ones).
    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<AppState>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; repeated calls are no-ops.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        if let Some(pos) = self.listeners.iter().position(|(l, _)| *l == id) {
            self.listeners.remove(pos);
            true
        } else {
            false
        }
    }

    /// Apply `updater` to the current snapshot. When the result equals
    /// the current state this is a no-op (no event, no history entry).
    /// Otherwise the prior snapshot is pushed onto history (evicting
    /// FIFO at the cap), the redo stack is cleared, and a `StateUpdate`
    /// event carrying both snapshots is published.
    pub fn update<F>(&mut self, bus: &mut EventBus, label: &str, updater: F) -> Arc<AppState>
    where
        F: FnOnce(&AppState) -> AppState,
    {
        let next = updater(&self.current);
        if next == *self.current {
            return self.state();
        }
        let previous = Arc::clone(&self.current);
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            state: Arc::clone(&previous),
            label: label.to_string(),
        });
        self.redo.clear();
        self.swap_and_announce(bus, previous, Arc::new(next));
        log::debug!("state update: {label}");
        self.state()
    }

    /// Apply `updater` without touching history or the redo stack.
    /// Used for high-frequency state (animation progress, camera path)
    /// that must not become an undo step. The redo stack is deliberately
    /// left intact: a later `redo` restores its snapshot wholesale,
    /// overwriting any transient fields written in between.
    pub fn update_transient<F>(&mut self, bus: &mut EventBus, updater: F) -> Arc<AppState>
    where
        F: FnOnce(&AppState) -> AppState,
    {
        let next = updater(&self.current);
        if next == *self.current {
            return self.state();
        }
        let previous = Arc::clone(&self.current);
        self.swap_and_announce(bus, previous, Arc::new(next));
        self.state()
    }

    /// Restore the most recent history entry.
    pub fn undo(&mut self, bus: &mut EventBus) -> Result<Arc<AppState>, ViewerError> {
        let entry = self.history.pop_back().ok_or(ViewerError::NoHistory)?;
        let previous = Arc::clone(&self.current);
        self.redo.push(HistoryEntry {
            state: Arc::clone(&previous),
            label: entry.label.clone(),
        });
        log::debug!("undo: {}", entry.label);
        self.swap_and_announce(bus, previous, entry.state);
        Ok(self.state())
    }

    /// Re-apply the most recently undone transition.
    pub fn redo(&mut self, bus: &mut EventBus) -> Result<Arc<AppState>, ViewerError> {
        let entry = self.redo.pop().ok_or(ViewerError::NoRedo)?;
        let previous = Arc::clone(&self.current);
        self.history.push_back(HistoryEntry {
            state: Arc::clone(&previous),
            label: entry.label.clone(),
        });
        log::debug!("redo: {}", entry.label);
        self.swap_and_announce(bus, previous, entry.state);
        Ok(self.state())
    }

    /// Drop every undo and redo entry. Called at document boundaries
    /// (model loads): undo must never cross into a previous model's
    /// timeline, where the section ids no longer resolve.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.redo.clear();
    }

    /// Replace current state with the canonical initial snapshot.
    /// Reset is itself undo-able.
    pub fn reset(&mut self, bus: &mut EventBus) -> Arc<AppState> {
        self.update(bus, "reset", |_| AppState::initial())
    }

    fn swap_and_announce(
        &mut self,
        bus: &mut EventBus,
        previous: Arc<AppState>,
        next: Arc<AppState>,
    ) {
        self.current = Arc::clone(&next);
        bus.publish(Event::state_update(previous, next, bus.now_ms()));
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.current);
        }
    }
}
