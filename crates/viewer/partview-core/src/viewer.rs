//! The orchestrating facade: wires bus, store, registry and coordinator
//! to the external adapters. No business logic of its own — every
//! operation delegates and threads the shared pieces through.
//!
//! The facade is an explicit, constructed context: hosts build one and
//! pass it around (test harness, bootstrap). There is no module-level
//! singleton; diagnostics go through read-only accessors.

use std::sync::Arc;

use crate::adapters::{ModelLoader, RendererAdapter};
use crate::animation::AnimationCoordinator;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::event::{Event, EventBus, EventFilter, EventType};
use crate::section::{Model, Section, SectionRegistry};
use crate::state::{AnimationState, AnimationStatus, AppState, StateStore, Theme};
use crate::transform::Transform;

pub struct Viewer {
    bus: EventBus,
    store: StateStore,
    registry: SectionRegistry,
    animation: AnimationCoordinator,
    clock_ms: f64,
}

impl Viewer {
    pub fn new(cfg: ViewerConfig) -> Self {
        Self {
            bus: EventBus::with_history(cfg.event_history),
            store: StateStore::new(cfg.history_cap),
            animation: AnimationCoordinator::new(&cfg),
            registry: SectionRegistry::new(),
            clock_ms: 0.0,
        }
    }

    // ----- diagnostics & subscriptions -----

    /// Current state snapshot.
    #[inline]
    pub fn state(&self) -> Arc<AppState> {
        self.store.state()
    }

    /// Mutable bus access for subscriptions; adapters and UI register
    /// their handlers here.
    #[inline]
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Query recently published events (empty when history is disabled).
    #[inline]
    pub fn recent_events(&self, filter: &EventFilter) -> Vec<Event> {
        self.bus.recent(filter)
    }

    #[inline]
    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    #[inline]
    pub fn animation_status(&self) -> AnimationStatus {
        self.animation.status()
    }

    #[inline]
    pub fn animation_progress(&self) -> f32 {
        self.animation.progress()
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_animating()
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    // ----- model loading -----

    /// Announce that a load was kicked off outside the core.
    pub fn begin_model_load(&mut self, filename: &str) {
        self.bus
            .publish(Event::model_load_start(filename, self.bus.now_ms()));
    }

    /// Consume a finished load: rebuild the hierarchy, cancel any
    /// in-flight run, and show every section at rest.
    pub fn complete_model_load(
        &mut self,
        renderer: &mut dyn RendererAdapter,
        model: Model,
        sections: Vec<Section>,
    ) -> Result<(), ViewerError> {
        let result = self
            .registry
            .load_model(&mut self.store, &mut self.bus, model, sections);
        if let Err(err) = result {
            self.surface(&err, EventType::ModelLoadError);
            return Err(err);
        }
        // Coordinator fields and the snapshot's animation sub-state must
        // reset together, or the status view outlives the cancelled run.
        self.animation.reset();
        self.store.update_transient(&mut self.bus, |state| {
            let mut next = state.clone();
            next.animation = AnimationState::default();
            next
        });
        for section in self.registry.sections() {
            renderer.set_section_visibility(&section.id, true);
            renderer.set_section_highlight(&section.id, false);
            renderer.apply_section_transform(&section.id, &section.rest_transform);
        }
        Ok(())
    }

    /// Surface a failed load to the UI layer.
    pub fn fail_model_load(&mut self, message: &str, cause: Option<String>) {
        log::warn!("model load failed: {message}");
        self.bus
            .publish(Event::model_load_error(message, cause, self.bus.now_ms()));
    }

    /// Drain one finished result from a loading adapter, if any.
    /// Returns `true` when an outcome (success or failure) was consumed.
    pub fn poll_loader(
        &mut self,
        renderer: &mut dyn RendererAdapter,
        loader: &mut dyn ModelLoader,
    ) -> Result<bool, ViewerError> {
        match loader.poll() {
            None => Ok(false),
            Some(Ok((model, sections))) => {
                self.complete_model_load(renderer, model, sections)?;
                Ok(true)
            }
            Some(Err(failure)) => {
                self.fail_model_load(&failure.message, failure.cause);
                Ok(true)
            }
        }
    }

    // ----- selection / isolation / highlight -----

    pub fn select_section(&mut self, id: &str, additive: bool) -> Result<(), ViewerError> {
        self.registry
            .select_section(&mut self.store, &mut self.bus, id, additive)
            .map_err(|err| self.surfaced(err, EventType::SectionSelect))
    }

    pub fn deselect_section(&mut self, id: &str) -> Result<(), ViewerError> {
        self.registry
            .deselect_section(&mut self.store, &mut self.bus, id)
            .map_err(|err| self.surfaced(err, EventType::SectionDeselect))
    }

    pub fn selected_sections(&self) -> Vec<&Section> {
        self.registry.selected_sections(&self.store)
    }

    /// Replace the isolation set and drive renderer visibility: the
    /// isolated ids and their descendants stay visible, everything else
    /// is hidden.
    pub fn isolate_sections(
        &mut self,
        renderer: &mut dyn RendererAdapter,
        ids: &[String],
    ) -> Result<(), ViewerError> {
        self.registry
            .isolate_sections(&mut self.store, &mut self.bus, ids)
            .map_err(|err| self.surfaced(err, EventType::SectionIsolate))?;

        let mut visible: Vec<String> = Vec::new();
        for id in ids {
            visible.extend(self.registry.with_descendants(id)?);
        }
        for section in self.registry.sections() {
            renderer.set_section_visibility(&section.id, visible.contains(&section.id));
        }
        Ok(())
    }

    /// Clear isolation and show every section again.
    pub fn show_all_sections(&mut self, renderer: &mut dyn RendererAdapter) {
        self.registry.show_all_sections(&mut self.store, &mut self.bus);
        for section in self.registry.sections() {
            renderer.set_section_visibility(&section.id, true);
        }
    }

    pub fn highlight_section(
        &mut self,
        renderer: &mut dyn RendererAdapter,
        id: &str,
        on: bool,
    ) -> Result<(), ViewerError> {
        self.registry
            .highlight_section(&mut self.bus, id, on)
            .map_err(|err| {
                self.surface(
                    &err,
                    if on {
                        EventType::SectionHighlight
                    } else {
                        EventType::SectionDehighlight
                    },
                );
                err
            })?;
        renderer.set_section_highlight(id, on);
        Ok(())
    }

    /// Ask the camera to frame a section.
    pub fn focus_section(&mut self, id: &str) -> Result<(), ViewerError> {
        // Map to () so the registry borrow ends before surfacing.
        if let Err(err) = self.registry.section(id).map(|_| ()) {
            return Err(self.surfaced(err, EventType::SectionFocus));
        }
        self.bus
            .publish(Event::section_focus(id, self.bus.now_ms()));
        Ok(())
    }

    // ----- animation -----

    pub fn disassemble(&mut self, duration_ms: f32) -> Result<(), ViewerError> {
        self.animation
            .disassemble(&self.registry, &mut self.store, &mut self.bus, duration_ms)
            .map_err(|err| self.surfaced(err, EventType::AnimationStart))
    }

    pub fn reassemble(&mut self, duration_ms: f32) -> Result<(), ViewerError> {
        self.animation
            .reassemble(&self.registry, &mut self.store, &mut self.bus, duration_ms)
            .map_err(|err| self.surfaced(err, EventType::AnimationStart))
    }

    /// Cancel any in-flight run; safe to call at any tick boundary.
    pub fn stop_animation(&mut self) {
        self.animation.stop(&mut self.store, &mut self.bus);
    }

    /// Advance the core by `dt` seconds. The host's frame loop calls
    /// this once per rendered frame (or a test steps it manually).
    pub fn tick(&mut self, dt_s: f32, renderer: &mut dyn RendererAdapter) {
        self.clock_ms += f64::from(dt_s.max(0.0)) * 1000.0;
        self.bus.set_time_ms(self.clock_ms as u64);
        self.animation
            .tick(dt_s, &mut self.store, &mut self.bus, renderer);
    }

    /// The pose a section currently holds (rest unless displaced).
    pub fn section_pose(&self, id: &str) -> Result<Transform, ViewerError> {
        self.animation.current_pose(&self.registry, id)
    }

    // ----- history -----

    pub fn undo(&mut self) -> Result<Arc<AppState>, ViewerError> {
        self.store
            .undo(&mut self.bus)
            .map_err(|err| self.surfaced(err, EventType::StateUpdate))
    }

    pub fn redo(&mut self) -> Result<Arc<AppState>, ViewerError> {
        self.store
            .redo(&mut self.bus)
            .map_err(|err| self.surfaced(err, EventType::StateUpdate))
    }

    // ----- view -----

    /// Reset camera/zoom to the home pose. The motion itself belongs to
    /// the renderer; the core resets the view state and announces it.
    pub fn reset_view(&mut self, animate: bool) {
        self.store.update_transient(&mut self.bus, |state| {
            let mut next = state.clone();
            next.view.zoom = 1.0;
            next
        });
        self.bus
            .publish(Event::view_reset(animate, self.bus.now_ms()));
    }

    /// Apply a zoom delta around an origin point (screen space).
    pub fn zoom(&mut self, delta: f32, origin: [f32; 2]) {
        self.store.update_transient(&mut self.bus, |state| {
            let mut next = state.clone();
            next.view.zoom = (next.view.zoom + delta).clamp(0.1, 10.0);
            next
        });
        self.bus
            .publish(Event::view_zoom(delta, origin, self.bus.now_ms()));
    }

    /// Theme changes are deliberate user actions and participate in
    /// undo, unlike camera motion.
    pub fn set_theme(&mut self, theme: Theme) {
        self.store.update(&mut self.bus, "set theme", |state| {
            let mut next = state.clone();
            next.view.theme = theme;
            next
        });
    }

    fn surface(&mut self, err: &ViewerError, origin: EventType) {
        self.bus.publish(Event::error(
            err.to_string(),
            Some(origin),
            self.bus.now_ms(),
        ));
    }

    fn surfaced(&mut self, err: ViewerError, origin: EventType) -> ViewerError {
        self.surface(&err, origin);
        err
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
