//! Disassemble/reassemble state machine.
//!
//! The coordinator owns an ephemeral per-run [`AnimationPlan`] mapping
//! each section to a (start, end) transform pair, and a persistent pose
//! map holding the last interpolated transform per section. `stop()`
//! freezes those poses in place; a later run starts from them, so a
//! half-exploded model reassembles from exactly where it stands.
//!
//! Progress writes go through the store's transient path (throttled by
//! config) — per-frame updates must never become undo steps.

use std::collections::BTreeMap;

use crate::adapters::RendererAdapter;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::event::{Event, EventBus};
use crate::interp::{ease_in_out, lerp_transform};
use crate::section::SectionRegistry;
use crate::state::{AnimationDirection, AnimationStatus, StateStore};
use crate::transform::Transform;

/// Per-run interpolation endpoints, discarded at completion or stop.
#[derive(Clone, Debug, Default)]
pub struct AnimationPlan {
    tracks: BTreeMap<String, (Transform, Transform)>,
}

impl AnimationPlan {
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Drives per-section spatial transforms over time.
pub struct AnimationCoordinator {
    status: AnimationStatus,
    direction: Option<AnimationDirection>,
    elapsed_ms: f32,
    duration_ms: f32,
    progress: f32,
    last_published_progress: f32,
    plan: Option<AnimationPlan>,
    /// Last interpolated pose per section; empty means everything rests.
    poses: BTreeMap<String, Transform>,
    spread_factor: f32,
    progress_publish_step: f32,
}

impl AnimationCoordinator {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            status: AnimationStatus::Idle,
            direction: None,
            elapsed_ms: 0.0,
            duration_ms: 0.0,
            progress: 0.0,
            last_published_progress: 0.0,
            plan: None,
            poses: BTreeMap::new(),
            spread_factor: cfg.spread_factor,
            progress_publish_step: cfg.progress_publish_step,
        }
    }

    #[inline]
    pub fn status(&self) -> AnimationStatus {
        self.status
    }

    #[inline]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.status != AnimationStatus::Idle
    }

    /// The pose a section currently holds: its last interpolated
    /// transform, or its rest transform if it was never displaced.
    pub fn current_pose(
        &self,
        registry: &SectionRegistry,
        id: &str,
    ) -> Result<Transform, ViewerError> {
        if let Some(pose) = self.poses.get(id) {
            return Ok(*pose);
        }
        Ok(registry.section(id)?.rest_transform)
    }

    /// Begin a disassembly run. Each leaf's end transform is its rest
    /// transform translated along (bounds center − model centroid),
    /// scaled by the spread factor; group sections get the mean of
    /// their descendant leaves' displacement.
    pub fn disassemble(
        &mut self,
        registry: &SectionRegistry,
        store: &mut StateStore,
        bus: &mut EventBus,
        duration_ms: f32,
    ) -> Result<(), ViewerError> {
        self.ensure_idle()?;
        if registry.section_count() == 0 {
            return Err(ViewerError::NoActiveModel);
        }
        let centroid = registry.model_centroid().ok_or(ViewerError::NoActiveModel)?;

        let mut tracks = BTreeMap::new();
        for section in registry.sections() {
            let offset = self.spread_offset(registry, &section.id, centroid)?;
            let start = self.current_pose(registry, &section.id)?;
            let end = section.rest_transform.translated(offset);
            tracks.insert(section.id.clone(), (start, end));
        }

        self.begin_run(
            store,
            bus,
            AnimationDirection::Disassemble,
            AnimationPlan { tracks },
            duration_ms,
        );
        Ok(())
    }

    /// Begin a reassembly run: every section returns from its current
    /// pose to its stored rest transform. Always defined, whether or
    /// not a disassembly ever ran.
    pub fn reassemble(
        &mut self,
        registry: &SectionRegistry,
        store: &mut StateStore,
        bus: &mut EventBus,
        duration_ms: f32,
    ) -> Result<(), ViewerError> {
        self.ensure_idle()?;
        if registry.section_count() == 0 {
            return Err(ViewerError::NoActiveModel);
        }

        let mut tracks = BTreeMap::new();
        for section in registry.sections() {
            let start = self.current_pose(registry, &section.id)?;
            tracks.insert(section.id.clone(), (start, section.rest_transform));
        }

        self.begin_run(
            store,
            bus,
            AnimationDirection::Reassemble,
            AnimationPlan { tracks },
            duration_ms,
        );
        Ok(())
    }

    /// Cancel an in-flight run at the next tick boundary. Sections stay
    /// frozen at their current interpolated pose; no completion event.
    pub fn stop(&mut self, store: &mut StateStore, bus: &mut EventBus) {
        if self.status == AnimationStatus::Idle {
            return;
        }
        log::debug!(
            "animation stopped at progress {:.3} ({})",
            self.progress,
            self.status.name()
        );
        self.plan = None;
        self.status = AnimationStatus::Idle;
        self.direction = None;
        let progress = self.progress;
        store.update_transient(bus, |state| {
            let mut next = state.clone();
            next.animation.status = AnimationStatus::Idle;
            next.animation.progress = progress;
            next.animation.direction = None;
            next
        });
    }

    /// Advance the run by `dt` seconds. The host's frame loop calls
    /// this; between calls the coordinator is fully suspended.
    pub fn tick(
        &mut self,
        dt_s: f32,
        store: &mut StateStore,
        bus: &mut EventBus,
        renderer: &mut dyn RendererAdapter,
    ) {
        if self.status == AnimationStatus::Idle {
            return;
        }
        // Take the plan for the duration of the tick; it is restored
        // below unless this tick completes the run.
        let Some(plan) = self.plan.take() else {
            return;
        };

        self.elapsed_ms += dt_s.max(0.0) * 1000.0;
        let raw = if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
        };
        let eased = ease_in_out(raw);

        for (id, (start, end)) in plan.tracks.iter() {
            let pose = lerp_transform(start, end, eased);
            self.poses.insert(id.clone(), pose);
            renderer.apply_section_transform(id, &pose);
        }
        self.progress = raw;

        let complete = raw >= 1.0;
        if complete || raw - self.last_published_progress >= self.progress_publish_step {
            self.last_published_progress = raw;
            let status = self.status;
            let direction = self.direction;
            store.update_transient(bus, |state| {
                let mut next = state.clone();
                next.animation.status = if complete { AnimationStatus::Idle } else { status };
                next.animation.progress = raw;
                next.animation.direction = if complete { None } else { direction };
                next
            });
        }

        if complete {
            let direction = self.direction.take().unwrap_or(AnimationDirection::Disassemble);
            self.status = AnimationStatus::Idle;
            if direction == AnimationDirection::Reassemble {
                // End poses equal rest transforms; drop them so pure
                // reads report rest exactly.
                self.poses.clear();
            }
            log::debug!("animation complete: {}", direction.name());
            bus.publish(Event::animation_complete(direction, bus.now_ms()));
        } else {
            self.plan = Some(plan);
        }
    }

    /// Forget plan and poses without publishing anything. Called when a
    /// new model replaces the active one; stale poses must not leak
    /// into the next model's runs.
    pub fn reset(&mut self) {
        self.plan = None;
        self.poses.clear();
        self.status = AnimationStatus::Idle;
        self.direction = None;
        self.elapsed_ms = 0.0;
        self.duration_ms = 0.0;
        self.progress = 0.0;
        self.last_published_progress = 0.0;
    }

    fn ensure_idle(&self) -> Result<(), ViewerError> {
        if self.status != AnimationStatus::Idle {
            return Err(ViewerError::AlreadyAnimating {
                status: self.status.name().to_string(),
            });
        }
        Ok(())
    }

    fn begin_run(
        &mut self,
        store: &mut StateStore,
        bus: &mut EventBus,
        direction: AnimationDirection,
        plan: AnimationPlan,
        duration_ms: f32,
    ) {
        let status = match direction {
            AnimationDirection::Disassemble => AnimationStatus::Disassembling,
            AnimationDirection::Reassemble => AnimationStatus::Reassembling,
        };
        log::debug!(
            "{} started: {} sections over {duration_ms}ms",
            direction.name(),
            plan.len()
        );
        self.plan = Some(plan);
        self.status = status;
        self.direction = Some(direction);
        self.elapsed_ms = 0.0;
        self.duration_ms = duration_ms;
        self.progress = 0.0;
        self.last_published_progress = 0.0;

        store.update_transient(bus, |state| {
            let mut next = state.clone();
            next.animation.status = status;
            next.animation.progress = 0.0;
            next.animation.direction = Some(direction);
            next
        });
        bus.publish(Event::animation_start(direction, bus.now_ms()));
    }

    /// Displacement for one section: leaves project outward from the
    /// centroid; groups average their descendant leaves.
    fn spread_offset(
        &self,
        registry: &SectionRegistry,
        id: &str,
        centroid: [f32; 3],
    ) -> Result<[f32; 3], ViewerError> {
        let section = registry.section(id)?;
        if section.is_leaf() {
            let center = section.bounds.center();
            return Ok([
                (center[0] - centroid[0]) * self.spread_factor,
                (center[1] - centroid[1]) * self.spread_factor,
                (center[2] - centroid[2]) * self.spread_factor,
            ]);
        }

        let mut sum = [0.0f32; 3];
        let mut count = 0usize;
        for descendant_id in registry.with_descendants(id)? {
            let descendant = registry.section(&descendant_id)?;
            if !descendant.is_leaf() {
                continue;
            }
            let center = descendant.bounds.center();
            sum[0] += (center[0] - centroid[0]) * self.spread_factor;
            sum[1] += (center[1] - centroid[1]) * self.spread_factor;
            sum[2] += (center[2] - centroid[2]) * self.spread_factor;
            count += 1;
        }
        if count == 0 {
            return Ok([0.0; 3]);
        }
        let n = count as f32;
        Ok([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}
