//! Section hierarchy: models, the section arena, and the registry.
//!
//! Sections form a forest keyed by id; parent/child relationships are
//! stored as id references only, never as mutual object references, so
//! the hierarchy is trivially serializable and comparable. The arena is
//! rebuilt wholesale on every load — selection and isolation reset in
//! the same state transition, so navigation never races a stale index.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::event::{Event, EventBus};
use crate::state::{SectionView, StateStore};
use crate::transform::{Aabb, Transform};

/// Source format of a loaded model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ModelFormat {
    Gltf,
    Obj,
    Stl,
    Step,
    Ply,
    Off,
    Iges,
    Other(String),
}

impl ModelFormat {
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Self::Gltf => "gltf",
            Self::Obj => "obj",
            Self::Stl => "stl",
            Self::Step => "step",
            Self::Ply => "ply",
            Self::Off => "off",
            Self::Iges => "iges",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ModelFormat {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "gltf" | "glb" => Self::Gltf,
            "obj" => Self::Obj,
            "stl" => Self::Stl,
            "step" | "stp" => Self::Step,
            "ply" => Self::Ply,
            "off" => Self::Off,
            "iges" | "igs" => Self::Iges,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Model metadata. Owned by the registry's repository; snapshots carry
/// copies, the arena holds the active model's sections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub format: ModelFormat,
    /// All section ids, roots first, in model-declared order.
    pub section_ids: Vec<String>,
    pub created_at_ms: u64,
}

/// A named, independently addressable sub-part of a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub parent_id: Option<String>,
    /// Ordered children; each child appears exactly once.
    pub child_ids: Vec<String>,
    pub name: String,
    pub rest_transform: Transform,
    pub bounds: Aabb,
}

impl Section {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}

/// Builds and maintains the section hierarchy for the active model and
/// routes selection/isolation through the state store.
#[derive(Default)]
pub struct SectionRegistry {
    models: BTreeMap<String, Model>,
    active: Option<String>,
    sections: IndexMap<String, Section>,
    roots: Vec<String>,
    /// Transient hover highlight; deliberately outside AppState so it
    /// never becomes an undo step.
    highlighted: BTreeSet<String>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active section set from a finished load. Rebuilds the
    /// parent/child index, evicts the superseded model, clears selection
    /// and isolation atomically in one state transition, drops undo
    /// history (a load starts a new timeline), and publishes
    /// `ModelLoadSuccess`.
    pub fn load_model(
        &mut self,
        store: &mut StateStore,
        bus: &mut EventBus,
        model: Model,
        sections: Vec<Section>,
    ) -> Result<(), ViewerError> {
        validate_hierarchy(&model, &sections)?;

        let mut arena: IndexMap<String, Section> = IndexMap::with_capacity(sections.len());
        for section in sections {
            arena.insert(section.id.clone(), section);
        }
        let roots: Vec<String> = model
            .section_ids
            .iter()
            .filter(|id| {
                arena
                    .get(id.as_str())
                    .is_some_and(|s| s.parent_id.is_none())
            })
            .cloned()
            .collect();

        let model_id = model.id.clone();
        let section_count = arena.len();
        log::debug!("model {model_id} loaded with {section_count} sections");

        // At most one model is live; the replaced one is destroyed.
        self.models.clear();
        self.models.insert(model_id.clone(), model.clone());
        self.active = Some(model_id.clone());
        self.sections = arena;
        self.roots = roots;
        self.highlighted.clear();

        let views: BTreeMap<String, SectionView> = self
            .sections
            .values()
            .map(|s| {
                (
                    s.id.clone(),
                    SectionView {
                        id: s.id.clone(),
                        name: s.name.clone(),
                        parent_id: s.parent_id.clone(),
                    },
                )
            })
            .collect();

        store.update(bus, "load model", move |state| {
            let mut next = state.clone();
            next.models.items.clear();
            next.models.items.insert(model_id.clone(), model.clone());
            next.models.active = Some(model_id.clone());
            next.sections.items = views.clone();
            next.sections.selected.clear();
            next.sections.isolated = None;
            next
        });
        // Undo must not reach across the load: earlier snapshots name
        // sections this arena can no longer resolve.
        store.clear_history();

        bus.publish(Event::model_load_success(
            self.active.clone().unwrap_or_default(),
            section_count,
            bus.now_ms(),
        ));
        Ok(())
    }

    /// Id of the active model, if any.
    #[inline]
    pub fn active_model(&self) -> Option<&Model> {
        self.active.as_ref().and_then(|id| self.models.get(id))
    }

    #[inline]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, id: &str) -> Result<&Section, ViewerError> {
        self.sections
            .get(id)
            .ok_or_else(|| ViewerError::SectionNotFound { id: id.to_string() })
    }

    /// Parent of `id`, or `None` when `id` is a root.
    pub fn parent(&self, id: &str) -> Result<Option<&Section>, ViewerError> {
        let section = self.section(id)?;
        Ok(section
            .parent_id
            .as_deref()
            .and_then(|pid| self.sections.get(pid)))
    }

    /// Children of `id` in model-declared order.
    pub fn children(&self, id: &str) -> Result<Vec<&Section>, ViewerError> {
        let section = self.section(id)?;
        Ok(section
            .child_ids
            .iter()
            .filter_map(|cid| self.sections.get(cid.as_str()))
            .collect())
    }

    /// Root sections in model-declared order.
    pub fn roots(&self) -> Vec<&Section> {
        self.roots
            .iter()
            .filter_map(|id| self.sections.get(id.as_str()))
            .collect()
    }

    /// All sections in model-declared order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// `id` plus every transitive descendant, depth first.
    pub fn with_descendants(&self, id: &str) -> Result<Vec<String>, ViewerError> {
        self.section(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(section) = self.sections.get(current.as_str()) {
                out.push(current);
                for child in section.child_ids.iter().rev() {
                    stack.push(child.clone());
                }
            }
        }
        Ok(out)
    }

    /// Update the selection set. Non-additive selection replaces the
    /// set with `{id}`; additive selection inserts (idempotent on the
    /// set, but a `SectionSelect` event is still published for UI
    /// feedback).
    pub fn select_section(
        &mut self,
        store: &mut StateStore,
        bus: &mut EventBus,
        id: &str,
        additive: bool,
    ) -> Result<(), ViewerError> {
        self.section(id)?;
        let section_id = id.to_string();
        store.update(bus, "select section", |state| {
            let mut next = state.clone();
            if !additive {
                next.sections.selected.clear();
            }
            next.sections.selected.insert(section_id.clone());
            next
        });
        bus.publish(Event::section_select(id, additive, bus.now_ms()));
        Ok(())
    }

    /// Remove `id` from the selection set; a no-op (not an error) when
    /// the id is known but not currently selected.
    pub fn deselect_section(
        &mut self,
        store: &mut StateStore,
        bus: &mut EventBus,
        id: &str,
    ) -> Result<(), ViewerError> {
        self.section(id)?;
        let section_id = id.to_string();
        store.update(bus, "deselect section", |state| {
            let mut next = state.clone();
            next.sections.selected.remove(&section_id);
            next
        });
        bus.publish(Event::section_deselect(id, bus.now_ms()));
        Ok(())
    }

    /// Currently selected sections (order-independent).
    pub fn selected_sections<'a>(&'a self, store: &StateStore) -> Vec<&'a Section> {
        store
            .state()
            .sections
            .selected
            .iter()
            .filter_map(|id| self.sections.get(id.as_str()))
            .collect()
    }

    /// Set the isolation set to exactly `ids`, replacing any prior
    /// isolation. The registry tracks the authoritative set; hiding is
    /// the renderer's reaction to the emitted event.
    pub fn isolate_sections(
        &mut self,
        store: &mut StateStore,
        bus: &mut EventBus,
        ids: &[String],
    ) -> Result<(), ViewerError> {
        for id in ids {
            self.section(id)?;
        }
        let set: BTreeSet<String> = ids.iter().cloned().collect();
        store.update(bus, "isolate sections", |state| {
            let mut next = state.clone();
            next.sections.isolated = Some(set.clone());
            next
        });
        bus.publish(Event::section_isolate(ids.to_vec(), bus.now_ms()));
        Ok(())
    }

    /// Clear the isolation set. Publishes `SectionIsolate` with an empty
    /// id list.
    pub fn show_all_sections(&mut self, store: &mut StateStore, bus: &mut EventBus) {
        store.update(bus, "show all sections", |state| {
            let mut next = state.clone();
            next.sections.isolated = None;
            next
        });
        bus.publish(Event::section_isolate(Vec::new(), bus.now_ms()));
    }

    /// Toggle the transient hover highlight. Not routed through the
    /// store: a visual highlight is not a meaningful undo step.
    pub fn highlight_section(
        &mut self,
        bus: &mut EventBus,
        id: &str,
        on: bool,
    ) -> Result<(), ViewerError> {
        self.section(id)?;
        if on {
            self.highlighted.insert(id.to_string());
        } else {
            self.highlighted.remove(id);
        }
        bus.publish(Event::section_highlight(id, on, bus.now_ms()));
        Ok(())
    }

    #[inline]
    pub fn is_highlighted(&self, id: &str) -> bool {
        self.highlighted.contains(id)
    }

    /// Mean of leaf-section bounds centers; the explosion origin.
    pub fn model_centroid(&self) -> Option<[f32; 3]> {
        let mut sum = [0.0f32; 3];
        let mut count = 0usize;
        for section in self.sections.values().filter(|s| s.is_leaf()) {
            let c = section.bounds.center();
            sum[0] += c[0];
            sum[1] += c[1];
            sum[2] += c[2];
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f32;
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}

/// Validate a section forest against its model before any state change.
fn validate_hierarchy(model: &Model, sections: &[Section]) -> Result<(), ViewerError> {
    let mut ids: BTreeSet<&str> = BTreeSet::new();
    for section in sections {
        if !ids.insert(section.id.as_str()) {
            return Err(ViewerError::InvalidHierarchy {
                reason: format!("duplicate section id '{}'", section.id),
            });
        }
    }

    if model.section_ids.len() != sections.len() {
        return Err(ViewerError::InvalidModel {
            reason: format!(
                "model lists {} section ids but {} sections were supplied",
                model.section_ids.len(),
                sections.len()
            ),
        });
    }
    for id in &model.section_ids {
        if !ids.contains(id.as_str()) {
            return Err(ViewerError::InvalidModel {
                reason: format!("model references unknown section '{id}'"),
            });
        }
    }

    let by_id: BTreeMap<&str, &Section> = sections.iter().map(|s| (s.id.as_str(), s)).collect();
    for section in sections {
        if let Some(parent_id) = section.parent_id.as_deref() {
            let parent = by_id.get(parent_id).ok_or_else(|| ViewerError::InvalidHierarchy {
                reason: format!(
                    "section '{}' references missing parent '{parent_id}'",
                    section.id
                ),
            })?;
            let occurrences = parent
                .child_ids
                .iter()
                .filter(|c| c.as_str() == section.id)
                .count();
            if occurrences != 1 {
                return Err(ViewerError::InvalidHierarchy {
                    reason: format!(
                        "parent '{parent_id}' lists child '{}' {occurrences} times",
                        section.id
                    ),
                });
            }
        }
        for child in &section.child_ids {
            let child_section =
                by_id.get(child.as_str()).ok_or_else(|| ViewerError::InvalidHierarchy {
                    reason: format!("section '{}' lists missing child '{child}'", section.id),
                })?;
            if child_section.parent_id.as_deref() != Some(section.id.as_str()) {
                return Err(ViewerError::InvalidHierarchy {
                    reason: format!(
                        "child '{child}' does not point back to parent '{}'",
                        section.id
                    ),
                });
            }
        }
    }

    // Cycle check: a parent chain longer than the section count must loop.
    for section in sections {
        let mut cursor = section.parent_id.as_deref();
        let mut steps = 0usize;
        while let Some(pid) = cursor {
            steps += 1;
            if steps > sections.len() {
                return Err(ViewerError::InvalidHierarchy {
                    reason: format!("cycle reachable from section '{}'", section.id),
                });
            }
            cursor = by_id.get(pid).and_then(|p| p.parent_id.as_deref());
        }
    }

    Ok(())
}
