//! Parse stored-model JSON documents into `(Model, Vec<Section>)`.
//!
//! Hosts and fixtures keep sectioned models as flat JSON: model
//! metadata plus a section list with parent links, rest transforms and
//! bounds. Child lists may be given explicitly or derived from the
//! parent links (document order is preserved either way).

use serde::Deserialize;

use crate::error::ViewerError;
use crate::section::{Model, ModelFormat, Section};
use crate::transform::{Aabb, Transform};

/// Parse a stored model document.
///
/// Notes:
/// - `format` is a lowercase extension-style string ("stl", "gltf", ...).
/// - `restTransform` and `rotation` default to identity when omitted.
/// - When a section omits `children`, its child list is derived from
///   the other sections' `parent` links, in document order.
pub fn parse_stored_model_json(s: &str) -> Result<(Model, Vec<Section>), ViewerError> {
    let doc: StoredModel = serde_json::from_str(s)?;

    let mut sections: Vec<Section> = Vec::with_capacity(doc.sections.len());
    for raw in &doc.sections {
        let rest_transform = raw
            .rest_transform
            .as_ref()
            .map(|t| Transform {
                translation: t.translation,
                rotation: t.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
            })
            .unwrap_or_default();
        let bounds = raw
            .bounds
            .as_ref()
            .map(|b| Aabb::new(b.min, b.max))
            .unwrap_or_default();

        let child_ids = match &raw.children {
            Some(children) => children.clone(),
            None => doc
                .sections
                .iter()
                .filter(|other| other.parent.as_deref() == Some(raw.id.as_str()))
                .map(|other| other.id.clone())
                .collect(),
        };

        sections.push(Section {
            id: raw.id.clone(),
            parent_id: raw.parent.clone(),
            child_ids,
            name: raw.name.clone().unwrap_or_else(|| raw.id.clone()),
            rest_transform,
            bounds,
        });
    }

    if sections.is_empty() {
        return Err(ViewerError::InvalidModel {
            reason: format!("model '{}' has no sections", doc.id),
        });
    }

    // Roots first, then the remaining sections in document order.
    let mut section_ids: Vec<String> = sections
        .iter()
        .filter(|s| s.parent_id.is_none())
        .map(|s| s.id.clone())
        .collect();
    section_ids.extend(
        sections
            .iter()
            .filter(|s| s.parent_id.is_some())
            .map(|s| s.id.clone()),
    );

    let model = Model {
        id: doc.id,
        format: ModelFormat::from(doc.format.as_str()),
        section_ids,
        created_at_ms: doc.created_at_ms.unwrap_or(0),
    };
    Ok((model, sections))
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct StoredModel {
    pub id: String,
    pub format: String,
    #[serde(rename = "createdAtMs")]
    pub created_at_ms: Option<u64>,
    pub sections: Vec<StoredSection>,
}

#[derive(Debug, Deserialize)]
struct StoredSection {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<String>>,
    #[serde(rename = "restTransform")]
    pub rest_transform: Option<StoredTransform>,
    pub bounds: Option<StoredAabb>,
}

#[derive(Debug, Deserialize)]
struct StoredTransform {
    pub translation: [f32; 3],
    #[serde(default)]
    pub rotation: Option<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct StoredAabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}
