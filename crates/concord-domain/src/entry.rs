//! Entry module - the per-item knowledge base record
//!
//! An entry keeps the raw value every authority layer supplied for a field
//! (one [`LayerBlock`] per layer) next to the consolidated value currently
//! believed correct, plus the history that explains how it got there.

use crate::{AuthorityLayer, FieldProvenance, FieldValue, ResolutionRecord, UpdateRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity fields stored in the metadata block
pub const IDENTITY_FIELDS: [&str; 3] = ["id", "mnemonic", "category"];

/// Identity and classification block of an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Stable entry identifier (e.g. `mov-instruction`)
    #[serde(default)]
    pub id: String,

    /// Instruction mnemonic or component name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,

    /// Category used for statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Any other metadata keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

/// Values supplied by one authority layer
///
/// The schema keys are fixed; everything else is a field value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerBlock {
    /// Date the layer was last extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_date: Option<String>,

    /// Source document tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Fields of this layer superseded by a higher layer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overridden_by: BTreeMap<String, AuthorityLayer>,

    /// Field values
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl LayerBlock {
    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Set a field value
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Whether a higher layer has superseded this layer's value for `field`
    pub fn is_overridden(&self, field: &str) -> bool {
        self.overridden_by.contains_key(field)
    }
}

/// A knowledge base entry
///
/// # Examples
///
/// ```
/// use concord_domain::{AuthorityLayer, Entry, FieldValue};
///
/// let mut entry = Entry::new("mov-instruction");
/// entry.layer_or_default(AuthorityLayer::Baseline).set("timing", FieldValue::from("2"));
/// assert_eq!(entry.layers_present(), 1);
/// assert_eq!(entry.id(), "mov-instruction");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Identity block
    #[serde(default)]
    pub metadata: EntryMetadata,

    /// Completeness score (layers present plus key sections)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness_score: Option<u32>,

    /// Baseline layer block
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "layer1_csv")]
    pub layer1: Option<LayerBlock>,

    /// Confirmed layer block
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "layer2_datasheet")]
    pub layer2: Option<LayerBlock>,

    /// Verified layer block
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "layer3_silicon_doc")]
    pub layer3: Option<LayerBlock>,

    /// Absolute layer block
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "layer4_clarifications")]
    pub layer4: Option<LayerBlock>,

    /// Per-field provenance of consolidated values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<String, FieldProvenance>,

    /// Applied conflict resolutions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_resolutions: Vec<ResolutionRecord>,

    /// Propagation history
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_history: Vec<UpdateRecord>,

    /// Date of the last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    /// Consolidated field values
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entry {
    /// Create an empty entry with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            metadata: EntryMetadata {
                id: id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Entry identifier
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Borrow a layer block
    pub fn layer(&self, layer: AuthorityLayer) -> Option<&LayerBlock> {
        match layer {
            AuthorityLayer::Baseline => self.layer1.as_ref(),
            AuthorityLayer::Confirmed => self.layer2.as_ref(),
            AuthorityLayer::Verified => self.layer3.as_ref(),
            AuthorityLayer::Absolute => self.layer4.as_ref(),
        }
    }

    /// Mutably borrow a layer slot
    pub fn layer_mut(&mut self, layer: AuthorityLayer) -> &mut Option<LayerBlock> {
        match layer {
            AuthorityLayer::Baseline => &mut self.layer1,
            AuthorityLayer::Confirmed => &mut self.layer2,
            AuthorityLayer::Verified => &mut self.layer3,
            AuthorityLayer::Absolute => &mut self.layer4,
        }
    }

    /// Mutably borrow a layer block, creating it if absent
    pub fn layer_or_default(&mut self, layer: AuthorityLayer) -> &mut LayerBlock {
        self.layer_mut(layer).get_or_insert_with(LayerBlock::default)
    }

    /// Present layer blocks in ascending authority order
    pub fn layers(&self) -> Vec<(AuthorityLayer, &LayerBlock)> {
        AuthorityLayer::ALL
            .iter()
            .filter_map(|l| self.layer(*l).map(|block| (*l, block)))
            .collect()
    }

    /// Number of layer blocks present
    pub fn layers_present(&self) -> usize {
        self.layers().len()
    }

    /// Highest layer present, if any
    pub fn highest_layer(&self) -> Option<AuthorityLayer> {
        self.layers().last().map(|(l, _)| *l)
    }

    /// Current consolidated value of a field
    ///
    /// Identity fields are read from the metadata block.
    pub fn consolidated(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" if !self.metadata.id.is_empty() => Some(FieldValue::Text(self.metadata.id.clone())),
            "id" => None,
            "mnemonic" => self.metadata.mnemonic.clone().map(FieldValue::Text),
            "category" => self.metadata.category.clone().map(FieldValue::Text),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Overwrite the consolidated value of a field
    pub fn set_consolidated(&mut self, field: &str, value: FieldValue) {
        match field {
            "id" => self.metadata.id = value.to_string(),
            "mnemonic" => self.metadata.mnemonic = Some(value.to_string()),
            "category" => self.metadata.category = Some(value.to_string()),
            _ => {
                self.fields.insert(field.to_string(), value);
            }
        }
    }

    /// Flattened field map used for version comparison
    ///
    /// Keys look like `metadata.mnemonic`, `description`, `layer3.timing`.
    /// History and provenance are bookkeeping and are left out.
    pub fn comparable_fields(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert("metadata.id".to_string(), self.metadata.id.clone());
        if let Some(m) = &self.metadata.mnemonic {
            out.insert("metadata.mnemonic".to_string(), m.clone());
        }
        if let Some(c) = &self.metadata.category {
            out.insert("metadata.category".to_string(), c.clone());
        }
        for (k, v) in &self.metadata.extra {
            out.insert(format!("metadata.{}", k), v.to_string());
        }
        if let Some(score) = self.completeness_score {
            out.insert("completeness_score".to_string(), score.to_string());
        }
        for (k, v) in &self.fields {
            out.insert(k.clone(), v.to_string());
        }
        for (layer, block) in self.layers() {
            for (k, v) in &block.fields {
                out.insert(format!("{}.{}", layer.key(), k), v.to_string());
            }
        }
        out
    }
}
