//! Catalog Model Definitions
//!
//! Defines CatalogRecord, ItemMetadata, and the patch type used to
//! update records through the store.

use serde::{Deserialize, Serialize};

use crate::core::storage::AssetRef;
use crate::core::{OwnerId, RecordId};

// =============================================================================
// Record Status
// =============================================================================

/// Lifecycle status of a catalog record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    /// Placeholder created at the start of ingestion; not yet cataloged
    #[default]
    Undetermined,
    /// Ingestion finished; assets and metadata are attached
    Cataloged,
    /// Ingestion failed; the record is kept for manual retry
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Undetermined => "undetermined",
            RecordStatus::Cataloged => "cataloged",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undetermined" => Some(RecordStatus::Undetermined),
            "cataloged" => Some(RecordStatus::Cataloged),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

// =============================================================================
// Item Metadata
// =============================================================================

/// Descriptive metadata for a cataloged item.
///
/// Every field is optional: records start empty and get filled by vision
/// analysis or by hand. Fields the caller already knows always win over
/// analysis output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Low end of the estimated value range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_low: Option<f64>,
    /// High end of the estimated value range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_high: Option<f64>,
    /// Analyst confidence (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Specific search keywords for resale listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_terms: Option<String>,
    /// Broader fallback keywords
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_terms_broad: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_blurb: Option<String>,
    /// Open questions the analysis wants answered about the item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
}

impl ItemMetadata {
    /// Returns true when no field carries a value
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.title.is_none()
            && self.maker.is_none()
            && self.style.is_none()
            && self.materials.is_none()
            && self.markings.is_none()
            && self.era.is_none()
            && self.condition.is_none()
            && self.valuation_low.is_none()
            && self.valuation_high.is_none()
            && self.confidence.is_none()
            && self.confidence_reason.is_none()
            && self.reasoning.is_none()
            && self.search_terms.is_none()
            && self.search_terms_broad.is_none()
            && self.sales_blurb.is_none()
            && self.questions.is_empty()
    }

    /// Fills empty fields from `other` without touching fields that are
    /// already set. Used to layer analysis output under known facts.
    pub fn merge_missing(&mut self, other: ItemMetadata) {
        if self.category.is_none() {
            self.category = other.category;
        }
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.maker.is_none() {
            self.maker = other.maker;
        }
        if self.style.is_none() {
            self.style = other.style;
        }
        if self.materials.is_none() {
            self.materials = other.materials;
        }
        if self.markings.is_none() {
            self.markings = other.markings;
        }
        if self.era.is_none() {
            self.era = other.era;
        }
        if self.condition.is_none() {
            self.condition = other.condition;
        }
        if self.valuation_low.is_none() {
            self.valuation_low = other.valuation_low;
        }
        if self.valuation_high.is_none() {
            self.valuation_high = other.valuation_high;
        }
        if self.confidence.is_none() {
            self.confidence = other.confidence;
        }
        if self.confidence_reason.is_none() {
            self.confidence_reason = other.confidence_reason;
        }
        if self.reasoning.is_none() {
            self.reasoning = other.reasoning;
        }
        if self.search_terms.is_none() {
            self.search_terms = other.search_terms;
        }
        if self.search_terms_broad.is_none() {
            self.search_terms_broad = other.search_terms_broad;
        }
        if self.sales_blurb.is_none() {
            self.sales_blurb = other.sales_blurb;
        }
        if self.questions.is_empty() {
            self.questions = other.questions;
        }
    }
}

// =============================================================================
// Catalog Record
// =============================================================================

/// A durable catalog record for one physical item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub status: RecordStatus,
    /// Uploaded photo assets in display order (hero first)
    pub assets: Vec<AssetRef>,
    pub metadata: ItemMetadata,
    /// Free-form operator notes
    pub notes: String,
    /// Why the last ingestion attempt failed, when status is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// When vision analysis last ran for this record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
}

impl CatalogRecord {
    /// Creates a fresh placeholder record for an owner
    pub fn new(owner_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: ulid::Ulid::new().to_string(),
            owner_id: owner_id.to_string(),
            status: RecordStatus::Undetermined,
            assets: Vec::new(),
            metadata: ItemMetadata::default(),
            notes: String::new(),
            failure_reason: None,
            created_at: now.clone(),
            updated_at: now,
            analyzed_at: None,
        }
    }
}

// =============================================================================
// Record Patch
// =============================================================================

/// Partial update applied to a catalog record.
///
/// Unset fields leave the record untouched. `failure_reason` is doubly
/// optional so a patch can distinguish "leave as is" from "clear it".
#[derive(Clone, Debug, Default)]
pub struct RecordPatch {
    pub status: Option<RecordStatus>,
    pub assets: Option<Vec<AssetRef>>,
    pub metadata: Option<ItemMetadata>,
    pub notes: Option<String>,
    pub failure_reason: Option<Option<String>>,
    pub analyzed_at: Option<String>,
}

impl RecordPatch {
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_assets(mut self, assets: Vec<AssetRef>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Sets or clears the failure reason
    pub fn with_failure_reason(mut self, reason: Option<String>) -> Self {
        self.failure_reason = Some(reason);
        self
    }

    pub fn with_analyzed_at(mut self, timestamp: &str) -> Self {
        self.analyzed_at = Some(timestamp.to_string());
        self
    }

    /// Applies the patch to a record and bumps its update timestamp
    pub fn apply(self, record: &mut CatalogRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(assets) = self.assets {
            record.assets = assets;
        }
        if let Some(metadata) = self.metadata {
            record.metadata = metadata;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
        if let Some(failure_reason) = self.failure_reason {
            record.failure_reason = failure_reason;
        }
        if let Some(analyzed_at) = self.analyzed_at {
            record.analyzed_at = Some(analyzed_at);
        }
        record.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

// =============================================================================
// Catalog Change Notification
// =============================================================================

/// Broadcast after every record mutation: the owner's refreshed listing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogChange {
    pub owner_id: OwnerId,
    pub records: Vec<CatalogRecord>,
}

// =============================================================================
// Tests
// =============================================================================
