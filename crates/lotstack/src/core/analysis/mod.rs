//! Vision Analysis Module
//!
//! Identifies items from their photos and drafts catalog metadata.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::catalog::ItemMetadata;
use crate::core::storage::AssetRef;
use crate::core::{CoreError, CoreResult};

pub mod providers;

pub use providers::{OpenAIVisionAnalysis, VisionProviderConfig};

// =============================================================================
// Analysis Request
// =============================================================================

/// Request for vision analysis of one item
#[derive(Clone, Debug, Default)]
pub struct AnalysisRequest {
    /// Uploaded asset references, for provenance and logging
    pub assets: Vec<AssetRef>,
    /// Raw image payloads sent to the analyst, hero shot first
    pub image_bytes: Vec<Vec<u8>>,
    /// Operator context forwarded with the images (e.g. "estate lot 3, attic")
    pub context_notes: String,
    /// Fields the operator already filled in; these always win over
    /// analysis output
    pub known_fields: ItemMetadata,
}

impl AnalysisRequest {
    /// Creates a request from raw image payloads
    pub fn new(image_bytes: Vec<Vec<u8>>) -> Self {
        Self {
            image_bytes,
            ..Default::default()
        }
    }

    /// Attaches uploaded asset references
    pub fn with_assets(mut self, assets: Vec<AssetRef>) -> Self {
        self.assets = assets;
        self
    }

    /// Sets operator context notes
    pub fn with_context_notes(mut self, notes: &str) -> Self {
        self.context_notes = notes.to_string();
        self
    }

    /// Sets already-known metadata fields
    pub fn with_known_fields(mut self, fields: ItemMetadata) -> Self {
        self.known_fields = fields;
        self
    }

    /// Returns the number of images in the request
    pub fn image_count(&self) -> usize {
        self.image_bytes.len()
    }
}

// =============================================================================
// Analysis Adapter Trait
// =============================================================================

/// Trait for vision analysis backends.
///
/// Implementations must reject requests that carry no images.
#[async_trait]
pub trait AnalysisAdapter: Send + Sync {
    /// Returns the adapter name for logging
    fn name(&self) -> &str;

    /// Analyzes an item's photos and returns drafted metadata
    async fn analyze(&self, request: AnalysisRequest) -> CoreResult<ItemMetadata>;
}

// =============================================================================
// Mock Analysis (for testing)
// =============================================================================

/// Mock analysis adapter for tests
pub struct MockAnalysis {
    metadata: ItemMetadata,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockAnalysis {
    pub fn new() -> Self {
        Self {
            metadata: ItemMetadata::default(),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the metadata every analysis returns
    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Makes every analysis call fail
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Delays every analysis call, for timeout tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many analyze calls were made
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAdapter for MockAnalysis {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, request: AnalysisRequest) -> CoreResult<ItemMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if request.image_count() == 0 {
            return Err(CoreError::AnalysisNoImages);
        }
        if self.fail {
            return Err(CoreError::AnalysisFailed(
                "injected analysis failure".to_string(),
            ));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.metadata.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
