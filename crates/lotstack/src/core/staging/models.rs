//! Staging Model Definitions
//!
//! Defines Photo, Stack, and StagingSession for batch staging.
//! Uses denormalized structure - stacks own their photos directly.

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult, PhotoId, SessionId, StackId, TimestampMs};

// =============================================================================
// Photo
// =============================================================================

/// A single captured photo.
///
/// Photos are immutable once created; editing operations move them between
/// stacks but never alter them. Image bytes are kept in memory for the
/// lifetime of the session and are not serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: PhotoId,
    /// Capture time in milliseconds since the Unix epoch
    pub taken_at_ms: TimestampMs,
    /// Raw image payload (JPEG/PNG bytes as captured)
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Original file name, when the photo came from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Photo {
    /// Creates a new photo with the given capture time and payload
    pub fn new(taken_at_ms: TimestampMs, bytes: Vec<u8>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            taken_at_ms,
            bytes,
            file_name: None,
        }
    }

    /// Sets the original file name
    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self
    }
}

// =============================================================================
// Stack
// =============================================================================

/// An ordered group of photos representing one physical item.
///
/// The first photo is the hero shot shown as the stack cover and uploaded
/// first during ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: StackId,
    /// Photos stored directly, in display/upload order
    pub photos: Vec<Photo>,
}

impl Stack {
    /// Creates a stack holding a single photo
    pub fn single(photo: Photo) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            photos: vec![photo],
        }
    }

    /// Creates a stack from an ordered list of photos
    pub fn from_photos(photos: Vec<Photo>) -> CoreResult<Self> {
        if photos.is_empty() {
            return Err(CoreError::ValidationError(
                "stack requires at least one photo".to_string(),
            ));
        }
        Ok(Self {
            id: ulid::Ulid::new().to_string(),
            photos,
        })
    }

    /// Returns the hero (cover) photo
    pub fn hero(&self) -> Option<&Photo> {
        self.photos.first()
    }

    /// Returns the number of photos in the stack
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    /// Returns true if the stack holds no photos
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

// =============================================================================
// Staging Session
// =============================================================================

/// A staging session: the ordered set of stacks a user reviews and edits
/// before submitting the batch for ingestion.
///
/// The session tracks photo conservation: every photo that entered the
/// session is either still in some stack or was explicitly removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingSession {
    pub id: SessionId,
    /// Stacks in display order
    pub stacks: Vec<Stack>,
    pub created_at: String,
    pub(super) initial_photo_count: usize,
    pub(super) removed_photo_count: usize,
}

impl StagingSession {
    /// Creates a session from an ordered list of stacks
    pub fn from_stacks(stacks: Vec<Stack>) -> Self {
        let initial_photo_count = stacks.iter().map(|s| s.len()).sum();
        Self {
            id: ulid::Ulid::new().to_string(),
            stacks,
            created_at: chrono::Utc::now().to_rfc3339(),
            initial_photo_count,
            removed_photo_count: 0,
        }
    }

    /// Returns the number of stacks in the session
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Returns the total number of photos across all stacks
    pub fn total_photos(&self) -> usize {
        self.stacks.iter().map(|s| s.len()).sum()
    }

    /// Returns the number of photos explicitly removed from the session
    pub fn removed_photos(&self) -> usize {
        self.removed_photo_count
    }

    /// Gets a stack by ID
    pub fn get_stack(&self, stack_id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == stack_id)
    }

    /// Gets a mutable stack by ID
    pub fn get_stack_mut(&mut self, stack_id: &str) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|s| s.id == stack_id)
    }

    /// Returns the display position of a stack, if present
    pub fn position_of(&self, stack_id: &str) -> Option<usize> {
        self.stacks.iter().position(|s| s.id == stack_id)
    }

    /// Checks the photo conservation invariant in debug builds.
    ///
    /// Photos only move between stacks or get explicitly removed, so the
    /// photos still staged plus the photos removed must equal the count
    /// the session started with.
    pub(super) fn debug_assert_balanced(&self) {
        debug_assert_eq!(
            self.total_photos() + self.removed_photo_count,
            self.initial_photo_count,
            "photo conservation violated in session {}",
            self.id
        );
    }
}
