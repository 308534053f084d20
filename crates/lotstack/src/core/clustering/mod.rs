//! Time Clustering Module
//!
//! Groups captured photos into stacks by capture-time proximity.
//! A burst of shots of one item lands in one stack; a pause in shooting
//! starts the next.

use std::time::Duration;

use tracing::{debug, info};

use crate::core::staging::{Photo, Stack, StagingSession};

// =============================================================================
// Cluster Configuration
// =============================================================================

/// Configuration for time-based clustering
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Maximum capture gap between consecutive photos of one stack.
    /// A gap equal to or larger than this starts a new stack.
    pub max_gap: Duration,
    /// Maximum photos per stack; a full stack starts a new one even
    /// within the gap window.
    pub max_group_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_gap: Duration::from_secs(30),
            max_group_size: 4,
        }
    }
}

// =============================================================================
// Clustering
// =============================================================================

/// Clusters photos into stacks by capture time.
///
/// Photos are sorted by timestamp first (stable, so identical timestamps
/// keep their input order). A new stack starts when the gap from the
/// previous photo reaches `max_gap`, or when the current stack is full.
pub fn cluster_by_time(photos: Vec<Photo>, config: &ClusterConfig) -> Vec<Stack> {
    if photos.is_empty() {
        info!("no photos to cluster");
        return Vec::new();
    }

    let mut photos = photos;
    photos.sort_by_key(|p| p.taken_at_ms);

    let max_gap_ms = config.max_gap.as_millis() as i64;
    let cap = config.max_group_size.max(1);

    let mut stacks: Vec<Stack> = Vec::new();
    let mut current: Vec<Photo> = Vec::new();

    for photo in photos {
        if let Some(prev) = current.last() {
            // Gap is measured against the previous photo, so a long burst
            // chains together even when it spans more than one gap window.
            let gap_ms = photo.taken_at_ms - prev.taken_at_ms;
            if gap_ms >= max_gap_ms || current.len() >= cap {
                stacks.push(seal(std::mem::take(&mut current)));
            }
        }
        current.push(photo);
    }
    if !current.is_empty() {
        stacks.push(seal(current));
    }

    debug!(stack_count = stacks.len(), "clustered photos");
    stacks
}

/// Clusters photos and wraps the result in a fresh staging session.
pub fn stage_batch(photos: Vec<Photo>, config: &ClusterConfig) -> StagingSession {
    StagingSession::from_stacks(cluster_by_time(photos, config))
}

fn seal(photos: Vec<Photo>) -> Stack {
    Stack {
        id: ulid::Ulid::new().to_string(),
        photos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo_at_secs(secs: i64) -> Photo {
        Photo::new(secs * 1_000, vec![0xFF])
    }

    fn sizes(stacks: &[Stack]) -> Vec<usize> {
        stacks.iter().map(|s| s.len()).collect()
    }

    #[test]
    fn clusters_split_on_gap() {
        let photos = [0, 5, 10, 50, 55].map(photo_at_secs).to_vec();
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 100,
        };

        let stacks = cluster_by_time(photos, &config);
        assert_eq!(sizes(&stacks), vec![3, 2]);
        assert_eq!(stacks[0].photos[0].taken_at_ms, 0);
        assert_eq!(stacks[1].photos[0].taken_at_ms, 50_000);
    }

    #[test]
    fn gap_equal_to_threshold_starts_new_stack() {
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 100,
        };

        let at_threshold = vec![photo_at_secs(0), photo_at_secs(30)];
        assert_eq!(sizes(&cluster_by_time(at_threshold, &config)), vec![1, 1]);

        let just_under = vec![Photo::new(0, vec![1]), Photo::new(29_999, vec![1])];
        assert_eq!(sizes(&cluster_by_time(just_under, &config)), vec![2]);
    }

    #[test]
    fn gap_chains_from_previous_photo() {
        // Total span exceeds the gap window, but consecutive gaps stay under it.
        let photos = [0, 20, 40].map(photo_at_secs).to_vec();
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 100,
        };

        assert_eq!(sizes(&cluster_by_time(photos, &config)), vec![3]);
    }

    #[test]
    fn size_cap_splits_even_within_gap() {
        let photos = [0, 1, 2, 3, 4].map(photo_at_secs).to_vec();
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 4,
        };

        let stacks = cluster_by_time(photos, &config);
        assert_eq!(sizes(&stacks), vec![4, 1]);
        assert_eq!(stacks[1].photos[0].taken_at_ms, 4_000);
    }

    #[test]
    fn zero_group_size_is_treated_as_one() {
        let photos = [0, 1, 2].map(photo_at_secs).to_vec();
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 0,
        };

        assert_eq!(sizes(&cluster_by_time(photos, &config)), vec![1, 1, 1]);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let photos = [55, 0, 50, 10, 5].map(photo_at_secs).to_vec();
        let config = ClusterConfig {
            max_gap: Duration::from_secs(30),
            max_group_size: 100,
        };

        let stacks = cluster_by_time(photos, &config);
        assert_eq!(sizes(&stacks), vec![3, 2]);
        let times: Vec<i64> = stacks[0].photos.iter().map(|p| p.taken_at_ms).collect();
        assert_eq!(times, vec![0, 5_000, 10_000]);
    }

    #[test]
    fn identical_timestamps_keep_input_order() {
        let a = Photo::new(1_000, vec![1]);
        let b = Photo::new(1_000, vec![2]);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let config = ClusterConfig::default();

        let stacks = cluster_by_time(vec![a, b], &config);
        assert_eq!(sizes(&stacks), vec![2]);
        assert_eq!(stacks[0].photos[0].id, a_id);
        assert_eq!(stacks[0].photos[1].id, b_id);
    }

    #[test]
    fn empty_input_yields_no_stacks() {
        let stacks = cluster_by_time(Vec::new(), &ClusterConfig::default());
        assert!(stacks.is_empty());
    }

    #[test]
    fn stage_batch_wraps_stacks_in_session() {
        let photos = [0, 5, 100].map(photo_at_secs).to_vec();
        let session = stage_batch(photos, &ClusterConfig::default());

        assert_eq!(session.stack_count(), 2);
        assert_eq!(session.total_photos(), 3);
        assert_eq!(session.removed_photos(), 0);
    }
}
