//! Stack Editing Operations
//!
//! Implements the review-screen operations applied to a staging session:
//! merging, splitting, exploding, reordering, and removing stacks.
//! Every operation preserves photo conservation - photos move between
//! stacks or are explicitly removed, never duplicated or silently lost.

use std::collections::HashSet;

use tracing::debug;

use crate::core::{CoreError, CoreResult, StackId};

use super::models::{Stack, StagingSession};

impl StagingSession {
    /// Merges two or more stacks into a new stack placed at the front of
    /// the session.
    ///
    /// Photos are concatenated in session order (the order the source
    /// stacks appear on screen), not in selection order. The merged stack
    /// gets a fresh ID; the source stacks are removed.
    pub fn merge_stacks(&mut self, stack_ids: &[StackId]) -> CoreResult<StackId> {
        if stack_ids.len() < 2 {
            return Err(CoreError::MergeSelectionTooSmall(stack_ids.len()));
        }

        let mut seen = HashSet::new();
        for id in stack_ids {
            if !seen.insert(id.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "duplicate stack in merge selection: {id}"
                )));
            }
            if self.position_of(id).is_none() {
                return Err(CoreError::StackNotFound(id.clone()));
            }
        }

        let selected: HashSet<&str> = stack_ids.iter().map(|s| s.as_str()).collect();
        let mut merged_photos = Vec::new();
        let mut remaining = Vec::with_capacity(self.stacks.len());
        for stack in self.stacks.drain(..) {
            if selected.contains(stack.id.as_str()) {
                merged_photos.extend(stack.photos);
            } else {
                remaining.push(stack);
            }
        }

        let merged = Stack::from_photos(merged_photos)?;
        let merged_id = merged.id.clone();
        self.stacks = remaining;
        self.stacks.insert(0, merged);

        debug!(
            session_id = %self.id,
            merged_id = %merged_id,
            source_count = stack_ids.len(),
            "merged stacks"
        );
        self.debug_assert_balanced();
        Ok(merged_id)
    }

    /// Extracts one photo out of a stack into a new single-photo stack
    /// appended at the end of the session.
    ///
    /// If the source stack becomes empty it is deleted from the session.
    pub fn split_photo_out(
        &mut self,
        stack_id: &StackId,
        photo_index: usize,
    ) -> CoreResult<StackId> {
        let pos = self
            .position_of(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.clone()))?;

        let len = self.stacks[pos].len();
        if photo_index >= len {
            return Err(CoreError::PhotoIndexOutOfRange {
                stack_id: stack_id.clone(),
                index: photo_index,
                len,
            });
        }

        let photo = self.stacks[pos].photos.remove(photo_index);
        if self.stacks[pos].is_empty() {
            self.stacks.remove(pos);
        }

        let new_stack = Stack::single(photo);
        let new_id = new_stack.id.clone();
        self.stacks.push(new_stack);

        self.debug_assert_balanced();
        Ok(new_id)
    }

    /// Explodes a stack into one single-photo stack per photo.
    ///
    /// The new stacks are appended at the end of the session in the
    /// photo order of the original stack, which is removed.
    pub fn explode_stack(&mut self, stack_id: &StackId) -> CoreResult<Vec<StackId>> {
        let pos = self
            .position_of(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.clone()))?;

        if self.stacks[pos].len() <= 1 {
            return Err(CoreError::StackNotSplittable(stack_id.clone()));
        }

        let stack = self.stacks.remove(pos);
        let mut new_ids = Vec::with_capacity(stack.len());
        for photo in stack.photos {
            let single = Stack::single(photo);
            new_ids.push(single.id.clone());
            self.stacks.push(single);
        }

        debug!(
            session_id = %self.id,
            stack_id = %stack_id,
            new_count = new_ids.len(),
            "exploded stack"
        );
        self.debug_assert_balanced();
        Ok(new_ids)
    }

    /// Moves a photo to a new position within its stack.
    ///
    /// Uses remove-then-insert semantics: the destination index applies to
    /// the list after the photo has been taken out.
    pub fn reorder_within_stack(
        &mut self,
        stack_id: &StackId,
        from_index: usize,
        to_index: usize,
    ) -> CoreResult<()> {
        let stack = self
            .get_stack_mut(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.clone()))?;

        let len = stack.len();
        if from_index >= len || to_index >= len {
            let index = if from_index >= len {
                from_index
            } else {
                to_index
            };
            return Err(CoreError::PhotoIndexOutOfRange {
                stack_id: stack_id.clone(),
                index,
                len,
            });
        }
        if from_index == to_index {
            return Ok(());
        }

        let photo = stack.photos.remove(from_index);
        stack.photos.insert(to_index, photo);

        self.debug_assert_balanced();
        Ok(())
    }

    /// Moves a stack to a new display position within the session.
    pub fn move_stack(&mut self, stack_id: &StackId, target_index: usize) -> CoreResult<()> {
        let pos = self
            .position_of(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.clone()))?;

        if target_index >= self.stacks.len() {
            return Err(CoreError::InvalidStackPosition(target_index));
        }
        if pos == target_index {
            return Ok(());
        }

        let stack = self.stacks.remove(pos);
        self.stacks.insert(target_index, stack);

        self.debug_assert_balanced();
        Ok(())
    }

    /// Drops one stack onto another, appending the dragged stack's photos
    /// after the target's photos.
    ///
    /// The target keeps its ID and display position; the dragged stack is
    /// removed from the session. Dropping a stack onto itself is a no-op.
    pub fn drop_stack_onto(&mut self, source_id: &StackId, target_id: &StackId) -> CoreResult<()> {
        if source_id == target_id {
            if self.position_of(source_id).is_none() {
                return Err(CoreError::StackNotFound(source_id.clone()));
            }
            return Ok(());
        }

        let source_pos = self
            .position_of(source_id)
            .ok_or_else(|| CoreError::StackNotFound(source_id.clone()))?;
        if self.position_of(target_id).is_none() {
            return Err(CoreError::StackNotFound(target_id.clone()));
        }

        let source = self.stacks.remove(source_pos);
        // Target lookup after removal: positions may have shifted.
        let target = self
            .get_stack_mut(target_id)
            .ok_or_else(|| CoreError::StackNotFound(target_id.clone()))?;
        target.photos.extend(source.photos);

        self.debug_assert_balanced();
        Ok(())
    }

    /// Removes a stack and all its photos from the session.
    ///
    /// The removed photos count toward the session's removal tally so the
    /// conservation invariant still balances. Returns the removed stack.
    pub fn remove_stack(&mut self, stack_id: &StackId) -> CoreResult<Stack> {
        let pos = self
            .position_of(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.clone()))?;

        let stack = self.stacks.remove(pos);
        self.removed_photo_count += stack.len();

        debug!(
            session_id = %self.id,
            stack_id = %stack_id,
            photo_count = stack.len(),
            "removed stack"
        );
        self.debug_assert_balanced();
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::staging::models::Photo;

    /// Builds a session with one stack per entry in `sizes`, photos
    /// timestamped sequentially so ordering is observable.
    fn make_session(sizes: &[usize]) -> StagingSession {
        let mut ts = 0_i64;
        let stacks = sizes
            .iter()
            .map(|&n| {
                let photos = (0..n)
                    .map(|_| {
                        ts += 1_000;
                        Photo::new(ts, vec![1, 2, 3])
                    })
                    .collect();
                Stack::from_photos(photos).unwrap()
            })
            .collect();
        StagingSession::from_stacks(stacks)
    }

    fn stack_ids(session: &StagingSession) -> Vec<StackId> {
        session.stacks.iter().map(|s| s.id.clone()).collect()
    }

    // =========================================================================
    // Merge
    // =========================================================================

    #[test]
    fn merge_concatenates_in_session_order() {
        let mut session = make_session(&[2, 1, 3]);
        let ids = stack_ids(&session);
        let expected: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .chain(session.stacks[2].photos.iter())
            .map(|p| p.id.clone())
            .collect();

        // Select in reverse order; result must still follow session order.
        let merged_id = session
            .merge_stacks(&[ids[2].clone(), ids[0].clone()])
            .unwrap();

        assert_eq!(session.stack_count(), 2);
        assert_eq!(session.stacks[0].id, merged_id);
        let got: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(got, expected);
        assert_eq!(session.total_photos(), 6);
    }

    #[test]
    fn merge_places_result_at_front_with_fresh_id() {
        let mut session = make_session(&[1, 1, 1]);
        let ids = stack_ids(&session);

        let merged_id = session
            .merge_stacks(&[ids[1].clone(), ids[2].clone()])
            .unwrap();

        assert!(!ids.contains(&merged_id));
        assert_eq!(session.stacks[0].id, merged_id);
        // The untouched stack keeps its identity, now behind the merge result.
        assert_eq!(session.stacks[1].id, ids[0]);
    }

    #[test]
    fn merge_rejects_single_selection() {
        let mut session = make_session(&[2, 2]);
        let ids = stack_ids(&session);

        let result = session.merge_stacks(&[ids[0].clone()]);
        assert!(matches!(result, Err(CoreError::MergeSelectionTooSmall(1))));
        assert_eq!(session.stack_count(), 2);
    }

    #[test]
    fn merge_rejects_unknown_stack() {
        let mut session = make_session(&[2, 2]);
        let ids = stack_ids(&session);

        let result = session.merge_stacks(&[ids[0].clone(), "missing".to_string()]);
        assert!(matches!(result, Err(CoreError::StackNotFound(_))));
        // Session unchanged on error.
        assert_eq!(stack_ids(&session), ids);
    }

    #[test]
    fn merge_rejects_duplicate_selection() {
        let mut session = make_session(&[2, 2]);
        let ids = stack_ids(&session);

        let result = session.merge_stacks(&[ids[0].clone(), ids[0].clone()]);
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    // =========================================================================
    // Split
    // =========================================================================

    #[test]
    fn split_appends_singleton_at_end() {
        let mut session = make_session(&[3, 1]);
        let ids = stack_ids(&session);
        let extracted_id = session.stacks[0].photos[1].id.clone();

        let new_id = session.split_photo_out(&ids[0], 1).unwrap();

        assert_eq!(session.stack_count(), 3);
        assert_eq!(session.stacks[2].id, new_id);
        assert_eq!(session.stacks[2].photos[0].id, extracted_id);
        assert_eq!(session.stacks[0].len(), 2);
        assert_eq!(session.total_photos(), 4);
    }

    #[test]
    fn split_deletes_emptied_source() {
        let mut session = make_session(&[1, 2]);
        let ids = stack_ids(&session);

        let new_id = session.split_photo_out(&ids[0], 0).unwrap();

        // Source had one photo and is gone, replaced by the new singleton at the end.
        assert_eq!(session.stack_count(), 2);
        assert!(session.get_stack(&ids[0]).is_none());
        assert_eq!(session.stacks[1].id, new_id);
        assert_eq!(session.total_photos(), 3);
    }

    #[test]
    fn split_rejects_out_of_range_index() {
        let mut session = make_session(&[2]);
        let ids = stack_ids(&session);

        let result = session.split_photo_out(&ids[0], 2);
        assert!(matches!(
            result,
            Err(CoreError::PhotoIndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    // =========================================================================
    // Explode
    // =========================================================================

    #[test]
    fn explode_creates_singletons_in_photo_order() {
        let mut session = make_session(&[1, 3]);
        let ids = stack_ids(&session);
        let photo_order: Vec<String> = session.stacks[1]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();

        let new_ids = session.explode_stack(&ids[1]).unwrap();

        assert_eq!(new_ids.len(), 3);
        assert_eq!(session.stack_count(), 4);
        assert!(session.get_stack(&ids[1]).is_none());
        for (offset, new_id) in new_ids.iter().enumerate() {
            let stack = &session.stacks[1 + offset];
            assert_eq!(&stack.id, new_id);
            assert_eq!(stack.len(), 1);
            assert_eq!(stack.photos[0].id, photo_order[offset]);
        }
    }

    #[test]
    fn explode_rejects_singleton() {
        let mut session = make_session(&[1, 2]);
        let ids = stack_ids(&session);

        let result = session.explode_stack(&ids[0]);
        assert!(matches!(result, Err(CoreError::StackNotSplittable(_))));
        assert_eq!(session.stack_count(), 2);
    }

    #[test]
    fn merge_then_explode_preserves_photo_count() {
        let mut session = make_session(&[2, 3, 1]);
        let ids = stack_ids(&session);

        let merged_id = session
            .merge_stacks(&[ids[0].clone(), ids[1].clone(), ids[2].clone()])
            .unwrap();
        assert_eq!(session.total_photos(), 6);

        let new_ids = session.explode_stack(&merged_id).unwrap();
        assert_eq!(new_ids.len(), 6);
        assert_eq!(session.stack_count(), 6);
        assert_eq!(session.total_photos(), 6);
    }

    // =========================================================================
    // Reorder
    // =========================================================================

    #[test]
    fn reorder_moves_photo_within_stack() {
        let mut session = make_session(&[3]);
        let ids = stack_ids(&session);
        let original: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();

        session.reorder_within_stack(&ids[0], 0, 2).unwrap();
        let got: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(
            got,
            vec![original[1].clone(), original[2].clone(), original[0].clone()]
        );
    }

    #[test]
    fn reorder_is_inverted_by_swapping_indices() {
        let mut session = make_session(&[4]);
        let ids = stack_ids(&session);
        let original: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();

        session.reorder_within_stack(&ids[0], 1, 3).unwrap();
        session.reorder_within_stack(&ids[0], 3, 1).unwrap();

        let got: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(got, original);
    }

    #[test]
    fn reorder_same_index_is_noop() {
        let mut session = make_session(&[2]);
        let ids = stack_ids(&session);
        let original = session.stacks[0].clone();

        session.reorder_within_stack(&ids[0], 1, 1).unwrap();
        assert_eq!(session.stacks[0], original);
    }

    #[test]
    fn reorder_rejects_out_of_range() {
        let mut session = make_session(&[2]);
        let ids = stack_ids(&session);

        let result = session.reorder_within_stack(&ids[0], 0, 5);
        assert!(matches!(
            result,
            Err(CoreError::PhotoIndexOutOfRange { index: 5, len: 2, .. })
        ));
    }

    // =========================================================================
    // Move Stack
    // =========================================================================

    #[test]
    fn move_stack_changes_display_position() {
        let mut session = make_session(&[1, 1, 1]);
        let ids = stack_ids(&session);

        session.move_stack(&ids[2], 0).unwrap();
        assert_eq!(
            stack_ids(&session),
            vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]
        );

        session.move_stack(&ids[2], 2).unwrap();
        assert_eq!(
            stack_ids(&session),
            vec![ids[0].clone(), ids[1].clone(), ids[2].clone()]
        );
    }

    #[test]
    fn move_stack_rejects_invalid_position() {
        let mut session = make_session(&[1, 1]);
        let ids = stack_ids(&session);

        let result = session.move_stack(&ids[0], 2);
        assert!(matches!(result, Err(CoreError::InvalidStackPosition(2))));
    }

    // =========================================================================
    // Drop Onto
    // =========================================================================

    #[test]
    fn drop_onto_appends_source_photos_after_target() {
        let mut session = make_session(&[2, 2]);
        let ids = stack_ids(&session);
        let mut expected: Vec<String> = session.stacks[1]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();
        expected.extend(session.stacks[0].photos.iter().map(|p| p.id.clone()));

        // Source sits before the target; order must still be target-first.
        session.drop_stack_onto(&ids[0], &ids[1]).unwrap();

        assert_eq!(session.stack_count(), 1);
        assert_eq!(session.stacks[0].id, ids[1]);
        let got: Vec<String> = session.stacks[0]
            .photos
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn drop_onto_keeps_target_position() {
        let mut session = make_session(&[1, 1, 1]);
        let ids = stack_ids(&session);

        session.drop_stack_onto(&ids[2], &ids[1]).unwrap();

        assert_eq!(stack_ids(&session), vec![ids[0].clone(), ids[1].clone()]);
        assert_eq!(session.stacks[1].len(), 2);
    }

    #[test]
    fn drop_onto_self_is_noop() {
        let mut session = make_session(&[2]);
        let ids = stack_ids(&session);

        session.drop_stack_onto(&ids[0], &ids[0]).unwrap();
        assert_eq!(session.stack_count(), 1);
        assert_eq!(session.total_photos(), 2);
    }

    #[test]
    fn drop_onto_self_with_unknown_stack_errors() {
        let mut session = make_session(&[2]);

        let missing = "no-such-stack".to_string();
        let result = session.drop_stack_onto(&missing, &missing);
        assert!(matches!(result, Err(CoreError::StackNotFound(_))));
    }

    // =========================================================================
    // Remove
    // =========================================================================

    #[test]
    fn remove_stack_counts_removed_photos() {
        let mut session = make_session(&[2, 3]);
        let ids = stack_ids(&session);

        let removed = session.remove_stack(&ids[1]).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(session.stack_count(), 1);
        assert_eq!(session.total_photos(), 2);
        assert_eq!(session.removed_photos(), 3);
    }

    #[test]
    fn remove_unknown_stack_fails() {
        let mut session = make_session(&[1]);
        let result = session.remove_stack(&"missing".to_string());
        assert!(matches!(result, Err(CoreError::StackNotFound(_))));
    }
}
