//! Change codes — what a registry slot owes the durable store.
//!
//! Each slot carries one [`ChangeCode`]. Mutators fold their [`Mutation`] into
//! it with [`ChangeCode::compose`] and the write-back synchronizer resets it
//! once the store has caught up.

/// Pending store work for one registry slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChangeCode {
    /// Nothing to write.
    #[default]
    Unset,
    /// Only the state text changed.
    State,
    /// The name changed; the old name is staged.
    Name,
    /// The topic changed; the old topic is staged.
    Topic,
    /// Several fields changed: rename, re-topic, and rewrite the state.
    Identity,
    /// The row does not exist in the store yet.
    Insert,
    /// The row must be removed, using the staged old identity.
    Delete,
    /// A stored row was deleted and its slot reused before the flush.
    Replace,
}

/// A single registry mutation to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    State,
    Name,
    Topic,
    Insert,
    Delete,
}

impl ChangeCode {
    /// Fold `mutation` into the pending code.
    ///
    /// Repeating the same field change keeps the code, distinct field changes
    /// upgrade to [`ChangeCode::Identity`]. A pending insert absorbs field
    /// changes since it writes the full row, and cancels out against a delete.
    /// A delete followed by an insert becomes [`ChangeCode::Replace`].
    #[must_use]
    pub fn compose(self, mutation: Mutation) -> Self {
        match (self, mutation) {
            (Self::Insert, Mutation::Delete) => Self::Unset,
            (Self::Insert, _) => Self::Insert,
            (Self::Delete | Self::Replace, Mutation::Insert) => Self::Replace,
            (Self::Delete, _) => Self::Delete,
            (Self::Replace, Mutation::Delete) => Self::Delete,
            (Self::Replace, _) => Self::Replace,
            (_, Mutation::Insert) => Self::Insert,
            (_, Mutation::Delete) => Self::Delete,
            (Self::Unset, Mutation::State) => Self::State,
            (Self::Unset, Mutation::Name) => Self::Name,
            (Self::Unset, Mutation::Topic) => Self::Topic,
            (Self::State, Mutation::State) => Self::State,
            (Self::Name, Mutation::Name) => Self::Name,
            (Self::Topic, Mutation::Topic) => Self::Topic,
            (Self::State | Self::Name | Self::Topic | Self::Identity, _) => Self::Identity,
        }
    }

    #[must_use]
    pub fn is_pending(self) -> bool {
        self != Self::Unset
    }

    /// `true` when the old name and topic must be staged before the mutation
    /// lands, so the flush can address the row the store still holds.
    #[must_use]
    pub fn needs_old_identity(self) -> bool {
        matches!(
            self,
            Self::Name | Self::Topic | Self::Identity | Self::Delete | Self::Replace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChangeCode; 8] = [
        ChangeCode::Unset,
        ChangeCode::State,
        ChangeCode::Name,
        ChangeCode::Topic,
        ChangeCode::Identity,
        ChangeCode::Insert,
        ChangeCode::Delete,
        ChangeCode::Replace,
    ];

    #[test]
    fn should_take_mutation_when_unset() {
        assert_eq!(ChangeCode::Unset.compose(Mutation::State), ChangeCode::State);
        assert_eq!(ChangeCode::Unset.compose(Mutation::Name), ChangeCode::Name);
        assert_eq!(ChangeCode::Unset.compose(Mutation::Topic), ChangeCode::Topic);
        assert_eq!(ChangeCode::Unset.compose(Mutation::Insert), ChangeCode::Insert);
        assert_eq!(ChangeCode::Unset.compose(Mutation::Delete), ChangeCode::Delete);
    }

    #[test]
    fn should_keep_code_when_same_field_changes_again() {
        assert_eq!(ChangeCode::State.compose(Mutation::State), ChangeCode::State);
        assert_eq!(ChangeCode::Name.compose(Mutation::Name), ChangeCode::Name);
        assert_eq!(ChangeCode::Topic.compose(Mutation::Topic), ChangeCode::Topic);
    }

    #[test]
    fn should_upgrade_to_identity_when_distinct_fields_change() {
        assert_eq!(ChangeCode::Name.compose(Mutation::State), ChangeCode::Identity);
        assert_eq!(ChangeCode::State.compose(Mutation::Topic), ChangeCode::Identity);
        assert_eq!(ChangeCode::Topic.compose(Mutation::Name), ChangeCode::Identity);
        assert_eq!(ChangeCode::Identity.compose(Mutation::State), ChangeCode::Identity);
    }

    #[test]
    fn should_absorb_field_changes_into_pending_insert() {
        for mutation in [Mutation::State, Mutation::Name, Mutation::Topic, Mutation::Insert] {
            assert_eq!(ChangeCode::Insert.compose(mutation), ChangeCode::Insert);
        }
    }

    #[test]
    fn should_cancel_out_when_insert_is_deleted() {
        assert_eq!(ChangeCode::Insert.compose(Mutation::Delete), ChangeCode::Unset);
    }

    #[test]
    fn should_become_replace_when_deleted_slot_is_reused() {
        assert_eq!(ChangeCode::Delete.compose(Mutation::Insert), ChangeCode::Replace);
        assert_eq!(ChangeCode::Replace.compose(Mutation::State), ChangeCode::Replace);
        assert_eq!(ChangeCode::Replace.compose(Mutation::Delete), ChangeCode::Delete);
    }

    #[test]
    fn should_turn_any_persisted_change_into_delete() {
        for code in [
            ChangeCode::State,
            ChangeCode::Name,
            ChangeCode::Topic,
            ChangeCode::Identity,
            ChangeCode::Delete,
        ] {
            assert_eq!(code.compose(Mutation::Delete), ChangeCode::Delete);
        }
    }

    #[test]
    fn should_need_old_identity_only_for_persisted_renames_and_deletes() {
        assert!(ChangeCode::Name.needs_old_identity());
        assert!(ChangeCode::Identity.needs_old_identity());
        assert!(ChangeCode::Replace.needs_old_identity());
        assert!(!ChangeCode::State.needs_old_identity());
        assert!(!ChangeCode::Insert.needs_old_identity());
    }

    #[test]
    fn should_only_be_idle_when_unset() {
        for code in ALL {
            assert_eq!(code.is_pending(), code != ChangeCode::Unset);
        }
    }
}
