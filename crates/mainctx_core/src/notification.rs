//! Change-set notifications exchanged between contexts.
//!
//! # Responsibility
//! - Describe what one context's save committed, so other contexts can fold
//!   those changes into their in-memory state without re-fetching.
//!
//! # Invariants
//! - A notification is a value; producing or consuming one never touches the
//!   backing store.

use crate::model::{ManagedRecord, ObjectRef};
use serde::{Deserialize, Serialize};

/// Change-set payload produced by a context save.
///
/// Consumers apply it with `MainContext::merge_changes`; the payload stays
/// opaque to the store layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Records newly persisted by the producing save.
    pub inserted: Vec<ManagedRecord>,
    /// Records whose persisted state was rewritten.
    pub updated: Vec<ManagedRecord>,
    /// Objects removed from the store.
    pub deleted: Vec<ObjectRef>,
}

impl ChangeNotification {
    /// Returns whether the notification carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of object changes carried.
    pub fn change_count(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ChangeNotification;
    use crate::model::{ManagedRecord, ObjectRef};
    use uuid::Uuid;

    #[test]
    fn empty_notification_reports_no_changes() {
        let notification = ChangeNotification::default();
        assert!(notification.is_empty());
        assert_eq!(notification.change_count(), 0);
    }

    #[test]
    fn change_count_sums_all_sections() {
        let notification = ChangeNotification {
            inserted: vec![ManagedRecord::new("note")],
            updated: vec![ManagedRecord::new("note"), ManagedRecord::new("note")],
            deleted: vec![ObjectRef::new("note", Uuid::new_v4())],
        };
        assert!(!notification.is_empty());
        assert_eq!(notification.change_count(), 4);
    }
}
