//! Linked-account reconciliation
//!
//! Merges an incoming, possibly partial list of platform links into the
//! list a store already has. Entries are identified by `platform`.

use crate::db::schemas::LinkedAccount;

/// Merge `incoming` into `existing`.
///
/// For each incoming entry:
/// - matched and `is_deleted`: the existing entry is removed
/// - matched and live: its url is overwritten and it is marked live
/// - unmatched and live: appended
/// - unmatched and `is_deleted`: ignored
///
/// Existing entries not mentioned pass through unchanged. Existing order is
/// kept and new entries follow in input order. No returned entry is deleted
/// and no two share a platform.
pub fn reconcile(existing: &[LinkedAccount], incoming: &[LinkedAccount]) -> Vec<LinkedAccount> {
    let mut merged: Vec<LinkedAccount> = Vec::with_capacity(existing.len() + incoming.len());

    // Collapse anything already duplicated or deleted in storage
    for entry in existing {
        if !entry.is_deleted && !merged.iter().any(|m| m.platform == entry.platform) {
            merged.push(entry.clone());
        }
    }

    for entry in incoming {
        let position = merged.iter().position(|m| m.platform == entry.platform);
        match (position, entry.is_deleted) {
            (Some(i), true) => {
                merged.remove(i);
            }
            (Some(i), false) => {
                merged[i].url = entry.url.clone();
                merged[i].is_deleted = false;
            }
            (None, false) => merged.push(LinkedAccount {
                platform: entry.platform,
                url: entry.url.clone(),
                is_deleted: false,
            }),
            (None, true) => {}
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    fn link(platform: ObjectId, url: &str, is_deleted: bool) -> LinkedAccount {
        LinkedAccount {
            platform,
            url: url.into(),
            is_deleted,
        }
    }

    #[test]
    fn test_mixed_update() {
        let (p1, p2, p3, p4) = (
            ObjectId::new(),
            ObjectId::new(),
            ObjectId::new(),
            ObjectId::new(),
        );
        let existing = vec![link(p1, "u1", false), link(p2, "u2", false)];
        let incoming = vec![
            link(p1, "", true),
            link(p2, "u2b", false),
            link(p3, "u3", false),
            link(p4, "", true),
        ];

        let result = reconcile(&existing, &incoming);
        assert_eq!(result, vec![link(p2, "u2b", false), link(p3, "u3", false)]);
    }

    #[test]
    fn test_unmentioned_entries_pass_through() {
        let (p1, p2) = (ObjectId::new(), ObjectId::new());
        let existing = vec![link(p1, "u1", false), link(p2, "u2", false)];

        let result = reconcile(&existing, &[link(p2, "u2-new", false)]);
        assert_eq!(result, vec![link(p1, "u1", false), link(p2, "u2-new", false)]);
        assert_eq!(reconcile(&existing, &[]), existing);
    }

    #[test]
    fn test_idempotent() {
        let (p1, p2, p3) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let existing = vec![link(p1, "u1", false), link(p2, "u2", false)];
        let incoming = vec![link(p1, "", true), link(p3, "u3", false)];

        let once = reconcile(&existing, &incoming);
        let twice = reconcile(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_is_unique_and_live() {
        let p1 = ObjectId::new();
        let existing = vec![link(p1, "a", false), link(p1, "b", false)];
        let incoming = vec![link(p1, "c", false), link(p1, "d", false)];

        let result = reconcile(&existing, &incoming);
        assert_eq!(result, vec![link(p1, "d", false)]);
        assert!(result.iter().all(|l| !l.is_deleted));
    }

    #[test]
    fn test_deleting_unknown_platform_is_noop() {
        let p1 = ObjectId::new();
        let existing = vec![link(p1, "u1", false)];
        let result = reconcile(&existing, &[link(ObjectId::new(), "", true)]);
        assert_eq!(result, existing);
    }
}
