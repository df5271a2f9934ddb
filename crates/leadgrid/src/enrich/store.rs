//! In-memory job-item store with a merge function shared by both channels.
//!
//! The store is the single source of truth the UI renders from. Both the
//! invocation stream and the change feed write into it through [`JobItemStore::apply`],
//! which is idempotent and commutative by construction, so neither channel
//! needs to be ordered with respect to the other.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::enrich::types::{ItemUpdate, ProgressRecord};

/// Notification emitted after each store mutation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A snapshot load replaced the whole map.
    Seeded { count: usize },
    /// One record changed (or was inserted by a live update).
    Updated(ProgressRecord),
}

struct Inner {
    records: HashMap<String, ProgressRecord>,
    /// Item ids in first-seen order, for stable snapshot output.
    order: Vec<String>,
}

/// Keyed map from item id to its merged progress record.
///
/// All mutations are synchronous and run to completion inside a single call;
/// the interleaving of independent async sources is resolved entirely by the
/// merge rule, not by scheduling control.
pub struct JobItemStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl JobItemStore {
    /// Creates an empty store with the given event channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                order: Vec::new(),
            }),
            events,
        }
    }

    /// Subscribes to store notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replaces the whole map with a snapshot.
    ///
    /// This is the one-shot bulk load used on (re)attach. It must run before
    /// the live channels are wired, otherwise it would clobber newer live
    /// progress; that sequencing is enforced by `JobController::attach`.
    pub fn seed(&self, records: Vec<ProgressRecord>) {
        let count = records.len();
        {
            let mut inner = self.write_inner();
            inner.records.clear();
            inner.order.clear();
            for record in records {
                inner.order.push(record.item_id.clone());
                inner.records.insert(record.item_id.clone(), record);
            }
        }
        // Ignore errors - no active receivers is fine
        let _ = self.events.send(StoreEvent::Seeded { count });
    }

    /// Merges a partial update into the record for its item.
    ///
    /// Unknown item ids insert a fresh record: either channel may observe an
    /// item before the snapshot has seeded it. Absent fields leave existing
    /// fields untouched. The status merge is monotonic by rank, so a
    /// terminal status from one channel is never regressed by a late
    /// non-terminal event from the other, and the first terminal status to
    /// land is frozen.
    pub fn apply(&self, update: ItemUpdate) {
        let record = {
            let mut guard = self.write_inner();
            let inner = &mut *guard;
            let record = match inner.records.entry(update.item_id.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    inner.order.push(update.item_id.clone());
                    entry.insert(ProgressRecord::pending(
                        &update.item_id,
                        update.domain.as_deref().unwrap_or(""),
                    ))
                }
            };
            merge(record, &update);
            record.clone()
        };
        let _ = self.events.send(StoreEvent::Updated(record));
    }

    /// Returns every record in first-seen order.
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        let inner = self.read_inner();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Returns the record for one item, if known.
    pub fn get(&self, item_id: &str) -> Option<ProgressRecord> {
        self.read_inner().records.get(item_id).cloned()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.read_inner().records.len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job item store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job item store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for JobItemStore {
    fn default() -> Self {
        Self::new(256)
    }
}

/// The merge rule. Per-field partial overlay: a present non-status field
/// overwrites (last writer wins), while status moves only to a strictly
/// higher rank (pending < processing < terminal). Once terminal, the
/// status is frozen; non-status fields may still merge.
fn merge(record: &mut ProgressRecord, update: &ItemUpdate) {
    if let Some(status) = update.status {
        if status.rank() > record.status.rank() {
            record.status = status;
        }
    }
    if let Some(ref domain) = update.domain {
        record.domain = domain.clone();
    }
    if let Some(contacts) = update.contacts_found {
        record.contacts_found = Some(contacts);
    }
    if let Some(has_emails) = update.has_emails {
        record.has_emails = Some(has_emails);
    }
    if let Some(ref error) = update.error {
        record.error = Some(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::types::ItemStatus;

    fn seeded_store(ids: &[&str]) -> JobItemStore {
        let store = JobItemStore::default();
        store.seed(
            ids.iter()
                .map(|id| ProgressRecord::pending(id, &format!("{id}.example.com")))
                .collect(),
        );
        store
    }

    fn success_update(item_id: &str, contacts: u32) -> ItemUpdate {
        ItemUpdate {
            item_id: item_id.to_string(),
            status: Some(ItemStatus::Success),
            contacts_found: Some(contacts),
            has_emails: Some(contacts > 0),
            ..Default::default()
        }
    }

    #[test]
    fn test_seed_replaces_map() {
        let store = seeded_store(&["p-1", "p-2", "p-3"]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("p-1").unwrap().status, ItemStatus::Pending);
    }

    #[test]
    fn test_apply_unknown_item_inserts() {
        let store = JobItemStore::default();
        store.apply(ItemUpdate::status("p-9", ItemStatus::Processing));
        let record = store.get("p-9").unwrap();
        assert_eq!(record.status, ItemStatus::Processing);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = seeded_store(&["p-1"]);
        let update = success_update("p-1", 2);

        store.apply(update.clone());
        let once = store.get("p-1").unwrap();

        store.apply(update.clone());
        store.apply(update);
        let thrice = store.get("p-1").unwrap();

        assert_eq!(once, thrice);
    }

    #[test]
    fn test_terminal_wins_over_late_nonterminal() {
        let store = seeded_store(&["p-1"]);
        store.apply(success_update("p-1", 2));

        // A late "processing" event from the other channel must not regress
        // a row the UI already shows as finished.
        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));
        store.apply(ItemUpdate::status("p-1", ItemStatus::Pending));

        let record = store.get("p-1").unwrap();
        assert_eq!(record.status, ItemStatus::Success);
        assert_eq!(record.contacts_found, Some(2));
    }

    #[test]
    fn test_first_terminal_status_is_frozen() {
        let store = seeded_store(&["p-1"]);
        store.apply(ItemUpdate::status("p-1", ItemStatus::Failed));
        store.apply(ItemUpdate::status("p-1", ItemStatus::Success));
        assert_eq!(store.get("p-1").unwrap().status, ItemStatus::Failed);
    }

    #[test]
    fn test_status_does_not_move_backward() {
        let store = seeded_store(&["p-1"]);
        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));
        store.apply(ItemUpdate::status("p-1", ItemStatus::Pending));
        assert_eq!(store.get("p-1").unwrap().status, ItemStatus::Processing);
    }

    #[test]
    fn test_merge_commutes_on_disjoint_fields() {
        let a = ItemUpdate {
            item_id: "p-1".to_string(),
            contacts_found: Some(4),
            ..Default::default()
        };
        let b = ItemUpdate {
            item_id: "p-1".to_string(),
            error: Some("soft error".to_string()),
            ..Default::default()
        };

        let store_ab = seeded_store(&["p-1"]);
        store_ab.apply(a.clone());
        store_ab.apply(b.clone());

        let store_ba = seeded_store(&["p-1"]);
        store_ba.apply(b);
        store_ba.apply(a);

        assert_eq!(store_ab.get("p-1"), store_ba.get("p-1"));
    }

    #[test]
    fn test_domain_last_writer_wins() {
        let store = seeded_store(&["p-1"]);
        store.apply(ItemUpdate {
            item_id: "p-1".to_string(),
            domain: Some("acme.io".to_string()),
            ..Default::default()
        });
        // A later row with a corrected domain replaces the earlier one
        store.apply(ItemUpdate {
            item_id: "p-1".to_string(),
            domain: Some("acme.com".to_string()),
            ..Default::default()
        });

        assert_eq!(store.get("p-1").unwrap().domain, "acme.com");
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let store = seeded_store(&["p-1"]);
        store.apply(success_update("p-1", 3));
        store.apply(ItemUpdate {
            item_id: "p-1".to_string(),
            error: Some("retried once".to_string()),
            ..Default::default()
        });

        let record = store.get("p-1").unwrap();
        assert_eq!(record.contacts_found, Some(3));
        assert_eq!(record.error.as_deref(), Some("retried once"));
    }

    #[test]
    fn test_snapshot_then_live_overlay() {
        let store = seeded_store(&["p-1", "p-2"]);
        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].item_id, "p-1");
        assert_eq!(snapshot[0].status, ItemStatus::Processing);
        assert_eq!(snapshot[1].status, ItemStatus::Pending);
    }

    #[test]
    fn test_dual_channel_scenario() {
        // Seed 3 pending items; stream reports processing, change feed lands
        // the terminal success, then a stale stream event arrives late.
        let store = seeded_store(&["p-1", "p-2", "p-3"]);

        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));
        store.apply(success_update("p-1", 2));
        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));

        let record = store.get("p-1").unwrap();
        assert_eq!(record.status, ItemStatus::Success);
        assert_eq!(record.contacts_found, Some(2));
        assert_eq!(store.get("p-2").unwrap().status, ItemStatus::Pending);
    }

    #[test]
    fn test_notifies_subscribers_per_apply() {
        let store = JobItemStore::default();
        let mut rx = store.subscribe();

        store.seed(vec![ProgressRecord::pending("p-1", "acme.io")]);
        store.apply(ItemUpdate::status("p-1", ItemStatus::Processing));

        assert!(matches!(
            rx.try_recv().unwrap(),
            StoreEvent::Seeded { count: 1 }
        ));
        match rx.try_recv().unwrap() {
            StoreEvent::Updated(record) => {
                assert_eq!(record.item_id, "p-1");
                assert_eq!(record.status, ItemStatus::Processing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
