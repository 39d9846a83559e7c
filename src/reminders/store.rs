use super::{NewReminder, Reminder, ReminderId, ReminderState, StoreError};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Stale slots allowed before the heap is rebuilt from the live index.
const COMPACT_SLACK: usize = 64;

/// Heap key. Field order gives the `(trigger_at, id)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    trigger_at: DateTime<Utc>,
    id: ReminderId,
}

/// Pending reminders in a min-heap, plus an id index that decides which heap
/// slots are still live. Cancelled and rescheduled slots stay in the heap until
/// they surface at the top.
#[derive(Debug, Default)]
pub struct ReminderStore {
    heap: BinaryHeap<Reverse<Slot>>,
    live: HashMap<ReminderId, Reminder>,
    next_id: ReminderId,
}

impl ReminderStore {
    pub fn new() -> Self {
        ReminderStore { next_id: 1, ..Default::default() }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, id: ReminderId) -> Option<&Reminder> {
        self.live.get(&id)
    }

    /// Live reminders in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Reminder> {
        self.live.values()
    }

    pub fn insert(&mut self, new: NewReminder) -> Result<ReminderId, StoreError> {
        let id = match new.id {
            Some(id) if self.live.contains_key(&id) => return Err(StoreError::DuplicateId(id)),
            Some(id) => id,
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id + 1);

        self.heap.push(Reverse(Slot { trigger_at: new.trigger_at, id }));
        self.live.insert(
            id,
            Reminder {
                id,
                owner: new.owner,
                trigger_at: new.trigger_at,
                created_at: new.created_at,
                payload: new.payload,
                state: ReminderState::Pending,
            },
        );
        Ok(id)
    }

    pub fn cancel(&mut self, id: ReminderId) -> Result<Reminder, StoreError> {
        let mut reminder = self.live.remove(&id).ok_or(StoreError::NotFound(id))?;
        reminder.state = ReminderState::Cancelled;
        self.maybe_compact();
        Ok(reminder)
    }

    /// Moves a reminder to a new trigger time. The old id dies with the old
    /// slot and the reminder comes back under a fresh id.
    pub fn reschedule(
        &mut self, id: ReminderId, trigger_at: DateTime<Utc>,
    ) -> Result<ReminderId, StoreError> {
        let old = self.cancel(id)?;
        self.insert(NewReminder {
            id: None,
            owner: old.owner,
            trigger_at,
            created_at: old.created_at,
            payload: old.payload,
        })
    }

    /// Payload edits keep the slot, ordering doesn't depend on it.
    pub fn set_payload(&mut self, id: ReminderId, payload: String) -> Result<(), StoreError> {
        let reminder = self.live.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        reminder.payload = payload;
        Ok(())
    }

    pub fn earliest_trigger(&mut self) -> Option<DateTime<Utc>> {
        self.discard_stale_top();
        self.heap.peek().map(|Reverse(slot)| slot.trigger_at)
    }

    pub fn peek_due(&mut self, now: DateTime<Utc>) -> Option<&Reminder> {
        self.discard_stale_top();
        let Reverse(slot) = self.heap.peek()?;
        if slot.trigger_at > now {
            return None;
        }
        self.live.get(&slot.id)
    }

    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Reminder> {
        let id = self.peek_due(now)?.id;
        // peek_due left the live slot for `id` on top
        self.heap.pop();
        let mut reminder = self.live.remove(&id)?;
        reminder.state = ReminderState::Fired;
        Some(reminder)
    }

    fn is_live(&self, slot: &Slot) -> bool {
        self.live.get(&slot.id).is_some_and(|r| r.trigger_at == slot.trigger_at)
    }

    fn discard_stale_top(&mut self) {
        while let Some(Reverse(slot)) = self.heap.peek() {
            if self.is_live(slot) {
                return;
            }
            self.heap.pop();
        }
        debug_assert!(self.live.is_empty(), "live reminders without a heap slot");
    }

    fn maybe_compact(&mut self) {
        if self.heap.len() <= self.live.len() * 2 + COMPACT_SLACK {
            return;
        }
        self.heap = self
            .live
            .values()
            .map(|r| Reverse(Slot { trigger_at: r.trigger_at, id: r.id }))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::testing::{new_reminder, t0};
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    #[test]
    fn empty_store_has_nothing_due() {
        let mut store = ReminderStore::new();
        assert_eq!(store.earliest_trigger(), None);
        assert_eq!(store.peek_due(at(1_000)), None);
        assert_eq!(store.pop_due(at(1_000)), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn pops_in_trigger_order() {
        let mut store = ReminderStore::new();
        for secs in [50, 10, 40, 20, 30] {
            store.insert(new_reminder(1, at(secs), &format!("at {secs}"))).unwrap();
        }

        let mut fired = Vec::new();
        while let Some(r) = store.pop_due(at(100)) {
            assert_eq!(r.state, ReminderState::Fired);
            fired.push(r.trigger_at);
        }
        assert_eq!(fired, vec![at(10), at(20), at(30), at(40), at(50)]);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn equal_triggers_fire_by_id() {
        let mut store = ReminderStore::new();
        let ids: Vec<_> =
            (0..5).map(|i| store.insert(new_reminder(i + 1, at(5), "same")).unwrap()).collect();

        let popped: Vec<_> = std::iter::from_fn(|| store.pop_due(at(5))).map(|r| r.id).collect();
        assert_eq!(popped, ids);
    }

    #[test]
    fn not_due_stays_put() {
        let mut store = ReminderStore::new();
        let id = store.insert(new_reminder(1, at(60), "later")).unwrap();

        assert_eq!(store.peek_due(at(59)), None);
        assert_eq!(store.pop_due(at(59)), None);
        assert_eq!(store.peek_due(at(60)).map(|r| r.id), Some(id));
        // peeking doesn't consume
        assert_eq!(store.pop_due(at(60)).map(|r| r.id), Some(id));
    }

    #[test]
    fn pop_skips_stale_slots_left_by_reschedule() {
        let mut store = ReminderStore::new();
        let moved = store.insert(new_reminder(1, at(10), "moved")).unwrap();
        let stays = store.insert(new_reminder(1, at(20), "stays")).unwrap();
        let moved = store.reschedule(moved, at(30)).unwrap();

        assert_eq!(store.peek_due(at(30)).map(|r| r.id), Some(stays));
        assert_eq!(store.pop_due(at(30)).map(|r| r.id), Some(stays));
        assert_eq!(store.pop_due(at(30)).map(|r| (r.id, r.trigger_at)), Some((moved, at(30))));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn supplied_ids_are_checked_and_advance_the_counter() {
        let mut store = ReminderStore::new();
        let mut first = new_reminder(1, at(10), "restored");
        first.id = Some(41);
        assert_eq!(store.insert(first.clone()), Ok(41));
        assert_eq!(store.insert(first), Err(StoreError::DuplicateId(41)));

        assert_eq!(store.insert(new_reminder(1, at(10), "fresh")), Ok(42));
    }

    #[test]
    fn cancelled_reminder_is_never_due() {
        let mut store = ReminderStore::new();
        let doomed = store.insert(new_reminder(1, at(10), "doomed")).unwrap();
        let kept = store.insert(new_reminder(1, at(20), "kept")).unwrap();

        let cancelled = store.cancel(doomed).unwrap();
        assert_eq!(cancelled.state, ReminderState::Cancelled);
        assert_eq!(store.cancel(doomed), Err(StoreError::NotFound(doomed)));

        assert_eq!(store.earliest_trigger(), Some(at(20)));
        assert_eq!(store.pop_due(at(100)).map(|r| r.id), Some(kept));
        assert_eq!(store.pop_due(at(100)), None);
    }

    #[test]
    fn earliest_skips_several_cancelled_tops() {
        let mut store = ReminderStore::new();
        let a = store.insert(new_reminder(1, at(1), "a")).unwrap();
        let b = store.insert(new_reminder(1, at(2), "b")).unwrap();
        store.insert(new_reminder(1, at(3), "c")).unwrap();
        store.cancel(a).unwrap();
        store.cancel(b).unwrap();

        assert_eq!(store.earliest_trigger(), Some(at(3)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reschedule_keeps_owner_and_payload() {
        let mut store = ReminderStore::new();
        let old = store.insert(new_reminder(7, at(10), "water the plants")).unwrap();
        store.insert(new_reminder(8, at(20), "other")).unwrap();

        let new = store.reschedule(old, at(30)).unwrap();
        assert_ne!(new, old);
        assert_eq!(store.get(old), None);
        assert_eq!(store.reschedule(old, at(40)), Err(StoreError::NotFound(old)));

        let moved = store.get(new).unwrap();
        assert_eq!(moved.owner.user_id.get(), 7);
        assert_eq!(moved.payload, "water the plants");
        assert_eq!(moved.state, ReminderState::Pending);

        let order: Vec<_> = std::iter::from_fn(|| store.pop_due(at(100))).map(|r| r.id).collect();
        assert_eq!(order.len(), 2);
        assert_eq!(order[1], new);
    }

    #[test]
    fn reschedule_earlier_becomes_earliest() {
        let mut store = ReminderStore::new();
        store.insert(new_reminder(1, at(10), "a")).unwrap();
        let b = store.insert(new_reminder(1, at(20), "b")).unwrap();

        let b = store.reschedule(b, at(5)).unwrap();
        assert_eq!(store.earliest_trigger(), Some(at(5)));
        assert_eq!(store.pop_due(at(5)).map(|r| r.id), Some(b));
    }

    #[test]
    fn payload_edit_keeps_position() {
        let mut store = ReminderStore::new();
        let id = store.insert(new_reminder(1, at(10), "old text")).unwrap();
        store.set_payload(id, "new text".into()).unwrap();

        let fired = store.pop_due(at(10)).unwrap();
        assert_eq!(fired.id, id);
        assert_eq!(fired.payload, "new text");
        assert_eq!(store.set_payload(id, "gone".into()), Err(StoreError::NotFound(id)));
    }

    #[test]
    fn heap_is_compacted_after_many_cancels() {
        let mut store = ReminderStore::new();
        let ids: Vec<_> = (0..200)
            .map(|i| store.insert(new_reminder(1, at(1_000 + i), "x")).unwrap())
            .collect();
        for id in &ids[..190] {
            store.cancel(*id).unwrap();
        }

        assert!(store.heap.len() <= store.live.len() * 2 + COMPACT_SLACK);
        let remaining: Vec<_> = std::iter::from_fn(|| store.pop_due(at(5_000))).map(|r| r.id).collect();
        assert_eq!(remaining, ids[190..].to_vec());
    }
}
