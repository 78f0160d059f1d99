//! Patch applier: folds one [`PatchEvent`] into a [`TodoCollection`].
//!
//! Events that target a list or item that is not there are dropped. Those
//! are benign races between a removal and in-flight events for the removed
//! entity. `add-item` is not deduplicated: applying it twice appends the item
//! twice, matching the at-most-once delivery of the event stream.

use crate::event::PatchEvent;
use crate::types::TodoCollection;

/// What applying an event did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The collection changed
    Applied,
    /// The event matched the current state exactly
    Unchanged,
    /// The targeted list is not in the collection
    ListMissing,
    /// The list exists but the targeted item does not
    ItemMissing,
}

impl PatchOutcome {
    /// Whether the collection changed and views need to re-render.
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Apply an event, returning a new collection and leaving the input alone.
#[must_use]
pub fn apply(collection: &TodoCollection, event: &PatchEvent) -> TodoCollection {
    let mut next = collection.clone();
    apply_in_place(&mut next, event.clone());
    next
}

/// Apply an event to a collection the caller owns.
pub fn apply_in_place(collection: &mut TodoCollection, event: PatchEvent) -> PatchOutcome {
    match event {
        PatchEvent::UpdateList(list) => {
            if collection.get(&list.id) == Some(&list) {
                return PatchOutcome::Unchanged;
            }
            collection.upsert(list);
            PatchOutcome::Applied
        },
        PatchEvent::RemoveList { list } => match collection.remove(&list) {
            Some(_) => PatchOutcome::Applied,
            None => PatchOutcome::ListMissing,
        },
        PatchEvent::AddItem(item) => {
            let Some(list) = collection.get_mut(&item.list) else {
                return PatchOutcome::ListMissing;
            };
            list.items.push(item);
            PatchOutcome::Applied
        },
        PatchEvent::UpdateItem(update) => {
            let Some(list) = collection.get_mut(&update.list) else {
                return PatchOutcome::ListMissing;
            };
            let Some(item) = list.items.iter_mut().find(|i| i.id == update.id) else {
                return PatchOutcome::ItemMissing;
            };
            if item.text == update.text {
                return PatchOutcome::Unchanged;
            }
            // Only the text is taken from an update.
            item.text = update.text;
            PatchOutcome::Applied
        },
        PatchEvent::RemoveItem { list, item } => {
            let Some(list) = collection.get_mut(&list) else {
                return PatchOutcome::ListMissing;
            };
            let Some(position) = list.position(&item) else {
                return PatchOutcome::ItemMissing;
            };
            list.items.remove(position);
            PatchOutcome::Applied
        },
    }
}
