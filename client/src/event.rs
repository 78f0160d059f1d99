//! Patch events and their wire format.
//!
//! The event stream delivers JSON messages shaped like
//! `{ "type": <kind>, "todolist"?: {...}, "todoitem"?: {...} }`. They are
//! validated here, at the boundary, and turned into a [`PatchEvent`]. Nothing
//! past this module sees an untyped payload.

use crate::error::EventDecodeError;
use crate::types::{ItemId, ListId, TodoItem, TodoList};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Discriminator of a [`PatchEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A list was created or changed
    UpdateList,
    /// A list was deleted
    RemoveList,
    /// An item was appended to a list
    AddItem,
    /// An item's text changed
    UpdateItem,
    /// An item was deleted
    RemoveItem,
}

impl EventKind {
    /// All kinds, in wire documentation order.
    pub const ALL: [Self; 5] = [
        Self::UpdateList,
        Self::RemoveList,
        Self::UpdateItem,
        Self::AddItem,
        Self::RemoveItem,
    ];

    /// Name used in the `type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateList => "update-list",
            Self::RemoveList => "remove-list",
            Self::AddItem => "add-item",
            Self::UpdateItem => "update-item",
            Self::RemoveItem => "remove-item",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventDecodeError::UnknownKind(s.to_string()))
    }
}

/// A single described mutation of the todo collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchEvent {
    /// Full replacement of a list
    UpdateList(TodoList),
    /// Removal of a list
    RemoveList {
        /// List to remove
        list: ListId,
    },
    /// Append an item to its list
    AddItem(TodoItem),
    /// Replace the text of an existing item
    UpdateItem(TodoItem),
    /// Removal of an item
    RemoveItem {
        /// Owning list
        list: ListId,
        /// Item to remove
        item: ItemId,
    },
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    todolist: Option<TodoList>,
    #[serde(default)]
    todoitem: Option<TodoItem>,
}

impl PatchEvent {
    /// Decode and validate one stream message.
    ///
    /// Items nested in an `update-list` payload are re-homed onto the
    /// enclosing list so the collection invariant holds whatever the server
    /// put in their `list` field.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError`] for invalid JSON, an unknown or missing
    /// `type`, a missing payload, an empty required id, or duplicate item ids
    /// inside a list payload.
    pub fn decode(data: &str) -> Result<Self, EventDecodeError> {
        let message: WireMessage = serde_json::from_str(data)
            .map_err(|e| EventDecodeError::InvalidJson(e.to_string()))?;

        let kind: EventKind = message
            .kind
            .as_deref()
            .ok_or(EventDecodeError::MissingKind)?
            .parse()?;

        match kind {
            EventKind::UpdateList => {
                let list = require_list(kind, message.todolist)?;
                Ok(Self::UpdateList(normalize_items(kind, list)?))
            },
            EventKind::RemoveList => {
                let list = require_list(kind, message.todolist)?;
                Ok(Self::RemoveList { list: list.id })
            },
            EventKind::AddItem => Ok(Self::AddItem(require_item(kind, message.todoitem)?)),
            EventKind::UpdateItem => Ok(Self::UpdateItem(require_item(kind, message.todoitem)?)),
            EventKind::RemoveItem => {
                let item = require_item(kind, message.todoitem)?;
                Ok(Self::RemoveItem {
                    list: item.list,
                    item: item.id,
                })
            },
        }
    }

    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::UpdateList(_) => EventKind::UpdateList,
            Self::RemoveList { .. } => EventKind::RemoveList,
            Self::AddItem(_) => EventKind::AddItem,
            Self::UpdateItem(_) => EventKind::UpdateItem,
            Self::RemoveItem { .. } => EventKind::RemoveItem,
        }
    }

    /// The list this event targets.
    #[must_use]
    pub const fn list_id(&self) -> &ListId {
        match self {
            Self::UpdateList(list) => &list.id,
            Self::RemoveList { list } | Self::RemoveItem { list, .. } => list,
            Self::AddItem(item) | Self::UpdateItem(item) => &item.list,
        }
    }

    /// Encode back into the wire shape the server sends.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let kind = self.kind().as_str();
        match self {
            Self::UpdateList(list) => serde_json::json!({ "type": kind, "todolist": list }),
            Self::RemoveList { list } => serde_json::json!({ "type": kind, "todolist": { "id": list } }),
            Self::AddItem(item) | Self::UpdateItem(item) => {
                serde_json::json!({ "type": kind, "todoitem": item })
            },
            Self::RemoveItem { list, item } => serde_json::json!({
                "type": kind,
                "todoitem": { "id": item, "list": list }
            }),
        }
    }
}

fn require_list(kind: EventKind, list: Option<TodoList>) -> Result<TodoList, EventDecodeError> {
    let list = list.ok_or(EventDecodeError::MissingPayload {
        kind: kind.as_str(),
        field: "todolist",
    })?;
    if list.id.is_blank() {
        return Err(EventDecodeError::MissingField {
            kind: kind.as_str(),
            field: "todolist.id",
        });
    }
    Ok(list)
}

fn require_item(kind: EventKind, item: Option<TodoItem>) -> Result<TodoItem, EventDecodeError> {
    let item = item.ok_or(EventDecodeError::MissingPayload {
        kind: kind.as_str(),
        field: "todoitem",
    })?;
    if item.id.is_blank() {
        return Err(EventDecodeError::MissingField {
            kind: kind.as_str(),
            field: "todoitem.id",
        });
    }
    if item.list.is_blank() {
        return Err(EventDecodeError::MissingField {
            kind: kind.as_str(),
            field: "todoitem.list",
        });
    }
    Ok(item)
}

fn normalize_items(kind: EventKind, mut list: TodoList) -> Result<TodoList, EventDecodeError> {
    let mut seen = HashSet::with_capacity(list.items.len());
    for item in &mut list.items {
        if item.id.is_blank() {
            return Err(EventDecodeError::MissingField {
                kind: kind.as_str(),
                field: "todolist.items.id",
            });
        }
        if !seen.insert(item.id.clone()) {
            return Err(EventDecodeError::DuplicateItem {
                list: list.id.to_string(),
                item: item.id.to_string(),
            });
        }
        item.list.clone_from(&list.id);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic

    use super::*;

    #[test]
    fn decodes_update_list_with_omitted_fields() {
        let event = PatchEvent::decode(
            r#"{"type":"update-list","todolist":{"id":"a","name":"groceries","items":[{"id":"i1","list":"a","text":"milk"},{"id":"i2","marked":true}]}}"#,
        )
        .unwrap();

        let PatchEvent::UpdateList(list) = event else {
            panic!("expected update-list, got {event:?}");
        };
        assert_eq!(list.owner, "");
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[1].list.as_str(), "a");
        assert!(list.items[1].marked);
        assert_eq!(list.items[1].text, "");
    }

    #[test]
    fn null_items_mean_empty_list() {
        let event =
            PatchEvent::decode(r#"{"type":"update-list","todolist":{"id":"a","owner":"ada","items":null}}"#)
                .unwrap();
        assert_eq!(event, PatchEvent::UpdateList(TodoList::new("a", "ada", "")));
    }

    #[test]
    fn decodes_removals() {
        assert_eq!(
            PatchEvent::decode(r#"{"type":"remove-list","todolist":{"id":"a","items":null}}"#).unwrap(),
            PatchEvent::RemoveList { list: "a".into() }
        );
        assert_eq!(
            PatchEvent::decode(r#"{"type":"remove-item","todoitem":{"id":"i1","list":"a"}}"#).unwrap(),
            PatchEvent::RemoveItem {
                list: "a".into(),
                item: "i1".into()
            }
        );
    }

    #[test]
    fn nested_items_are_rehomed_onto_their_list() {
        let event = PatchEvent::decode(
            r#"{"type":"update-list","todolist":{"id":"a","items":[{"id":"i1","list":"elsewhere"}]}}"#,
        )
        .unwrap();
        assert_eq!(event.list_id().as_str(), "a");
        let PatchEvent::UpdateList(list) = event else {
            panic!("expected update-list");
        };
        assert_eq!(list.items[0].list.as_str(), "a");
    }

    #[test]
    fn rejects_malformed_messages() {
        let cases = [
            ("not json", "Invalid event JSON"),
            (r#"{"todolist":{"id":"a"}}"#, "missing its type"),
            (r#"{"type":"rename-list"}"#, "Unknown event type"),
            (r#"{"type":"update-list"}"#, "missing its todolist payload"),
            (r#"{"type":"remove-list","todolist":{"name":"x"}}"#, "todolist.id"),
            (r#"{"type":"add-item","todoitem":{"id":"i1"}}"#, "todoitem.list"),
            (r#"{"type":"update-item","todoitem":{"list":"a","text":"x"}}"#, "todoitem.id"),
            (r#"{"type":"remove-item","todolist":{"id":"a"}}"#, "todoitem payload"),
            (
                r#"{"type":"update-list","todolist":{"id":"a","items":[{"list":"a"}]}}"#,
                "todolist.items.id",
            ),
            (
                r#"{"type":"update-list","todolist":{"id":"a","items":[{"id":"i1"},{"id":"i1"}]}}"#,
                "more than once",
            ),
            (r#"{"type":"add-item","todoitem":{"id":"i1","list":"a","marked":"yes"}}"#, "Invalid event JSON"),
        ];

        for (input, expected) in cases {
            let error = PatchEvent::decode(input).unwrap_err();
            assert!(
                error.to_string().contains(expected),
                "{input}: expected {expected:?} in {error}"
            );
        }
    }

    #[test]
    fn kinds_parse_from_wire_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("Update-List".parse::<EventKind>().is_err());
    }

    #[test]
    fn encodes_to_the_wire_shape() {
        let event = PatchEvent::RemoveItem {
            list: "a".into(),
            item: "i1".into(),
        };
        assert_eq!(
            event.to_json(),
            serde_json::json!({"type": "remove-item", "todoitem": {"id": "i1", "list": "a"}})
        );

        let event = PatchEvent::AddItem(TodoItem::new("i1", "a", "milk"));
        let decoded = PatchEvent::decode(&event.to_json().to_string()).unwrap();
        assert_eq!(decoded, event);
    }
}
