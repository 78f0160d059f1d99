//! Entity model: todo lists, their items and the normalized collection.
//!
//! Records are plain values. Equality is deep structural equality, which is
//! what the patch applier uses to suppress redundant updates.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque identifier of a [`TodoList`], assigned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ListId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ListId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque identifier of a [`TodoItem`], unique within its list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A single task entry.
///
/// The server omits empty fields, so everything but the identifiers
/// defaults when missing. Identifiers are checked by the event decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Item identifier
    #[serde(default)]
    pub id: ItemId,
    /// Identifier of the owning list
    #[serde(default)]
    pub list: ListId,
    /// Task text
    #[serde(default)]
    pub text: String,
    /// Completion flag
    #[serde(default)]
    pub marked: bool,
}

impl TodoItem {
    /// Create an unmarked item.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, list: impl Into<ListId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            list: list.into(),
            text: text.into(),
            marked: false,
        }
    }

    /// Same item with different text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// A named, owned, ordered collection of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    /// List identifier
    #[serde(default)]
    pub id: ListId,
    /// Display name of the user who created the list
    #[serde(default)]
    pub owner: String,
    /// List name
    #[serde(default)]
    pub name: String,
    /// Items in display order (`null` on the wire means empty)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<TodoItem>,
}

impl TodoList {
    /// Create an empty list.
    #[must_use]
    pub fn new(id: impl Into<ListId>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Same list with the given items appended.
    #[must_use]
    pub fn with_items(mut self, items: impl IntoIterator<Item = TodoItem>) -> Self {
        self.items.extend(items);
        self
    }

    /// Look up an item by id.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&TodoItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Position of an item in display order.
    #[must_use]
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TodoItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TodoItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request body for creating a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewList {
    /// List name
    pub name: String,
    /// Display name of the creating user
    pub owner: String,
}

impl NewList {
    /// Create a request body.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// Normalized collection of lists keyed by id.
///
/// Lists keep the position of their first insertion. Replacing a list keeps
/// its position and removing one preserves the order of the rest, so the
/// view does not jump around when remote changes arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TodoCollection {
    lists: IndexMap<ListId, TodoList>,
}

impl TodoCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a list.
    #[must_use]
    pub fn get(&self, id: &ListId) -> Option<&TodoList> {
        self.lists.get(id)
    }

    /// Whether a list with this id is present.
    #[must_use]
    pub fn contains(&self, id: &ListId) -> bool {
        self.lists.contains_key(id)
    }

    /// Number of lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Whether the collection holds no lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Iterate over `(id, list)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&ListId, &TodoList)> {
        self.lists.iter()
    }

    /// Iterate over lists in display order.
    pub fn lists(&self) -> impl Iterator<Item = &TodoList> {
        self.lists.values()
    }

    /// Look up an item inside a list.
    #[must_use]
    pub fn item(&self, list: &ListId, item: &ItemId) -> Option<&TodoItem> {
        self.lists.get(list).and_then(|l| l.item(item))
    }

    pub(crate) fn get_mut(&mut self, id: &ListId) -> Option<&mut TodoList> {
        self.lists.get_mut(id)
    }

    /// Insert or replace a list, keeping the position of an existing entry.
    pub(crate) fn upsert(&mut self, list: TodoList) {
        self.lists.insert(list.id.clone(), list);
    }

    pub(crate) fn remove(&mut self, id: &ListId) -> Option<TodoList> {
        self.lists.shift_remove(id)
    }
}

impl FromIterator<TodoList> for TodoCollection {
    fn from_iter<T: IntoIterator<Item = TodoList>>(iter: T) -> Self {
        let mut collection = Self::new();
        for list in iter {
            collection.upsert(list);
        }
        collection
    }
}

impl<'de> Deserialize<'de> for TodoCollection {
    /// Keys must match the ids they map to, and items must belong to the list
    /// that holds them.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let lists = IndexMap::<ListId, TodoList>::deserialize(deserializer)?;
        for (key, list) in &lists {
            if *key != list.id {
                return Err(serde::de::Error::custom(format!(
                    "list stored under \"{key}\" has id \"{}\"",
                    list.id
                )));
            }
            if let Some(item) = list.items.iter().find(|item| item.list != list.id) {
                return Err(serde::de::Error::custom(format!(
                    "item \"{}\" in list \"{key}\" belongs to \"{}\"",
                    item.id, item.list
                )));
            }
        }
        Ok(Self { lists })
    }
}

impl<'a> IntoIterator for &'a TodoCollection {
    type Item = (&'a ListId, &'a TodoList);
    type IntoIter = indexmap::map::Iter<'a, ListId, TodoList>;

    fn into_iter(self) -> Self::IntoIter {
        self.lists.iter()
    }
}
