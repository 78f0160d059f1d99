//! Property tests for the patch applier and the connectivity guard.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

use proptest::prelude::*;
use todosync_client::{
    ConnectionEvent, ListId, PatchEvent, StreamSignal, Subscription, TodoCollection, TodoItem,
    TodoList, apply,
};

fn list_strategy(id: String) -> impl Strategy<Value = TodoList> {
    (
        "[a-z]{0,8}",
        "[a-z]{0,6}",
        prop::collection::btree_set("i[0-9]", 0..5),
        any::<bool>(),
    )
        .prop_map(move |(name, owner, item_ids, marked)| {
            let items = item_ids.into_iter().map(|item| TodoItem {
                id: item.into(),
                list: ListId::new(id.clone()),
                text: String::new(),
                marked,
            });
            TodoList::new(id.clone(), owner, name).with_items(items)
        })
}

fn collection_strategy() -> impl Strategy<Value = TodoCollection> {
    prop::collection::btree_set("[a-f]", 0..5)
        .prop_flat_map(|ids| ids.into_iter().map(list_strategy).collect::<Vec<_>>())
        .prop_map(|lists| lists.into_iter().collect())
}

fn event_strategy() -> impl Strategy<Value = PatchEvent> {
    prop_oneof![
        "[a-f]".prop_flat_map(list_strategy).prop_map(PatchEvent::UpdateList),
        "[a-f]".prop_map(|list| PatchEvent::RemoveList { list: list.into() }),
        ("i[0-9]", "[a-f]", "[a-z ]{0,8}")
            .prop_map(|(item, list, text)| PatchEvent::AddItem(TodoItem::new(item, list, text))),
        ("i[0-9]", "[a-f]", "[a-z ]{0,8}")
            .prop_map(|(item, list, text)| PatchEvent::UpdateItem(TodoItem::new(item, list, text))),
        ("[a-f]", "i[0-9]").prop_map(|(list, item)| PatchEvent::RemoveItem {
            list: list.into(),
            item: item.into(),
        }),
    ]
}

fn items_belong_to_their_list(collection: &TodoCollection) -> bool {
    collection
        .iter()
        .all(|(id, list)| &list.id == id && list.items.iter().all(|item| &item.list == id))
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn removing_an_absent_list_is_a_no_op(collection in collection_strategy(), id in "[a-h]") {
        let list = ListId::new(id);
        prop_assume!(!collection.contains(&list));

        prop_assert_eq!(apply(&collection, &PatchEvent::RemoveList { list }), collection);
    }

    #[test]
    fn repeating_an_update_list_changes_nothing(
        collection in collection_strategy(),
        list in "[a-f]".prop_flat_map(list_strategy),
    ) {
        let event = PatchEvent::UpdateList(list);
        let once = apply(&collection, &event);
        let twice = apply(&once, &event);

        prop_assert_eq!(twice, once);
    }

    #[test]
    fn adding_to_an_absent_list_is_a_no_op(
        collection in collection_strategy(),
        list in "[a-h]",
        item in "i[0-9]",
    ) {
        prop_assume!(!collection.contains(&ListId::new(list.clone())));
        let event = PatchEvent::AddItem(TodoItem::new(item, list, "milk"));

        prop_assert_eq!(apply(&collection, &event), collection);
    }

    #[test]
    fn apply_leaves_its_input_alone(
        collection in collection_strategy(),
        event in event_strategy(),
    ) {
        let before = collection.clone();
        let _ = apply(&collection, &event);

        prop_assert_eq!(collection, before);
    }

    #[test]
    fn items_always_belong_to_their_list(
        collection in collection_strategy(),
        events in prop::collection::vec(event_strategy(), 0..20),
    ) {
        let result = events.iter().fold(collection, |acc, event| apply(&acc, event));

        prop_assert!(items_belong_to_their_list(&result));
    }

    #[test]
    fn messages_only_pass_while_connected(event in event_strategy()) {
        let message = event.to_json().to_string();
        let mut subscription = Subscription::new();

        prop_assert_eq!(subscription.accept(&message), None);
        subscription.transition(ConnectionEvent::Connect);
        prop_assert_eq!(subscription.accept(&message), None);

        subscription.transition(ConnectionEvent::Opened);
        prop_assert_eq!(subscription.accept(&message), Some(StreamSignal::Event(event)));
    }
}

#[test]
fn item_lifecycle_in_one_list() {
    let empty: TodoCollection = [TodoList::new("a", "ada", "groceries")].into_iter().collect();

    let added = apply(&empty, &PatchEvent::AddItem(TodoItem::new("i1", "a", "")));
    assert_eq!(
        added.get(&"a".into()).unwrap().items,
        [TodoItem::new("i1", "a", "")]
    );

    let updated = apply(
        &added,
        &PatchEvent::UpdateItem(TodoItem::new("i1", "a", "milk")),
    );
    let item = updated.item(&"a".into(), &"i1".into()).unwrap();
    assert_eq!(item.text, "milk");
    assert!(!item.marked);

    let removed = apply(
        &updated,
        &PatchEvent::RemoveItem {
            list: "a".into(),
            item: "i1".into(),
        },
    );
    assert!(removed.get(&"a".into()).unwrap().items.is_empty());
}
