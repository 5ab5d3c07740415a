//! End-to-end tests over the shop model: a cart with items, products and an order.

mod common;

use common::*;
use restmap_engine::{Error, Reference, SerializeContext};
use serde_json::{json, Value as Json};

fn new_cart() -> Cart {
    Cart {
        status: "payed".into(),
        client_phone_number: Some(phone_number()),
        created_at: Some(created_at()),
        items: vec![Reference::Resolved(CartItem {
            amount: 2,
            data: json!({"when": "now", "who": "Jane"}),
            product: Some(Reference::Resolved(known_product())),
            ..CartItem::default()
        })],
        ..Cart::default()
    }
}

fn stored_cart() -> Json {
    json!({
        "@id": "/v1/carts/8",
        "status": "awaiting_payment",
        "clientPhoneNumber": "+33 1 23 45 67 89",
        "createdAt": "2015-09-20T12:08:00+00:00",
        "cartItemList": [
            {
                "@id": "/v1/cart_items/16",
                "amount": 1,
                "data": {"size": "M"},
                "product": "/v1/products/10",
                "cartItemDetailList": []
            },
            {
                "@id": "/v1/cart_items/17",
                "amount": 4,
                "data": {"size": "L"},
                "product": "/v1/products/11",
                "cartItemDetailList": ["/v1/cart_item_details/1"]
            }
        ],
        "order": "/v1/orders/3"
    })
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn serialize_new_cart() {
    let serializer = serializer();
    let out = serializer
        .serialize_entity(&new_cart(), &SerializeContext::new())
        .unwrap();

    assert_eq!(
        Json::Object(out.clone()),
        json!({
            "status": "payed",
            "clientPhoneNumber": "+33 1 23 45 67 89",
            "createdAt": "2015-09-20T12:08:00+00:00",
            "cartItemList": [{
                "amount": 2,
                "data": {"when": "now", "who": "Jane"},
                "product": "/v1/products/10",
                "cartItemDetailList": []
            }],
            "order": null
        })
    );
    assert!(!out.contains_key("@id"));
    let keys: Vec<&str> = out.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["status", "clientPhoneNumber", "createdAt", "cartItemList", "order"]
    );
}

#[test]
fn known_items_are_compacted_to_links() {
    let serializer = serializer();
    let mut cart: Cart = serializer.deserialize_as(&stored_cart()).unwrap().unwrap();
    cart.status = "payed".into();

    let out = serializer
        .serialize_entity(&cart, &SerializeContext::new())
        .unwrap();
    assert_eq!(
        out["cartItemList"],
        json!(["/v1/cart_items/16", "/v1/cart_items/17"])
    );
    assert_eq!(out["order"], json!("/v1/orders/3"));
    assert_eq!(out["@id"], json!("/v1/carts/8"));
}

#[test]
fn serialize_relations_forces_inlining() {
    let serializer = serializer();
    let cart: Cart = serializer.deserialize_as(&stored_cart()).unwrap().unwrap();

    let context = SerializeContext::new().with_relations(["cartItemList"]);
    let out = serializer.serialize_entity(&cart, &context).unwrap();

    let items = out["cartItemList"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["@id"], "/v1/cart_items/16");
    assert_eq!(items[0]["amount"], 1);
    // Grandchildren stay links.
    assert_eq!(items[0]["product"], "/v1/products/10");
    assert_eq!(
        items[1]["cartItemDetailList"],
        json!(["/v1/cart_item_details/1"])
    );
}

#[test]
fn unlinked_order_at_root_is_rejected() {
    let serializer = serializer();
    let mut cart = new_cart();
    cart.order = Some(Reference::Resolved(Order {
        id: None,
        status: "draft".into(),
    }));

    let err = serializer
        .serialize_entity(&cart, &SerializeContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::CaseNotAllowed(_)));
}

// ============================================================================
// Deserialization
// ============================================================================

#[test]
fn deserialize_stored_cart() {
    let serializer = serializer();
    let cart: Cart = serializer.deserialize_as(&stored_cart()).unwrap().unwrap();

    assert_eq!(cart.id.as_deref(), Some("/v1/carts/8"));
    assert_eq!(cart.client_phone_number, Some(phone_number()));
    assert_eq!(cart.created_at, Some(created_at()));
    assert_eq!(cart.order, Some(Reference::link("/v1/orders/3")));
    assert_eq!(cart.items.len(), 2);

    let item = cart.items[1].get().unwrap();
    assert_eq!(item.amount, 4);
    assert_eq!(item.data, json!({"size": "L"}));
    assert_eq!(item.product, Some(Reference::link("/v1/products/11")));
    assert_eq!(item.details, vec![Reference::link("/v1/cart_item_details/1")]);

    // The cart and both items are tracked.
    let unit_of_work = serializer.unit_of_work();
    assert_eq!(unit_of_work.len(), 3);
    assert!(unit_of_work.get_dirty_entity("/v1/cart_items/17").is_some());
}

#[test]
fn deserialize_hal_collection() {
    let mapping = restmap_engine::Mapping::new("/v1")
        .with_config(restmap_engine::MappingConfig::hal("carts"))
        .with::<Cart>()
        .and_then(|m| m.with::<CartItem>())
        .and_then(|m| m.with::<CartItemDetail>())
        .and_then(|m| m.with::<Product>())
        .and_then(|m| m.with::<Order>())
        .unwrap();
    let mapping = std::sync::Arc::new(mapping);
    let serializer = restmap_engine::Serializer::new(
        mapping.clone(),
        restmap_engine::UnitOfWork::new_shared(mapping),
    );

    let body = json!({"_embedded": {"carts": [stored_cart(), {"@id": "/v1/carts/9"}]}});
    let carts = serializer.deserialize_collection_as::<Cart>(&body).unwrap();
    assert_eq!(carts.len(), 2);
    assert_eq!(carts[1].id.as_deref(), Some("/v1/carts/9"));
    assert!(carts[1].items.is_empty());
}

// ============================================================================
// Dirty data
// ============================================================================

#[test]
fn update_nested_item_carries_identifier() {
    let serializer = serializer();
    let stored = stored_cart();
    serializer.deserialize_as::<Cart>(&stored).unwrap();

    let mut changed = stored.clone();
    changed["cartItemList"][0]["amount"] = json!(3);

    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    let dirty = serializer.unit_of_work().get_dirty_data(
        changed.as_object().unwrap(),
        stored.as_object().unwrap(),
        metadata,
    );

    assert_eq!(
        Json::Object(dirty),
        json!({"cartItemList": [{"@id": "/v1/cart_items/16", "amount": 3}]})
    );
}

#[test]
fn add_and_remove_items_by_link() {
    let serializer = serializer();
    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    let unit_of_work = serializer.unit_of_work();

    let old = json!({"cartItemList": ["/v1/cart_items/1", "/v1/cart_items/2"]});
    let added = json!({
        "cartItemList": ["/v1/cart_items/1", "/v1/cart_items/2", "/v1/cart_items/3"]
    });
    let removed = json!({"cartItemList": ["/v1/cart_items/2"]});

    let dirty = unit_of_work.get_dirty_data(
        added.as_object().unwrap(),
        old.as_object().unwrap(),
        metadata,
    );
    assert_eq!(Json::Object(dirty), added);

    let dirty = unit_of_work.get_dirty_data(
        removed.as_object().unwrap(),
        old.as_object().unwrap(),
        metadata,
    );
    assert_eq!(Json::Object(dirty), removed);
}

#[test]
fn new_item_prepended_to_stored_cart() {
    let serializer = serializer();
    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    let unit_of_work = serializer.unit_of_work();
    let stored = stored_cart();

    let copy_of_first = json!({
        "amount": 1,
        "data": {"size": "M"},
        "product": "/v1/products/10",
        "cartItemDetailList": []
    });
    let other = json!({
        "amount": 5,
        "data": {"size": "S"},
        "product": "/v1/products/12",
        "cartItemDetailList": []
    });

    for new_item in [copy_of_first, other] {
        let mut changed = stored.clone();
        let items = changed["cartItemList"].as_array_mut().unwrap();
        items.insert(0, new_item.clone());

        let dirty = unit_of_work.get_dirty_data(
            changed.as_object().unwrap(),
            stored.as_object().unwrap(),
            metadata,
        );
        assert_eq!(
            Json::Object(dirty),
            json!({"cartItemList": [
                new_item,
                {"@id": "/v1/cart_items/16"},
                {"@id": "/v1/cart_items/17"},
            ]})
        );
    }
}

#[test]
fn reordered_cart_items_are_sent() {
    let serializer = serializer();
    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    let unit_of_work = serializer.unit_of_work();
    let stored = stored_cart();

    let mut changed = stored.clone();
    changed["cartItemList"].as_array_mut().unwrap().reverse();

    let dirty = unit_of_work.get_dirty_data(
        changed.as_object().unwrap(),
        stored.as_object().unwrap(),
        metadata,
    );
    assert_eq!(
        Json::Object(dirty),
        json!({"cartItemList": [
            {"@id": "/v1/cart_items/17"},
            {"@id": "/v1/cart_items/16"},
        ]})
    );
}

#[test]
fn entity_level_update_payload() {
    let serializer = serializer();
    let mut cart: Cart = serializer.deserialize_as(&stored_cart()).unwrap().unwrap();

    cart.status = "payed".into();
    cart.order = Some(Reference::link("/v1/orders/4"));
    if let Some(item) = cart.items[0].get_mut() {
        item.amount = 2;
    }

    let context = SerializeContext::new().with_relations(["cartItemList"]);
    let new = serializer.serialize_entity(&cart, &context).unwrap();
    let clean = serializer
        .unit_of_work()
        .get_dirty_entity("/v1/carts/8")
        .unwrap();
    let old = serializer.serialize(&*clean, "Cart", &context).unwrap();

    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    let dirty = serializer.unit_of_work().get_dirty_data(&new, &old, metadata);

    assert_eq!(
        Json::Object(dirty),
        json!({
            "status": "payed",
            "cartItemList": [{"@id": "/v1/cart_items/16", "amount": 2}],
            "order": "/v1/orders/4"
        })
    );
}

#[test]
fn unchanged_cart_has_no_dirty_data() {
    let serializer = serializer();
    let cart: Cart = serializer.deserialize_as(&stored_cart()).unwrap().unwrap();

    let new = serializer
        .serialize_entity(&cart, &SerializeContext::new())
        .unwrap();
    let old = snapshot_json(&serializer, "/v1/carts/8", "Cart");

    let metadata = serializer.mapping().class_metadata("Cart").unwrap();
    assert!(serializer
        .unit_of_work()
        .get_dirty_data(&new, &old, metadata)
        .is_empty());
}
