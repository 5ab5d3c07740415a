//! Shop model shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, FixedOffset};
use phonenumber::PhoneNumber;
use restmap_engine::{
    Attribute, AttributeType, ClassMetadata, Entity, Mapping, Reference, Relation, Result,
    SerializeContext, Serializer, UnitOfWork,
};
use serde_json::Value as Json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: Option<String>,
    pub value: String,
    pub currency: String,
}

impl Entity for Product {
    const MODEL_NAME: &'static str = "Product";

    fn class_metadata() -> Result<ClassMetadata> {
        ClassMetadata::builder::<Self>("products")
            .property(Attribute::identifier("@id").named("id"), |p| &p.id, |p| &mut p.id)
            .property(Attribute::new("value"), |p| &p.value, |p| &mut p.value)
            .property(Attribute::new("currency"), |p| &p.currency, |p| &mut p.currency)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: Option<String>,
    pub status: String,
}

impl Entity for Order {
    const MODEL_NAME: &'static str = "Order";

    fn class_metadata() -> Result<ClassMetadata> {
        ClassMetadata::builder::<Self>("orders")
            .property(Attribute::identifier("@id").named("id"), |o| &o.id, |o| &mut o.id)
            .property(Attribute::new("status"), |o| &o.status, |o| &mut o.status)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartItemDetail {
    pub id: Option<String>,
    pub name: String,
}

impl Entity for CartItemDetail {
    const MODEL_NAME: &'static str = "CartItemDetail";

    fn class_metadata() -> Result<ClassMetadata> {
        ClassMetadata::builder::<Self>("cart_item_details")
            .property(Attribute::identifier("@id").named("id"), |d| &d.id, |d| &mut d.id)
            .property(Attribute::new("name"), |d| &d.name, |d| &mut d.name)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartItem {
    pub id: Option<String>,
    pub amount: i64,
    pub data: Json,
    pub product: Option<Reference<Product>>,
    pub details: Vec<Reference<CartItemDetail>>,
}

impl Entity for CartItem {
    const MODEL_NAME: &'static str = "CartItem";

    fn class_metadata() -> Result<ClassMetadata> {
        ClassMetadata::builder::<Self>("cart_items")
            .property(Attribute::identifier("@id").named("id"), |i| &i.id, |i| &mut i.id)
            .property(
                Attribute::new("amount").typed(AttributeType::Integer),
                |i| &i.amount,
                |i| &mut i.amount,
            )
            .property(Attribute::new("data"), |i| &i.data, |i| &mut i.data)
            .property(Attribute::new("product"), |i| &i.product, |i| &mut i.product)
            .property(
                Attribute::new("cartItemDetailList").named("details"),
                |i| &i.details,
                |i| &mut i.details,
            )
            .relation(Relation::many_to_one("product", "Product"))
            .relation(Relation::one_to_many("cartItemDetailList", "CartItemDetail"))
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub id: Option<String>,
    pub status: String,
    pub client_phone_number: Option<PhoneNumber>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub items: Vec<Reference<CartItem>>,
    pub order: Option<Reference<Order>>,
}

impl Entity for Cart {
    const MODEL_NAME: &'static str = "Cart";

    fn class_metadata() -> Result<ClassMetadata> {
        ClassMetadata::builder::<Self>("carts")
            .property(Attribute::identifier("@id").named("id"), |c| &c.id, |c| &mut c.id)
            .property(Attribute::new("status"), |c| &c.status, |c| &mut c.status)
            .property(
                Attribute::new("clientPhoneNumber")
                    .named("client_phone_number")
                    .typed(AttributeType::PhoneNumber),
                |c| &c.client_phone_number,
                |c| &mut c.client_phone_number,
            )
            .property(
                Attribute::new("createdAt")
                    .named("created_at")
                    .typed(AttributeType::Datetime),
                |c| &c.created_at,
                |c| &mut c.created_at,
            )
            .property(
                Attribute::new("cartItemList").named("items"),
                |c| &c.items,
                |c| &mut c.items,
            )
            .property(Attribute::new("order"), |c| &c.order, |c| &mut c.order)
            .relation(Relation::one_to_many("cartItemList", "CartItem"))
            .relation(Relation::many_to_one("order", "Order"))
            .build()
    }
}

/// Log engine events while tests run. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restmap_engine=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn mapping() -> Mapping {
    Mapping::new("/v1")
        .with::<Product>()
        .and_then(Mapping::with::<Order>)
        .and_then(Mapping::with::<CartItemDetail>)
        .and_then(Mapping::with::<CartItem>)
        .and_then(Mapping::with::<Cart>)
        .expect("shop mapping is valid")
}

pub fn serializer() -> Serializer {
    init_tracing();
    let mapping = Arc::new(mapping());
    let unit_of_work = UnitOfWork::new_shared(mapping.clone());
    Serializer::new(mapping, unit_of_work)
}

pub fn known_product() -> Product {
    Product {
        id: Some("/v1/products/10".into()),
        value: "8.00".into(),
        currency: "EUR".into(),
    }
}

pub fn created_at() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2015-09-20T12:08:00+00:00").unwrap()
}

pub fn phone_number() -> PhoneNumber {
    phonenumber::parse(None, "+33 1 23 45 67 89").unwrap()
}

/// Serialize the clean snapshot of `id` the same way as the current state.
pub fn snapshot_json(
    serializer: &Serializer,
    id: &str,
    model: &str,
) -> serde_json::Map<String, Json> {
    let clean = serializer
        .unit_of_work()
        .get_dirty_entity(id)
        .expect("snapshot registered");
    serializer
        .serialize(&*clean, model, &SerializeContext::new())
        .unwrap()
}
