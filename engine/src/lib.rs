//! # Restmap Engine
//!
//! A client-side mapping layer for hypermedia REST APIs (Hydra/JSON-LD and HAL).
//!
//! This crate turns domain entities into request payloads and response bodies
//! back into entities. It tracks what each entity looked like when it was
//! fetched so that updates only send the fields that actually changed.
//!
//! ## Design Principles
//!
//! - **No IO**: HTTP is delegated to a caller-supplied [`Transport`]
//! - **Code-first**: Entities describe their own mapping through [`Entity::class_metadata`]
//! - **Minimal updates**: [`UnitOfWork::get_dirty_data`] computes partial payloads
//!
//! ## Core Concepts
//!
//! ### Metadata
//!
//! Each entity type declares a [`ClassMetadata`]: its mapping key (the
//! collection segment of its IRIs), its [`Attribute`]s with wire keys and
//! types, and its [`Relation`]s to other models.
//!
//! ### Mapping
//!
//! The [`Mapping`] is the registry of every model of one API. It resolves a
//! model from an IRI like `/v1/carts/8` and knows where collection responses
//! keep their members (`hydra:member` by default, see [`MappingConfig::hal`]).
//!
//! ### Serializer
//!
//! The [`Serializer`] walks entity graphs both ways. Related entities that
//! already have an identifier are written as links unless the
//! [`SerializeContext`] asks for them inline.
//!
//! ### Unit of Work
//!
//! Every identified entity read from the wire is kept as a clean snapshot in
//! the [`UnitOfWork`]. Diffing the serialized snapshot against the
//! serialized current state yields the update payload.
//!
//! ## Quick Start
//!
//! ```rust
//! use restmap_engine::{
//!     Attribute, ClassMetadata, Entity, Mapping, Result, SerializeContext, Serializer,
//!     UnitOfWork,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Cart {
//!     id: Option<String>,
//!     status: String,
//! }
//!
//! impl Entity for Cart {
//!     const MODEL_NAME: &'static str = "Cart";
//!
//!     fn class_metadata() -> Result<ClassMetadata> {
//!         ClassMetadata::builder::<Self>("carts")
//!             .property(Attribute::identifier("@id").named("id"), |c| &c.id, |c| &mut c.id)
//!             .property(Attribute::new("status"), |c| &c.status, |c| &mut c.status)
//!             .build()
//!     }
//! }
//!
//! // 1. Register the models
//! let mapping = Arc::new(Mapping::new("/v1").with::<Cart>().unwrap());
//! let unit_of_work = UnitOfWork::new_shared(mapping.clone());
//! let serializer = Serializer::new(mapping, unit_of_work.clone());
//!
//! // 2. Read a response body
//! let body = json!({"@id": "/v1/carts/1", "status": "awaiting_payment"});
//! let mut cart: Cart = serializer.deserialize_as(&body).unwrap().unwrap();
//!
//! // 3. Change it and compute the update payload
//! cart.status = "payed".into();
//! let context = SerializeContext::new();
//! let new = serializer.serialize_entity(&cart, &context).unwrap();
//! let clean = unit_of_work.get_dirty_entity("/v1/carts/1").unwrap();
//! let old = serializer.serialize(&*clean, "Cart", &context).unwrap();
//!
//! let metadata = serializer.mapping().class_metadata("Cart").unwrap();
//! let dirty = unit_of_work.get_dirty_data(&new, &old, metadata);
//! assert_eq!(serde_json::Value::Object(dirty), json!({"status": "payed"}));
//! ```
//!
//! ## SDK
//!
//! The [`Sdk`] bundles all of the above around a [`Transport`] and exposes
//! `find`, `find_all`, `persist`, `update` and `remove`.

pub mod entity;
pub mod error;
pub mod mapping;
pub mod metadata;
pub mod reference;
pub mod sdk;
pub mod serializer;
pub mod unit_of_work;
pub mod value;

// Re-export main types at crate root
pub use entity::{AnyEntity, Entity};
pub use error::{Error, Result};
pub use mapping::{Mapping, MappingConfig, DEFAULT_COLLECTION_KEY};
pub use metadata::{
    Attribute, AttributeType, ClassMetadata, ClassMetadataBuilder, Relation, RelationType,
};
pub use reference::Reference;
pub use sdk::{Sdk, Transport};
pub use serializer::{SerializeContext, Serializer, DEFAULT_MAX_DEPTH};
pub use unit_of_work::UnitOfWork;
pub use value::{FromValue, ToValue, Value};

/// Resource identifier as found on the wire, e.g. `/v1/carts/8`.
pub type Iri = String;
