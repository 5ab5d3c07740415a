//! Domain entity traits.
//!
//! Entities are plain Rust structs. Each one describes its own wire mapping
//! through [`Entity::class_metadata`]; the engine only ever handles them
//! through the object-safe [`AnyEntity`] view.

use crate::{error::Result, ClassMetadata, Error};
use std::any::Any;
use std::fmt;

/// A domain type mapped to a REST resource.
pub trait Entity: Any + Clone + Default + fmt::Debug + Send + Sync {
    /// Model name used to look the type up in a [`Mapping`](crate::Mapping).
    const MODEL_NAME: &'static str;

    /// Build the metadata describing how this type maps to the wire.
    fn class_metadata() -> Result<ClassMetadata>;
}

/// Type-erased entity, blanket-implemented for every [`Entity`].
pub trait AnyEntity: Any + fmt::Debug + Send + Sync {
    /// Model name of the concrete type.
    fn model_name(&self) -> &'static str;

    /// Clone into a new box.
    fn clone_entity(&self) -> Box<dyn AnyEntity>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Entity> AnyEntity for T {
    fn model_name(&self) -> &'static str {
        T::MODEL_NAME
    }

    fn clone_entity(&self) -> Box<dyn AnyEntity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Clone for Box<dyn AnyEntity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

impl dyn AnyEntity {
    /// Borrow as a concrete entity type.
    pub fn downcast_ref<T: Entity>(&self) -> Result<&T> {
        let model = self.model_name();
        self.as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(model))
    }

    /// Mutably borrow as a concrete entity type.
    pub fn downcast_mut<T: Entity>(&mut self) -> Result<&mut T> {
        let model = self.model_name();
        self.as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(model))
    }
}

/// Unbox into a concrete entity type.
pub fn downcast<T: Entity>(entity: Box<dyn AnyEntity>) -> Result<T> {
    let model = entity.model_name();
    entity
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| mismatch::<T>(model))
}

fn mismatch<T: Entity>(got: &str) -> Error {
    Error::TypeMismatch {
        expected: T::MODEL_NAME.to_string(),
        got: got.to_string(),
    }
}
