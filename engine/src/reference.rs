//! Lazily resolved relations.
//!
//! A relation read from the wire as a bare IRI becomes
//! [`Reference::Unresolved`]. Nothing is fetched until the caller asks for
//! it with [`Reference::resolve`].

use crate::{error::Result, Entity, Error, Iri, Sdk};

/// A related entity, either in memory or known only by its IRI.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T: Entity> {
    Resolved(T),
    Unresolved(Iri),
}

impl<T: Entity> Reference<T> {
    /// Create an unresolved reference to the given IRI.
    pub fn link(iri: impl Into<String>) -> Self {
        Reference::Unresolved(iri.into())
    }

    /// Check if the related entity is in memory.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    /// Get the entity if it is in memory.
    pub fn get(&self) -> Option<&T> {
        match self {
            Reference::Resolved(entity) => Some(entity),
            Reference::Unresolved(_) => None,
        }
    }

    /// Get the entity mutably if it is in memory.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Reference::Resolved(entity) => Some(entity),
            Reference::Unresolved(_) => None,
        }
    }

    /// The IRI of the related entity.
    ///
    /// Returns `None` for a resolved entity that has not been persisted, or
    /// whose mapping has no identifier.
    pub fn iri(&self) -> Option<Iri> {
        match self {
            Reference::Unresolved(iri) => Some(iri.clone()),
            Reference::Resolved(entity) => T::class_metadata()
                .and_then(|metadata| metadata.identifier_value(entity))
                .ok()
                .flatten(),
        }
    }

    /// Fetch the related entity through the SDK if needed.
    pub fn resolve(&mut self, sdk: &Sdk) -> Result<&T> {
        if let Reference::Unresolved(iri) = self {
            let entity = sdk
                .find::<T>(iri)?
                .ok_or_else(|| Error::EntityNotFound(iri.clone()))?;
            *self = Reference::Resolved(entity);
        }

        match self {
            Reference::Resolved(entity) => Ok(entity),
            Reference::Unresolved(iri) => Err(Error::EntityNotFound(iri.clone())),
        }
    }
}

impl<T: Entity> From<T> for Reference<T> {
    fn from(entity: T) -> Self {
        Reference::Resolved(entity)
    }
}
