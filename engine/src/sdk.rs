//! SDK - wires the mapping engine to a caller-supplied transport.
//!
//! The engine performs no IO. A [`Transport`] issues the HTTP calls and
//! hands back decoded JSON bodies; the [`Sdk`] shapes the payloads around
//! those calls and keeps the [`UnitOfWork`] up to date.

use crate::{
    error::Result, ClassMetadata, Entity, Error, Mapping, SerializeContext, Serializer, UnitOfWork,
};
use serde_json::Value as Json;
use std::sync::Arc;

/// Synchronous HTTP transport.
///
/// Implementations map non-success statuses to [`Error::Transport`].
pub trait Transport: Send + Sync {
    /// GET a resource. `None` means not found.
    fn get(&self, path: &str) -> Result<Option<Json>>;

    /// POST a new resource and return the created representation.
    fn post(&self, path: &str, body: &Json) -> Result<Json>;

    /// PUT an update and return the updated representation.
    fn put(&self, path: &str, body: &Json) -> Result<Json>;

    /// DELETE a resource.
    fn delete(&self, path: &str) -> Result<()>;
}

/// Entry point tying mapping, serializer, unit of work and transport.
pub struct Sdk {
    mapping: Arc<Mapping>,
    unit_of_work: Arc<UnitOfWork>,
    serializer: Serializer,
    transport: Box<dyn Transport>,
}

impl Sdk {
    /// Create an SDK with a fresh unit of work.
    pub fn new(mapping: Mapping, transport: impl Transport + 'static) -> Self {
        let mapping = Arc::new(mapping);
        let unit_of_work = UnitOfWork::new_shared(mapping.clone());
        let serializer = Serializer::new(mapping.clone(), unit_of_work.clone());
        Self {
            mapping,
            unit_of_work,
            serializer,
            transport: Box::new(transport),
        }
    }

    /// Builder-style method to bound the entity graph depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.serializer = self.serializer.with_max_depth(max_depth);
        self
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Fetch one entity by IRI or bare identifier.
    pub fn find<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let metadata = self.mapping.class_metadata(T::MODEL_NAME)?;
        let iri = self.mapping.resource_iri(metadata.key(), id);

        tracing::debug!(model = T::MODEL_NAME, iri = %iri, "Fetching entity");
        match self.transport.get(&iri)? {
            Some(body) => self.serializer.deserialize_as::<T>(&body),
            None => Ok(None),
        }
    }

    /// Fetch every entity of a collection.
    pub fn find_all<T: Entity>(&self) -> Result<Vec<T>> {
        let metadata = self.mapping.class_metadata(T::MODEL_NAME)?;
        let iri = self.mapping.collection_iri(metadata.key());

        tracing::debug!(model = T::MODEL_NAME, iri = %iri, "Fetching collection");
        match self.transport.get(&iri)? {
            Some(body) => self.serializer.deserialize_collection_as::<T>(&body),
            None => Ok(Vec::new()),
        }
    }

    /// Create a new entity.
    pub fn persist<T: Entity>(&self, entity: &T, context: &SerializeContext) -> Result<T> {
        let metadata = self.mapping.class_metadata(T::MODEL_NAME)?;
        let body = self.serializer.serialize_entity(entity, context)?;
        let iri = self.mapping.collection_iri(metadata.key());

        tracing::debug!(model = T::MODEL_NAME, iri = %iri, "Persisting entity");
        let response = self.transport.post(&iri, &Json::Object(body))?;
        self.expect_entity(&response)
    }

    /// Send only the fields changed since the entity was last fetched.
    pub fn update<T: Entity>(&self, entity: &T, context: &SerializeContext) -> Result<T> {
        let metadata = self.mapping.class_metadata(T::MODEL_NAME)?;
        let id = self.require_identifier(metadata, entity)?;

        let payload = self.dirty_payload(metadata, entity, &id, context)?;

        tracing::debug!(
            model = T::MODEL_NAME,
            iri = %id,
            fields = payload.len(),
            "Updating entity"
        );
        let response = self.transport.put(&id, &Json::Object(payload))?;
        self.expect_entity(&response)
    }

    /// Delete an entity and forget its snapshot.
    pub fn remove<T: Entity>(&self, entity: &T) -> Result<()> {
        let metadata = self.mapping.class_metadata(T::MODEL_NAME)?;
        let id = self.require_identifier(metadata, entity)?;

        tracing::debug!(model = T::MODEL_NAME, iri = %id, "Removing entity");
        self.transport.delete(&id)?;
        self.unit_of_work.clear(&id);
        Ok(())
    }

    /// Partial update payload of an entity against its clean snapshot.
    pub fn dirty_payload<T: Entity>(
        &self,
        metadata: &ClassMetadata,
        entity: &T,
        id: &str,
        context: &SerializeContext,
    ) -> Result<serde_json::Map<String, Json>> {
        let new = self.serializer.serialize_entity(entity, context)?;
        let old = match self.unit_of_work.get_dirty_entity(id) {
            Some(clean) => self
                .serializer
                .serialize(&*clean, metadata.model_name(), context)?,
            None => metadata.default_serialized_model(),
        };
        Ok(self.unit_of_work.get_dirty_data(&new, &old, metadata))
    }

    fn require_identifier<T: Entity>(
        &self,
        metadata: &ClassMetadata,
        entity: &T,
    ) -> Result<String> {
        metadata
            .identifier_value(entity)?
            .ok_or_else(|| Error::UnpersistedEntity {
                model: T::MODEL_NAME.to_string(),
            })
    }

    fn expect_entity<T: Entity>(&self, response: &Json) -> Result<T> {
        self.serializer
            .deserialize_as::<T>(response)?
            .ok_or_else(|| Error::InvalidResponse(format!("expected a {} body", T::MODEL_NAME)))
    }
}
