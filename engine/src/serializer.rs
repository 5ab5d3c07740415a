//! Serializer - converts between entity graphs and wire structures.
//!
//! # Serialize
//!
//! Attributes are emitted in declaration order. Related entities nested
//! below the root collapse to their identifier (a link) unless the relation
//! key is listed in [`SerializeContext::serialize_relations`]. New entities
//! never emit their empty identifier.
//!
//! # Deserialize
//!
//! The concrete model is resolved from the wire identifier when possible.
//! String relation values become [`Value::Link`]s, nested objects are
//! deserialized recursively, and every entity that comes out with an
//! identifier is registered clean in the [`UnitOfWork`].

use crate::{
    entity::downcast,
    error::Result,
    value::{format_datetime, format_phone_number, lookup_path, parse_datetime, parse_phone_number},
    AnyEntity, Attribute, AttributeType, ClassMetadata, Entity, Error, Mapping, Relation,
    UnitOfWork, Value,
};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// Default bound on entity graph depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Options for one serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeContext {
    /// Relation keys whose members are inlined instead of linked
    pub serialize_relations: Vec<String>,
    /// Whether the entity being serialized is inlined even if it has an id
    pub serialize_relation: bool,
}

impl SerializeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style method to inline the given relations.
    pub fn with_relations<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serialize_relations.extend(keys.into_iter().map(Into::into));
        self
    }

    fn for_relation(&self, key: &str) -> Self {
        Self {
            serialize_relations: self.serialize_relations.clone(),
            serialize_relation: self.serialize_relations.iter().any(|k| k == key),
        }
    }
}

/// Recursive serializer and deserializer.
#[derive(Debug, Clone)]
pub struct Serializer {
    mapping: Arc<Mapping>,
    unit_of_work: Arc<UnitOfWork>,
    max_depth: usize,
}

impl Serializer {
    /// Create a serializer sharing the mapping and unit of work.
    pub fn new(mapping: Arc<Mapping>, unit_of_work: Arc<UnitOfWork>) -> Self {
        Self {
            mapping,
            unit_of_work,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Builder-style method to bound the entity graph depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    /// Serialize an entity declared as `model_name`.
    pub fn serialize(
        &self,
        entity: &dyn AnyEntity,
        model_name: &str,
        context: &SerializeContext,
    ) -> Result<Map<String, Json>> {
        let metadata = self.mapping.class_metadata(model_name)?;
        self.serialize_fields(entity, metadata, 0, context)
    }

    /// Serialize a typed entity under its own model name.
    pub fn serialize_entity<T: Entity>(
        &self,
        entity: &T,
        context: &SerializeContext,
    ) -> Result<Map<String, Json>> {
        self.serialize(entity, T::MODEL_NAME, context)
    }

    fn serialize_nested(
        &self,
        entity: &dyn AnyEntity,
        metadata: &ClassMetadata,
        level: usize,
        context: &SerializeContext,
    ) -> Result<Json> {
        if level > 0 && !context.serialize_relation {
            if let Some(id) = metadata.identifier_json(entity)? {
                return Ok(id);
            }
        }
        self.serialize_fields(entity, metadata, level, context)
            .map(Json::Object)
    }

    fn serialize_fields(
        &self,
        entity: &dyn AnyEntity,
        metadata: &ClassMetadata,
        level: usize,
        context: &SerializeContext,
    ) -> Result<Map<String, Json>> {
        if level > self.max_depth {
            return Err(Error::MaxDepthExceeded {
                model: metadata.model_name().to_string(),
                depth: self.max_depth,
            });
        }

        let mut out = Map::new();
        for attribute in metadata.attribute_list() {
            let value = metadata.read(entity, attribute)?;
            if attribute.is_identifier() && value.is_empty() {
                continue;
            }

            let key = attribute.serialized_key();
            let relation = metadata.relation(key);
            let data = match value {
                Value::Null | Value::Json(Json::Null) => {
                    // Only root many-to-one relations may be nulled.
                    if level > 0 && relation.is_some_and(Relation::is_many_to_one) {
                        tracing::trace!(key, depth = level, "Skipping null many-to-one relation");
                        continue;
                    }
                    Json::Null
                }
                Value::Entity(related) => {
                    match self.serialize_related(related.as_ref(), relation, level, context)? {
                        Some(data) => data,
                        None => continue,
                    }
                }
                Value::List(items) => {
                    Json::Array(self.serialize_list(items, relation, level, context)?)
                }
                other => self.serialize_scalar(other, level, context)?,
            };
            out.insert(key.to_string(), data);
        }

        Ok(out)
    }

    /// A single related entity. `None` means the field is left out.
    fn serialize_related(
        &self,
        related: &dyn AnyEntity,
        relation: Option<&Relation>,
        level: usize,
        context: &SerializeContext,
    ) -> Result<Option<Json>> {
        let Some(relation) = relation else {
            let metadata = self.mapping.class_metadata(related.model_name())?;
            return self
                .serialize_nested(related, metadata, level + 1, context)
                .map(Some);
        };

        let target = self.target_metadata(related, relation)?;
        if let Some(id) = target.identifier_json(related)? {
            return Ok(Some(id));
        }

        if relation.is_many_to_one() {
            if level > 0 {
                tracing::trace!(
                    key = %relation.serialized_key,
                    depth = level,
                    "Skipping unlinked many-to-one relation"
                );
                return Ok(None);
            }
            return Err(Error::CaseNotAllowed(format!(
                "relation {} references a {} without identifier",
                relation.serialized_key, relation.target_entity
            )));
        }

        self.serialize_nested(
            related,
            target,
            level + 1,
            &context.for_relation(&relation.serialized_key),
        )
        .map(Some)
    }

    fn serialize_list(
        &self,
        items: Vec<Value>,
        relation: Option<&Relation>,
        level: usize,
        context: &SerializeContext,
    ) -> Result<Vec<Json>> {
        let child_context = match relation {
            Some(relation) => context.for_relation(&relation.serialized_key),
            None => context.clone(),
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::Entity(related) => {
                    let metadata = match relation {
                        Some(relation) => self.target_metadata(related.as_ref(), relation)?,
                        None => self.mapping.class_metadata(related.model_name())?,
                    };
                    self.serialize_nested(related.as_ref(), metadata, level + 1, &child_context)
                }
                Value::List(inner) => self
                    .serialize_list(inner, None, level, context)
                    .map(Json::Array),
                other => self.serialize_scalar(other, level, context),
            })
            .collect()
    }

    fn serialize_scalar(
        &self,
        value: Value,
        level: usize,
        context: &SerializeContext,
    ) -> Result<Json> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Json(json) => json,
            Value::DateTime(datetime) => Json::String(format_datetime(&datetime)),
            Value::PhoneNumber(number) => Json::String(format_phone_number(&number)),
            Value::Link(iri) => Json::String(iri),
            Value::Entity(related) => self
                .serialize_related(related.as_ref(), None, level, context)?
                .unwrap_or(Json::Null),
            Value::List(items) => Json::Array(self.serialize_list(items, None, level, context)?),
        })
    }

    /// Metadata of a related entity: its own model when mapped, else the
    /// relation target.
    fn target_metadata(
        &self,
        related: &dyn AnyEntity,
        relation: &Relation,
    ) -> Result<&ClassMetadata> {
        match self.mapping.class_metadata(related.model_name()) {
            Ok(metadata) => Ok(metadata),
            Err(_) => self.mapping.class_metadata(&relation.target_entity),
        }
    }

    /// Deserialize a wire object into an entity of `model_name`, or of a
    /// more specific model resolved from its identifier.
    ///
    /// Returns `None` for anything but a non-empty object.
    pub fn deserialize(&self, data: &Json, model_name: &str) -> Result<Option<Box<dyn AnyEntity>>> {
        let object = match data.as_object() {
            Some(object) if !object.is_empty() => object,
            _ => return Ok(None),
        };
        let metadata = self.mapping.class_metadata(model_name)?;
        self.deserialize_object(object, metadata, 0).map(Some)
    }

    /// Deserialize into a typed entity.
    pub fn deserialize_as<T: Entity>(&self, data: &Json) -> Result<Option<T>> {
        self.deserialize(data, T::MODEL_NAME)?
            .map(downcast::<T>)
            .transpose()
    }

    /// Deserialize every member of a collection response.
    pub fn deserialize_collection(
        &self,
        body: &Json,
        model_name: &str,
    ) -> Result<Vec<Box<dyn AnyEntity>>> {
        let mut entities = Vec::new();
        for member in self.mapping.collection_members(body) {
            if let Some(entity) = self.deserialize(member, model_name)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Deserialize every member of a collection response into typed entities.
    pub fn deserialize_collection_as<T: Entity>(&self, body: &Json) -> Result<Vec<T>> {
        self.deserialize_collection(body, T::MODEL_NAME)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    fn deserialize_object(
        &self,
        object: &Map<String, Json>,
        metadata: &ClassMetadata,
        level: usize,
    ) -> Result<Box<dyn AnyEntity>> {
        if level > self.max_depth {
            return Err(Error::MaxDepthExceeded {
                model: metadata.model_name().to_string(),
                depth: self.max_depth,
            });
        }

        let metadata = self.resolve_metadata(object, metadata);
        let mut instance = metadata.new_instance();

        for attribute in metadata.attribute_list() {
            let key = attribute.serialized_key();
            let Some(raw) = lookup_path(object, key) else {
                continue;
            };

            let value = match metadata.relation(key) {
                Some(relation) => self.relation_value(raw, relation, level)?,
                None => coerce(raw, attribute)?,
            };

            metadata
                .write(instance.as_mut(), attribute, value)
                .map_err(|e| match e {
                    Error::TypeMismatch { .. } => Error::InvalidValue {
                        attribute: key.to_string(),
                        reason: e.to_string(),
                    },
                    other => other,
                })?;
        }

        if let Some(id) = metadata.identifier_value(instance.as_ref())? {
            self.unit_of_work.register_clean(&id, instance.as_ref());
        }

        Ok(instance)
    }

    /// Pick a more specific model when the wire identifier points to one.
    fn resolve_metadata<'a>(
        &'a self,
        object: &Map<String, Json>,
        fallback: &'a ClassMetadata,
    ) -> &'a ClassMetadata {
        let id = fallback
            .identifier_key()
            .into_iter()
            .chain(std::iter::once("@id"))
            .find_map(|key| lookup_path(object, key).and_then(Json::as_str));

        match id.and_then(|id| self.mapping.try_class_metadata_by_id(id)) {
            Some(resolved) if resolved.model_name() != fallback.model_name() => {
                tracing::trace!(
                    from = fallback.model_name(),
                    to = resolved.model_name(),
                    "Resolved concrete model from identifier"
                );
                resolved
            }
            _ => fallback,
        }
    }

    fn relation_value(&self, raw: &Json, relation: &Relation, level: usize) -> Result<Value> {
        Ok(match raw {
            Json::Null => Value::Null,
            Json::String(iri) => Value::Link(iri.clone()),
            Json::Object(fragment) => {
                let target = self.mapping.class_metadata(&relation.target_entity)?;
                Value::Entity(self.deserialize_object(fragment, target, level + 1)?)
            }
            Json::Array(items) => {
                let target = self.mapping.class_metadata(&relation.target_entity)?;
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Json::Object(fragment) => list.push(Value::Entity(
                            self.deserialize_object(fragment, target, level + 1)?,
                        )),
                        Json::String(iri) => list.push(Value::Link(iri.clone())),
                        _ => {}
                    }
                }
                Value::List(list)
            }
            other => Value::Json(other.clone()),
        })
    }
}

/// Coerce a wire value according to the attribute type.
fn coerce(raw: &Json, attribute: &Attribute) -> Result<Value> {
    let invalid = |reason: String| Error::InvalidValue {
        attribute: attribute.serialized_key().to_string(),
        reason,
    };

    Ok(match (attribute.attribute_type(), raw) {
        (_, Json::Null) => Value::Null,
        (AttributeType::Datetime, Json::String(raw)) => {
            Value::DateTime(parse_datetime(raw).map_err(invalid)?)
        }
        (AttributeType::PhoneNumber, Json::String(raw)) => {
            Value::PhoneNumber(parse_phone_number(raw).map_err(invalid)?)
        }
        (AttributeType::Integer, Json::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Json(Json::from(n)))
            .map_err(|e| invalid(format!("'{}' is not an integer: {}", raw, e)))?,
        (AttributeType::Float, Json::String(raw)) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(|n| Value::Json(Json::Number(n)))
            .ok_or_else(|| invalid(format!("'{}' is not a float", raw)))?,
        (_, other) => Value::Json(other.clone()),
    })
}
