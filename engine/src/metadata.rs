//! Class metadata: how one entity type maps to a wire resource.
//!
//! Metadata is declared in code through [`ClassMetadata::builder`]. Each
//! attribute carries the accessors used to read and write it on an entity,
//! so no reflection is needed at runtime.

use crate::{error::Result, AnyEntity, Entity, Error, FromValue, ToValue, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Getter = Arc<dyn Fn(&dyn AnyEntity) -> Result<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn AnyEntity, Value) -> Result<()> + Send + Sync>;
type Factory = Arc<dyn Fn() -> Box<dyn AnyEntity> + Send + Sync>;

/// Wire types an attribute can hold. Drives value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Array,
    JsonArray,
    PhoneNumber,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::Datetime => "datetime",
            AttributeType::Array => "array",
            AttributeType::JsonArray => "json_array",
            AttributeType::PhoneNumber => "phone_number",
        };
        f.write_str(name)
    }
}

/// Mapping of one field.
#[derive(Clone)]
pub struct Attribute {
    serialized_key: String,
    attribute_name: String,
    attribute_type: AttributeType,
    is_identifier: bool,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Attribute {
    /// Create an attribute whose domain name is its serialized key.
    pub fn new(serialized_key: impl Into<String>) -> Self {
        let serialized_key = serialized_key.into();
        Self {
            attribute_name: serialized_key.clone(),
            serialized_key,
            attribute_type: AttributeType::default(),
            is_identifier: false,
            getter: None,
            setter: None,
        }
    }

    /// Create the identifier attribute.
    pub fn identifier(serialized_key: impl Into<String>) -> Self {
        Self {
            is_identifier: true,
            ..Self::new(serialized_key)
        }
    }

    /// Builder-style method to set the domain name.
    pub fn named(mut self, attribute_name: impl Into<String>) -> Self {
        self.attribute_name = attribute_name.into();
        self
    }

    /// Builder-style method to set the wire type.
    pub fn typed(mut self, attribute_type: AttributeType) -> Self {
        self.attribute_type = attribute_type;
        self
    }

    pub fn serialized_key(&self) -> &str {
        &self.serialized_key
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn is_identifier(&self) -> bool {
        self.is_identifier
    }

    /// Whether a value can be written back into an entity.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("serialized_key", &self.serialized_key)
            .field("attribute_name", &self.attribute_name)
            .field("attribute_type", &self.attribute_type)
            .field("is_identifier", &self.is_identifier)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Kind of association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    ManyToOne,
    OneToMany,
}

/// Mapping of one association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub serialized_key: String,
    pub relation_type: RelationType,
    /// Model name of the related entity
    pub target_entity: String,
}

impl Relation {
    pub fn many_to_one(
        serialized_key: impl Into<String>,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            serialized_key: serialized_key.into(),
            relation_type: RelationType::ManyToOne,
            target_entity: target_entity.into(),
        }
    }

    pub fn one_to_many(
        serialized_key: impl Into<String>,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            serialized_key: serialized_key.into(),
            relation_type: RelationType::OneToMany,
            target_entity: target_entity.into(),
        }
    }

    pub fn is_many_to_one(&self) -> bool {
        self.relation_type == RelationType::ManyToOne
    }

    pub fn is_one_to_many(&self) -> bool {
        self.relation_type == RelationType::OneToMany
    }
}

/// Metadata for one entity type.
#[derive(Clone)]
pub struct ClassMetadata {
    key: String,
    model_name: String,
    repository_name: Option<String>,
    /// Attributes by serialized key, in declaration order
    attributes: IndexMap<String, Attribute>,
    /// Serialized key of the identifier attribute
    identifier: Option<String>,
    relations: IndexMap<String, Relation>,
    factory: Factory,
}

impl ClassMetadata {
    /// Start describing entity type `T`, exposed under the resource `key`.
    pub fn builder<T: Entity>(key: impl Into<String>) -> ClassMetadataBuilder<T> {
        ClassMetadataBuilder {
            key: key.into(),
            repository_name: None,
            attributes: Vec::new(),
            relations: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Resource collection name, e.g. `cart_items`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.repository_name.as_deref()
    }

    /// Attributes in declaration order.
    pub fn attribute_list(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Replace the attribute list.
    ///
    /// Fails if more than one attribute is flagged as identifier; the error
    /// names the first one found.
    pub fn set_attribute_list(&mut self, attribute_list: Vec<Attribute>) -> Result<()> {
        let mut attributes = IndexMap::with_capacity(attribute_list.len());
        let mut identifier: Option<String> = None;

        for attribute in attribute_list {
            if attribute.is_identifier {
                if let Some(first) = identifier {
                    return Err(Error::MoreThanOneIdentifier {
                        model: self.model_name.clone(),
                        first,
                    });
                }
                identifier = Some(attribute.serialized_key.clone());
            }
            attributes.insert(attribute.serialized_key.clone(), attribute);
        }

        self.attributes = attributes;
        self.identifier = identifier;
        Ok(())
    }

    /// Get an attribute by serialized key.
    pub fn attribute(&self, serialized_key: &str) -> Option<&Attribute> {
        self.attributes.get(serialized_key)
    }

    pub fn relation_list(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Replace the relation list.
    pub fn set_relation_list(&mut self, relation_list: Vec<Relation>) {
        self.relations = relation_list
            .into_iter()
            .map(|relation| (relation.serialized_key.clone(), relation))
            .collect();
    }

    /// Get a relation by serialized key.
    pub fn relation(&self, serialized_key: &str) -> Option<&Relation> {
        self.relations.get(serialized_key)
    }

    pub fn has_identifier_attribute(&self) -> bool {
        self.identifier.is_some()
    }

    /// Get the identifier attribute.
    ///
    /// Check [`has_identifier_attribute`](Self::has_identifier_attribute)
    /// first when the mapping may lack one.
    pub fn identifier_attribute(&self) -> Result<&Attribute> {
        self.identifier
            .as_deref()
            .and_then(|key| self.attributes.get(key))
            .ok_or_else(|| Error::MissingIdentifier {
                model: self.model_name.clone(),
            })
    }

    /// Serialized key of the identifier, if any.
    pub fn identifier_key(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Template wire object used when no clean snapshot exists.
    ///
    /// Every attribute is null and every one-to-many relation is empty.
    pub fn default_serialized_model(&self) -> Map<String, Json> {
        let mut out: Map<String, Json> = self
            .attributes
            .keys()
            .map(|key| (key.clone(), Json::Null))
            .collect();

        for relation in self.relations.values().filter(|r| r.is_one_to_many()) {
            out.insert(relation.serialized_key.clone(), Json::Array(Vec::new()));
        }

        out
    }

    /// Create a blank instance of the mapped type.
    pub fn new_instance(&self) -> Box<dyn AnyEntity> {
        (self.factory)()
    }

    /// Read an attribute off an entity.
    pub fn read(&self, entity: &dyn AnyEntity, attribute: &Attribute) -> Result<Value> {
        let getter = attribute
            .getter
            .as_ref()
            .ok_or_else(|| Error::MissingGetter {
                property: attribute.attribute_name.clone(),
                model: self.model_name.clone(),
            })?;
        getter(entity)
    }

    /// Write an attribute on an entity.
    pub fn write(
        &self,
        entity: &mut dyn AnyEntity,
        attribute: &Attribute,
        value: Value,
    ) -> Result<()> {
        let setter = attribute
            .setter
            .as_ref()
            .ok_or_else(|| Error::MissingSetter {
                property: attribute.attribute_name.clone(),
                model: self.model_name.clone(),
            })?;
        setter(entity, value)
    }

    /// Current identifier value of an entity, `None` when empty.
    pub fn identifier_value(&self, entity: &dyn AnyEntity) -> Result<Option<String>> {
        if !self.has_identifier_attribute() {
            return Ok(None);
        }
        let attribute = self.identifier_attribute()?;
        Ok(self.read(entity, attribute)?.as_identifier())
    }

    /// Current identifier of an entity as it goes on the wire, `None` when
    /// empty.
    pub fn identifier_json(&self, entity: &dyn AnyEntity) -> Result<Option<Json>> {
        if !self.has_identifier_attribute() {
            return Ok(None);
        }
        let value = self.read(entity, self.identifier_attribute()?)?;
        if value.is_empty() {
            return Ok(None);
        }
        Json::from_value(value).map(Some)
    }
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("key", &self.key)
            .field("model_name", &self.model_name)
            .field("repository_name", &self.repository_name)
            .field("attributes", &self.attributes)
            .field("identifier", &self.identifier)
            .field("relations", &self.relations)
            .finish()
    }
}

/// Typed builder for [`ClassMetadata`].
pub struct ClassMetadataBuilder<T: Entity> {
    key: String,
    repository_name: Option<String>,
    attributes: Vec<Attribute>,
    relations: Vec<Relation>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> ClassMetadataBuilder<T> {
    /// Name the repository type associated with the entity.
    pub fn repository(mut self, repository_name: impl Into<String>) -> Self {
        self.repository_name = Some(repository_name.into());
        self
    }

    /// Bind an attribute to a directly writable field.
    pub fn property<F, G, M>(mut self, mut attribute: Attribute, get: G, get_mut: M) -> Self
    where
        F: ToValue + FromValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        attribute.getter = Some(Arc::new(move |entity: &dyn AnyEntity| {
            Ok(get(entity.downcast_ref::<T>()?).to_value())
        }));
        attribute.setter = Some(Arc::new(move |entity: &mut dyn AnyEntity, value: Value| {
            *get_mut(entity.downcast_mut::<T>()?) = F::from_value(value)?;
            Ok(())
        }));
        self.attributes.push(attribute);
        self
    }

    /// Bind an attribute to an explicit getter and setter.
    pub fn accessor<G, S>(mut self, mut attribute: Attribute, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        attribute.getter = Some(Arc::new(move |entity: &dyn AnyEntity| {
            Ok(getter(entity.downcast_ref::<T>()?))
        }));
        attribute.setter = Some(Arc::new(move |entity: &mut dyn AnyEntity, value: Value| {
            setter(entity.downcast_mut::<T>()?, value)
        }));
        self.attributes.push(attribute);
        self
    }

    /// Bind an attribute to a getter only.
    pub fn read_only<G>(mut self, mut attribute: Attribute, getter: G) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        attribute.getter = Some(Arc::new(move |entity: &dyn AnyEntity| {
            Ok(getter(entity.downcast_ref::<T>()?))
        }));
        self.attributes.push(attribute);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn build(self) -> Result<ClassMetadata> {
        let mut metadata = ClassMetadata {
            key: self.key,
            model_name: T::MODEL_NAME.to_string(),
            repository_name: self.repository_name,
            attributes: IndexMap::new(),
            identifier: None,
            relations: IndexMap::new(),
            factory: Arc::new(|| Box::new(T::default()) as Box<dyn AnyEntity>),
        };
        metadata.set_attribute_list(self.attributes)?;
        metadata.set_relation_list(self.relations);
        Ok(metadata)
    }
}
