//! Mapping registry.
//!
//! Holds every [`ClassMetadata`] of an API and resolves the relationships
//! between resource keys, model names and IRIs.

use crate::{error::Result, value::lookup_path, ClassMetadata, Entity, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::borrow::Cow;

/// Default location of the member list in a collection response.
pub const DEFAULT_COLLECTION_KEY: &str = "hydra:member";

/// Mapping options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappingConfig {
    /// Dot-notation path to the member list in a collection response
    pub collection_key: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            collection_key: DEFAULT_COLLECTION_KEY.to_string(),
        }
    }
}

impl MappingConfig {
    /// Configuration for a HAL API embedding members under `_embedded.<rel>`.
    pub fn hal(rel: &str) -> Self {
        Self {
            collection_key: format!("_embedded.{}", rel),
        }
    }

    /// Load configuration from JSON. Missing options keep their default.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidValue {
            attribute: "config".into(),
            reason: e.to_string(),
        })
    }
}

/// Registry of all mapped entity types.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    id_prefix: String,
    config: MappingConfig,
    class_metadata: Vec<ClassMetadata>,
}

impl Mapping {
    /// Create a mapping whose IRIs start with `id_prefix` (e.g. `/v1`).
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            config: MappingConfig::default(),
            class_metadata: Vec::new(),
        }
    }

    /// Builder-style method to set the configuration.
    pub fn with_config(mut self, config: MappingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Add metadata to the registry, replacing any entry of the same model.
    pub fn add_class_metadata(&mut self, metadata: ClassMetadata) -> &mut Self {
        tracing::debug!(
            model = metadata.model_name(),
            key = metadata.key(),
            "Registering class metadata"
        );
        self.class_metadata
            .retain(|existing| existing.model_name() != metadata.model_name());
        self.class_metadata.push(metadata);
        self
    }

    /// Build and add the metadata of entity type `T`.
    pub fn register<T: Entity>(&mut self) -> Result<&mut Self> {
        let metadata = T::class_metadata()?;
        Ok(self.add_class_metadata(metadata))
    }

    /// Builder-style method to register entity type `T`.
    pub fn with<T: Entity>(mut self) -> Result<Self> {
        self.register::<T>()?;
        Ok(self)
    }

    /// All registered metadata.
    pub fn class_metadata_list(&self) -> &[ClassMetadata] {
        &self.class_metadata
    }

    /// All mapped resource keys.
    pub fn mapping_keys(&self) -> Vec<&str> {
        self.class_metadata.iter().map(|m| m.key()).collect()
    }

    /// Get the model name mapped to a resource key.
    pub fn model_name(&self, key: &str) -> Result<&str> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        let metadata = self
            .class_metadata_by_key(key)
            .ok_or_else(|| Error::UnmappedKey(key.to_string()))?;
        if metadata.model_name().is_empty() {
            return Err(Error::EmptyModelName(key.to_string()));
        }
        Ok(metadata.model_name())
    }

    /// Get the resource key mapped to a model name.
    pub fn key_from_model(&self, model_name: &str) -> Result<&str> {
        if model_name.is_empty() {
            return Err(Error::EmptyModelName(model_name.to_string()));
        }
        let metadata = self.class_metadata(model_name)?;
        if metadata.key().is_empty() {
            return Err(Error::EmptyKey);
        }
        Ok(metadata.key())
    }

    /// Derive the resource key from an IRI.
    ///
    /// The id prefix is removed, then the second-to-last path segment is the
    /// key: `/sales/customers/3/orders/8` gives `orders`.
    pub fn key_from_id(&self, id: &str) -> Result<&str> {
        let path = self.strip_prefix(strip_authority(id));
        let mut segments = path.trim_end_matches('/').rsplit('/');

        let key = match (segments.next(), segments.next()) {
            (Some(last), Some(key)) if !last.is_empty() && !key.is_empty() => key,
            _ => return Err(Error::InvalidId(id.to_string())),
        };

        self.class_metadata_by_key(key)
            .map(|metadata| metadata.key())
            .ok_or_else(|| Error::UnmappedKey(key.to_string()))
    }

    /// Get the metadata of a model.
    pub fn class_metadata(&self, model_name: &str) -> Result<&ClassMetadata> {
        self.class_metadata
            .iter()
            .find(|m| m.model_name() == model_name)
            .ok_or_else(|| Error::UnmappedModel(model_name.to_string()))
    }

    /// Check if a model is mapped.
    pub fn has_class_metadata(&self, model_name: &str) -> bool {
        self.class_metadata
            .iter()
            .any(|m| m.model_name() == model_name)
    }

    /// Get the metadata mapped to a resource key, if any.
    pub fn class_metadata_by_key(&self, key: &str) -> Option<&ClassMetadata> {
        self.class_metadata.iter().find(|m| m.key() == key)
    }

    /// Get the metadata of the resource an IRI points to, if any.
    pub fn try_class_metadata_by_id(&self, id: &str) -> Option<&ClassMetadata> {
        let key = self.key_from_id(id).ok()?;
        self.class_metadata_by_key(key)
    }

    /// Members of a collection response, read at the configured collection key.
    pub fn collection_members<'a>(&self, body: &'a Json) -> &'a [Json] {
        body.as_object()
            .and_then(|object| lookup_path(object, &self.config.collection_key))
            .and_then(Json::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Build the IRI of a collection.
    pub fn collection_iri(&self, key: &str) -> String {
        format!("{}/{}", self.id_prefix, key)
    }

    /// Build the IRI of one resource from a bare identifier.
    ///
    /// Values already shaped like an IRI are returned unchanged.
    pub fn resource_iri(&self, key: &str, id: &str) -> String {
        if id.starts_with('/') || id.contains("://") {
            id.to_string()
        } else {
            format!("{}/{}/{}", self.id_prefix, key, id)
        }
    }

    /// Remove the first occurrence of the id prefix that ends on a segment
    /// boundary, so `/v1` is stripped from `/v1/orders/8` but not `/v10/orders/8`.
    fn strip_prefix<'a>(&self, id: &'a str) -> Cow<'a, str> {
        let prefix = self.id_prefix.as_str();
        if prefix.is_empty() {
            return Cow::Borrowed(id);
        }

        let found = id.match_indices(prefix).map(|(start, _)| start).find(|&start| {
            let rest = &id[start + prefix.len()..];
            prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/')
        });
        match found {
            Some(start) => Cow::Owned(format!("{}{}", &id[..start], &id[start + prefix.len()..])),
            None => Cow::Borrowed(id),
        }
    }
}

/// Drop the scheme and authority of an absolute URL.
fn strip_authority(id: &str) -> &str {
    match id.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => id,
    }
}
