//! Unit of work - clean snapshots and dirty field computation.
//!
//! Every entity deserialized with an identifier is stored here as a clone.
//! Before an update, the stored snapshot is re-serialized and compared with
//! the current serialization so that only changed fields are sent.
//!
//! # Diff rules
//!
//! 1. Keys missing from the old structure are always dirty
//! 2. Keys missing from the new structure are never emitted
//! 3. Equal values (numbers and numeric strings compare by value) are dropped
//! 4. Relation objects and lists are diffed recursively with the target
//!    metadata, and each nested diff carries the target's identifier
//! 5. A relation list whose length changed is sent whole, reduced to
//!    identifiers plus nested diffs
//! 6. Anything unmapped is compared as an opaque whole

use crate::{
    entity::downcast, error::Result, value::lookup_path, AnyEntity, ClassMetadata, Entity, Mapping,
};
use dashmap::DashMap;
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// Snapshot store and diff engine for one session.
///
/// Thread-safe and can be shared via `Arc`.
#[derive(Debug)]
pub struct UnitOfWork {
    mapping: Arc<Mapping>,
    /// Clean entities keyed by identifier
    snapshots: DashMap<String, Box<dyn AnyEntity>>,
}

impl UnitOfWork {
    /// Create an empty unit of work over a mapping.
    pub fn new(mapping: Arc<Mapping>) -> Self {
        Self {
            mapping,
            snapshots: DashMap::new(),
        }
    }

    /// Create a unit of work wrapped in Arc for sharing.
    pub fn new_shared(mapping: Arc<Mapping>) -> Arc<Self> {
        Arc::new(Self::new(mapping))
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Store a clone of an entity as its last known clean state.
    pub fn register_clean(&self, id: &str, entity: &dyn AnyEntity) {
        self.snapshots.insert(id.to_string(), entity.clone_entity());
        tracing::debug!(id = %id, model = entity.model_name(), "Registered clean snapshot");
    }

    /// Get a clone of the clean snapshot of an entity.
    pub fn get_dirty_entity(&self, id: &str) -> Option<Box<dyn AnyEntity>> {
        self.snapshots.get(id).map(|entry| entry.value().clone_entity())
    }

    /// Get the clean snapshot as a typed entity.
    pub fn get_dirty_entity_as<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        self.get_dirty_entity(id).map(downcast::<T>).transpose()
    }

    /// Forget the snapshot of an entity.
    pub fn clear(&self, id: &str) {
        if self.snapshots.remove(id).is_some() {
            tracing::debug!(id = %id, "Cleared snapshot");
        }
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Compute the fields of `new` that differ from `old`.
    pub fn get_dirty_data(
        &self,
        new: &Map<String, Json>,
        old: &Map<String, Json>,
        metadata: &ClassMetadata,
    ) -> Map<String, Json> {
        self.compare(new, old, Some(metadata))
    }

    fn compare(
        &self,
        new: &Map<String, Json>,
        old: &Map<String, Json>,
        metadata: Option<&ClassMetadata>,
    ) -> Map<String, Json> {
        let mut dirty = Map::new();

        for (key, value) in new {
            let Some(old_value) = old.get(key) else {
                dirty.insert(key.clone(), value.clone());
                continue;
            };
            if loosely_equal(value, old_value) {
                continue;
            }

            // Relations to unmapped models are opaque and sent whole.
            let target = metadata
                .and_then(|m| m.relation(key))
                .and_then(|r| self.mapping.class_metadata(&r.target_entity).ok());

            match (target, value) {
                (Some(target), Json::Object(new_object)) => {
                    let Some(old_object) = old_value.as_object() else {
                        dirty.insert(key.clone(), value.clone());
                        continue;
                    };
                    let diff = self.compare(new_object, old_object, Some(target));
                    if !diff.is_empty() {
                        let diff = with_identifier(diff, new_object, Some(target));
                        dirty.insert(key.clone(), Json::Object(diff));
                    }
                }
                (Some(target), Json::Array(new_list)) => {
                    let old_list = old_value.as_array().map(Vec::as_slice).unwrap_or(&[]);
                    if let Some(diff) = self.compare_list(new_list, old_list, target) {
                        dirty.insert(key.clone(), Json::Array(diff));
                    }
                }
                _ => {
                    dirty.insert(key.clone(), value.clone());
                }
            }
        }

        dirty
    }

    /// Diff a relation list. `None` means nothing to send.
    ///
    /// Items are compared by position. When the membership changed (different
    /// length, or another identity at some position) the whole list is sent.
    fn compare_list(
        &self,
        new: &[Json],
        old: &[Json],
        target: &ClassMetadata,
    ) -> Option<Vec<Json>> {
        let id_key = target.identifier_key();
        let membership_changed = new.len() != old.len()
            || new
                .iter()
                .zip(old)
                .any(|(n, o)| identity(n, id_key) != identity(o, id_key));

        if membership_changed {
            return Some(self.resend_list(new, old, target));
        }

        let mut out = Vec::new();
        for (item, previous) in new.iter().zip(old) {
            match (item, previous) {
                // Links carry membership; they are always sent.
                (Json::String(_), _) => out.push(item.clone()),
                (Json::Object(new_object), Json::Object(old_object)) => {
                    let diff = self.compare(new_object, old_object, Some(target));
                    if !diff.is_empty() {
                        out.push(Json::Object(with_identifier(diff, new_object, Some(target))));
                    }
                }
                _ if !loosely_equal(item, previous) => out.push(item.clone()),
                _ => {}
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// The complete new list: links, identifier stubs merged with their
    /// nested diff, and new items in full.
    fn resend_list(&self, new: &[Json], old: &[Json], target: &ClassMetadata) -> Vec<Json> {
        let id_key = target.identifier_key();

        new.iter()
            .map(|item| {
                let Json::Object(new_object) = item else {
                    return item.clone();
                };
                let Some(mut stub) = identifier_stub(new_object, id_key) else {
                    return item.clone();
                };

                let empty = Map::new();
                let old_object = old
                    .iter()
                    .find(|candidate| identity(candidate, id_key) == identity(item, id_key))
                    .and_then(Json::as_object)
                    .unwrap_or(&empty);
                let diff = self.compare(new_object, old_object, Some(target));
                stub.extend(diff);
                Json::Object(stub)
            })
            .collect()
    }
}

/// What makes a list item the same member: its link, or its identifier.
fn identity<'a>(item: &'a Json, id_key: Option<&str>) -> Option<&'a Json> {
    match item {
        Json::String(_) => Some(item),
        Json::Object(object) => id_key.and_then(|key| lookup_path(object, key)),
        _ => None,
    }
}

/// The identifier of an object item, alone in a map.
fn identifier_stub(
    object: &Map<String, Json>,
    id_key: Option<&str>,
) -> Option<Map<String, Json>> {
    let key = id_key?;
    let id = lookup_path(object, key)?;
    let mut stub = Map::new();
    stub.insert(key.to_string(), id.clone());
    Some(stub)
}

/// Put the target identifier in front of a nested diff.
fn with_identifier(
    diff: Map<String, Json>,
    new_object: &Map<String, Json>,
    target: Option<&ClassMetadata>,
) -> Map<String, Json> {
    let Some(id_key) = target.and_then(ClassMetadata::identifier_key) else {
        return diff;
    };
    let Some(id) = lookup_path(new_object, id_key) else {
        return diff;
    };

    let mut out = Map::new();
    out.insert(id_key.to_string(), id.clone());
    out.extend(diff.into_iter().filter(|(key, _)| key != id_key));
    out
}

/// Structural equality where numbers and numeric strings compare by value.
fn loosely_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Json::Number(n), Json::String(s)) | (Json::String(s), Json::Number(n)) => {
            number_matches(n, s.trim())
        }
        (Json::Array(x), Json::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| loosely_equal(x, y))
        }
        (Json::Object(x), Json::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, x)| y.get(key).is_some_and(|y| loosely_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly; floats only when either side is one.
fn number_matches(n: &serde_json::Number, s: &str) -> bool {
    if let (Some(n), Ok(s)) = (n.as_i64(), s.parse::<i64>()) {
        return n == s;
    }
    if let (Some(n), Ok(s)) = (n.as_u64(), s.parse::<u64>()) {
        return n == s;
    }
    if n.is_f64() || s.parse::<i128>().is_err() {
        return s.parse::<f64>().ok() == n.as_f64();
    }
    false
}
