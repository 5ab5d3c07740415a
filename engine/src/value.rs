//! Values exchanged between entities and the serializer.
//!
//! Accessors registered in [`ClassMetadata`](crate::ClassMetadata) read and
//! write [`Value`]s. The [`ToValue`] and [`FromValue`] traits convert the
//! field types entities usually hold.

use crate::{entity::downcast, error::Result, AnyEntity, Entity, Error, Reference};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use phonenumber::{Mode, PhoneNumber};
use serde_json::{Map, Value as Json};

/// A domain-side value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// Scalars, plain arrays and opaque JSON, passed through as-is
    Json(Json),
    DateTime(DateTime<FixedOffset>),
    PhoneNumber(PhoneNumber),
    /// A related entity held in memory
    Entity(Box<dyn AnyEntity>),
    /// An unresolved link to a related resource
    Link(String),
    List(Vec<Value>),
}

impl Value {
    /// Whether the value carries nothing (null, or an empty string).
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null | Value::Json(Json::Null) => true,
            Value::Json(Json::String(s)) | Value::Link(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Render as an identifier string, if the value looks like one.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            Value::Json(Json::String(s)) | Value::Link(s) if !s.is_empty() => Some(s.clone()),
            Value::Json(Json::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Json(json) => json_kind(json),
            Value::DateTime(_) => "datetime",
            Value::PhoneNumber(_) => "phone number",
            Value::Entity(_) => "entity",
            Value::Link(_) => "link",
            Value::List(_) => "list",
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            other => Value::Json(other),
        }
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "float",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        got: value.kind().to_string(),
    }
}

/// Format a datetime the way it goes on the wire.
pub fn format_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse a wire datetime. Naive timestamps are read as UTC.
pub fn parse_datetime(raw: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime);
    }
    if let Ok(datetime) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(datetime);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| format!("'{}' is not a datetime: {}", raw, e))
}

/// Format a phone number in international form.
pub fn format_phone_number(number: &PhoneNumber) -> String {
    number.format().mode(Mode::International).to_string()
}

/// Parse a phone number given in international form.
pub fn parse_phone_number(raw: &str) -> std::result::Result<PhoneNumber, String> {
    phonenumber::parse(None, raw).map_err(|e| format!("'{}' is not a phone number: {}", raw, e))
}

/// Look a dot-notation path up in a wire object.
///
/// A key containing dots is first tried literally, so `_links.self.href`
/// matches either a flat key or the nested `_links` → `self` → `href`.
pub fn lookup_path<'a>(object: &'a Map<String, Json>, path: &str) -> Option<&'a Json> {
    if let Some(value) = object.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Conversion from a field into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion from a [`Value`] into a field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Json(Json::String(self.clone()))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Json::String(s)) | Value::Link(s) => Ok(s),
            Value::Json(Json::Number(n)) => Ok(n.to_string()),
            Value::DateTime(datetime) => Ok(format_datetime(&datetime)),
            Value::PhoneNumber(number) => Ok(format_phone_number(&number)),
            other => Err(mismatch("string", &other)),
        }
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {$(
        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::Json(Json::from(*self))
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                let parsed = match &value {
                    Value::Json(Json::Number(n)) => n
                        .as_i64()
                        .and_then(|n| <$ty>::try_from(n).ok())
                        .or_else(|| n.as_u64().and_then(|n| <$ty>::try_from(n).ok())),
                    Value::Json(Json::String(s)) => s.trim().parse::<$ty>().ok(),
                    _ => None,
                };
                parsed.ok_or_else(|| mismatch("integer", &value))
            }
        }
    )*};
}

integer_value!(i32, i64, u32, u64);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        serde_json::Number::from_f64(*self)
            .map(|n| Value::Json(Json::Number(n)))
            .unwrap_or(Value::Null)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        let parsed = match &value {
            Value::Json(Json::Number(n)) => n.as_f64(),
            Value::Json(Json::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| mismatch("float", &value))
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Json(Json::Bool(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Json::Bool(b)) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl ToValue for Json {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl FromValue for Json {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Json(json) => Ok(json),
            Value::Link(s) => Ok(Json::String(s)),
            Value::DateTime(datetime) => Ok(Json::String(format_datetime(&datetime))),
            Value::PhoneNumber(number) => Ok(Json::String(format_phone_number(&number))),
            Value::List(items) => items
                .into_iter()
                .map(Json::from_value)
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            other @ Value::Entity(_) => Err(mismatch("json", &other)),
        }
    }
}

impl ToValue for DateTime<FixedOffset> {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(datetime) => Ok(datetime),
            Value::Json(Json::String(raw)) => parse_datetime(&raw).map_err(|got| {
                Error::TypeMismatch {
                    expected: "datetime".into(),
                    got,
                }
            }),
            other => Err(mismatch("datetime", &other)),
        }
    }
}

impl ToValue for PhoneNumber {
    fn to_value(&self) -> Value {
        Value::PhoneNumber(self.clone())
    }
}

impl FromValue for PhoneNumber {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::PhoneNumber(number) => Ok(number),
            Value::Json(Json::String(raw)) => {
                parse_phone_number(&raw).map_err(|got| Error::TypeMismatch {
                    expected: "phone number".into(),
                    got,
                })
            }
            other => Err(mismatch("phone number", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        if matches!(value, Value::Null | Value::Json(Json::Null)) {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null | Value::Json(Json::Null) => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Json(Json::Array(items)) => items
                .into_iter()
                .map(|item| T::from_value(Value::from(item)))
                .collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: Entity> ToValue for Reference<T> {
    fn to_value(&self) -> Value {
        match self {
            Reference::Resolved(entity) => Value::Entity(Box::new(entity.clone())),
            Reference::Unresolved(iri) => Value::Link(iri.clone()),
        }
    }
}

impl<T: Entity> FromValue for Reference<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Entity(entity) => downcast::<T>(entity).map(Reference::Resolved),
            Value::Link(iri) | Value::Json(Json::String(iri)) => Ok(Reference::Unresolved(iri)),
            other => Err(mismatch(T::MODEL_NAME, &other)),
        }
    }
}
