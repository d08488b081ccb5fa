//! Mapping between entities and their JSON wire form.
//!
//! `EntityCodec` is the seam each `Resource` is parametrized over. The only
//! implementation in this crate is `JsonCodec<T>`, which leans on the serde
//! derives in `types`: missing fields take the entity's defaults, and absent
//! optionals are skipped on encode.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Bidirectional mapping between one entity type and its wire body.
pub trait EntityCodec: Send + Sync {
    type Entity;

    fn encode(&self, entity: &Self::Entity) -> Result<String, CodecError>;

    /// Decode a single entity. An empty body is an error.
    fn decode(&self, body: &str) -> Result<Self::Entity, CodecError>;

    /// Decode a collection. An empty body is an empty collection.
    fn decode_list(&self, body: &str) -> Result<Vec<Self::Entity>, CodecError>;
}

/// JSON codec for any serde-enabled entity.
pub struct JsonCodec<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize + DeserializeOwned> EntityCodec for JsonCodec<T> {
    type Entity = T;

    fn encode(&self, entity: &T) -> Result<String, CodecError> {
        encode_payload(entity)
    }

    fn decode(&self, body: &str) -> Result<T, CodecError> {
        if body.trim().is_empty() {
            return Err(CodecError::EmptyBody);
        }
        Ok(serde_json::from_str(body)?)
    }

    fn decode_list(&self, body: &str) -> Result<Vec<T>, CodecError> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(body)?)
    }
}

/// Serialize any request payload (entity, patch, credentials).
pub fn encode_payload<P: Serialize + ?Sized>(payload: &P) -> Result<String, CodecError> {
    Ok(serde_json::to_string(payload)?)
}

/// Render a JSON body with sorted keys and indentation so logged payloads
/// diff cleanly across runs. Non-JSON text is returned unchanged.
pub fn render_canonical(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        // serde_json::Map is a BTreeMap without `preserve_order`.
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Same as `render_canonical`, starting from a serializable value.
pub fn render_value<P: Serialize + ?Sized>(payload: &P) -> Result<String, CodecError> {
    let value = serde_json::to_value(payload)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
