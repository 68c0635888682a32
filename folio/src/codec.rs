//! Value encoding.
//!
//! A collection never looks inside the values it stores. It hands them to a
//! [`ValueCodec`] to obtain an opaque byte blob, and the blob's length is
//! the value size the page budgeter works from. Reading a value back is the
//! caller's job, through the same codec (see
//! [`DataPoint::decode`](crate::model::DataPoint::decode)).

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Encodes and decodes the values stored in a collection.
pub trait ValueCodec: Send + Sync {
    /// The caller-facing value type.
    type Value;

    /// Serializes `value` into the blob that is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the value cannot be serialized.
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a blob produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;

}

/// Stores byte vectors unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// Stores any serde type as compact JSON.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Creates a JSON codec for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
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

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> ValueCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
