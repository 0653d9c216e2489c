// ABOUTME: Codecs converting typed keys, elements, and values to and from their wire bytes.
// ABOUTME: String and byte codecs pass data through; JsonCodec stores any serde type.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use atomix_grpc::{Error, ErrorKind, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts `E` to and from the bytes stored by the server.
///
/// Encoding failures are `Invalid`; decoding failures mean the stored data is
/// not an `E` and are `Internal`.
pub trait Codec<E>: Send + Sync + 'static {
    fn encode(&self, value: &E) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<E>;
}

/// UTF-8 strings, stored as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::new(ErrorKind::Internal, format!("stored value is not UTF-8: {}", e)))
    }
}

/// Raw bytes, stored as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Any serde type, stored as JSON.
pub struct JsonCodec<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> JsonCodec<E> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for JsonCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for JsonCodec<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> Copy for JsonCodec<E> {}

impl<E> fmt::Debug for JsonCodec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<E>())
    }
}

impl<E> Codec<E> for JsonCodec<E>
where
    E: Serialize + DeserializeOwned + 'static,
{
    fn encode(&self, value: &E) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| Error::new(ErrorKind::Invalid, format!("JSON encode failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<E> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::new(ErrorKind::Internal, format!("JSON decode failed: {}", e)))
    }
}

/// Encode for a wire field declared as a protobuf `string`.
pub(crate) fn encode_string<E: 'static>(codec: &dyn Codec<E>, value: &E) -> Result<String> {
    String::from_utf8(codec.encode(value)?).map_err(|_| {
        Error::invalid("codec produced non-UTF-8 bytes for a string field")
    })
}

pub(crate) fn decode_string<E: 'static>(codec: &dyn Codec<E>, value: &str) -> Result<E> {
    codec.decode(value.as_bytes())
}

/// Decode a streamed item, logging and dropping it when it does not decode.
pub(crate) fn decode_or_skip<E: 'static>(
    codec: &dyn Codec<E>,
    bytes: &[u8],
    stream: &'static str,
) -> Option<E> {
    skip_undecodable(codec.decode(bytes), stream)
}

pub(crate) fn skip_undecodable<E>(decoded: Result<E>, stream: &'static str) -> Option<E> {
    match decoded {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(stream, error = %err, "skipping undecodable item");
            None
        }
    }
}

/// Key and value codecs of one keyed primitive. Keys travel as protobuf strings.
pub(crate) struct KeyValueCodec<K, V> {
    keys: Arc<dyn Codec<K>>,
    values: Arc<dyn Codec<V>>,
}

impl<K, V> Clone for KeyValueCodec<K, V> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            values: self.values.clone(),
        }
    }
}

impl<K: 'static, V: 'static> KeyValueCodec<K, V> {
    pub fn new(keys: impl Codec<K>, values: impl Codec<V>) -> Self {
        Self {
            keys: Arc::new(keys),
            values: Arc::new(values),
        }
    }

    pub fn encode_key(&self, key: &K) -> Result<String> {
        encode_string(self.keys.as_ref(), key)
    }

    pub fn decode_key(&self, key: &str) -> Result<K> {
        decode_string(self.keys.as_ref(), key)
    }

    pub fn encode_value(&self, value: &V) -> Result<Vec<u8>> {
        self.values.encode(value)
    }

    pub fn decode_value(&self, bytes: &[u8]) -> Result<V> {
        self.values.decode(bytes)
    }
}
