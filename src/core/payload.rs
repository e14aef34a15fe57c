use crate::error::Result;
use crate::utils::serialize;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Opaque transaction body carried inside a block.
///
/// The value is held as its JSON text, fixed at construction. Every node
/// encodes, hashes and signs that exact text, so a payload never changes
/// bytes on its way across the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, bincode::Encode)]
pub struct Payload(String);

impl Payload {
    /// Build a payload from any serializable value. Object keys come out sorted.
    pub fn new<T: Serialize>(value: &T) -> Result<Payload> {
        let value = serde_json::to_value(value)?;
        Ok(Payload(value.to_string()))
    }

    pub fn as_json(&self) -> &str {
        self.0.as_str()
    }

    pub fn value(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.0)?)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.0)?)
    }

    /// The bytes a signature over this payload covers
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload(value.to_string())
    }
}

// Text arriving from disk or a peer must still be JSON
impl<Context> bincode::Decode<Context> for Payload {
    fn decode<D: Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let text: String = bincode::Decode::decode(decoder)?;
        if let Err(e) = serde_json::from_str::<Value>(&text) {
            return Err(DecodeError::OtherString(format!("payload is not JSON: {e}")));
        }
        Ok(Payload(text))
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for Payload {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        bincode::Decode::decode(decoder)
    }
}

// Human-readable forms (CLI output, key files) show the JSON value itself
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let value: Value = serde_json::from_str(&self.0).map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Payload::from)
    }
}
