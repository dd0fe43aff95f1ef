use crate::error::CodecError;
use crate::types::SessionData;

/// Converts session content to bytes and back.
///
/// Used by the cookie pipeline before signing and by store-backed sessions
/// before handing bytes to the storage engine.
pub trait Codec: Send + Sync {
    fn encode(&self, data: &SessionData) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<SessionData, CodecError>;
}

/// UTF-8 JSON object encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, data: &SessionData) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(data).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<SessionData, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}
