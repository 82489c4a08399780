use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use super::api::{BytesVec, CryptoError, CryptoResult};

const SERIALIZATION_VERSION: u16 = 0;

pub fn serialize<T: ?Sized>(value: &T) -> CryptoResult<BytesVec>
where
    T: Serialize,
{
    match bincode::serialize(value) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            error!("serialization failure: {}", err.to_string());
            Err(CryptoError::EncodingOverflow)
        }
    }
}

/// deserialization failures are non-fatal: do not return `CryptoResult`
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    bincode::deserialize(bytes)
        .map_err(|err| {
            warn!("deserialization failure: {}", err.to_string());
        })
        .ok()
}

/// Wrap a round payload in a versioned envelope before it goes on the wire.
pub fn encode<T: Serialize>(payload: &T) -> CryptoResult<BytesVec> {
    serialize(&BytesVecVersioned {
        version: SERIALIZATION_VERSION,
        payload: serialize(payload)?,
    })
}

/// Peel the versioned envelope. Failures are non-fatal.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    let bytes_versioned: BytesVecVersioned = deserialize(bytes)?;
    if bytes_versioned.version != SERIALIZATION_VERSION {
        warn!(
            "encoding version {}, expected {}",
            bytes_versioned.version, SERIALIZATION_VERSION
        );
        return None;
    }
    deserialize(&bytes_versioned.payload)
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BytesVecVersioned {
    version: u16,
    payload: BytesVec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trip() {
        let payload = vec![1u8, 2, 3, 4];
        let encoded = encode(&payload).unwrap();
        let decoded: Vec<u8> = decode(&encoded).unwrap();
        assert_eq!(payload, decoded);

        // truncated envelopes must not decode
        assert!(decode::<Vec<u8>>(&encoded[..encoded.len() - 1]).is_none());
    }
}
