use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::sdk::api::{CryptoError, CryptoResult};

const MAX_DIGEST_LEN: usize = 512;

/// The message digest to be signed, as handed to us by the caller.
/// Any byte length up to [MAX_DIGEST_LEN] is accepted; the protocol
/// interprets the bytes as a big-endian nonnegative integer and truncates it
/// to the bit length of the curve order (see the `From` impl in [k256_serde]).
///
/// [k256_serde]: super::k256_serde
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDigest(Vec<u8>);

impl TryFrom<&[u8]> for MessageDigest {
    type Error = CryptoError;
    fn try_from(v: &[u8]) -> CryptoResult<Self> {
        if v.len() > MAX_DIGEST_LEN {
            return Err(CryptoError::DomainViolation("message digest too long"));
        }
        Ok(Self(v.to_vec()))
    }
}

impl AsRef<[u8]> for MessageDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
