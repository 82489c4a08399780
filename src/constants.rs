// Domain separation constants for hash function calls
pub const ENCRYPTION_PROOF_TAG: u8 = 0x00;
pub const MULT_PROOF_TAG: u8 = 0x01;
pub const DECRYPTION_PROOF_TAG: u8 = 0x02;
pub const RANGE_PROOF_TAG: u8 = 0x03;
pub const RANGE_PROOF_WC_TAG: u8 = 0x04;
pub const COMMIT_DIGEST_TAG: u8 = 0x05;
pub const PEDERSEN_DIGEST_TAG: u8 = 0x06;

#[cfg(test)]
pub const KEYGEN_SEED_TAG: u8 = 0x07;

/// Paillier moduli may not exceed 4096 bits.
pub const MODULUS_MAX_SIZE: usize = 4096;

/// The smallest prime size we are willing to generate.
/// Anything this small is only reachable from the `*_unsafe` keygen variants.
pub const PRIME_MIN_SIZE: usize = 64;

/// Bit length of the secp256k1 group order q.
pub const CURVE_ORDER_SIZE: usize = 256;

/// A signing group's Paillier modulus must satisfy `n > q^8` so that the
/// integers produced inside the protocol's ciphertexts never wrap around n.
pub const SIGNING_MODULUS_MIN_FACTOR: usize = 8;

/// Bit length of the Fiat-Shamir challenge (SHA-256 output).
pub const CHALLENGE_SIZE: usize = 256;
