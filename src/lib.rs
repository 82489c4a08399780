//! Threshold ECDSA signatures over secp256k1, built from a threshold Paillier
//! cryptosystem and a two-level homomorphic encryption layer.
//!
//! A trusted dealer (see [keygen]) splits a Paillier decryption key across `l`
//! parties so that any `w` of them can decrypt, and hands every party an
//! encryption of the ECDSA signing key. Signing parties then run a four-round
//! broadcast protocol (see [sign]) that outputs a standard ECDSA signature
//! without any party ever learning the signing key. A six-round variant using
//! only plain Paillier is also provided.

pub mod collections;
mod constants;
pub mod crypto_tools;
pub mod keygen;
pub mod sdk;
pub mod sign;
