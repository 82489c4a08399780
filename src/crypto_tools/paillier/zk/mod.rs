//! Zero-knowledge proofs over Paillier ciphertexts: proofs of correct
//! encryption, multiplication, and partial decryption, plus the
//! range/relation proofs used by the signing protocol.
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;
use zeroize::Zeroize;

use crate::crypto_tools::integer::{probable_prime, random_mod, random_mod_star, safe_prime_pair};
use crate::sdk::api::{CryptoError, CryptoResult};

use super::{validate_prime_bits, Plaintext, Randomness};

pub mod decryption;
pub mod encryption;
pub mod mult;
pub mod range;

/// Every `verify` in this module returns `bool` so that domain failures
/// inside verification never escape as errors. Callers that instead want to
/// propagate with `?` lift the result here; whether a [ProofFailure] is a
/// retry or an abort is their decision.
///
/// [ProofFailure]: CryptoError::ProofFailure
pub fn require(verified: bool) -> CryptoResult<()> {
    if verified {
        Ok(())
    } else {
        Err(CryptoError::ProofFailure)
    }
}

/// Auxiliary public parameters for the range proofs: a second RSA modulus
/// `ñ` (a product of two safe primes, unrelated to any encryption key) and
/// `h₁, h₂ ∈ Z*_ñ` with `h₁ = h₂^x mod ñ` for a secret `x` known to nobody
/// after dealing. Commitments `h₁^m h₂^r mod ñ` are statistically hiding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
pub struct ZkSetup {
    n_tilde: BigNumber,
    h1: BigNumber,
    h2: BigNumber,
}

impl ZkSetup {
    pub fn new(rng: &mut (impl CryptoRng + RngCore), prime_bits: usize) -> CryptoResult<ZkSetup> {
        validate_prime_bits(prime_bits)?;
        let (p, p_prime) = safe_prime_pair(rng, prime_bits);
        let (q, q_prime) = loop {
            let (q, q_prime) = safe_prime_pair(rng, prime_bits);
            if q != p {
                break (q, q_prime);
            }
        };
        Ok(Self::from_parts(rng, &p * &q, &p_prime * &q_prime))
    }

    /// unsafe because the modulus does not use safe primes
    pub fn new_unsafe(
        rng: &mut (impl CryptoRng + RngCore),
        prime_bits: usize,
    ) -> CryptoResult<ZkSetup> {
        validate_prime_bits(prime_bits)?;
        let p = probable_prime(rng, prime_bits);
        let q = loop {
            let q = probable_prime(rng, prime_bits);
            if q != p {
                break q;
            }
        };
        let p1: BigNumber = &p - 1;
        let q1: BigNumber = &q - 1;
        let lambda = &(&p1 * &q1) / &p1.gcd(&q1);
        Ok(Self::from_parts(rng, &p * &q, lambda >> 1))
    }

    fn from_parts(rng: &mut (impl CryptoRng + RngCore), n_tilde: BigNumber, m: BigNumber) -> Self {
        // h2 is a random square, h1 lives in the subgroup h2 generates
        let r = random_mod_star(rng, &n_tilde);
        let h2 = r.modmul(&r, &n_tilde);
        let x = random_mod(rng, &m);
        let h1 = h2.modpow(&x, &n_tilde);

        Self { n_tilde, h1, h2 }
    }

    fn h1(&self) -> &BigNumber {
        &self.h1
    }

    fn h2(&self) -> &BigNumber {
        &self.h2
    }

    pub(crate) fn n_tilde(&self) -> &BigNumber {
        &self.n_tilde
    }

    /// Compute the FO commitment, `h1^msg h2^r mod N~`
    fn commit(&self, msg: &Plaintext, randomness: &Randomness) -> BigNumber {
        let h1_x = self.h1().modpow(&msg.0, self.n_tilde());
        let h2_r = self.h2().modpow(&randomness.0, self.n_tilde());

        h1_x.modmul(&h2_r, self.n_tilde())
    }
}
