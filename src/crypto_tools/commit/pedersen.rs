//! Plain Pedersen commitments over the order-q subgroup of `Z*_p` for a safe
//! prime `p = 2q + 1`. A drop-in for the multi-trapdoor scheme wherever
//! non-malleability is not required.
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use unknown_order::BigNumber;

use crate::constants;
use crate::crypto_tools::integer::{random_mod, random_mod_star, safe_prime_pair};
use crate::crypto_tools::paillier::utils::member_of_mul_group;
use crate::sdk::api::CryptoResult;

/// `(p, q, g, h)` with `g`, `h` generators of the order-q subgroup and
/// `h = g^x` for a discarded `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedersenParams {
    p: BigNumber,
    q: BigNumber,
    g: BigNumber,
    h: BigNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedersenCommitment {
    c: BigNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedersenOpening {
    r: BigNumber,
}

impl PedersenParams {
    pub fn new(rng: &mut (impl CryptoRng + RngCore), prime_bits: usize) -> CryptoResult<Self> {
        crate::crypto_tools::paillier::validate_prime_bits(prime_bits)?;
        let (p, q) = safe_prime_pair(rng, prime_bits);

        // squares generate the order-q subgroup
        let r = random_mod_star(rng, &p);
        let g = r.modmul(&r, &p);
        let x = random_mod(rng, &q);
        let h = g.modpow(&x, &p);

        Ok(Self { p, q, g, h })
    }

    pub fn commit(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        payload: &[u8],
    ) -> (PedersenCommitment, PedersenOpening) {
        let d = self.hash_to_exponent(payload);
        let r = random_mod(rng, &self.q);

        // c = g^d h^r mod p
        let c = self
            .g
            .modpow(&d, &self.p)
            .modmul(&self.h.modpow(&r, &self.p), &self.p);

        (PedersenCommitment { c }, PedersenOpening { r })
    }

    pub fn verify(
        &self,
        com: &PedersenCommitment,
        payload: &[u8],
        opening: &PedersenOpening,
    ) -> bool {
        if !member_of_mul_group(&com.c, &self.p) {
            warn!("pedersen commitment: c not in Z*_p");
            return false;
        }
        if opening.r < BigNumber::zero() || opening.r >= self.q {
            warn!("pedersen commitment: r not in Z_q");
            return false;
        }

        let d = self.hash_to_exponent(payload);
        let expected = self
            .g
            .modpow(&d, &self.p)
            .modmul(&self.h.modpow(&opening.r, &self.p), &self.p);

        if expected != com.c {
            warn!("pedersen commitment: reopen check failed");
            return false;
        }

        true
    }

    fn hash_to_exponent(&self, payload: &[u8]) -> BigNumber {
        let digest = Sha256::new()
            .chain_update(constants::PEDERSEN_DIGEST_TAG.to_be_bytes())
            .chain_update(payload)
            .finalize();
        &BigNumber::from_slice(digest) % &self.q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn commit_verify() {
        let mut rng = rand::thread_rng();
        let params = PedersenParams::new(&mut rng, 256).unwrap();

        let payload = b"a pedersen payload";
        let (com, opening) = params.commit(&mut rng, payload);
        assert!(params.verify(&com, payload, &opening));

        // mutated payload
        assert!(!params.verify(&com, b"b pedersen payload", &opening));

        // mutated randomness
        let bad_opening = PedersenOpening {
            r: &opening.r + 1,
        };
        assert!(!params.verify(&com, payload, &bad_opening));
    }
}
