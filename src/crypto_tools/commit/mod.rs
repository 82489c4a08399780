//! Non-malleable multi-trapdoor commitments in a pairing group.
//! A commitment binds its payload to a freshly sampled public tag `e`:
//! `a = g^d (h g^e)^r` with `d = H(payload)`. Verification checks
//! `pairing(g^r, h g^e) = pairing(a g^{-d}, g)`, which holds in the
//! asymmetric setting because the dealer publishes `g` and `h` in both
//! source groups. A plain Pedersen variant is in [pedersen] for uses that
//! do not need non-malleability.
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Group;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::constants;

pub mod bls12_serde;
pub mod pedersen;

/// Public commitment parameters `(g, h = g^x)` in both source groups.
/// The trapdoor `x` is discarded after dealing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterKey {
    g1: bls12_serde::G1Point,
    h1: bls12_serde::G1Point,
    g2: bls12_serde::G2Point,
    h2: bls12_serde::G2Point,
}

/// `(e, a)`: the fresh tag and the committed group element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    e: bls12_serde::Scalar,
    a: bls12_serde::G1Point,
}

/// The decommitment randomness; the payload itself travels alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    r: bls12_serde::Scalar,
}

impl MasterKey {
    pub fn new(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let x = random_nonzero(rng);
        let g1 = G1Projective::generator();
        let g2 = G2Projective::generator();
        Self {
            g1: g1.into(),
            h1: (g1 * x).into(),
            g2: g2.into(),
            h2: (g2 * x).into(),
        }
    }

    /// Commit to an opaque payload. Returns the commitment to broadcast now
    /// and the opening to broadcast later.
    pub fn commit(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        payload: &[u8],
    ) -> (Commitment, Opening) {
        let d = hash_to_scalar(payload);
        let e = random_nonzero(rng);
        let r = random_nonzero(rng);

        // a = g^d (h g^e)^r
        let a = self.g1.as_ref() * d + (self.h1.as_ref() + self.g1.as_ref() * e) * r;

        (
            Commitment {
                e: e.into(),
                a: a.into(),
            },
            Opening { r: r.into() },
        )
    }

    /// Check an opening against a commitment and the revealed payload:
    /// `pairing(a g^{-d}, g₂) ?= pairing(g^r, h₂ g₂^e)`.
    pub fn verify(&self, com: &Commitment, payload: &[u8], opening: &Opening) -> bool {
        let e = *com.e.as_ref();
        let r = *opening.r.as_ref();

        if bool::from(e.is_zero()) || bool::from(r.is_zero()) {
            warn!("commitment: zero tag or randomness");
            return false;
        }

        let d = hash_to_scalar(payload);

        let lhs = pairing(
            &G1Affine::from(com.a.as_ref() - self.g1.as_ref() * d),
            &G2Affine::from(self.g2.as_ref()),
        );
        let rhs = pairing(
            &G1Affine::from(self.g1.as_ref() * r),
            &G2Affine::from(self.h2.as_ref() + self.g2.as_ref() * e),
        );

        if lhs != rhs {
            warn!("commitment: pairing check failed");
            return false;
        }

        true
    }
}

fn hash_to_scalar(payload: &[u8]) -> Scalar {
    let digest = Sha256::new()
        .chain_update(constants::COMMIT_DIGEST_TAG.to_be_bytes())
        .chain_update(payload)
        .finalize();
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&digest);
    Scalar::from_bytes_wide(&wide)
}

fn random_nonzero(rng: &mut (impl CryptoRng + RngCore)) -> Scalar {
    loop {
        let s = Scalar::random(&mut *rng);
        if !bool::from(s.is_zero()) {
            return s;
        }
    }
}

#[cfg(any(test, feature = "malicious"))]
pub mod malicious {
    use super::*;

    impl Commitment {
        pub fn corrupt(&mut self) {
            self.a = (self.a.as_ref() + G1Projective::generator()).into();
        }
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
        let mk = MasterKey::new(&mut rng);

        let payload = b"four freshly sampled secrets";
        let (com, opening) = mk.commit(&mut rng, payload);
        assert!(mk.verify(&com, payload, &opening));

        // a mutated payload does not open the commitment
        assert!(!mk.verify(&com, b"four freshly sampled secretz", &opening));

        // a mutated commitment does not verify
        let mut bad_com = com.clone();
        bad_com.corrupt();
        assert!(!mk.verify(&bad_com, payload, &opening));

        // an opening for one commitment does not open another
        let (com2, opening2) = mk.commit(&mut rng, payload);
        assert!(!mk.verify(&com, payload, &opening2));
        assert!(mk.verify(&com2, payload, &opening2));

        // commitments to the same payload are distinct (fresh e, r)
        assert_ne!(com, com2);
    }
}
