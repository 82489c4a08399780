use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use unknown_order::BigNumber;

use crate::{
    constants,
    crypto_tools::paillier::{
        threshold::{KeyShare, PartialDecryption, ThresholdPublicKey},
        utils::{member_of_mod, member_of_mul_group},
        Ciphertext, Randomness,
    },
};

/// Statement: the partial decryption is `c^{2Δs_i}` for the same `s_i` that
/// produced the public verification key `v_i = v^{Δs_i}`, i.e. equality of
/// discrete logs of `c_i²` base `c^{4Δ}` and of `v_i` base `v`.
#[derive(Clone, Debug)]
pub struct Statement<'a> {
    pub ciphertext: &'a Ciphertext,
    pub partial: &'a PartialDecryption,
    pub pubkey: &'a ThresholdPublicKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    a: BigNumber,
    b: BigNumber,
    z: BigNumber,
}

/// Bit size of the masking randomness: `3k + t` where `k = bitlen(n)` and
/// `t` is the hash output length.
fn mask_size(pubkey: &ThresholdPublicKey) -> usize {
    3 * pubkey.ek().bit_length() + constants::CHALLENGE_SIZE
}

fn compute_challenge(
    stmt: &Statement,
    base: &BigNumber,
    target: &BigNumber,
    a: &BigNumber,
    b: &BigNumber,
) -> BigNumber {
    BigNumber::from_slice(
        Sha256::new()
            .chain_update(constants::DECRYPTION_PROOF_TAG.to_be_bytes())
            .chain_update((stmt.partial.id() as u64).to_be_bytes())
            .chain_update(stmt.pubkey.ek().n().to_bytes())
            .chain_update(base.to_bytes())
            .chain_update(target.to_bytes())
            .chain_update(stmt.pubkey.v().to_bytes())
            .chain_update(a.to_bytes())
            .chain_update(b.to_bytes())
            .finalize(),
    )
}

impl Statement<'_> {
    /// `base = c^{4Δ} mod n²`, the common-exponent base on the ciphertext side
    fn base(&self) -> BigNumber {
        let exp = self.pubkey.delta().clone() << 2;
        self.ciphertext.0.modpow(&exp, self.pubkey.ek().nn())
    }

    /// `target = c_i² mod n²`
    fn target(&self) -> BigNumber {
        self.partial
            .share()
            .modmul(self.partial.share(), self.pubkey.ek().nn())
    }

    pub fn prove(&self, rng: &mut (impl CryptoRng + RngCore), key_share: &KeyShare) -> Proof {
        debug_assert_eq!(key_share.id(), self.partial.id());

        let nn = self.pubkey.ek().nn();
        let base = self.base();
        let target = self.target();

        let r =
            Randomness::generate_with_rng(rng, &(BigNumber::one() << mask_size(self.pubkey)));

        let a = base.modpow(&r.0, nn);
        let b = self.pubkey.v().modpow(&r.0, nn);

        let e = compute_challenge(self, &base, &target, &a, &b);

        // z = r + e Δ s_i, over the integers
        let z = &r.0 + &e * &(self.pubkey.delta() * key_share.s_i());

        Proof { a, b, z }
    }

    pub fn verify(&self, proof: &Proof) -> bool {
        let nn = self.pubkey.ek().nn();

        let v_i = match self.pubkey.verification_key(self.partial.id()) {
            Ok(v_i) => v_i,
            Err(_) => {
                warn!(
                    "decryption proof: no verification key for id {}",
                    self.partial.id()
                );
                return false;
            }
        };

        if !member_of_mod(self.partial.share(), nn) {
            warn!("decryption proof: partial decryption not in [0, N^2)");
            return false;
        }
        if !member_of_mul_group(&proof.a, nn) || !member_of_mul_group(&proof.b, nn) {
            warn!("decryption proof: commitment not in Z*_N^2");
            return false;
        }
        // z = r + e Δ s_i stays within the mask plus one carry bit
        if proof.z < BigNumber::zero() || proof.z.bit_length() > mask_size(self.pubkey) + 1 {
            warn!("decryption proof: z out of range");
            return false;
        }

        let base = self.base();
        let target = self.target();

        let e = compute_challenge(self, &base, &target, &proof.a, &proof.b);

        // base^z ?= a target^e mod n²
        let lhs = base.modpow(&proof.z, nn);
        let rhs = proof.a.modmul(&target.modpow(&e, nn), nn);
        if lhs != rhs {
            warn!("decryption proof: ciphertext-side check failed");
            return false;
        }

        // v^z ?= b v_i^e mod n²
        let lhs = self.pubkey.v().modpow(&proof.z, nn);
        let rhs = proof.b.modmul(&v_i.modpow(&e, nn), nn);
        if lhs != rhs {
            warn!("decryption proof: verification-key-side check failed");
            return false;
        }

        true
    }
}

#[cfg(any(test, feature = "malicious"))]
pub mod malicious {
    use super::*;

    pub fn corrupt_proof(proof: &Proof) -> Proof {
        let proof = proof.clone();
        Proof {
            z: proof.z + BigNumber::one(),
            ..proof
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{malicious::corrupt_proof, Statement};
    use crate::crypto_tools::paillier::{threshold::tests::test_dealer_keygen, Plaintext};
    use tracing_test::traced_test; // enable logs in tests

    #[test]
    #[traced_test]
    fn basic_correctness() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        let (c, _) = pubkey
            .ek()
            .encrypt(
                &mut rand::thread_rng(),
                &Plaintext(unknown_order::BigNumber::from(999u64)),
            )
            .unwrap();

        let partial = shares[1].partial_decrypt(&pubkey, &c).unwrap();

        let stmt = Statement {
            ciphertext: &c,
            partial: &partial,
            pubkey: &pubkey,
        };

        let proof = stmt.prove(&mut rand::thread_rng(), &shares[1]);
        assert!(stmt.verify(&proof));
        crate::crypto_tools::paillier::zk::require(stmt.verify(&proof)).unwrap();

        // corrupted proof
        assert!(!stmt.verify(&corrupt_proof(&proof)));
        assert_eq!(
            crate::crypto_tools::paillier::zk::require(stmt.verify(&corrupt_proof(&proof)))
                .unwrap_err(),
            crate::sdk::api::CryptoError::ProofFailure
        );

        // a partial decryption produced by the wrong share
        let wrong = shares[2].partial_decrypt(&pubkey, &c).unwrap();
        let wrong = crate::crypto_tools::paillier::threshold::PartialDecryption::from_bytes(
            &{
                let mut bytes = wrong.to_bytes().unwrap();
                // overwrite the id so it claims to come from share 2
                bytes[3] = 2;
                bytes
            },
        )
        .unwrap();
        let bad_stmt = Statement {
            partial: &wrong,
            ..stmt.clone()
        };
        assert!(!bad_stmt.verify(&proof));
    }
}
