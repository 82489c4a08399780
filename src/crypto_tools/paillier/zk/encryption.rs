use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use unknown_order::BigNumber;

use crate::{
    collections::TypedUsize,
    constants,
    crypto_tools::paillier::{
        utils::{member_of_mod, member_of_mul_group},
        Ciphertext, EncryptionKey, Plaintext, Randomness,
    },
    sign::SignPartyId,
};

/// Statement: the prover knows `(α, s)` such that
/// `ciphertext = (n+1)^α s^n mod n²`.
#[derive(Clone, Debug)]
pub struct Statement<'a> {
    pub prover_id: TypedUsize<SignPartyId>,
    pub ciphertext: &'a Ciphertext,
    pub ek: &'a EncryptionKey,
}

#[derive(Clone, Debug)]
pub struct Witness<'a> {
    pub msg: &'a Plaintext,
    pub randomness: &'a Randomness,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    b: BigNumber,
    w: BigNumber,
    z: BigNumber,
}

/// Compute the challenge as a 256-bit integer over the transcript `(c, b)`.
fn compute_challenge(stmt: &Statement, b: &BigNumber) -> BigNumber {
    BigNumber::from_slice(
        Sha256::new()
            .chain_update(constants::ENCRYPTION_PROOF_TAG.to_be_bytes())
            .chain_update(stmt.prover_id.to_bytes())
            .chain_update(stmt.ek.n().to_bytes())
            .chain_update(stmt.ciphertext.0.to_bytes())
            .chain_update(b.to_bytes())
            .finalize(),
    )
}

impl Statement<'_> {
    pub fn prove(&self, rng: &mut (impl CryptoRng + RngCore), wit: &Witness) -> Proof {
        // Assume: msg in Z_n, randomness in Z*_n
        debug_assert!(member_of_mod(&wit.msg.0, self.ek.n()));
        debug_assert!(member_of_mul_group(&wit.randomness.0, self.ek.n()));

        let n = self.ek.n();
        let nn = self.ek.nn();

        let x = Randomness::generate_with_rng(rng, n);
        let u = self.ek.sample_randomness(rng);

        // b = (n+1)^x u^n mod n²
        let b = self
            .ek
            .g()
            .modpow(&x.0, nn)
            .modmul(&u.0.modpow(n, nn), nn);

        let e = compute_challenge(self, &b);

        // w = x + e α (mod n), with carry t = ⌊(x + e α)/n⌋
        let sum = &x.0 + &e * &wit.msg.0;
        let w = &sum % n;
        let t = &sum / n;

        // z = u s^e (n+1)^t mod n²
        let z = u
            .0
            .modmul(&wit.randomness.0.modpow(&e, nn), nn)
            .modmul(&self.ek.g().modpow(&t, nn), nn);

        Proof { b, w, z }
    }

    pub fn verify(&self, proof: &Proof) -> bool {
        let n = self.ek.n();
        let nn = self.ek.nn();

        if !member_of_mul_group(&self.ciphertext.0, nn) {
            warn!("encryption proof: ciphertext not in Z*_N^2");
            return false;
        }
        if !member_of_mul_group(&proof.b, nn) {
            warn!("encryption proof: b not in Z*_N^2");
            return false;
        }
        if !member_of_mod(&proof.w, n) {
            warn!("encryption proof: w not in Z_N");
            return false;
        }
        if !member_of_mul_group(&proof.z, nn) {
            warn!("encryption proof: z not in Z*_N^2");
            return false;
        }

        let e = compute_challenge(self, &proof.b);

        // (n+1)^w z^n ?= b c^e mod n²
        let lhs = self
            .ek
            .g()
            .modpow(&proof.w, nn)
            .modmul(&proof.z.modpow(n, nn), nn);
        let rhs = proof
            .b
            .modmul(&self.ciphertext.0.modpow(&e, nn), nn);

        if lhs != rhs {
            warn!("encryption proof: failed to verify");
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
            b: proof.b + BigNumber::one(),
            ..proof
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{malicious::corrupt_proof, Plaintext, Statement, TypedUsize, Witness};
    use crate::crypto_tools::paillier::keygen;
    use tracing_test::traced_test; // enable logs in tests

    #[test]
    #[traced_test]
    fn basic_correctness() {
        let (ek, _dk) = keygen(&mut rand::thread_rng(), 256).unwrap();
        let msg = ek.random_plaintext(&mut rand::thread_rng());
        let (ciphertext, randomness) = ek.encrypt(&mut rand::thread_rng(), &msg).unwrap();

        let stmt = Statement {
            prover_id: TypedUsize::from_usize(1),
            ciphertext: &ciphertext,
            ek: &ek,
        };
        let wit = Witness {
            msg: &msg,
            randomness: &randomness,
        };

        let proof = stmt.prove(&mut rand::thread_rng(), &wit);
        assert!(stmt.verify(&proof));

        // bad prover id
        let bad_id_stmt = Statement {
            prover_id: TypedUsize::from_usize(2),
            ..stmt.clone()
        };
        assert!(!bad_id_stmt.verify(&proof));

        // corrupted proof
        assert!(!stmt.verify(&corrupt_proof(&proof)));

        // bad witness
        let bad_msg = Plaintext(&msg.0 + 1);
        let bad_wit = Witness {
            msg: &bad_msg,
            ..wit
        };
        let bad_proof = stmt.prove(&mut rand::thread_rng(), &bad_wit);
        assert!(!stmt.verify(&bad_proof));
    }
}
