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

/// Statement: given `ciphertext1 = Enc(a)`, the prover knows `(α, s, γ)`
/// such that `ciphertext2 = Enc(α; s)` and
/// `ciphertext3 = ciphertext1^α γ^n mod n²`, i.e. the third ciphertext
/// contains `a·α`.
#[derive(Clone, Debug)]
pub struct Statement<'a> {
    pub prover_id: TypedUsize<SignPartyId>,
    pub ciphertext1: &'a Ciphertext,
    pub ciphertext2: &'a Ciphertext,
    pub ciphertext3: &'a Ciphertext,
    pub ek: &'a EncryptionKey,
}

#[derive(Clone, Debug)]
pub struct Witness<'a> {
    pub scalar: &'a Plaintext,
    pub randomness: &'a Randomness,
    pub mult_randomness: &'a Randomness,
}

#[allow(non_snake_case)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    d: BigNumber,
    D: BigNumber,
    f: BigNumber,
    z1: BigNumber,
    z2: BigNumber,
}

#[allow(non_snake_case)]
fn compute_challenge(stmt: &Statement, d: &BigNumber, D: &BigNumber) -> BigNumber {
    BigNumber::from_slice(
        Sha256::new()
            .chain_update(constants::MULT_PROOF_TAG.to_be_bytes())
            .chain_update(stmt.prover_id.to_bytes())
            .chain_update(stmt.ek.n().to_bytes())
            .chain_update(stmt.ciphertext1.0.to_bytes())
            .chain_update(stmt.ciphertext2.0.to_bytes())
            .chain_update(stmt.ciphertext3.0.to_bytes())
            .chain_update(d.to_bytes())
            .chain_update(D.to_bytes())
            .finalize(),
    )
}

#[allow(non_snake_case)]
impl Statement<'_> {
    pub fn prove(&self, rng: &mut (impl CryptoRng + RngCore), wit: &Witness) -> Proof {
        // Assume: α in Z_n; s, γ in Z*_n
        debug_assert!(member_of_mod(&wit.scalar.0, self.ek.n()));
        debug_assert!(member_of_mul_group(&wit.randomness.0, self.ek.n()));
        debug_assert!(member_of_mul_group(&wit.mult_randomness.0, self.ek.n()));

        let n = self.ek.n();
        let nn = self.ek.nn();

        let x = Randomness::generate_with_rng(rng, n);
        let u = self.ek.sample_randomness(rng);
        let v = self.ek.sample_randomness(rng);

        // d = (n+1)^x u^n mod n²
        let d = self
            .ek
            .g()
            .modpow(&x.0, nn)
            .modmul(&u.0.modpow(n, nn), nn);

        // D = c1^x v^n mod n²
        let D = self
            .ciphertext1
            .0
            .modpow(&x.0, nn)
            .modmul(&v.0.modpow(n, nn), nn);

        let e = compute_challenge(self, &d, &D);

        // The responses are computed over the integers
        // f = x + e α
        let f = &x.0 + &e * &wit.scalar.0;

        // z1 = u s^e mod n
        let z1 = u.0.modmul(&wit.randomness.0.modpow(&e, n), n);

        // z2 = v γ^e mod n
        let z2 = v.0.modmul(&wit.mult_randomness.0.modpow(&e, n), n);

        Proof { d, D, f, z1, z2 }
    }

    pub fn verify(&self, proof: &Proof) -> bool {
        let n = self.ek.n();
        let nn = self.ek.nn();

        for (c, name) in [
            (self.ciphertext1, "c1"),
            (self.ciphertext2, "c2"),
            (self.ciphertext3, "c3"),
        ] {
            if !member_of_mul_group(&c.0, nn) {
                warn!("mult proof: {} not in Z*_N^2", name);
                return false;
            }
        }
        if !member_of_mul_group(&proof.d, nn) {
            warn!("mult proof: d not in Z*_N^2");
            return false;
        }
        if !member_of_mul_group(&proof.D, nn) {
            warn!("mult proof: D not in Z*_N^2");
            return false;
        }
        if !member_of_mul_group(&proof.z1, n) {
            warn!("mult proof: z1 not in Z*_N");
            return false;
        }
        if !member_of_mul_group(&proof.z2, n) {
            warn!("mult proof: z2 not in Z*_N");
            return false;
        }
        // f = x + e α is bounded by n (1 + 2^|e|)
        if proof.f < BigNumber::zero()
            || proof.f.bit_length() > self.ek.bit_length() + constants::CHALLENGE_SIZE + 1
        {
            warn!("mult proof: f out of range");
            return false;
        }

        let e = compute_challenge(self, &proof.d, &proof.D);

        // (n+1)^f z1^n ?= d c2^e mod n²
        let lhs = self
            .ek
            .g()
            .modpow(&proof.f, nn)
            .modmul(&proof.z1.modpow(n, nn), nn);
        let rhs = proof
            .d
            .modmul(&self.ciphertext2.0.modpow(&e, nn), nn);
        if lhs != rhs {
            warn!("mult proof: scalar encryption check failed");
            return false;
        }

        // c1^f z2^n ?= D c3^e mod n²
        let lhs = self
            .ciphertext1
            .0
            .modpow(&proof.f, nn)
            .modmul(&proof.z2.modpow(n, nn), nn);
        let rhs = proof
            .D
            .modmul(&self.ciphertext3.0.modpow(&e, nn), nn);
        if lhs != rhs {
            warn!("mult proof: product check failed");
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
            d: proof.d + BigNumber::one(),
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
        let rng = &mut rand::thread_rng();
        let (ek, _dk) = keygen(rng, 256).unwrap();

        let base_msg = ek.random_plaintext(rng);
        let (ciphertext1, _) = ek.encrypt(rng, &base_msg).unwrap();

        let scalar = ek.random_plaintext(rng);
        let (ciphertext2, randomness) = ek.encrypt(rng, &scalar).unwrap();

        // c3 = c1^α γ^n mod n²
        let mult_randomness = ek.sample_randomness(rng);
        let ciphertext3 = ek
            .randomize(&ek.mul(&ciphertext1, &scalar).unwrap(), &mult_randomness)
            .unwrap();

        let stmt = Statement {
            prover_id: TypedUsize::from_usize(3),
            ciphertext1: &ciphertext1,
            ciphertext2: &ciphertext2,
            ciphertext3: &ciphertext3,
            ek: &ek,
        };
        let wit = Witness {
            scalar: &scalar,
            randomness: &randomness,
            mult_randomness: &mult_randomness,
        };

        let proof = stmt.prove(rng, &wit);
        assert!(stmt.verify(&proof));

        // bad prover id
        let bad_id_stmt = Statement {
            prover_id: TypedUsize::from_usize(4),
            ..stmt.clone()
        };
        assert!(!bad_id_stmt.verify(&proof));

        // corrupted proof
        assert!(!stmt.verify(&corrupt_proof(&proof)));

        // bad witness
        let bad_scalar = Plaintext(&scalar.0 + 1);
        let bad_wit = Witness {
            scalar: &bad_scalar,
            ..wit
        };
        assert!(!stmt.verify(&stmt.prove(rng, &bad_wit)));
    }
}
