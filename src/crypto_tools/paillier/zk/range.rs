use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, warn};
use unknown_order::BigNumber;

use crate::{
    collections::TypedUsize,
    constants,
    crypto_tools::{
        k256_serde,
        paillier::{
            secp256k1_modulus_pow, to_bigint, to_scalar,
            utils::{member_of_mod, member_of_mul_group},
            zk::ZkSetup,
            Ciphertext, EncryptionKey, Plaintext, Randomness,
        },
    },
    sdk::api::{CryptoError, CryptoResult},
    sign::SignPartyId,
};

#[derive(Clone, Debug)]
pub struct Statement<'a> {
    pub prover_id: TypedUsize<SignPartyId>,
    pub ciphertext: &'a Ciphertext,
    pub ek: &'a EncryptionKey,
    /// the claimed range is `[0, q^range_exp)`
    pub range_exp: u32,
}

#[derive(Clone, Debug)]
pub struct Witness<'a> {
    pub msg: &'a Plaintext,
    pub randomness: &'a Randomness,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    z: BigNumber,
    u: Ciphertext,
    w: BigNumber,
    s: Randomness,
    s1: Plaintext,
    s2: Randomness,
}

#[derive(Clone, Debug)]
pub struct StatementWc<'a> {
    pub stmt: Statement<'a>,
    pub msg_g: &'a k256::ProjectivePoint,
    pub g: &'a k256::ProjectivePoint,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofWc {
    proof: Proof,
    u1: k256_serde::ProjectivePoint,
}

impl ZkSetup {
    // statement (ciphertext, ek, range_exp), witness (msg, randomness)
    //   such that ciphertext = Enc(ek, msg, randomness) and -q^(B+2) < msg < q^(B+2)
    //   where B = range_exp; the slack exponent 2 covers the challenge and hiding terms
    // adapted from appendix A.1 of https://eprint.iacr.org/2019/114.pdf
    pub fn range_proof(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        stmt: &Statement,
        wit: &Witness,
    ) -> Proof {
        self.range_proof_inner(rng, constants::RANGE_PROOF_TAG, stmt, None, wit)
            .0
    }

    pub fn verify_range_proof(&self, stmt: &Statement, proof: &Proof) -> bool {
        self.verify_range_proof_inner(constants::RANGE_PROOF_TAG, stmt, proof, None)
    }

    // statement (msg_g, g, ciphertext, ek), witness (msg, randomness)
    //   such that ciphertext = Enc(ek, msg, randomness) and -q^3 < msg < q^3
    //   and msg_g = msg * g (this is the additional "check")
    // the curve relation pins the message to the scalar field, so this
    // variant requires range_exp == 1
    pub fn range_proof_wc(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        stmt: &StatementWc,
        wit: &Witness,
    ) -> CryptoResult<ProofWc> {
        if stmt.stmt.range_exp != 1 {
            error!("range proof wc: range_exp must be 1");
            return Err(CryptoError::DomainViolation("range_exp must be 1"));
        }

        let (proof, u1) = self.range_proof_inner(
            rng,
            constants::RANGE_PROOF_WC_TAG,
            &stmt.stmt,
            Some((stmt.msg_g, stmt.g)),
            wit,
        );

        let u1 = u1
            .ok_or_else(|| {
                error!("range proof wc: missing u1");
                CryptoError::DomainViolation("missing u1")
            })?
            .into();

        Ok(ProofWc { proof, u1 })
    }

    pub fn verify_range_proof_wc(&self, stmt: &StatementWc, proof: &ProofWc) -> bool {
        if stmt.stmt.range_exp != 1 {
            warn!("range proof wc: range_exp must be 1");
            return false;
        }
        self.verify_range_proof_inner(
            constants::RANGE_PROOF_WC_TAG,
            &stmt.stmt,
            &proof.proof,
            Some((stmt.msg_g, stmt.g, proof.u1.as_ref())),
        )
    }

    /// Compute the challenge e in Z_q for the range proof
    fn compute_range_proof_challenge(
        tag: u8,
        stmt: &Statement,
        msg_g_g: Option<(&k256::ProjectivePoint, &k256::ProjectivePoint)>, // (msg_g, g)
        z: &BigNumber,
        u: &Ciphertext,
        u1: Option<&k256::ProjectivePoint>,
        w: &BigNumber,
    ) -> k256::Scalar {
        let digest = Sha256::new()
            .chain_update(tag.to_be_bytes())
            .chain_update(stmt.prover_id.to_bytes())
            .chain_update(stmt.range_exp.to_be_bytes())
            .chain_update(stmt.ek.n().to_bytes())
            .chain_update(stmt.ciphertext.0.to_bytes())
            .chain_update(msg_g_g.map_or([0; 33], |(msg_g, _)| k256_serde::point_to_bytes(msg_g)))
            .chain_update(msg_g_g.map_or([0; 33], |(_, g)| k256_serde::point_to_bytes(g)))
            .chain_update(z.to_bytes())
            .chain_update(u.0.to_bytes())
            .chain_update(u1.map_or([0; 33], k256_serde::point_to_bytes))
            .chain_update(w.to_bytes())
            .finalize();

        to_scalar(&BigNumber::from_slice(digest))
    }

    #[allow(clippy::many_single_char_names)]
    fn range_proof_inner(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        tag: u8,
        stmt: &Statement,
        msg_g_g: Option<(&k256::ProjectivePoint, &k256::ProjectivePoint)>, // (msg_g, g)
        wit: &Witness,
    ) -> (Proof, Option<k256::ProjectivePoint>) {
        let cap = secp256k1_modulus_pow(stmt.range_exp);
        let cap_slack = secp256k1_modulus_pow(stmt.range_exp + 2);

        // Assume: m in Z_(q^B)
        debug_assert!(member_of_mod(&wit.msg.0, &cap));

        // Assume: r in Z*_N
        debug_assert!(member_of_mul_group(&wit.randomness.0, stmt.ek.n()));

        // Assume: the slack bound fits the plaintext space
        debug_assert!(&cap_slack < stmt.ek.n());

        // Sample alpha from Z_(q^(B+2))
        let alpha = Plaintext::generate_with_rng(rng, &cap_slack);

        let cap_n_tilde = &cap * self.n_tilde();
        let cap_slack_n_tilde = &cap_slack * self.n_tilde();

        // Sample rho from Z_(q^B N~)
        let rho = Randomness::generate_with_rng(rng, &cap_n_tilde);
        // Sample gamma from Z_(q^(B+2) N~)
        let gamma = Randomness::generate_with_rng(rng, &cap_slack_n_tilde);

        // z = h1^m h2^rho mod N~
        let z = self.commit(wit.msg, &rho);

        // Sample beta from Z*_N
        // u = Paillier-Enc(alpha, beta) = (n+1)^alpha beta^n mod n²
        let beta = stmt.ek.sample_randomness(rng);
        let u = Ciphertext(
            stmt.ek
                .g()
                .modpow(&alpha.0, stmt.ek.nn())
                .modmul(&beta.0.modpow(stmt.ek.n(), stmt.ek.nn()), stmt.ek.nn()),
        );

        // w = h1^alpha h2^gamma mod N~
        let w = self.commit(&alpha, &gamma);

        // u1 = g^alpha
        let u1 = msg_g_g.map::<k256::ProjectivePoint, _>(|(_, g)| g * &alpha.to_scalar());

        let e = &to_bigint(&Self::compute_range_proof_challenge(
            tag,
            stmt,
            msg_g_g,
            &z,
            &u,
            u1.as_ref(),
            &w,
        ));

        // s = r^e beta mod N
        let s = Randomness(
            wit.randomness
                .0
                .modpow(e, stmt.ek.n())
                .modmul(&beta.0, stmt.ek.n()),
        );

        // s1 = e m + alpha
        let s1 = Plaintext(e * &wit.msg.0 + &alpha.0);

        // s2 = e rho + gamma
        let s2 = Randomness(e * &rho.0 + &gamma.0);

        (Proof { z, u, w, s, s1, s2 }, u1)
    }

    fn verify_range_proof_inner(
        &self,
        tag: u8,
        stmt: &Statement,
        proof: &Proof,
        msg_g_g_u1: Option<(
            &k256::ProjectivePoint,
            &k256::ProjectivePoint,
            &k256::ProjectivePoint,
        )>, // (msg_g, g, u1)
    ) -> bool {
        let cap_slack = secp256k1_modulus_pow(stmt.range_exp + 2);

        // The slack bound must fit the plaintext space, else the s1 check
        // below is meaningless
        if &cap_slack >= stmt.ek.n() {
            warn!("range proof: q^(B+2) exceeds the Paillier modulus");
            return false;
        }

        // Ensure c is in Z*_N^2
        if !member_of_mul_group(&stmt.ciphertext.0, stmt.ek.nn()) {
            warn!("range proof: ciphertext not in Z*_N^2");
            return false;
        }

        // Ensure z is in Z*_N~
        if !member_of_mul_group(&proof.z, self.n_tilde()) {
            warn!("range proof: z not in Z*_N~");
            return false;
        }

        // Ensure u is in Z*_N^2
        if !member_of_mul_group(&proof.u.0, stmt.ek.nn()) {
            warn!("range proof: u not in Z*_N^2");
            return false;
        }

        // Ensure w is in Z*_N~
        if !member_of_mul_group(&proof.w, self.n_tilde()) {
            warn!("range proof: w not in Z*_N~");
            return false;
        }

        // Ensure s is in Z*_N
        if !member_of_mul_group(&proof.s.0, stmt.ek.n()) {
            warn!("range proof: s not in Z*_N");
            return false;
        }

        // Ensure s1 is in Z_(q^(B+2))
        // An honest s1 = e m + alpha is below the bound with overwhelming
        // probability; a prover whose message exceeds q^B cannot stay below it
        if !member_of_mod(&proof.s1.0, &cap_slack) {
            warn!("range proof: s1 not in Z_(q^(B+2))");
            return false;
        }

        // Ensure s2 is in Z_(q^(B+2) N~)
        let cap_slack_n_tilde = &cap_slack * self.n_tilde();
        if !member_of_mod(&proof.s2.0, &cap_slack_n_tilde) {
            warn!("range proof: s2 not in Z_(q^(B+2) N~)");
            return false;
        }

        // Ensure msg_g and u1 are points on secp256k1
        // This is handled by k256_serde on deserialize.

        let e = Self::compute_range_proof_challenge(
            tag,
            stmt,
            msg_g_g_u1.map(|(msg_g, g, _)| (msg_g, g)),
            &proof.z,
            &proof.u,
            msg_g_g_u1.map(|(_, _, u1)| u1),
            &proof.w,
        );

        let e_neg_bigint = -to_bigint(&e);
        let e_neg = -e;

        if let Some((msg_g, g, u1)) = msg_g_g_u1 {
            let s1 = to_scalar(&proof.s1.0);
            let s1_g = g * &s1;

            // u1 ?= g^s1 y^(-e)
            let u1_check = msg_g * &e_neg + s1_g;
            if u1_check != *u1 {
                warn!("range proof: 'wc' check failed, invalid u1");
                return false;
            }
        }

        // u ?= Paillier-Enc(s1, s) * c^(-e) mod N^2
        let u_check = match stmt.ek.encrypt_with_randomness(&proof.s1, &proof.s) {
            Ok(enc) => enc.0.modmul(
                &stmt.ciphertext.0.modpow(&e_neg_bigint, stmt.ek.nn()),
                stmt.ek.nn(),
            ),
            Err(_) => {
                warn!("range proof: s1 not a valid plaintext");
                return false;
            }
        };
        if u_check != proof.u.0 {
            warn!("range proof: u check failed");
            return false;
        }

        // w ?= h1^s1 h2^s2 z^(-e) mod N~
        let w_check = self.commit(&proof.s1, &proof.s2).modmul(
            &proof.z.modpow(&e_neg_bigint, self.n_tilde()),
            self.n_tilde(),
        );
        if w_check != proof.w {
            warn!("range proof: w check failed");
            return false;
        }

        true
    }
}

// include the malicious module in non-malicious test builds
// to avoid code duplication for malicious tests
#[cfg(any(test, feature = "malicious"))]
pub mod malicious {
    use crate::crypto_tools::k256_serde::ProjectivePoint;

    use super::*;

    pub fn corrupt_proof(proof: &Proof) -> Proof {
        let proof = proof.clone();
        Proof {
            u: Ciphertext(proof.u.0 + BigNumber::one()),
            ..proof
        }
    }

    pub fn corrupt_proof_wc(proof_wc: &ProofWc) -> ProofWc {
        let proof_wc = proof_wc.clone();
        ProofWc {
            u1: ProjectivePoint::from(k256::ProjectivePoint::GENERATOR + proof_wc.u1.as_ref()),
            ..proof_wc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        malicious::{corrupt_proof, corrupt_proof_wc},
        Plaintext, Proof, Statement, StatementWc, TypedUsize, Witness, ZkSetup,
    };
    use crate::crypto_tools::paillier::{keygen, secp256k1_modulus_pow};
    use ecdsa::elliptic_curve::Field;
    use tracing_test::traced_test; // enable logs in tests

    #[test]
    #[traced_test]
    fn basic_correctness() {
        // create a (statement, witness) pair
        let rng = &mut rand::thread_rng();
        let (ek, _dk) = keygen(rng, 512).unwrap();
        let msg = &Plaintext::from_scalar(&k256::Scalar::random(rand::thread_rng()));
        let g = &k256::ProjectivePoint::GENERATOR;
        let msg_g = &(g * &msg.to_scalar());
        let (ciphertext, randomness) = &ek.encrypt(rng, msg).unwrap();
        let prover_id = TypedUsize::from_usize(10);
        let bad_id = TypedUsize::from_usize(100);

        let stmt_wc = &StatementWc {
            stmt: Statement {
                prover_id,
                ciphertext,
                ek: &ek,
                range_exp: 1,
            },
            msg_g,
            g,
        };
        let stmt = &stmt_wc.stmt;
        let wit = &Witness { msg, randomness };
        let zkp = ZkSetup::new_unsafe(&mut rand::thread_rng(), 512).unwrap();

        // test: valid proof
        let proof = zkp.range_proof(rng, stmt, wit);
        assert!(zkp.verify_range_proof(stmt, &proof));

        // test: valid proof wc (with check)
        let proof_wc = zkp.range_proof_wc(rng, stmt_wc, wit).unwrap();
        assert!(zkp.verify_range_proof_wc(stmt_wc, &proof_wc));

        // test: proofs survive the wire; truncated encodings do not parse
        let proof_bytes = crate::sdk::api::serialize(&proof).unwrap();
        let proof2: Proof = crate::sdk::api::deserialize(&proof_bytes).unwrap();
        assert!(zkp.verify_range_proof(stmt, &proof2));
        assert!(
            crate::sdk::api::deserialize::<Proof>(&proof_bytes[..proof_bytes.len() - 1]).is_none()
        );

        // test: valid proof and bad id
        let mut bad_stmt_wc = stmt_wc.clone();
        bad_stmt_wc.stmt.prover_id = bad_id;
        let bad_stmt = &bad_stmt_wc.stmt;
        assert!(!zkp.verify_range_proof(bad_stmt, &proof));
        assert!(!zkp.verify_range_proof_wc(&bad_stmt_wc, &proof_wc));

        // test: bad proof
        let bad_proof = corrupt_proof(&proof);
        assert!(!zkp.verify_range_proof(stmt, &bad_proof));

        // test: bad proof wc (with check)
        let bad_proof_wc = corrupt_proof_wc(&proof_wc);
        assert!(!zkp.verify_range_proof_wc(stmt_wc, &bad_proof_wc));

        // test: bad witness
        let bad_msg = Plaintext(&wit.msg.0 + 1);
        let bad_wit = &Witness {
            msg: &bad_msg,
            ..*wit
        };
        let bad_wit_proof = zkp.range_proof(rng, stmt, bad_wit);
        assert!(!zkp.verify_range_proof(stmt, &bad_wit_proof));

        let bad_wit_proof_wc = zkp.range_proof_wc(rng, stmt_wc, bad_wit).unwrap();
        assert!(!zkp.verify_range_proof_wc(stmt_wc, &bad_wit_proof_wc));
    }

    #[test]
    #[traced_test]
    fn wide_range() {
        // a message in [0, q^6) needs a modulus beyond q^8
        let rng = &mut rand::thread_rng();
        let (ek, _dk) = keygen(rng, 1088).unwrap();
        let msg = &Plaintext::generate_with_rng(rng, &secp256k1_modulus_pow(6));
        let (ciphertext, randomness) = &ek.encrypt(rng, msg).unwrap();

        let stmt = &Statement {
            prover_id: TypedUsize::from_usize(0),
            ciphertext,
            ek: &ek,
            range_exp: 6,
        };
        let wit = &Witness { msg, randomness };
        let zkp = ZkSetup::new_unsafe(&mut rand::thread_rng(), 512).unwrap();

        let proof = zkp.range_proof(rng, stmt, wit);
        assert!(zkp.verify_range_proof(stmt, &proof));

        // the same proof does not verify against a tighter range
        let tight_stmt = &Statement {
            range_exp: 5,
            ..stmt.clone()
        };
        assert!(!zkp.verify_range_proof(tight_stmt, &proof));
    }
}
