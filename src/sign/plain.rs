//! The six-round signing variant over plain Paillier. It mirrors the
//! four-round protocol but separates the two sampling phases into their own
//! commit/open pairs and performs two rounds of threshold decryption: first
//! to recover `µ = k·Σρ_i mod q`, then to recover `s`. Partial decryptions
//! carry proofs of correct decryption. The abort discipline is identical to
//! the four-round variant.
use k256::elliptic_curve::Field;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    collections::{FillVecMap, VecMap},
    crypto_tools::{
        commit::{Commitment, Opening},
        k256_serde::{self, point_x_scalar},
        paillier::{
            threshold::PartialDecryption,
            zk::{decryption, encryption, mult, range},
            Ciphertext, EncryptionKey, Plaintext, Randomness,
        },
    },
    keygen::{GroupPublicInfo, ShareSecretInfo},
    sdk::{
        api::{serialize, BytesVec, CryptoError, CryptoResult, Fault},
        wire_bytes::encode,
    },
};

use super::api::{
    assemble_signature, new_info, parse_bcasts, Faulters, MessageDigest, SignInfo, SignOutput,
    SignPartyId,
};

#[cfg(any(test, feature = "malicious"))]
use super::malicious::{log_confess_info, Behaviour};

/// Per-message, per-party signer for the six-round variant, with the same
/// message-bag driving convention as [super::Signer].
pub struct PlainSigner {
    info: SignInfo,
    faulters: Faulters,
    state: State,
}

enum State {
    Round1,
    Round2(R1State),
    Round3(R2State),
    Round4(R3State),
    Round5(R4State),
    Round6(R5State),
    Finish(R6State),
    Done,
}

pub fn new_sign_plain(
    group: &GroupPublicInfo,
    share: &ShareSecretInfo,
    signer_share_ids: &[usize],
    msg_to_sign: &MessageDigest,
    #[cfg(any(test, feature = "malicious"))] behaviour: Behaviour,
) -> CryptoResult<PlainSigner> {
    let info = new_info(
        group,
        share,
        signer_share_ids,
        msg_to_sign,
        #[cfg(any(test, feature = "malicious"))]
        behaviour,
    )?;
    let party_count = info.party_count();
    Ok(PlainSigner {
        info,
        faulters: FillVecMap::with_size(party_count),
        state: State::Round1,
    })
}

impl PlainSigner {
    /// Round 1: commit to `(u_i, v_i)`, the encryptions of `ρ_i` and
    /// `ρ_i·x`.
    pub fn round1(&mut self) -> CryptoResult<BytesVec> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round1 => {
                let (state, bcast) = r1_start(&self.info)?;
                self.state = State::Round2(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 1 executed out of order")),
        }
    }

    /// Round 2: open the first commitment with proofs.
    pub fn round2(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round2(state) => {
                let (state, bcast) = r2_execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round3(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 2 executed out of order")),
        }
    }

    /// Round 3: verify the first openings, aggregate `u`, `v`, and commit to
    /// `(R_i, e_i, w_i)`, the nonce point and the encryptions of `k_i` and
    /// `k_i·Σρ_j`.
    pub fn round3(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round3(state) => {
                let (state, bcast) = r3_execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round4(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 3 executed out of order")),
        }
    }

    /// Round 4: open the second commitment with proofs.
    pub fn round4(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round4(state) => {
                let (state, bcast) = r4_execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round5(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 4 executed out of order")),
        }
    }

    /// Round 5: verify the second openings, aggregate `R` and `w`, and
    /// broadcast a partial decryption of `w = Enc(kρ)` with proof.
    pub fn round5(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round5(state) => {
                let (state, bcast) = r5_execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round6(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 5 executed out of order")),
        }
    }

    /// Round 6: recombine `µ`, form the signature ciphertext, and broadcast
    /// a partial decryption of it with proof.
    pub fn round6(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round6(state) => {
                let (state, bcast) = r6_execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Finish(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 6 executed out of order")),
        }
    }

    /// Recombine the signature shares and output `(r, s)` unless aborted.
    pub fn finish(
        &mut self,
        msgs_in: FillVecMap<SignPartyId, BytesVec>,
    ) -> CryptoResult<SignOutput> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Finish(state) => finish(&self.info, &mut self.faulters, state, msgs_in),
            _ => Err(CryptoError::ProtocolAbort("finish executed out of order")),
        }
    }

    pub fn aborted(&self) -> bool {
        !self.faulters.is_empty()
    }

    fn check_msgs_in(&self, msgs_in: &FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<()> {
        if msgs_in.size() != self.info.party_count() {
            return Err(CryptoError::DomainViolation("message bag has wrong size"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast1 {
    com: Commitment,
}

/// First-phase secrets: `u_i = Enc(ρ_i)` and `v_i = ρ_i · Enc(x)`,
/// re-randomized.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadA {
    u_i: Ciphertext,
    v_i: Ciphertext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast2 {
    payload: PayloadA,
    opening: Opening,
    enc_proof: encryption::Proof,
    range_proof: range::Proof,
    mult_proof: mult::Proof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast3 {
    com: Commitment,
}

/// Second-phase secrets: the nonce point `R_i = k_i·G`, `e_i = Enc(k_i)`,
/// and `w_i = k_i · u`, re-randomized.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadB {
    R_i: k256_serde::ProjectivePoint,
    e_i: Ciphertext,
    w_i: Ciphertext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast4 {
    payload: PayloadB,
    opening: Opening,
    range_proof: range::ProofWc,
    mult_proof: mult::Proof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast5 {
    mu: PartialDecryption,
    proof: decryption::Proof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bcast6 {
    sigma: PartialDecryption,
    proof: decryption::Proof,
}

struct R1State {
    rho_i: Plaintext,
    u_randomness: Randomness,
    mult_randomness: Randomness,
    payload: PayloadA,
    opening: Opening,
}

struct R2State {
    r1state: R1State,
    coms: VecMap<SignPartyId, Option<Commitment>>,
}

struct R3State {
    u: Ciphertext,
    v: Ciphertext,
    k_i: Plaintext,
    e_randomness: Randomness,
    mult_randomness: Randomness,
    payload: PayloadB,
    opening: Opening,
}

struct R4State {
    r3state: R3State,
    coms: VecMap<SignPartyId, Option<Commitment>>,
}

struct R5State {
    r: k256::Scalar,
    u: Ciphertext,
    v: Ciphertext,
    w: Ciphertext,
}

struct R6State {
    r: k256::Scalar,
    sigma_ciphertext: Ciphertext,
}

fn r1_start(info: &SignInfo) -> CryptoResult<(R1State, BytesVec)> {
    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();

    let rho_i = Plaintext::from_scalar(&k256::Scalar::random(&mut *rng));
    let (u_i, u_randomness) = ek.encrypt(rng, &rho_i)?;

    // v_i = ρ_i · Enc(x), re-randomized
    let mult_randomness = ek.sample_randomness(rng);
    let v_i = ek.randomize(
        &ek.mul(info.group().encrypted_signing_key(), &rho_i)?,
        &mult_randomness,
    )?;

    let payload = PayloadA { u_i, v_i };
    let (com, opening) = info
        .group()
        .commit_key()
        .commit(rng, &serialize(&payload)?);

    Ok((
        R1State {
            rho_i,
            u_randomness,
            mult_randomness,
            payload,
            opening,
        },
        encode(&Bcast1 { com })?,
    ))
}

fn r2_execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    r1state: R1State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(R2State, BytesVec)> {
    let coms = parse_bcasts::<Bcast1>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| bcast.com));

    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();

    let enc_stmt = encryption::Statement {
        prover_id: info.my_id(),
        ciphertext: &r1state.payload.u_i,
        ek,
    };
    let enc_proof = enc_stmt.prove(
        rng,
        &encryption::Witness {
            msg: &r1state.rho_i,
            randomness: &r1state.u_randomness,
        },
    );

    let range_proof = zk.range_proof(
        rng,
        &range::Statement {
            prover_id: info.my_id(),
            ciphertext: &r1state.payload.u_i,
            ek,
            range_exp: 1,
        },
        &range::Witness {
            msg: &r1state.rho_i,
            randomness: &r1state.u_randomness,
        },
    );

    let mult_stmt = mult::Statement {
        prover_id: info.my_id(),
        ciphertext1: info.group().encrypted_signing_key(),
        ciphertext2: &r1state.payload.u_i,
        ciphertext3: &r1state.payload.v_i,
        ek,
    };
    let mult_proof = mult_stmt.prove(
        rng,
        &mult::Witness {
            scalar: &r1state.rho_i,
            randomness: &r1state.u_randomness,
            mult_randomness: &r1state.mult_randomness,
        },
    );

    corrupt!(enc_proof, corrupt_enc_proof(info, enc_proof));

    let bcast = encode(&Bcast2 {
        payload: r1state.payload.clone(),
        opening: r1state.opening.clone(),
        enc_proof,
        range_proof,
        mult_proof,
    })?;

    Ok((R2State { r1state, coms }, bcast))
}

#[allow(non_snake_case)]
fn r3_execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: R2State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(R3State, BytesVec)> {
    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();
    let commit_key = info.group().commit_key();

    let bcasts = parse_bcasts::<Bcast2>(info.my_id(), faulters, &msgs_in)?;

    let mut payloads: Vec<Option<PayloadA>> = Vec::with_capacity(info.party_count());
    for (from, bcast) in bcasts.into_iter() {
        if from == info.my_id() {
            payloads.push(Some(state.r1state.payload.clone()));
            continue;
        }
        let bcast = match bcast {
            Some(bcast) => bcast,
            None => {
                payloads.push(None);
                continue;
            }
        };
        let com = match state.coms.get(from)? {
            Some(com) => com,
            None => {
                payloads.push(None);
                continue;
            }
        };

        if !commit_key.verify(com, &serialize(&bcast.payload)?, &bcast.opening) {
            warn!(
                "peer {} says: first-phase commitment opening failure by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, Fault::ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        let enc_stmt = encryption::Statement {
            prover_id: from,
            ciphertext: &bcast.payload.u_i,
            ek,
        };
        let range_stmt = range::Statement {
            prover_id: from,
            ciphertext: &bcast.payload.u_i,
            ek,
            range_exp: 1,
        };
        let mult_stmt = mult::Statement {
            prover_id: from,
            ciphertext1: info.group().encrypted_signing_key(),
            ciphertext2: &bcast.payload.u_i,
            ciphertext3: &bcast.payload.v_i,
            ek,
        };
        if !enc_stmt.verify(&bcast.enc_proof)
            || !zk.verify_range_proof(&range_stmt, &bcast.range_proof)
            || !mult_stmt.verify(&bcast.mult_proof)
        {
            warn!(
                "peer {} says: invalid first-phase proof by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, Fault::ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        payloads.push(Some(bcast.payload));
    }

    // u = Enc(Σρ_j), v = Enc(x Σρ_j)
    let (u, v) = aggregate_pairs(ek, payloads.iter().flatten().map(|p| (&p.u_i, &p.v_i)))?;

    // second sampling phase
    let k_i = Plaintext::from_scalar(&k256::Scalar::random(&mut *rng));
    let R_i = k256::ProjectivePoint::GENERATOR * k_i.to_scalar();
    let (e_i, e_randomness) = ek.encrypt(rng, &k_i)?;

    let mult_randomness = ek.sample_randomness(rng);
    let w_i = ek.randomize(&ek.mul(&u, &k_i)?, &mult_randomness)?;

    let payload = PayloadB {
        R_i: R_i.into(),
        e_i,
        w_i,
    };
    let (com, opening) = commit_key.commit(rng, &serialize(&payload)?);

    Ok((
        R3State {
            u,
            v,
            k_i,
            e_randomness,
            mult_randomness,
            payload,
            opening,
        },
        encode(&Bcast3 { com })?,
    ))
}

fn r4_execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    r3state: R3State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(R4State, BytesVec)> {
    let coms = parse_bcasts::<Bcast3>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| bcast.com));

    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();
    let g = k256::ProjectivePoint::GENERATOR;

    let range_proof = zk.range_proof_wc(
        rng,
        &range::StatementWc {
            stmt: range::Statement {
                prover_id: info.my_id(),
                ciphertext: &r3state.payload.e_i,
                ek,
                range_exp: 1,
            },
            msg_g: r3state.payload.R_i.as_ref(),
            g: &g,
        },
        &range::Witness {
            msg: &r3state.k_i,
            randomness: &r3state.e_randomness,
        },
    )?;

    let mult_stmt = mult::Statement {
        prover_id: info.my_id(),
        ciphertext1: &r3state.u,
        ciphertext2: &r3state.payload.e_i,
        ciphertext3: &r3state.payload.w_i,
        ek,
    };
    let mult_proof = mult_stmt.prove(
        rng,
        &mult::Witness {
            scalar: &r3state.k_i,
            randomness: &r3state.e_randomness,
            mult_randomness: &r3state.mult_randomness,
        },
    );

    corrupt!(range_proof, corrupt_wc_proof(info, range_proof));

    let bcast = encode(&Bcast4 {
        payload: r3state.payload.clone(),
        opening: r3state.opening.clone(),
        range_proof,
        mult_proof,
    })?;

    Ok((R4State { r3state, coms }, bcast))
}

#[allow(non_snake_case)]
fn r5_execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: R4State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(R5State, BytesVec)> {
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();
    let commit_key = info.group().commit_key();
    let g = k256::ProjectivePoint::GENERATOR;

    let bcasts = parse_bcasts::<Bcast4>(info.my_id(), faulters, &msgs_in)?;

    let mut payloads: Vec<Option<PayloadB>> = Vec::with_capacity(info.party_count());
    for (from, bcast) in bcasts.into_iter() {
        if from == info.my_id() {
            payloads.push(Some(state.r3state.payload.clone()));
            continue;
        }
        let bcast = match bcast {
            Some(bcast) => bcast,
            None => {
                payloads.push(None);
                continue;
            }
        };
        let com = match state.coms.get(from)? {
            Some(com) => com,
            None => {
                payloads.push(None);
                continue;
            }
        };

        if !commit_key.verify(com, &serialize(&bcast.payload)?, &bcast.opening) {
            warn!(
                "peer {} says: second-phase commitment opening failure by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, Fault::ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        let range_stmt = range::StatementWc {
            stmt: range::Statement {
                prover_id: from,
                ciphertext: &bcast.payload.e_i,
                ek,
                range_exp: 1,
            },
            msg_g: bcast.payload.R_i.as_ref(),
            g: &g,
        };
        let mult_stmt = mult::Statement {
            prover_id: from,
            ciphertext1: &state.r3state.u,
            ciphertext2: &bcast.payload.e_i,
            ciphertext3: &bcast.payload.w_i,
            ek,
        };
        if !zk.verify_range_proof_wc(&range_stmt, &bcast.range_proof)
            || !mult_stmt.verify(&bcast.mult_proof)
        {
            warn!(
                "peer {} says: invalid second-phase proof by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, Fault::ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        payloads.push(Some(bcast.payload));
    }

    let mut R = k256::ProjectivePoint::IDENTITY;
    let mut w: Option<Ciphertext> = None;
    for payload in payloads.iter().flatten() {
        R += payload.R_i.as_ref();
        w = Some(match w {
            None => payload.w_i.clone(),
            Some(acc) => ek.add(&acc, &payload.w_i)?,
        });
    }
    let w = w.ok_or(CryptoError::ProtocolAbort("no valid second-phase payloads"))?;

    let r = point_x_scalar(&R).ok_or(CryptoError::ProtocolAbort("degenerate aggregate nonce"))?;

    let mu = info.key_share().partial_decrypt(info.group().pubkey(), &w)?;
    let proof = decryption::Statement {
        ciphertext: &w,
        partial: &mu,
        pubkey: info.group().pubkey(),
    }
    .prove(&mut rand::thread_rng(), info.key_share());

    Ok((
        R5State {
            r,
            u: state.r3state.u,
            v: state.r3state.v,
            w,
        },
        encode(&Bcast5 { mu, proof })?,
    ))
}

fn r6_execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: R5State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(R6State, BytesVec)> {
    let ek = info.group().pubkey().ek();
    let pubkey = info.group().pubkey();

    let mus = parse_bcasts::<Bcast5>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| (bcast.mu, bcast.proof)));
    let mus = validate_decryptions(info, faulters, &state.w, mus)?;

    // ψ = µ⁻¹ mod q
    let psi = match pubkey.combine(&mus) {
        Ok(mu) => match Option::<k256::Scalar>::from(mu.to_scalar().invert()) {
            Some(psi) => psi,
            None => return Err(CryptoError::ProtocolAbort("nonce mask not invertible")),
        },
        Err(CryptoError::DuplicateShare(id)) => return Err(CryptoError::DuplicateShare(id)),
        Err(err) => {
            warn!(
                "peer {} says: nonce recombination failed [{}], continuing aborted",
                info.my_id(),
                err
            );
            k256::Scalar::ONE
        }
    };

    // σ = ψ · (m′·u + r·v) = Enc(ψ ρ (m′ + r x))
    let sigma_ciphertext = ek.mul(
        &ek.add(
            &ek.mul(&state.u, &Plaintext::from_scalar(info.msg()))?,
            &ek.mul(&state.v, &Plaintext::from_scalar(&state.r))?,
        )?,
        &Plaintext::from_scalar(&psi),
    )?;

    let sigma = info.key_share().partial_decrypt(pubkey, &sigma_ciphertext)?;
    let proof = decryption::Statement {
        ciphertext: &sigma_ciphertext,
        partial: &sigma,
        pubkey,
    }
    .prove(&mut rand::thread_rng(), info.key_share());

    Ok((
        R6State {
            r: state.r,
            sigma_ciphertext,
        },
        encode(&Bcast6 { sigma, proof })?,
    ))
}

fn finish(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: R6State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<SignOutput> {
    let sigmas = parse_bcasts::<Bcast6>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| (bcast.sigma, bcast.proof)));
    let sigmas = validate_decryptions(info, faulters, &state.sigma_ciphertext, sigmas)?;

    let s = match info.group().pubkey().combine(&sigmas) {
        Ok(s) => s.to_scalar(),
        Err(CryptoError::DuplicateShare(id)) => return Err(CryptoError::DuplicateShare(id)),
        Err(err) => {
            warn!(
                "peer {} says: signature recombination failed [{}]",
                info.my_id(),
                err
            );
            k256::Scalar::ONE
        }
    };

    assemble_signature(info, faulters, &state.r, &s)
}

/// Keep the partial decryptions whose senders used their dealt share id and
/// whose proofs of correct decryption verify against `ciphertext`.
fn validate_decryptions(
    info: &SignInfo,
    faulters: &mut Faulters,
    ciphertext: &Ciphertext,
    partials_in: VecMap<SignPartyId, Option<(PartialDecryption, decryption::Proof)>>,
) -> CryptoResult<Vec<PartialDecryption>> {
    let pubkey = info.group().pubkey();

    let mut partials = Vec::with_capacity(info.party_count());
    for (from, entry) in partials_in.into_iter() {
        let (partial, proof) = match entry {
            Some(entry) => entry,
            None => continue,
        };
        if faulters.get(from)?.is_some() {
            continue;
        }
        if partial.id() != info.share_id(from)? {
            warn!(
                "peer {} says: peer {} sent a partial decryption under share id {}",
                info.my_id(),
                from,
                partial.id()
            );
            faulters.set(from, Fault::ProtocolFault)?;
            continue;
        }
        let stmt = decryption::Statement {
            ciphertext,
            partial: &partial,
            pubkey,
        };
        if from != info.my_id() && !stmt.verify(&proof) {
            warn!(
                "peer {} says: invalid decryption proof by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, Fault::ProtocolFault)?;
            continue;
        }
        partials.push(partial);
    }
    Ok(partials)
}

fn aggregate_pairs<'a>(
    ek: &EncryptionKey,
    pairs: impl Iterator<Item = (&'a Ciphertext, &'a Ciphertext)>,
) -> CryptoResult<(Ciphertext, Ciphertext)> {
    let mut u: Option<Ciphertext> = None;
    let mut v: Option<Ciphertext> = None;
    for (u_i, v_i) in pairs {
        u = Some(match u {
            None => u_i.clone(),
            Some(acc) => ek.add(&acc, u_i)?,
        });
        v = Some(match v {
            None => v_i.clone(),
            Some(acc) => ek.add(&acc, v_i)?,
        });
    }
    match (u, v) {
        (Some(u), Some(v)) => Ok((u, v)),
        _ => Err(CryptoError::ProtocolAbort("no valid first-phase payloads")),
    }
}

#[cfg(any(test, feature = "malicious"))]
fn corrupt_enc_proof(info: &SignInfo, proof: encryption::Proof) -> encryption::Proof {
    if let Behaviour::R2BadProof = info.behaviour {
        log_confess_info(info.my_id(), &info.behaviour, "plain variant");
        return encryption::malicious::corrupt_proof(&proof);
    }
    proof
}

#[cfg(any(test, feature = "malicious"))]
fn corrupt_wc_proof(info: &SignInfo, proof: range::ProofWc) -> range::ProofWc {
    if let Behaviour::R4BadProof = info.behaviour {
        log_confess_info(info.my_id(), &info.behaviour, "plain variant");
        return range::malicious::corrupt_proof_wc(&proof);
    }
    proof
}
