use serde::{Deserialize, Serialize};

use crate::{
    collections::VecMap,
    crypto_tools::{
        commit::{Commitment, Opening},
        paillier::zk::range,
    },
    sdk::{
        api::{BytesVec, CryptoResult},
        wire_bytes::encode,
    },
};

use super::{
    api::{parse_bcasts, Faulters, SignInfo, SignPartyId},
    r1,
};

#[cfg(any(test, feature = "malicious"))]
use super::malicious::{log_confess_info, Behaviour};

/// Round-2 broadcast: the opened payload plus the composite range-relation
/// proof binding `R_i`, `u_i`, `v_i`, `w_i` to the committed secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Bcast {
    pub(super) payload: r1::Payload,
    pub(super) opening: Opening,
    pub(super) proof: Proof,
}

/// One range proof per encrypted nonce: `ρ_i` and `k_i` lie in `[0, q)` with
/// `k_i` additionally bound to `R_i = k_i·G`, and the mask `c_i` lies in
/// `[0, q^6)`. Each sub-proof runs over the folded Paillier form of the
/// level-1 ciphertext, so it also binds the underlying blinding randomness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Proof {
    pub(super) rho: range::Proof,
    pub(super) k: range::ProofWc,
    pub(super) c: range::Proof,
}

pub(super) struct State {
    pub(super) r1state: r1::State,
    pub(super) coms: VecMap<SignPartyId, Option<Commitment>>,
}

pub(super) fn execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    r1state: r1::State,
    msgs_in: crate::collections::FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(State, BytesVec)> {
    // stash every peer's commitment for the opening checks of round 3
    let coms = parse_bcasts::<r1::Bcast>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| bcast.com));

    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();
    let g = k256::ProjectivePoint::GENERATOR;

    let u_paillier = r1state.payload.u_i.to_paillier(ek)?;
    let v_paillier = r1state.payload.v_i.to_paillier(ek)?;
    let w_paillier = r1state.payload.w_i.to_paillier(ek)?;

    let rho = zk.range_proof(
        rng,
        &range::Statement {
            prover_id: info.my_id(),
            ciphertext: &u_paillier,
            ek,
            range_exp: 1,
        },
        &range::Witness {
            msg: &r1state.rho_i,
            randomness: &r1state.u_randomness,
        },
    );

    let k = zk.range_proof_wc(
        rng,
        &range::StatementWc {
            stmt: range::Statement {
                prover_id: info.my_id(),
                ciphertext: &v_paillier,
                ek,
                range_exp: 1,
            },
            msg_g: r1state.payload.R_i.as_ref(),
            g: &g,
        },
        &range::Witness {
            msg: &r1state.k_i,
            randomness: &r1state.v_randomness,
        },
    )?;

    let c = zk.range_proof(
        rng,
        &range::Statement {
            prover_id: info.my_id(),
            ciphertext: &w_paillier,
            ek,
            range_exp: 6,
        },
        &range::Witness {
            msg: &r1state.c_i,
            randomness: &r1state.w_randomness,
        },
    );

    let proof = Proof { rho, k, c };
    corrupt!(proof, corrupt_proof(info, proof));

    let payload = r1state.payload.clone();
    corrupt!(payload, corrupt_payload(info, payload));

    let bcast = encode(&Bcast {
        payload,
        opening: r1state.opening.clone(),
        proof,
    })?;

    Ok((State { r1state, coms }, bcast))
}

#[cfg(any(test, feature = "malicious"))]
fn corrupt_proof(info: &SignInfo, proof: Proof) -> Proof {
    if let Behaviour::R2BadProof = info.behaviour {
        log_confess_info(info.my_id(), &info.behaviour, "");
        return Proof {
            rho: range::malicious::corrupt_proof(&proof.rho),
            ..proof
        };
    }
    proof
}

#[cfg(any(test, feature = "malicious"))]
fn corrupt_payload(info: &SignInfo, mut payload: r1::Payload) -> r1::Payload {
    if let Behaviour::R2BadOpen = info.behaviour {
        log_confess_info(info.my_id(), &info.behaviour, "mutate rho encryption");
        payload.u_i.corrupt();
    }
    payload
}
