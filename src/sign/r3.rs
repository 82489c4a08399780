use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    collections::{FillVecMap, TypedUsize},
    crypto_tools::{
        k256_serde::point_x_scalar,
        l2fhe::{threshold::PartialDecryption2, Ciphertext1},
        paillier::{secp256k1_modulus, zk::range, Plaintext},
    },
    sdk::{
        api::{serialize, BytesVec, CryptoError, CryptoResult, Fault::ProtocolFault},
        wire_bytes::encode,
    },
};

use super::{
    api::{parse_bcasts, Faulters, SignInfo, SignPartyId},
    r1, r2,
};

/// Round-3 broadcast: this party's partial decryption of the masked nonce
/// product `z = w·q + u·v`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Bcast {
    pub(super) eta: PartialDecryption2,
}

pub(super) struct State {
    /// `r = R.x mod q`
    pub(super) r: k256::Scalar,
    /// aggregate `u = Σ u_j`, the encrypted nonce blinder
    pub(super) u: Ciphertext1,
}

#[allow(non_snake_case)]
pub(super) fn execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: r2::State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(State, BytesVec)> {
    let ek = info.group().pubkey().ek();
    let commit_key = info.group().commit_key();

    let bcasts = parse_bcasts::<r2::Bcast>(info.my_id(), faulters, &msgs_in)?;

    // Match round-1 commitments to round-2 openings positionally and verify
    // every peer's proof. A failure marks the peer faulty; the round still
    // runs to completion so this party keeps producing messages.
    let mut payloads: Vec<Option<r1::Payload>> = Vec::with_capacity(info.party_count());
    for (from, bcast) in bcasts.into_iter() {
        if from == info.my_id() {
            payloads.push(Some(state.r1state.payload.clone()));
            continue;
        }

        let bcast = match bcast {
            Some(bcast) => bcast,
            None => {
                payloads.push(None); // already marked faulty by parse_bcasts
                continue;
            }
        };

        let com = match state.coms.get(from)? {
            Some(com) => com,
            None => {
                payloads.push(None); // already marked faulty in round 2
                continue;
            }
        };

        if !commit_key.verify(com, &serialize(&bcast.payload)?, &bcast.opening) {
            warn!(
                "peer {} says: commitment opening failure by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        if !verify_peer_proof(info, from, &bcast.payload, &bcast.proof) {
            warn!(
                "peer {} says: invalid round-2 proof by peer {}",
                info.my_id(),
                from
            );
            faulters.set(from, ProtocolFault)?;
            payloads.push(None);
            continue;
        }

        payloads.push(Some(bcast.payload));
    }

    // Aggregate R = Σ R_j, u = Σ u_j, v = Σ v_j, w = Σ w_j over the payloads
    // that survived verification.
    let mut R = k256::ProjectivePoint::IDENTITY;
    let mut u: Option<Ciphertext1> = None;
    let mut v: Option<Ciphertext1> = None;
    let mut w: Option<Ciphertext1> = None;
    for payload in payloads.iter().flatten() {
        R += payload.R_i.as_ref();
        u = add_agg(ek, u, &payload.u_i)?;
        v = add_agg(ek, v, &payload.v_i)?;
        w = add_agg(ek, w, &payload.w_i)?;
    }
    let (u, v, w) = match (u, v, w) {
        (Some(u), Some(v), Some(w)) => (u, v, w),
        _ => return Err(CryptoError::ProtocolAbort("no valid round-2 payloads")),
    };

    let r = point_x_scalar(&R).ok_or(CryptoError::ProtocolAbort("degenerate aggregate nonce"))?;

    // z = (w · q) + (u · v)
    let wq = ek.mul1(&w, &Plaintext(secp256k1_modulus()))?;
    let z = ek.add1_2(&wq, &ek.mult1(&u, &v)?)?;

    let eta = info
        .key_share()
        .partial_decrypt2(info.group().pubkey(), &z)?;

    Ok((State { r, u }, encode(&Bcast { eta })?))
}

fn add_agg(
    ek: &crate::crypto_tools::paillier::EncryptionKey,
    acc: Option<Ciphertext1>,
    next: &Ciphertext1,
) -> CryptoResult<Option<Ciphertext1>> {
    Ok(Some(match acc {
        None => next.clone(),
        Some(acc) => ek.add1(&acc, next)?,
    }))
}

/// Check a peer's composite round-2 proof against its opened payload.
/// Any domain failure (unfoldable ciphertext, off-curve point) is a proof
/// failure, not an error.
fn verify_peer_proof(
    info: &SignInfo,
    from: TypedUsize<SignPartyId>,
    payload: &r1::Payload,
    proof: &r2::Proof,
) -> bool {
    let ek = info.group().pubkey().ek();
    let zk = info.group().zk_setup();
    let g = k256::ProjectivePoint::GENERATOR;

    let (u_paillier, v_paillier, w_paillier) = match (
        payload.u_i.to_paillier(ek),
        payload.v_i.to_paillier(ek),
        payload.w_i.to_paillier(ek),
    ) {
        (Ok(u), Ok(v), Ok(w)) => (u, v, w),
        _ => {
            warn!("peer {} says: unfoldable ciphertext from {}", info.my_id(), from);
            return false;
        }
    };

    zk.verify_range_proof(
        &range::Statement {
            prover_id: from,
            ciphertext: &u_paillier,
            ek,
            range_exp: 1,
        },
        &proof.rho,
    ) && zk.verify_range_proof_wc(
        &range::StatementWc {
            stmt: range::Statement {
                prover_id: from,
                ciphertext: &v_paillier,
                ek,
                range_exp: 1,
            },
            msg_g: payload.R_i.as_ref(),
            g: &g,
        },
        &proof.k,
    ) && zk.verify_range_proof(
        &range::Statement {
            prover_id: from,
            ciphertext: &w_paillier,
            ek,
            range_exp: 6,
        },
        &proof.c,
    )
}
