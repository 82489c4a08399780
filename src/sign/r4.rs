use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    collections::{FillVecMap, VecMap},
    crypto_tools::{l2fhe::threshold::PartialDecryption2, paillier::Plaintext},
    sdk::{
        api::{BytesVec, CryptoError, CryptoResult, Fault::ProtocolFault},
        wire_bytes::encode,
    },
};

use super::{
    api::{assemble_signature, parse_bcasts, Faulters, SignInfo, SignOutput, SignPartyId},
    r3,
};

/// Round-4 broadcast: this party's partial decryption of the signature
/// ciphertext `σ`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Bcast {
    pub(super) sigma: PartialDecryption2,
}

pub(super) struct State {
    pub(super) r: k256::Scalar,
}

pub(super) fn execute(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: r3::State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<(State, BytesVec)> {
    let ek = info.group().pubkey().ek();
    let pubkey = info.group().pubkey();

    let etas = parse_bcasts::<r3::Bcast>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| bcast.eta));
    let etas = validate_partials(info, faulters, etas)?;

    // η = c·q + ρ·k mod q = ρ·k mod q; ψ = η⁻¹
    let psi = match pubkey.combine2(&etas) {
        Ok(eta) => match Option::<k256::Scalar>::from(eta.to_scalar().invert()) {
            Some(psi) => psi,
            None => {
                return Err(CryptoError::ProtocolAbort("nonce mask not invertible"));
            }
        },
        Err(CryptoError::DuplicateShare(id)) => {
            // duplicate ids in a combine step are fatal
            return Err(CryptoError::DuplicateShare(id));
        }
        Err(err) => {
            // not enough usable shares: the faulters are already marked, so
            // keep the message flow alive with a placeholder
            warn!(
                "peer {} says: nonce recombination failed [{}], continuing aborted",
                info.my_id(),
                err
            );
            k256::Scalar::ONE
        }
    };

    // σ = ψ · ( u · (Enc₁(m′) + r · Enc₁(x)) ): the one level-2
    // multiplication of the protocol, by the aggregate nonce blinder u
    let bracket = ek.add1(
        &ek.encrypt1_public(&Plaintext::from_scalar(info.msg()))?,
        &ek.mul1(
            info.group().encrypted_signing_key_l1(),
            &Plaintext::from_scalar(&state.r),
        )?,
    )?;
    let sigma_ciphertext = ek.mul2(
        &ek.mult1(&state.u, &bracket)?,
        &Plaintext::from_scalar(&psi),
    )?;

    let sigma = info.key_share().partial_decrypt2(pubkey, &sigma_ciphertext)?;

    Ok((State { r: state.r }, encode(&Bcast { sigma })?))
}

pub(super) fn finish(
    info: &SignInfo,
    faulters: &mut Faulters,
    state: State,
    msgs_in: FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<SignOutput> {
    let sigmas = parse_bcasts::<Bcast>(info.my_id(), faulters, &msgs_in)?
        .map(|bcast| bcast.map(|bcast| bcast.sigma));
    let sigmas = validate_partials(info, faulters, sigmas)?;

    let s = match info.group().pubkey().combine2(&sigmas) {
        Ok(s) => s.to_scalar(),
        Err(CryptoError::DuplicateShare(id)) => {
            return Err(CryptoError::DuplicateShare(id));
        }
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

/// Keep the level-2 partial decryptions whose senders used the share id
/// they were dealt; anything else marks the sender faulty.
fn validate_partials(
    info: &SignInfo,
    faulters: &mut Faulters,
    partials_in: VecMap<SignPartyId, Option<PartialDecryption2>>,
) -> CryptoResult<Vec<PartialDecryption2>> {
    let mut partials = Vec::with_capacity(info.party_count());
    for (from, partial) in partials_in.into_iter() {
        let partial = match partial {
            Some(partial) => partial,
            None => continue,
        };
        // discard shares from parties already marked faulty
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
            faulters.set(from, ProtocolFault)?;
            continue;
        }
        partials.push(partial);
    }
    Ok(partials)
}
