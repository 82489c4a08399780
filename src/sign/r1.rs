use k256::elliptic_curve::Field;
use serde::{Deserialize, Serialize};

use crate::{
    crypto_tools::{
        commit::{Commitment, Opening},
        k256_serde,
        l2fhe::Ciphertext1,
        paillier::{secp256k1_modulus_pow, Plaintext, Randomness},
    },
    sdk::{
        api::{BytesVec, CryptoResult},
        wire_bytes::encode,
    },
};

use super::api::SignInfo;

/// Round-1 broadcast: a non-malleable commitment to this party's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Bcast {
    pub(super) com: Commitment,
}

/// The committed secrets, revealed in round 2:
/// `R_i = k_i·G` and level-1 encryptions of `ρ_i`, `k_i`, and the mask `c_i`.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Payload {
    pub(super) R_i: k256_serde::ProjectivePoint,
    pub(super) u_i: Ciphertext1,
    pub(super) v_i: Ciphertext1,
    pub(super) w_i: Ciphertext1,
}

pub(super) struct State {
    pub(super) rho_i: Plaintext,
    pub(super) k_i: Plaintext,
    pub(super) c_i: Plaintext,
    pub(super) u_randomness: Randomness,
    pub(super) v_randomness: Randomness,
    pub(super) w_randomness: Randomness,
    pub(super) payload: Payload,
    pub(super) opening: Opening,
}

#[allow(non_snake_case)]
pub(super) fn start(info: &SignInfo) -> CryptoResult<(State, BytesVec)> {
    let rng = &mut rand::thread_rng();
    let ek = info.group().pubkey().ek();

    // sample ρ_i, k_i from Z_q and the decryption mask c_i from Z_(q^6)
    let rho_i = Plaintext::from_scalar(&k256::Scalar::random(&mut *rng));
    let k_i = Plaintext::from_scalar(&k256::Scalar::random(&mut *rng));
    let c_i = Plaintext::generate_with_rng(rng, &secp256k1_modulus_pow(6));

    let R_i = k256::ProjectivePoint::GENERATOR * k_i.to_scalar();

    let (u_i, u_randomness) = ek.encrypt1(rng, &rho_i)?;
    let (v_i, v_randomness) = ek.encrypt1(rng, &k_i)?;
    let (w_i, w_randomness) = ek.encrypt1(rng, &c_i)?;

    let payload = Payload {
        R_i: R_i.into(),
        u_i,
        v_i,
        w_i,
    };

    let (com, opening) = info
        .group()
        .commit_key()
        .commit(rng, &crate::sdk::api::serialize(&payload)?);

    let bcast = encode(&Bcast { com })?;

    Ok((
        State {
            rho_i,
            k_i,
            c_i,
            u_randomness,
            v_randomness,
            w_randomness,
            payload,
            opening,
        },
        bcast,
    ))
}
