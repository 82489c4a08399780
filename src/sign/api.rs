use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::{
    collections::{FillVecMap, TypedUsize, VecMap},
    constants::{CURVE_ORDER_SIZE, SIGNING_MODULUS_MIN_FACTOR},
    crypto_tools::paillier::threshold::KeyShare,
    keygen::{GroupPublicInfo, ShareSecretInfo},
    sdk::{
        api::{BytesVec, CryptoError, CryptoResult, Fault},
        wire_bytes::decode,
    },
};

#[cfg(any(test, feature = "malicious"))]
use super::malicious::Behaviour;

pub use crate::crypto_tools::k256_serde::Signature;
pub use crate::crypto_tools::message_digest::MessageDigest;

use super::{r1, r2, r3, r4};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignPartyId;

/// Faults detected during a signature attempt, by party position.
pub type Faulters = FillVecMap<SignPartyId, Fault>;

/// A signature, or the reasons this party yields none.
pub type SignOutput = Result<Signature, Faulters>;

/// Everything that stays fixed for one party across all rounds.
pub(super) struct SignInfo {
    my_id: TypedUsize<SignPartyId>,
    share_ids: VecMap<SignPartyId, usize>,
    group: GroupPublicInfo,
    key_share: KeyShare,
    msg: k256::Scalar,

    #[cfg(any(test, feature = "malicious"))]
    pub(super) behaviour: Behaviour,
}

impl SignInfo {
    pub(super) fn my_id(&self) -> TypedUsize<SignPartyId> {
        self.my_id
    }

    pub(super) fn party_count(&self) -> usize {
        self.share_ids.len()
    }

    /// The keygen share id expected at a given party position
    pub(super) fn share_id(&self, party: TypedUsize<SignPartyId>) -> CryptoResult<usize> {
        Ok(*self.share_ids.get(party)?)
    }

    pub(super) fn group(&self) -> &GroupPublicInfo {
        &self.group
    }

    pub(super) fn key_share(&self) -> &KeyShare {
        &self.key_share
    }

    pub(super) fn msg(&self) -> &k256::Scalar {
        &self.msg
    }
}

/// Per-message, per-party signer for the four-round protocol. Each round
/// consumes the bag of peer broadcasts from the previous round (positional,
/// in canonical party order, own slot included) and produces this party's
/// next broadcast. A failed peer check marks that peer faulty; the signer
/// keeps producing messages so the network shape is preserved, and yields
/// no signature at the end.
pub struct Signer {
    pub(super) info: SignInfo,
    pub(super) faulters: Faulters,
    state: State,
}

enum State {
    Round1,
    Round2(r1::State),
    Round3(r2::State),
    Round4(r3::State),
    Finish(r4::State),
    Done,
}

/// Initialize a new signing party.
/// `signer_share_ids` lists the keygen share ids of all participating
/// parties in canonical order; this party's own id must be among them.
pub fn new_sign(
    group: &GroupPublicInfo,
    share: &ShareSecretInfo,
    signer_share_ids: &[usize],
    msg_to_sign: &MessageDigest,
    #[cfg(any(test, feature = "malicious"))] behaviour: Behaviour,
) -> CryptoResult<Signer> {
    let info = new_info(
        group,
        share,
        signer_share_ids,
        msg_to_sign,
        #[cfg(any(test, feature = "malicious"))]
        behaviour,
    )?;
    let party_count = info.party_count();
    Ok(Signer {
        info,
        faulters: FillVecMap::with_size(party_count),
        state: State::Round1,
    })
}

pub(super) fn new_info(
    group: &GroupPublicInfo,
    share: &ShareSecretInfo,
    signer_share_ids: &[usize],
    msg_to_sign: &MessageDigest,
    #[cfg(any(test, feature = "malicious"))] behaviour: Behaviour,
) -> CryptoResult<SignInfo> {
    let share_ids = validate_signer_ids(group, signer_share_ids)?;

    let my_id = share_ids
        .iter()
        .find(|(_, &id)| id == share.index())
        .map(|(sign_id, _)| sign_id)
        .ok_or(CryptoError::KeyMismatch("my share is not among the signers"))?;

    // the protocol's intermediate integers must not wrap mod n
    if group.pubkey().ek().bit_length() <= SIGNING_MODULUS_MIN_FACTOR * CURVE_ORDER_SIZE {
        return Err(CryptoError::DomainViolation(
            "Paillier modulus too small for signing",
        ));
    }

    Ok(SignInfo {
        my_id,
        share_ids,
        group: group.clone(),
        key_share: share.key_share().clone(),
        msg: msg_to_sign.into(),

        #[cfg(any(test, feature = "malicious"))]
        behaviour,
    })
}

/// Build `(r, s)` from the recombined scalars, low-S normalize, and
/// self-check against the group verifying key. Shared by both protocol
/// variants.
pub(super) fn assemble_signature(
    info: &SignInfo,
    faulters: &mut Faulters,
    r: &k256::Scalar,
    s: &k256::Scalar,
) -> CryptoResult<SignOutput> {
    use ecdsa::hazmat::VerifyPrimitive;
    use tracing::error;

    if !faulters.is_empty() {
        return Ok(Err(faulters.clone()));
    }

    let signature = match k256::ecdsa::Signature::from_scalars(r.to_bytes(), s.to_bytes()) {
        Ok(signature) => signature,
        Err(_) => {
            return Err(CryptoError::ProtocolAbort("malformed signature scalars"));
        }
    };

    // low-S normalize so strict verifiers accept the signature
    let signature = signature.normalize_s().unwrap_or(signature);

    // self-check the assembled signature before releasing it
    let verifying_point = info.group().y().as_ref().to_affine();
    if verifying_point
        .verify_prehashed(&info.msg().to_bytes(), &signature)
        .is_err()
    {
        error!(
            "peer {} says: invalid assembled signature with no faulters identified",
            info.my_id()
        );
        for party in 0..info.party_count() {
            faulters.set(TypedUsize::from_usize(party), Fault::ProtocolFault)?;
        }
        return Ok(Err(faulters.clone()));
    }

    Ok(Ok(signature.into()))
}

pub(super) fn validate_signer_ids(
    group: &GroupPublicInfo,
    signer_share_ids: &[usize],
) -> CryptoResult<VecMap<SignPartyId, usize>> {
    let pubkey = group.pubkey();

    if signer_share_ids.len() < pubkey.threshold() {
        return Err(CryptoError::InsufficientShares {
            got: signer_share_ids.len(),
            need: pubkey.threshold(),
        });
    }

    let mut seen = vec![false; pubkey.share_count()];
    for &id in signer_share_ids {
        if id < 1 || id > pubkey.share_count() {
            return Err(CryptoError::DomainViolation("signer share id out of range"));
        }
        if seen[id - 1] {
            return Err(CryptoError::DuplicateShare(id));
        }
        seen[id - 1] = true;
    }

    Ok(VecMap::from_vec(signer_share_ids.to_vec()))
}

impl Signer {
    /// Round 1: no input; broadcast a commitment to this party's fresh
    /// nonces and their encryptions.
    pub fn round1(&mut self) -> CryptoResult<BytesVec> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round1 => {
                let (state, bcast) = r1::start(&self.info)?;
                self.state = State::Round2(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 1 executed out of order")),
        }
    }

    /// Round 2: consume the round-1 commitments; broadcast the opening and
    /// the composite range-relation proof.
    pub fn round2(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round2(state) => {
                let (state, bcast) = r2::execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round3(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 2 executed out of order")),
        }
    }

    /// Round 3: verify every peer's opening and proof, aggregate, and
    /// broadcast this party's partial decryption of the masked nonce product.
    pub fn round3(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round3(state) => {
                let (state, bcast) = r3::execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Round4(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 3 executed out of order")),
        }
    }

    /// Round 4: recombine the nonce mask, form the signature ciphertext, and
    /// broadcast this party's partial decryption of it.
    pub fn round4(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<BytesVec> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Round4(state) => {
                let (state, bcast) = r4::execute(&self.info, &mut self.faulters, state, msgs_in)?;
                self.state = State::Finish(state);
                Ok(bcast)
            }
            _ => Err(CryptoError::ProtocolAbort("round 4 executed out of order")),
        }
    }

    /// Recombine the signature shares and output `(r, s)`, unless any check
    /// along the way marked a party faulty.
    pub fn finish(&mut self, msgs_in: FillVecMap<SignPartyId, BytesVec>) -> CryptoResult<SignOutput> {
        self.check_msgs_in(&msgs_in)?;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Finish(state) => r4::finish(&self.info, &mut self.faulters, state, msgs_in),
            _ => Err(CryptoError::ProtocolAbort("finish executed out of order")),
        }
    }

    /// True iff some earlier check failed and this party will yield no
    /// signature. The flag is never cleared.
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

/// Decode one round's broadcasts. A missing message counts against the peer
/// exactly like an invalid proof; a garbled one likewise.
pub(super) fn parse_bcasts<T: DeserializeOwned>(
    my_id: TypedUsize<SignPartyId>,
    faulters: &mut Faulters,
    msgs_in: &FillVecMap<SignPartyId, BytesVec>,
) -> CryptoResult<VecMap<SignPartyId, Option<T>>> {
    let mut out = Vec::with_capacity(msgs_in.size());
    for (from, bytes) in msgs_in.iter() {
        match bytes {
            None => {
                warn!("peer {} says: missing message from peer {}", my_id, from);
                faulters.set(from, Fault::MissingMessage)?;
                out.push(None);
            }
            Some(bytes) => match decode::<T>(bytes) {
                None => {
                    warn!("peer {} says: corrupted message from peer {}", my_id, from);
                    faulters.set(from, Fault::CorruptedMessage)?;
                    out.push(None);
                }
                Some(parsed) => out.push(Some(parsed)),
            },
        }
    }
    Ok(VecMap::from_vec(out))
}
