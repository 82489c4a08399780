use tracing::info;

use crate::collections::TypedUsize;

use super::SignPartyId;

// all malicious behaviours
// names have the form <round><fault> where
// <round> indicates the round where the tampering occurs, and
// <fault> is a description
#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
    Honest,
    /// corrupt the round-2 zero-knowledge proof
    R2BadProof,
    /// open the round-1 commitment with a mutated secret
    R2BadOpen,
    /// corrupt the second-phase proof of the six-round variant
    R4BadProof,
}

impl Behaviour {
    pub fn is_honest(&self) -> bool {
        matches!(self, Self::Honest)
    }
}

pub(crate) fn log_confess_info(sign_id: TypedUsize<SignPartyId>, behaviour: &Behaviour, msg: &str) {
    if msg.is_empty() {
        info!("malicious peer {} does {:?}", sign_id, behaviour);
    } else {
        info!("malicious peer {} does {:?} [{}]", sign_id, behaviour, msg);
    }
}
