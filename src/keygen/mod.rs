//! Trusted-dealer key generation for a signing group: a threshold Paillier
//! key split across the parties, the auxiliary range-proof parameters, the
//! commitment master key, and an encryption of a freshly sampled ECDSA
//! signing key that no party ever sees in the clear.
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::constants::{CURVE_ORDER_SIZE, SIGNING_MODULUS_MIN_FACTOR};
use crate::crypto_tools::{
    commit::MasterKey,
    k256_serde,
    l2fhe::Ciphertext1,
    paillier::{
        threshold::{dealer_keygen, dealer_keygen_unsafe, KeyShare, ThresholdPublicKey},
        zk::ZkSetup,
        Ciphertext, Plaintext,
    },
};
use crate::sdk::api::{CryptoError, CryptoResult};

/// final output of keygen: distribute one per party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretKeyShare {
    group: GroupPublicInfo,
    share: ShareSecretInfo,
}

/// `GroupPublicInfo` is the same for all parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPublicInfo {
    pubkey: ThresholdPublicKey,
    zk_setup: ZkSetup,
    commit_key: MasterKey,
    y: k256_serde::ProjectivePoint,
    x_l1: Ciphertext1,
    x_ct: Ciphertext,
}

/// `ShareSecretInfo` is unique to each party.
/// The id is not secret but it's stored here anyway
/// because it travels with the secret share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct ShareSecretInfo {
    key_share: KeyShare,
}

impl GroupPublicInfo {
    pub fn pubkey(&self) -> &ThresholdPublicKey {
        &self.pubkey
    }

    pub fn zk_setup(&self) -> &ZkSetup {
        &self.zk_setup
    }

    pub fn commit_key(&self) -> &MasterKey {
        &self.commit_key
    }

    /// The group's ECDSA verifying key `y = x·G`
    pub fn y(&self) -> &k256_serde::ProjectivePoint {
        &self.y
    }

    /// SEC1-encoded group verifying key
    pub fn encoded_pubkey(&self) -> [u8; 33] {
        self.y.to_bytes()
    }

    /// Level-1 encryption of the signing key, consumed by the four-round
    /// signing protocol
    pub fn encrypted_signing_key_l1(&self) -> &Ciphertext1 {
        &self.x_l1
    }

    /// Plain Paillier encryption of the signing key, consumed by the
    /// six-round signing protocol
    pub fn encrypted_signing_key(&self) -> &Ciphertext {
        &self.x_ct
    }
}

impl ShareSecretInfo {
    /// This party's share id, the polynomial evaluation point in `{1..l}`
    pub fn index(&self) -> usize {
        self.key_share.id()
    }

    pub(crate) fn key_share(&self) -> &KeyShare {
        &self.key_share
    }
}

impl SecretKeyShare {
    pub fn group(&self) -> &GroupPublicInfo {
        &self.group
    }

    pub fn share(&self) -> &ShareSecretInfo {
        &self.share
    }
}

/// Deal a `(w, l)` signing group over safe primes of `prime_bits` bits.
pub fn new_signing_group(
    rng: &mut (impl CryptoRng + RngCore),
    prime_bits: usize,
    share_count: usize,
    threshold: usize,
) -> CryptoResult<Vec<SecretKeyShare>> {
    let (pubkey, shares) = dealer_keygen(rng, prime_bits, share_count, threshold)?;
    let zk_setup = ZkSetup::new(rng, prime_bits)?;
    assemble(rng, pubkey, shares, zk_setup)
}

/// unsafe because key pairs do not use safe primes
pub fn new_signing_group_unsafe(
    rng: &mut (impl CryptoRng + RngCore),
    prime_bits: usize,
    share_count: usize,
    threshold: usize,
) -> CryptoResult<Vec<SecretKeyShare>> {
    let (pubkey, shares) = dealer_keygen_unsafe(rng, prime_bits, share_count, threshold)?;
    let zk_setup = ZkSetup::new_unsafe(rng, prime_bits)?;
    assemble(rng, pubkey, shares, zk_setup)
}

fn assemble(
    rng: &mut (impl CryptoRng + RngCore),
    pubkey: ThresholdPublicKey,
    shares: Vec<KeyShare>,
    zk_setup: ZkSetup,
) -> CryptoResult<Vec<SecretKeyShare>> {
    // the signing protocol's intermediate integers must not wrap mod n
    if pubkey.ek().bit_length() <= SIGNING_MODULUS_MIN_FACTOR * CURVE_ORDER_SIZE {
        return Err(CryptoError::DomainViolation(
            "Paillier modulus too small for signing",
        ));
    }

    let commit_key = MasterKey::new(rng);

    let x = k256_serde::SecretScalar::random(&mut *rng);
    let y = k256_serde::ProjectivePoint::from(&x);

    let x_plaintext = Plaintext::from_scalar(x.as_ref());
    let (x_l1, _) = pubkey.ek().encrypt1(rng, &x_plaintext)?;
    let (x_ct, _) = pubkey.ek().encrypt(rng, &x_plaintext)?;

    let group = GroupPublicInfo {
        pubkey,
        zk_setup,
        commit_key,
        y,
        x_l1,
        x_ct,
    };

    Ok(shares
        .into_iter()
        .map(|key_share| SecretKeyShare {
            group: group.clone(),
            share: ShareSecretInfo { key_share },
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto_tools::l2fhe::threshold::PartialDecryption1;
    use std::sync::OnceLock;

    /// Dealing a signing group costs several large primes, so share one
    /// fixture across every signing test.
    pub(crate) fn test_signing_group() -> &'static Vec<SecretKeyShare> {
        static GROUP: OnceLock<Vec<SecretKeyShare>> = OnceLock::new();
        GROUP.get_or_init(|| {
            new_signing_group_unsafe(&mut rand::thread_rng(), 1152, 15, 3).unwrap()
        })
    }

    #[test]
    fn group_consistency() {
        let key_shares = test_signing_group();
        assert_eq!(key_shares.len(), 15);

        let group = key_shares[0].group();
        for (i, key_share) in key_shares.iter().enumerate() {
            assert_eq!(key_share.group(), group);
            assert_eq!(key_share.share().index(), i + 1);
        }

        // the encrypted signing key matches the public key:
        // threshold-decrypt x and check y = x·G
        let partials: Vec<PartialDecryption1> = key_shares[..3]
            .iter()
            .map(|key_share| {
                key_share
                    .share()
                    .key_share()
                    .partial_decrypt1(group.pubkey(), group.encrypted_signing_key_l1())
                    .unwrap()
            })
            .collect();
        let x = group.pubkey().combine1(&partials).unwrap();
        let y = k256::ProjectivePoint::GENERATOR * x.to_scalar();
        assert_eq!(&y, group.y().as_ref());

        // both encodings of the signing key agree
        let partials: Vec<_> = key_shares[4..7]
            .iter()
            .map(|key_share| {
                key_share
                    .share()
                    .key_share()
                    .partial_decrypt(group.pubkey(), group.encrypted_signing_key())
                    .unwrap()
            })
            .collect();
        let x2 = group.pubkey().combine(&partials).unwrap();
        assert_eq!(x.to_scalar(), x2.to_scalar());
    }

    #[test]
    fn modulus_size_enforced() {
        // 512-bit primes make n ≈ 1024 bits < q^8
        assert_eq!(
            new_signing_group_unsafe(&mut rand::thread_rng(), 512, 3, 2).unwrap_err(),
            CryptoError::DomainViolation("Paillier modulus too small for signing")
        );
    }
}
