//! Threshold decryption of level-1 and level-2 ciphertexts: each Paillier
//! component is partially decrypted with the party's threshold share, and
//! recombination aggregates component by component.
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;

use crate::crypto_tools::paillier::{
    threshold::{KeyShare, PartialDecryption, ThresholdPublicKey},
    Plaintext,
};
use crate::sdk::api::{CryptoError, CryptoResult};

use super::{Ciphertext1, Ciphertext2};

/// Partial decryption of a level-1 ciphertext: the public offset plus a
/// partial decryption of β.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDecryption1 {
    pub(crate) a: BigNumber,
    pub(crate) beta: PartialDecryption,
}

/// Partial decryption of a level-2 ciphertext: partial decryptions of α and
/// of both components of every pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDecryption2 {
    pub(crate) alpha: PartialDecryption,
    pub(crate) pairs: Vec<(PartialDecryption, PartialDecryption)>,
}

impl PartialDecryption2 {
    pub fn id(&self) -> usize {
        self.alpha.id()
    }
}

impl KeyShare {
    pub fn partial_decrypt1(
        &self,
        pubkey: &ThresholdPublicKey,
        c: &Ciphertext1,
    ) -> CryptoResult<PartialDecryption1> {
        if !pubkey.ek().validate_ciphertext1(c) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        Ok(PartialDecryption1 {
            a: c.a.clone(),
            beta: self.partial_decrypt(pubkey, &c.beta)?,
        })
    }

    pub fn partial_decrypt2(
        &self,
        pubkey: &ThresholdPublicKey,
        c: &Ciphertext2,
    ) -> CryptoResult<PartialDecryption2> {
        if !pubkey.ek().validate_ciphertext2(c) {
            return Err(CryptoError::DomainViolation("invalid level-2 ciphertext"));
        }
        Ok(PartialDecryption2 {
            alpha: self.partial_decrypt(pubkey, &c.alpha)?,
            pairs: c
                .pairs
                .iter()
                .map(|(b0, b1)| {
                    Ok((
                        self.partial_decrypt(pubkey, b0)?,
                        self.partial_decrypt(pubkey, b1)?,
                    ))
                })
                .collect::<CryptoResult<Vec<_>>>()?,
        })
    }
}

impl ThresholdPublicKey {
    /// Recombine partial decryptions of the same level-1 ciphertext.
    pub fn combine1(&self, partials: &[PartialDecryption1]) -> CryptoResult<Plaintext> {
        let a = &partials
            .first()
            .ok_or(CryptoError::InsufficientShares {
                got: 0,
                need: self.threshold(),
            })?
            .a;
        if partials.iter().any(|partial| &partial.a != a) {
            return Err(CryptoError::DomainViolation(
                "mismatched level-1 partial decryptions",
            ));
        }

        let beta_partials: Vec<PartialDecryption> =
            partials.iter().map(|partial| partial.beta.clone()).collect();
        let b = self.combine(&beta_partials)?;

        Ok(Plaintext((a + &b.0) % self.ek().n()))
    }

    /// Recombine partial decryptions of the same level-2 ciphertext:
    /// recombine every component, then `Dec(α) + Σ Dec(β₀)·Dec(β₁) mod n`.
    pub fn combine2(&self, partials: &[PartialDecryption2]) -> CryptoResult<Plaintext> {
        let pair_count = partials
            .first()
            .ok_or(CryptoError::InsufficientShares {
                got: 0,
                need: self.threshold(),
            })?
            .pairs
            .len();
        if partials.iter().any(|partial| partial.pairs.len() != pair_count) {
            return Err(CryptoError::DomainViolation(
                "mismatched level-2 partial decryptions",
            ));
        }

        let alpha_partials: Vec<PartialDecryption> = partials
            .iter()
            .map(|partial| partial.alpha.clone())
            .collect();
        let n = self.ek().n();
        let mut acc = self.combine(&alpha_partials)?.0.clone();

        for i in 0..pair_count {
            let b0_partials: Vec<PartialDecryption> = partials
                .iter()
                .map(|partial| partial.pairs[i].0.clone())
                .collect();
            let b1_partials: Vec<PartialDecryption> = partials
                .iter()
                .map(|partial| partial.pairs[i].1.clone())
                .collect();
            let m0 = self.combine(&b0_partials)?.0.clone();
            let m1 = self.combine(&b1_partials)?.0.clone();
            acc = (acc + m0.modmul(&m1, n)) % n;
        }

        Ok(Plaintext(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_tools::paillier::threshold::tests::test_dealer_keygen;

    fn pt(m: u64) -> Plaintext {
        Plaintext(BigNumber::from(m))
    }

    #[test]
    fn threshold_level1() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        let ek = pubkey.ek();

        let (c, _) = ek.encrypt1(&mut rand::thread_rng(), &pt(42)).unwrap();

        let partials: Vec<PartialDecryption1> = shares[..3]
            .iter()
            .map(|share| share.partial_decrypt1(&pubkey, &c).unwrap())
            .collect();
        assert_eq!(pubkey.combine1(&partials).unwrap(), pt(42));
    }

    #[test]
    fn threshold_level2() {
        // msg1 = 10, msg2 = 2, msg3 = 3:
        // Mult(Add(Enc₁(msg1), Enc₁(msg2)), Enc₁(msg3)) decrypts to 36
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        let ek = pubkey.ek();
        let rng = &mut rand::thread_rng();

        let (c1, _) = ek.encrypt1(rng, &pt(10)).unwrap();
        let (c2, _) = ek.encrypt1(rng, &pt(2)).unwrap();
        let (c3, _) = ek.encrypt1(rng, &pt(3)).unwrap();

        let l2 = ek.mult1(&ek.add1(&c1, &c2).unwrap(), &c3).unwrap();

        let partial = |share: &KeyShare, c: &Ciphertext2| share.partial_decrypt2(&pubkey, c).unwrap();

        let partials: Vec<PartialDecryption2> =
            shares[..3].iter().map(|share| partial(share, &l2)).collect();
        assert_eq!(pubkey.combine2(&partials).unwrap(), pt(36));

        // a disjoint share subset agrees
        let partials: Vec<PartialDecryption2> =
            shares[2..].iter().map(|share| partial(share, &l2)).collect();
        assert_eq!(pubkey.combine2(&partials).unwrap(), pt(36));

        // Add(L2, L2) decrypts to 72
        let doubled = ek.add2(&l2, &l2).unwrap();
        let partials: Vec<PartialDecryption2> = shares[..3]
            .iter()
            .map(|share| partial(share, &doubled))
            .collect();
        assert_eq!(pubkey.combine2(&partials).unwrap(), pt(72));
    }
}
