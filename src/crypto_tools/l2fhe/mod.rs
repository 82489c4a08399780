//! The two-level homomorphic layer atop Paillier: level-1 ciphertexts
//! support additions and scalar multiplications, and one multiplication of
//! two level-1 ciphertexts yields a level-2 ciphertext that still supports
//! both. Catalano-Fiore style: a level-1 ciphertext is `(a, β)` with
//! `a = m - b mod n` a public mask offset and `β` a Paillier encryption of
//! the mask `b`.
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;

use crate::crypto_tools::integer::{
    append_bigint, append_u32, expect_end, read_bigint, read_u32,
};
use crate::crypto_tools::paillier::{
    utils::member_of_mod, Ciphertext, DecryptionKey, EncryptionKey, Plaintext, Randomness,
};
use crate::sdk::api::{BytesVec, CryptoError, CryptoResult};

pub mod threshold;

/// Level-1 ciphertext `(a, β)`; decrypts to `a + Dec(β) mod n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext1 {
    pub(crate) a: BigNumber,
    pub(crate) beta: Ciphertext,
}

/// Level-2 ciphertext `(α, [(β₀, β₁), …])`;
/// decrypts to `Dec(α) + Σ Dec(β₀)·Dec(β₁) mod n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext2 {
    pub(crate) alpha: Ciphertext,
    pub(crate) pairs: Vec<(Ciphertext, Ciphertext)>,
}

impl EncryptionKey {
    /// `Encrypt₁(m; r, b) = (m - b mod n, Encrypt(b; r))` with a fresh mask
    /// `b` and fresh randomness. The returned randomness is that of the
    /// equivalent Paillier encryption of `m` (see [Ciphertext1::to_paillier])
    /// and serves as the proof witness.
    pub fn encrypt1(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        m: &Plaintext,
    ) -> CryptoResult<(Ciphertext1, Randomness)> {
        if !self.validate_plaintext(m) {
            return Err(CryptoError::DomainViolation("plaintext not in [0, n)"));
        }
        let b = self.random_plaintext(rng);
        let a = (&m.0 + self.n() - &b.0) % self.n();
        let (beta, r) = self.encrypt(rng, &b)?;
        Ok((Ciphertext1 { a, beta }, r))
    }

    /// Level-1 encryption of a public constant with fixed randomness:
    /// `(m mod n, Encrypt(0; 1))`. Deterministic, so every party derives the
    /// same ciphertext. MUST NOT be used for secret plaintexts.
    pub fn encrypt1_public(&self, m: &Plaintext) -> CryptoResult<Ciphertext1> {
        if !self.validate_plaintext(m) {
            return Err(CryptoError::DomainViolation("plaintext not in [0, n)"));
        }
        Ok(Ciphertext1 {
            a: m.0.clone(),
            beta: Ciphertext(BigNumber::one()),
        })
    }

    /// The multiplicative identity `Encrypt₁(1)` with fixed randomness.
    pub fn one1(&self) -> Ciphertext1 {
        Ciphertext1 {
            a: BigNumber::one(),
            beta: Ciphertext(BigNumber::one()),
        }
    }

    pub fn validate_ciphertext1(&self, c: &Ciphertext1) -> bool {
        member_of_mod(&c.a, self.n()) && self.validate_ciphertext(&c.beta)
    }

    pub fn validate_ciphertext2(&self, c: &Ciphertext2) -> bool {
        self.validate_ciphertext(&c.alpha)
            && c.pairs
                .iter()
                .all(|(b0, b1)| self.validate_ciphertext(b0) && self.validate_ciphertext(b1))
    }

    /// `Add(L1, L1)`: componentwise
    pub fn add1(&self, c1: &Ciphertext1, c2: &Ciphertext1) -> CryptoResult<Ciphertext1> {
        if !self.validate_ciphertext1(c1) || !self.validate_ciphertext1(c2) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        Ok(Ciphertext1 {
            a: (&c1.a + &c2.a) % self.n(),
            beta: self.add(&c1.beta, &c2.beta)?,
        })
    }

    /// `cMult(L1, k)`
    pub fn mul1(&self, c: &Ciphertext1, k: &Plaintext) -> CryptoResult<Ciphertext1> {
        if !self.validate_ciphertext1(c) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        Ok(Ciphertext1 {
            a: c.a.modmul(&k.0, self.n()),
            beta: self.mul(&c.beta, k)?,
        })
    }

    /// `Mult(L1, L1)`: one multiplicative level.
    /// `α = Encrypt(a₁a₂; 1) + a₁·β₂ + a₂·β₁` and `B = [(β₁, β₂)]`.
    /// The fixed randomness is sound here: `a₁`, `a₂` are public.
    pub fn mult1(&self, c1: &Ciphertext1, c2: &Ciphertext1) -> CryptoResult<Ciphertext2> {
        if !self.validate_ciphertext1(c1) || !self.validate_ciphertext1(c2) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        let prod = Plaintext(c1.a.modmul(&c2.a, self.n()));
        let enc_prod = Ciphertext(self.g().modpow(&prod.0, self.nn()));
        let alpha = self.add(
            &enc_prod,
            &self.add(
                &self.mul(&c2.beta, &Plaintext(c1.a.clone()))?,
                &self.mul(&c1.beta, &Plaintext(c2.a.clone()))?,
            )?,
        )?;
        Ok(Ciphertext2 {
            alpha,
            pairs: vec![(c1.beta.clone(), c2.beta.clone())],
        })
    }

    /// `Add(L2, L2)`: Paillier-add the α components and concatenate the pair
    /// sequences.
    pub fn add2(&self, c1: &Ciphertext2, c2: &Ciphertext2) -> CryptoResult<Ciphertext2> {
        if !self.validate_ciphertext2(c1) || !self.validate_ciphertext2(c2) {
            return Err(CryptoError::DomainViolation("invalid level-2 ciphertext"));
        }
        let mut pairs = c1.pairs.clone();
        pairs.extend(c2.pairs.iter().cloned());
        Ok(Ciphertext2 {
            alpha: self.add(&c1.alpha, &c2.alpha)?,
            pairs,
        })
    }

    /// `Add(L1, L2) = Add(Mult(L1, Encrypt₁(1)), L2)`
    pub fn add1_2(&self, c1: &Ciphertext1, c2: &Ciphertext2) -> CryptoResult<Ciphertext2> {
        self.add2(&self.mult1(c1, &self.one1())?, c2)
    }

    /// `cMult(L2, k)`: multiply α and the first element of every pair by `k`.
    pub fn mul2(&self, c: &Ciphertext2, k: &Plaintext) -> CryptoResult<Ciphertext2> {
        if !self.validate_ciphertext2(c) {
            return Err(CryptoError::DomainViolation("invalid level-2 ciphertext"));
        }
        Ok(Ciphertext2 {
            alpha: self.mul(&c.alpha, k)?,
            pairs: c
                .pairs
                .iter()
                .map(|(b0, b1)| Ok((self.mul(b0, k)?, b1.clone())))
                .collect::<CryptoResult<Vec<_>>>()?,
        })
    }
}

impl DecryptionKey {
    /// `Decrypt(L1) = a + Decrypt(β) mod n`
    pub fn decrypt1(&self, c: &Ciphertext1) -> CryptoResult<Plaintext> {
        if !self.ek().validate_ciphertext1(c) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        let b = self.decrypt(&c.beta)?;
        Ok(Plaintext((&c.a + &b.0) % self.ek().n()))
    }

    /// `Decrypt(L2) = Decrypt(α) + Σ Decrypt(β₀)·Decrypt(β₁) mod n`
    pub fn decrypt2(&self, c: &Ciphertext2) -> CryptoResult<Plaintext> {
        if !self.ek().validate_ciphertext2(c) {
            return Err(CryptoError::DomainViolation("invalid level-2 ciphertext"));
        }
        let n = self.ek().n();
        let mut acc = self.decrypt(&c.alpha)?.0.clone();
        for (b0, b1) in &c.pairs {
            let m0 = self.decrypt(b0)?.0.clone();
            let m1 = self.decrypt(b1)?.0.clone();
            acc = (acc + m0.modmul(&m1, n)) % n;
        }
        Ok(Plaintext(acc))
    }
}

impl Ciphertext1 {
    /// Fold `(a, β)` into the equivalent plain Paillier ciphertext
    /// `β (n+1)^a mod n²`, an encryption of the level-1 plaintext under β's
    /// randomness. Range proofs over level-1 ciphertexts run on this form so
    /// the proof binds both components.
    pub fn to_paillier(&self, ek: &EncryptionKey) -> CryptoResult<Ciphertext> {
        if !ek.validate_ciphertext1(self) {
            return Err(CryptoError::DomainViolation("invalid level-1 ciphertext"));
        }
        Ok(Ciphertext(
            ek.g().modpow(&self.a, ek.nn()).modmul(&self.beta.0, ek.nn()),
        ))
    }

    /// `[len‖a ‖ len‖β]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &self.a)?;
        append_bigint(&mut buf, &self.beta.0)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let a = read_bigint(bytes, &mut pos)?;
        let beta = Ciphertext(read_bigint(bytes, &mut pos)?);
        expect_end(bytes, pos)?;
        Ok(Self { a, beta })
    }
}

impl Ciphertext2 {
    /// `[len‖α ‖ count:4 ‖ (len‖β₀ ‖ len‖β₁)*]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &self.alpha.0)?;
        append_u32(&mut buf, self.pairs.len())?;
        for (b0, b1) in &self.pairs {
            append_bigint(&mut buf, &b0.0)?;
            append_bigint(&mut buf, &b1.0)?;
        }
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let alpha = Ciphertext(read_bigint(bytes, &mut pos)?);
        let count = read_u32(bytes, &mut pos)? as usize;
        // each pair costs at least two length fields
        if count > bytes.len() / 8 {
            return Err(CryptoError::CorruptEncoding("implausible pair count"));
        }
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let b0 = Ciphertext(read_bigint(bytes, &mut pos)?);
            let b1 = Ciphertext(read_bigint(bytes, &mut pos)?);
            pairs.push((b0, b1));
        }
        expect_end(bytes, pos)?;
        Ok(Self { alpha, pairs })
    }
}

#[cfg(any(test, feature = "malicious"))]
pub mod malicious {
    use super::*;

    impl Ciphertext1 {
        pub fn corrupt(&mut self) {
            self.a += BigNumber::one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_tools::paillier::keygen;

    fn setup() -> (EncryptionKey, DecryptionKey) {
        keygen(&mut rand::thread_rng(), 256).unwrap()
    }

    fn pt(m: u64) -> Plaintext {
        Plaintext(BigNumber::from(m))
    }

    #[test]
    fn level1_homomorphism() {
        let (ek, dk) = setup();
        let rng = &mut rand::thread_rng();

        let (ca, _) = ek.encrypt1(rng, &pt(17)).unwrap();
        let (cb, _) = ek.encrypt1(rng, &pt(25)).unwrap();

        assert_eq!(dk.decrypt1(&ca).unwrap(), pt(17));

        let sum = ek.add1(&ca, &cb).unwrap();
        assert_eq!(dk.decrypt1(&sum).unwrap(), pt(42));

        let scaled = ek.mul1(&ca, &pt(3)).unwrap();
        assert_eq!(dk.decrypt1(&scaled).unwrap(), pt(51));

        // folded form decrypts to the level-1 plaintext
        let folded = ca.to_paillier(&ek).unwrap();
        assert_eq!(dk.decrypt(&folded).unwrap(), pt(17));

        // the identity and public encryptions
        assert_eq!(dk.decrypt1(&ek.one1()).unwrap(), pt(1));
        assert_eq!(
            dk.decrypt1(&ek.encrypt1_public(&pt(9)).unwrap()).unwrap(),
            pt(9)
        );
    }

    #[test]
    fn level2_homomorphism() {
        let (ek, dk) = setup();
        let rng = &mut rand::thread_rng();

        let (ca, _) = ek.encrypt1(rng, &pt(6)).unwrap();
        let (cb, _) = ek.encrypt1(rng, &pt(7)).unwrap();

        let prod = ek.mult1(&ca, &cb).unwrap();
        assert_eq!(dk.decrypt2(&prod).unwrap(), pt(42));

        let doubled = ek.add2(&prod, &prod).unwrap();
        assert_eq!(dk.decrypt2(&doubled).unwrap(), pt(84));

        let scaled = ek.mul2(&prod, &pt(10)).unwrap();
        assert_eq!(dk.decrypt2(&scaled).unwrap(), pt(420));

        let (cc, _) = ek.encrypt1(rng, &pt(8)).unwrap();
        let shifted = ek.add1_2(&cc, &prod).unwrap();
        assert_eq!(dk.decrypt2(&shifted).unwrap(), pt(50));

        // multiplication by the fixed-randomness identity preserves the value
        let via_one = ek.mult1(&ca, &ek.one1()).unwrap();
        assert_eq!(dk.decrypt2(&via_one).unwrap(), pt(6));
    }

    #[test]
    fn encoding_round_trip() {
        let (ek, _dk) = setup();
        let rng = &mut rand::thread_rng();

        let (c1, _) = ek.encrypt1(rng, &pt(123)).unwrap();
        let c1_bytes = c1.to_bytes().unwrap();
        assert_eq!(Ciphertext1::from_bytes(&c1_bytes).unwrap(), c1);
        assert!(matches!(
            Ciphertext1::from_bytes(&c1_bytes[..c1_bytes.len() - 1]).unwrap_err(),
            CryptoError::CorruptEncoding(_)
        ));

        let (c1b, _) = ek.encrypt1(rng, &pt(4)).unwrap();
        let c2 = ek
            .add2(
                &ek.mult1(&c1, &c1b).unwrap(),
                &ek.mult1(&c1b, &c1b).unwrap(),
            )
            .unwrap();
        let c2_bytes = c2.to_bytes().unwrap();
        assert_eq!(Ciphertext2::from_bytes(&c2_bytes).unwrap(), c2);
        assert!(matches!(
            Ciphertext2::from_bytes(&c2_bytes[..c2_bytes.len() - 1]).unwrap_err(),
            CryptoError::CorruptEncoding(_)
        ));
    }
}
