//! Threshold Paillier: a trusted dealer splits the decryption exponent into
//! `l` Shamir shares over `Z_{nm}` so that any `w` parties can decrypt.
//! Recombination follows Shoup's RSA-threshold construction: partial
//! decryptions are `c^{2Δs_i}` and Lagrange coefficients are scaled by
//! `Δ = l!` so that all arithmetic stays in the integers.
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use unknown_order::BigNumber;
use zeroize::Zeroize;

use crate::crypto_tools::integer::{
    append_bigint, append_u32, expect_end, factorial, probable_prime, random_mod, random_mod_star,
    read_bigint, read_u32, safe_prime_pair,
};
use crate::sdk::api::{BytesVec, CryptoError, CryptoResult};

use super::utils::member_of_mul_group;
use super::{validate_prime_bits, Ciphertext, EncryptionKey, Plaintext};

/// Threshold Paillier public key: the Paillier public key plus the share
/// verification data `(l, w, Δ = l!, v, {v_i}, (4Δ²)⁻¹ mod n)`.
/// `Δ` and the combine constant are derived state computed once at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPublicKey {
    ek: EncryptionKey,
    share_count: usize,
    threshold: usize,
    delta: BigNumber,
    v: BigNumber,
    verification_keys: Vec<BigNumber>,
    combine_constant: BigNumber,
}

/// Threshold private share `(id, s_i)` held by party `id ∈ {1..l}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct KeyShare {
    id: usize,
    s_i: BigNumber,
}

/// A party's partial decryption `(id, c_i = c^{2Δs_i} mod n²)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDecryption {
    id: usize,
    share: BigNumber,
}

/// Produce a `(w, l)` threshold keypair from two safe primes of `prime_bits`
/// bits each. Returns the public key and one private share per party,
/// ordered by id.
pub fn dealer_keygen(
    rng: &mut (impl CryptoRng + RngCore),
    prime_bits: usize,
    share_count: usize,
    threshold: usize,
) -> CryptoResult<(ThresholdPublicKey, Vec<KeyShare>)> {
    validate_share_params(share_count, threshold)?;
    validate_prime_bits(prime_bits)?;

    let (p, p_prime) = safe_prime_pair(rng, prime_bits);
    let (q, q_prime) = loop {
        let (q, q_prime) = safe_prime_pair(rng, prime_bits);
        // p, q, p', q' must be pairwise distinct
        if q != p && q_prime != p_prime && q != p_prime && p != q_prime {
            break (q, q_prime);
        }
    };

    let n = &p * &q;
    let m = &p_prime * &q_prime;

    dealer_keygen_from_parts(rng, n, m, share_count, threshold)
}

/// Like [dealer_keygen] but with plain (non-safe) primes.
/// Decryption still works with `m = λ(n)/2`; what is lost is the hardness
/// guarantee on the share space. Use only for tests and benchmarks.
pub fn dealer_keygen_unsafe(
    rng: &mut (impl CryptoRng + RngCore),
    prime_bits: usize,
    share_count: usize,
    threshold: usize,
) -> CryptoResult<(ThresholdPublicKey, Vec<KeyShare>)> {
    validate_share_params(share_count, threshold)?;
    validate_prime_bits(prime_bits)?;

    loop {
        let p = probable_prime(rng, prime_bits);
        let q = probable_prime(rng, prime_bits);
        if p == q {
            continue;
        }

        let p1: BigNumber = &p - 1;
        let q1: BigNumber = &q - 1;
        let n = &p * &q;
        let lambda = &(&p1 * &q1) / &p1.gcd(&q1);
        let m = lambda >> 1usize;

        // the CRT below needs m to be a unit mod n
        if !m.gcd(&n).is_one() {
            continue;
        }

        return dealer_keygen_from_parts(rng, n, m, share_count, threshold);
    }
}

fn validate_share_params(share_count: usize, threshold: usize) -> CryptoResult<()> {
    if threshold < 1 || threshold > share_count {
        return Err(CryptoError::DomainViolation("threshold not in [1, l]"));
    }
    // unambiguous reconstruction requires 2w - 1 <= l
    if 2 * threshold - 1 > share_count {
        return Err(CryptoError::DomainViolation("2w - 1 exceeds l"));
    }
    Ok(())
}

fn dealer_keygen_from_parts(
    rng: &mut (impl CryptoRng + RngCore),
    n: BigNumber,
    m: BigNumber,
    share_count: usize,
    threshold: usize,
) -> CryptoResult<(ThresholdPublicKey, Vec<KeyShare>)> {
    let ek = EncryptionKey::from_modulus(n);
    let n = ek.n().clone();
    let nm = &n * &m;

    // d = m (m⁻¹ mod n) is the unique value in [0, nm) with
    // d ≡ 1 (mod n) and d ≡ 0 (mod m)
    let m_inv = m
        .invert(&n)
        .ok_or(CryptoError::DomainViolation("m not a unit mod n"))?;
    let d = &m * &m_inv;

    // f(X) = d + a_1 X + ... + a_{w-1} X^{w-1} mod nm
    let coeffs: Vec<BigNumber> = std::iter::once(d)
        .chain((1..threshold).map(|_| random_mod(rng, &nm)))
        .collect();

    let shares: Vec<KeyShare> = (1..=share_count)
        .map(|id| KeyShare {
            id,
            s_i: eval_poly(&coeffs, id, &nm),
        })
        .collect();

    let delta = factorial(share_count);

    // v is a random square in Z*_{n²}
    let r = random_mod_star(rng, &n);
    let v = r.modmul(&r, ek.nn());

    let verification_keys = shares
        .iter()
        .map(|share| v.modpow(&(&delta * &share.s_i), ek.nn()))
        .collect();

    let combine_constant: BigNumber = ((&delta * &delta) << 2usize)
        .invert(&n)
        .ok_or(CryptoError::DomainViolation("4Δ² not a unit mod n"))?;

    Ok((
        ThresholdPublicKey {
            ek,
            share_count,
            threshold,
            delta,
            v,
            verification_keys,
            combine_constant,
        },
        shares,
    ))
}

/// Evaluate `f(x) mod nm` by Horner's method.
fn eval_poly(coeffs: &[BigNumber], x: usize, nm: &BigNumber) -> BigNumber {
    let x = BigNumber::from(x as u64);
    coeffs
        .iter()
        .rev()
        .fold(BigNumber::zero(), |acc, coeff| (acc * &x + coeff) % nm)
}

/// `λ_{0,j} = Δ Π_{k≠j} (-i_k)/(i_j - i_k)`, exact in the integers.
pub(crate) fn lagrange_coefficient(j: usize, ids: &[usize], delta: &BigNumber) -> BigNumber {
    let mut num = delta.clone();
    let mut den = BigNumber::one();
    for (k, &id) in ids.iter().enumerate() {
        if k == j {
            continue;
        }
        num = num * &(-BigNumber::from(id as u64));
        den = den * &(BigNumber::from(ids[j] as u64) - BigNumber::from(id as u64));
    }
    &num / &den
}

impl ThresholdPublicKey {
    pub fn ek(&self) -> &EncryptionKey {
        &self.ek
    }

    /// `l`
    pub fn share_count(&self) -> usize {
        self.share_count
    }

    /// `w`
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// `Δ = l!`
    pub(crate) fn delta(&self) -> &BigNumber {
        &self.delta
    }

    pub(crate) fn v(&self) -> &BigNumber {
        &self.v
    }

    pub(crate) fn combine_constant(&self) -> &BigNumber {
        &self.combine_constant
    }

    /// `v_i = v^{Δ s_i} mod n²`
    pub fn verification_key(&self, id: usize) -> CryptoResult<&BigNumber> {
        if id < 1 || id > self.share_count {
            return Err(CryptoError::KeyMismatch("no verification key for id"));
        }
        Ok(&self.verification_keys[id - 1])
    }

    /// Recombine at least `w` distinct partial decryptions of the same
    /// ciphertext into its plaintext:
    /// `combineConstant ((Π c_{i_j}^{2λ_{0,j}} mod n² - 1)/n) mod n`.
    pub fn combine(&self, partials: &[PartialDecryption]) -> CryptoResult<Plaintext> {
        if partials.len() < self.threshold {
            return Err(CryptoError::InsufficientShares {
                got: partials.len(),
                need: self.threshold,
            });
        }

        let mut seen = vec![false; self.share_count];
        for partial in partials {
            if partial.id < 1 || partial.id > self.share_count {
                return Err(CryptoError::DomainViolation("share id out of range"));
            }
            if seen[partial.id - 1] {
                return Err(CryptoError::DuplicateShare(partial.id));
            }
            seen[partial.id - 1] = true;

            // the Lagrange exponents below may be negative, so each share
            // must be a unit mod n²
            if !member_of_mul_group(&partial.share, self.ek.nn()) {
                return Err(CryptoError::DomainViolation(
                    "partial decryption not in Z*_{n^2}",
                ));
            }
        }

        let ids: Vec<usize> = partials.iter().map(|partial| partial.id).collect();

        let c_prime = partials
            .iter()
            .enumerate()
            .fold(BigNumber::one(), |acc, (j, partial)| {
                // exponent 2λ_{0,j}
                let lagrange = lagrange_coefficient(j, &ids, &self.delta);
                let exp = &lagrange + &lagrange;
                acc.modmul(&partial.share.modpow(&exp, self.ek.nn()), self.ek.nn())
            });

        let num = c_prime - BigNumber::one();
        let ell = &num / self.ek.n();
        Ok(Plaintext(ell.modmul(&self.combine_constant, self.ek.n())))
    }

    /// `[public ‖ len‖v ‖ count:4 ‖ (len‖v_i)* ‖ l:4 ‖ w:4 ‖ public-length:4]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = self.ek.to_bytes()?;
        let inner_len = buf.len();
        append_bigint(&mut buf, &self.v)?;
        append_u32(&mut buf, self.verification_keys.len())?;
        for v_i in &self.verification_keys {
            append_bigint(&mut buf, v_i)?;
        }
        append_u32(&mut buf, self.share_count)?;
        append_u32(&mut buf, self.threshold)?;
        crate::crypto_tools::integer::seal_layer(&mut buf, inner_len)?;
        Ok(buf)
    }

    /// Reassemble a key from its stored fields, recomputing the derived state
    /// and cross-checking the stored combine constant.
    pub(crate) fn from_parts(
        n: BigNumber,
        share_count: usize,
        threshold: usize,
        v: BigNumber,
        verification_keys: Vec<BigNumber>,
        combine_constant: BigNumber,
    ) -> CryptoResult<Self> {
        validate_share_params(share_count, threshold)
            .map_err(|_| CryptoError::CorruptEncoding("invalid share parameters"))?;
        if verification_keys.len() != share_count {
            return Err(CryptoError::CorruptEncoding(
                "verification key count mismatch",
            ));
        }

        let ek = EncryptionKey::from_modulus(n);
        let delta = factorial(share_count);
        let expected: BigNumber = ((&delta * &delta) << 2usize)
            .invert(ek.n())
            .ok_or(CryptoError::CorruptEncoding("4Δ² not a unit mod n"))?;
        if expected != combine_constant {
            return Err(CryptoError::CorruptEncoding("combine constant mismatch"));
        }

        Ok(Self {
            ek,
            share_count,
            threshold,
            delta,
            v,
            verification_keys,
            combine_constant,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (inner, fields) = crate::crypto_tools::integer::peel_layer(bytes)?;
        let ek = EncryptionKey::from_bytes(inner)?;

        let mut pos = 0;
        let v = read_bigint(fields, &mut pos)?;
        let count = read_u32(fields, &mut pos)? as usize;
        let mut verification_keys = Vec::with_capacity(count);
        for _ in 0..count {
            verification_keys.push(read_bigint(fields, &mut pos)?);
        }
        let share_count = read_u32(fields, &mut pos)? as usize;
        let threshold = read_u32(fields, &mut pos)? as usize;
        expect_end(fields, pos)?;

        if share_count != count {
            return Err(CryptoError::CorruptEncoding(
                "verification key count mismatch",
            ));
        }
        validate_share_params(share_count, threshold)
            .map_err(|_| CryptoError::CorruptEncoding("invalid share parameters"))?;

        let delta = factorial(share_count);
        let combine_constant: BigNumber = ((&delta * &delta) << 2usize)
            .invert(ek.n())
            .ok_or(CryptoError::CorruptEncoding("4Δ² not a unit mod n"))?;

        Ok(Self {
            ek,
            share_count,
            threshold,
            delta,
            v,
            verification_keys,
            combine_constant,
        })
    }
}

impl KeyShare {
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn s_i(&self) -> &BigNumber {
        &self.s_i
    }

    /// `c_i = c^{2Δs_i} mod n²`
    pub fn partial_decrypt(
        &self,
        pubkey: &ThresholdPublicKey,
        c: &Ciphertext,
    ) -> CryptoResult<PartialDecryption> {
        if !pubkey.ek().validate_ciphertext(c) {
            return Err(CryptoError::DomainViolation("ciphertext not in [0, n^2)"));
        }
        let exp = (pubkey.delta() * &self.s_i) << 1;
        Ok(PartialDecryption {
            id: self.id,
            share: c.0.modpow(&exp, pubkey.ek().nn()),
        })
    }

    /// `[id:4 ‖ len‖s_i]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_u32(&mut buf, self.id)?;
        append_bigint(&mut buf, &self.s_i)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let id = read_u32(bytes, &mut pos)? as usize;
        let s_i = read_bigint(bytes, &mut pos)?;
        expect_end(bytes, pos)?;
        Ok(Self { id, s_i })
    }

    pub(crate) fn new(id: usize, s_i: BigNumber) -> Self {
        Self { id, s_i }
    }
}

impl PartialDecryption {
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn share(&self) -> &BigNumber {
        &self.share
    }

    /// `[id:4 ‖ len‖c_i]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_u32(&mut buf, self.id)?;
        append_bigint(&mut buf, &self.share)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let id = read_u32(bytes, &mut pos)? as usize;
        let share = read_bigint(bytes, &mut pos)?;
        expect_end(bytes, pos)?;
        Ok(Self { id, share })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::KEYGEN_SEED_TAG;
    use crate::crypto_tools::rng::rng_from_seed;

    pub(crate) fn test_dealer_keygen(
        share_count: usize,
        threshold: usize,
    ) -> (ThresholdPublicKey, Vec<KeyShare>) {
        let mut rng = rng_from_seed(KEYGEN_SEED_TAG, &122333356_u64.to_be_bytes()).unwrap();
        dealer_keygen_unsafe(&mut rng, 512, share_count, threshold).unwrap()
    }

    fn encrypt_42(pubkey: &ThresholdPublicKey) -> Ciphertext {
        pubkey
            .ek()
            .encrypt(&mut rand::thread_rng(), &Plaintext(BigNumber::from(42u64)))
            .unwrap()
            .0
    }

    #[test]
    fn share_recombination() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        assert_eq!(shares.len(), 5);

        let c = encrypt_42(&pubkey);

        let partial = |id: usize| shares[id - 1].partial_decrypt(&pubkey, &c).unwrap();

        // shares {1, 2, 3}
        let m = pubkey
            .combine(&[partial(1), partial(2), partial(3)])
            .unwrap();
        assert_eq!(m.0, BigNumber::from(42u64));

        // a disjoint subset {3, 4, 5} recombines to the same plaintext
        let m = pubkey
            .combine(&[partial(3), partial(4), partial(5)])
            .unwrap();
        assert_eq!(m.0, BigNumber::from(42u64));

        // order of the subset does not matter
        let m = pubkey
            .combine(&[partial(4), partial(1), partial(3)])
            .unwrap();
        assert_eq!(m.0, BigNumber::from(42u64));

        // more than w shares also work
        let m = pubkey
            .combine(&[partial(1), partial(2), partial(3), partial(4), partial(5)])
            .unwrap();
        assert_eq!(m.0, BigNumber::from(42u64));
    }

    #[test]
    fn share_recombination_failures() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        let c = encrypt_42(&pubkey);
        let partial = |id: usize| shares[id - 1].partial_decrypt(&pubkey, &c).unwrap();

        // {1, 1, 2} has a duplicate id
        assert_eq!(
            pubkey
                .combine(&[partial(1), partial(1), partial(2)])
                .unwrap_err(),
            CryptoError::DuplicateShare(1)
        );

        // two shares are insufficient for w = 3
        assert_eq!(
            pubkey.combine(&[partial(1), partial(2)]).unwrap_err(),
            CryptoError::InsufficientShares { got: 2, need: 3 }
        );
    }

    #[test]
    fn invalid_share_params() {
        let mut rng = rand::thread_rng();
        assert!(dealer_keygen_unsafe(&mut rng, 128, 5, 0).is_err());
        assert!(dealer_keygen_unsafe(&mut rng, 128, 5, 6).is_err());
        // 2w - 1 > l
        assert!(dealer_keygen_unsafe(&mut rng, 128, 5, 4).is_err());
    }

    #[test]
    fn key_encoding_round_trip() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);

        let pub_bytes = pubkey.to_bytes().unwrap();
        assert_eq!(ThresholdPublicKey::from_bytes(&pub_bytes).unwrap(), pubkey);
        assert!(matches!(
            ThresholdPublicKey::from_bytes(&pub_bytes[..pub_bytes.len() - 1]).unwrap_err(),
            CryptoError::CorruptEncoding(_)
        ));

        let share_bytes = shares[0].to_bytes().unwrap();
        assert_eq!(KeyShare::from_bytes(&share_bytes).unwrap(), shares[0]);
        assert!(matches!(
            KeyShare::from_bytes(&share_bytes[..share_bytes.len() - 1]).unwrap_err(),
            CryptoError::CorruptEncoding(_)
        ));

        let c = encrypt_42(&pubkey);
        let partial = shares[0].partial_decrypt(&pubkey, &c).unwrap();
        let partial_bytes = partial.to_bytes().unwrap();
        assert_eq!(
            PartialDecryption::from_bytes(&partial_bytes).unwrap(),
            partial
        );
        assert!(matches!(
            PartialDecryption::from_bytes(&partial_bytes[..partial_bytes.len() - 1]).unwrap_err(),
            CryptoError::CorruptEncoding(_)
        ));
    }
}
