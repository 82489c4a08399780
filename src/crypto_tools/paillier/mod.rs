//! The generalized Paillier cryptosystem with the exponent parameter fixed at
//! one: `Enc(m; r) = (n+1)^m r^n mod n²`. Key generation, the homomorphic
//! operations, and the byte codecs for key material live here; the threshold
//! variant is in [threshold] and the zero-knowledge proofs in [zk].
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unknown_order::BigNumber;
use zeroize::Zeroize;

use crate::constants::{MODULUS_MAX_SIZE, PRIME_MIN_SIZE};
use crate::crypto_tools::integer::{
    append_bigint, expect_end, peel_layer, probable_prime, random_mod, random_mod_star, read_bigint,
    seal_layer,
};
use crate::sdk::api::{BytesVec, CryptoError, CryptoResult};

use self::utils::{member_of_mod, member_of_mul_group};

pub mod keyfile;
pub mod threshold;
pub(crate) mod utils;
pub mod zk;

/// Generate a Paillier keypair from two distinct odd primes of equal bit
/// length with `q mod (p-1) != 0`. The private exponent is the Carmichael
/// value `lambda = (p-1)(q-1)/gcd(p-1, q-1)`.
pub fn keygen(
    rng: &mut (impl CryptoRng + RngCore),
    prime_bits: usize,
) -> CryptoResult<(EncryptionKey, DecryptionKey)> {
    validate_prime_bits(prime_bits)?;

    loop {
        let p = probable_prime(rng, prime_bits);
        let q = probable_prime(rng, prime_bits);

        if p == q || p.bit_length() != q.bit_length() {
            continue;
        }
        if (&q % &(&p - 1)) == BigNumber::zero() {
            continue;
        }

        let p1: BigNumber = &p - 1;
        let q1: BigNumber = &q - 1;
        let n = &p * &q;
        let lambda = &(&p1 * &q1) / &p1.gcd(&q1);

        // lambda must be a unit mod n for decryption to exist
        let lambda_inv = match lambda.invert(&n) {
            Some(inv) => inv,
            None => continue,
        };

        let ek = EncryptionKey::from_modulus(n);
        let dk = DecryptionKey {
            ek: ek.clone(),
            d: lambda,
            d_inv: lambda_inv,
        };
        return Ok((ek, dk));
    }
}

pub(crate) fn validate_prime_bits(prime_bits: usize) -> CryptoResult<()> {
    if prime_bits < PRIME_MIN_SIZE || 2 * prime_bits > MODULUS_MAX_SIZE {
        return Err(CryptoError::DomainViolation("prime size out of range"));
    }
    Ok(())
}

/// Wrapper for a `BigNumber` that is zeroized on drop
#[derive(Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretNumber(pub(crate) BigNumber);

/// Paillier encryption key `(n, g = n+1, n²)`.
/// The derived values `g` and `n²` are cached at construction
/// and never serialized.
#[derive(Debug, Clone, PartialEq, Zeroize)]
pub struct EncryptionKey {
    n: BigNumber,
    g: BigNumber,
    nn: BigNumber,
}

impl EncryptionKey {
    pub(crate) fn from_modulus(n: BigNumber) -> Self {
        let g = &n + 1;
        let nn = &n * &n;
        Self { n, g, nn }
    }

    pub fn n(&self) -> &BigNumber {
        &self.n
    }

    pub fn nn(&self) -> &BigNumber {
        &self.nn
    }

    pub(crate) fn g(&self) -> &BigNumber {
        &self.g
    }

    /// `k = bitlen(n)`
    pub fn bit_length(&self) -> usize {
        self.n.bit_length()
    }

    pub fn sample_randomness(&self, rng: &mut (impl CryptoRng + RngCore)) -> Randomness {
        Randomness(random_mod_star(rng, &self.n))
    }

    pub fn random_plaintext(&self, rng: &mut (impl CryptoRng + RngCore)) -> Plaintext {
        Plaintext(random_mod(rng, &self.n))
    }

    /// Validate that the `plaintext` is a valid input to the Paillier encryption key.
    pub fn validate_plaintext(&self, p: &Plaintext) -> bool {
        member_of_mod(&p.0, &self.n)
    }

    /// Validate that the `ciphertext` is a valid output of the Paillier encryption key.
    pub fn validate_ciphertext(&self, c: &Ciphertext) -> bool {
        member_of_mod(&c.0, &self.nn)
    }

    /// Validate that the `randomness` is a valid input to the Paillier encryption key.
    pub fn validate_randomness(&self, r: &Randomness) -> bool {
        member_of_mul_group(&r.0, &self.n)
    }

    /// Encrypt a plaintext `p` with freshly sampled randomness.
    pub fn encrypt(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        p: &Plaintext,
    ) -> CryptoResult<(Ciphertext, Randomness)> {
        let r = self.sample_randomness(rng);
        Ok((self.encrypt_with_randomness(p, &r)?, r))
    }

    /// `(m, r) -> (n+1)^m r^n mod n²`
    pub fn encrypt_with_randomness(
        &self,
        p: &Plaintext,
        r: &Randomness,
    ) -> CryptoResult<Ciphertext> {
        if !self.validate_plaintext(p) {
            return Err(CryptoError::DomainViolation("plaintext not in [0, n)"));
        }
        if !self.validate_randomness(r) {
            return Err(CryptoError::DomainViolation("randomizer not in Z*_n"));
        }

        let gm = self.g.modpow(&p.0, &self.nn);
        let rn = r.0.modpow(&self.n, &self.nn);
        Ok(Ciphertext(gm.modmul(&rn, &self.nn)))
    }

    /// Homomorphically add `c1` to `c2`
    pub fn add(&self, c1: &Ciphertext, c2: &Ciphertext) -> CryptoResult<Ciphertext> {
        if !self.validate_ciphertext(c1) || !self.validate_ciphertext(c2) {
            return Err(CryptoError::DomainViolation("ciphertext not in [0, n^2)"));
        }
        Ok(Ciphertext(c1.0.modmul(&c2.0, &self.nn)))
    }

    /// Homomorphically multiply `c` by the scalar `p`
    pub fn mul(&self, c: &Ciphertext, p: &Plaintext) -> CryptoResult<Ciphertext> {
        if !self.validate_ciphertext(c) {
            return Err(CryptoError::DomainViolation("ciphertext not in [0, n^2)"));
        }
        if !self.validate_plaintext(p) {
            return Err(CryptoError::DomainViolation("scalar not in [0, n)"));
        }
        Ok(Ciphertext(c.0.modpow(&p.0, &self.nn)))
    }

    /// Re-randomize: `(c, r) -> c r^n mod n²`. The fresh ciphertext decrypts
    /// to the same plaintext but is unlinkable to `c`.
    pub fn randomize(&self, c: &Ciphertext, r: &Randomness) -> CryptoResult<Ciphertext> {
        if !self.validate_ciphertext(c) {
            return Err(CryptoError::DomainViolation("ciphertext not in [0, n^2)"));
        }
        if !self.validate_randomness(r) {
            return Err(CryptoError::DomainViolation("randomizer not in Z*_n"));
        }
        Ok(Ciphertext(
            c.0.modmul(&r.0.modpow(&self.n, &self.nn), &self.nn),
        ))
    }

    /// `[len‖n]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &self.n)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let n = read_bigint(bytes, &mut pos)?;
        expect_end(bytes, pos)?;
        if n < BigNumber::from(3u64) {
            return Err(CryptoError::CorruptEncoding("modulus too small"));
        }
        Ok(Self::from_modulus(n))
    }
}

/// `g` and `n²` are derived state: only `n` goes over the wire.
impl Serialize for EncryptionKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.n.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EncryptionKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = BigNumber::deserialize(deserializer)?;
        Ok(Self::from_modulus(n))
    }
}

/// Paillier decryption key `(public, d, d⁻¹ mod n)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct DecryptionKey {
    ek: EncryptionKey,
    d: BigNumber,
    d_inv: BigNumber,
}

impl DecryptionKey {
    pub fn ek(&self) -> &EncryptionKey {
        &self.ek
    }

    /// `c -> d⁻¹ ((c^d mod n² - 1)/n) mod n`
    pub fn decrypt(&self, c: &Ciphertext) -> CryptoResult<Plaintext> {
        if !self.ek.validate_ciphertext(c) {
            return Err(CryptoError::DomainViolation("ciphertext not in [0, n^2)"));
        }
        let num = c.0.modpow(&self.d, self.ek.nn()) - BigNumber::one();
        let ell = &num / self.ek.n();
        Ok(Plaintext(ell.modmul(&self.d_inv, self.ek.n())))
    }

    /// `[public ‖ len‖d ‖ public-length:4]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = self.ek.to_bytes()?;
        let inner_len = buf.len();
        append_bigint(&mut buf, &self.d)?;
        seal_layer(&mut buf, inner_len)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (inner, fields) = peel_layer(bytes)?;
        let ek = EncryptionKey::from_bytes(inner)?;
        let mut pos = 0;
        let d = read_bigint(fields, &mut pos)?;
        expect_end(fields, pos)?;
        let d_inv = d
            .invert(ek.n())
            .ok_or(CryptoError::CorruptEncoding("private exponent not a unit"))?;
        Ok(Self { ek, d, d_inv })
    }
}

/// Wrapper for Paillier plaintext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct Plaintext(pub(crate) BigNumber);

impl Plaintext {
    /// Generate a random plaintext in the range [0, n)
    pub fn generate(n: &BigNumber) -> Self {
        Self(BigNumber::random(n))
    }

    /// Generate a random plaintext in the range `[0, n)` with the provided `rng`
    pub fn generate_with_rng(rng: &mut (impl CryptoRng + RngCore), n: &BigNumber) -> Self {
        Self(BigNumber::from_rng(n, rng))
    }

    pub fn to_scalar(&self) -> k256::Scalar {
        to_scalar(&self.0)
    }

    pub fn from_scalar(s: &k256::Scalar) -> Self {
        Self(to_bigint(s))
    }
}

/// prefer `Plaintext` associated functions over `From` impls
/// because my IDE can follow the links
impl From<&Plaintext> for k256::Scalar {
    fn from(p: &Plaintext) -> Self {
        p.to_scalar()
    }
}

impl From<&k256::Scalar> for Plaintext {
    fn from(s: &k256::Scalar) -> Self {
        Plaintext::from_scalar(s)
    }
}

/// Wrapper for Paillier ciphertext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext(pub(crate) BigNumber);

impl Ciphertext {
    /// `[len‖c]`
    pub fn to_bytes(&self) -> CryptoResult<BytesVec> {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &self.0)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        let c = read_bigint(bytes, &mut pos)?;
        expect_end(bytes, pos)?;
        Ok(Self(c))
    }
}

/// Wrapper for randomness used in Paillier encryption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct Randomness(pub(crate) BigNumber);

impl Randomness {
    /// Generate a random number in the range `[0, n)`
    pub fn generate(n: &BigNumber) -> Self {
        Self(BigNumber::random(n))
    }

    /// Generate a random number in the range `[0, n)` with the provided `rng`
    pub fn generate_with_rng(rng: &mut (impl CryptoRng + RngCore), n: &BigNumber) -> Self {
        Self(BigNumber::from_rng(n, rng))
    }
}

pub(crate) fn to_bigint(s: &k256::Scalar) -> BigNumber {
    BigNumber::from_slice(s.to_bytes().as_slice())
}

pub(crate) fn to_scalar(bigint: &BigNumber) -> k256::Scalar {
    use crypto_bigint::ArrayEncoding;
    use ecdsa::elliptic_curve::ops::Reduce;

    let s = mod_secp256k1(bigint);
    let s_pad = pad32(s.to_bytes());
    let s_bytes = *k256::FieldBytes::from_slice(&s_pad);
    k256::Scalar::reduce(k256::U256::from_be_byte_array(s_bytes))
}

/// pad `v` with leading zero bytes until it has length 32
/// panics if `v.len()` exceeds 32
fn pad32(v: Vec<u8>) -> Vec<u8> {
    debug_assert!(v.len() <= 32);

    if v.len() >= 32 {
        return v[..32].to_vec();
    }

    let mut v_pad = vec![0; 32];
    v_pad[(32 - v.len())..].copy_from_slice(&v);
    v_pad
}

/// The order of the secp256k1 curve
const SECP256K1_CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// secp256k1 curve order as a `BigNumber`
pub(crate) fn secp256k1_modulus() -> BigNumber {
    BigNumber::from_slice(SECP256K1_CURVE_ORDER.as_ref())
}

/// `q^e` for small `e`
pub(crate) fn secp256k1_modulus_pow(e: u32) -> BigNumber {
    let q = secp256k1_modulus();
    (0..e).fold(BigNumber::one(), |acc, _| acc * &q)
}

/// reduce `n` modulo the order of the secp256k1 curve
fn mod_secp256k1(n: &BigNumber) -> BigNumber {
    n % &secp256k1_modulus()
}

#[cfg(any(test, feature = "malicious"))]
pub mod malicious {
    use super::*;

    impl Plaintext {
        pub fn corrupt(&mut self) {
            self.0 += BigNumber::one();
        }
    }

    impl Ciphertext {
        pub fn corrupt(&mut self) {
            self.0 += BigNumber::one();
        }

        pub fn corrupt_owned(mut self) -> Self {
            self.corrupt();
            self
        }
    }
}
