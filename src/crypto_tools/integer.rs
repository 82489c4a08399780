//! Big-integer utilities: the length-prefixed byte codec, prime generation,
//! and rejection sampling over the groups used by the cryptosystems.
use rand::{CryptoRng, RngCore};
use unknown_order::BigNumber;

use crate::sdk::api::{BytesVec, CryptoError, CryptoResult};

/// Every length field in the codec is a 4-byte big-endian integer.
pub const LEN_BYTES: usize = 4;

pub fn append_u32(buf: &mut BytesVec, value: usize) -> CryptoResult<()> {
    let value = u32::try_from(value).map_err(|_| CryptoError::EncodingOverflow)?;
    buf.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Append `[len:4 ‖ bytes]` where `bytes` is the two's-complement big-endian
/// form of `x`. All encoded values are nonnegative, so two's complement only
/// requires keeping the sign bit of the leading byte clear.
pub fn append_bigint(buf: &mut BytesVec, x: &BigNumber) -> CryptoResult<()> {
    if x < &BigNumber::zero() {
        return Err(CryptoError::DomainViolation(
            "cannot encode a negative integer",
        ));
    }
    let mut bytes = x.to_bytes();
    if bytes.first().map_or(false, |b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    append_u32(buf, bytes.len())?;
    buf.extend_from_slice(&bytes);
    Ok(())
}

/// Canonical big-endian decode of a 4-byte integer,
/// each byte masked to its unsigned form.
pub fn read_u32(buf: &[u8], pos: &mut usize) -> CryptoResult<u32> {
    let end = pos
        .checked_add(LEN_BYTES)
        .ok_or(CryptoError::CorruptEncoding("position overflow"))?;
    if end > buf.len() {
        return Err(CryptoError::CorruptEncoding("truncated length field"));
    }
    let value = ((buf[*pos] as u32) << 24)
        | ((buf[*pos + 1] as u32) << 16)
        | ((buf[*pos + 2] as u32) << 8)
        | (buf[*pos + 3] as u32);
    *pos = end;
    Ok(value)
}

pub fn read_bigint(buf: &[u8], pos: &mut usize) -> CryptoResult<BigNumber> {
    let len = read_u32(buf, pos)? as usize;
    let end = pos
        .checked_add(len)
        .ok_or(CryptoError::CorruptEncoding("position overflow"))?;
    if end > buf.len() {
        return Err(CryptoError::CorruptEncoding(
            "length extends past the buffer",
        ));
    }
    let x = BigNumber::from_slice(&buf[*pos..end]);
    *pos = end;
    Ok(x)
}

/// Append the trailing layer length of a layered record
/// `[inner-layer ‖ fields ‖ inner-layer-length:4]`.
pub fn seal_layer(buf: &mut BytesVec, inner_len: usize) -> CryptoResult<()> {
    append_u32(buf, inner_len)
}

/// Peel the outermost layer of a layered record: read the trailing 4 bytes,
/// slice off the inner layer, and return `(inner, fields)`.
pub fn peel_layer(buf: &[u8]) -> CryptoResult<(&[u8], &[u8])> {
    if buf.len() < LEN_BYTES {
        return Err(CryptoError::CorruptEncoding("missing layer length"));
    }
    let mut pos = buf.len() - LEN_BYTES;
    let inner_len = read_u32(buf, &mut pos)? as usize;
    let rest = &buf[..buf.len() - LEN_BYTES];
    if inner_len > rest.len() {
        return Err(CryptoError::CorruptEncoding(
            "layer length extends past the buffer",
        ));
    }
    Ok((&rest[..inner_len], &rest[inner_len..]))
}

/// A parse must consume the whole buffer; trailing garbage is a corrupt encoding.
pub fn expect_end(buf: &[u8], pos: usize) -> CryptoResult<()> {
    if pos != buf.len() {
        return Err(CryptoError::CorruptEncoding("trailing bytes"));
    }
    Ok(())
}

/// Return a random integer of exactly `bits` bits that passes the backend's
/// Miller-Rabin test (the backend runs well over the 50 required rounds for
/// the modulus sizes we admit).
pub fn probable_prime(rng: &mut (impl CryptoRng + RngCore), bits: usize) -> BigNumber {
    BigNumber::prime_from_rng(bits, rng)
}

/// Sample `p'` as a `bits - 1` bit probable prime and accept `p = 2p' + 1`
/// if `p` is also prime; retry until success. Returns `(p, p')`.
pub fn safe_prime_pair(
    rng: &mut (impl CryptoRng + RngCore),
    bits: usize,
) -> (BigNumber, BigNumber) {
    loop {
        let p_prime = BigNumber::prime_from_rng(bits - 1, rng);
        let p = (p_prime.clone() << 1usize) + 1u32;
        if p.bit_length() == bits && p.is_prime() {
            return (p, p_prime);
        }
    }
}

/// Uniform sample from `[0, n)`.
pub fn random_mod(rng: &mut (impl CryptoRng + RngCore), n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Uniform sample from `Z*_n`: rejection-sample `[1, n)` until coprime to `n`.
pub fn random_mod_star(rng: &mut (impl CryptoRng + RngCore), n: &BigNumber) -> BigNumber {
    loop {
        let x = BigNumber::from_rng(n, rng);
        if x >= BigNumber::one() && x.gcd(n).is_one() {
            return x;
        }
    }
}

/// Uniform sample from `Z*_{n²}`.
pub fn random_mod_nn_star(rng: &mut (impl CryptoRng + RngCore), n: &BigNumber) -> BigNumber {
    random_mod_star(rng, &(n * n))
}

pub fn factorial(l: usize) -> BigNumber {
    (2..=l).fold(BigNumber::one(), |acc, i| acc * BigNumber::from(i as u64))
}

/// Decimal rendering for the text key-file format.
pub fn to_decimal(x: &BigNumber) -> String {
    let zero = BigNumber::zero();
    if x == &zero {
        return "0".to_string();
    }
    let ten = BigNumber::from(10u64);
    let mut digits = Vec::new();
    let mut x = x.clone();
    while x > zero {
        let digit = &x % &ten;
        let bytes = digit.to_bytes();
        digits.push(b'0' + bytes.last().copied().unwrap_or(0));
        x = &x / &ten;
    }
    digits.reverse();
    String::from_utf8(digits).expect("decimal digits are ascii")
}

/// Parse a base-10 nonnegative integer for the text key-file format.
pub fn from_decimal(s: &str) -> CryptoResult<BigNumber> {
    if s.is_empty() {
        return Err(CryptoError::CorruptEncoding("empty decimal value"));
    }
    let ten = BigNumber::from(10u64);
    let mut acc = BigNumber::zero();
    for c in s.bytes() {
        if !c.is_ascii_digit() {
            return Err(CryptoError::CorruptEncoding("non-digit in decimal value"));
        }
        acc = acc * &ten + BigNumber::from((c - b'0') as u64);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip() {
        let values = [
            BigNumber::zero(),
            BigNumber::one(),
            BigNumber::from(0x80u64), // sign bit of the leading byte set
            BigNumber::from(u64::MAX),
            BigNumber::prime(128),
        ];

        let mut buf = Vec::new();
        for v in &values {
            append_bigint(&mut buf, v).unwrap();
        }

        let mut pos = 0;
        for v in &values {
            assert_eq!(&read_bigint(&buf, &mut pos).unwrap(), v);
        }
        expect_end(&buf, pos).unwrap();

        // every one-byte truncation of the buffer fails to parse in full
        for cut in 0..buf.len() {
            let truncated = &buf[..cut];
            let mut pos = 0;
            let mut ok = true;
            for _ in &values {
                match read_bigint(truncated, &mut pos) {
                    Ok(_) => {}
                    Err(CryptoError::CorruptEncoding(_)) => {
                        ok = false;
                        break;
                    }
                    Err(err) => panic!("unexpected error kind {err:?}"),
                }
            }
            assert!(!ok);
        }
    }

    #[test]
    fn layered_record() {
        let mut inner = Vec::new();
        append_bigint(&mut inner, &BigNumber::from(42u64)).unwrap();

        let mut outer = inner.clone();
        append_bigint(&mut outer, &BigNumber::from(7u64)).unwrap();
        seal_layer(&mut outer, inner.len()).unwrap();

        let (peeled_inner, fields) = peel_layer(&outer).unwrap();
        assert_eq!(peeled_inner, &inner[..]);
        let mut pos = 0;
        assert_eq!(read_bigint(fields, &mut pos).unwrap(), BigNumber::from(7u64));

        // a layer length past the buffer is corrupt
        let mut bad = inner.clone();
        seal_layer(&mut bad, inner.len() + 1).unwrap();
        assert_eq!(
            peel_layer(&bad).unwrap_err(),
            CryptoError::CorruptEncoding("layer length extends past the buffer")
        );
    }

    #[test]
    fn negative_rejected() {
        let mut buf = Vec::new();
        assert_eq!(
            append_bigint(&mut buf, &(-BigNumber::one())).unwrap_err(),
            CryptoError::DomainViolation("cannot encode a negative integer")
        );
    }

    #[test]
    fn safe_primes() {
        let mut rng = rand::thread_rng();
        let (p, p_prime) = safe_prime_pair(&mut rng, 64);
        assert_eq!(p, (p_prime.clone() << 1) + 1);
        assert!(p.is_prime());
        assert!(p_prime.is_prime());
        assert_eq!(p.bit_length(), 64);
    }

    #[test]
    fn sampling() {
        let mut rng = rand::thread_rng();
        let n = BigNumber::from(5u64) * BigNumber::from(7u64);
        let nn = &n * &n;
        for _ in 0..100 {
            let x = random_mod(&mut rng, &n);
            assert!(x >= BigNumber::zero() && x < n);
            let y = random_mod_star(&mut rng, &n);
            assert!(y >= BigNumber::one() && y < n);
            assert!(y.gcd(&n).is_one());
            let z = random_mod_nn_star(&mut rng, &n);
            assert!(z >= BigNumber::one() && z < nn);
            assert!(z.gcd(&nn).is_one());
        }
    }

    #[test]
    fn factorials() {
        assert_eq!(factorial(0), BigNumber::one());
        assert_eq!(factorial(1), BigNumber::one());
        assert_eq!(factorial(5), BigNumber::from(120u64));
        assert_eq!(factorial(10), BigNumber::from(3628800u64));
    }

    #[test]
    fn decimal_round_trip() {
        let values = [
            BigNumber::zero(),
            BigNumber::from(9u64),
            BigNumber::from(1234567890u64),
            BigNumber::prime(256),
        ];
        for v in &values {
            assert_eq!(&from_decimal(&to_decimal(v)).unwrap(), v);
        }
        assert!(from_decimal("12x3").is_err());
        assert!(from_decimal("").is_err());
    }
}
