//! The plain-text threshold key file: line-oriented `name:value` records with
//! base-10 integer values. The file stores every share; a production tool is
//! expected to split it across parties before distribution.
use crate::crypto_tools::integer::{from_decimal, to_decimal};
use crate::sdk::api::{CryptoError, CryptoResult};

use super::threshold::{KeyShare, ThresholdPublicKey};

/// Render a threshold key and all of its shares in the key-file format:
/// `l`, `w`, `v`, `n`, `combineSharesConstant`, then one `s<i>`/`v<i>` pair
/// per share, in that exact order.
pub fn write_threshold_key(
    pubkey: &ThresholdPublicKey,
    shares: &[KeyShare],
) -> CryptoResult<String> {
    if shares.len() != pubkey.share_count() {
        return Err(CryptoError::KeyMismatch("share count mismatch"));
    }

    let mut out = String::new();
    out.push_str(&format!("l:{}\n", pubkey.share_count()));
    out.push_str(&format!("w:{}\n", pubkey.threshold()));
    out.push_str(&format!("v:{}\n", to_decimal(pubkey.v())));
    out.push_str(&format!("n:{}\n", to_decimal(pubkey.ek().n())));
    out.push_str(&format!(
        "combineSharesConstant:{}\n",
        to_decimal(pubkey.combine_constant())
    ));
    for (i, share) in shares.iter().enumerate() {
        if share.id() != i + 1 {
            return Err(CryptoError::KeyMismatch("shares out of order"));
        }
        out.push_str(&format!(
            "s{}:{}\tv{}:{}\n",
            i,
            to_decimal(share.s_i()),
            i,
            to_decimal(pubkey.verification_key(share.id())?)
        ));
    }
    Ok(out)
}

/// Parse a key file produced by [write_threshold_key]. Token order is fixed;
/// whitespace (including the line structure) is insignificant beyond
/// separating tokens.
pub fn read_threshold_key(text: &str) -> CryptoResult<(ThresholdPublicKey, Vec<KeyShare>)> {
    let mut tokens = text.split_whitespace();

    let l = parse_count(named_token(tokens.next(), "l")?)?;
    let w = parse_count(named_token(tokens.next(), "w")?)?;
    let v = from_decimal(named_token(tokens.next(), "v")?)?;
    let n = from_decimal(named_token(tokens.next(), "n")?)?;
    let combine_constant = from_decimal(named_token(tokens.next(), "combineSharesConstant")?)?;

    let mut s_values = Vec::with_capacity(l);
    let mut v_values = Vec::with_capacity(l);
    for i in 0..l {
        let s_name = format!("s{i}");
        let v_name = format!("v{i}");
        s_values.push(from_decimal(named_token(tokens.next(), &s_name)?)?);
        v_values.push(from_decimal(named_token(tokens.next(), &v_name)?)?);
    }
    if tokens.next().is_some() {
        return Err(CryptoError::CorruptEncoding("trailing key file entries"));
    }

    let pubkey = ThresholdPublicKey::from_parts(n, l, w, v, v_values, combine_constant)?;
    let shares = s_values
        .into_iter()
        .enumerate()
        .map(|(i, s_i)| KeyShare::new(i + 1, s_i))
        .collect();
    Ok((pubkey, shares))
}

fn named_token<'a>(token: Option<&'a str>, expected: &str) -> CryptoResult<&'a str> {
    let token = token.ok_or(CryptoError::CorruptEncoding("missing key file entry"))?;
    let (name, value) = token
        .split_once(':')
        .ok_or(CryptoError::CorruptEncoding("malformed key file entry"))?;
    if name != expected {
        return Err(CryptoError::CorruptEncoding("key file entry out of order"));
    }
    Ok(value)
}

fn parse_count(s: &str) -> CryptoResult<usize> {
    s.parse()
        .map_err(|_| CryptoError::CorruptEncoding("malformed count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_tools::paillier::threshold::tests::test_dealer_keygen;

    #[test]
    fn key_file_round_trip() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);

        let text = write_threshold_key(&pubkey, &shares).unwrap();
        assert!(text.starts_with("l:5\nw:3\nv:"));

        let (pubkey2, shares2) = read_threshold_key(&text).unwrap();
        assert_eq!(pubkey, pubkey2);
        assert_eq!(shares, shares2);
    }

    #[test]
    fn key_file_rejects_damage() {
        let (pubkey, shares) = test_dealer_keygen(5, 3);
        let text = write_threshold_key(&pubkey, &shares).unwrap();

        // drop the last line
        let truncated = text.rsplit_once('\n').unwrap().0.rsplit_once('\n').unwrap().0;
        assert!(read_threshold_key(truncated).is_err());

        // reorder two entries
        let swapped = text.replacen("w:", "x:", 1);
        assert!(read_threshold_key(&swapped).is_err());

        // non-numeric value
        let mangled = text.replacen("l:5", "l:five", 1);
        assert!(read_threshold_key(&mangled).is_err());
    }
}
