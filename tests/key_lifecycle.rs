//! Drive the public key-management API end to end: deal a threshold key,
//! ship it through both serialization formats, and decrypt with the parsed
//! copies.
use tecdsa::crypto_tools::{
    integer::from_decimal,
    paillier::{
        keyfile::{read_threshold_key, write_threshold_key},
        threshold::{dealer_keygen_unsafe, PartialDecryption, ThresholdPublicKey},
        Ciphertext, Plaintext,
    },
};

#[test]
fn threshold_key_lifecycle() {
    let mut rng = rand::thread_rng();
    let (pubkey, shares) = dealer_keygen_unsafe(&mut rng, 512, 5, 3).unwrap();

    // ship everything through the text key file
    let text = write_threshold_key(&pubkey, &shares).unwrap();
    let (parsed_pubkey, parsed_shares) = read_threshold_key(&text).unwrap();
    assert_eq!(parsed_pubkey, pubkey);
    assert_eq!(parsed_shares, shares);

    // ship the public key through the binary layered encoding too
    let pubkey_bytes = pubkey.to_bytes().unwrap();
    let pubkey_from_bytes = ThresholdPublicKey::from_bytes(&pubkey_bytes).unwrap();
    assert_eq!(pubkey_from_bytes, pubkey);

    // encrypt under the original key, decrypt with the parsed shares
    let msg = Plaintext::from_scalar(&k256::Scalar::from(122333356u64));
    let (ciphertext, _) = parsed_pubkey.ek().encrypt(&mut rng, &msg).unwrap();

    // partial decryptions survive their own wire format
    let partials: Vec<PartialDecryption> = parsed_shares[2..5]
        .iter()
        .map(|share| {
            let partial = share.partial_decrypt(&parsed_pubkey, &ciphertext).unwrap();
            PartialDecryption::from_bytes(&partial.to_bytes().unwrap()).unwrap()
        })
        .collect();

    assert_eq!(parsed_pubkey.combine(&partials).unwrap(), msg);

    // ciphertext codec round trip
    let ciphertext_bytes = ciphertext.to_bytes().unwrap();
    assert_eq!(
        Ciphertext::from_bytes(&ciphertext_bytes).unwrap(),
        ciphertext
    );

    // the key file speaks plain base-10
    let n_line = text
        .lines()
        .find(|line| line.starts_with("n:"))
        .unwrap()
        .trim_start_matches("n:");
    assert_eq!(&from_decimal(n_line).unwrap(), parsed_pubkey.ek().n());
}
