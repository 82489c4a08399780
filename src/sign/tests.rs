use std::convert::TryFrom;

use ecdsa::hazmat::VerifyPrimitive;
use tracing_test::traced_test;

use super::{
    malicious::Behaviour::{self, Honest, R2BadOpen, R2BadProof, R4BadProof},
    new_sign,
    plain::new_sign_plain,
    MessageDigest, SignOutput, SignPartyId, Signer,
};
use crate::{
    collections::{FillVecMap, TypedUsize},
    keygen::tests::test_signing_group,
    sdk::api::{BytesVec, Fault},
};

const SIGNER_IDS: [usize; 3] = [1, 2, 3];

fn msg_to_sign() -> MessageDigest {
    MessageDigest::try_from(&b"Hello Universe"[..]).expect("could not convert msg to MessageDigest")
}

/// every party receives the same positional bag of broadcasts
fn bag(msgs: &[BytesVec]) -> FillVecMap<SignPartyId, BytesVec> {
    let mut bag = FillVecMap::with_size(msgs.len());
    for (i, msg) in msgs.iter().enumerate() {
        bag.set(TypedUsize::from_usize(i), msg.clone()).unwrap();
    }
    bag
}

fn new_signers(behaviours: [Behaviour; 3]) -> Vec<Signer> {
    let key_shares = test_signing_group();
    let msg = msg_to_sign();
    SIGNER_IDS
        .iter()
        .zip(behaviours)
        .map(|(&id, behaviour)| {
            let key_share = &key_shares[id - 1];
            new_sign(
                key_share.group(),
                key_share.share(),
                &SIGNER_IDS,
                &msg,
                behaviour,
            )
            .unwrap()
        })
        .collect()
}

fn execute_sign(behaviours: [Behaviour; 3]) -> Vec<SignOutput> {
    let mut signers = new_signers(behaviours);

    let r1: Vec<BytesVec> = signers.iter_mut().map(|s| s.round1().unwrap()).collect();
    let r2: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round2(bag(&r1)).unwrap())
        .collect();
    let r3: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round3(bag(&r2)).unwrap())
        .collect();
    let r4: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round4(bag(&r3)).unwrap())
        .collect();
    signers
        .iter_mut()
        .map(|s| s.finish(bag(&r4)).unwrap())
        .collect()
}

fn execute_sign_plain(behaviours: [Behaviour; 3]) -> Vec<SignOutput> {
    let key_shares = test_signing_group();
    let msg = msg_to_sign();
    let mut signers: Vec<_> = SIGNER_IDS
        .iter()
        .zip(behaviours)
        .map(|(&id, behaviour)| {
            let key_share = &key_shares[id - 1];
            new_sign_plain(
                key_share.group(),
                key_share.share(),
                &SIGNER_IDS,
                &msg,
                behaviour,
            )
            .unwrap()
        })
        .collect();

    let r1: Vec<BytesVec> = signers.iter_mut().map(|s| s.round1().unwrap()).collect();
    let r2: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round2(bag(&r1)).unwrap())
        .collect();
    let r3: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round3(bag(&r2)).unwrap())
        .collect();
    let r4: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round4(bag(&r3)).unwrap())
        .collect();
    let r5: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round5(bag(&r4)).unwrap())
        .collect();
    let r6: Vec<BytesVec> = signers
        .iter_mut()
        .map(|s| s.round6(bag(&r5)).unwrap())
        .collect();
    signers
        .iter_mut()
        .map(|s| s.finish(bag(&r6)).unwrap())
        .collect()
}

fn assert_outputs_verify(outputs: &[SignOutput]) {
    let group = test_signing_group()[0].group();
    let verifying_point = group.y().as_ref().to_affine();
    let prehash: k256::FieldBytes = (&msg_to_sign()).into();

    let first = outputs[0].as_ref().expect("party 0 aborted");
    for output in outputs {
        let signature = output.as_ref().expect("party aborted");
        assert_eq!(signature, first);
        verifying_point
            .verify_prehashed(&prehash, signature.as_ref())
            .unwrap();
    }
}

fn assert_honest_abort(outputs: &[SignOutput], faulter: usize) {
    for (party, output) in outputs.iter().enumerate() {
        if party == faulter {
            continue; // no claims about the faulter's own output
        }
        let faulters = output.as_ref().expect_err("honest party did not abort");
        for (from, fault) in faulters.iter() {
            if from.as_usize() == faulter {
                assert_eq!(fault, &Some(Fault::ProtocolFault));
            } else {
                assert_eq!(fault, &None);
            }
        }
    }
}

#[test]
#[traced_test]
fn basic_correctness() {
    let outputs = execute_sign([Honest, Honest, Honest]);
    assert_outputs_verify(&outputs);
}

#[test]
#[traced_test]
fn r2_bad_proof() {
    // a corrupted round-2 proof: every honest party marks the culprit and
    // yields no signature
    let outputs = execute_sign([Honest, R2BadProof, Honest]);
    assert_honest_abort(&outputs, 1);
}

#[test]
#[traced_test]
fn r2_bad_open() {
    // a round-1 commitment opened with a mutated secret: the commitment
    // check fails at every honest peer
    let outputs = execute_sign([Honest, R2BadOpen, Honest]);
    assert_honest_abort(&outputs, 1);
}

#[test]
#[traced_test]
fn plain_basic_correctness() {
    let outputs = execute_sign_plain([Honest, Honest, Honest]);
    assert_outputs_verify(&outputs);
}

#[test]
#[traced_test]
fn plain_r2_bad_proof() {
    let outputs = execute_sign_plain([Honest, R2BadProof, Honest]);
    assert_honest_abort(&outputs, 1);
}

#[test]
#[traced_test]
fn plain_r4_bad_proof() {
    let outputs = execute_sign_plain([Honest, Honest, R4BadProof]);
    assert_honest_abort(&outputs, 2);
}

#[test]
fn signer_validation() {
    use crate::sdk::api::CryptoError;

    let key_shares = test_signing_group();
    let key_share = &key_shares[0];
    let msg = msg_to_sign();

    // fewer than w signers
    assert_eq!(
        new_sign(key_share.group(), key_share.share(), &[1, 2], &msg, Honest).unwrap_err(),
        CryptoError::InsufficientShares { got: 2, need: 3 }
    );

    // duplicate signer id
    assert_eq!(
        new_sign(
            key_share.group(),
            key_share.share(),
            &[1, 1, 2],
            &msg,
            Honest
        )
        .unwrap_err(),
        CryptoError::DuplicateShare(1)
    );

    // my share is not among the signers
    assert_eq!(
        new_sign(
            key_share.group(),
            key_share.share(),
            &[2, 3, 4],
            &msg,
            Honest
        )
        .unwrap_err(),
        CryptoError::KeyMismatch("my share is not among the signers")
    );

    // share id out of range
    assert!(new_sign(
        key_share.group(),
        key_share.share(),
        &[1, 2, 99],
        &msg,
        Honest
    )
    .is_err());
}
