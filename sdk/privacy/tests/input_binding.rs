use chacha20poly1305::aead::OsRng;
use gradeseal_identity::Identity;
use gradeseal_privacy::{EncryptionPipeline, InputError, SealedInput, open_value};
use x25519_dalek::{PublicKey, StaticSecret};

const CONTRACT: Identity = Identity([0xc0; 20]);
const SUBMITTER: Identity = Identity([0x5e; 20]);

fn setup() -> (StaticSecret, EncryptionPipeline) {
    let sk = StaticSecret::random_from_rng(OsRng);
    let pipeline = EncryptionPipeline::new(PublicKey::from(&sk).to_bytes());
    (sk, pipeline)
}

fn sealed_grade(pipeline: &EncryptionPipeline, grade: i64) -> SealedInput {
    pipeline.encrypt_grade(grade, CONTRACT, SUBMITTER).unwrap()
}

#[test]
fn verifies_for_intended_pair_and_opens() {
    let (sk, pipeline) = setup();
    let input = sealed_grade(&pipeline, 85);

    input.verify(&CONTRACT, &SUBMITTER).unwrap();
    let value = open_value(input.proof().sealed(), &sk, &CONTRACT, &SUBMITTER).unwrap();
    assert_eq!(value, 85);
}

#[test]
fn rejects_other_submitter() {
    let (_, pipeline) = setup();
    let input = sealed_grade(&pipeline, 85);

    let err = input.verify(&CONTRACT, &Identity([0x77; 20])).unwrap_err();
    assert!(matches!(err, InputError::InvalidProof(_)));
}

#[test]
fn rejects_other_contract() {
    let (_, pipeline) = setup();
    let input = sealed_grade(&pipeline, 85);

    let err = input.verify(&Identity([0x01; 20]), &SUBMITTER).unwrap_err();
    assert!(matches!(err, InputError::InvalidProof(_)));
}

#[test]
fn rejects_flipped_ciphertext_bit() {
    let (_, pipeline) = setup();
    let input = sealed_grade(&pipeline, 85);

    let mut json = serde_json::to_value(&input).unwrap();
    let ct = json["proof"]["sealed"]["ciphertext"].as_str().unwrap().to_string();
    let mut bytes = hex::decode(&ct).unwrap();
    bytes[0] ^= 0x01;
    json["proof"]["sealed"]["ciphertext"] = serde_json::Value::String(hex::encode(bytes));
    let tampered: SealedInput = serde_json::from_value(json).unwrap();

    assert!(tampered.verify(&CONTRACT, &SUBMITTER).is_err());
}

#[test]
fn rejects_handle_from_another_input() {
    let (_, pipeline) = setup();
    let a = sealed_grade(&pipeline, 10);
    let b = sealed_grade(&pipeline, 90);

    let mut json = serde_json::to_value(&a).unwrap();
    json["handle"] = serde_json::to_value(b.handle()).unwrap();
    let spliced: SealedInput = serde_json::from_value(json).unwrap();

    assert!(spliced.verify(&CONTRACT, &SUBMITTER).is_err());
}

#[test]
fn network_key_is_required_to_open() {
    let (_, pipeline) = setup();
    let input = sealed_grade(&pipeline, 85);
    let other = StaticSecret::random_from_rng(OsRng);

    assert!(open_value(input.proof().sealed(), &other, &CONTRACT, &SUBMITTER).is_err());
}
