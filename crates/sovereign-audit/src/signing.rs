//! Ed25519 signing of Alpha rulings.
//!
//! Alpha signs every ruling before it is sealed. The audit trace holds the
//! verifying key as its identity anchor and refuses, on append and on replay,
//! any decision whose signature is missing, made by another key, or does not
//! cover the decision's content.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use sovereign_types::{
    AlphaSignature, AuthorityId, CanonicalKey, Decision, DecisionAction, DecisionSource, Ruling,
};

use crate::error::AuditError;

const SIGNING_DOMAIN: &[u8] = b"sovereign-alpha-v1:";
const FINGERPRINT_LEN: usize = 16;

/// The part of a ruling the signature covers.
#[derive(Serialize)]
struct SignedBody<'a> {
    issuer: &'a AuthorityId,
    scope: &'a CanonicalKey,
    action: &'a DecisionAction,
    source: &'a DecisionSource,
}

fn message(body: &SignedBody<'_>) -> Result<Vec<u8>, AuditError> {
    let mut bytes = SIGNING_DOMAIN.to_vec();
    serde_json::to_writer(&mut bytes, body).map_err(|e| AuditError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn ruling_body(ruling: &Ruling) -> SignedBody<'_> {
    SignedBody {
        issuer: ruling.issuer(),
        scope: ruling.scope(),
        action: ruling.action(),
        source: ruling.source(),
    }
}

fn decision_body(decision: &Decision) -> SignedBody<'_> {
    SignedBody {
        issuer: decision.issuer(),
        scope: decision.scope(),
        action: decision.action(),
        source: decision.source(),
    }
}

/// Sign `ruling` with Alpha's key.
pub fn sign_ruling(ruling: Ruling, key: &SigningKey) -> Result<Ruling, AuditError> {
    let signature = key.sign(&message(&ruling_body(&ruling))?);
    let verifying = key.verifying_key();
    Ok(ruling.with_signature(AlphaSignature {
        signature: hex_encode(&signature.to_bytes()),
        public_key: hex_encode(verifying.as_bytes()),
        key_fingerprint: key_fingerprint(&verifying),
    }))
}

/// Check `ruling` carries a valid signature by `anchor`.
pub fn verify_ruling(ruling: &Ruling, anchor: &VerifyingKey) -> Result<(), String> {
    verify(&ruling_body(ruling), ruling.signature(), anchor)
}

/// Check a sealed decision still carries a valid signature by `anchor`.
pub fn verify_decision(decision: &Decision, anchor: &VerifyingKey) -> Result<(), String> {
    verify(&decision_body(decision), decision.signature(), anchor)
}

/// Short BLAKE3 fingerprint of a verifying key.
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    let hash = blake3::hash(key.as_bytes()).to_hex();
    hash.as_str()[..FINGERPRINT_LEN].to_string()
}

/// Parse a 32-byte hex seed into a signing key.
pub fn signing_key_from_hex(seed: &str) -> Result<SigningKey, String> {
    let bytes = hex_decode(seed.trim()).map_err(|_| "signing key is not hex".to_string())?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("signing key must be 32 bytes, got {}", bytes.len()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn verify(
    body: &SignedBody<'_>,
    signature: Option<&AlphaSignature>,
    anchor: &VerifyingKey,
) -> Result<(), String> {
    let signature = signature.ok_or("decision is unsigned")?;

    if signature.public_key != hex_encode(anchor.as_bytes()) {
        return Err(format!(
            "signed by key {}, not the Alpha anchor {}",
            signature.key_fingerprint,
            key_fingerprint(anchor)
        ));
    }
    if signature.key_fingerprint != key_fingerprint(anchor) {
        return Err("key fingerprint does not match the signing key".into());
    }

    let bytes = hex_decode(&signature.signature).map_err(|_| "signature is not hex")?;
    let bytes: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| "signature must be 64 bytes")?;
    let message = message(body).map_err(|e| e.to_string())?;

    anchor
        .verify(&message, &Signature::from_bytes(&bytes))
        .map_err(|_| "signature does not cover this decision".to_string())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}
