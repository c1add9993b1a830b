//! Issuing and validating flags.
//!
//! A flag is a random 4-byte nonce followed by its raw PKCS#1 v1.5 signature
//! (no digest), both hex encoded, and a trailing `=`. With the 128-bit key
//! from [`generate_key`] that is 8 + 32 + 1 = 41 characters.

use std::error::Error as StdError;

use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

/// Smallest modulus that still fits a padded 4-byte signature
pub const KEY_BITS: usize = 128;

const NONCE_LEN: usize = 4;
const TERMINATOR: char = '=';

#[derive(Debug, Display)]
pub enum FlagError {
  #[display(fmt = "could not generate key: {}", _0)]
  KeyGen(rsa::Error),
  #[display(fmt = "could not sign nonce: {}", _0)]
  Sign(rsa::Error),
  #[display(fmt = "flag length is {}, expected {}", _0, _1)]
  Length(usize, usize),
  #[display(fmt = "no '=' at end of flag")]
  Terminator,
  #[display(fmt = "flag is not lowercase hex")]
  Hex,
  #[display(fmt = "bad signature")]
  Signature,
}

impl StdError for FlagError {}

pub fn generate_key() -> Result<RsaPrivateKey, FlagError> {
  RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS).map_err(FlagError::KeyGen)
}

pub fn generate_flag(key: &RsaPrivateKey) -> Result<String, FlagError> {
  let mut nonce = [0u8; NONCE_LEN];
  rand::thread_rng().fill_bytes(&mut nonce);

  let signature = key
    .sign(Pkcs1v15Sign::new_unprefixed(), &nonce)
    .map_err(FlagError::Sign)?;

  Ok(format!(
    "{}{}{}",
    hex::encode(nonce),
    hex::encode(signature),
    TERMINATOR
  ))
}

/// Length of every flag signed by the private half of `key`
pub fn flag_len(key: &RsaPublicKey) -> usize {
  2 * (NONCE_LEN + key.size()) + 1
}

/// Check a submitted flag against the public key, reporting why it's bad.
///
/// This never touches the database: a flag passing here may still have
/// never been issued.
pub fn validate_flag(flag: &str, key: &RsaPublicKey) -> Result<(), FlagError> {
  let expected = flag_len(key);
  if flag.len() != expected {
    return Err(FlagError::Length(flag.len(), expected));
  }

  let (body, terminator) = flag.as_bytes().split_at(expected - 1);
  if terminator != [TERMINATOR as u8] {
    return Err(FlagError::Terminator);
  }

  // uppercase would decode to the same bytes, so a flag has one spelling only
  if !body.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
    return Err(FlagError::Hex);
  }

  let (nonce, signature) = body.split_at(2 * NONCE_LEN);
  let nonce = hex::decode(nonce).map_err(|_| FlagError::Hex)?;
  let signature = hex::decode(signature).map_err(|_| FlagError::Hex)?;

  key
    .verify(Pkcs1v15Sign::new_unprefixed(), &nonce, &signature)
    .map_err(|_| FlagError::Signature)
}

pub fn valid_flag(flag: &str, key: &RsaPublicKey) -> bool {
  validate_flag(flag, key).is_ok()
}
