//! Wallet address validation
//!
//! Addresses must be base58-encoded ed25519 public keys: 32-44 characters
//! from the Bitcoin base58 alphabet (no `0`, `O`, `I`, `l`), decoding to
//! exactly 32 bytes. Validation runs before any RPC traffic is spent on a
//! request.

use thiserror::Error;

/// Rejection reasons for a wallet address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address length {0} outside 32-44 characters")]
    BadLength(usize),

    #[error("address contains non-base58 character {0:?}")]
    BadCharacter(char),

    #[error("address does not decode to a 32-byte public key")]
    NotAPublicKey,
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Validate a base58 wallet address
pub fn validate_wallet_address(address: &str) -> Result<(), AddressError> {
    let len = address.len();
    if !(32..=44).contains(&len) {
        return Err(AddressError::BadLength(len));
    }

    if let Some(bad) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(AddressError::BadCharacter(bad));
    }

    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::NotAPublicKey)?;

    if decoded.len() != 32 {
        return Err(AddressError::NotAPublicKey);
    }

    Ok(())
}
