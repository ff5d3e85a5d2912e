//! Payer keypair loading.
//!
//! Accepts either a path to a Solana CLI keypair file (a JSON array of 64
//! bytes) or the same 64 bytes as a base58 string. Error messages never echo
//! the key material.

use solana_keypair::Keypair;
use std::path::Path;

use wirefeed::Error;

/// Loads a keypair from a file path, an inline JSON byte array, or base58 text.
///
/// # Errors
///
/// Returns [`Error::Wallet`] if the source cannot be read or does not hold
/// a valid 64-byte keypair.
pub fn load_keypair(source: &str) -> Result<Keypair, Error> {
    let source = source.trim();
    if source.is_empty() {
        return Err(Error::MissingWallet);
    }

    let path = Path::new(source);
    if path.is_file() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Wallet(format!("can not read {}: {e}", path.display())))?;
        return keypair_from_json(&text);
    }
    if source.starts_with('[') {
        return keypair_from_json(source);
    }

    let bytes = bs58::decode(source)
        .into_vec()
        .map_err(|_| Error::Wallet("secret is neither a keypair file nor base58".to_owned()))?;
    keypair_from_bytes(&bytes)
}

fn keypair_from_json(text: &str) -> Result<Keypair, Error> {
    let bytes: Vec<u8> = serde_json::from_str(text)
        .map_err(|e| Error::Wallet(format!("keypair file is not a byte array: {e}")))?;
    keypair_from_bytes(&bytes)
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, Error> {
    Keypair::try_from(bytes)
        .map_err(|_| Error::Wallet(format!("expected 64 keypair bytes, got {}", bytes.len())))
}
