//! Key material generation and import
//!
//! Derives the first EVM account from a BIP-39 seed via BIP-44
//! (`m/44'/60'/0'/0/0`), or wraps a raw secp256k1 private key.

use std::fmt;

use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::Network;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::address::address_from_public_key;
use crate::error::{Result, WalletError};
use crate::memory::LockedKey;
use crate::seed::{derive_seed, generate_mnemonic, parse_mnemonic};

/// BIP-44 path of the first Ethereum account
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Length of a secp256k1 secret scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// A keypair and, when it came from a phrase, that phrase.
///
/// Lives only in process memory. The private key sits in a locked buffer and
/// both it and the phrase are zeroized by [`KeyMaterial::wipe`] or on drop.
pub struct KeyMaterial {
    address: String,
    private_key: LockedKey<PRIVATE_KEY_LEN>,
    mnemonic: Zeroizing<String>,
}

impl KeyMaterial {
    /// Checksummed `0x` address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        self.private_key.as_bytes()
    }

    /// `0x`-prefixed hex of the private key, for the one-time reveal screen.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::with_capacity(2 + PRIVATE_KEY_LEN * 2));
        out.push_str("0x");
        out.push_str(&Zeroizing::new(hex::encode(self.private_key())));
        out
    }

    /// The recovery phrase, or `None` for material imported from a raw key.
    pub fn mnemonic(&self) -> Option<&str> {
        if self.mnemonic.is_empty() {
            None
        } else {
            Some(self.mnemonic.as_str())
        }
    }

    pub fn mnemonic_words(&self) -> Vec<&str> {
        self.mnemonic.split_whitespace().collect()
    }

    pub fn has_mnemonic(&self) -> bool {
        !self.mnemonic.is_empty()
    }

    /// Zeroize the private key and the phrase now.
    pub fn wipe(&mut self) {
        self.private_key.wipe();
        // Zeroizes the buffer and leaves an empty string behind
        zeroize::Zeroize::zeroize(&mut *self.mnemonic);
    }

    pub fn is_wiped(&self) -> bool {
        self.private_key.is_wiped()
    }

    fn from_secret(secret: &mut [u8; PRIVATE_KEY_LEN], mnemonic: Zeroizing<String>) -> Result<Self> {
        let secp = Secp256k1::signing_only();
        let mut secret_key =
            SecretKey::from_slice(secret.as_slice()).map_err(|_| WalletError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        secret_key.non_secure_erase();

        Ok(Self {
            address: address_from_public_key(&public_key),
            private_key: LockedKey::new(secret),
            mnemonic,
        })
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .field("mnemonic_words", &self.mnemonic_words().len())
            .finish()
    }
}

/// Create a brand new wallet: 12-word phrase and its first account.
pub fn generate() -> Result<KeyMaterial> {
    let mnemonic = generate_mnemonic()?;
    let material = from_mnemonic(&mnemonic)?;
    log::debug!("generated key material for {}", material.address());
    Ok(material)
}

/// Import a raw private key given as 64 hex digits, optionally `0x`-prefixed.
pub fn import_from_private_key(input: &str) -> Result<KeyMaterial> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.len() != PRIVATE_KEY_LEN * 2 {
        return Err(WalletError::InvalidPrivateKey);
    }

    let mut secret = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    hex::decode_to_slice(body, &mut secret[..]).map_err(|_| WalletError::InvalidPrivateKey)?;

    KeyMaterial::from_secret(&mut secret, Zeroizing::new(String::new()))
}

/// Import raw key bytes. The caller's buffer is zeroized.
pub fn import_from_private_key_bytes(secret: &mut [u8; PRIVATE_KEY_LEN]) -> Result<KeyMaterial> {
    let result = KeyMaterial::from_secret(secret, Zeroizing::new(String::new()));
    zeroize::Zeroize::zeroize(secret);
    result
}

/// Import a 12- or 24-word phrase. The same phrase always yields the same key.
pub fn import_from_mnemonic(phrase: &str) -> Result<KeyMaterial> {
    let mnemonic = parse_mnemonic(phrase)?;
    from_mnemonic(&mnemonic)
}

fn from_mnemonic(mnemonic: &Mnemonic) -> Result<KeyMaterial> {
    let seed = derive_seed(mnemonic);
    let mut secret = derive_account_key(&seed)?;
    KeyMaterial::from_secret(&mut secret, Zeroizing::new(mnemonic.to_string()))
}

/// Derive the account secret at [`ETH_DERIVATION_PATH`] from a BIP-39 seed.
fn derive_account_key(seed: &[u8; 64]) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    // Derivation only fails for seeds that hit an invalid scalar, which no
    // user input can target; report it as a bad phrase.
    let mut master =
        Xpriv::new_master(Network::Bitcoin, seed).map_err(|_| WalletError::InvalidMnemonic)?;

    let path: DerivationPath = ETH_DERIVATION_PATH
        .parse()
        .map_err(|_| WalletError::InvalidMnemonic)?;

    let secp = Secp256k1::new();
    let mut derived = master
        .derive_priv(&secp, &path)
        .map_err(|_| WalletError::InvalidMnemonic)?;

    let secret = Zeroizing::new(derived.private_key.secret_bytes());
    derived.private_key.non_secure_erase();
    master.private_key.non_secure_erase();
    Ok(secret)
}
