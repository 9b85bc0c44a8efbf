// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! GitHub App private keys.
//!
//! GitHub issues App private keys as PEM encoded PKCS#1 RSA keys. Users commonly
//! convert or protect them with OpenSSL, so we also accept legacy encrypted PKCS#1
//! and plain or encrypted PKCS#8.

use {
    crate::legacy_pem::{self, DecryptError},
    jsonwebtoken::EncodingKey,
    pem::Pem,
    rsa::{
        pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
        pkcs8::DecodePrivateKey,
        traits::PublicKeyParts,
        RsaPrivateKey,
    },
    std::fmt::{Debug, Formatter},
    thiserror::Error,
};

pub const LEGACY_RSA_PEM_TAG: &str = "RSA PRIVATE KEY";
pub const PKCS8_PEM_TAG: &str = "PRIVATE KEY";
pub const ENCRYPTED_PKCS8_PEM_TAG: &str = "ENCRYPTED PRIVATE KEY";

/// Private key encodings, as declared by the PEM tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyFormat {
    /// `RSA PRIVATE KEY`: PKCS#1, possibly with legacy OpenSSL encryption.
    LegacyRsa,
    /// `PRIVATE KEY`: unencrypted PKCS#8.
    Pkcs8,
    /// `ENCRYPTED PRIVATE KEY`: PKCS#8 protected with PKCS#5 v2 encryption.
    EncryptedPkcs8,
    Unsupported(String),
}

impl KeyFormat {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            LEGACY_RSA_PEM_TAG => Self::LegacyRsa,
            PKCS8_PEM_TAG => Self::Pkcs8,
            ENCRYPTED_PKCS8_PEM_TAG => Self::EncryptedPkcs8,
            _ => Self::Unsupported(tag.to_string()),
        }
    }
}

/// An RSA private key used to sign GitHub App JWTs.
#[derive(Clone)]
pub struct AppPrivateKey {
    key: RsaPrivateKey,
    encoding_key: EncodingKey,
}

impl AppPrivateKey {
    /// Construct an instance from an RSA private key.
    pub fn from_rsa_private_key(key: RsaPrivateKey) -> Result<Self, KeyDecodeError> {
        let der = key.to_pkcs1_der().map_err(KeyDecodeError::Pkcs1)?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        Ok(Self { key, encoding_key })
    }

    /// Decode the first PEM block in `data`.
    ///
    /// `passphrase` is only consulted for encrypted keys. An empty passphrase is treated
    /// as missing for legacy encrypted keys but passed through for encrypted PKCS#8.
    pub fn from_pem(
        data: impl AsRef<[u8]>,
        passphrase: Option<&[u8]>,
    ) -> Result<Self, KeyDecodeError> {
        let block = pem::parse(data).map_err(KeyDecodeError::NoPemBlock)?;

        let key = match KeyFormat::from_tag(block.tag()) {
            KeyFormat::LegacyRsa => decode_legacy_rsa(&block, passphrase)?,
            KeyFormat::Pkcs8 => decode_pkcs8(&block)?,
            KeyFormat::EncryptedPkcs8 => decode_encrypted_pkcs8(&block, passphrase)?,
            KeyFormat::Unsupported(tag) => return Err(KeyDecodeError::UnsupportedFormat(tag)),
        };

        Self::from_rsa_private_key(key)
    }

    pub fn rsa_private_key(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// The key in the form consumed by [jsonwebtoken].
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

impl Debug for AppPrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppPrivateKey")
            .field("bits", &(self.key.size() * 8))
            .finish_non_exhaustive()
    }
}

fn decode_legacy_rsa(
    block: &Pem,
    passphrase: Option<&[u8]>,
) -> Result<RsaPrivateKey, KeyDecodeError> {
    debug_assert_eq!(block.tag(), LEGACY_RSA_PEM_TAG);

    if legacy_pem::is_encrypted(block) {
        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .ok_or(KeyDecodeError::PassphraseRequired)?;

        let der = legacy_pem::decrypt(block, passphrase).map_err(|e| match e {
            DecryptError::IncorrectPassphrase => KeyDecodeError::IncorrectPassphrase,
            e => KeyDecodeError::Decrypt(e),
        })?;

        RsaPrivateKey::from_pkcs1_der(&der).map_err(KeyDecodeError::Pkcs1)
    } else {
        RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(KeyDecodeError::Pkcs1)
    }
}

fn decode_pkcs8(block: &Pem) -> Result<RsaPrivateKey, KeyDecodeError> {
    RsaPrivateKey::from_pkcs8_der(block.contents()).map_err(KeyDecodeError::Pkcs8)
}

fn decode_encrypted_pkcs8(
    block: &Pem,
    passphrase: Option<&[u8]>,
) -> Result<RsaPrivateKey, KeyDecodeError> {
    RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), passphrase.unwrap_or_default())
        .map_err(KeyDecodeError::Pkcs8)
}

#[derive(Debug, Error)]
pub enum KeyDecodeError {
    #[error("PEM block not found")]
    NoPemBlock(#[source] pem::PemError),

    #[error("unsupported PEM file: '{0}'")]
    UnsupportedFormat(String),

    #[error("encrypted key found, but passphrase was not supplied")]
    PassphraseRequired,

    #[error("incorrect passphrase")]
    IncorrectPassphrase,

    #[error("decrypt failed")]
    Decrypt(#[source] DecryptError),

    #[error("failed to decode PKCS#1 private key")]
    Pkcs1(#[source] rsa::pkcs1::Error),

    #[error("failed to decode PKCS#8 private key")]
    Pkcs8(#[source] rsa::pkcs8::Error),
}
