// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Legacy OpenSSL PEM encryption.
//!
//! Traditional keys written by e.g. `openssl rsa -aes128 -traditional` carry
//! `Proc-Type: 4,ENCRYPTED` and `DEK-Info: <cipher>,<hex iv>` headers. The body is
//! CBC encrypted with a key derived from the passphrase using OpenSSL's
//! `EVP_BytesToKey` (MD5, a single iteration, salted with the first 8 bytes of the IV)
//! and PKCS#7 padded.
//!
//! There is no integrity protection, so a wrong passphrase is only detectable by
//! the padding not checking out.

use {
    aes::{Aes128, Aes192, Aes256},
    cbc::cipher::{block_padding::Pkcs7, BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit},
    des::{Des, TdesEde3},
    md5::{Digest, Md5},
    pem::Pem,
    thiserror::Error,
};

const DEK_INFO: &str = "DEK-Info";

/// Ciphers usable in a `DEK-Info` header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegacyCipher {
    DesCbc,
    DesEde3Cbc,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl LegacyCipher {
    /// Resolve a cipher from its OpenSSL name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DES-CBC" => Some(Self::DesCbc),
            "DES-EDE3-CBC" => Some(Self::DesEde3Cbc),
            "AES-128-CBC" => Some(Self::Aes128Cbc),
            "AES-192-CBC" => Some(Self::Aes192Cbc),
            "AES-256-CBC" => Some(Self::Aes256Cbc),
            _ => None,
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            Self::DesCbc => 8,
            Self::DesEde3Cbc => 24,
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    pub fn block_len(&self) -> usize {
        match self {
            Self::DesCbc | Self::DesEde3Cbc => 8,
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
        }
    }
}

/// Whether a PEM block is encrypted with legacy OpenSSL encryption.
pub fn is_encrypted(block: &Pem) -> bool {
    block.headers().get(DEK_INFO).is_some()
}

/// Decrypt the content of a legacy encrypted PEM block.
pub fn decrypt(block: &Pem, passphrase: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let dek_info = block
        .headers()
        .get(DEK_INFO)
        .ok_or(DecryptError::NotEncrypted)?
        .trim();

    let (name, iv) = dek_info
        .split_once(',')
        .ok_or_else(|| DecryptError::MalformedDekInfo(dek_info.to_string()))?;

    let cipher = LegacyCipher::from_name(name.trim())
        .ok_or_else(|| DecryptError::UnsupportedCipher(name.trim().to_string()))?;

    let iv = hex::decode(iv.trim())
        .map_err(|_| DecryptError::MalformedDekInfo(dek_info.to_string()))?;

    if iv.len() != cipher.block_len() {
        return Err(DecryptError::IvLength {
            expected: cipher.block_len(),
            actual: iv.len(),
        });
    }

    let data = block.contents();
    if data.is_empty() || data.len() % cipher.block_len() != 0 {
        return Err(DecryptError::BlockSize(data.len()));
    }

    let key = derive_key(passphrase, &iv[0..8], cipher.key_len());
    let data = data.to_vec();

    match cipher {
        LegacyCipher::DesCbc => cbc_decrypt::<Des>(&key, &iv, data),
        LegacyCipher::DesEde3Cbc => cbc_decrypt::<TdesEde3>(&key, &iv, data),
        LegacyCipher::Aes128Cbc => cbc_decrypt::<Aes128>(&key, &iv, data),
        LegacyCipher::Aes192Cbc => cbc_decrypt::<Aes192>(&key, &iv, data),
        LegacyCipher::Aes256Cbc => cbc_decrypt::<Aes256>(&key, &iv, data),
    }
}

/// `EVP_BytesToKey` with MD5 and a single round.
fn derive_key(passphrase: &[u8], salt: &[u8], len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(len + 16);
    let mut digest = Vec::new();

    while key.len() < len {
        let mut hasher = Md5::new();
        hasher.update(&digest);
        hasher.update(passphrase);
        hasher.update(salt);
        digest = hasher.finalize().to_vec();

        key.extend_from_slice(&digest);
    }

    key.truncate(len);
    key
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], mut data: Vec<u8>) -> Result<Vec<u8>, DecryptError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor =
        cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(|_| DecryptError::KeyLength)?;

    let len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut data)
        .map_err(|_| DecryptError::IncorrectPassphrase)?
        .len();

    data.truncate(len);

    Ok(data)
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecryptError {
    #[error("incorrect passphrase")]
    IncorrectPassphrase,

    #[error("PEM block is not encrypted")]
    NotEncrypted,

    #[error("malformed DEK-Info header: {0}")]
    MalformedDekInfo(String),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("incorrect IV size: expected {expected} bytes, got {actual}")]
    IvLength { expected: usize, actual: usize },

    #[error("encrypted PEM data ({0} bytes) is not a multiple of the block size")]
    BlockSize(usize),

    #[error("derived key has an invalid length")]
    KeyLength,
}
