//! Entry encryption (AES-128-CBC, zero IV).
//!
//! Encrypted entries use one key for the whole archive. The key ships inside
//! the game client; it is supplied to the reader through
//! [`OpenOptions`](crate::OpenOptions) rather than baked into the parser, so
//! a future client revision only needs a new [`CipherKey`].

use cipher::block_padding::NoPadding;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::{Error, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Archive-wide AES-128 key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CipherKey([u8; 16]);

impl CipherKey {
    /// Key used by current P4K archives.
    pub const P4K: CipherKey = CipherKey([
        0x5E, 0x7A, 0x20, 0x02, 0x30, 0x2E, 0xEB, 0x1A, 0x3B, 0xB6, 0x17, 0xC3, 0x0F, 0xDE, 0x1E,
        0x47,
    ]);

    /// Use a different key.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for CipherKey {
    fn default() -> Self {
        Self::P4K
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::P4K {
            f.write_str("CipherKey(P4K)")
        } else {
            f.write_str("CipherKey(custom)")
        }
    }
}

/// Decrypt `data` in place. The length must be a whole number of blocks.
///
/// Padding after the plaintext is left in place; the decoders stop at the
/// end of their stream and stored entries are truncated by the caller.
pub fn decrypt_in_place(key: &CipherKey, data: &mut [u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            data.len()
        )));
    }

    Aes128CbcDec::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(&ZERO_IV),
    )
    .decrypt_padded_mut::<NoPadding>(data)
    .map_err(|_| Error::Decryption("block decryption failed".into()))?;

    Ok(())
}

/// Zero-pad `data` to a whole number of blocks and encrypt it.
pub fn encrypt(key: &CipherKey, mut data: Vec<u8>) -> Result<Vec<u8>> {
    let len = data.len();
    data.resize(len.next_multiple_of(BLOCK_SIZE), 0);
    let padded = data.len();

    Aes128CbcEnc::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(&ZERO_IV),
    )
    .encrypt_padded_mut::<NoPadding>(&mut data, padded)
    .map_err(|_| Error::Decryption("block encryption failed".into()))?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_empty() {
        let mut data = [];
        decrypt_in_place(&CipherKey::P4K, &mut data).unwrap();
    }

    #[test]
    fn test_decrypt_invalid_length() {
        let mut data = vec![0u8; 15];
        assert!(matches!(
            decrypt_in_place(&CipherKey::P4K, &mut data),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_padded_plaintext() {
        let plain = b"Data\\Libs\\Config\\defaultProfile.xml".to_vec();
        let mut sealed = encrypt(&CipherKey::P4K, plain.clone()).unwrap();
        assert_eq!(sealed.len() % BLOCK_SIZE, 0);
        assert_ne!(&sealed[..plain.len()], &plain[..]);

        decrypt_in_place(&CipherKey::P4K, &mut sealed).unwrap();
        assert_eq!(&sealed[..plain.len()], &plain[..]);
        assert!(sealed[plain.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wrong_key_does_not_restore_plaintext() {
        let plain = vec![7u8; 32];
        let mut sealed = encrypt(&CipherKey::P4K, plain.clone()).unwrap();
        decrypt_in_place(&CipherKey::new([1u8; 16]), &mut sealed).unwrap();
        assert_ne!(sealed, plain);
    }
}
