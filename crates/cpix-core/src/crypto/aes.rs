use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tracing::error;

use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256-CBC with PKCS#7 padding. The IV is all zeros until `set_iv` is
/// called with an explicit one.
pub struct AesCbc {
    key: [u8; 32],
    iv: [u8; 16],
}

impl AesCbc {
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            error!(len = key.len(), "AES key must be 32 bytes");
            Error::InvalidInput("AES key must be 32 bytes".into())
        })?;
        Ok(AesCbc { key, iv: [0u8; 16] })
    }

    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        self.iv = iv.try_into().map_err(|_| {
            error!(len = iv.len(), "AES IV must be 16 bytes");
            Error::InvalidInput("AES IV must be 16 bytes".into())
        })?;
        Ok(())
    }

    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(&self.key.into(), &self.iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
        Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| Error::CryptoFailure("AES-CBC decryption failed".into()))
    }
}
