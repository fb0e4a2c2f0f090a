use {
    super::{Algorithm, BLOCK_LENGTH, IV_LENGTH},
    crate::error::{Error, Result},
    aes::{Aes256, Block},
    cbc::cipher::{
        BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
        block_padding::{Padding, Pkcs7},
    },
    chunkvault_protocol::DecryptionKey,
};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;
type Aes256EcbEnc = ecb::Encryptor<Aes256>;

enum BlockMode {
    Cbc(Aes256CbcDec),
    Ecb(Aes256EcbDec),
}

impl BlockMode {
    fn new(algorithm: Algorithm, key: &DecryptionKey, iv: &[u8; IV_LENGTH]) -> Self {
        match algorithm {
            Algorithm::Cbc => Self::Cbc(Aes256CbcDec::new(key.as_bytes().into(), iv.into())),
            // The prefix is skipped by the caller but never used.
            Algorithm::Ecb => Self::Ecb(Aes256EcbDec::new(key.as_bytes().into())),
        }
    }

    fn decrypt_block(&mut self, block: &mut Block) {
        match self {
            Self::Cbc(decryptor) => decryptor.decrypt_block_mut(block),
            Self::Ecb(decryptor) => decryptor.decrypt_block_mut(block),
        }
    }
}

/// Decrypts the body of a container incrementally.
///
/// The last complete block is held back until [`StreamDecryptor::finish`],
/// where its padding is checked and stripped.
pub struct StreamDecryptor {
    mode: BlockMode,
    // Ciphertext that has not been decrypted yet.
    pending: Vec<u8>,
}

impl StreamDecryptor {
    #[must_use]
    #[inline]
    pub fn new(algorithm: Algorithm, key: &DecryptionKey, iv: &[u8; IV_LENGTH]) -> Self {
        Self {
            mode: BlockMode::new(algorithm, key, iv),
            pending: Vec::with_capacity(BLOCK_LENGTH),
        }
    }

    /// Consumes `ciphertext` and appends the plaintext of every block that
    /// cannot be the final one to `plaintext`.
    #[inline]
    pub fn update(&mut self, ciphertext: &[u8], plaintext: &mut Vec<u8>) {
        self.pending.extend_from_slice(ciphertext);
        let partial = self.pending.len() % BLOCK_LENGTH;
        let ready = self.pending.len().saturating_sub(if partial == 0 {
            BLOCK_LENGTH
        } else {
            partial
        });
        let (blocks, _) = self.pending.split_at(ready);
        for chunk in blocks.chunks_exact(BLOCK_LENGTH) {
            let mut block = Block::clone_from_slice(chunk);
            self.mode.decrypt_block(&mut block);
            plaintext.extend_from_slice(&block);
        }
        self.pending.drain(..ready);
    }

    /// Decrypts the final block and appends it to `plaintext` without padding.
    #[inline]
    pub fn finish(mut self, plaintext: &mut Vec<u8>) -> Result<()> {
        if self.pending.len() != BLOCK_LENGTH {
            return Err(Error::InvalidCiphertext(if self.pending.is_empty() {
                "missing final block"
            } else {
                "length is not a multiple of the block size"
            }));
        }
        let mut block = Block::clone_from_slice(&self.pending);
        self.mode.decrypt_block(&mut block);
        let unpadded =
            Pkcs7::unpad(&block).map_err(|_unpad| Error::InvalidCiphertext("bad padding"))?;
        plaintext.extend_from_slice(unpadded);
        Ok(())
    }
}

/// Builds a container: `iv` followed by the padded ciphertext of `plaintext`.
#[must_use]
#[inline]
pub fn encrypt_container(
    algorithm: Algorithm,
    key: &DecryptionKey,
    iv: &[u8; IV_LENGTH],
    plaintext: &[u8],
) -> Vec<u8> {
    let ciphertext = match algorithm {
        Algorithm::Cbc => Aes256CbcEnc::new(key.as_bytes().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        Algorithm::Ecb => {
            Aes256EcbEnc::new(key.as_bytes().into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        }
    };
    let mut container = Vec::with_capacity(IV_LENGTH + ciphertext.len());
    container.extend_from_slice(iv);
    container.extend(ciphertext);
    container
}
