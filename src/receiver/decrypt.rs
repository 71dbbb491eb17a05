//! Per-packet audio decrypt filter
//!
//! RAOP encrypts each audio payload with AES-128-CBC, restarting from the
//! session IV on every packet and leaving any trailing partial block in the
//! clear. The filter is stateless across packets.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};

const BLOCK_SIZE: usize = 16;

/// Stateless AES-128-CBC packet decryptor.
pub struct PacketDecryptor {
    cipher: Aes128,
    iv: [u8; BLOCK_SIZE],
}

impl PacketDecryptor {
    /// Create a decryptor from the session key and IV.
    #[must_use]
    pub fn new(key: [u8; BLOCK_SIZE], iv: [u8; BLOCK_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(&key)),
            iv,
        }
    }

    /// Decrypt `payload` in place.
    ///
    /// Full 16-byte blocks are CBC-decrypted; the remainder is passed
    /// through untouched.
    pub fn decrypt(&self, payload: &mut [u8]) {
        let full = payload.len() - payload.len() % BLOCK_SIZE;
        let mut chain = self.iv;

        for block in payload[..full].chunks_exact_mut(BLOCK_SIZE) {
            let mut ciphertext = [0u8; BLOCK_SIZE];
            ciphertext.copy_from_slice(block);

            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(block));
            for (plain, prior) in block.iter_mut().zip(chain.iter()) {
                *plain ^= prior;
            }
            chain = ciphertext;
        }
    }
}
