//! AES-256-CBC document cipher with password-derived keys.

use crate::error::{CryptoError, CryptoResult};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use coffer_core::{
    EncryptionMetadata, FileKeyMaterial, SecretToken, IV_LEN, KDF_ITERATIONS, SALT_LEN,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Cipher identifier recorded in metadata.
const ALGORITHM: &str = "AES-256-CBC";

/// Key-derivation identifier recorded in metadata.
const KEY_DERIVATION: &str = "PBKDF2-SHA256";

/// AES-256 key length.
const ENC_KEY_LEN: usize = 32;

/// HMAC-SHA256 key length.
const MAC_KEY_LEN: usize = 32;

/// HMAC-SHA256 tag length.
const MAC_LEN: usize = 32;

/// Output of a single encryption: public parameters, guarded key material,
/// and the raw ciphertext. The ciphertext is persisted separately from the
/// metadata; the key material never leaves the process.
pub struct EncryptedDocument {
    /// Public encryption parameters.
    pub metadata: EncryptionMetadata,
    /// The password the keys derive from (auto-generated when none supplied).
    pub key_material: FileKeyMaterial,
    /// Encrypted payload.
    pub ciphertext: Vec<u8>,
}

/// Stateless document cipher. Safe to invoke concurrently.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentCipher;

impl DocumentCipher {
    /// Create a new cipher.
    pub fn new() -> Self {
        Self
    }

    /// Encrypt a payload. When no password is supplied, a random one is
    /// generated and returned in the key-material record.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        password: Option<&str>,
    ) -> CryptoResult<EncryptedDocument> {
        let key_material = match password {
            Some(p) => FileKeyMaterial::new(p.to_string()),
            None => FileKeyMaterial::new(SecretToken::generate().reveal().to_string()),
        };

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let keys = DerivedKeys::derive(key_material.password(), &salt, KDF_ITERATIONS);

        let encryptor = Aes256CbcEnc::new_from_slices(keys.enc_key(), &iv)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mac = compute_mac(keys.mac_key(), &iv, &ciphertext)?;

        Ok(EncryptedDocument {
            metadata: EncryptionMetadata {
                algorithm: ALGORITHM.to_string(),
                key_derivation: KEY_DERIVATION.to_string(),
                iterations: KDF_ITERATIONS,
                salt: salt.to_vec(),
                iv: iv.to_vec(),
                mac,
                ciphertext_len: ciphertext.len() as u64,
            },
            key_material,
            ciphertext,
        })
    }

    /// Decrypt a payload. The tag is verified before any decryption happens;
    /// any bit flip in ciphertext, salt, IV, or tag is rejected as
    /// [`CryptoError::Decryption`], never surfaced as corrupted plaintext.
    pub fn decrypt(
        &self,
        metadata: &EncryptionMetadata,
        ciphertext: &[u8],
        password: &str,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        validate_metadata(metadata)?;

        let keys = DerivedKeys::derive(password, &metadata.salt, metadata.iterations);

        let expected = compute_mac(keys.mac_key(), &metadata.iv, ciphertext)?;
        let tag_ok: bool = expected.as_slice().ct_eq(metadata.mac.as_slice()).into();
        if !tag_ok {
            return Err(CryptoError::Decryption);
        }

        let decryptor = Aes256CbcDec::new_from_slices(keys.enc_key(), &metadata.iv)
            .map_err(|_| CryptoError::Decryption)?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Decryption)?;

        Ok(Zeroizing::new(plaintext))
    }
}

/// PBKDF2 output, wiped on drop: 32 bytes of AES key, 32 bytes of MAC key.
struct DerivedKeys(Zeroizing<[u8; ENC_KEY_LEN + MAC_KEY_LEN]>);

impl DerivedKeys {
    fn derive(password: &str, salt: &[u8], iterations: u32) -> Self {
        let mut okm = Zeroizing::new([0u8; ENC_KEY_LEN + MAC_KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, okm.as_mut_slice());
        Self(okm)
    }

    fn enc_key(&self) -> &[u8] {
        &self.0[..ENC_KEY_LEN]
    }

    fn mac_key(&self) -> &[u8] {
        &self.0[ENC_KEY_LEN..]
    }
}

fn compute_mac(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn validate_metadata(metadata: &EncryptionMetadata) -> CryptoResult<()> {
    if metadata.salt.len() != SALT_LEN {
        return Err(CryptoError::Metadata(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            metadata.salt.len()
        )));
    }
    if metadata.iv.len() != IV_LEN {
        return Err(CryptoError::Metadata(format!(
            "iv must be {IV_LEN} bytes, got {}",
            metadata.iv.len()
        )));
    }
    if metadata.mac.len() != MAC_LEN {
        return Err(CryptoError::Metadata(format!(
            "mac must be {MAC_LEN} bytes, got {}",
            metadata.mac.len()
        )));
    }
    if metadata.iterations == 0 {
        return Err(CryptoError::Metadata("iterations must be nonzero".into()));
    }
    Ok(())
}
