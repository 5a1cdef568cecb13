//! Document encryption for Coffer.
//!
//! AES-256-CBC with PKCS#7 padding, keys derived from a password via
//! PBKDF2-HMAC-SHA256, authenticated with an HMAC-SHA256 tag over the
//! IV and ciphertext (encrypt-then-MAC). The cipher is stateless and safe
//! to share across request tasks.

pub mod cipher;
pub mod error;

pub use cipher::{DocumentCipher, EncryptedDocument};
pub use error::{CryptoError, CryptoResult};
