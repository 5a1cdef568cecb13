//! Bearer secrets and their digests.
//!
//! Access tokens and processing keys are opaque bearer secrets: generated from
//! the OS CSPRNG, shown to the caller exactly once, and retained server-side
//! only as SHA-256 digests compared in constant time.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Raw entropy per secret: 256 bits.
const SECRET_LEN: usize = 32;

/// A freshly generated bearer secret.
///
/// The plaintext value exists only long enough to be returned to the caller;
/// everything that outlives the response works with [`TokenDigest`].
#[derive(Clone)]
pub struct SecretToken(String);

impl SecretToken {
    /// Generate a new secret from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut buf = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut buf);
        Self(URL_SAFE_NO_PAD.encode(buf))
    }

    /// The plaintext secret, for the one-time response to the caller.
    pub fn reveal(&self) -> &str {
        &self.0
    }

    /// Digest for server-side retention.
    pub fn digest(&self) -> TokenDigest {
        TokenDigest::of(&self.0)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretToken").field(&"<redacted>").finish()
    }
}

/// SHA-256 digest of a bearer secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    /// Digest a presented secret.
    pub fn of(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Constant-time check of a presented secret against this digest.
    pub fn verify(&self, presented: &str) -> bool {
        let presented = Self::of(presented);
        self.0.ct_eq(&presented.0).into()
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TokenDigest").field(&"<redacted>").finish()
    }
}

/// Generate `len` random bytes rendered as unpadded base64url.
pub(crate) fn random_urlsafe(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
