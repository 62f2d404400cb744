//! Session key storage and purpose-bound key derivation.
//!
//! The session key arrives from the controller once the key exchange is
//! done. Applications never see it directly; they ask for sub-keys bound to
//! a purpose string:
//!
//! ```text
//! subkey = HKDF-SHA256(ikm = session_key, salt = none, info = purpose)[..length]
//! ```
//!
//! The same key and purpose always produce the same bytes, and different
//! purposes produce unrelated keys.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::WormholeError;

/// Largest output HKDF-SHA256 can expand to (255 blocks of 32 bytes).
pub const MAX_DERIVED_LENGTH: usize = 255 * 32;

/// Raw session key bytes, wiped from memory on drop.
#[derive(Clone)]
pub struct SessionKey(Zeroizing<Vec<u8>>);

impl SessionKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derive a sub-key for `purpose`. See [`derive_key`].
    pub fn derive(&self, purpose: &[u8], length: usize) -> Result<Vec<u8>, WormholeError> {
        derive_key(self.as_bytes(), purpose, length)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(<{} bytes>)", self.0.len())
    }
}

/// Check that a derive-key purpose is text, returning it as `&str`.
pub fn text_purpose(purpose: &[u8]) -> Result<&str, WormholeError> {
    std::str::from_utf8(purpose).map_err(|e| {
        WormholeError::InvalidArgument(format!("purpose must be UTF-8 text: {e}"))
    })
}

/// Derive `length` bytes from `key`, bound to `purpose`.
///
/// # Errors
///
/// [`WormholeError::InvalidArgument`] if `length` is zero or larger than
/// [`MAX_DERIVED_LENGTH`].
pub fn derive_key(key: &[u8], purpose: &[u8], length: usize) -> Result<Vec<u8>, WormholeError> {
    if length == 0 || length > MAX_DERIVED_LENGTH {
        return Err(WormholeError::InvalidArgument(format!(
            "derived key length must be between 1 and {MAX_DERIVED_LENGTH}, got {length}"
        )));
    }

    let hkdf = Hkdf::<Sha256>::new(None, key);
    let mut output = vec![0u8; length];
    hkdf.expand(purpose, &mut output)
        .map_err(|e| WormholeError::InvalidArgument(format!("HKDF expansion failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"an established session key......";

    #[test]
    fn deterministic() {
        let a = derive_key(KEY, b"purpose", 32).unwrap();
        let b = derive_key(KEY, b"purpose", 32).unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn purpose_separates_keys() {
        let a = derive_key(KEY, b"purpose", 32).unwrap();
        let b = derive_key(KEY, b"another purpose", 32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_separates_keys() {
        let a = derive_key(KEY, b"purpose", 32).unwrap();
        let b = derive_key(b"some other key", b"purpose", 32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn shorter_output_is_a_prefix() {
        let long = derive_key(KEY, b"purpose", 64).unwrap();
        let short = derive_key(KEY, b"purpose", 16).unwrap();
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            derive_key(KEY, b"p", 0),
            Err(WormholeError::InvalidArgument(_))
        ));
        assert!(matches!(
            derive_key(KEY, b"p", MAX_DERIVED_LENGTH + 1),
            Err(WormholeError::InvalidArgument(_))
        ));
        assert_eq!(derive_key(KEY, b"p", MAX_DERIVED_LENGTH).unwrap().len(), MAX_DERIVED_LENGTH);
    }

    #[test]
    fn purpose_must_be_text() {
        assert_eq!(text_purpose(b"file-transfer").unwrap(), "file-transfer");
        assert!(matches!(
            text_purpose(&[0xff, 0xfe]),
            Err(WormholeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SessionKey::new(KEY.to_vec());
        let shown = format!("{key:?}");
        assert!(!shown.contains("session"));
        assert!(shown.contains("32 bytes"));
    }
}
