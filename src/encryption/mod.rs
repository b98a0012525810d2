//! C7: the Standard security handler. `standard_security_handler` derives
//! an [`EncryptionState`] from a password and the `/Encrypt` dictionary;
//! this module walks an already-parsed [`Object`] tree applying it
//! transparently to every string and stream payload.

pub mod pkcs5;
mod rc4;
mod standard_security_handler;

pub use standard_security_handler::{CryptMethod, EncryptionState};

use crate::object::{Object, ObjectId};
use crate::Result;

/// Errors raised while authenticating a password or running a crypt filter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("the supplied password authenticates neither the user nor the owner")]
    IncorrectPassword,
    #[error("unsupported encryption filter: {0}")]
    UnsupportedFilter(String),
    #[error("unsupported security handler revision {0}")]
    UnsupportedRevision(i64),
    #[error("encryption dictionary is missing or has a malformed {0}")]
    MissingKey(&'static str),
    #[error("AES ciphertext is not a whole number of blocks, or too short to hold an IV")]
    InvalidCiphertextLength,
    #[error("AES padding is invalid")]
    InvalidPadding,
}

pub(crate) fn random_iv() -> [u8; 16] {
    let mut iv = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut iv);
    iv
}

/// Decrypt every string and every stream payload reachable from `object`,
/// in place. Does not recurse through `Reference`s — those are resolved
/// (and decrypted) independently, each under its own object's key.
pub fn decrypt_object(state: &EncryptionState, id: ObjectId, object: &mut Object) -> Result<()> {
    transform_object(state, id, object, EncryptionState::decrypt_bytes)
}

/// Inverse of [`decrypt_object`], applied by the writer (C10/C11) just
/// before serialising a new or modified object in a protected document.
pub fn encrypt_object(state: &EncryptionState, id: ObjectId, object: &mut Object) -> Result<()> {
    transform_object(state, id, object, EncryptionState::encrypt_bytes)
}

fn transform_object(
    state: &EncryptionState, id: ObjectId, object: &mut Object,
    f: fn(&EncryptionState, ObjectId, &[u8]) -> std::result::Result<Vec<u8>, DecryptionError>,
) -> Result<()> {
    match object {
        Object::String(bytes, _) => {
            *bytes = f(state, id, bytes).map_err(crate::Error::Decryption)?;
        }
        Object::Stream(stream) => {
            if !stream.dict.has_type(b"XRef") {
                let transformed = f(state, id, &stream.content).map_err(crate::Error::Decryption)?;
                stream.set_content_untracked(transformed);
            }
            for value in stream.dict.values_mut_untracked() {
                transform_object(state, id, value, f)?;
            }
        }
        Object::Array(array) => {
            for item in array.iter_mut_untracked() {
                transform_object(state, id, item, f)?;
            }
        }
        Object::Dictionary(dict) => {
            for value in dict.values_mut_untracked() {
                transform_object(state, id, value, f)?;
            }
        }
        _ => {}
    }
    Ok(())
}
