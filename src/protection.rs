//! C12 (the security half of the façade): the authentication/protection
//! state machine — `Unencrypted` / `Encrypted-NotAuth` / `Encrypted-UserAuth`
//! / `Encrypted-OwnerAuth` — plus the options `set_protection` takes and the
//! snapshot `get_security` returns. Generating new `/O`/`/U`/`/OE`/`/UE`/
//! `/Perms` values lives here too; per-object string/stream transforms stay
//! in `encryption` where C7's read-side lives.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::encryption::{CryptMethod, EncryptionState};
use crate::permissions::Permissions;
use crate::{Dictionary, Document, Error, Object, Result};

/// What `set_protection`/`remove_protection` queue for the next `save`; does
/// not affect the in-memory object graph until then.
#[derive(Debug, Clone, Default)]
pub enum PendingSecurityAction {
    #[default]
    None,
    Remove,
    Encrypt(ProtectionOptions),
}

/// Inputs to generating a new AES-256 (`/V 5 /R 6`) `/Encrypt` dictionary.
#[derive(Debug, Clone)]
pub struct ProtectionOptions {
    pub owner_password: String,
    pub user_password: String,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
}

impl ProtectionOptions {
    pub fn builder() -> ProtectionOptionsBuilder {
        ProtectionOptionsBuilder::default()
    }
}

/// Builder for [`ProtectionOptions`], matching the crate's other
/// builder-style options structs (`LoadOptions`, `SaveOptions`).
#[derive(Debug, Clone, Default)]
pub struct ProtectionOptionsBuilder {
    owner_password: Option<String>,
    user_password: Option<String>,
    permissions: Option<Permissions>,
    encrypt_metadata: bool,
}

impl ProtectionOptionsBuilder {
    pub fn owner_password(mut self, password: impl Into<String>) -> Self {
        self.owner_password = Some(password.into());
        self
    }

    pub fn user_password(mut self, password: impl Into<String>) -> Self {
        self.user_password = Some(password.into());
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn encrypt_metadata(mut self, encrypt_metadata: bool) -> Self {
        self.encrypt_metadata = encrypt_metadata;
        self
    }

    /// Owner and user passwords both default to the empty string (a
    /// conforming, if weak, PDF password) when not set, matching how most
    /// producers treat an absent owner password.
    pub fn build(self) -> ProtectionOptions {
        ProtectionOptions {
            owner_password: self.owner_password.unwrap_or_default(),
            user_password: self.user_password.unwrap_or_default(),
            permissions: self.permissions.unwrap_or_default(),
            encrypt_metadata: self.encrypt_metadata,
        }
    }
}

/// The four states from the spec's security state machine, collapsed from
/// `Document::is_encrypted`/`encryption_state`/`is_owner` for callers that
/// want to match on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    Unencrypted,
    EncryptedNotAuth,
    EncryptedUserAuth,
    EncryptedOwnerAuth,
}

/// A snapshot of a document's current security posture.
#[derive(Debug, Clone)]
pub struct SecurityInfo {
    pub state: SecurityState,
    /// `"None"`, `"RC4"`, `"AES-128"`, or `"AES-256"`.
    pub algorithm: &'static str,
    pub permissions: Permissions,
}

/// Result of [`Document::authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    pub authenticated: bool,
    pub is_owner: bool,
}

fn algorithm_name(method: CryptMethod) -> &'static str {
    match method {
        CryptMethod::Identity => "None",
        CryptMethod::Rc4 => "RC4",
        CryptMethod::Aes128 => "AES-128",
        CryptMethod::Aes256 => "AES-256",
    }
}

impl Document {
    /// The current position in the security state machine.
    pub fn security_state(&self) -> SecurityState {
        if !self.is_encrypted() {
            return SecurityState::Unencrypted;
        }
        match &self.encryption_state {
            None => SecurityState::EncryptedNotAuth,
            Some(state) if state.is_owner => SecurityState::EncryptedOwnerAuth,
            Some(_) => SecurityState::EncryptedUserAuth,
        }
    }

    pub fn get_security(&self) -> SecurityInfo {
        let (algorithm, permissions) = match &self.encryption_state {
            Some(state) => (algorithm_name(state.method), Permissions::from_bits_lenient(state.permissions)),
            None => ("None", Permissions::all_granted()),
        };
        SecurityInfo {
            state: self.security_state(),
            algorithm,
            permissions,
        }
    }

    pub fn get_permissions(&self) -> Permissions {
        self.get_security().permissions
    }

    /// Attempts to authenticate against the document's `/Encrypt`
    /// dictionary. A wrong password leaves the document's state unchanged
    /// and returns `{authenticated: false}`, per the state machine's
    /// idempotence requirement; it never errors.
    pub fn authenticate(&mut self, password: &str) -> Result<AuthResult> {
        if !self.is_encrypted() {
            return Ok(AuthResult {
                authenticated: true,
                is_owner: true,
            });
        }
        match EncryptionState::decode(self, password) {
            Ok(state) => {
                let is_owner = state.is_owner;
                self.encryption_state = Some(state);
                Ok(AuthResult {
                    authenticated: true,
                    is_owner,
                })
            }
            Err(_) => Ok(AuthResult {
                authenticated: false,
                is_owner: false,
            }),
        }
    }

    /// Queues removal of `/Encrypt` on the next save. Requires owner access
    /// on an already-encrypted document (a plain user can read but must not
    /// be able to strip protection).
    pub fn remove_protection(&mut self) -> Result<()> {
        if self.is_encrypted() && !self.has_owner_access() {
            return Err(Error::PermissionDenied);
        }
        self.pending_security_action = PendingSecurityAction::Remove;
        Ok(())
    }

    /// Queues encrypting (or re-encrypting) the document with AES-256 under
    /// `opts` on the next save. Requires owner access on an already-encrypted
    /// document.
    pub fn set_protection(&mut self, opts: ProtectionOptions) -> Result<()> {
        if self.is_encrypted() && !self.has_owner_access() {
            return Err(Error::PermissionDenied);
        }
        self.pending_security_action = PendingSecurityAction::Encrypt(opts);
        Ok(())
    }
}

fn random_salt<const N: usize>() -> [u8; N] {
    let mut salt = [0u8; N];
    rand::rng().fill_bytes(&mut salt);
    salt
}

fn hash_r6_validation(password: &[u8], salt: &[u8], udata: &[u8]) -> Vec<u8> {
    // Identical iterated hash to the read-side Algorithm 2.B; duplicated
    // here (rather than shared) because the read-side helper is private to
    // `standard_security_handler` and only the final 32 bytes are needed.
    use aes::cipher::{BlockEncryptMut, KeyIvInit};
    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    let mut k = {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(udata);
        hasher.finalize().to_vec()
    };
    let mut round = 0;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + udata.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }
        let key = &k[0..16];
        let iv = &k[16..32];
        let mut encryptor = Aes128CbcEnc::new_from_slices(key, iv).expect("16-byte AES-128 key/IV");
        let block_size = 16;
        let mut e = Vec::with_capacity(k1.len());
        for chunk in k1.chunks_mut(block_size) {
            let block = aes::cipher::generic_array::GenericArray::from_mut_slice(chunk);
            encryptor.encrypt_block_mut(block);
            e.extend_from_slice(block);
        }

        let modulus: u32 = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
        k = match modulus {
            0 => {
                let mut hasher = Sha256::new();
                hasher.update(&e);
                hasher.finalize().to_vec()
            }
            1 => {
                let mut hasher = sha2::Sha384::new();
                hasher.update(&e);
                hasher.finalize().to_vec()
            }
            _ => {
                let mut hasher = sha2::Sha512::new();
                hasher.update(&e);
                hasher.finalize().to_vec()
            }
        };
        round += 1;
        if round >= 64 && (*e.last().unwrap_or(&0) as usize) <= round - 32 {
            break;
        }
    }
    k.truncate(32);
    k
}

fn aes256_cbc_no_padding_encrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    use aes::cipher::{BlockEncryptMut, KeyIvInit};
    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
    let mut encryptor = Aes256CbcEnc::new_from_slices(key, &[0u8; 16]).expect("32-byte AES-256 key/16-byte IV");
    let mut buf = data.to_vec();
    let block_size = 16;
    let mut out = Vec::with_capacity(buf.len());
    for chunk in buf.chunks_mut(block_size) {
        let block = aes::cipher::generic_array::GenericArray::from_mut_slice(chunk);
        encryptor.encrypt_block_mut(block);
        out.extend_from_slice(block);
    }
    out
}

fn aes256_ecb_encrypt_no_padding(key: &[u8], data: &[u8; 16]) -> [u8; 16] {
    use aes::cipher::{BlockEncrypt, KeyInit};
    let cipher = aes::Aes256::new_from_slice(key).expect("32-byte AES-256 key");
    let mut block = *data;
    let generic = aes::cipher::generic_array::GenericArray::from_mut_slice(&mut block);
    cipher.encrypt_block(generic);
    block
}

/// Builds a fresh AES-256 `/Encrypt` dictionary and the 32-byte file key it
/// describes, per ISO 32000-2 §7.6.4.3. `/Perms` (which binds the
/// permission bits cryptographically so a reader can't silently ignore
/// them) is produced here too; the document `/ID` stays the writer's
/// responsibility since it's a trailer concern, not a handler one.
pub(crate) fn build_aes256_encrypt_dict(opts: &ProtectionOptions) -> (Dictionary, [u8; 32]) {
    let file_key = random_salt::<32>();

    let user_validation_salt = random_salt::<8>();
    let user_key_salt = random_salt::<8>();
    let user_password = opts.user_password.as_bytes();
    let u_hash = hash_r6_validation(user_password, &user_validation_salt, &[]);
    let u_intermediate = hash_r6_validation(user_password, &user_key_salt, &[]);
    let ue = aes256_cbc_no_padding_encrypt(&u_intermediate, &file_key);

    let mut u = Vec::with_capacity(48);
    u.extend_from_slice(&u_hash);
    u.extend_from_slice(&user_validation_salt);
    u.extend_from_slice(&user_key_salt);

    let owner_validation_salt = random_salt::<8>();
    let owner_key_salt = random_salt::<8>();
    let owner_password = opts.owner_password.as_bytes();
    let o_hash = hash_r6_validation(owner_password, &owner_validation_salt, &u);
    let o_intermediate = hash_r6_validation(owner_password, &owner_key_salt, &u);
    let oe = aes256_cbc_no_padding_encrypt(&o_intermediate, &file_key);

    let mut o = Vec::with_capacity(48);
    o.extend_from_slice(&o_hash);
    o.extend_from_slice(&owner_validation_salt);
    o.extend_from_slice(&owner_key_salt);

    let p = opts.permissions.to_raw();

    // /Perms: P (4 bytes, LE) + "adb" sentinel flag (1 byte) + 3 padding
    // bytes + "T"/"F" for EncryptMetadata + 8 random bytes, AES-256-ECB
    // encrypted with the file key (ISO 32000-2 §7.6.4.3.3).
    let mut perms_plain = [0u8; 16];
    perms_plain[0..4].copy_from_slice(&(p as u32).to_le_bytes());
    perms_plain[4] = b'T';
    perms_plain[5] = b'a';
    perms_plain[6] = b'd';
    perms_plain[7] = b'b';
    perms_plain[8] = if opts.encrypt_metadata { b'T' } else { b'F' };
    rand::rng().fill_bytes(&mut perms_plain[9..12]);
    let perms = aes256_ecb_encrypt_no_padding(&file_key, &perms_plain);

    let mut cf_dict = Dictionary::new();
    let mut std_cf = Dictionary::new();
    std_cf.set("CFM", Object::name("AESV3"));
    std_cf.set("AuthEvent", Object::name("DocOpen"));
    std_cf.set("Length", Object::integer(32));
    cf_dict.set("StdCF", std_cf);

    let mut dict = Dictionary::new();
    dict.set("Filter", Object::name("Standard"));
    dict.set("V", Object::integer(5));
    dict.set("R", Object::integer(6));
    dict.set("Length", Object::integer(256));
    dict.set("O", Object::String(o, crate::object::StringFormat::Hexadecimal));
    dict.set("U", Object::String(u, crate::object::StringFormat::Hexadecimal));
    dict.set("OE", Object::String(oe, crate::object::StringFormat::Hexadecimal));
    dict.set("UE", Object::String(ue, crate::object::StringFormat::Hexadecimal));
    dict.set("P", Object::integer(p as i64));
    dict.set("Perms", Object::String(perms.to_vec(), crate::object::StringFormat::Hexadecimal));
    dict.set("CF", cf_dict);
    dict.set("StmF", Object::name("StdCF"));
    dict.set("StrF", Object::name("StdCF"));
    if !opts.encrypt_metadata {
        dict.set("EncryptMetadata", Object::Boolean(false));
    }

    (dict, file_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_is_unencrypted_and_owner() {
        let doc = Document::new();
        assert_eq!(doc.security_state(), SecurityState::Unencrypted);
        assert!(doc.has_owner_access());
        assert_eq!(doc.get_security().algorithm, "None");
    }

    #[test]
    fn set_protection_is_queued_not_applied_immediately() {
        let mut doc = Document::new();
        let opts = ProtectionOptions::builder().user_password("secret").owner_password("admin").build();
        doc.set_protection(opts).unwrap();
        assert!(!doc.is_encrypted());
        assert!(matches!(doc.pending_security_action, PendingSecurityAction::Encrypt(_)));
    }

    #[test]
    fn build_aes256_encrypt_dict_produces_expected_key_lengths() {
        let opts = ProtectionOptions::builder().user_password("user").owner_password("owner").build();
        let (dict, file_key) = build_aes256_encrypt_dict(&opts);
        assert_eq!(file_key.len(), 32);
        assert_eq!(dict.get(b"U").unwrap().as_str().unwrap().len(), 48);
        assert_eq!(dict.get(b"O").unwrap().as_str().unwrap().len(), 48);
        assert_eq!(dict.get(b"UE").unwrap().as_str().unwrap().len(), 32);
        assert_eq!(dict.get(b"Perms").unwrap().as_str().unwrap().len(), 16);
    }
}
