//! Passphrase envelope: the symmetric wrapper around every request and
//! response body exchanged with the paired media server.
//!
//! The session token doubles as the passphrase. Nothing here relies on
//! library defaults; each suite spells out its key derivation and mode.
//!
//! The on-wire suite is the OpenSSL `enc` / CryptoJS passphrase format the
//! media server speaks:
//!
//! ```text
//! base64( "Salted__" || salt(8) || AES-256-CBC-PKCS7(plaintext) )
//! ```
//!
//! - key || iv = EVP_BytesToKey(MD5, 1 round, passphrase, salt), 32 + 16 bytes
//!
//! That suite carries no authentication tag. A wrong passphrase almost always
//! fails the padding check; the rare survivor is garbage that the JSON layer
//! above rejects.
//!
//! A second, authenticated suite is available for peers that opt in:
//!
//! ```text
//! base64( suite_id(1) || salt(16) || nonce(12) || ciphertext || tag(16) )
//! ```
//!
//! - key   = HKDF-SHA256(salt, ikm = passphrase, info = "rsc_env_v1_key")
//! - AEAD  = ChaCha20-Poly1305, AAD = suite_id || salt

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use md5::{Digest, Md5};
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Magic prefix of the OpenSSL passphrase format.
pub const OPENSSL_MAGIC: &[u8; 8] = b"Salted__";
pub const OPENSSL_SALT_LEN: usize = 8;
pub const AES_BLOCK_LEN: usize = 16;
const OPENSSL_KEY_LEN: usize = 32;
const OPENSSL_IV_LEN: usize = 16;
const OPENSSL_HEADER_LEN: usize = OPENSSL_MAGIC.len() + OPENSSL_SALT_LEN;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + SALT_LEN;
const MIN_SEALED_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("passphrase is empty")]
    EmptyPassphrase,
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
    #[error("unsupported cipher suite id {0}")]
    UnsupportedSuite(u8),
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("RNG failed")]
    RngError,
}

/// Cipher suites understood by this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherSuite {
    /// OpenSSL `Salted__` format: EVP_BytesToKey(MD5) + AES-256-CBC.
    /// Recognised by its magic prefix rather than an id byte.
    #[default]
    OpenSslAes256Cbc,
    /// HKDF-SHA256 key derivation + ChaCha20-Poly1305.
    HkdfSha256ChaCha20Poly1305,
}

impl CipherSuite {
    /// Suite id for display. The OpenSSL suite reports 0 and never writes it.
    pub fn id(self) -> u8 {
        match self {
            CipherSuite::OpenSslAes256Cbc => 0,
            CipherSuite::HkdfSha256ChaCha20Poly1305 => 1,
        }
    }

    /// Resolve an explicit id byte. Only id-prefixed suites resolve here.
    pub fn from_id(id: u8) -> Result<Self, EnvelopeError> {
        match id {
            1 => Ok(CipherSuite::HkdfSha256ChaCha20Poly1305),
            other => Err(EnvelopeError::UnsupportedSuite(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CipherSuite::OpenSslAes256Cbc => "OpenSSL EVP_BytesToKey-MD5 / AES-256-CBC",
            CipherSuite::HkdfSha256ChaCha20Poly1305 => "HKDF-SHA256 / ChaCha20-Poly1305",
        }
    }
}

/// Per-envelope randomness. Exposed so tests can pin vectors.
///
/// The OpenSSL suite takes the first 8 salt bytes and derives its IV, so it
/// ignores `nonce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealMaterial {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

impl SealMaterial {
    pub fn random() -> Result<Self, EnvelopeError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut salt).map_err(|_| EnvelopeError::RngError)?;
        getrandom::getrandom(&mut nonce).map_err(|_| EnvelopeError::RngError)?;
        Ok(Self { salt, nonce })
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single round.
///
/// `D_i = MD5(D_{i-1} || passphrase || salt)`, concatenated until 48 bytes,
/// then split into a 32-byte key and a 16-byte IV.
pub fn evp_bytes_to_key(
    passphrase: &str,
    salt: &[u8],
) -> Result<(Zeroizing<[u8; OPENSSL_KEY_LEN]>, Zeroizing<[u8; OPENSSL_IV_LEN]>), EnvelopeError> {
    if passphrase.is_empty() {
        return Err(EnvelopeError::EmptyPassphrase);
    }
    let mut material = Zeroizing::new(Vec::with_capacity(OPENSSL_KEY_LEN + OPENSSL_IV_LEN + 16));
    let mut prev: Option<Vec<u8>> = None;
    while material.len() < OPENSSL_KEY_LEN + OPENSSL_IV_LEN {
        let mut md = Md5::new();
        if let Some(p) = &prev {
            md.update(p);
        }
        md.update(passphrase.as_bytes());
        md.update(salt);
        let block = md.finalize().to_vec();
        material.extend_from_slice(&block);
        prev = Some(block);
    }

    let mut key = Zeroizing::new([0u8; OPENSSL_KEY_LEN]);
    let mut iv = Zeroizing::new([0u8; OPENSSL_IV_LEN]);
    key.copy_from_slice(&material[..OPENSSL_KEY_LEN]);
    iv.copy_from_slice(&material[OPENSSL_KEY_LEN..OPENSSL_KEY_LEN + OPENSSL_IV_LEN]);
    Ok((key, iv))
}

/// Derive the 32-byte AEAD key for `passphrase` under `salt`.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, EnvelopeError> {
    if passphrase.is_empty() {
        return Err(EnvelopeError::EmptyPassphrase);
    }
    let hk = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(b"rsc_env_v1_key", key.as_mut())
        .map_err(|_| EnvelopeError::KeyDerivation)?;
    Ok(key)
}

fn header(suite: CipherSuite, salt: &[u8; SALT_LEN]) -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[0] = suite.id();
    h[1..].copy_from_slice(salt);
    h
}

/// Seal `plaintext` under `passphrase` in the on-wire suite.
pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<String, EnvelopeError> {
    seal_with_suite(CipherSuite::default(), plaintext, passphrase)
}

/// Seal in an explicit suite with fresh random material.
pub fn seal_with_suite(
    suite: CipherSuite,
    plaintext: &[u8],
    passphrase: &str,
) -> Result<String, EnvelopeError> {
    let material = SealMaterial::random()?;
    seal_with_material(suite, plaintext, passphrase, &material)
}

/// Seal with caller-supplied salt and nonce.
///
/// Reusing material for two different plaintexts leaks their relationship
/// in either suite; outside tests use [`seal`].
pub fn seal_with_material(
    suite: CipherSuite,
    plaintext: &[u8],
    passphrase: &str,
    material: &SealMaterial,
) -> Result<String, EnvelopeError> {
    match suite {
        CipherSuite::OpenSslAes256Cbc => seal_openssl(plaintext, passphrase, material),
        CipherSuite::HkdfSha256ChaCha20Poly1305 => seal_chacha(plaintext, passphrase, material),
    }
}

fn seal_openssl(
    plaintext: &[u8],
    passphrase: &str,
    material: &SealMaterial,
) -> Result<String, EnvelopeError> {
    let salt = &material.salt[..OPENSSL_SALT_LEN];
    let (key, iv) = evp_bytes_to_key(passphrase, salt)?;
    let ct = Aes256CbcEnc::new_from_slices(key.as_ref(), iv.as_ref())
        .map_err(|_| EnvelopeError::KeyDerivation)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(OPENSSL_HEADER_LEN + ct.len());
    out.extend_from_slice(OPENSSL_MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&ct);
    Ok(STANDARD.encode(out))
}

fn seal_chacha(
    plaintext: &[u8],
    passphrase: &str,
    material: &SealMaterial,
) -> Result<String, EnvelopeError> {
    let suite = CipherSuite::HkdfSha256ChaCha20Poly1305;
    let key = derive_key(passphrase, &material.salt)?;
    let aad = header(suite, &material.salt);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_ref()));
    let ct = cipher
        .encrypt(
            Nonce::from_slice(&material.nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| EnvelopeError::EncryptFailed)?;

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ct.len());
    out.extend_from_slice(&aad);
    out.extend_from_slice(&material.nonce);
    out.extend_from_slice(&ct);
    Ok(STANDARD.encode(out))
}

/// Fields of a sealed string, still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeParts {
    pub suite: CipherSuite,
    pub salt: Vec<u8>,
    /// Empty for the OpenSSL suite, whose IV is derived from the passphrase
    pub nonce: Vec<u8>,
    /// Ciphertext, plus tag for the AEAD suite
    pub sealed_body: Vec<u8>,
}

impl EnvelopeParts {
    /// Largest plaintext the body can hold.
    pub fn max_plaintext_len(&self) -> usize {
        match self.suite {
            // PKCS#7 always adds at least one byte
            CipherSuite::OpenSslAes256Cbc => self.sealed_body.len().saturating_sub(1),
            CipherSuite::HkdfSha256ChaCha20Poly1305 => {
                self.sealed_body.len().saturating_sub(TAG_LEN)
            }
        }
    }
}

/// Decode and split a sealed string without decrypting it.
pub fn inspect(sealed: &str) -> Result<EnvelopeParts, EnvelopeError> {
    let raw = STANDARD
        .decode(sealed.trim())
        .map_err(|_| EnvelopeError::Malformed("not base64"))?;

    if raw.starts_with(OPENSSL_MAGIC) {
        let body = &raw[OPENSSL_HEADER_LEN.min(raw.len())..];
        if raw.len() < OPENSSL_HEADER_LEN + AES_BLOCK_LEN || body.len() % AES_BLOCK_LEN != 0 {
            return Err(EnvelopeError::Malformed("bad block length"));
        }
        return Ok(EnvelopeParts {
            suite: CipherSuite::OpenSslAes256Cbc,
            salt: raw[OPENSSL_MAGIC.len()..OPENSSL_HEADER_LEN].to_vec(),
            nonce: Vec::new(),
            sealed_body: body.to_vec(),
        });
    }

    if raw.len() < MIN_SEALED_LEN {
        return Err(EnvelopeError::Malformed("too short"));
    }
    let suite = CipherSuite::from_id(raw[0])?;
    Ok(EnvelopeParts {
        suite,
        salt: raw[1..HEADER_LEN].to_vec(),
        nonce: raw[HEADER_LEN..HEADER_LEN + NONCE_LEN].to_vec(),
        sealed_body: raw[HEADER_LEN + NONCE_LEN..].to_vec(),
    })
}

/// Open a sealed string in whichever suite it was sealed with.
pub fn open(sealed: &str, passphrase: &str) -> Result<Vec<u8>, EnvelopeError> {
    if passphrase.is_empty() {
        return Err(EnvelopeError::EmptyPassphrase);
    }
    let parts = inspect(sealed)?;
    match parts.suite {
        CipherSuite::OpenSslAes256Cbc => {
            let (key, iv) = evp_bytes_to_key(passphrase, &parts.salt)?;
            Aes256CbcDec::new_from_slices(key.as_ref(), iv.as_ref())
                .map_err(|_| EnvelopeError::KeyDerivation)?
                .decrypt_padded_vec_mut::<Pkcs7>(&parts.sealed_body)
                .map_err(|_| EnvelopeError::DecryptFailed)
        }
        CipherSuite::HkdfSha256ChaCha20Poly1305 => {
            let mut salt = [0u8; SALT_LEN];
            salt.copy_from_slice(&parts.salt);
            let aad = header(parts.suite, &salt);

            let key = derive_key(passphrase, &salt)?;
            let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_ref()));
            cipher
                .decrypt(
                    Nonce::from_slice(&parts.nonce),
                    Payload {
                        msg: &parts.sealed_body,
                        aad: &aad,
                    },
                )
                .map_err(|_| EnvelopeError::DecryptFailed)
        }
    }
}
