//! Encrypted password store file.
//!
//! Each line is `base64(nonce || ciphertext)` where the plaintext is
//! `<instance_id>:<password>`. The ChaCha20-Poly1305 key is 32 random bytes kept
//! base64-encoded in `<store>.key`. Both files are written with mode 0600 on unix.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use super::{CredentialProvider, Secret};
use crate::error::{Result, TabsumError};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Password store backed by a file and its sibling key file.
#[derive(Debug, Clone)]
pub struct PasswordStore {
    path: PathBuf,
    key_path: PathBuf,
}

impl PasswordStore {
    /// Refer to the store at `path`. Nothing is read until an operation runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key_path = sibling(&path, ".key");
        Self { path, key_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Rebuild the store from scratch with a fresh key.
    pub fn create<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Secret)>,
    {
        let entries: BTreeMap<String, Secret> = entries.into_iter().collect();
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_private(&self.key_path, BASE64_STANDARD.encode(key).as_bytes())?;
        info!(
            "Created password store {} with {} entries",
            self.path.display(),
            entries.len()
        );
        self.save(&key, &entries)
    }

    /// Add a password. Errors if the instance already has one.
    pub fn add(&self, instance_id: &str, secret: Secret) -> Result<()> {
        let key = self.load_or_create_key()?;
        let mut entries = self.read_entries(&key)?;
        if entries.contains_key(instance_id) {
            return Err(TabsumError::CredentialStore(format!(
                "{} already has a stored password; use update",
                instance_id
            )));
        }
        entries.insert(instance_id.to_string(), secret);
        self.save(&key, &entries)
    }

    /// Replace a password. Errors if the instance has none.
    pub fn update(&self, instance_id: &str, secret: Secret) -> Result<()> {
        let key = self.load_key()?;
        let mut entries = self.read_entries(&key)?;
        match entries.get_mut(instance_id) {
            Some(existing) => *existing = secret,
            None => return Err(missing(instance_id)),
        }
        self.save(&key, &entries)
    }

    /// Remove a password. Errors if the instance has none.
    pub fn delete(&self, instance_id: &str) -> Result<()> {
        let key = self.load_key()?;
        let mut entries = self.read_entries(&key)?;
        if entries.remove(instance_id).is_none() {
            return Err(missing(instance_id));
        }
        self.save(&key, &entries)
    }

    fn entries(&self) -> Result<BTreeMap<String, Secret>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let key = self.load_key()?;
        self.read_entries(&key)
    }

    fn load_key(&self) -> Result<[u8; KEY_LEN]> {
        let encoded = fs::read_to_string(&self.key_path).map_err(|e| {
            TabsumError::CredentialStore(format!(
                "cannot read key file {}: {}",
                self.key_path.display(),
                e
            ))
        })?;
        let bytes = BASE64_STANDARD.decode(encoded.trim())?;
        bytes.as_slice().try_into().map_err(|_| {
            TabsumError::Crypto(format!(
                "key file {} does not hold a {}-byte key",
                self.key_path.display(),
                KEY_LEN
            ))
        })
    }

    fn load_or_create_key(&self) -> Result<[u8; KEY_LEN]> {
        if self.key_path.exists() {
            return self.load_key();
        }
        if self.path.exists() {
            return Err(TabsumError::CredentialStore(format!(
                "key file {} is missing; recreate the store",
                self.key_path.display()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_private(&self.key_path, BASE64_STANDARD.encode(key).as_bytes())?;
        debug!("Generated key file {}", self.key_path.display());
        Ok(key)
    }

    fn read_entries(&self, key: &[u8; KEY_LEN]) -> Result<BTreeMap<String, Secret>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = BTreeMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (instance_id, secret) = decrypt_record(key, line).map_err(|e| {
                TabsumError::CredentialStore(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    idx + 1,
                    e
                ))
            })?;
            entries.insert(instance_id, secret);
        }
        Ok(entries)
    }

    fn save(&self, key: &[u8; KEY_LEN], entries: &BTreeMap<String, Secret>) -> Result<()> {
        let mut content = String::new();
        for (instance_id, secret) in entries {
            content.push_str(&encrypt_record(key, instance_id, secret)?);
            content.push('\n');
        }

        let tmp = sibling(&self.path, ".tmp");
        write_private(&tmp, content.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialProvider for PasswordStore {
    fn get(&self, instance_id: &str) -> Result<Secret> {
        self.entries()?
            .remove(instance_id)
            .ok_or_else(|| missing(instance_id))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_keys().collect())
    }
}

fn missing(instance_id: &str) -> TabsumError {
    TabsumError::CredentialStore(format!("no password stored for {}", instance_id))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn encrypt_record(key: &[u8; KEY_LEN], instance_id: &str, secret: &Secret) -> Result<String> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let plaintext = format!("{}:{}", instance_id, secret.expose());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| TabsumError::Crypto(format!("cannot encrypt entry for {}", instance_id)))?;

    let mut record = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    record.extend_from_slice(&nonce);
    record.extend_from_slice(&ciphertext);
    Ok(BASE64_STANDARD.encode(record))
}

fn decrypt_record(key: &[u8; KEY_LEN], line: &str) -> Result<(String, Secret)> {
    let record = BASE64_STANDARD.decode(line)?;
    if record.len() <= NONCE_LEN {
        return Err(TabsumError::Crypto("record too short".into()));
    }
    let (nonce, ciphertext) = record.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| TabsumError::Crypto("authentication failed (wrong key?)".into()))?;
    let plaintext = String::from_utf8(plaintext)
        .map_err(|_| TabsumError::Crypto("record is not valid UTF-8".into()))?;

    match plaintext.split_once(':') {
        Some((instance_id, password)) if !instance_id.is_empty() => {
            Ok((instance_id.to_string(), Secret::new(password)))
        }
        _ => Err(TabsumError::Crypto("record has no instance prefix".into())),
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}
