//! Durable key-value storage for the session.
//!
//! Entries carry cookie-style attributes: a bounded lifetime, a
//! secure-transport flag and a same-site policy. Expired entries read as
//! absent and are purged on the next write.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Lifetime of the session entries, in days
const SESSION_COOKIE_DAYS: i64 = 1;

const SEALED_FORMAT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub max_age: Duration,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieAttributes {
    /// One day, secure transport only, first-party navigation only
    pub fn session() -> Self {
        Self {
            max_age: Duration::days(SESSION_COOKIE_DAYS),
            secure: true,
            same_site: SameSite::Strict,
        }
    }
}

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str, attributes: &CookieAttributes) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl StoredCookie {
    fn new(value: &str, attributes: &CookieAttributes, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now + attributes.max_age,
            secure: attributes.secure,
            same_site: attributes.same_site,
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store that lives as long as the process. Used when nothing should touch disk.
pub struct MemoryStore {
    entries: HashMap<String, StoredCookie>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    /// Raw entry including attributes, if still live
    pub fn entry(&self, key: &str) -> Option<&StoredCookie> {
        let now = self.clock.now();
        self.entries.get(key).filter(|c| c.is_live(now))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entry(key).map(|c| c.value.clone()))
    }

    fn set(&mut self, key: &str, value: &str, attributes: &CookieAttributes) -> Result<()> {
        let now = self.clock.now();
        self.entries.retain(|_, c| c.is_live(now));
        self.entries
            .insert(key.to_string(), StoredCookie::new(value, attributes, now));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// File-backed cookie jar
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SealedFile {
    version: u8,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// JSON cookie jar on disk, optionally sealed with a passphrase.
///
/// The file is re-read on every access, so another process sharing the file
/// sees writes on its next read.
pub struct CookieJar {
    path: PathBuf,
    passphrase: Option<String>,
    clock: Arc<dyn Clock>,
}

impl CookieJar {
    pub fn open(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            passphrase: None,
            clock,
        }
    }

    /// Jar whose file is encrypted with a key derived from `passphrase`
    pub fn encrypted(path: PathBuf, passphrase: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            passphrase: Some(passphrase),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredCookie>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cookie jar {}", self.path.display()))?;
        let json = match self.passphrase {
            Some(ref passphrase) => unseal(&raw, passphrase)?,
            None => raw,
        };
        serde_json::from_str(&json).context("Failed to parse cookie jar")
    }

    fn write_all(&self, entries: &BTreeMap<String, StoredCookie>) -> Result<()> {
        if entries.is_empty() {
            return self.delete_file();
        }
        let json = serde_json::to_string_pretty(entries)?;
        let contents = match self.passphrase {
            Some(ref passphrase) => seal(&json, passphrase)?,
            None => json,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_private(&self.path, contents.as_bytes())
            .with_context(|| format!("Failed to write cookie jar {}", self.path.display()))
    }

    fn delete_file(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl KeyValueStore for CookieJar {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        Ok(self
            .read_all()?
            .remove(key)
            .filter(|c| c.is_live(now))
            .map(|c| c.value))
    }

    fn set(&mut self, key: &str, value: &str, attributes: &CookieAttributes) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.read_all()?;
        entries.retain(|_, c| c.is_live(now));
        entries.insert(key.to_string(), StoredCookie::new(value, attributes, now));
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let now = self.clock.now();
        match self.read_all() {
            Ok(mut entries) => {
                entries.remove(key);
                entries.retain(|_, c| c.is_live(now));
                self.write_all(&entries)
            }
            Err(e) => {
                // Unreadable jar: nothing in it can be trusted
                warn!(error = %e, path = %self.path.display(), "Discarding unreadable cookie jar");
                self.delete_file()
            }
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

// ============================================================================
// Sealing
// ============================================================================

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow!("Failed to derive session key: {}", e))?;
    Ok(key)
}

fn seal(plaintext: &str, passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| anyhow!("Failed to encrypt cookie jar"))?;

    let sealed = SealedFile {
        version: SEALED_FORMAT_VERSION,
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    };
    Ok(serde_json::to_string(&sealed)?)
}

fn unseal(raw: &str, passphrase: &str) -> Result<String> {
    let sealed: SealedFile =
        serde_json::from_str(raw).context("Cookie jar is not in sealed format")?;
    if sealed.version != SEALED_FORMAT_VERSION {
        return Err(anyhow!("Unsupported cookie jar version {}", sealed.version));
    }

    let salt = STANDARD.decode(&sealed.salt).context("Invalid salt encoding")?;
    let nonce = STANDARD.decode(&sealed.nonce).context("Invalid nonce encoding")?;
    if nonce.len() != NONCE_LEN {
        return Err(anyhow!("Invalid nonce length {}", nonce.len()));
    }
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .context("Invalid ciphertext encoding")?;

    let key = derive_key(passphrase, &salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| anyhow!("Failed to decrypt cookie jar (wrong key or corrupted file)"))?;
    debug!(bytes = plaintext.len(), "Unsealed cookie jar");
    String::from_utf8(plaintext).context("Decrypted cookie jar is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp"),
        ))
    }

    #[test]
    fn test_session_attributes() {
        let attrs = CookieAttributes::session();
        assert_eq!(attrs.max_age, Duration::days(1));
        assert!(attrs.secure);
        assert_eq!(attrs.same_site, SameSite::Strict);
    }

    #[test]
    fn test_memory_store_set_get_remove() {
        let clock = manual_clock();
        let mut store = MemoryStore::new(clock.clone());
        store.set("token", "abc", &CookieAttributes::session()).expect("set");
        assert_eq!(store.get("token").expect("get").as_deref(), Some("abc"));

        let entry = store.entry("token").expect("entry");
        assert_eq!(entry.expires_at, clock.now() + Duration::days(1));
        assert!(entry.secure);

        store.remove("token").expect("remove");
        assert!(store.get("token").expect("get").is_none());
        // Removing a missing key is fine
        store.remove("token").expect("remove again");
    }

    #[test]
    fn test_memory_store_expires_after_one_day() {
        let clock = manual_clock();
        let mut store = MemoryStore::new(clock.clone());
        store.set("user", "{}", &CookieAttributes::session()).expect("set");

        clock.advance(Duration::hours(23));
        assert!(store.get("user").expect("get").is_some());

        clock.advance(Duration::hours(1));
        assert!(store.get("user").expect("get").is_none());
    }

    #[test]
    fn test_cookie_jar_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("session.json");
        let clock = manual_clock();

        let mut jar = CookieJar::open(path.clone(), clock.clone());
        jar.set("token", "t0k3n", &CookieAttributes::session()).expect("set");
        jar.set("user", r#"{"id":7}"#, &CookieAttributes::session()).expect("set");

        let other = CookieJar::open(path.clone(), clock.clone());
        assert_eq!(other.get("token").expect("get").as_deref(), Some("t0k3n"));
        assert_eq!(other.get("user").expect("get").as_deref(), Some(r#"{"id":7}"#));

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"same_site\": \"strict\""));
    }

    #[test]
    fn test_cookie_jar_removing_last_entry_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let mut jar = CookieJar::open(path.clone(), manual_clock());

        jar.set("token", "t", &CookieAttributes::session()).expect("set");
        assert!(path.exists());
        jar.remove("token").expect("remove");
        assert!(!path.exists());
        jar.remove("token").expect("remove missing");
    }

    #[test]
    fn test_cookie_jar_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = manual_clock();
        let mut jar = CookieJar::open(dir.path().join("session.json"), clock.clone());
        jar.set("token", "t", &CookieAttributes::session()).expect("set");

        clock.advance(Duration::days(1) + Duration::seconds(1));
        assert!(jar.get("token").expect("get").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_cookie_jar_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let mut jar = CookieJar::open(path.clone(), manual_clock());
        jar.set("token", "t", &CookieAttributes::session()).expect("set");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_encrypted_jar_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let clock = manual_clock();

        let mut jar = CookieJar::encrypted(path.clone(), "correct horse".into(), clock.clone());
        jar.set("token", "secret-token", &CookieAttributes::session()).expect("set");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(!raw.contains("secret-token"));

        let reopened = CookieJar::encrypted(path, "correct horse".into(), clock);
        assert_eq!(reopened.get("token").expect("get").as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_encrypted_jar_wrong_passphrase() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let clock = manual_clock();

        let mut jar = CookieJar::encrypted(path.clone(), "right".into(), clock.clone());
        jar.set("token", "t", &CookieAttributes::session()).expect("set");

        let mut wrong = CookieJar::encrypted(path.clone(), "wrong".into(), clock);
        assert!(wrong.get("token").is_err());

        // Removal through an unreadable jar discards the file
        wrong.remove("token").expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn test_plain_jar_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").expect("write");

        let jar = CookieJar::open(path, manual_clock());
        assert!(jar.get("token").is_err());
    }
}
