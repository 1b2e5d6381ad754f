/*!
The session store.

One visitor's session is the four values handed back by a successful
login: the bearer token, the role, the display name, and the user id.
The store maps opaque session keys (carried by the browser in a cookie)
to sessions, and writes the whole map through to a JSON file on disk so
sessions survive a restart. There is no client-side expiry; a session
lives until `clear()` removes it.
*/
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::{distributions, Rng};
use serde::{Deserialize, Serialize};

use crate::user::Role;

const DEFAULT_KEY_LENGTH: usize = 32;
const DEFAULT_KEY_CHARS: &str =
"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, PartialEq)]
pub struct StoreError(String);

impl StoreError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> StoreError {
        StoreError(format!("Session file: {}", &e))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> StoreError {
        StoreError(format!("Session file contents: {}", &e))
    }
}

impl From<String> for StoreError {
    fn from(s: String) -> StoreError { StoreError(s) }
}

/// The four values a login hands back, kept together for the life of
/// the session. No validation of the token's shape happens here; the
/// upstream API's payload is trusted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub name: String,
    pub user_id: i64,
}

pub struct SessionStore {
    path: PathBuf,
    sessions: HashMap<String, Session>,
    key_chars: Vec<char>,
    key_length: usize,
}

impl SessionStore {
    /// Open the store backed by the file at `path`, reading any sessions
    /// a previous run left there. A missing file just means an empty
    /// store; it gets created on the first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();
        log::trace!("SessionStore::new( {:?} ) called.", &path);

        let sessions: HashMap<String, Session> = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::from(e)
                    .annotate("Unable to read session file"))?;
            serde_json::from_str(&text)
                .map_err(|e| StoreError::from(e)
                    .annotate("Unable to deserialize session file"))?
        } else {
            HashMap::new()
        };

        let key_chars: Vec<char> = DEFAULT_KEY_CHARS.chars().collect();
        let key_length = DEFAULT_KEY_LENGTH;

        Ok(Self { path, sessions, key_chars, key_length })
    }

    /// Set characters to use when generating session keys.
    ///
    /// Will quietly do nothing if `new_chars` has zero length.
    pub fn set_key_chars(&mut self, new_chars: &str) {
        if new_chars.len() > 0 {
            self.key_chars = new_chars.chars().collect();
        }
    }

    /// Set the length of session keys to generate.
    ///
    /// Will quietly do nothing if set to zero.
    pub fn set_key_length(&mut self, new_length: usize) {
        if new_length > 0 {
            self.key_length = new_length;
        }
    }

    /// Generate a new session key based on the current values of
    /// self.key_chars and self.key_length.
    pub fn generate_key(&self) -> String {
        // self.key_chars should never have zero length.
        let dist = distributions::Slice::new(&self.key_chars).unwrap();
        let rng = rand::thread_rng();
        let new_key: String = rng.sample_iter(&dist)
            .take(self.key_length)
            .collect();
        new_key
    }

    /// Write all four session values under `key` and persist the store.
    pub fn set_session(&mut self, key: &str, session: Session) -> Result<(), StoreError> {
        log::trace!(
            "SessionStore::set_session( {:?}, [ {:?} session for {:?} ] ) called.",
            key, &session.role, &session.name
        );

        self.sessions.insert(key.to_owned(), session);
        self.persist()
            .map_err(|e| e.annotate("Unable to persist new session"))
    }

    /// Read the session stored under `key`, if there is one.
    pub fn get(&self, key: &str) -> Option<Session> {
        self.sessions.get(key).cloned()
    }

    /// Remove the session stored under `key` and persist the store.
    /// Clearing a key with no session is fine; the file still gets
    /// rewritten.
    pub fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        log::trace!("SessionStore::clear( {:?} ) called.", key);

        self.sessions.remove(key);
        self.persist()
            .map_err(|e| e.annotate("Unable to persist session removal"))
    }

    pub fn len(&self) -> usize { self.sessions.len() }

    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::from(e)
                        .annotate("Unable to create session file directory"))?;
            }
        }

        let text = serde_json::to_string_pretty(&self.sessions)
            .map_err(|e| StoreError::from(e)
                .annotate("Unable to serialize sessions"))?;
        std::fs::write(&self.path, text)
            .map_err(|e| StoreError::from(e)
                .annotate("Unable to write session file"))
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("path", &self.path)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn test_session() -> Session {
        Session {
            token: "t".to_owned(),
            role: Role::Admin,
            name: "A".to_owned(),
            user_id: 7,
        }
    }

    #[test]
    fn round_trip() {
        ensure_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let mut store = SessionStore::new(&path).unwrap();
        assert!(store.is_empty());

        store.set_session("k", test_session()).unwrap();
        assert_eq!(store.get("k").unwrap(), test_session());
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn clear_removes_all_four() {
        ensure_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let mut store = SessionStore::new(&path).unwrap();
        store.set_session("k", test_session()).unwrap();
        store.clear("k").unwrap();
        assert!(store.get("k").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn sessions_survive_reload() {
        ensure_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        {
            let mut store = SessionStore::new(&path).unwrap();
            store.set_session("k", test_session()).unwrap();
        }

        let store = SessionStore::new(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), test_session());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn generated_keys() {
        ensure_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let mut store = SessionStore::new(&path).unwrap();
        let key = store.generate_key();
        assert_eq!(key.len(), DEFAULT_KEY_LENGTH);
        assert!(key.chars().all(|c| DEFAULT_KEY_CHARS.contains(c)));
        assert_ne!(key, store.generate_key());

        store.set_key_length(8);
        assert_eq!(store.generate_key().len(), 8);
        store.set_key_length(0);
        assert_eq!(store.generate_key().len(), 8);
    }
}
