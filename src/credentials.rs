//! Credential store
//!
//! Supplies the nullable bearer token used to build the connect address.

use std::env;
use std::sync::RwLock;

/// Source of the bearer credential
pub trait TokenStore: Send + Sync {
    /// Current token, if any
    fn token(&self) -> Option<String>;

    /// True when a non-empty token is stored
    fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Store a token, replacing any previous one
    pub fn save(&self, token: impl Into<String>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut slot) => *slot = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    /// Forget the stored token (logout)
    pub fn remove(&self) {
        match self.token.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Reads the token from an environment variable on every lookup
#[derive(Debug, Clone)]
pub struct EnvTokenStore {
    var: String,
}

impl EnvTokenStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenStore {
    fn default() -> Self {
        Self::new("CHAT_TOKEN")
    }
}

impl TokenStore for EnvTokenStore {
    fn token(&self) -> Option<String> {
        env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}
