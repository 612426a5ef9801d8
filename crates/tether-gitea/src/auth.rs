//! Access-token resolution.

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Environment variables checked by [`Auth::auto`], in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["TETHER_TOKEN", "GITEA_TOKEN"];

/// Where the access token comes from.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Use token from environment variable.
    EnvVar(String),

    /// Use a specific token.
    Token(SecretString),
}

impl Auth {
    /// Pick the first token variable that is set in the environment.
    #[must_use]
    pub fn auto() -> Self {
        Self::auto_with(|var| std::env::var(var).ok())
    }

    /// Like [`Auth::auto`], reading variables through `lookup`.
    ///
    /// Falls back to `TETHER_TOKEN` so the error names the preferred variable.
    #[must_use]
    pub fn auto_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = TOKEN_ENV_VARS
            .iter()
            .find(|var| lookup(var).is_some_and(|v| !v.is_empty()))
            .unwrap_or(&TOKEN_ENV_VARS[0]);
        Self::EnvVar((*var).to_string())
    }

    /// Resolve the authentication to a token.
    ///
    /// # Errors
    /// Returns [`Error::NoToken`] if the variable is unset or empty.
    pub fn resolve(&self) -> Result<SecretString> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Like [`Auth::resolve`], reading variables through `lookup`.
    ///
    /// # Errors
    /// Returns [`Error::NoToken`] if the variable is unset or empty.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<SecretString> {
        match self {
            Self::EnvVar(var) => match lookup(var) {
                Some(token) if !token.is_empty() => Ok(SecretString::from(token)),
                _ => Err(Error::NoToken),
            },
            Self::Token(t) => Ok(t.clone()),
        }
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self::auto()
    }
}
