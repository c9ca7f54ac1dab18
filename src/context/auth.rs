//! Basic authentication payload.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Credentials supplied through `Authorization: Basic ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    login: String,
    password: String,
}

impl Auth {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Parse an `Authorization` header value. Returns `None` for any other scheme
    /// or a malformed payload.
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (login, password) = decoded.split_once(':')?;
        Some(Self::new(login, password))
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}
