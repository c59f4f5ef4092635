//! Redacting wrapper for configuration values that must never reach logs.

use serde::{Deserialize, Serialize};

/// Wraps a secret value (`api_key`, `password`) so that `Debug`/`Display`
/// redact it. Grounded in the teacher's `#[cfg(feature = "encryption")]`
/// handling of `VESTIGE_ENCRYPTION_KEY` in `storage/sqlite.rs`, which never
/// lets the raw key reach a log line.
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> std::fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(\"***redacted***\")")
    }
}

impl<T> std::fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***redacted***")
    }
}

impl Secret<String> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_never_leak_the_value() {
        let secret: Secret<String> = "sk-super-secret".to_string().into();
        assert_eq!(format!("{secret:?}"), "Secret(\"***redacted***\")");
        assert_eq!(format!("{secret}"), "***redacted***");
        assert_eq!(secret.expose(), "sk-super-secret");
    }

    #[test]
    fn toml_round_trip_preserves_the_value() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            password: Secret<String>,
        }
        let w = Wrapper { password: "hunter2".to_string().into() };
        let s = toml::to_string(&w).unwrap();
        assert!(s.contains("hunter2"));
        let parsed: Wrapper = toml::from_str(&s).unwrap();
        assert_eq!(parsed.password.expose(), "hunter2");
    }
}
