//! Redaction wrapper for secrets held in config and memory.

use std::fmt::{self, Debug, Display};

/// Wraps a value that must never reach logs, error chains, or serialized
/// output. `Debug`, `Display`, and `Serialize` all emit `"<redacted>"`;
/// the inner value is only reachable through [`Redacted::expose`].
#[derive(Clone)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Redacted(value)
    }

    /// Deliberate access to the secret. Call sites are the audit surface.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Redacted<T> {
    fn from(value: T) -> Self {
        Redacted(value)
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_value() {
        let secret = Redacted::new("0xdeadbeef".to_string());
        assert_eq!(format!("{:?}", secret), "<redacted>");
        assert_eq!(format!("{}", secret), "<redacted>");
        assert_eq!(secret.expose(), "0xdeadbeef");
    }

    #[test]
    fn test_serialize_hides_value() {
        let secret = Redacted::new("hunter2");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"<redacted>\"");
    }
}
