use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for credential material that masks its value in Debug and Display output.
///
/// Operator API keys and bearer tokens travel through configuration structs that get
/// logged with `{:?}`; wrapping them keeps the secret out of every log line.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Serialization is only used to hand the value to an operator backend,
        // never for logging.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the real value. Only call this where the secret leaves the process.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let key = Masked::from("sk_live_123");
        assert_eq!(format!("{:?}", key), "********");
        assert_eq!(format!("{}", key), "********");
        assert_eq!(key.expose(), "sk_live_123");
    }

    #[test]
    fn test_masked_deserializes_transparently() {
        let key: Masked<String> = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(key.into_inner(), "abc");
    }
}
