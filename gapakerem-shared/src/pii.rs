use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Number of trailing characters left readable when a value is printed.
const VISIBLE_TAIL: usize = 3;

/// Holds a personal value (phone number, contact handle) that must never reach
/// log output in clear text.
///
/// `Debug` and `Display` print a masked form keeping only the last few
/// characters, so `tracing::info!(?booking)` is safe. Serialization writes the
/// real value because API responses need it.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn masked(&self) -> String {
        let chars: Vec<char> = self.0.as_ref().chars().collect();
        if chars.len() <= VISIBLE_TAIL {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - VISIBLE_TAIL..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - VISIBLE_TAIL), tail)
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.masked())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
