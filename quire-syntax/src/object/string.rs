//! String objects.

use std::fmt::{Debug, Formatter};

/// A PDF string with its content already decoded.
///
/// The `hex` marker records which of the two syntactic forms the string was
/// written in (and which form it is serialized back into).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct String {
    data: Vec<u8>,
    hex: bool,
}

impl String {
    /// Create a new literal string from decoded bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            hex: false,
        }
    }

    /// Create a new hex-encoded string from decoded bytes.
    pub fn new_hex(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            hex: true,
        }
    }

    /// Returns the content of the string.
    pub fn get(&self) -> &[u8] {
        &self.data
    }

    /// Whether the string uses the hex-encoded form.
    pub fn is_hex(&self) -> bool {
        self.hex
    }
}

impl Debug for String {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "({s})"),
            Err(_) => write!(f, "({} bytes)", self.data.len()),
        }
    }
}

impl From<&str> for String {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}
