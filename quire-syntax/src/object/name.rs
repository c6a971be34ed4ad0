//! Name objects.

use crate::reader::Reader;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// A PDF name.
///
/// Equality and hashing are defined over the unescaped bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Name(SmallVec<[u8; 16]>);

impl Name {
    /// Create a new name from a sequence of bytes, decoding `#HH` escapes.
    ///
    /// The caller (i.e. the lexer) has already verified that every `#` is
    /// followed by two hex digits.
    pub fn new(data: &[u8]) -> Self {
        fn convert_hex(c: u8) -> u8 {
            match c {
                b'A'..=b'F' => c - b'A' + 10,
                b'a'..=b'f' => c - b'a' + 10,
                b'0'..=b'9' => c - b'0',
                _ => 0,
            }
        }

        if !data.contains(&b'#') {
            return Self(SmallVec::from_slice(data));
        }

        let mut cleaned = SmallVec::new();
        let mut r = Reader::new(data);

        while let Some(b) = r.read_byte() {
            if b == b'#'
                && let Some(hex) = r.read_bytes(2)
            {
                cleaned.push(convert_hex(hex[0]) << 4 | convert_hex(hex[1]));
            } else {
                cleaned.push(b);
            }
        }

        Self(cleaned)
    }

    /// Create a new name from bytes that contain no escapes.
    pub fn from_unescaped(data: &[u8]) -> Self {
        Self(SmallVec::from_slice(data))
    }

    /// Return a string representation of the name.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.deref()).unwrap_or("{non-ascii name}")
    }
}

impl Deref for Name {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::borrow::Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        self.deref()
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        self.deref()
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deref().hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deref().cmp(other.deref())
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

impl From<&[u8]> for Name {
    fn from(value: &[u8]) -> Self {
        Self::from_unescaped(value)
    }
}
