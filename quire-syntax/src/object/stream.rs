//! Stream objects.

use crate::object::Dict;
use std::fmt::{Debug, Formatter};

/// A stream of arbitrary data, together with its dictionary.
///
/// The payload is carried verbatim; applying or re-deriving filters is an
/// external concern.
#[derive(Clone, PartialEq)]
pub struct Stream {
    dict: Dict,
    data: Vec<u8>,
}

impl Stream {
    /// Create a new stream.
    pub fn new(dict: Dict, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// Return the dictionary of the stream.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Return the raw (potentially filtered) data of the stream.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Split the stream into its dictionary and its payload.
    pub fn into_parts(self) -> (Dict, Vec<u8>) {
        (self.dict, self.data)
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream (len: {:?})", self.data.len())
    }
}
