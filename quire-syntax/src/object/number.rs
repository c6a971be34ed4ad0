//! Number objects.

use log::debug;
use std::str::FromStr;

/// A PDF number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Number(pub(crate) InternalNumber);

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum InternalNumber {
    Real(f32),
    Integer(i32),
}

impl Number {
    /// Returns the number as a f64.
    pub fn as_f64(&self) -> f64 {
        match self.0 {
            InternalNumber::Real(r) => r as f64,
            InternalNumber::Integer(i) => i as f64,
        }
    }

    /// Returns the number as a f32.
    pub fn as_f32(&self) -> f32 {
        match self.0 {
            InternalNumber::Real(r) => r,
            InternalNumber::Integer(i) => i as f32,
        }
    }

    /// Returns the number as an i32.
    pub fn as_i32(&self) -> i32 {
        match self.0 {
            InternalNumber::Real(r) => {
                let res = r as i32;

                if r.trunc() != r {
                    debug!("float {} was truncated to {}", r, res);
                }

                res
            }
            InternalNumber::Integer(i) => i,
        }
    }

    /// Returns the number as an i32, if it is an integer.
    pub fn as_integer(&self) -> Option<i32> {
        match self.0 {
            InternalNumber::Integer(i) => Some(i),
            InternalNumber::Real(_) => None,
        }
    }

    /// Create a new `Number` from a f32 number.
    pub fn from_f32(num: f32) -> Self {
        Self(InternalNumber::Real(num))
    }

    /// Create a new `Number` from a i32 number.
    pub fn from_i32(num: i32) -> Self {
        Self(InternalNumber::Integer(num))
    }

    /// Parse a number from the textual form produced by the lexer's scan.
    ///
    /// We need to go through f64 so that a full `i32` can be represented
    /// without losing precision.
    pub(crate) fn from_bytes(data: &[u8]) -> Option<Self> {
        let num = f64::from_str(std::str::from_utf8(data).ok()?).ok()?;

        if num.fract() == 0.0 && num >= i32::MIN as f64 && num <= i32::MAX as f64 {
            Some(Self(InternalNumber::Integer(num as i32)))
        } else {
            Some(Self(InternalNumber::Real(num as f32)))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::object::Number;

    #[test]
    fn integer() {
        assert_eq!(Number::from_bytes(b"98349").unwrap().as_i32(), 98349);
    }

    #[test]
    fn signed() {
        assert_eq!(Number::from_bytes(b"+32").unwrap().as_i32(), 32);
        assert_eq!(Number::from_bytes(b"-32").unwrap().as_i32(), -32);
    }

    #[test]
    fn leading_zeros() {
        assert_eq!(Number::from_bytes(b"003245").unwrap().as_i32(), 3245);
    }

    #[test]
    fn real() {
        assert_eq!(Number::from_bytes(b"-32.01").unwrap().as_f32(), -32.01);
        assert_eq!(Number::from_bytes(b"-.345").unwrap().as_f32(), -0.345);
    }

    #[test]
    fn trailing_dot() {
        assert_eq!(Number::from_bytes(b"4.").unwrap().as_i32(), 4);
    }

    #[test]
    fn integer_detection() {
        assert_eq!(Number::from_bytes(b"3.0").unwrap().as_integer(), Some(3));
        assert_eq!(Number::from_bytes(b"3.5").unwrap().as_integer(), None);
    }

    #[test]
    fn large_number() {
        assert_eq!(Number::from_bytes(b"38359922").unwrap().as_i32(), 38359922);
    }
}
