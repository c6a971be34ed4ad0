//! The object value model.

use crate::token::{Lexer, SyntaxError, SyntaxErrorKind, Token};
use crate::trivia::{is_eol_character, is_white_space_character};
use log::warn;
use std::fmt::Debug;

pub mod array;
pub mod dict;
pub mod name;
pub mod number;
pub mod r#ref;
pub mod stream;
pub mod string;

pub use array::Array;
pub use dict::Dict;
pub use name::Name;
pub use number::Number;
pub use r#ref::ObjRef;
pub use stream::Stream;

/// A trait for types an object can be cast into.
pub(crate) trait ObjectLike: TryFrom<Object> + Debug + Clone {}

macro_rules! object {
    ($t:ty, $s:ident) => {
        impl TryFrom<Object> for $t {
            type Error = ();

            fn try_from(value: Object) -> std::result::Result<Self, Self::Error> {
                match value {
                    Object::$s(v) => Ok(v),
                    _ => Err(()),
                }
            }
        }

        impl From<$t> for Object {
            fn from(value: $t) -> Self {
                Object::$s(value)
            }
        }

        impl ObjectLike for $t {}
    };
}

/// A PDF object.
///
/// Leaves are immutable once built; arrays and dictionaries are mutable
/// containers. A [`Ref`](Object::Ref) stands in for a value stored elsewhere
/// in its source document.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean object.
    Boolean(bool),
    /// A number object.
    Number(Number),
    /// A string object.
    String(string::String),
    /// A name object.
    Name(Name),
    /// An array object.
    Array(Array),
    /// A dict object.
    Dict(Dict),
    /// A stream object.
    Stream(Stream),
    /// An indirect object reference.
    Ref(ObjRef),
}

object!(Number, Number);
object!(string::String, String);
object!(Name, Name);
object!(Array, Array);
object!(Dict, Dict);
object!(Stream, Stream);
object!(ObjRef, Ref);
object!(bool, Boolean);

impl ObjectLike for Object {}

impl TryFrom<Object> for i32 {
    type Error = ();

    fn try_from(value: Object) -> std::result::Result<Self, Self::Error> {
        match value {
            Object::Number(n) => Ok(n.as_i32()),
            _ => Err(()),
        }
    }
}

impl ObjectLike for i32 {}

impl TryFrom<Object> for usize {
    type Error = ();

    fn try_from(value: Object) -> std::result::Result<Self, Self::Error> {
        match value {
            Object::Number(n) => usize::try_from(n.as_i32()).map_err(|_| ()),
            _ => Err(()),
        }
    }
}

impl ObjectLike for usize {}

impl TryFrom<Object> for f32 {
    type Error = ();

    fn try_from(value: Object) -> std::result::Result<Self, Self::Error> {
        match value {
            Object::Number(n) => Ok(n.as_f32()),
            _ => Err(()),
        }
    }
}

impl ObjectLike for f32 {}

impl TryFrom<Object> for f64 {
    type Error = ();

    fn try_from(value: Object) -> std::result::Result<Self, Self::Error> {
        match value {
            Object::Number(n) => Ok(n.as_f64()),
            _ => Err(()),
        }
    }
}

impl ObjectLike for f64 {}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Self::Number(Number::from_i32(value))
    }
}

impl From<f32> for Object {
    fn from(value: f32) -> Self {
        Self::Number(Number::from_f32(value))
    }
}

impl Object {
    /// Try casting the object to a specific subtype.
    #[allow(
        private_bounds,
        reason = "users shouldn't be able to implement `ObjectLike` for custom types."
    )]
    pub fn cast<T>(self) -> Option<T>
    where
        T: ObjectLike,
    {
        self.try_into().ok()
    }

    /// Whether the object is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[inline(always)]
    pub fn into_dict(self) -> Option<Dict> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_array(self) -> Option<Array> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_name(self) -> Option<Name> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_number(self) -> Option<Number> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_string(self) -> Option<string::String> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_stream(self) -> Option<Stream> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_bool(self) -> Option<bool> {
        self.cast()
    }

    #[inline(always)]
    pub fn into_ref(self) -> Option<ObjRef> {
        self.cast()
    }

    /// Parse a single object from the start of the given data.
    pub fn parse(data: &[u8]) -> Result<Self, SyntaxError> {
        let mut lx = Lexer::new(data);
        parse_object(&mut lx)
    }
}

/// Assemble the next object from the lexer's token stream.
pub(crate) fn parse_object(lx: &mut Lexer<'_>) -> Result<Object, SyntaxError> {
    let token = lx.next_value_token()?;
    parse_object_from(lx, token)
}

pub(crate) fn parse_object_from<'a>(
    lx: &mut Lexer<'a>,
    token: Token<'a>,
) -> Result<Object, SyntaxError> {
    match token {
        Token::Number(n) => Ok(Object::Number(n)),
        Token::String { data, hex } => Ok(Object::String(if hex {
            string::String::new_hex(data.into_owned())
        } else {
            string::String::new(data.into_owned())
        })),
        Token::Name(n) => Ok(Object::Name(n)),
        Token::Ref(r) => Ok(Object::Ref(r)),
        Token::ArrayStart => parse_array(lx),
        Token::DictStart => parse_dict_or_stream(lx),
        Token::Keyword(b"true") => Ok(Object::Boolean(true)),
        Token::Keyword(b"false") => Ok(Object::Boolean(false)),
        Token::Keyword(b"null") => Ok(Object::Null),
        Token::Eof => Err(SyntaxError::new(
            SyntaxErrorKind::UnexpectedEof,
            lx.offset(),
        )),
        _ => Err(SyntaxError::new(
            SyntaxErrorKind::UnexpectedToken,
            lx.offset(),
        )),
    }
}

fn parse_array(lx: &mut Lexer<'_>) -> Result<Object, SyntaxError> {
    let mut array = Array::new();

    loop {
        match lx.next_value_token()? {
            Token::ArrayEnd => break,
            Token::Eof => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedEof,
                    lx.offset(),
                ));
            }
            token => array.push(parse_object_from(lx, token)?),
        }
    }

    Ok(Object::Array(array))
}

fn parse_dict_or_stream(lx: &mut Lexer<'_>) -> Result<Object, SyntaxError> {
    let dict = parse_dict(lx)?;

    let r = lx.reader_mut();
    let rewind = r.offset();

    loop {
        r.forward_while(is_white_space_character);

        if r.peek_byte() == Some(b'%') {
            r.forward_while(|b| !is_eol_character(b));
        } else {
            break;
        }
    }

    if r.forward_tag(b"stream").is_none() {
        r.jump(rewind);
        return Ok(Object::Dict(dict));
    }

    // The keyword is followed by CRLF or LF; tolerate a bare CR as well.
    if r.forward_if(|b| b == b'\r').is_some() {
        let _ = r.forward_if(|b| b == b'\n');
    } else {
        let _ = r.forward_if(|b| b == b'\n');
    }

    let start = r.offset();

    let data = match dict.get::<usize>(dict::keys::LENGTH) {
        Some(len) if r.range(start..start + len).is_some() => {
            let data = r.range(start..start + len).unwrap().to_vec();
            r.jump(start + len);
            r.forward_while(is_white_space_character);

            if r.forward_tag(b"endstream").is_none() {
                warn!("stream is not closed by an endstream keyword");
            }

            data
        }
        _ => {
            // No usable length entry; scan for the closing keyword instead.
            let Some(end) = find_tag(r.range(start..r.len()).unwrap_or(b""), b"endstream") else {
                return Err(SyntaxError::new(SyntaxErrorKind::UnexpectedEof, r.offset()));
            };

            let mut data = r.range(start..start + end).unwrap();

            if data.last() == Some(&b'\n') {
                data = &data[..data.len() - 1];
            }
            if data.last() == Some(&b'\r') {
                data = &data[..data.len() - 1];
            }

            r.jump(start + end);
            let _ = r.forward_tag(b"endstream");

            data.to_vec()
        }
    };

    Ok(Object::Stream(Stream::new(dict, data)))
}

fn parse_dict(lx: &mut Lexer<'_>) -> Result<Dict, SyntaxError> {
    let mut dict = Dict::new();

    loop {
        match lx.next_meaningful_token()? {
            Token::DictEnd => break,
            Token::Name(key) => {
                let value = parse_object(lx)?;
                dict.insert(key, value);
            }
            Token::Eof => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedEof,
                    lx.offset(),
                ));
            }
            token => {
                // In case there is garbage in-between, be lenient and just
                // skip it.
                warn!("skipping a non-name dictionary key");
                parse_object_from(lx, token)?;
            }
        }
    }

    Ok(dict)
}

fn find_tag(data: &[u8], tag: &[u8]) -> Option<usize> {
    data.windows(tag.len()).position(|w| w == tag)
}

#[cfg(test)]
mod tests {
    use crate::object::dict::keys::{COUNT, KIDS, TYPE};
    use crate::object::{Array, Name, Number, ObjRef, Object, Stream};

    fn object(data: &[u8]) -> Object {
        Object::parse(data).unwrap()
    }

    #[test]
    fn null() {
        assert!(matches!(object(b"null"), Object::Null));
    }

    #[test]
    fn bool() {
        assert!(matches!(object(b"true"), Object::Boolean(true)));
        assert!(matches!(object(b"false"), Object::Boolean(false)));
    }

    #[test]
    fn number() {
        assert_eq!(object(b"34.5"), Object::Number(Number::from_f32(34.5)));
    }

    #[test]
    fn string() {
        assert!(matches!(object(b"(Hi)"), Object::String(_)));
        assert!(matches!(object(b"<34>"), Object::String(_)));
    }

    #[test]
    fn name() {
        assert_eq!(object(b"/Name"), Object::Name(Name::new(b"Name")));
    }

    #[test]
    fn reference() {
        assert_eq!(object(b"12 0 R"), Object::Ref(ObjRef::new(12, 0)));
    }

    #[test]
    fn array() {
        let arr = object(b"[45 /Flag (s)]").into_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0], Object::Number(Number::from_i32(45)));
    }

    #[test]
    fn array_nested() {
        let arr = object(b"[[1 2] [3]]").into_array().unwrap();
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn dict() {
        let dict = object(b"<< /Entry 45 >>").into_dict().unwrap();
        assert_eq!(dict.get::<i32>(b"Entry"), Some(45));
    }

    #[test]
    fn dict_page_tree_node() {
        let dict = object(b"<< /Type /Page /Count 3 /Kids [1 0 R 2 0 R] >>")
            .into_dict()
            .unwrap();

        assert_eq!(dict.get::<Name>(TYPE), Some(Name::new(b"Page")));
        assert_eq!(dict.get::<i32>(COUNT), Some(3));

        let kids = dict.get::<Array>(KIDS).unwrap();
        assert_eq!(kids[0], Object::Ref(ObjRef::new(1, 0)));
        assert_eq!(kids[1], Object::Ref(ObjRef::new(2, 0)));
    }

    #[test]
    fn dict_null_entry_removed() {
        let dict = object(b"<< /A 1 /B null >>").into_dict().unwrap();
        assert!(!dict.contains_key(b"B"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn dict_with_comment() {
        let dict = object(b"<< /Hi % A comment \n 67.0 % Another comment \n >>")
            .into_dict()
            .unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn dict_garbage_in_between() {
        let dict = object(b"<< /A 1 2000 /B 2 >>").into_dict().unwrap();
        assert!(dict.contains_key(b"A"));
        assert!(dict.contains_key(b"B"));
    }

    #[test]
    fn stream() {
        let stream: Stream = object(b"<< /Length 3 >> stream\nabc\nendstream")
            .into_stream()
            .unwrap();
        assert_eq!(stream.raw_data(), b"abc");
    }

    #[test]
    fn stream_without_length() {
        let stream: Stream = object(b"<< >> stream\nabcdef\nendstream")
            .into_stream()
            .unwrap();
        assert_eq!(stream.raw_data(), b"abcdef");
    }

    #[test]
    fn dict_with_trailing() {
        let dict = object(b"<< /Hi 67.0 >>trailing data").into_dict().unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn cast_mismatch() {
        assert_eq!(object(b"(text)").into_dict(), None);
        assert_eq!(object(b"34").into_name(), None);
    }

    #[test]
    fn typed_cast() {
        assert_eq!(object(b"34").cast::<i32>(), Some(34));
        assert_eq!(object(b"34.5").cast::<f64>(), Some(34.5f32 as f64));
    }
}
