//! Serializing objects back into wire syntax.
//!
//! The output is semantically equivalent to the input syntax; whitespace and
//! formatting are not preserved byte-for-byte.

use crate::object::dict::keys::LENGTH;
use crate::object::number::InternalNumber;
use crate::object::{Dict, Name, Object, Stream, string};
use crate::trivia::{is_delimiter_character, is_white_space_character};

/// Serialize an object into the given buffer.
pub fn write_object(obj: &Object, out: &mut Vec<u8>) {
    match obj {
        Object::Null => out.extend(b"null"),
        Object::Boolean(b) => out.extend(if *b { &b"true"[..] } else { &b"false"[..] }),
        Object::Number(n) => match n.0 {
            InternalNumber::Integer(i) => out.extend(i.to_string().into_bytes()),
            InternalNumber::Real(r) => out.extend(r.to_string().into_bytes()),
        },
        Object::String(s) => write_string(s, out),
        Object::Name(n) => write_name(n, out),
        Object::Array(a) => {
            out.push(b'[');

            for (i, item) in a.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(item, out);
            }

            out.push(b']');
        }
        Object::Dict(d) => write_dict(d, out),
        Object::Stream(s) => write_stream(s, out),
        Object::Ref(r) => {
            out.extend(format!("{} {} R", r.obj_number, r.gen_number).into_bytes());
        }
    }
}

/// Serialize an object into a fresh buffer.
pub fn to_bytes(obj: &Object) -> Vec<u8> {
    let mut out = vec![];
    write_object(obj, &mut out);
    out
}

fn write_dict(dict: &Dict, out: &mut Vec<u8>) {
    out.extend(b"<< ");

    for (key, value) in dict.entries() {
        write_name(key, out);
        out.push(b' ');
        write_object(value, out);
        out.push(b' ');
    }

    out.extend(b">>");
}

fn write_stream(stream: &Stream, out: &mut Vec<u8>) {
    // The length entry has to match the payload we actually write.
    let mut dict = stream.dict().clone();
    dict.insert(Name::from_unescaped(LENGTH), stream.raw_data().len() as i32);

    write_dict(&dict, out);
    out.extend(b"\nstream\n");
    out.extend(stream.raw_data());
    out.extend(b"\nendstream");
}

fn write_name(name: &Name, out: &mut Vec<u8>) {
    out.push(b'/');

    for b in name.iter().copied() {
        if is_white_space_character(b) || is_delimiter_character(b) || b == b'#' || !(0x21..=0x7e).contains(&b)
        {
            out.extend(format!("#{b:02X}").into_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_string(s: &string::String, out: &mut Vec<u8>) {
    if s.is_hex() {
        out.push(b'<');

        for b in s.get() {
            out.extend(format!("{b:02X}").into_bytes());
        }

        out.push(b'>');
    } else {
        out.push(b'(');

        for b in s.get().iter().copied() {
            match b {
                b'(' | b')' | b'\\' => {
                    out.push(b'\\');
                    out.push(b);
                }
                b'\n' => out.extend(br"\n"),
                b'\r' => out.extend(br"\r"),
                _ => out.push(b),
            }
        }

        out.push(b')');
    }
}

#[cfg(test)]
mod tests {
    use crate::object::{Array, Dict, Name, ObjRef, Object, Stream, string};
    use crate::write::to_bytes;

    fn round_trip(obj: Object) {
        let bytes = to_bytes(&obj);
        let reparsed = Object::parse(&bytes).unwrap();

        assert_eq!(obj, reparsed, "serialized form was {:?}", String::from_utf8_lossy(&bytes));
    }

    #[test]
    fn number() {
        round_trip(Object::from(34));
        round_trip(Object::from(-0.345f32));
    }

    #[test]
    fn float_epsilon() {
        let obj = Object::from(98349.43f32);
        let reparsed = Object::parse(&to_bytes(&obj)).unwrap();

        let (a, b) = (obj.cast::<f64>().unwrap(), reparsed.cast::<f64>().unwrap());
        assert!((a - b).abs() < 1e-4);
    }

    #[test]
    fn name() {
        round_trip(Object::Name(Name::new(b"Type")));
        round_trip(Object::Name(Name::from_unescaped(b"lime Green")));
    }

    #[test]
    fn string() {
        round_trip(Object::String(string::String::new(b"Hi (there)".to_vec())));
        round_trip(Object::String(string::String::new(b"A\\B\nC".to_vec())));
        round_trip(Object::String(string::String::new_hex(vec![0x00, 0xff, 0x41])));
    }

    #[test]
    fn reference() {
        round_trip(Object::Ref(ObjRef::new(12, 1)));
    }

    #[test]
    fn array() {
        let obj = Object::parse(b"[1 /Two (three) 4 0 R [5]]").unwrap();
        round_trip(obj);
    }

    #[test]
    fn dict() {
        let obj = Object::parse(b"<< /Type /Page /Count 3 /Kids [1 0 R 2 0 R] >>").unwrap();
        round_trip(obj);
    }

    #[test]
    fn stream() {
        let mut dict = Dict::new();
        dict.insert(Name::new(b"K"), 1);
        let obj = Object::Stream(Stream::new(dict, b"payload bytes".to_vec()));

        let reparsed = Object::parse(&to_bytes(&obj)).unwrap().into_stream().unwrap();
        assert_eq!(reparsed.raw_data(), b"payload bytes");
    }

    #[test]
    fn nested() {
        let mut inner = Dict::new();
        inner.insert(Name::new(b"Deep"), Array::from(vec![Object::from(1)]));

        let mut dict = Dict::new();
        dict.insert(Name::new(b"Inner"), inner);

        round_trip(Object::Dict(dict));
    }
}
