//! Writing destination-side values through `pdf-writer`.
//!
//! Values passed in here are destination-side: every reference they contain
//! was already remapped by the copy engine, so writing needs no context.

use pdf_writer::{Chunk, Obj, Ref};
use quire_syntax::object::dict::keys::LENGTH;
use quire_syntax::object::{Array, Dict, Name, Number, ObjRef, Object, Stream, string};
use std::ops::DerefMut;

pub(crate) trait WriteDirect {
    fn write_direct(&self, obj: Obj<'_>);
}

impl WriteDirect for Object {
    fn write_direct(&self, obj: Obj<'_>) {
        match self {
            Object::Null => obj.primitive(pdf_writer::Null),
            Object::Boolean(b) => b.write_direct(obj),
            Object::Number(n) => n.write_direct(obj),
            Object::String(s) => s.write_direct(obj),
            Object::Name(n) => n.write_direct(obj),
            Object::Array(a) => a.write_direct(obj),
            Object::Dict(d) => d.write_direct(obj),
            // A stream can only be an indirect object.
            Object::Stream(_) => unreachable!(),
            Object::Ref(r) => r.write_direct(obj),
        }
    }
}

impl WriteDirect for bool {
    fn write_direct(&self, obj: Obj<'_>) {
        obj.primitive(*self);
    }
}

impl WriteDirect for Number {
    fn write_direct(&self, obj: Obj<'_>) {
        if let Some(i) = self.as_integer() {
            obj.primitive(i);
        } else {
            obj.primitive(self.as_f32());
        }
    }
}

impl WriteDirect for string::String {
    fn write_direct(&self, obj: Obj<'_>) {
        obj.primitive(pdf_writer::Str(self.get()));
    }
}

impl WriteDirect for Name {
    fn write_direct(&self, obj: Obj<'_>) {
        obj.primitive(pdf_writer::Name(self.as_ref()));
    }
}

impl WriteDirect for ObjRef {
    fn write_direct(&self, obj: Obj<'_>) {
        // Destination references are always generation zero.
        obj.primitive(Ref::new(self.obj_number));
    }
}

impl WriteDirect for Array {
    fn write_direct(&self, obj: Obj<'_>) {
        let mut arr = obj.array();

        for item in self.iter() {
            item.write_direct(arr.push());
        }
    }
}

impl WriteDirect for Dict {
    fn write_direct(&self, obj: Obj<'_>) {
        let mut dict = obj.dict();
        write_dict(self, &mut dict, false);
    }
}

fn write_dict(src: &Dict, dict: &mut pdf_writer::Dict<'_>, is_stream: bool) {
    for (key, value) in src.entries() {
        if is_stream && key.as_ref() == LENGTH {
            continue;
        }

        value.write_direct(dict.insert(pdf_writer::Name(key.as_ref())));
    }
}

pub(crate) trait WriteIndirect {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref);
}

impl WriteIndirect for Object {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref) {
        match self {
            Object::Stream(s) => s.write_indirect(chunk, id),
            other => other.write_direct(chunk.indirect(id)),
        }
    }
}

impl WriteIndirect for Stream {
    fn write_indirect(&self, chunk: &mut Chunk, id: Ref) {
        // The length entry is recomputed from the payload.
        let mut obj = chunk.stream(id, self.raw_data());
        write_dict(self.dict(), obj.deref_mut(), true);
    }
}
