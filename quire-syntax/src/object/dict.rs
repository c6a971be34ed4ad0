//! Dictionary objects.

use crate::document::Resolve;
use crate::object::r#ref::ObjRef;
use crate::object::{Name, Object, ObjectLike};
use rustc_hash::FxHashMap;
use std::fmt::{Debug, Formatter};

/// A dictionary, which is a key-value map, keys being names, and values being
/// any PDF object or object reference.
///
/// Keys are unique by name equality. Inserting the null object for a key
/// removes the entry, so a dictionary never stores null values.
#[derive(Clone, Default, PartialEq)]
pub struct Dict(FxHashMap<Name, Object>);

impl Dict {
    /// Create a new empty dictionary.
    pub fn new() -> Self {
        Self(FxHashMap::default())
    }

    /// Returns the number of entries in the dictionary.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether the dictionary contains an entry with a specific key.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.0.contains_key(key.as_ref())
    }

    /// Set the entry for a key.
    ///
    /// Inserting the null object removes the key instead.
    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Object>) {
        let key = key.into();
        let value = value.into();

        if value.is_null() {
            self.0.remove::<[u8]>(key.as_ref());
        } else {
            self.0.insert(key, value);
        }
    }

    /// Remove the entry for a key.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Object> {
        self.0.remove(key.as_ref())
    }

    /// Return the raw entry for a specific key, which might be an object
    /// reference.
    pub fn get_raw(&self, key: impl AsRef<[u8]>) -> Option<&Object> {
        self.0.get(key.as_ref())
    }

    /// Return the entry for a key cast to a specific object type, without
    /// following references.
    ///
    /// A value of a different type is treated as absent.
    #[allow(
        private_bounds,
        reason = "users shouldn't be able to implement `ObjectLike` for custom types."
    )]
    pub fn get<T>(&self, key: impl AsRef<[u8]>) -> Option<T>
    where
        T: ObjectLike,
    {
        self.get_raw(key)?.clone().cast()
    }

    /// Return the entry for a key, following exactly one level of reference
    /// indirection through the resolver.
    ///
    /// An absent key, a dangling reference and a type mismatch all yield
    /// `None`; none of them is an error.
    #[allow(
        private_bounds,
        reason = "users shouldn't be able to implement `ObjectLike` for custom types."
    )]
    pub fn resolve<T>(&self, key: impl AsRef<[u8]>, resolver: &dyn Resolve) -> Option<T>
    where
        T: ObjectLike,
    {
        let obj = match self.get_raw(key)? {
            Object::Ref(r) => resolver.resolve(*r).ok()?,
            other => other.clone(),
        };

        if obj.is_null() {
            return None;
        }

        obj.cast()
    }

    /// Get the object reference linked to a key.
    pub fn get_ref(&self, key: impl AsRef<[u8]>) -> Option<ObjRef> {
        match self.get_raw(key)? {
            Object::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns an iterator over all keys in the dictionary.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.0.keys()
    }

    /// An iterator over all entries in the dictionary, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&Name, &Object)> {
        let mut sorted = self.0.iter().collect::<Vec<_>>();
        sorted.sort_by(|(n1, _), (n2, _)| n1.cmp(n2));
        sorted.into_iter()
    }

    /// Take the union of both dictionaries, entries of `other` winning on
    /// conflicting keys.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in other.0.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Take the union of both dictionaries, existing entries winning on
    /// conflicting keys.
    ///
    /// Used to overlay inherited attributes without overwriting explicit
    /// local ones.
    pub fn merge_missing(&mut self, other: &Self) {
        for (key, value) in other.0.iter() {
            if !self.0.contains_key::<[u8]>(key.as_ref()) {
                self.insert(key.clone(), value.clone());
            }
        }
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug_struct = f.debug_struct("Dict");

        for (key, value) in self.entries() {
            debug_struct.field(key.as_str(), value);
        }

        debug_struct.finish()
    }
}

/// A collection of possible keys in a PDF dictionary.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &'static [u8] = $e;
        };
    }

    key!(A, b"A");
    key!(AA, b"AA");
    key!(ACRO_FORM, b"AcroForm");
    key!(ANNOT, b"Annot");
    key!(ANNOTS, b"Annots");
    key!(AP, b"AP");
    key!(AS, b"AS");
    key!(BORDER, b"Border");
    key!(BS, b"BS");
    key!(BTN, b"Btn");
    key!(CATALOG, b"Catalog");
    key!(CH, b"Ch");
    key!(CO, b"CO");
    key!(CONTENTS, b"Contents");
    key!(COUNT, b"Count");
    key!(CROP_BOX, b"CropBox");
    key!(DA, b"DA");
    key!(DR, b"DR");
    key!(DV, b"DV");
    key!(F, b"F");
    key!(FF, b"Ff");
    key!(FIELDS, b"Fields");
    key!(FILTER, b"Filter");
    key!(FT, b"FT");
    key!(H, b"H");
    key!(I, b"I");
    key!(KIDS, b"Kids");
    key!(LENGTH, b"Length");
    key!(MAX_LEN, b"MaxLen");
    key!(MEDIA_BOX, b"MediaBox");
    key!(MK, b"MK");
    key!(NEED_APPEARANCES, b"NeedAppearances");
    key!(OPT, b"Opt");
    key!(P, b"P");
    key!(PAGE, b"Page");
    key!(PAGES, b"Pages");
    key!(PARENT, b"Parent");
    key!(PREV, b"Prev");
    key!(Q, b"Q");
    key!(RECT, b"Rect");
    key!(RESOURCES, b"Resources");
    key!(ROOT, b"Root");
    key!(ROTATE, b"Rotate");
    key!(SIG, b"Sig");
    key!(SIG_FLAGS, b"SigFlags");
    key!(SIZE, b"Size");
    key!(SUBTYPE, b"Subtype");
    key!(T, b"T");
    key!(TI, b"TI");
    key!(TM, b"TM");
    key!(TU, b"TU");
    key!(TX, b"Tx");
    key!(TYPE, b"Type");
    key!(V, b"V");
    key!(WIDGET, b"Widget");
}

#[cfg(test)]
mod tests {
    use crate::object::dict::keys::TYPE;
    use crate::object::{Dict, Name, Object};

    #[test]
    fn insert_and_get() {
        let mut dict = Dict::new();
        dict.insert(Name::new(b"Hi"), 34);

        assert_eq!(dict.get::<i32>(b"Hi"), Some(34));
        assert_eq!(dict.get::<Name>(b"Hi"), None);
    }

    #[test]
    fn insert_null_removes() {
        let mut dict = Dict::new();
        dict.insert(Name::new(b"A"), 1);
        dict.insert(Name::new(b"A"), Object::Null);

        assert!(!dict.contains_key(b"A"));
    }

    #[test]
    fn merge_other_wins() {
        let mut a = Dict::new();
        a.insert(Name::new(b"A"), 1);
        a.insert(Name::new(b"B"), 1);

        let mut b = Dict::new();
        b.insert(Name::new(b"B"), 2);
        b.insert(Name::new(b"C"), 2);

        a.merge(&b);

        assert_eq!(a.get::<i32>(b"A"), Some(1));
        assert_eq!(a.get::<i32>(b"B"), Some(2));
        assert_eq!(a.get::<i32>(b"C"), Some(2));
    }

    #[test]
    fn merge_missing_existing_wins() {
        let mut a = Dict::new();
        a.insert(Name::new(b"B"), 1);

        let mut b = Dict::new();
        b.insert(Name::new(b"B"), 2);
        b.insert(Name::new(b"C"), 2);

        a.merge_missing(&b);

        assert_eq!(a.get::<i32>(b"B"), Some(1));
        assert_eq!(a.get::<i32>(b"C"), Some(2));
    }

    #[test]
    fn entries_sorted() {
        let mut dict = Dict::new();
        dict.insert(Name::new(b"Zeta"), 1);
        dict.insert(Name::new(b"Alpha"), 2);
        dict.insert(Name::new(TYPE), Name::new(b"Page"));

        let keys = dict.entries().map(|(k, _)| k.as_str().to_string()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["Alpha", "Type", "Zeta"]);
    }

    #[test]
    fn escaped_key_lookup() {
        let dict = Object::parse(b"<< /PANTONE#20104#20C 234 >>")
            .unwrap()
            .into_dict()
            .unwrap();

        assert!(dict.contains_key(b"PANTONE 104 C"));
    }
}
