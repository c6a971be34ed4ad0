//! Array objects.

use crate::object::{Object, ObjectLike};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

/// An array of PDF objects.
#[derive(Clone, Default, PartialEq)]
pub struct Array(Vec<Object>);

impl Array {
    /// Create a new empty array.
    pub fn new() -> Self {
        Self(vec![])
    }

    /// Append an object to the array.
    pub fn push(&mut self, obj: impl Into<Object>) {
        self.0.push(obj.into());
    }

    /// Insert an object at the given position.
    pub fn insert(&mut self, index: usize, obj: impl Into<Object>) {
        self.0.insert(index, obj.into());
    }

    /// Returns an iterator over the objects of the array, cast to a specific
    /// subtype. Objects of a different type are skipped.
    #[allow(
        private_bounds,
        reason = "users shouldn't be able to implement `ObjectLike` for custom types."
    )]
    pub fn iter_as<T>(&self) -> impl Iterator<Item = T> + '_
    where
        T: ObjectLike,
    {
        self.0.iter().filter_map(|obj| obj.clone().cast::<T>())
    }
}

impl Deref for Array {
    type Target = [Object];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Object>> for Array {
    fn from(value: Vec<Object>) -> Self {
        Self(value)
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<I: IntoIterator<Item = Object>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Array {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::object::{Array, Object};

    #[test]
    fn typed_iteration() {
        let arr = Object::parse(b"[1 /Two 3]").unwrap().into_array().unwrap();
        assert_eq!(arr.iter_as::<i32>().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn insertion() {
        let mut arr = Array::new();
        arr.push(1);
        arr.push(3);
        arr.insert(1, 2);
        assert_eq!(arr.iter_as::<i32>().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
