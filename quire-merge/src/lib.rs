//! A crate for recombining pages and form fields from PDF documents.
//!
//! The [`Copier`] walks object graphs reachable from one or more source
//! documents and re-emits them into a single destination namespace, remapping
//! every reference, copying each distinct source object at most once,
//! tolerating arbitrary reference cycles and never transitively re-entering a
//! page object. The [`Assembler`] builds on it to produce complete merged
//! files, including combined interactive forms.

mod acroform;
mod assemble;
mod primitive;

pub use acroform::{FieldCandidate, FieldFlags, FieldTree, FieldTreeOutput, MergedWidget};
pub use assemble::Assembler;

use crate::primitive::WriteIndirect;
use log::warn;
use pdf_writer::{Chunk, Ref};
use quire_syntax::object::dict::keys::{PAGE, PARENT, TYPE};
use quire_syntax::object::{Dict, Name, ObjRef, Object, Stream};
use quire_syntax::{Resolve, SourceError};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};

/// The identity of one source document registered with a [`Copier`].
///
/// Bookkeeping is keyed by this identity first, so equal `(number,
/// generation)` pairs from different sources never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(usize);

/// An error raised while copying objects between documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    /// The requested page index does not exist in the source document.
    InvalidPageIndex(usize),
    /// The document id does not belong to this copier.
    UnknownDocument,
    /// A source failed while resolving an object. The destination output is
    /// in an unspecified state and should be discarded.
    Source(SourceError),
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageIndex(index) => write!(f, "invalid page index {index}"),
            Self::UnknownDocument => write!(f, "unknown source document"),
            Self::Source(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<SourceError> for MergeError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

/// The destination bookkeeping for one source object.
///
/// A record is created the first time its `(number, generation)` pair is
/// encountered; `copied` flips to true once the object's body has been (or is
/// being) written. That flag is the sole mechanism breaking reference cycles
/// and preventing duplicate copies.
struct RefRecord {
    dest: Ref,
    copied: bool,
}

/// The result of a finished copy session.
pub struct CopyResult {
    /// The destination objects.
    pub chunk: Chunk,
    /// The destination references of the imported pages, in import order.
    pub page_refs: Vec<Ref>,
    /// The reference reserved for the destination page tree root.
    pub page_tree_parent_ref: Ref,
}

pub(crate) enum PageClaim {
    AlreadyImported(Ref),
    Fresh { dest: Ref, dict: Dict },
}

/// Copies object graphs from source documents into one destination namespace.
///
/// Exactly one copier serves one destination; it is single-threaded and holds
/// no locks. On a [`MergeError::Source`] failure the whole in-progress output
/// must be discarded by the caller; there is no partial-success contract.
pub struct Copier<'a> {
    sources: Vec<&'a dyn Resolve>,
    records: FxHashMap<DocumentId, FxHashMap<ObjRef, RefRecord>>,
    /// Work-stack of allocated but not yet copied objects. Using an explicit
    /// stack bounds the native recursion depth by the nesting of a single
    /// object body, not by the length of reference chains.
    queue: Vec<(DocumentId, ObjRef)>,
    new_ref: Box<dyn FnMut() -> Ref + 'a>,
    chunk: Chunk,
    page_tree_parent_ref: Ref,
    page_refs: Vec<Ref>,
}

impl<'a> Copier<'a> {
    /// Create a new copier drawing destination references from the given
    /// allocator.
    pub fn new(mut new_ref: Box<dyn FnMut() -> Ref + 'a>) -> Self {
        let page_tree_parent_ref = new_ref();

        Self {
            sources: vec![],
            records: FxHashMap::default(),
            queue: vec![],
            new_ref,
            chunk: Chunk::new(),
            page_tree_parent_ref,
            page_refs: vec![],
        }
    }

    /// Register a source document and return its identity.
    pub fn add_source(&mut self, source: &'a dyn Resolve) -> DocumentId {
        let id = DocumentId(self.sources.len());
        self.sources.push(source);

        id
    }

    /// Allocate a fresh destination reference.
    pub fn allocate_ref(&mut self) -> Ref {
        (self.new_ref)()
    }

    /// The reference reserved for the destination page tree root.
    pub fn page_tree_parent_ref(&self) -> Ref {
        self.page_tree_parent_ref
    }

    /// Copy a source-side value into the destination namespace.
    ///
    /// Leaves are returned unchanged, containers are rebuilt, and every
    /// reference is remapped to its destination reference, scheduling the
    /// referenced object for copying. With `restricted` set, dictionaries
    /// that are pages lose their `Parent` back-link.
    pub fn copy_value(
        &mut self,
        doc: DocumentId,
        value: &Object,
        restricted: bool,
    ) -> Result<Object, MergeError> {
        self.source(doc)?;
        let copied = self.copy_value_inner(doc, value, restricted);
        self.drain()?;

        Ok(copied)
    }

    /// Copy the object behind a source reference into the destination
    /// namespace and return its destination reference.
    ///
    /// Any number of calls with the same source reference return the same
    /// destination reference, and the destination body receives exactly one
    /// write for it. Page objects are never copied this way; their records
    /// stay unsatisfied until [`import_page`](Self::import_page) claims them.
    pub fn copy_reference(&mut self, doc: DocumentId, r: ObjRef) -> Result<Ref, MergeError> {
        self.source(doc)?;
        let dest = self.map_ref(doc, r);
        self.drain()?;

        Ok(dest)
    }

    /// Import a page of a source document into the destination page tree and
    /// return its destination reference.
    ///
    /// The page body is copied with the `Parent` back-link replaced by the
    /// destination page tree root. Importing the same page twice yields the
    /// same reference and a single destination object, also when the page was
    /// already referenced (but, by contract, not copied) through
    /// [`copy_reference`](Self::copy_reference).
    pub fn import_page(&mut self, doc: DocumentId, page_index: usize) -> Result<Ref, MergeError> {
        match self.claim_page(doc, page_index)? {
            PageClaim::AlreadyImported(dest) => Ok(dest),
            PageClaim::Fresh { dest, dict } => {
                let mut body = self.copy_dict(doc, &dict, true);
                body.insert(
                    Name::from_unescaped(PARENT),
                    ObjRef::new(self.page_tree_parent_ref.get(), 0),
                );

                self.write(&Object::Dict(body), dest);
                self.page_refs.push(dest);
                self.drain()?;

                Ok(dest)
            }
        }
    }

    /// Write a destination-side value as the body of a destination object.
    ///
    /// The value must not contain source-namespace references; everything
    /// produced by [`copy_value`](Self::copy_value) qualifies.
    pub fn write(&mut self, value: &Object, at: Ref) {
        value.write_indirect(&mut self.chunk, at);
    }

    /// Finish the session, yielding the destination objects and page order.
    pub fn finish(self) -> CopyResult {
        CopyResult {
            chunk: self.chunk,
            page_refs: self.page_refs,
            page_tree_parent_ref: self.page_tree_parent_ref,
        }
    }

    /// The number of bytes written into the destination body so far.
    pub fn written_len(&self) -> usize {
        self.chunk.len()
    }

    fn source(&self, doc: DocumentId) -> Result<&'a dyn Resolve, MergeError> {
        self.sources
            .get(doc.0)
            .copied()
            .ok_or(MergeError::UnknownDocument)
    }

    /// Map a source reference to its destination reference, allocating an
    /// uncopied record and scheduling the object the first time.
    fn map_ref(&mut self, doc: DocumentId, r: ObjRef) -> Ref {
        let records = self.records.entry(doc).or_default();

        if let Some(record) = records.get(&r) {
            record.dest
        } else {
            let dest = (self.new_ref)();
            records.insert(
                r,
                RefRecord {
                    dest,
                    copied: false,
                },
            );
            self.queue.push((doc, r));

            dest
        }
    }

    /// Claim a page's record, marking it copied without writing the body, so
    /// the caller can decide what the body looks like.
    pub(crate) fn claim_page(
        &mut self,
        doc: DocumentId,
        page_index: usize,
    ) -> Result<PageClaim, MergeError> {
        let source = self.source(doc)?;
        let r = source
            .page(page_index)
            .ok_or(MergeError::InvalidPageIndex(page_index))?;

        let records = self.records.entry(doc).or_default();
        let dest = match records.get_mut(&r) {
            Some(record) if record.copied => return Ok(PageClaim::AlreadyImported(record.dest)),
            Some(record) => {
                record.copied = true;
                record.dest
            }
            None => {
                let dest = (self.new_ref)();
                records.insert(r, RefRecord { dest, copied: true });
                dest
            }
        };

        let dict = source
            .resolve(r)?
            .into_dict()
            .ok_or(MergeError::InvalidPageIndex(page_index))?;

        Ok(PageClaim::Fresh { dest, dict })
    }

    pub(crate) fn record_page_ref(&mut self, dest: Ref) {
        self.page_refs.push(dest);
    }

    /// Drain the work-stack: resolve and copy every scheduled object that is
    /// neither copied yet nor a page.
    pub(crate) fn drain(&mut self) -> Result<(), MergeError> {
        while let Some((doc, r)) = self.queue.pop() {
            let record = &self.records[&doc][&r];
            let dest = record.dest;

            if record.copied {
                continue;
            }

            let source = self.source(doc)?;

            // Page bodies are populated only via `import_page`.
            if source.is_page(r) {
                continue;
            }

            let resolved = source.resolve(r)?;

            if resolved.is_null() {
                warn!("object {r:?} is missing from its source; copying it as null");
            }

            // Flip the flag before rebuilding the body, so the object's own
            // subgraph cannot schedule it again.
            self.records
                .get_mut(&doc)
                .unwrap()
                .get_mut(&r)
                .unwrap()
                .copied = true;

            let body = self.copy_value_inner(doc, &resolved, false);
            self.write(&body, dest);
        }

        Ok(())
    }

    fn copy_value_inner(&mut self, doc: DocumentId, value: &Object, restricted: bool) -> Object {
        match value {
            Object::Null
            | Object::Boolean(_)
            | Object::Number(_)
            | Object::String(_)
            | Object::Name(_) => value.clone(),
            Object::Array(array) => Object::Array(
                array
                    .iter()
                    .map(|item| self.copy_value_inner(doc, item, restricted))
                    .collect(),
            ),
            Object::Dict(dict) => Object::Dict(self.copy_dict(doc, dict, restricted)),
            Object::Stream(stream) => Object::Stream(Stream::new(
                self.copy_dict(doc, stream.dict(), restricted),
                stream.raw_data().to_vec(),
            )),
            Object::Ref(r) => {
                let dest = self.map_ref(doc, *r);
                Object::Ref(ObjRef::new(dest.get(), 0))
            }
        }
    }

    pub(crate) fn copy_dict(&mut self, doc: DocumentId, dict: &Dict, restricted: bool) -> Dict {
        let drop_parent = restricted && dict.get::<Name>(TYPE).as_deref() == Some(PAGE);
        let mut out = Dict::new();

        for (key, value) in dict.entries() {
            if drop_parent && key.as_ref() == PARENT {
                continue;
            }

            out.insert(key.clone(), self.copy_value_inner(doc, value, restricted));
        }

        out
    }
}
