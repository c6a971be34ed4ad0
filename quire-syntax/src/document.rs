//! In-memory source documents and the resolver contract.

use crate::object::dict::keys::{
    CATALOG, CROP_BOX, KIDS, MEDIA_BOX, PAGES, RESOURCES, ROOT, ROTATE, TYPE,
};
use crate::object::{Array, Dict, Name, ObjRef, Object};
use crate::token::{Lexer, SyntaxError, Token};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{Display, Formatter};

/// An error produced by a source while resolving an object.
///
/// This is reserved for failure of the underlying byte source; a missing
/// object is not an error. It is fatal to the copy operation that triggered
/// the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceError(pub std::io::ErrorKind);

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "source failed while resolving an object: {}", self.0)
    }
}

impl std::error::Error for SourceError {}

/// The capability of one source document to resolve indirect references.
pub trait Resolve {
    /// Resolve an indirect reference to a direct object.
    ///
    /// A missing or dangling reference resolves to the null object, never an
    /// error; an error means the underlying source failed.
    fn resolve(&self, r: ObjRef) -> Result<Object, SourceError>;

    /// Whether the reference denotes a page dictionary.
    fn is_page(&self, r: ObjRef) -> bool;

    /// The reference of the page with the given index in the document's page
    /// list.
    fn page(&self, index: usize) -> Option<ObjRef>;
}

/// One source document: an object namespace plus its page list.
///
/// All objects live in an arena addressed by their `(number, generation)`
/// pair, so reference cycles carry no ownership hazard.
#[derive(Default)]
pub struct Document {
    objects: FxHashMap<ObjRef, Object>,
    pages: Vec<PageEntry>,
    page_refs: FxHashSet<ObjRef>,
    catalog: Option<ObjRef>,
}

struct PageEntry {
    obj_ref: ObjRef,
    /// The page dictionary with inherited attributes already overlaid.
    dict: Dict,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from a flat sequence of `n g obj … endobj` records,
    /// optionally followed by a trailer dictionary naming the catalog.
    ///
    /// Cross-reference tables are not consulted; their entries are skipped.
    /// Records that cannot be parsed are skipped with a warning.
    pub fn parse(data: &[u8]) -> Result<Self, SyntaxError> {
        let mut doc = Self::new();
        let mut lx = Lexer::new(data);

        loop {
            let save = lx.offset();

            match lx.next_meaningful_token() {
                Ok(Token::Eof) => break,
                Ok(Token::Number(_)) => {
                    lx.jump(save);

                    if !doc.parse_indirect(&mut lx) {
                        warn!("skipping a malformed object record near offset {save}");
                        recover(&mut lx, save);
                    }
                }
                Ok(Token::Keyword(b"trailer")) => match crate::object::parse_object(&mut lx) {
                    Ok(Object::Dict(trailer)) => {
                        if let Some(root) = trailer.get_ref(ROOT) {
                            doc.catalog = Some(root);
                        }
                    }
                    _ => warn!("trailer keyword is not followed by a dictionary"),
                },
                Ok(Token::Keyword(b"startxref")) => {
                    let _ = lx.next_meaningful_token();
                }
                Ok(Token::Keyword(b"xref")) => {
                    // The table's layout is not our concern; its entries
                    // tokenize cleanly, so just skip ahead.
                    skip_xref_table(&mut lx);
                }
                Ok(_) => warn!("skipping an unexpected token at the top level"),
                Err(_) => lx.jump(lx.offset() + 1),
            }
        }

        if doc.catalog.is_none() {
            doc.catalog = doc.find_catalog();
        }

        doc.rebuild_pages();

        Ok(doc)
    }

    /// Read one `n g obj … endobj` record. Returns `false` if the record is
    /// malformed; the lexer position is unspecified in that case.
    fn parse_indirect(&mut self, lx: &mut Lexer<'_>) -> bool {
        let Ok(Token::Number(obj_number)) = lx.next_meaningful_token() else {
            return false;
        };
        let Ok(Token::Number(gen_number)) = lx.next_meaningful_token() else {
            return false;
        };
        let (Some(obj_number), Some(gen_number)) =
            (obj_number.as_integer(), gen_number.as_integer())
        else {
            return false;
        };

        if !matches!(lx.next_meaningful_token(), Ok(Token::Keyword(b"obj"))) {
            return false;
        }

        let Ok(object) = crate::object::parse_object(lx) else {
            return false;
        };

        // We are lenient and don't require the closing keyword.
        let save = lx.offset();
        if !matches!(lx.next_meaningful_token(), Ok(Token::Keyword(b"endobj"))) {
            lx.jump(save);
        }

        self.insert(ObjRef::new(obj_number, gen_number), object);

        true
    }

    /// Insert an object into the document's arena.
    pub fn insert(&mut self, r: ObjRef, object: Object) {
        self.objects.insert(r, object);
    }

    /// Set the catalog reference of the document.
    pub fn set_catalog(&mut self, r: ObjRef) {
        self.catalog = Some(r);
    }

    /// Return the catalog dictionary, if there is one.
    pub fn catalog(&self) -> Option<Dict> {
        self.objects.get(&self.catalog?)?.clone().into_dict()
    }

    /// Return the object stored under the given reference.
    pub fn object(&self, r: ObjRef) -> Option<&Object> {
        self.objects.get(&r)
    }

    /// The number of objects in the document.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The reference of the page with the given index.
    pub fn page_ref(&self, index: usize) -> Option<ObjRef> {
        self.pages.get(index).map(|p| p.obj_ref)
    }

    /// The effective dictionary of the page with the given index, inherited
    /// attributes included.
    pub fn page_dict(&self, index: usize) -> Option<&Dict> {
        self.pages.get(index).map(|p| &p.dict)
    }

    /// The page list index of the given reference.
    pub fn page_index_of(&self, r: ObjRef) -> Option<usize> {
        self.pages.iter().position(|p| p.obj_ref == r)
    }

    /// Rebuild the page list by walking the page tree from the catalog.
    ///
    /// Must be called again after programmatically inserting page-tree
    /// objects.
    pub fn rebuild_pages(&mut self) {
        self.pages.clear();
        self.page_refs.clear();

        let Some(catalog) = self.catalog() else {
            return;
        };
        let Some(pages_ref) = catalog.get_ref(PAGES) else {
            return;
        };

        let mut entries = vec![];
        let mut visited = FxHashSet::default();
        self.walk_page_tree(pages_ref, &Dict::new(), &mut entries, &mut visited);

        for entry in &entries {
            self.page_refs.insert(entry.obj_ref);
        }
        self.pages = entries;
    }

    fn walk_page_tree(
        &self,
        node_ref: ObjRef,
        inherited: &Dict,
        entries: &mut Vec<PageEntry>,
        visited: &mut FxHashSet<ObjRef>,
    ) {
        if !visited.insert(node_ref) {
            warn!("page tree contains a cycle through {node_ref:?}");
            return;
        }

        let Some(dict) = self.resolve_to::<Dict>(node_ref) else {
            warn!("page tree node {node_ref:?} is not a dictionary");
            return;
        };

        match dict.get::<Name>(TYPE).as_deref() {
            Some(PAGES) => {
                // Accumulate the attributes kids inherit, closer nodes
                // winning over farther ones.
                let mut inherited = inherited.clone();

                for key in [MEDIA_BOX, CROP_BOX, ROTATE, RESOURCES] {
                    if let Some(value) = dict.get_raw(key) {
                        inherited.insert(Name::from_unescaped(key), value.clone());
                    }
                }

                let Some(kids) = dict.resolve::<Array>(KIDS, self) else {
                    return;
                };

                for kid in kids.iter() {
                    match kid {
                        Object::Ref(r) => {
                            self.walk_page_tree(*r, &inherited, entries, visited);
                        }
                        _ => warn!("ignoring a page tree kid that is not a reference"),
                    }
                }
            }
            // Let's be lenient and assume it's a page in case the type is
            // missing or something else.
            _ => {
                let mut effective = dict;
                effective.merge_missing(inherited);

                entries.push(PageEntry {
                    obj_ref: node_ref,
                    dict: effective,
                });
            }
        }
    }

    /// Find a catalog dictionary by scanning the whole arena. Better than
    /// nothing for documents without a usable trailer.
    fn find_catalog(&self) -> Option<ObjRef> {
        self.objects.iter().find_map(|(r, obj)| match obj {
            Object::Dict(d) if d.get::<Name>(TYPE).as_deref() == Some(CATALOG) => Some(*r),
            _ => None,
        })
    }

    pub(crate) fn resolve_to<T>(&self, r: ObjRef) -> Option<T>
    where
        T: crate::object::ObjectLike,
    {
        self.objects.get(&r)?.clone().cast()
    }
}

impl Resolve for Document {
    fn resolve(&self, r: ObjRef) -> Result<Object, SourceError> {
        // Pages resolve to their effective dictionary, so that consumers see
        // inherited attributes even after the tree linkage is severed.
        if self.page_refs.contains(&r)
            && let Some(entry) = self.pages.iter().find(|p| p.obj_ref == r)
        {
            return Ok(Object::Dict(entry.dict.clone()));
        }

        Ok(self.objects.get(&r).cloned().unwrap_or(Object::Null))
    }

    fn is_page(&self, r: ObjRef) -> bool {
        self.page_refs.contains(&r)
    }

    fn page(&self, index: usize) -> Option<ObjRef> {
        self.page_ref(index)
    }
}

/// Skip past a malformed object record: everything up to and including the
/// next `endobj`, or a single byte when there is none.
fn recover(lx: &mut Lexer<'_>, save: usize) {
    let r = lx.reader_mut();
    let found = r
        .range(save..r.len())
        .and_then(|tail| tail.windows(6).position(|w| w == b"endobj"));

    match found {
        Some(pos) => r.jump(save + pos + 6),
        None => r.jump(save + 1),
    }
}

fn skip_xref_table(lx: &mut Lexer<'_>) {
    loop {
        let save = lx.offset();

        match lx.next_meaningful_token() {
            Ok(Token::Number(_)) => {}
            Ok(Token::Keyword(b"f")) | Ok(Token::Keyword(b"n")) => {}
            Ok(Token::Eof) | Err(_) => break,
            _ => {
                lx.jump(save);
                break;
            }
        }
    }
}
