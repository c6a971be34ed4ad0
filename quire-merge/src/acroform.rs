//! Combining interactive-form field hierarchies from multiple sources.

use crate::Copier;
use bitflags::bitflags;
use log::warn;
use pdf_writer::Ref;
use quire_syntax::object::dict::keys::{
    A, AA, AP, AS, BORDER, BS, BTN, CH, DA, DV, F, FF, FT, H, I, KIDS, MAX_LEN, MK, OPT, PARENT,
    Q, RECT, SUBTYPE, T, TI, TM, TU, V,
};
use quire_syntax::object::{Array, Dict, Name, ObjRef, Object, string};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// The dictionary entries that belong to a field, as opposed to one of its
/// widget annotations.
pub(crate) const FIELD_KEYS: [&[u8]; 12] = [FT, FF, V, DV, DA, Q, TU, TM, OPT, MAX_LEN, TI, I];

/// The dictionary entries that belong to a widget annotation.
pub(crate) const WIDGET_KEYS: [&[u8]; 11] = [SUBTYPE, RECT, F, AP, AS, MK, BS, BORDER, H, A, AA];

bitflags! {
    /// The flag bits of a field's `Ff` entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u32 {
        /// The field is read-only.
        const READ_ONLY = 1 << 0;
        /// The field must have a value at export time.
        const REQUIRED = 1 << 1;
        /// The field must not be exported.
        const NO_EXPORT = 1 << 2;
        /// One radio button has to be selected at all times.
        const NO_TOGGLE_TO_OFF = 1 << 14;
        /// The button field is a set of radio buttons.
        const RADIO = 1 << 15;
        /// The button field is a push button.
        const PUSHBUTTON = 1 << 16;
        /// The choice field is a combo box.
        const COMBO = 1 << 17;
    }
}

/// Keep only the entries of a dictionary whose keys appear in the given set.
pub(crate) fn restrict(dict: &Dict, keys: &[&[u8]]) -> Dict {
    let mut out = Dict::new();

    for (key, value) in dict.entries() {
        if keys.contains(&key.as_ref()) {
            out.insert(key.clone(), value.clone());
        }
    }

    out
}

/// One widget occurrence of a field, ready for merging.
///
/// The dictionary must be destination-side (references already remapped).
#[derive(Debug, Clone)]
pub struct MergedWidget {
    /// The destination page index the widget appears on.
    pub page: usize,
    /// The tab order of the widget on that page.
    pub tab_order: u32,
    /// The widget's annotation entries.
    pub dict: Dict,
}

impl MergedWidget {
    /// Create a widget from a destination-side annotation dictionary,
    /// keeping only widget-level entries.
    pub fn new(page: usize, tab_order: u32, dict: &Dict) -> Self {
        Self {
            page,
            tab_order,
            dict: restrict(dict, &WIDGET_KEYS),
        }
    }
}

/// One field registration, ready for merging into a [`FieldTree`].
///
/// The dictionaries must be destination-side (references already remapped).
#[derive(Debug, Clone)]
pub struct FieldCandidate {
    field_type: Option<Name>,
    flags: FieldFlags,
    /// The field-level entries of the first registration.
    proto: Dict,
    widgets: Vec<MergedWidget>,
}

impl FieldCandidate {
    /// Create a candidate from a destination-side field dictionary, keeping
    /// only field-level entries.
    pub fn new(field: &Dict, widgets: Vec<MergedWidget>) -> Self {
        let flags = field.get::<i32>(FF).unwrap_or(0);

        Self {
            field_type: field.get::<Name>(FT),
            flags: FieldFlags::from_bits_retain(flags as u32),
            proto: restrict(field, &FIELD_KEYS),
            widgets,
        }
    }
}

enum FieldNode {
    Branch(BTreeMap<String, FieldNode>),
    Leaf(FieldCandidate),
}

/// A trie of form fields keyed by their dot-separated hierarchical names.
///
/// Fields are merged in registration order; on a name collision the
/// first-registered field wins and incompatible later registrations are
/// dropped.
#[derive(Default)]
pub struct FieldTree {
    root: BTreeMap<String, FieldNode>,
}

/// The destination-side output of a written field tree.
pub struct FieldTreeOutput {
    /// The destination references of the top-level fields.
    pub field_refs: Vec<Ref>,
    /// The destination reference of every leaf, by full name.
    pub refs_by_name: FxHashMap<String, Ref>,
}

impl FieldTree {
    /// Create a new empty field tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no field has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Merge a field into the tree under its full hierarchical name.
    ///
    /// If a field of the same name exists already, the widgets are combined
    /// when the field types are compatible; otherwise the new field is
    /// dropped and the existing one kept.
    pub fn merge_field(&mut self, full_name: &str, candidate: FieldCandidate) {
        let segments = full_name.split('.').collect::<Vec<_>>();
        let (last, path) = segments.split_last().unwrap();

        let mut map = &mut self.root;

        for segment in path {
            let node = map
                .entry((*segment).to_string())
                .or_insert_with(|| FieldNode::Branch(BTreeMap::new()));

            match node {
                FieldNode::Branch(children) => map = children,
                FieldNode::Leaf(_) => {
                    warn!("dropping field {full_name}: {segment} is already a terminal field");
                    return;
                }
            }
        }

        match map.entry((*last).to_string()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(FieldNode::Leaf(candidate));
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                FieldNode::Branch(_) => {
                    warn!("dropping field {full_name}: the name denotes a group of fields");
                }
                FieldNode::Leaf(existing) => merge_leaf(existing, candidate, full_name),
            },
        }
    }

    /// Write the merged tree into the destination, inserting every widget
    /// into its page's annotation list by ascending tab order.
    pub fn write_into(
        &self,
        copier: &mut Copier<'_>,
        page_annots: &mut [Vec<(u32, Ref)>],
    ) -> FieldTreeOutput {
        let mut output = FieldTreeOutput {
            field_refs: vec![],
            refs_by_name: FxHashMap::default(),
        };

        for (segment, node) in &self.root {
            let dest = write_node(copier, node, segment, "", None, page_annots, &mut output);
            output.field_refs.push(dest);
        }

        output
    }
}

/// Combine two registrations of the same field name, if their types allow it.
fn merge_leaf(existing: &mut FieldCandidate, incoming: FieldCandidate, full_name: &str) {
    if existing.field_type != incoming.field_type {
        warn!("dropping field {full_name}: its field type conflicts with an earlier field");
        return;
    }

    let conflict_mask = match existing.field_type.as_deref() {
        Some(BTN) => FieldFlags::PUSHBUTTON | FieldFlags::RADIO,
        Some(CH) => FieldFlags::COMBO,
        _ => FieldFlags::empty(),
    };

    if !((existing.flags ^ incoming.flags) & conflict_mask).is_empty() {
        warn!("dropping field {full_name}: its flags conflict with an earlier field");
        return;
    }

    existing.widgets.extend(incoming.widgets);
}

fn write_node(
    copier: &mut Copier<'_>,
    node: &FieldNode,
    segment: &str,
    prefix: &str,
    parent: Option<Ref>,
    page_annots: &mut [Vec<(u32, Ref)>],
    output: &mut FieldTreeOutput,
) -> Ref {
    let self_ref = copier.allocate_ref();
    let full = if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    };

    match node {
        FieldNode::Branch(children) => {
            let kid_refs = children
                .iter()
                .map(|(seg, child)| {
                    write_node(copier, child, seg, &full, Some(self_ref), page_annots, output)
                })
                .collect::<Vec<_>>();

            let mut dict = base_field_dict(segment, parent);
            dict.insert(
                Name::from_unescaped(KIDS),
                kid_refs
                    .iter()
                    .map(|r| Object::Ref(ObjRef::new(r.get(), 0)))
                    .collect::<Array>(),
            );

            copier.write(&Object::Dict(dict), self_ref);
        }
        FieldNode::Leaf(leaf) => {
            output.refs_by_name.insert(full, self_ref);

            if let [widget] = leaf.widgets.as_slice() {
                // A single occurrence collapses field and widget into one
                // dictionary.
                let mut dict = leaf.proto.clone();
                dict.merge(&widget.dict);
                dict.merge(&base_field_dict(segment, parent));

                copier.write(&Object::Dict(dict), self_ref);
                place_widget(page_annots, widget, self_ref);
            } else {
                let mut dict = leaf.proto.clone();
                dict.merge(&base_field_dict(segment, parent));

                if !leaf.widgets.is_empty() {
                    let mut kid_refs = Array::new();

                    for widget in &leaf.widgets {
                        let widget_ref = copier.allocate_ref();
                        let mut widget_dict = widget.dict.clone();
                        widget_dict.insert(
                            Name::from_unescaped(PARENT),
                            ObjRef::new(self_ref.get(), 0),
                        );

                        copier.write(&Object::Dict(widget_dict), widget_ref);
                        place_widget(page_annots, widget, widget_ref);
                        kid_refs.push(ObjRef::new(widget_ref.get(), 0));
                    }

                    dict.insert(Name::from_unescaped(KIDS), kid_refs);
                }

                copier.write(&Object::Dict(dict), self_ref);
            }
        }
    }

    self_ref
}

fn base_field_dict(segment: &str, parent: Option<Ref>) -> Dict {
    let mut dict = Dict::new();
    dict.insert(Name::from_unescaped(T), string::String::new(segment.as_bytes().to_vec()));

    if let Some(parent) = parent {
        dict.insert(Name::from_unescaped(PARENT), ObjRef::new(parent.get(), 0));
    }

    dict
}

fn place_widget(page_annots: &mut [Vec<(u32, Ref)>], widget: &MergedWidget, dest: Ref) {
    let Some(annots) = page_annots.get_mut(widget.page) else {
        warn!("widget targets page {} which is not part of the output", widget.page);
        return;
    };

    insert_by_tab(annots, widget.tab_order, dest);
}

/// Insert an annotation by ascending tab order, after existing entries with
/// the same order.
pub(crate) fn insert_by_tab(annots: &mut Vec<(u32, Ref)>, tab_order: u32, dest: Ref) {
    let position = annots
        .iter()
        .position(|(t, _)| *t > tab_order)
        .unwrap_or(annots.len());

    annots.insert(position, (tab_order, dest));
}

#[cfg(test)]
mod tests {
    use crate::acroform::{FieldCandidate, FieldTree, MergedWidget, insert_by_tab};
    use crate::Copier;
    use pdf_writer::Ref;
    use quire_syntax::object::dict::keys::{FT, KIDS, PARENT, RECT, T, V};
    use quire_syntax::object::{Array, Dict, Name, Object, string};
    use quire_syntax::Document;

    fn text_field(value: &str) -> Dict {
        let mut dict = Dict::new();
        dict.insert(Name::new(FT), Name::new(b"Tx"));
        dict.insert(Name::new(V), string::String::new(value.as_bytes().to_vec()));
        dict
    }

    fn widget(page: usize, tab_order: u32) -> MergedWidget {
        let mut dict = Dict::new();
        dict.insert(Name::new(b"Subtype"), Name::new(b"Widget"));
        dict.insert(
            Name::new(RECT),
            Array::from(vec![Object::from(0), Object::from(0), Object::from(10), Object::from(10)]),
        );

        MergedWidget::new(page, tab_order, &dict)
    }

    fn button(flags: i32) -> Dict {
        let mut dict = Dict::new();
        dict.insert(Name::new(FT), Name::new(b"Btn"));
        dict.insert(Name::new(b"Ff"), flags);
        dict
    }

    #[test]
    fn merges_matching_fields() {
        let mut tree = FieldTree::new();

        tree.merge_field("foo.bar", FieldCandidate::new(&text_field("a"), vec![widget(0, 0)]));
        tree.merge_field("foo.bar", FieldCandidate::new(&text_field("b"), vec![widget(1, 0)]));

        let mut next = Ref::new(1);
        let mut copier = Copier::new(Box::new(|| next.bump()));
        let mut annots = vec![vec![], vec![]];

        let output = tree.write_into(&mut copier, &mut annots);
        assert_eq!(output.field_refs.len(), 1);

        // One leaf, two widgets, one on each page.
        assert_eq!(annots[0].len(), 1);
        assert_eq!(annots[1].len(), 1);

        let out = Document::parse(copier.finish().chunk.as_bytes()).unwrap();
        let root = out
            .object(quire_syntax::object::ObjRef::new(output.field_refs[0].get(), 0))
            .unwrap()
            .clone()
            .into_dict()
            .unwrap();

        assert_eq!(
            root.get::<string::String>(T),
            Some(string::String::new(b"foo".to_vec()))
        );

        let kids = root.get::<Array>(KIDS).unwrap();
        assert_eq!(kids.len(), 1);

        let leaf = out.object(kids[0].clone().into_ref().unwrap()).unwrap().clone().into_dict().unwrap();
        let leaf_kids = leaf.get::<Array>(KIDS).unwrap();
        assert_eq!(leaf_kids.len(), 2);

        // The first registration's value wins.
        assert_eq!(
            leaf.get::<string::String>(V),
            Some(string::String::new(b"a".to_vec()))
        );

        // Widgets link back to their field.
        let w = out.object(leaf_kids[0].clone().into_ref().unwrap()).unwrap().clone().into_dict().unwrap();
        assert_eq!(w.get_ref(PARENT), kids[0].clone().into_ref());
    }

    #[test]
    fn single_widget_collapses() {
        let mut tree = FieldTree::new();
        tree.merge_field("only", FieldCandidate::new(&text_field("x"), vec![widget(0, 3)]));

        let mut next = Ref::new(1);
        let mut copier = Copier::new(Box::new(|| next.bump()));
        let mut annots = vec![vec![]];

        let output = tree.write_into(&mut copier, &mut annots);
        let out = Document::parse(copier.finish().chunk.as_bytes()).unwrap();

        let field = out
            .object(quire_syntax::object::ObjRef::new(output.field_refs[0].get(), 0))
            .unwrap()
            .clone()
            .into_dict()
            .unwrap();

        // Field and widget entries live in one dictionary.
        assert!(field.contains_key(RECT));
        assert!(field.contains_key(V));
        assert!(!field.contains_key(KIDS));
        assert_eq!(annots[0], vec![(3, output.field_refs[0])]);
    }

    #[test]
    fn type_mismatch_keeps_first() {
        let mut tree = FieldTree::new();

        tree.merge_field("f", FieldCandidate::new(&text_field("first"), vec![widget(0, 0)]));
        tree.merge_field("f", FieldCandidate::new(&button(0), vec![widget(0, 1)]));

        let mut next = Ref::new(1);
        let mut copier = Copier::new(Box::new(|| next.bump()));
        let mut annots = vec![vec![]];

        tree.write_into(&mut copier, &mut annots);

        // The conflicting registration's widget was dropped.
        assert_eq!(annots[0].len(), 1);
    }

    #[test]
    fn radio_push_button_conflict() {
        let mut tree = FieldTree::new();

        // Radio vs push button: incompatible.
        tree.merge_field("b", FieldCandidate::new(&button(1 << 15), vec![widget(0, 0)]));
        tree.merge_field("b", FieldCandidate::new(&button(1 << 16), vec![widget(0, 1)]));

        // Same flags: compatible.
        tree.merge_field("c", FieldCandidate::new(&button(1 << 15), vec![widget(0, 2)]));
        tree.merge_field("c", FieldCandidate::new(&button(1 << 15), vec![widget(0, 3)]));

        let mut next = Ref::new(1);
        let mut copier = Copier::new(Box::new(|| next.bump()));
        let mut annots = vec![vec![]];

        tree.write_into(&mut copier, &mut annots);

        // b kept one widget, c merged two.
        assert_eq!(annots[0].len(), 3);
    }

    #[test]
    fn leaf_branch_collision() {
        let mut tree = FieldTree::new();

        tree.merge_field("a", FieldCandidate::new(&text_field("x"), vec![]));
        // "a" is already terminal, so "a.b" cannot be registered.
        tree.merge_field("a.b", FieldCandidate::new(&text_field("y"), vec![widget(0, 0)]));

        let mut next = Ref::new(1);
        let mut copier = Copier::new(Box::new(|| next.bump()));
        let mut annots = vec![vec![]];

        let output = tree.write_into(&mut copier, &mut annots);
        assert_eq!(output.field_refs.len(), 1);
        assert!(annots[0].is_empty());
    }

    #[test]
    fn tab_order_insertion() {
        let mut annots = vec![];

        insert_by_tab(&mut annots, 5, Ref::new(1));
        insert_by_tab(&mut annots, 1, Ref::new(2));
        insert_by_tab(&mut annots, 3, Ref::new(3));
        insert_by_tab(&mut annots, 3, Ref::new(4));

        let order = annots.iter().map(|(t, _)| *t).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 3, 3, 5]);

        // Equal orders keep insertion order.
        assert_eq!(annots[1].1, Ref::new(3));
        assert_eq!(annots[2].1, Ref::new(4));
    }
}
