//! Reading the interactive form of a document.

use crate::document::Document;
use crate::object::dict::keys::{
    ACRO_FORM, ANNOTS, CO, DA, DR, DV, FF, FIELDS, FT, KIDS, NEED_APPEARANCES, P, Q, SIG_FLAGS,
    SUBTYPE, T, V, WIDGET,
};
use crate::object::{Array, Dict, Name, ObjRef, Object, string};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

/// The field attributes terminal fields inherit from their ancestors.
const INHERITABLE: [&[u8]; 6] = [FT, FF, V, DV, DA, Q];

/// One occurrence of a form field on a page.
#[derive(Debug, Clone)]
pub struct FieldWidget {
    /// The reference of the widget annotation in its source document.
    pub obj_ref: ObjRef,
    /// The index of the page the widget appears on.
    pub page_index: usize,
    /// The keyboard-focus ordering key: the widget's position in its page's
    /// annotation list.
    pub tab_order: u32,
    /// The widget annotation dictionary.
    pub dict: Dict,
}

/// A terminal form field together with its widget annotations.
#[derive(Debug, Clone)]
pub struct FormField {
    /// The full, dot-separated hierarchical name of the field.
    pub name: String,
    /// The field dictionary, with inheritable attributes already overlaid.
    pub field: Dict,
    /// The widget annotations of the field, one per page occurrence.
    pub widgets: Vec<FieldWidget>,
}

/// The interactive form of a document, flattened into a field table.
pub struct AcroForm {
    /// The terminal fields, in tree order.
    pub fields: Vec<FormField>,
    /// Full field names in calculation order.
    pub calculation_order: Vec<String>,
    /// The raw `DA` entry of the form dictionary.
    pub default_appearance: Option<Object>,
    /// The raw `DR` entry of the form dictionary.
    pub default_resources: Option<Object>,
    /// The `SigFlags` entry of the form dictionary.
    pub sig_flags: i32,
    /// The `NeedAppearances` entry of the form dictionary.
    pub need_appearances: bool,
}

impl Document {
    /// Read the document's interactive form, if it has one.
    pub fn acro_form(&self) -> Option<AcroForm> {
        let catalog = self.catalog()?;
        let form = catalog.resolve::<Dict>(ACRO_FORM, self)?;
        let field_roots = form.resolve::<Array>(FIELDS, self)?;

        let positions = self.annotation_positions();
        let mut fields = vec![];
        let mut names = FxHashMap::default();
        let mut visited = FxHashSet::default();

        for entry in field_roots.iter() {
            match entry {
                Object::Ref(r) => self.walk_field(
                    *r,
                    "",
                    &Dict::new(),
                    &positions,
                    &mut fields,
                    &mut names,
                    &mut visited,
                ),
                _ => warn!("ignoring a field tree root that is not a reference"),
            }
        }

        let calculation_order = form
            .resolve::<Array>(CO, self)
            .map(|arr| {
                arr.iter()
                    .filter_map(|obj| match obj {
                        Object::Ref(r) => names.get(r).cloned(),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(AcroForm {
            fields,
            calculation_order,
            default_appearance: form.get_raw(DA).cloned(),
            default_resources: form.get_raw(DR).cloned(),
            sig_flags: form.resolve::<i32>(SIG_FLAGS, self).unwrap_or(0),
            need_appearances: form.resolve::<bool>(NEED_APPEARANCES, self).unwrap_or(false),
        })
    }

    fn walk_field(
        &self,
        r: ObjRef,
        prefix: &str,
        inherited: &Dict,
        positions: &FxHashMap<ObjRef, (usize, u32)>,
        out: &mut Vec<FormField>,
        names: &mut FxHashMap<ObjRef, String>,
        visited: &mut FxHashSet<ObjRef>,
    ) {
        if !visited.insert(r) {
            warn!("field tree contains a cycle through {r:?}");
            return;
        }

        let Some(dict) = self.resolve_to::<Dict>(r) else {
            warn!("field tree node {r:?} is not a dictionary");
            return;
        };

        let partial = dict
            .resolve::<string::String>(T, self)
            .map(|s| String::from_utf8_lossy(s.get()).into_owned());

        let full = match (prefix.is_empty(), &partial) {
            (true, Some(t)) => t.clone(),
            (true, None) => String::new(),
            (false, Some(t)) => format!("{prefix}.{t}"),
            (false, None) => prefix.to_string(),
        };

        let mut inherited_here = inherited.clone();
        for key in INHERITABLE {
            if let Some(value) = dict.get_raw(key) {
                inherited_here.insert(Name::from_unescaped(key), value.clone());
            }
        }

        let kids = dict.resolve::<Array>(KIDS, self);

        // A kid with its own partial name is a child field; a kid without
        // one is a widget annotation of this field.
        let child_fields = kids
            .as_ref()
            .map(|kids| {
                kids.iter()
                    .filter_map(|kid| match kid {
                        Object::Ref(kid_ref) => {
                            let kid_dict = self.resolve_to::<Dict>(*kid_ref)?;
                            kid_dict.contains_key(T).then_some(*kid_ref)
                        }
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if !child_fields.is_empty() {
            for kid_ref in child_fields {
                self.walk_field(kid_ref, &full, &inherited_here, positions, out, names, visited);
            }

            return;
        }

        if full.is_empty() {
            warn!("skipping a form field without a name");
            return;
        }

        let mut field = dict.clone();
        field.merge_missing(inherited);

        let mut widgets = vec![];

        if let Some(kids) = kids {
            for kid in kids.iter() {
                let Object::Ref(kid_ref) = kid else {
                    continue;
                };
                let Some(widget) = self.resolve_to::<Dict>(*kid_ref) else {
                    continue;
                };

                if let Some((page_index, tab_order)) =
                    self.widget_position(*kid_ref, &widget, positions)
                {
                    widgets.push(FieldWidget {
                        obj_ref: *kid_ref,
                        page_index,
                        tab_order,
                        dict: widget,
                    });
                }
            }
        } else if dict.get::<Name>(SUBTYPE).as_deref() == Some(WIDGET) {
            // The field and its single widget share one dictionary.
            if let Some((page_index, tab_order)) = self.widget_position(r, &dict, positions) {
                widgets.push(FieldWidget {
                    obj_ref: r,
                    page_index,
                    tab_order,
                    dict: dict.clone(),
                });
            }
        }

        names.insert(r, full.clone());
        out.push(FormField {
            name: full,
            field,
            widgets,
        });
    }

    /// Find the page and tab order of a widget, preferring its position in
    /// the page's annotation list and falling back to its `P` entry.
    fn widget_position(
        &self,
        r: ObjRef,
        widget: &Dict,
        positions: &FxHashMap<ObjRef, (usize, u32)>,
    ) -> Option<(usize, u32)> {
        if let Some(found) = positions.get(&r) {
            return Some(*found);
        }

        if let Some(page_ref) = widget.get_ref(P)
            && let Some(page_index) = self.page_index_of(page_ref)
        {
            // Not listed in the page's annotations; order it after those
            // that are.
            return Some((page_index, u32::MAX));
        }

        warn!("cannot place widget {r:?} on any page");

        None
    }

    /// The position of every annotation reference in the page list, as
    /// `(page index, position within the page's annotation array)`.
    fn annotation_positions(&self) -> FxHashMap<ObjRef, (usize, u32)> {
        let mut map = FxHashMap::default();

        for index in 0..self.page_count() {
            let Some(annots) = self
                .page_dict(index)
                .and_then(|dict| dict.resolve::<Array>(ANNOTS, self))
            else {
                continue;
            };

            for (pos, obj) in annots.iter().enumerate() {
                if let Object::Ref(r) = obj {
                    map.entry(*r).or_insert((index, pos as u32));
                }
            }
        }

        map
    }
}
