//! Assembling complete documents out of pages and forms from multiple
//! sources.

use crate::acroform::{
    FIELD_KEYS, FieldCandidate, FieldTree, MergedWidget, WIDGET_KEYS, insert_by_tab, restrict,
};
use crate::primitive::WriteDirect;
use crate::{Copier, DocumentId, MergeError, PageClaim};
use pdf_writer::Ref;
use quire_syntax::Document;
use quire_syntax::object::dict::keys::{
    ACRO_FORM, ANNOTS, CO, DA, DR, FIELDS, NEED_APPEARANCES, PARENT, SIG_FLAGS,
};
use quire_syntax::object::{Array, Dict, Name, ObjRef, Object};
use rustc_hash::FxHashSet;

/// A page that has been claimed but whose body is written only at
/// [`finish`](Assembler::finish), once all merged widget annotations are
/// known.
struct PendingPage {
    dest: Ref,
    /// The destination-side page dictionary, without its annotation list.
    dict: Dict,
    /// The destination annotation list, ordered by tab.
    annots: Vec<(u32, Ref)>,
}

/// Builds one new document out of pages and form fields taken from existing
/// ones.
///
/// Sources are appended in order; their pages keep that order in the output,
/// and their interactive forms are merged into one field tree. `finish`
/// serializes the complete file.
pub struct Assembler<'a> {
    copier: Copier<'a>,
    catalog_ref: Ref,
    fields: FieldTree,
    pages: Vec<PendingPage>,
    co_names: Vec<String>,
    default_appearance: Option<Object>,
    default_resources: Option<Object>,
    sig_flags: i32,
    need_appearances: bool,
}

impl<'a> Assembler<'a> {
    /// Create a new assembler.
    pub fn new() -> Self {
        let mut next_ref = Ref::new(1);
        let catalog_ref = next_ref.bump();

        Self {
            copier: Copier::new(Box::new(move || next_ref.bump())),
            catalog_ref,
            fields: FieldTree::new(),
            pages: vec![],
            co_names: vec![],
            default_appearance: None,
            default_resources: None,
            sig_flags: 0,
            need_appearances: false,
        }
    }

    /// Append all pages of a document and merge its interactive form.
    pub fn append(&mut self, doc: &'a Document) -> Result<(), MergeError> {
        let id = self.copier.add_source(doc);
        let page_base = self.pages.len();
        let form = doc.acro_form();

        // Field widgets are not copied with their pages; they re-enter
        // through the merged field tree.
        let widget_refs = form
            .as_ref()
            .map(|form| {
                form.fields
                    .iter()
                    .flat_map(|f| f.widgets.iter().map(|w| w.obj_ref))
                    .collect::<FxHashSet<_>>()
            })
            .unwrap_or_default();

        for index in 0..doc.page_count() {
            self.claim_page(doc, id, index, &widget_refs)?;
        }

        let Some(form) = form else {
            return Ok(());
        };

        for field in &form.fields {
            let proto = restrict(&field.field, &FIELD_KEYS);
            let proto = self.copy_dict(id, proto)?;

            let mut widgets = vec![];
            for widget in &field.widgets {
                let dict = restrict(&widget.dict, &WIDGET_KEYS);
                let dict = self.copy_dict(id, dict)?;

                widgets.push(MergedWidget::new(
                    page_base + widget.page_index,
                    widget.tab_order,
                    &dict,
                ));
            }

            self.fields
                .merge_field(&field.name, FieldCandidate::new(&proto, widgets));
        }

        self.co_names.extend(form.calculation_order);
        self.sig_flags |= form.sig_flags;
        self.need_appearances |= form.need_appearances;

        if self.default_appearance.is_none()
            && let Some(da) = &form.default_appearance
        {
            self.default_appearance = Some(self.copier.copy_value(id, da, false)?);
        }

        if self.default_resources.is_none()
            && let Some(dr) = &form.default_resources
        {
            self.default_resources = Some(self.copier.copy_value(id, dr, false)?);
        }

        Ok(())
    }

    /// Append a subset of a document's pages, without merging form fields.
    pub fn append_pages(&mut self, doc: &'a Document, indices: &[usize]) -> Result<(), MergeError> {
        let id = self.copier.add_source(doc);

        for &index in indices {
            match self.copier.claim_page(id, index)? {
                PageClaim::AlreadyImported(_) => {}
                PageClaim::Fresh { dest, dict } => {
                    self.copier.record_page_ref(dest);

                    let body = self.copy_dict_restricted(id, dict)?;
                    self.pages.push(PendingPage {
                        dest,
                        dict: body,
                        annots: vec![],
                    });
                }
            }
        }

        Ok(())
    }

    /// Serialize the assembled document.
    pub fn finish(mut self) -> Result<Vec<u8>, MergeError> {
        let mut page_annots = self
            .pages
            .iter()
            .map(|p| p.annots.clone())
            .collect::<Vec<_>>();

        let form_output = if self.fields.is_empty() {
            None
        } else {
            Some(self.fields.write_into(&mut self.copier, &mut page_annots))
        };

        let parent_ref = self.copier.page_tree_parent_ref();

        for (page, annots) in self.pages.iter().zip(page_annots.iter()) {
            let mut dict = page.dict.clone();
            dict.insert(
                Name::from_unescaped(PARENT),
                ObjRef::new(parent_ref.get(), 0),
            );

            if !annots.is_empty() {
                dict.insert(
                    Name::from_unescaped(ANNOTS),
                    annots
                        .iter()
                        .map(|(_, r)| Object::Ref(ObjRef::new(r.get(), 0)))
                        .collect::<Array>(),
                );
            }

            self.copier.write(&Object::Dict(dict), page.dest);
        }

        let result = self.copier.finish();

        let mut pdf = pdf_writer::Pdf::new();

        {
            let mut catalog = pdf.catalog(self.catalog_ref);
            catalog.pages(result.page_tree_parent_ref);

            if let Some(output) = &form_output {
                let mut form = catalog.insert(pdf_writer::Name(ACRO_FORM)).dict();
                form.insert(pdf_writer::Name(FIELDS))
                    .array()
                    .items(output.field_refs.iter().copied());

                // Calculation order carries over in registration order;
                // entries whose field was dropped vanish with it.
                let co = self
                    .co_names
                    .iter()
                    .filter_map(|name| output.refs_by_name.get(name).copied())
                    .collect::<Vec<_>>();

                if !co.is_empty() {
                    form.insert(pdf_writer::Name(CO)).array().items(co);
                }

                if let Some(da) = &self.default_appearance {
                    da.write_direct(form.insert(pdf_writer::Name(DA)));
                }

                if let Some(dr) = &self.default_resources {
                    dr.write_direct(form.insert(pdf_writer::Name(DR)));
                }

                if self.sig_flags != 0 {
                    form.insert(pdf_writer::Name(SIG_FLAGS)).primitive(self.sig_flags);
                }

                if self.need_appearances {
                    form.insert(pdf_writer::Name(NEED_APPEARANCES)).primitive(true);
                }
            }
        }

        let count = result.page_refs.len();
        pdf.pages(result.page_tree_parent_ref)
            .kids(result.page_refs.iter().copied())
            .count(count as i32);
        pdf.extend(&result.chunk);

        Ok(pdf.finish())
    }

    /// Claim one page for deferred writing, copying its non-widget
    /// annotations right away.
    fn claim_page(
        &mut self,
        doc: &Document,
        id: DocumentId,
        index: usize,
        widget_refs: &FxHashSet<ObjRef>,
    ) -> Result<(), MergeError> {
        let PageClaim::Fresh { dest, dict } = self.copier.claim_page(id, index)? else {
            return Ok(());
        };

        self.copier.record_page_ref(dest);

        let src_annots = dict.resolve::<Array>(ANNOTS, doc);
        let mut annots = vec![];

        if let Some(src_annots) = src_annots {
            for (position, entry) in src_annots.iter().enumerate() {
                match entry {
                    Object::Ref(r) if widget_refs.contains(r) => {}
                    Object::Ref(r) => {
                        let dest_annot = self.copier.copy_reference(id, *r)?;
                        insert_by_tab(&mut annots, position as u32, dest_annot);
                    }
                    direct => {
                        // A direct annotation gets its own destination
                        // object, so the annotation list stays homogeneous.
                        let body = self.copier.copy_value(id, direct, false)?;
                        let dest_annot = self.copier.allocate_ref();
                        self.copier.write(&body, dest_annot);
                        insert_by_tab(&mut annots, position as u32, dest_annot);
                    }
                }
            }
        }

        let mut stripped = dict;
        stripped.remove(ANNOTS);
        let body = self.copy_dict_restricted(id, stripped)?;

        self.pages.push(PendingPage {
            dest,
            dict: body,
            annots,
        });

        Ok(())
    }

    fn copy_dict(&mut self, id: DocumentId, dict: Dict) -> Result<Dict, MergeError> {
        match self.copier.copy_value(id, &Object::Dict(dict), false)? {
            Object::Dict(dict) => Ok(dict),
            _ => unreachable!(),
        }
    }

    fn copy_dict_restricted(&mut self, id: DocumentId, dict: Dict) -> Result<Dict, MergeError> {
        match self.copier.copy_value(id, &Object::Dict(dict), true)? {
            Object::Dict(dict) => Ok(dict),
            _ => unreachable!(),
        }
    }
}

impl Default for Assembler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::Assembler;
    use quire_syntax::Document;
    use quire_syntax::object::dict::keys::{ANNOTS, CO, FT, MEDIA_BOX, ROTATE, V};
    use quire_syntax::object::{Array, Name, string};

    fn form_doc(field_name: &str, value: &str, rotate: i32) -> Vec<u8> {
        format!(
            "1 0 obj
<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [10 0 R] /CO [10 0 R] /DA (/Helv 0 Tf) >> >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /Rotate {rotate} /Annots [10 0 R] >>
endobj
10 0 obj
<< /T ({field_name}) /FT /Tx /V ({value}) /Subtype /Widget /Rect [0 0 10 10] /P 3 0 R >>
endobj
trailer
<< /Root 1 0 R >>
"
        )
        .into_bytes()
    }

    #[test]
    fn merge_two_documents() {
        let data_a = form_doc("foo.bar", "first", 90);
        let data_b = form_doc("foo.bar", "second", 180);
        let doc_a = Document::parse(&data_a).unwrap();
        let doc_b = Document::parse(&data_b).unwrap();

        let mut assembler = Assembler::new();
        assembler.append(&doc_a).unwrap();
        assembler.append(&doc_b).unwrap();

        let bytes = assembler.finish().unwrap();
        let merged = Document::parse(&bytes).unwrap();

        // Both pages survive, in append order.
        assert_eq!(merged.page_count(), 2);
        assert_eq!(merged.page_dict(0).unwrap().get::<i32>(ROTATE), Some(90));
        assert_eq!(merged.page_dict(1).unwrap().get::<i32>(ROTATE), Some(180));

        // One merged field with two widgets, one per page.
        let form = merged.acro_form().unwrap();
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].name, "foo.bar");
        assert_eq!(form.fields[0].widgets.len(), 2);
        assert_eq!(form.fields[0].widgets[0].page_index, 0);
        assert_eq!(form.fields[0].widgets[1].page_index, 1);

        // The first-registered value wins.
        assert_eq!(
            form.fields[0].field.get::<string::String>(V),
            Some(string::String::new(b"first".to_vec()))
        );

        // The calculation order references the merged field once per source.
        assert_eq!(
            form.calculation_order,
            vec!["foo.bar".to_string(), "foo.bar".to_string()]
        );
    }

    #[test]
    fn inherited_page_attributes_survive() {
        let data = form_doc("a", "x", 0);
        let doc = Document::parse(&data).unwrap();

        let mut assembler = Assembler::new();
        assembler.append(&doc).unwrap();

        let merged = Document::parse(&assembler.finish().unwrap()).unwrap();

        // The media box inherited from the source page tree node is now an
        // explicit entry of the page.
        let page = merged.page_dict(0).unwrap();
        let media_box = page.get::<Array>(MEDIA_BOX).unwrap();
        assert_eq!(
            media_box.iter_as::<i32>().collect::<Vec<_>>(),
            vec![0, 0, 612, 792]
        );
    }

    #[test]
    fn field_type_conflict_keeps_first_document() {
        let data_a = form_doc("clash", "kept", 0);
        let data_b = String::from_utf8(form_doc("clash", "dropped", 0))
            .unwrap()
            .replace("/FT /Tx", "/FT /Btn")
            .into_bytes();

        let doc_a = Document::parse(&data_a).unwrap();
        let doc_b = Document::parse(&data_b).unwrap();

        let mut assembler = Assembler::new();
        assembler.append(&doc_a).unwrap();
        assembler.append(&doc_b).unwrap();

        let merged = Document::parse(&assembler.finish().unwrap()).unwrap();
        let form = merged.acro_form().unwrap();

        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].field.get::<Name>(FT), Some(Name::new(b"Tx")));
        assert_eq!(form.fields[0].widgets.len(), 1);

        // The second page keeps no annotation for the dropped widget.
        let page = merged.page_dict(1).unwrap();
        assert!(!page.contains_key(ANNOTS));
    }

    #[test]
    fn append_pages_subset() {
        let data = b"
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 >>
endobj
3 0 obj
<< /Type /Page /Rotate 1 >>
endobj
4 0 obj
<< /Type /Page /Rotate 2 >>
endobj
5 0 obj
<< /Type /Page /Rotate 3 >>
endobj
trailer
<< /Root 1 0 R >>
";
        let doc = Document::parse(data).unwrap();

        let mut assembler = Assembler::new();
        assembler.append_pages(&doc, &[2, 0]).unwrap();

        let merged = Document::parse(&assembler.finish().unwrap()).unwrap();

        assert_eq!(merged.page_count(), 2);
        assert_eq!(merged.page_dict(0).unwrap().get::<i32>(ROTATE), Some(3));
        assert_eq!(merged.page_dict(1).unwrap().get::<i32>(ROTATE), Some(1));
        assert!(merged.acro_form().is_none());
    }

    #[test]
    fn calculation_order_written() {
        let data = form_doc("calc", "x", 0);
        let doc = Document::parse(&data).unwrap();

        let mut assembler = Assembler::new();
        assembler.append(&doc).unwrap();

        let merged = Document::parse(&assembler.finish().unwrap()).unwrap();
        let catalog = merged.catalog().unwrap();
        let form = catalog
            .resolve::<quire_syntax::object::Dict>(b"AcroForm".as_slice(), &merged)
            .unwrap();

        assert!(form.get::<Array>(CO).is_some());
    }
}
