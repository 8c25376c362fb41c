//! Document inspection and handle lifecycle
//!
//! The viewer needs two things from a PDF: how many pages it has and the
//! natural size of each page. Both come from the page tree, so the core
//! never has to render anything.
//!
//! A [`DocumentSlot`] owns the bytes of the live document together with the
//! handle the host uses to display it. Handles the editor created itself are
//! released exactly once, either when a newer document replaces them or when
//! the slot is dropped.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::coords::PageViewport;
use crate::error::StampError;

/// Page count and per-page natural viewports of a parsed PDF
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub viewports: Vec<PageViewport>,
}

impl DocumentInfo {
    /// Viewport for a 1-indexed page number
    pub fn viewport(&self, page_number: usize) -> Option<PageViewport> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.viewports.get(idx))
            .copied()
    }
}

/// Parse PDF bytes and read the page tree
pub fn inspect(bytes: &[u8]) -> Result<DocumentInfo, StampError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(StampError::Parse(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }
    let doc = Document::load_mem(bytes).map_err(|e| StampError::Parse(e.to_string()))?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(StampError::Parse("PDF has no pages".to_string()));
    }

    let viewports = pages
        .values()
        .map(|&page_id| page_viewport(&doc, page_id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DocumentInfo {
        page_count: viewports.len(),
        viewports,
    })
}

/// Natural viewport of a page: the visible (CropBox ∩ MediaBox) size,
/// swapped for quarter-turn rotations
pub fn page_viewport(doc: &Document, page_id: ObjectId) -> Result<PageViewport, StampError> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| parse_box(doc, obj))
        // Letter size when the page tree carries no MediaBox at all
        .unwrap_or([0.0, 0.0, 612.0, 792.0]);

    let visible = inherited_attribute(doc, page_id, b"CropBox")
        .and_then(|obj| parse_box(doc, obj))
        .and_then(|crop_box| intersect(crop_box, media_box))
        .unwrap_or(media_box);

    let width = visible[2] - visible[0];
    let height = visible[3] - visible[1];

    let rotation = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);

    if rotation == 90 || rotation == 270 {
        Ok(PageViewport::new(height, width))
    } else {
        Ok(PageViewport::new(width, height))
    }
}

/// Overlap of two boxes, `None` when they do not overlap
fn intersect(a: [f64; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let clipped = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (clipped[2] > clipped[0] && clipped[3] > clipped[1]).then_some(clipped)
}

/// Look up a page attribute, walking up the page tree for inheritable keys
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Bounded walk guards against cyclic Parent links
    for _ in 0..64 {
        let dict: &Dictionary = doc.get_object(current?).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn parse_box(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = resolve(doc, obj).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = match resolve(doc, item) {
            Object::Integer(v) => *v as f64,
            Object::Real(v) => *v as f64,
            _ => return None,
        };
    }
    // Corners may be given in any order
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Reference the host uses to display the live document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentHandle {
    /// Supplied by the host (e.g. a static URL); never released by the editor
    External(String),
    /// Created by the editor through a [`HandleProvider`]
    Owned(String),
}

impl DocumentHandle {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentHandle::External(url) | DocumentHandle::Owned(url) => url,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, DocumentHandle::Owned(_))
    }
}

/// Creates and releases handles for document bytes (object URLs in a browser)
pub trait HandleProvider {
    fn create(&mut self, bytes: &[u8]) -> Result<String, StampError>;
    fn release(&mut self, handle: &str);
}

/// The single live document: its bytes and the handle that exposes them
pub struct DocumentSlot<P: HandleProvider> {
    provider: P,
    bytes: Vec<u8>,
    handle: Option<DocumentHandle>,
}

impl<P: HandleProvider> DocumentSlot<P> {
    pub fn new(provider: P, bytes: Vec<u8>, handle: DocumentHandle) -> Self {
        Self {
            provider,
            bytes,
            handle: Some(handle),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn handle(&self) -> Option<&DocumentHandle> {
        self.handle.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Swap in a document the host already has a handle for
    pub fn replace(&mut self, bytes: Vec<u8>, handle: DocumentHandle) {
        let previous = self.handle.replace(handle);
        self.bytes = bytes;
        self.release(previous);
    }

    /// Create a handle for new bytes, then retire the previous one.
    /// On failure the slot is left untouched.
    pub fn publish(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, StampError> {
        let handle = DocumentHandle::Owned(self.provider.create(&bytes)?);
        self.replace(bytes, handle.clone());
        Ok(handle)
    }

    fn release(&mut self, handle: Option<DocumentHandle>) {
        if let Some(DocumentHandle::Owned(url)) = handle {
            tracing::debug!(handle = %url, "releasing document handle");
            self.provider.release(&url);
        }
    }
}

impl<P: HandleProvider> Drop for DocumentSlot<P> {
    fn drop(&mut self) {
        let handle = self.handle.take();
        self.release(handle);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object};

    /// Build a PDF with one page per MediaBox size
    pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for &(w, h) in sizes {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub fn letter_pdf() -> Vec<u8> {
        pdf_with_pages(&[(612, 792)])
    }
}


#[cfg(test)]
mod tests {
    use super::test_provider::RecordingProvider;
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inspect_reads_page_sizes() {
        let info = inspect(&fixtures::pdf_with_pages(&[(612, 792), (842, 595)])).unwrap();
        assert_eq!(info.page_count, 2);
        assert_eq!(info.viewport(1), Some(PageViewport::new(612.0, 792.0)));
        assert_eq!(info.viewport(2), Some(PageViewport::new(842.0, 595.0)));
        assert_eq!(info.viewport(0), None);
        assert_eq!(info.viewport(3), None);
    }

    #[test]
    fn test_inspect_rejects_non_pdf() {
        assert!(matches!(inspect(b"hello"), Err(StampError::Parse(_))));
    }

    #[test]
    fn test_inherited_media_box_and_rotation() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => 1,
                "Kids" => vec![Object::Reference(page_id)],
                "MediaBox" => vec![0.into(), 0.into(), 400.into(), 600.into()],
                "Rotate" => 90,
            }),
        );

        assert_eq!(
            page_viewport(&doc, page_id).unwrap(),
            PageViewport::new(600.0, 400.0)
        );
    }

    fn single_page(extra: lopdf::Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        page.extend(&extra);
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => 1,
                "Kids" => vec![Object::Reference(page_id)],
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn test_crop_box_sets_visible_size() {
        let (doc, page_id) = single_page(dictionary! {
            "CropBox" => vec![0.into(), 0.into(), 306.into(), 396.into()],
        });
        assert_eq!(
            page_viewport(&doc, page_id).unwrap(),
            PageViewport::new(306.0, 396.0)
        );
    }

    #[test]
    fn test_crop_box_is_clipped_to_media_box() {
        let (doc, page_id) = single_page(dictionary! {
            "CropBox" => vec![(-100).into(), 392.into(), 1000.into(), 2000.into()],
        });
        assert_eq!(
            page_viewport(&doc, page_id).unwrap(),
            PageViewport::new(612.0, 400.0)
        );
    }

    #[test]
    fn test_disjoint_crop_box_falls_back_to_media_box() {
        let (doc, page_id) = single_page(dictionary! {
            "CropBox" => vec![700.into(), 800.into(), 900.into(), 1000.into()],
        });
        assert_eq!(
            page_viewport(&doc, page_id).unwrap(),
            PageViewport::new(612.0, 792.0)
        );
    }

    #[test]
    fn test_publish_releases_previous_owned_handle_once() {
        let provider = RecordingProvider::default();
        let released = provider.released.clone();
        let mut slot = DocumentSlot::new(
            provider,
            b"v0".to_vec(),
            DocumentHandle::External("/doc.pdf".into()),
        );

        slot.publish(b"v1".to_vec()).unwrap();
        // External handles are never released
        assert!(released.borrow().is_empty());

        slot.publish(b"v2".to_vec()).unwrap();
        assert_eq!(*released.borrow(), vec!["blob:test/0".to_string()]);
        assert_eq!(slot.bytes(), b"v2");
        assert_eq!(
            slot.handle(),
            Some(&DocumentHandle::Owned("blob:test/1".into()))
        );
    }

    #[test]
    fn test_drop_releases_live_owned_handle() {
        let provider = RecordingProvider::default();
        let released = provider.released.clone();
        {
            let mut slot = DocumentSlot::new(
                provider,
                Vec::new(),
                DocumentHandle::External("/doc.pdf".into()),
            );
            slot.publish(b"v1".to_vec()).unwrap();
        }
        assert_eq!(*released.borrow(), vec!["blob:test/0".to_string()]);
    }

    #[test]
    fn test_failed_publish_leaves_slot_untouched() {
        let provider = RecordingProvider {
            fail_create: true,
            ..Default::default()
        };
        let released = provider.released.clone();
        let mut slot = DocumentSlot::new(
            provider,
            b"v0".to_vec(),
            DocumentHandle::Owned("blob:host/0".into()),
        );

        assert!(slot.publish(b"v1".to_vec()).is_err());
        assert_eq!(slot.bytes(), b"v0");
        assert_eq!(
            slot.handle(),
            Some(&DocumentHandle::Owned("blob:host/0".into()))
        );
        assert!(released.borrow().is_empty());
    }
}
