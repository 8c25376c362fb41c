//! Stateful stamping session
//!
//! Holds the editor in Rust; JavaScript only renders what `getOverlays`
//! returns and forwards DOM events.
//!
//! Every exported method takes `&self` and keeps the editor borrow short, so
//! host callbacks (presence, pointer changes) may call back into the session.

use std::cell::RefCell;
use std::rc::Rc;

use pdfstamp_core::{
    ContainerRect, DocumentHandle, EditorConfig, HandleProvider, Overlay, OverlayId,
    OverlayImage, PageViewport, PdfEditor, Point, StampError,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, Element, Url};

use crate::listeners::{container_rect, PointerListeners};
use crate::presence::PresenceDispatch;

pub(crate) type Editor = PdfEditor<ObjectUrlProvider>;

/// Document handles backed by `URL.createObjectURL`
pub struct ObjectUrlProvider;

impl HandleProvider for ObjectUrlProvider {
    fn create(&mut self, bytes: &[u8]) -> Result<String, StampError> {
        let parts = js_sys::Array::new();
        parts.push(&js_sys::Uint8Array::from(bytes));

        let options = BlobPropertyBag::new();
        options.set_type("application/pdf");

        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| StampError::Handle(describe(&e)))?;
        Url::create_object_url_with_blob(&blob).map_err(|e| StampError::Handle(describe(&e)))
    }

    fn release(&mut self, handle: &str) {
        if let Err(e) = Url::revoke_object_url(handle) {
            web_sys::console::warn_1(&e);
        }
    }
}

/// Overlay as handed to the renderer
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverlayView {
    id: u32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    src: String,
}

impl OverlayView {
    fn new(overlay: &Overlay) -> Result<Self, JsValue> {
        Ok(Self {
            id: js_id(overlay.id)?,
            x: overlay.position.x,
            y: overlay.position.y,
            width: overlay.size.width,
            height: overlay.size.height,
            src: overlay.image.to_data_url(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddReportView {
    added: Vec<u32>,
    skipped: Vec<SkippedView>,
}

#[derive(Serialize)]
struct SkippedView {
    name: String,
    reason: String,
}

#[wasm_bindgen]
pub struct PdfStampSession {
    editor: Rc<RefCell<Editor>>,
    presence: Rc<PresenceDispatch>,
    listeners: RefCell<Option<PointerListeners>>,
}

#[wasm_bindgen]
impl PdfStampSession {
    /// Open a document. Without `url` the session creates its own object URL.
    /// `config` is an optional plain object matching `EditorConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        name: &str,
        bytes: &[u8],
        url: Option<String>,
        config: JsValue,
    ) -> Result<PdfStampSession, JsValue> {
        let config = parse_config(&config)?;
        let mut provider = ObjectUrlProvider;
        let handle = match url {
            Some(url) => DocumentHandle::External(url),
            None => DocumentHandle::Owned(provider.create(bytes).map_err(to_js)?),
        };

        let editor = PdfEditor::open(config, provider, name, bytes.to_vec(), handle.clone());
        let editor = match editor {
            Ok(editor) => editor,
            Err(e) => {
                if let DocumentHandle::Owned(url) = handle {
                    ObjectUrlProvider.release(&url);
                }
                return Err(to_js(e));
            }
        };

        Ok(Self {
            editor: Rc::new(RefCell::new(editor)),
            presence: Rc::new(PresenceDispatch::default()),
            listeners: RefCell::new(None),
        })
    }

    /// Display name of the open document
    #[wasm_bindgen(getter, js_name = documentName)]
    pub fn document_name(&self) -> String {
        self.editor.borrow().document_name().to_string()
    }

    /// URL the viewer should load the current document from
    #[wasm_bindgen(getter, js_name = documentUrl)]
    pub fn document_url(&self) -> Option<String> {
        self.editor
            .borrow()
            .handle()
            .map(|h| h.as_str().to_string())
    }

    /// Current page (1-indexed)
    #[wasm_bindgen(getter, js_name = pageNumber)]
    pub fn page_number(&self) -> u32 {
        self.editor.borrow().page_number() as u32
    }

    /// Page count of the open document
    #[wasm_bindgen(getter, js_name = numPages)]
    pub fn num_pages(&self) -> u32 {
        self.editor.borrow().num_pages() as u32
    }

    /// Zoom factor the page should be rendered at
    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.editor.borrow().zoom()
    }

    /// True while `applyOverlays` is running
    #[wasm_bindgen(getter, js_name = isApplying)]
    pub fn is_applying(&self) -> bool {
        self.editor.borrow().is_applying()
    }

    /// Current document bytes, e.g. for download
    #[wasm_bindgen(js_name = getDocumentBytes)]
    pub fn get_document_bytes(&self) -> Vec<u8> {
        self.editor.borrow().document_bytes().to_vec()
    }

    /// Replace the open document. Staged overlays are discarded and the
    /// view returns to page 1.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&self, name: &str, bytes: &[u8], url: Option<String>) -> Result<(), JsValue> {
        let handle = match url {
            Some(url) => DocumentHandle::External(url),
            None => DocumentHandle::Owned(ObjectUrlProvider.create(bytes).map_err(to_js)?),
        };
        let loaded = self.with_editor(|editor| {
            editor.load_document(name, bytes.to_vec(), handle.clone())
        });
        if let Err(e) = loaded {
            if let DocumentHandle::Owned(url) = handle {
                ObjectUrlProvider.release(&url);
            }
            return Err(to_js(e));
        }
        Ok(())
    }

    /// Go to the next page if there is one; returns the current page
    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&self) -> u32 {
        self.with_editor(|editor| {
            editor.next_page();
            editor.page_number() as u32
        })
    }

    /// Go to the previous page if there is one; returns the current page
    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&self) -> u32 {
        self.with_editor(|editor| {
            editor.previous_page();
            editor.page_number() as u32
        })
    }

    /// Jump to a 1-indexed page
    #[wasm_bindgen(js_name = setPage)]
    pub fn set_page(&self, page_number: u32) -> Result<(), JsValue> {
        self.with_editor(|editor| editor.set_page(page_number as usize))
            .map_err(to_js)
    }

    /// Step the zoom up; returns the new factor
    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) -> f64 {
        self.editor.borrow_mut().zoom_in()
    }

    /// Step the zoom down; returns the new factor
    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) -> f64 {
        self.editor.borrow_mut().zoom_out()
    }

    /// Natural viewport of the rendered page, as reported by the renderer
    #[wasm_bindgen(js_name = setPageViewport)]
    pub fn set_page_viewport(&self, width: f64, height: f64) {
        self.editor
            .borrow_mut()
            .set_page_viewport(PageViewport::new(width, height));
    }

    /// Client rectangle of the element overlays are positioned in
    #[wasm_bindgen(js_name = setContainerRect)]
    pub fn set_container_rect(&self, left: f64, top: f64, width: f64, height: f64) {
        self.editor
            .borrow_mut()
            .set_container_rect(ContainerRect::new(left, top, width, height));
    }

    /// Stage PNG files given as `[{ name, bytes }]`. Unusable files are
    /// reported in `skipped` and do not prevent the rest from being added.
    #[wasm_bindgen(js_name = addImages)]
    pub fn add_images(&self, files: js_sys::Array) -> Result<JsValue, JsValue> {
        let mut decoded = Vec::with_capacity(files.length() as usize);
        for file in files.iter() {
            let name = js_sys::Reflect::get(&file, &"name".into())?
                .as_string()
                .unwrap_or_default();
            let bytes = js_sys::Reflect::get(&file, &"bytes".into())?
                .dyn_into::<js_sys::Uint8Array>()
                .map_err(|_| JsValue::from_str("Each file needs a Uint8Array `bytes` field"))?
                .to_vec();
            decoded.push((name, bytes));
        }

        let report = self
            .editor
            .borrow_mut()
            .add_files(decoded.iter().map(|(n, b)| (n.as_str(), b.as_slice())));

        let view = AddReportView {
            added: report
                .added
                .iter()
                .map(|&id| js_id(id))
                .collect::<Result<_, _>>()?,
            skipped: report
                .skipped
                .into_iter()
                .map(|s| SkippedView {
                    name: s.name,
                    reason: s.reason,
                })
                .collect(),
        };
        serde_wasm_bindgen::to_value(&view)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Stage a `data:image/png;base64,` URL, returning the new overlay id
    #[wasm_bindgen(js_name = addImageDataUrl)]
    pub fn add_image_data_url(&self, data_url: &str) -> Result<u32, JsValue> {
        let image = OverlayImage::from_data_url(data_url).map_err(to_js)?;
        let id = self.editor.borrow_mut().add_image(image);
        js_id(id)
    }

    /// Discard a staged overlay; false when the id is unknown
    #[wasm_bindgen(js_name = removeOverlay)]
    pub fn remove_overlay(&self, id: u32) -> bool {
        self.editor.borrow_mut().remove_overlay(overlay_id(id))
    }

    /// Pointer pressed on an overlay body: starts a drag
    #[wasm_bindgen(js_name = pointerDownBody)]
    pub fn pointer_down_body(&self, id: u32, client_x: f64, client_y: f64) -> bool {
        self.refresh_container();
        self.editor
            .borrow_mut()
            .pointer_down_body(overlay_id(id), Point::new(client_x, client_y))
    }

    /// Pointer pressed on an overlay's resize handle: starts a resize
    #[wasm_bindgen(js_name = pointerDownHandle)]
    pub fn pointer_down_handle(&self, id: u32, client_x: f64, client_y: f64) -> bool {
        self.refresh_container();
        self.editor
            .borrow_mut()
            .pointer_down_handle(overlay_id(id), Point::new(client_x, client_y))
    }

    /// Manual move, for hosts that track the pointer themselves
    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, client_x: f64, client_y: f64) -> bool {
        self.refresh_container();
        self.editor
            .borrow_mut()
            .pointer_move(Point::new(client_x, client_y))
            .is_some()
    }

    /// Pointer released anywhere: ends the current drag or resize
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self) {
        self.editor.borrow_mut().pointer_up();
    }

    /// Track pointer moves on the whole document, measuring against `container`
    #[wasm_bindgen(js_name = attachPointerListeners)]
    pub fn attach_pointer_listeners(
        &self,
        container: Element,
        on_change: Option<js_sys::Function>,
    ) -> Result<(), JsValue> {
        // Dropping the previous set unregisters it
        self.listeners.borrow_mut().take();
        self.editor
            .borrow_mut()
            .set_container_rect(container_rect(&container));
        let listeners = PointerListeners::attach(self.editor.clone(), container, on_change)?;
        *self.listeners.borrow_mut() = Some(listeners);
        Ok(())
    }

    /// Remove the document-level pointer listeners
    #[wasm_bindgen(js_name = detachPointerListeners)]
    pub fn detach_pointer_listeners(&self) {
        self.listeners.borrow_mut().take();
    }

    /// Staged overlays as `[{ id, x, y, width, height, src }]` in container pixels
    #[wasm_bindgen(js_name = getOverlays)]
    pub fn get_overlays(&self) -> Result<JsValue, JsValue> {
        let views = self
            .editor
            .borrow()
            .overlays()
            .iter()
            .map(OverlayView::new)
            .collect::<Result<Vec<_>, _>>()?;
        serde_wasm_bindgen::to_value(&views)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Bake staged overlays into the current page.
    /// Resolves to the new document URL; rejects with the error message.
    #[wasm_bindgen(js_name = applyOverlays)]
    pub fn apply_overlays(&self) -> js_sys::Promise {
        self.refresh_container();
        let editor = self.editor.clone();
        let presence = self.presence.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let request = editor.borrow_mut().begin_commit().map_err(to_js)?;

            // Let the host observe `isApplying` before the pipeline runs
            JsFuture::from(js_sys::Promise::resolve(&JsValue::UNDEFINED)).await?;

            let result = request.run();
            let finished = editor.borrow_mut().finish_commit(request, result);
            presence.flush();
            let handle = finished.map_err(to_js)?;
            Ok(JsValue::from_str(handle.as_str()))
        })
    }

    /// Callbacks receive `{ id, metadata: { documentName, type } }` and
    /// `{ id, locationName }` respectively. Both fire right away with the
    /// current document and page.
    #[wasm_bindgen(js_name = setPresenceCallbacks)]
    pub fn set_presence_callbacks(
        &self,
        set_document: js_sys::Function,
        set_location: js_sys::Function,
    ) {
        self.presence.set_callbacks(set_document, set_location);
        let queue = self.presence.queue();
        self.with_editor(|editor| editor.set_presence(Box::new(queue)));
    }
}

impl PdfStampSession {
    /// Run `f` on the editor, then deliver any presence updates it produced
    fn with_editor<R>(&self, f: impl FnOnce(&mut Editor) -> R) -> R {
        let result = f(&mut self.editor.borrow_mut());
        self.presence.flush();
        result
    }

    fn refresh_container(&self) {
        if let Some(listeners) = self.listeners.borrow().as_ref() {
            self.editor
                .borrow_mut()
                .set_container_rect(listeners.container_rect());
        }
    }
}

fn parse_config(config: &JsValue) -> Result<EditorConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(EditorConfig::default());
    }
    let json = js_sys::JSON::stringify(config)?
        .as_string()
        .unwrap_or_default();
    EditorConfig::from_json_str(&json).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

/// Overlay ids cross the JS boundary as `u32`
fn js_id(id: OverlayId) -> Result<u32, JsValue> {
    u32::try_from(id.0).map_err(|_| JsValue::from_str(&format!("Overlay id {} out of range", id)))
}

fn overlay_id(id: u32) -> OverlayId {
    OverlayId(u64::from(id))
}

fn to_js(e: StampError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}
