//! WASM bindings for PDF image stamping
//!
//! The editor state lives in Rust behind [`PdfStampSession`]. JavaScript
//! renders the page, reports geometry and forwards pointer presses on
//! overlays; drag/resize tracking runs on document-level listeners owned by
//! the session.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PdfStampSession } from './pkg/pdfstamp_wasm.js';
//!
//! await init();
//!
//! const session = new PdfStampSession("paper.pdf", bytes, "/paper.pdf");
//! session.setPageViewport(viewport.width, viewport.height);
//! session.attachPointerListeners(pageContainer, () => render(session.getOverlays()));
//!
//! const report = session.addImages([{ name: file.name, bytes: pngBytes }]);
//! overlayEl.onmousedown = (e) => session.pointerDownBody(id, e.clientX, e.clientY);
//!
//! const url = await session.applyOverlays();
//! ```

pub mod listeners;
pub mod presence;
pub mod session;

use wasm_bindgen::prelude::*;

pub use session::PdfStampSession;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"PdfStamp WASM initialized".into());
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Page count from PDF bytes, without opening a session
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    let info = pdfstamp_core::inspect(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(info.page_count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }
}
