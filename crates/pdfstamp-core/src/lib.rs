//! Image overlay stamping for PDF pages
//!
//! Users stage PNG images on top of a rendered page, drag and resize them in
//! screen space, then bake them into the document as image XObjects.
//!
//! - [`overlay`]: staged overlays and their screen geometry
//! - [`interaction`]: pointer-driven drag/resize with container clamping
//! - [`coords`]: screen-space to PDF user-space mapping
//! - [`commit`]: writes overlays into a page with lopdf
//! - [`editor`]: the session state a viewer drives

pub mod commit;
pub mod config;
pub mod coords;
pub mod document;
pub mod editor;
pub mod error;
pub mod image;
pub mod interaction;
pub mod overlay;
pub mod presence;

pub use commit::apply_overlays;
pub use config::{EditorConfig, OverlayConfig, ZoomConfig};
pub use coords::{to_pdf_rect, to_screen_rect, ContainerRect, PageViewport, PdfRect, Point, Size};
pub use document::{inspect, DocumentHandle, DocumentInfo, DocumentSlot, HandleProvider};
pub use editor::{CommitRequest, PdfEditor};
pub use error::StampError;
pub use image::OverlayImage;
pub use interaction::{Interaction, InteractionController};
pub use overlay::{AddReport, Overlay, OverlayId, OverlayStore, SkippedFile};
pub use presence::{DocumentMeta, Location, PresenceSink};
