//! Coordinate transformation between the rendered page container and PDF page space
//!
//! Screen space has its origin at the container's top-left corner and is
//! measured in rendered (post-zoom) pixels. PDF space has its origin at the
//! bottom-left corner and is measured in unscaled page units, using the
//! page's natural viewport as the conversion basis.

use crate::error::StampError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// Bounding box of the rendered page container, in client pixels
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Natural size of a PDF page at scale 1
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PageViewport {
    pub width: f64,
    pub height: f64,
}

impl PageViewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn scales(container: Size, viewport: PageViewport) -> Result<(f64, f64), StampError> {
    if container.is_degenerate() {
        return Err(StampError::NotReady("container has no rendered size"));
    }
    if Size::new(viewport.width, viewport.height).is_degenerate() {
        return Err(StampError::NotReady("page viewport not measured"));
    }
    Ok((
        viewport.width / container.width,
        viewport.height / container.height,
    ))
}

/// Convert a screen rectangle (top-left origin) to PDF page space (bottom-left origin)
pub fn to_pdf_rect(
    position: Point,
    size: Size,
    container: Size,
    viewport: PageViewport,
) -> Result<PdfRect, StampError> {
    let (scale_x, scale_y) = scales(container, viewport)?;

    Ok(PdfRect {
        x: position.x * scale_x,
        // Flip Y axis: measure from the bottom edge of the overlay
        y: (container.height - position.y - size.height) * scale_y,
        width: size.width * scale_x,
        height: size.height * scale_y,
    })
}

/// Convert a PDF page rectangle back to a screen position and size
pub fn to_screen_rect(
    rect: &PdfRect,
    container: Size,
    viewport: PageViewport,
) -> Result<(Point, Size), StampError> {
    let (scale_x, scale_y) = scales(container, viewport)?;

    let size = Size::new(rect.width / scale_x, rect.height / scale_y);
    let position = Point::new(
        rect.x / scale_x,
        container.height - rect.y / scale_y - size.height,
    );
    Ok((position, size))
}
