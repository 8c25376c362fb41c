//! Bake staged overlays into PDF bytes
//!
//! Each overlay becomes an image XObject drawn by a small content stream
//! appended to the target page. The whole operation runs on a parsed copy of
//! the input, so a failure at any step leaves the caller's bytes as they were.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::coords::{to_pdf_rect, PageViewport, PdfRect, Size};
use crate::error::StampError;
use crate::image::{decode_png, deflate, DecodedImage, OverlayImage};
use crate::overlay::Overlay;

const XOBJECT_PREFIX: &str = "ImOvl";

/// Draw every overlay onto the page at `page_index` (0-based) and serialize
pub fn apply_overlays(
    pdf_bytes: &[u8],
    overlays: &[Overlay],
    page_index: usize,
    container: Size,
    viewport: PageViewport,
) -> Result<Vec<u8>, StampError> {
    if overlays.is_empty() {
        return Err(StampError::NoOverlays);
    }

    // Map everything first so a geometry problem fails before any parsing work
    let placements = overlays
        .iter()
        .map(|o| to_pdf_rect(o.position, o.size, container, viewport).map(|rect| (o, rect)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| StampError::Parse(e.to_string()))?;

    let pages = doc.get_pages();
    let page_id = *pages
        .values()
        .nth(page_index)
        .ok_or(StampError::PageOutOfRange {
            page: page_index + 1,
            count: pages.len(),
        })?;

    let mut operations = Vec::new();
    for (overlay, rect) in placements {
        tracing::debug!(id = %overlay.id, ?rect, page = page_index + 1, "embedding overlay");
        operations.extend(draw_image(&mut doc, page_id, &overlay.image, &rect)?);
    }
    append_page_content(&mut doc, page_id, operations)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| StampError::Serialize(e.to_string()))?;

    tracing::info!(
        overlays = overlays.len(),
        page = page_index + 1,
        bytes = output.len(),
        "overlays applied"
    );
    Ok(output)
}

/// Embed one image and return the operators that draw it into `rect`
fn draw_image(
    doc: &mut Document,
    page_id: ObjectId,
    image: &OverlayImage,
    rect: &PdfRect,
) -> Result<Vec<Operation>, StampError> {
    let decoded = decode_png(image.bytes()).map_err(|e| StampError::Embed(e.to_string()))?;
    let image_id = add_image_xobject(doc, &decoded)?;
    let name = register_xobject(doc, page_id, image_id)?;

    Ok(vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(rect.width as f32),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(rect.height as f32),
                Object::Real(rect.x as f32),
                Object::Real(rect.y as f32),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.into_bytes())]),
        Operation::new("Q", vec![]),
    ])
}

fn add_image_xobject(doc: &mut Document, decoded: &DecodedImage) -> Result<ObjectId, StampError> {
    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => decoded.width as i64,
        "Height" => decoded.height as i64,
        "ColorSpace" => decoded.color_space.pdf_name(),
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &decoded.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => decoded.width as i64,
                "Height" => decoded.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        );
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", Object::Reference(smask_id));
    }

    let stream = Stream::new(image_dict, deflate(&decoded.color)?);
    Ok(doc.add_object(stream))
}

/// Add the image to the page's /Resources /XObject under an unused name
fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
) -> Result<String, StampError> {
    let location = page_resources(doc, page_id)?;
    let resources = match location {
        ResourcesLocation::Indirect(id) => lookup_dict(doc, id)?,
        ResourcesLocation::Inline => lookup_dict(doc, page_id)?
            .get(b"Resources")
            .and_then(|o| o.as_dict())
            .cloned()
            .map_err(|e| StampError::Embed(e.to_string()))?,
    };

    // An indirect /XObject dictionary is copied inline so other pages are unaffected
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => lookup_dict(doc, *id)?,
        Ok(_) => {
            return Err(StampError::Embed(
                "page /XObject resource is not a dictionary".to_string(),
            ))
        }
        Err(_) => Dictionary::new(),
    };
    let name = unused_name(&xobjects);
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));

    resources_mut(doc, page_id, location)?.set("XObject", Object::Dictionary(xobjects));
    Ok(name)
}

fn resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
    location: ResourcesLocation,
) -> Result<&mut Dictionary, StampError> {
    match location {
        ResourcesLocation::Indirect(id) => doc.get_object_mut(id).and_then(|o| o.as_dict_mut()),
        ResourcesLocation::Inline => doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .and_then(|page| page.get_mut(b"Resources"))
            .and_then(|o| o.as_dict_mut()),
    }
    .map_err(|e| StampError::Embed(e.to_string()))
}

fn unused_name(xobjects: &Dictionary) -> String {
    (0..)
        .map(|n| format!("{}{}", XOBJECT_PREFIX, n))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| XOBJECT_PREFIX.to_string())
}

fn lookup_dict(doc: &Document, id: ObjectId) -> Result<Dictionary, StampError> {
    doc.get_object(id)
        .and_then(|o| o.as_dict())
        .cloned()
        .map_err(|e| StampError::Embed(e.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum ResourcesLocation {
    /// /Resources is a reference to a shared dictionary
    Indirect(ObjectId),
    /// /Resources lives in the page dictionary itself
    Inline,
}

/// Ensure the page has its own /Resources entry, copying an inherited one if needed
fn page_resources(doc: &mut Document, page_id: ObjectId) -> Result<ResourcesLocation, StampError> {
    let page = lookup_dict(doc, page_id)?;
    match page.get(b"Resources") {
        Ok(Object::Reference(id)) => return Ok(ResourcesLocation::Indirect(*id)),
        Ok(Object::Dictionary(_)) => return Ok(ResourcesLocation::Inline),
        Ok(_) => {
            return Err(StampError::Embed(
                "page /Resources is not a dictionary".to_string(),
            ))
        }
        Err(_) => {}
    }

    // Walk up the page tree; the copy keeps sibling pages unaffected
    let mut inherited = Dictionary::new();
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    for _ in 0..64 {
        let Some(id) = parent else { break };
        let node = lookup_dict(doc, id)?;
        match node.get(b"Resources") {
            Ok(Object::Reference(res_id)) => {
                inherited = lookup_dict(doc, *res_id)?;
                break;
            }
            Ok(Object::Dictionary(dict)) => {
                inherited = dict.clone();
                break;
            }
            _ => parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok(),
        }
    }

    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| StampError::Embed(e.to_string()))?
        .set("Resources", Object::Dictionary(inherited));
    Ok(ResourcesLocation::Inline)
}

/// Append drawing operators after the page's existing contents.
///
/// Existing contents may leave the graphics state changed (an unbalanced
/// `cm` is legal), so they are wrapped as `[q] existing… [Q ops]` and the
/// new operators always start from the page's default CTM.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), StampError> {
    let existing = lookup_dict(doc, page_id)?.get(b"Contents").ok().cloned();

    let mut drawing = Vec::with_capacity(operations.len() + 1);
    if existing.is_some() {
        drawing.push(Operation::new("Q", vec![]));
    }
    drawing.extend(operations);
    let encoded = Content {
        operations: drawing,
    }
    .encode()
    .map_err(|e| StampError::Embed(e.to_string()))?;

    // Streams are concatenated as-is when the page is read; keep tokens apart
    let mut content = Vec::with_capacity(encoded.len() + 2);
    content.push(b'\n');
    content.extend(encoded);
    content.push(b'\n');
    let drawing_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let contents = match existing {
        None => Object::Reference(drawing_id),
        Some(existing) => {
            let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let mut streams = vec![Object::Reference(save_id)];
            match existing {
                Object::Array(arr) => streams.extend(arr),
                Object::Reference(id) => match doc.get_object(id) {
                    // An indirect array of streams
                    Ok(Object::Array(arr)) => streams.extend(arr.iter().cloned()),
                    _ => streams.push(Object::Reference(id)),
                },
                _ => {
                    return Err(StampError::Embed(
                        "page /Contents is neither a stream reference nor an array".to_string(),
                    ))
                }
            }
            streams.push(Object::Reference(drawing_id));
            Object::Array(streams)
        }
    };

    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| StampError::Embed(e.to_string()))?
        .set("Contents", contents);
    Ok(())
}
