//! Document-level pointer listeners
//!
//! Drag and resize must keep tracking when the pointer leaves the overlay,
//! so `mousemove`/`mouseup` are registered on the document rather than on
//! the overlay element. The listeners live as long as [`PointerListeners`]
//! and are removed when it is detached or dropped.

use std::cell::RefCell;
use std::rc::Rc;

use pdfstamp_core::{ContainerRect, Point};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, MouseEvent};

use crate::session::Editor;

type Handler = Closure<dyn FnMut(MouseEvent)>;

pub struct PointerListeners {
    document: Document,
    container: Element,
    on_move: Handler,
    on_up: Handler,
}

impl PointerListeners {
    /// Register move/up listeners driving `editor`, measuring overlays against `container`.
    /// `on_change` is invoked after every move that changed an overlay.
    pub fn attach(
        editor: Rc<RefCell<Editor>>,
        container: Element,
        on_change: Option<js_sys::Function>,
    ) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("No document available"))?;

        let on_move = {
            let editor = editor.clone();
            let container = container.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
                let touched = {
                    let mut editor = editor.borrow_mut();
                    editor.set_container_rect(container_rect(&container));
                    editor.pointer_move(client_point(&event))
                };
                // Borrow released: the callback may read the session
                if let (Some(_), Some(callback)) = (touched, on_change.as_ref()) {
                    let _ = callback.call0(&JsValue::NULL);
                }
            })
        };

        let on_up = Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
            editor.borrow_mut().pointer_up();
        });

        document.add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref())?;
        document.add_event_listener_with_callback("mouseup", on_up.as_ref().unchecked_ref())?;

        Ok(Self {
            document,
            container,
            on_move,
            on_up,
        })
    }

    /// Current client rectangle of the overlay container
    pub fn container_rect(&self) -> ContainerRect {
        container_rect(&self.container)
    }
}

impl Drop for PointerListeners {
    fn drop(&mut self) {
        let _ = self.document.remove_event_listener_with_callback(
            "mousemove",
            self.on_move.as_ref().unchecked_ref(),
        );
        let _ = self
            .document
            .remove_event_listener_with_callback("mouseup", self.on_up.as_ref().unchecked_ref());
    }
}

pub(crate) fn container_rect(element: &Element) -> ContainerRect {
    let rect = element.get_bounding_client_rect();
    ContainerRect::new(rect.left(), rect.top(), rect.width(), rect.height())
}

fn client_point(event: &MouseEvent) -> Point {
    Point::new(event.client_x() as f64, event.client_y() as f64)
}
