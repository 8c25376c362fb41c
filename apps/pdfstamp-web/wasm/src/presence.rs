//! Presence updates for the host's collaboration layer
//!
//! The editor reports presence while it is mutably borrowed, and host
//! callbacks are free to read the session back. Updates are therefore queued
//! by [`PresenceQueue`] and handed to JavaScript by [`PresenceDispatch::flush`]
//! once the editor borrow has been released.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use pdfstamp_core::{DocumentMeta, Location, PresenceSink};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceUpdate {
    Document(DocumentMeta),
    Location(Location),
}

/// Sink handed to the editor; only records updates
#[derive(Clone, Default)]
pub struct PresenceQueue {
    pending: Rc<RefCell<VecDeque<PresenceUpdate>>>,
}

impl PresenceQueue {
    /// Take the oldest pending update. The queue is not borrowed afterwards.
    pub fn pop(&self) -> Option<PresenceUpdate> {
        self.pending.borrow_mut().pop_front()
    }
}

impl PresenceSink for PresenceQueue {
    fn set_document(&mut self, document: &DocumentMeta) {
        self.pending
            .borrow_mut()
            .push_back(PresenceUpdate::Document(document.clone()));
    }

    fn set_location(&mut self, location: &Location) {
        self.pending
            .borrow_mut()
            .push_back(PresenceUpdate::Location(location.clone()));
    }
}

struct Callbacks {
    set_document: js_sys::Function,
    set_location: js_sys::Function,
}

/// Pending updates plus the host callbacks that receive them
#[derive(Default)]
pub struct PresenceDispatch {
    queue: PresenceQueue,
    callbacks: RefCell<Option<Callbacks>>,
}

impl PresenceDispatch {
    pub fn queue(&self) -> PresenceQueue {
        self.queue.clone()
    }

    pub fn set_callbacks(&self, set_document: js_sys::Function, set_location: js_sys::Function) {
        *self.callbacks.borrow_mut() = Some(Callbacks {
            set_document,
            set_location,
        });
    }

    /// Deliver queued updates. Must be called with the editor unborrowed.
    pub fn flush(&self) {
        drain(&self.queue, |update| {
            let callback = match (self.callbacks.borrow().as_ref(), &update) {
                (Some(c), PresenceUpdate::Document(_)) => c.set_document.clone(),
                (Some(c), PresenceUpdate::Location(_)) => c.set_location.clone(),
                (None, _) => return,
            };
            match &update {
                PresenceUpdate::Document(document) => call(&callback, document),
                PresenceUpdate::Location(location) => call(&callback, location),
            }
        });
    }
}

/// Hand every pending update to `deliver`, including ones queued while delivering
pub(crate) fn drain(queue: &PresenceQueue, mut deliver: impl FnMut(PresenceUpdate)) {
    while let Some(update) = queue.pop() {
        deliver(update);
    }
}

fn call<T: Serialize>(callback: &js_sys::Function, value: &T) {
    match serde_wasm_bindgen::to_value(value) {
        Ok(arg) => {
            if let Err(e) = callback.call1(&JsValue::NULL, &arg) {
                web_sys::console::warn_1(&e);
            }
        }
        Err(e) => web_sys::console::warn_1(&JsValue::from_str(&e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures;
    use pdfstamp_core::{DocumentHandle, EditorConfig, HandleProvider, PdfEditor, StampError};

    struct NoHandles;

    impl HandleProvider for NoHandles {
        fn create(&mut self, _bytes: &[u8]) -> Result<String, StampError> {
            Err(StampError::Handle("unavailable".to_string()))
        }

        fn release(&mut self, _handle: &str) {}
    }

    #[test]
    fn test_updates_are_delivered_after_the_editor_is_released() {
        let editor = Rc::new(RefCell::new(
            PdfEditor::open(
                EditorConfig::default(),
                NoHandles,
                "two.pdf",
                fixtures::pdf_with_pages(2),
                DocumentHandle::External("/two.pdf".into()),
            )
            .unwrap(),
        ));
        let queue = PresenceQueue::default();

        editor.borrow_mut().set_presence(Box::new(queue.clone()));
        editor.borrow_mut().next_page();

        // Delivery reads the editor back, as a host callback would
        let mut pages = Vec::new();
        drain(&queue, |update| {
            if let PresenceUpdate::Location(location) = update {
                pages.push((location.id, editor.borrow().page_number()));
            }
        });

        assert_eq!(
            pages,
            vec![("pdf-page-1".to_string(), 2), ("pdf-page-2".to_string(), 2)]
        );
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_updates_queued_during_delivery_are_drained() {
        let queue = PresenceQueue::default();
        queue.clone().set_location(&Location::page(1));

        let mut seen = Vec::new();
        let mut sink = queue.clone();
        drain(&queue, |update| {
            if seen.is_empty() {
                sink.set_location(&Location::page(2));
            }
            seen.push(update);
        });

        assert_eq!(
            seen,
            vec![
                PresenceUpdate::Location(Location::page(1)),
                PresenceUpdate::Location(Location::page(2)),
            ]
        );
    }
}
