//! Staged image overlays for the current page
//!
//! Overlays are kept in insertion order, which is also the order in which
//! they are drawn on commit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::OverlayConfig;
use crate::coords::{Point, Size};
use crate::image::OverlayImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    pub image: OverlayImage,
    /// Top-left corner relative to the page container
    pub position: Point,
    pub size: Size,
}

/// A file the user picked that could not be used as an overlay
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddReport {
    pub added: Vec<OverlayId>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    next_id: u64,
    overlays: Vec<Overlay>,
    config: OverlayConfig,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OverlayConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Stage an image at the next staggered slot with the default size
    pub fn add(&mut self, image: OverlayImage) -> &Overlay {
        let id = OverlayId(self.next_id);
        self.next_id += 1;

        let offset = self.config.stagger * self.overlays.len() as f64;
        self.overlays.push(Overlay {
            id,
            image,
            position: Point::new(
                self.config.anchor.x + offset,
                self.config.anchor.y + offset,
            ),
            size: self.config.default_size,
        });
        tracing::debug!(%id, "overlay staged");
        &self.overlays[self.overlays.len() - 1]
    }

    /// Stage every decodable PNG in `files`; the rest are reported and skipped
    pub fn add_files<'a, I>(&mut self, files: I) -> AddReport
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut report = AddReport::default();
        for (name, bytes) in files {
            match OverlayImage::from_png_bytes(bytes) {
                Ok(image) => report.added.push(self.add(image).id),
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "skipping unusable image");
                    report.skipped.push(SkippedFile {
                        name: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    pub fn remove(&mut self, id: OverlayId) -> bool {
        if let Some(pos) = self.overlays.iter().position(|o| o.id == id) {
            self.overlays.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn update_position(&mut self, id: OverlayId, position: Point) -> bool {
        match self.get_mut(id) {
            Some(overlay) => {
                overlay.position = position;
                true
            }
            None => false,
        }
    }

    pub fn update_size(&mut self, id: OverlayId, size: Size) -> bool {
        match self.get_mut(id) {
            Some(overlay) => {
                overlay.size = size;
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&mut self) {
        self.overlays.clear();
    }

    /// Drop every overlay whose id is in `ids`, keeping later additions
    pub fn remove_all(&mut self, ids: &[OverlayId]) {
        self.overlays.retain(|o| !ids.contains(&o.id));
    }

    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays.iter_mut().find(|o| o.id == id)
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn ids(&self) -> Vec<OverlayId> {
        self.overlays.iter().map(|o| o.id).collect()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures;
    use pretty_assertions::assert_eq;

    fn image() -> OverlayImage {
        OverlayImage::from_png_bytes(&fixtures::png(2, 2, [0, 0, 255, 255])).unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = OverlayStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_add_uses_default_size_and_anchor() {
        let mut store = OverlayStore::new();
        let overlay = store.add(image());
        assert_eq!(overlay.position, Point::new(100.0, 100.0));
        assert_eq!(overlay.size, Size::new(150.0, 100.0));
    }

    #[test]
    fn test_add_staggers_siblings() {
        let mut store = OverlayStore::new();
        store.add(image());
        store.add(image());
        let third = store.add(image()).clone();
        assert_eq!(third.position, Point::new(140.0, 140.0));
    }

    #[test]
    fn test_add_returns_unique_ids() {
        let mut store = OverlayStore::new();
        let a = store.add(image()).id;
        store.remove(a);
        let b = store.add(image()).id;
        assert_ne!(a, b);
    }

    #[test]
    fn test_overlay_id_display() {
        assert_eq!(OverlayId(7).to_string(), "img-7");
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let mut store = OverlayStore::new();
        store.add(image());
        let before = store.overlays().to_vec();

        assert!(!store.remove(OverlayId(99)));
        assert_eq!(store.overlays(), &before[..]);
    }

    #[test]
    fn test_updates_touch_only_target() {
        let mut store = OverlayStore::new();
        let a = store.add(image()).id;
        let b = store.add(image()).id;

        assert!(store.update_position(a, Point::new(5.0, 6.0)));
        assert!(store.update_size(a, Size::new(90.0, 60.0)));

        assert_eq!(store.get(a).unwrap().position, Point::new(5.0, 6.0));
        assert_eq!(store.get(a).unwrap().size, Size::new(90.0, 60.0));
        assert_eq!(store.get(b).unwrap().position, Point::new(120.0, 120.0));
        assert_eq!(store.get(b).unwrap().size, Size::new(150.0, 100.0));
    }

    #[test]
    fn test_updates_on_missing_id_are_noops() {
        let mut store = OverlayStore::new();
        assert!(!store.update_position(OverlayId(1), Point::new(0.0, 0.0)));
        assert!(!store.update_size(OverlayId(1), Size::new(100.0, 100.0)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut store = OverlayStore::new();
        store.add(image());
        store.add(image());
        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_all_keeps_unlisted() {
        let mut store = OverlayStore::new();
        let a = store.add(image()).id;
        let b = store.add(image()).id;
        let c = store.add(image()).id;
        store.remove_all(&[a, c]);
        assert_eq!(store.ids(), vec![b]);
    }

    #[test]
    fn test_add_files_skips_undecodable() {
        let mut store = OverlayStore::new();
        let good = fixtures::png(3, 3, [1, 2, 3, 255]);
        let files: Vec<(&str, &[u8])> = vec![
            ("a.png", good.as_slice()),
            ("notes.txt", b"hello".as_slice()),
            ("b.png", good.as_slice()),
        ];

        let report = store.add_files(files);

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "notes.txt");
        assert_eq!(store.len(), 2);
        // Stagger counts staged overlays, not input positions
        assert_eq!(
            store.get(report.added[1]).unwrap().position,
            Point::new(120.0, 120.0)
        );
    }
}
