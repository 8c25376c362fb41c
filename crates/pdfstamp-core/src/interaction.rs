//! Pointer-driven drag and resize of staged overlays
//!
//! The controller owns no overlays; it records which overlay is active and
//! how the gesture started, and writes clamped positions/sizes back into the
//! [`OverlayStore`] on every pointer move.

use crate::coords::{ContainerRect, Point, Size};
use crate::overlay::{OverlayId, OverlayStore};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging {
        id: OverlayId,
        /// Pointer offset from the overlay's top-left corner
        offset: Point,
    },
    Resizing {
        id: OverlayId,
        origin: Point,
        start_size: Size,
    },
}

impl Interaction {
    pub fn active_overlay(&self) -> Option<OverlayId> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging { id, .. } | Interaction::Resizing { id, .. } => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: Interaction,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Interaction {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == Interaction::Idle
    }

    /// Pointer pressed on an overlay body. Replaces any gesture in progress.
    pub fn begin_drag(
        &mut self,
        store: &OverlayStore,
        id: OverlayId,
        pointer: Point,
        container: &ContainerRect,
    ) -> bool {
        let Some(overlay) = store.get(id) else {
            return false;
        };
        self.finalize_previous(id);
        let offset = Point::new(
            pointer.x - container.left - overlay.position.x,
            pointer.y - container.top - overlay.position.y,
        );
        self.state = Interaction::Dragging { id, offset };
        tracing::debug!(%id, ?offset, "drag started");
        true
    }

    /// Pointer pressed on an overlay's resize handle. Replaces any gesture in progress.
    pub fn begin_resize(&mut self, store: &OverlayStore, id: OverlayId, pointer: Point) -> bool {
        let Some(overlay) = store.get(id) else {
            return false;
        };
        self.finalize_previous(id);
        self.state = Interaction::Resizing {
            id,
            origin: pointer,
            start_size: overlay.size,
        };
        tracing::debug!(%id, size = ?overlay.size, "resize started");
        true
    }

    /// Apply a pointer move to the active overlay, returning the overlay touched
    pub fn pointer_move(
        &mut self,
        store: &mut OverlayStore,
        pointer: Point,
        container: &ContainerRect,
    ) -> Option<OverlayId> {
        let id = self.state.active_overlay()?;
        let Some(overlay) = store.get(id) else {
            // Removed mid-gesture
            self.state = Interaction::Idle;
            return None;
        };

        match self.state {
            Interaction::Idle => None,
            Interaction::Dragging { offset, .. } => {
                let position = clamp_position(
                    Point::new(
                        pointer.x - container.left - offset.x,
                        pointer.y - container.top - offset.y,
                    ),
                    overlay.size,
                    container.size(),
                );
                store.update_position(id, position);
                Some(id)
            }
            Interaction::Resizing {
                origin, start_size, ..
            } => {
                let min_size = store.config().min_size;
                let size = clamp_size(
                    Size::new(
                        start_size.width + (pointer.x - origin.x),
                        start_size.height + (pointer.y - origin.y),
                    ),
                    overlay.position,
                    container.size(),
                    min_size,
                );
                store.update_size(id, size);
                Some(id)
            }
        }
    }

    /// Pointer released anywhere: the gesture ends
    pub fn pointer_up(&mut self) {
        if let Some(id) = self.state.active_overlay() {
            tracing::debug!(%id, "gesture finished");
        }
        self.state = Interaction::Idle;
    }

    fn finalize_previous(&mut self, next: OverlayId) {
        if let Some(previous) = self.state.active_overlay() {
            if previous != next {
                tracing::debug!(%previous, %next, "switching active overlay");
            }
        }
        self.state = Interaction::Idle;
    }
}

/// Keep the overlay fully inside the container; the left/top edge wins when it cannot fit
pub fn clamp_position(desired: Point, size: Size, container: Size) -> Point {
    Point::new(
        desired.x.min(container.width - size.width).max(0.0),
        desired.y.min(container.height - size.height).max(0.0),
    )
}

/// Floor at `min_size`, cap at the space left from `position` (never below the floor)
pub fn clamp_size(desired: Size, position: Point, container: Size, min_size: Size) -> Size {
    let max_width = (container.width - position.x).max(min_size.width);
    let max_height = (container.height - position.y).max(min_size.height);
    Size::new(
        desired.width.max(min_size.width).min(max_width),
        desired.height.max(min_size.height).min(max_height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{fixtures, OverlayImage};
    use pretty_assertions::assert_eq;

    fn store_with(count: usize) -> (OverlayStore, Vec<OverlayId>) {
        let mut store = OverlayStore::new();
        let image = OverlayImage::from_png_bytes(&fixtures::png(1, 1, [0, 0, 0, 255])).unwrap();
        let ids = (0..count).map(|_| store.add(image.clone()).id).collect();
        (store, ids)
    }

    fn container() -> ContainerRect {
        ContainerRect::new(50.0, 30.0, 600.0, 800.0)
    }

    #[test]
    fn test_starts_idle() {
        assert!(InteractionController::new().is_idle());
    }

    #[test]
    fn test_drag_moves_overlay_keeping_grab_offset() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();

        // Overlay at (100,100) in container; grab 10px into it
        assert!(ctl.begin_drag(&store, ids[0], Point::new(160.0, 140.0), &container()));
        assert_eq!(
            ctl.state(),
            Interaction::Dragging {
                id: ids[0],
                offset: Point::new(10.0, 10.0)
            }
        );

        ctl.pointer_move(&mut store, Point::new(260.0, 240.0), &container());
        assert_eq!(store.get(ids[0]).unwrap().position, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_drag_clamps_to_container() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        ctl.begin_drag(&store, ids[0], Point::new(160.0, 140.0), &container());

        ctl.pointer_move(&mut store, Point::new(-500.0, -500.0), &container());
        assert_eq!(store.get(ids[0]).unwrap().position, Point::new(0.0, 0.0));

        ctl.pointer_move(&mut store, Point::new(5000.0, 5000.0), &container());
        assert_eq!(
            store.get(ids[0]).unwrap().position,
            Point::new(600.0 - 150.0, 800.0 - 100.0)
        );
    }

    #[test]
    fn test_resize_grows_with_pointer_delta() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        assert!(ctl.begin_resize(&store, ids[0], Point::new(300.0, 300.0)));

        ctl.pointer_move(&mut store, Point::new(330.0, 320.0), &container());
        assert_eq!(store.get(ids[0]).unwrap().size, Size::new(180.0, 120.0));
    }

    #[test]
    fn test_resize_is_floored_at_minimum() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        ctl.begin_resize(&store, ids[0], Point::new(300.0, 300.0));

        ctl.pointer_move(&mut store, Point::new(0.0, 0.0), &container());
        assert_eq!(store.get(ids[0]).unwrap().size, Size::new(80.0, 50.0));
    }

    #[test]
    fn test_resize_is_capped_at_remaining_space() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        ctl.begin_resize(&store, ids[0], Point::new(300.0, 300.0));

        ctl.pointer_move(&mut store, Point::new(3000.0, 3000.0), &container());
        assert_eq!(store.get(ids[0]).unwrap().size, Size::new(500.0, 700.0));
    }

    #[test]
    fn test_pointer_up_returns_to_idle() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        ctl.begin_drag(&store, ids[0], Point::new(160.0, 140.0), &container());
        ctl.pointer_up();
        assert!(ctl.is_idle());

        // Moves after release do nothing
        let before = store.get(ids[0]).unwrap().position;
        assert_eq!(
            ctl.pointer_move(&mut store, Point::new(400.0, 400.0), &container()),
            None
        );
        assert_eq!(store.get(ids[0]).unwrap().position, before);
    }

    #[test]
    fn test_last_pointer_down_wins() {
        let (mut store, ids) = store_with(2);
        let mut ctl = InteractionController::new();
        ctl.begin_drag(&store, ids[0], Point::new(160.0, 140.0), &container());
        ctl.begin_resize(&store, ids[1], Point::new(300.0, 300.0));

        assert_eq!(ctl.state().active_overlay(), Some(ids[1]));
        let first_before = store.get(ids[0]).unwrap().clone();
        ctl.pointer_move(&mut store, Point::new(320.0, 310.0), &container());

        assert_eq!(store.get(ids[0]).unwrap(), &first_before);
        assert_eq!(store.get(ids[1]).unwrap().size, Size::new(170.0, 110.0));
    }

    #[test]
    fn test_begin_on_missing_overlay_is_noop() {
        let (store, _) = store_with(0);
        let mut ctl = InteractionController::new();
        assert!(!ctl.begin_drag(&store, OverlayId(3), Point::default(), &container()));
        assert!(!ctl.begin_resize(&store, OverlayId(3), Point::default()));
        assert!(ctl.is_idle());
    }

    #[test]
    fn test_overlay_removed_mid_drag_resets() {
        let (mut store, ids) = store_with(1);
        let mut ctl = InteractionController::new();
        ctl.begin_drag(&store, ids[0], Point::new(160.0, 140.0), &container());
        store.remove(ids[0]);

        assert_eq!(
            ctl.pointer_move(&mut store, Point::new(200.0, 200.0), &container()),
            None
        );
        assert!(ctl.is_idle());
    }

    #[test]
    fn test_clamp_position_prefers_origin_when_too_large() {
        let p = clamp_position(
            Point::new(30.0, 30.0),
            Size::new(500.0, 500.0),
            Size::new(400.0, 400.0),
        );
        assert_eq!(p, Point::new(0.0, 0.0));
    }
}
