//! Editor session state
//!
//! Ties the live document, the staged overlays and the pointer gesture
//! together with the viewer state (page, zoom) the host renders from.
//!
//! Committing is split in two phases so a host can run the heavy PDF work
//! off the event loop: [`PdfEditor::begin_commit`] snapshots everything the
//! pipeline needs and [`PdfEditor::finish_commit`] folds the result back in.

use crate::commit;
use crate::config::EditorConfig;
use crate::coords::{ContainerRect, PageViewport, Point, Size};
use crate::document::{inspect, DocumentHandle, DocumentInfo, DocumentSlot, HandleProvider};
use crate::error::StampError;
use crate::image::OverlayImage;
use crate::interaction::{Interaction, InteractionController};
use crate::overlay::{AddReport, Overlay, OverlayId, OverlayStore};
use crate::presence::{DocumentMeta, Location, PresenceSink};

/// Everything the commit pipeline needs, detached from the editor
#[derive(Debug, Clone)]
pub struct CommitRequest {
    generation: u64,
    pub document: Vec<u8>,
    pub overlays: Vec<Overlay>,
    /// 0-based index of the page shown when the commit started
    pub page_index: usize,
    pub container: Size,
    pub viewport: PageViewport,
}

impl CommitRequest {
    /// Run the pipeline for this snapshot
    pub fn run(&self) -> Result<Vec<u8>, StampError> {
        commit::apply_overlays(
            &self.document,
            &self.overlays,
            self.page_index,
            self.container,
            self.viewport,
        )
    }

    pub fn overlay_ids(&self) -> Vec<OverlayId> {
        self.overlays.iter().map(|o| o.id).collect()
    }
}

pub struct PdfEditor<P: HandleProvider> {
    config: EditorConfig,
    document: DocumentSlot<P>,
    document_name: String,
    info: DocumentInfo,
    /// Bumped whenever the live document changes; stale commits are refused
    generation: u64,
    page_number: usize,
    zoom: f64,
    viewport: PageViewport,
    container: Option<ContainerRect>,
    overlays: OverlayStore,
    interaction: InteractionController,
    applying: bool,
    presence: Option<Box<dyn PresenceSink>>,
}

impl<P: HandleProvider> PdfEditor<P> {
    /// Open a document the host already has a handle for
    pub fn open(
        config: EditorConfig,
        provider: P,
        name: &str,
        bytes: Vec<u8>,
        handle: DocumentHandle,
    ) -> Result<Self, StampError> {
        let info = inspect(&bytes)?;
        let viewport = first_viewport(&info);
        tracing::info!(name, pages = info.page_count, "document opened");

        Ok(Self {
            overlays: OverlayStore::with_config(config.overlay.clone()),
            zoom: 1.0,
            config,
            document: DocumentSlot::new(provider, bytes, handle),
            document_name: name.to_string(),
            info,
            generation: 0,
            page_number: 1,
            viewport,
            container: None,
            interaction: InteractionController::new(),
            applying: false,
            presence: None,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn document_bytes(&self) -> &[u8] {
        self.document.bytes()
    }

    pub fn handle(&self) -> Option<&DocumentHandle> {
        self.document.handle()
    }

    pub fn num_pages(&self) -> usize {
        self.info.page_count
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn page_viewport(&self) -> PageViewport {
        self.viewport
    }

    pub fn container(&self) -> Option<ContainerRect> {
        self.container
    }

    pub fn overlays(&self) -> &[Overlay] {
        self.overlays.overlays()
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction.state()
    }

    pub fn is_applying(&self) -> bool {
        self.applying
    }

    /// Replace the live document, discarding staged overlays
    pub fn load_document(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        handle: DocumentHandle,
    ) -> Result<(), StampError> {
        let info = inspect(&bytes)?;
        tracing::info!(name, pages = info.page_count, "document loaded");

        self.document.replace(bytes, handle);
        self.document_name = name.to_string();
        self.viewport = first_viewport(&info);
        self.info = info;
        self.generation += 1;
        self.page_number = 1;
        self.overlays.clear_all();
        self.interaction.pointer_up();
        self.sync_presence();
        Ok(())
    }

    /// Attach the collaboration layer and announce the current document
    pub fn set_presence(&mut self, sink: Box<dyn PresenceSink>) {
        self.presence = Some(sink);
        self.sync_presence();
    }

    pub fn next_page(&mut self) {
        if self.page_number < self.info.page_count {
            self.change_page(self.page_number + 1);
        }
    }

    pub fn previous_page(&mut self) {
        if self.page_number > 1 {
            self.change_page(self.page_number - 1);
        }
    }

    /// Jump to a 1-indexed page
    pub fn set_page(&mut self, page_number: usize) -> Result<(), StampError> {
        if page_number == 0 || page_number > self.info.page_count {
            return Err(StampError::PageOutOfRange {
                page: page_number,
                count: self.info.page_count,
            });
        }
        if page_number != self.page_number {
            self.change_page(page_number);
        }
        Ok(())
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom + self.config.zoom.step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom - self.config.zoom.step)
    }

    /// Set the zoom factor, clamped to the configured limits
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.zoom = zoom.clamp(self.config.zoom.min, self.config.zoom.max);
        self.zoom
    }

    /// Viewport reported by the host renderer for the current page
    pub fn set_page_viewport(&mut self, viewport: PageViewport) {
        self.viewport = viewport;
    }

    /// Client rectangle of the element overlays are positioned in
    pub fn set_container_rect(&mut self, rect: ContainerRect) {
        self.container = Some(rect);
    }

    pub fn add_image(&mut self, image: OverlayImage) -> OverlayId {
        self.overlays.add(image).id
    }

    pub fn add_files<'a, I>(&mut self, files: I) -> AddReport
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        self.overlays.add_files(files)
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        if self.interaction.state().active_overlay() == Some(id) {
            self.interaction.pointer_up();
        }
        self.overlays.remove(id)
    }

    /// Pointer pressed on an overlay body; false until the container is known
    pub fn pointer_down_body(&mut self, id: OverlayId, pointer: Point) -> bool {
        match self.container {
            Some(container) => self
                .interaction
                .begin_drag(&self.overlays, id, pointer, &container),
            None => false,
        }
    }

    /// Pointer pressed on an overlay's resize handle
    pub fn pointer_down_handle(&mut self, id: OverlayId, pointer: Point) -> bool {
        self.interaction.begin_resize(&self.overlays, id, pointer)
    }

    pub fn pointer_move(&mut self, pointer: Point) -> Option<OverlayId> {
        let container = self.container?;
        self.interaction
            .pointer_move(&mut self.overlays, pointer, &container)
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    /// Snapshot the commit inputs and mark a commit as in flight
    pub fn begin_commit(&mut self) -> Result<CommitRequest, StampError> {
        if self.applying {
            return Err(StampError::CommitInProgress);
        }
        if self.overlays.is_empty() {
            return Err(StampError::NoOverlays);
        }
        let container = self
            .container
            .ok_or(StampError::NotReady("container rectangle unknown"))?;

        self.applying = true;
        self.interaction.pointer_up();
        tracing::info!(
            overlays = self.overlays.len(),
            page = self.page_number,
            "commit started"
        );

        Ok(CommitRequest {
            generation: self.generation,
            document: self.document.bytes().to_vec(),
            overlays: self.overlays.overlays().to_vec(),
            page_index: self.page_number - 1,
            container: container.size(),
            viewport: self.viewport,
        })
    }

    /// Fold a pipeline result back in. On error nothing but the in-flight flag changes.
    pub fn finish_commit(
        &mut self,
        request: CommitRequest,
        result: Result<Vec<u8>, StampError>,
    ) -> Result<DocumentHandle, StampError> {
        self.applying = false;

        let outcome = if request.generation != self.generation {
            Err(StampError::StaleCommit)
        } else {
            result.and_then(|bytes| self.publish(&request, bytes))
        };

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "commit failed");
        }
        outcome
    }

    /// Run both commit phases synchronously
    pub fn apply_overlays(&mut self) -> Result<DocumentHandle, StampError> {
        let request = self.begin_commit()?;
        let result = request.run();
        self.finish_commit(request, result)
    }

    fn publish(
        &mut self,
        request: &CommitRequest,
        bytes: Vec<u8>,
    ) -> Result<DocumentHandle, StampError> {
        let info = inspect(&bytes)?;
        let handle = self.document.publish(bytes)?;

        self.overlays.remove_all(&request.overlay_ids());
        self.generation += 1;
        self.page_number = self.page_number.min(info.page_count);
        if let Some(viewport) = info.viewport(self.page_number) {
            self.viewport = viewport;
        }
        self.info = info;

        tracing::info!(
            handle = handle.as_str(),
            overlays = request.overlays.len(),
            "commit published"
        );
        self.sync_presence();
        Ok(handle)
    }

    fn change_page(&mut self, page_number: usize) {
        self.page_number = page_number;
        if let Some(viewport) = self.info.viewport(page_number) {
            self.viewport = viewport;
        }
        self.interaction.pointer_up();
        tracing::debug!(page = page_number, "page changed");
        self.sync_presence();
    }

    fn sync_presence(&mut self) {
        let Some(sink) = self.presence.as_mut() else {
            return;
        };
        sink.set_document(&DocumentMeta::pdf(
            &self.config.document_id,
            &self.document_name,
        ));
        sink.set_location(&Location::page(self.page_number));
    }
}

fn first_viewport(info: &DocumentInfo) -> PageViewport {
    info.viewport(1)
        .unwrap_or_else(|| PageViewport::new(612.0, 792.0))
}
