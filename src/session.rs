use std::sync::Arc;

use crate::{
    assets::{compress::AssetCompressor, data_uri::EncodedImage},
    background::{BackgroundRenderer, GradientId, PaintDescriptor, Surface},
    card::{BackgroundSpec, CardContent, CardKind, CardModel},
    composition::{CompositionRenderer, tree::RenderTree},
    export::{ExportEngine, ExportedImage, RootHandle},
    foundation::error::{LyricodeError, LyricodeResult},
    remote::{CommunitySync, ObjectStore, RecordStore},
    render::{BoxStyle, CaptureBackend},
};

/// Background paint together with the spec and surface it was rendered for.
struct Painted {
    spec: BackgroundSpec,
    surface: Surface,
    paint: PaintDescriptor,
}

impl Painted {
    fn render(backgrounds: &BackgroundRenderer, spec: BackgroundSpec, surface: Surface) -> Self {
        let paint = backgrounds.render(&spec, surface);
        Self {
            spec,
            surface,
            paint,
        }
    }

    fn matches(&self, card: &CardModel) -> bool {
        self.surface == Surface::from(card.kind()) && &self.spec == card.background()
    }
}

/// One open editor: a card, its live preview on the stage, and the actions gated on it.
///
/// The background paint is cached; text edits only re-run layout. Image backgrounds are
/// decoded and blurred on the blocking pool by [`upload`](Self::upload),
/// [`set_background`](Self::set_background) and [`load`](Self::load).
pub struct EditingSession<B, O, R> {
    card: CardModel,
    painted: Painted,
    compressor: AssetCompressor,
    backgrounds: BackgroundRenderer,
    composer: CompositionRenderer,
    exporter: ExportEngine<B>,
    community: Arc<CommunitySync<O, R>>,
    handle: RootHandle,
}

impl<B, O, R> EditingSession<B, O, R>
where
    B: CaptureBackend + 'static,
    O: ObjectStore,
    R: RecordStore,
{
    pub fn new(
        kind: CardKind,
        compressor: AssetCompressor,
        backgrounds: BackgroundRenderer,
        composer: CompositionRenderer,
        exporter: ExportEngine<B>,
        community: Arc<CommunitySync<O, R>>,
    ) -> Self {
        let card = CardModel::new(kind);
        let painted = Painted::render(&backgrounds, card.background().clone(), kind.into());
        let tree = composer.layout(&card, &painted.paint);
        let handle = exporter.stage().mount(&card, tree, BoxStyle::preview());
        Self {
            card,
            painted,
            compressor,
            backgrounds,
            composer,
            exporter,
            community,
            handle,
        }
    }

    pub fn card(&self) -> &CardModel {
        &self.card
    }

    pub fn handle(&self) -> RootHandle {
        self.handle
    }

    /// Paint currently behind the card.
    pub fn paint(&self) -> &PaintDescriptor {
        &self.painted.paint
    }

    /// Current preview tree.
    pub fn preview(&self) -> RenderTree {
        self.composer.layout(&self.card, &self.painted.paint)
    }

    /// Apply an edit and re-lay the preview.
    ///
    /// Meant for text fields. A background changed here is repainted inline; use
    /// [`set_background`](Self::set_background) for images.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut CardModel) -> T) -> T {
        let out = f(&mut self.card);
        if !self.painted.matches(&self.card) {
            tracing::debug!("background changed inside an edit, repainting inline");
            self.painted = Painted::render(
                &self.backgrounds,
                self.card.background().clone(),
                self.card.kind().into(),
            );
        }
        self.refresh();
        out
    }

    /// Replace the card wholesale, e.g. from a saved JSON draft.
    pub async fn load(&mut self, card: CardModel) -> LyricodeResult<()> {
        card.validate()?;
        let painted = self
            .paint_off_thread(card.background().clone(), card.kind().into())
            .await?;
        self.card = card;
        self.painted = painted;
        self.refresh();
        Ok(())
    }

    /// Swap the background, decoding and blurring images on the blocking pool.
    pub async fn set_background(&mut self, spec: BackgroundSpec) -> LyricodeResult<()> {
        let painted = self
            .paint_off_thread(spec.clone(), self.card.kind().into())
            .await?;
        self.card.set_background(spec);
        self.painted = painted;
        self.refresh();
        Ok(())
    }

    /// Palette lookups are constant time and stay on the caller's thread.
    pub fn choose_gradient(&mut self, id: GradientId) {
        self.edit(|c| c.set_gradient(id));
    }

    pub fn clear_background(&mut self) {
        self.edit(CardModel::clear_background);
    }

    /// Compress an uploaded file and prepare its paint off the async thread, then make it the
    /// background.
    ///
    /// Falls back to the original bytes when compression cannot meet the budget.
    pub async fn upload(&mut self, raw: Vec<u8>) -> LyricodeResult<()> {
        let compressor = self.compressor;
        let backgrounds = self.backgrounds;
        let surface = Surface::from(self.card.kind());
        let painted = tokio::task::spawn_blocking(move || {
            let encoded = compressor.compress_or_original(&raw);
            Painted::render(&backgrounds, BackgroundSpec::UploadedImage(encoded), surface)
        })
        .await
        .map_err(|e| anyhow::anyhow!("compression task failed: {e}"))?;
        if let Some(encoded) = painted.spec.uploaded_image() {
            tracing::debug!(
                mime = encoded.mime(),
                size_kb = encoded.size_kb(),
                "background uploaded"
            );
        }
        self.card.set_background(painted.spec.clone());
        self.painted = painted;
        self.refresh();
        Ok(())
    }

    async fn paint_off_thread(
        &self,
        spec: BackgroundSpec,
        surface: Surface,
    ) -> LyricodeResult<Painted> {
        let backgrounds = self.backgrounds;
        let painted =
            tokio::task::spawn_blocking(move || Painted::render(&backgrounds, spec, surface))
                .await
                .map_err(|e| anyhow::anyhow!("background paint task failed: {e}"))?;
        Ok(painted)
    }

    fn refresh(&self) {
        let tree = self.preview();
        if !self.exporter.stage().update(self.handle, &self.card, tree) {
            tracing::debug!(handle = ?self.handle, "preview not mounted");
        }
    }

    /// Lyric cards need a title or lyrics; code cards can always be downloaded.
    pub fn can_download(&self) -> bool {
        match self.card.content() {
            CardContent::Lyric(f) => !f.title.is_empty() || !f.lyrics.is_empty(),
            CardContent::Code(_) => true,
        }
    }

    pub fn can_publish(&self, creator_name: &str) -> bool {
        if creator_name.trim().is_empty() {
            return false;
        }
        match self.card.content() {
            CardContent::Lyric(f) => {
                !f.title.is_empty() && !f.artist.is_empty() && !f.lyrics.is_empty()
            }
            CardContent::Code(f) => !f.code.is_empty(),
        }
    }

    /// Exported PNG of the current card, `None` when downloads are disabled.
    pub async fn download(&self) -> LyricodeResult<Option<ExportedImage>> {
        if !self.can_download() {
            tracing::debug!("download disabled for an empty card");
            return Ok(None);
        }
        self.exporter.export(self.handle).await
    }

    /// Exports the card, uploads the image and records the entry. Resets the form on success
    /// and keeps it on failure.
    pub async fn publish(&mut self, creator_name: &str) -> LyricodeResult<String> {
        if !self.can_publish(creator_name) {
            return Err(LyricodeError::validation(
                "card is incomplete or creator name is empty",
            ));
        }
        let image = self
            .exporter
            .export(self.handle)
            .await?
            .map(|out| EncodedImage::from_bytes("image/png", &out.png));
        let id = self
            .community
            .save(&self.card, creator_name.trim(), image.as_ref())
            .await?;
        self.edit(CardModel::reset);
        Ok(id)
    }
}

impl<B, O, R> Drop for EditingSession<B, O, R> {
    fn drop(&mut self) {
        self.exporter.stage().unmount(self.handle);
    }
}
