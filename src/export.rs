use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    card::{CardContent, CardModel},
    composition::tree::RenderTree,
    foundation::error::{LyricodeError, LyricodeResult},
    render::{BoxStyle, CaptureBackend},
};

/// Handle to a card mounted on a [`Stage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootHandle(u64);

#[derive(Clone, Debug)]
struct Mounted {
    tree: RenderTree,
    /// Box the card has when no capture is running.
    base: BoxStyle,
    /// Capture box while at least one export holds an override.
    capture: Option<BoxStyle>,
    overrides: usize,
    filename: String,
}

impl Mounted {
    fn style(&self) -> BoxStyle {
        self.capture.unwrap_or(self.base)
    }
}

/// Live mounted cards, keyed by handle. Cheap to clone; clones share state.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    inner: Arc<Mutex<HashMap<RootHandle, Mounted>>>,
    next: Arc<AtomicU64>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RootHandle, Mounted>> {
        // A panicking capture must not wedge the stage.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mount(&self, card: &CardModel, tree: RenderTree, style: BoxStyle) -> RootHandle {
        let handle = RootHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(
            handle,
            Mounted {
                tree,
                base: style,
                capture: None,
                overrides: 0,
                filename: export_filename(card),
            },
        );
        handle
    }

    /// Replaces the tree after an edit. Returns `false` when the handle is not mounted.
    pub fn update(&self, handle: RootHandle, card: &CardModel, tree: RenderTree) -> bool {
        match self.lock().get_mut(&handle) {
            Some(m) => {
                m.tree = tree;
                m.filename = export_filename(card);
                true
            }
            None => false,
        }
    }

    pub fn unmount(&self, handle: RootHandle) -> bool {
        self.lock().remove(&handle).is_some()
    }

    pub fn is_mounted(&self, handle: RootHandle) -> bool {
        self.lock().contains_key(&handle)
    }

    pub fn style(&self, handle: RootHandle) -> Option<BoxStyle> {
        self.lock().get(&handle).map(Mounted::style)
    }

    pub fn tree(&self, handle: RootHandle) -> Option<RenderTree> {
        self.lock().get(&handle).map(|m| m.tree.clone())
    }

    fn push_override(&self, handle: RootHandle, style: BoxStyle) -> bool {
        match self.lock().get_mut(&handle) {
            Some(m) => {
                m.overrides += 1;
                m.capture = Some(style);
                true
            }
            None => false,
        }
    }

    fn pop_override(&self, handle: RootHandle) -> bool {
        match self.lock().get_mut(&handle) {
            Some(m) => {
                m.overrides = m.overrides.saturating_sub(1);
                if m.overrides == 0 {
                    m.capture = None;
                }
                true
            }
            None => false,
        }
    }
}

/// Scoped box override. The base box comes back once the last override on a handle drops,
/// so overlapping exports of one card cannot leave it in capture mode.
struct StyleOverride {
    stage: Stage,
    handle: RootHandle,
}

impl StyleOverride {
    fn apply(stage: &Stage, handle: RootHandle, style: BoxStyle) -> Option<Self> {
        stage.push_override(handle, style).then(|| Self {
            stage: stage.clone(),
            handle,
        })
    }
}

impl Drop for StyleOverride {
    fn drop(&mut self) {
        if !self.stage.pop_override(self.handle) {
            tracing::debug!(handle = ?self.handle, "card unmounted during capture");
        }
    }
}

/// `{title or "lyrics"}-lyrics.png` or `{language or "code"}-snippet.png`.
pub fn export_filename(card: &CardModel) -> String {
    let (stem, suffix) = match card.content() {
        CardContent::Lyric(f) => (file_stem(&f.title, "lyrics"), "lyrics"),
        CardContent::Code(f) => (file_stem(&f.language, "code"), "snippet"),
    };
    format!("{stem}-{suffix}.png")
}

/// User text made safe as a single path component.
///
/// Separators become `-`, and `.`/`..` segments are dropped. Falls back when nothing is left.
pub fn file_stem(value: &str, fallback: &str) -> String {
    let stem = value
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("-");
    if stem.is_empty() {
        fallback.to_owned()
    } else {
        stem
    }
}

/// A captured card ready to be offered as a download.
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Captures mounted cards to PNG.
pub struct ExportEngine<B> {
    backend: Arc<Mutex<B>>,
    stage: Stage,
    scale: u32,
    card_size: f64,
}

impl<B> Clone for ExportEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            stage: self.stage.clone(),
            scale: self.scale,
            card_size: self.card_size,
        }
    }
}

impl<B> ExportEngine<B> {
    pub fn stage(&self) -> &Stage {
        &self.stage
    }
}

impl<B: CaptureBackend + 'static> ExportEngine<B> {
    pub fn new(backend: B, stage: Stage) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            stage,
            scale: 2,
            card_size: 600.0,
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_card_size(mut self, card_size: f64) -> Self {
        self.card_size = card_size;
        self
    }

    /// Captures `handle` at the configured supersampling and encodes PNG.
    ///
    /// Returns `Ok(None)` when nothing is mounted under `handle`. The mounted box is normalized
    /// for the capture and restored afterwards whatever the outcome.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn export(&self, handle: RootHandle) -> LyricodeResult<Option<ExportedImage>> {
        let Some(guard) =
            StyleOverride::apply(&self.stage, handle, BoxStyle::capture(self.card_size))
        else {
            tracing::debug!(?handle, "nothing mounted, skipping export");
            return Ok(None);
        };

        let (tree, style, filename) = {
            let stage = self.stage.lock();
            let Some(m) = stage.get(&handle) else {
                return Ok(None);
            };
            (m.tree.clone(), m.style(), m.filename.clone())
        };

        let backend = self.backend.clone();
        let scale = self.scale;
        let captured = tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock().unwrap_or_else(|e| e.into_inner());
            let frame = backend.capture(&tree, &style, scale)?;
            let png = encode_png(frame.width, frame.height, frame.to_straight())?;
            Ok::<_, LyricodeError>((frame.width, frame.height, png))
        })
        .await;
        drop(guard);

        let (width, height, png) = match captured {
            Ok(res) => res?,
            Err(join) => {
                tracing::error!(error = %join, "capture task failed");
                return Err(LyricodeError::render(format!("capture task failed: {join}")));
            }
        };

        tracing::info!(%filename, width, height, bytes = png.len(), "card exported");
        Ok(Some(ExportedImage {
            filename,
            width,
            height,
            png,
        }))
    }
}

pub fn encode_png(width: u32, height: u32, straight_rgba: Vec<u8>) -> LyricodeResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(width, height, straight_rgba)
        .ok_or_else(|| LyricodeError::encode("frame buffer does not match its dimensions"))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| LyricodeError::encode(format!("png encode: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        background::{BackgroundRenderer, Surface},
        composition::CompositionRenderer,
        foundation::core::FrameRgba,
    };

    #[derive(Default)]
    struct Recording {
        seen: Arc<Mutex<Vec<BoxStyle>>>,
    }

    impl CaptureBackend for Recording {
        fn capture(
            &mut self,
            tree: &RenderTree,
            style: &BoxStyle,
            scale: u32,
        ) -> LyricodeResult<FrameRgba> {
            self.seen.lock().unwrap().push(*style);
            let (w, h) = style.outer_size(tree);
            let (w, h) = (w as u32 * scale, h as u32 * scale);
            Ok(FrameRgba {
                width: w,
                height: h,
                data: vec![255; (w * h * 4) as usize],
                premultiplied: true,
            })
        }
    }

    struct Failing;
    impl CaptureBackend for Failing {
        fn capture(&mut self, _: &RenderTree, _: &BoxStyle, _: u32) -> LyricodeResult<FrameRgba> {
            Err(LyricodeError::render("gpu fell over"))
        }
    }

    struct Panicking;
    impl CaptureBackend for Panicking {
        fn capture(&mut self, _: &RenderTree, _: &BoxStyle, _: u32) -> LyricodeResult<FrameRgba> {
            panic!("capture exploded")
        }
    }

    fn mount(stage: &Stage, card: &CardModel) -> RootHandle {
        let paint =
            BackgroundRenderer::default().render(card.background(), Surface::from(card.kind()));
        let tree = CompositionRenderer::new(60.0).layout(card, &paint);
        stage.mount(card, tree, BoxStyle::preview())
    }

    #[test]
    fn filenames_follow_card_kind() {
        let mut lyric = CardModel::lyric();
        assert_eq!(export_filename(&lyric), "lyrics-lyrics.png");
        lyric.set_title("Home");
        assert_eq!(export_filename(&lyric), "Home-lyrics.png");
        lyric.set_title("AC/DC");
        assert_eq!(export_filename(&lyric), "AC-DC-lyrics.png");

        let mut code = CardModel::code();
        assert_eq!(export_filename(&code), "javascript-snippet.png");
        code.set_language("");
        assert_eq!(export_filename(&code), "code-snippet.png");
    }

    #[test]
    fn file_stem_never_leaves_its_directory() {
        assert_eq!(file_stem("../../etc/evil", "x"), "etc-evil");
        assert_eq!(file_stem("..\\..\\boot.ini", "x"), "boot.ini");
        assert_eq!(file_stem("../..", "lyrics"), "lyrics");
        assert_eq!(file_stem("a..b", "x"), "a..b");
    }

    #[tokio::test]
    async fn capture_sees_normalized_box_then_original_is_restored() {
        let stage = Stage::new();
        let card = CardModel::lyric();
        let handle = mount(&stage, &card);

        let backend = Recording::default();
        let seen = backend.seen.clone();
        let engine = ExportEngine::new(backend, stage.clone()).with_card_size(60.0);
        let out = engine.export(handle).await.unwrap().unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[BoxStyle::capture(60.0)]);
        assert_eq!(stage.style(handle), Some(BoxStyle::preview()));
        assert_eq!((out.width, out.height), (120, 120));
        assert_eq!(&out.png[1..4], b"PNG");
        assert_eq!(out.filename, "lyrics-lyrics.png");
    }

    #[tokio::test]
    async fn failing_capture_restores_box() {
        let stage = Stage::new();
        let handle = mount(&stage, &CardModel::code());
        let engine = ExportEngine::new(Failing, stage.clone());

        assert!(engine.export(handle).await.is_err());
        assert_eq!(stage.style(handle), Some(BoxStyle::preview()));
    }

    #[tokio::test]
    async fn panicking_capture_restores_box() {
        let stage = Stage::new();
        let handle = mount(&stage, &CardModel::lyric());
        let engine = ExportEngine::new(Panicking, stage.clone());

        let err = engine.export(handle).await.unwrap_err();
        assert!(matches!(err, LyricodeError::Render(_)));
        assert_eq!(stage.style(handle), Some(BoxStyle::preview()));
    }

    #[tokio::test]
    async fn overlapping_exports_restore_base_box() {
        let stage = Stage::new();
        let handle = mount(&stage, &CardModel::lyric());
        let backend = Recording::default();
        let seen = backend.seen.clone();
        let engine = ExportEngine::new(backend, stage.clone()).with_card_size(60.0);

        let (a, b) = tokio::join!(engine.export(handle), engine.export(handle));
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[BoxStyle::capture(60.0), BoxStyle::capture(60.0)]
        );
        assert_eq!(stage.style(handle), Some(BoxStyle::preview()));
    }

    #[tokio::test]
    async fn unmounted_handle_is_noop() {
        let stage = Stage::new();
        let handle = mount(&stage, &CardModel::lyric());
        assert!(stage.is_mounted(handle));
        assert!(stage.unmount(handle));
        assert!(!stage.is_mounted(handle));

        let backend = Recording::default();
        let seen = backend.seen.clone();
        let engine = ExportEngine::new(backend, stage);
        assert!(engine.export(handle).await.unwrap().is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn png_encode_rejects_mismatched_buffer() {
        assert!(encode_png(2, 2, vec![0; 3]).is_err());
        assert!(encode_png(1, 1, vec![0; 4]).is_ok());
    }
}
