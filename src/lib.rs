//! Lyricode composes lyric and code snippet cards over image or gradient backgrounds.
//!
//! The pipeline is: an upload goes through the [`AssetCompressor`], the card's
//! [`BackgroundSpec`] becomes a [`PaintDescriptor`], [`CompositionRenderer`] lays the card out
//! as a [`RenderTree`], and [`ExportEngine`] captures a mounted tree to PNG. Published cards
//! live in a shared store reached through [`CommunitySync`].
#![forbid(unsafe_code)]

pub mod assets;
pub mod background;
pub mod blur_cpu;
pub mod card;
pub mod composite_cpu;
pub mod composition;
pub mod export;
pub mod foundation;
pub mod remote;
pub mod render;
pub mod session;

pub use assets::{
    PreparedImage,
    compress::{AssetCompressor, CompressedImage, Compression, DegradeReason},
    data_uri::EncodedImage,
};
pub use background::{
    BackgroundRenderer, GradientId, GradientPalette, LinearGradient, PaintDescriptor, Surface,
};
pub use card::{BackgroundSpec, CardContent, CardKind, CardModel, CodeFields, LyricFields};
pub use composition::{CompositionRenderer, Highlighter, NodeRole, PlainHighlighter, RenderTree};
pub use export::{ExportEngine, ExportedImage, RootHandle, Stage, export_filename};
pub use foundation::{
    config::Settings,
    core::{FrameRgba, Rgba8},
    error::{LyricodeError, LyricodeResult},
};
pub use remote::{
    AssetReference, AssetResolver, CommunityEntry, CommunitySync, FsObjectStore, FsRecordStore,
    MemoryObjectStore, MemoryRecordStore, ObjectStore, PublishedCard, RecordStore,
    StoredBackground,
};
pub use render::{BoxStyle, CaptureBackend, CpuRasterizer, FontBook};
pub use session::EditingSession;
