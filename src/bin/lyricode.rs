use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lyricode::{
    AssetCompressor, BackgroundRenderer, CardKind, CardModel, CommunitySync, Compression,
    CompositionRenderer, CpuRasterizer, EditingSession, ExportEngine, FontBook, FsObjectStore,
    FsRecordStore, GradientId, Settings, Stage,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lyricode", version)]
struct Cli {
    /// Settings JSON; `LYRICODE_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local store directory (objects + records).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); `LYRICODE_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress an image the way uploads are compressed.
    Compress(CompressArgs),
    /// Render a card JSON to PNG.
    Render(RenderArgs),
    /// Render a card and publish it to the community store.
    Publish(PublishArgs),
    /// List community entries.
    Feed,
    /// Like a community entry.
    Like {
        id: String,
    },
    /// Save a community entry's background image.
    Download {
        id: String,
        /// Output directory.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct CompressArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output file; defaults to printing the outcome only.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Override the size budget in KB.
    #[arg(long)]
    max_kb: Option<u32>,
}

#[derive(Parser, Debug)]
struct CardArgs {
    /// Card JSON (a serialized card model).
    #[arg(long)]
    card: PathBuf,

    /// Image file to use as background.
    #[arg(long, conflicts_with = "gradient")]
    background: Option<PathBuf>,

    /// Palette gradient to use as background (mesh1..mesh4).
    #[arg(long)]
    gradient: Option<GradientId>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    card: CardArgs,

    /// Output directory; the file name follows the card.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct PublishArgs {
    #[command(flatten)]
    card: CardArgs,

    #[arg(long)]
    creator: String,
}

type FsSession = EditingSession<CpuRasterizer, FsObjectStore, FsRecordStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    match cli.cmd {
        Command::Compress(args) => cmd_compress(&settings, args),
        Command::Render(args) => cmd_render(&settings, args).await,
        Command::Publish(args) => cmd_publish(&settings, args).await,
        Command::Feed => cmd_feed(&settings).await,
        Command::Like { id } => cmd_like(&settings, &id).await,
        Command::Download { id, out_dir } => cmd_download(&settings, &id, &out_dir).await,
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn,lyricode=info",
        1 => "warn,lyricode=debug",
        _ => "info,lyricode=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LYRICODE_LOG")
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cmd_compress(settings: &Settings, args: CompressArgs) -> anyhow::Result<()> {
    let raw = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let compressor = AssetCompressor::new(settings.compress);
    let budget = args.max_kb.unwrap_or(settings.compress.max_size_kb);

    let encoded = match compressor.compress(&raw, budget) {
        Compression::Fits(c) => {
            eprintln!(
                "compressed to {}x{}, {:.1} KB",
                c.width,
                c.height,
                c.image.size_kb()
            );
            c.image
        }
        Compression::Degrade(reason) => {
            eprintln!("keeping original: {reason:?}");
            lyricode::EncodedImage::sniff(&raw)
        }
    };

    if let Some(out) = args.out {
        std::fs::write(&out, encoded.decode_bytes()?)
            .with_context(|| format!("write '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

async fn community(
    settings: &Settings,
) -> anyhow::Result<Arc<CommunitySync<FsObjectStore, FsRecordStore>>> {
    let objects = FsObjectStore::new(settings.data_dir.join("objects")).await?;
    let records = FsRecordStore::new(settings.data_dir.join("records.json"));
    Ok(Arc::new(CommunitySync::new(
        Arc::new(objects),
        Arc::new(records),
    )))
}

async fn open_session(settings: &Settings, args: &CardArgs) -> anyhow::Result<FsSession> {
    let raw = std::fs::read_to_string(&args.card)
        .with_context(|| format!("read card '{}'", args.card.display()))?;
    let card: CardModel = serde_json::from_str(&raw).with_context(|| "parse card JSON")?;

    let fonts = FontBook::load(settings.sans_font.as_deref(), settings.mono_font.as_deref())?;
    if fonts.is_empty() {
        tracing::warn!("no fonts configured (LYRICODE_SANS_FONT), cards render without text");
    }
    let size = f64::from(settings.export.card_size);
    let exporter = ExportEngine::new(
        CpuRasterizer::new(fonts),
        Stage::new(),
    )
    .with_scale(settings.export.scale)
    .with_card_size(size);

    let mut session = EditingSession::new(
        CardKind::Lyric,
        AssetCompressor::new(settings.compress),
        BackgroundRenderer::new(settings.blur_sigma),
        CompositionRenderer::new(size),
        exporter,
        community(settings).await?,
    );
    session.load(card).await?;

    if let Some(path) = &args.background {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        session.upload(bytes).await?;
    } else if let Some(id) = args.gradient {
        session.choose_gradient(id);
    }
    Ok(session)
}

async fn cmd_render(settings: &Settings, args: RenderArgs) -> anyhow::Result<()> {
    let session = open_session(settings, &args.card).await?;
    let Some(out) = session.download().await? else {
        anyhow::bail!("card has nothing to export (set a title or lyrics)");
    };

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let path = args.out_dir.join(&out.filename);
    std::fs::write(&path, &out.png).with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {} ({}x{})", path.display(), out.width, out.height);
    Ok(())
}

async fn cmd_publish(settings: &Settings, args: PublishArgs) -> anyhow::Result<()> {
    let mut session = open_session(settings, &args.card).await?;
    let id = session.publish(&args.creator).await?;
    println!("{id}");
    Ok(())
}

async fn cmd_feed(settings: &Settings) -> anyhow::Result<()> {
    let community = community(settings).await?;
    for card in community.feed().await?.iter() {
        let e = &card.entry;
        let label = match &e.content {
            lyricode::CardContent::Lyric(f) => format!("{} - {}", f.title, f.artist),
            lyricode::CardContent::Code(f) => format!("<{}>", f.language),
        };
        println!(
            "{}\t{}\t{} likes\tby {}\t{}",
            e.id,
            label,
            e.like_count,
            e.creator_name,
            card.background_url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_like(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let community = community(settings).await?;
    let count = community.like(id).await?;
    if count == 0 {
        anyhow::bail!("no entry '{id}'");
    }
    println!("{count}");
    Ok(())
}

async fn cmd_download(settings: &Settings, id: &str, out_dir: &Path) -> anyhow::Result<()> {
    let objects = FsObjectStore::new(settings.data_dir.join("objects")).await?;
    let community = community(settings).await?;
    let feed = community.list().await?;
    let entry = feed
        .iter()
        .find(|c| c.entry.id == id)
        .map(|c| &c.entry)
        .with_context(|| format!("no entry '{id}'"))?;

    let dl = community
        .download_background(entry)
        .await
        .with_context(|| format!("entry '{id}' has no downloadable background"))?;
    let src = objects
        .path_for_url(&dl.url)
        .with_context(|| format!("'{}' is not a local object", dl.url))?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir '{}'", out_dir.display()))?;
    let dest = out_dir.join(&dl.filename);
    std::fs::copy(&src, &dest).with_context(|| format!("copy to '{}'", dest.display()))?;
    eprintln!("wrote {}", dest.display());
    Ok(())
}
