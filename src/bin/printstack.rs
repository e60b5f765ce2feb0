use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use printstack::{
    CompositeCache, CompositeKey, CompositeRequest, EngineConfig, FsImageLoader,
    ParleyTextRasterizer,
};

#[derive(Parser, Debug)]
#[command(name = "printstack", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a request and write the texture as a PNG.
    Render(RenderArgs),
    /// Print the cache key digest of a request.
    Key(KeyArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input request JSON. Image paths resolve relative to its directory.
    #[arg(long)]
    request: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Font file to register for text layers (repeatable).
    #[arg(long = "font")]
    fonts: Vec<PathBuf>,

    /// Log at debug level.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct KeyArgs {
    /// Input request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Engine config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Key(args) => cmd_key(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let cfg = match path {
        Some(p) => EngineConfig::from_json_path(p)?,
        None => EngineConfig::default(),
    };
    let cfg = cfg.with_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;
    let request = CompositeRequest::from_json_path(&args.request)?;
    let assets_root = args
        .request
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let text = ParleyTextRasterizer::new();
    for font in &args.fonts {
        let bytes =
            std::fs::read(font).with_context(|| format!("read font '{}'", font.display()))?;
        let families = text.register_font(bytes)?;
        tracing::debug!(font = %font.display(), ?families, "registered font");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let cache = CompositeCache::new(
        config,
        Arc::new(FsImageLoader::new(assets_root)),
        Arc::new(text),
    )?;
    let out = runtime.block_on(cache.render_uncached(&request))?;

    for warning in &out.warnings {
        eprintln!("warning: {warning}");
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    out.handle
        .to_rgba_image()?
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    out.handle.dispose();

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_key(args: KeyArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let request = CompositeRequest::from_json_path(&args.request)?;
    println!("{}", CompositeKey::for_request(&request, &config).digest_hex());
    Ok(())
}
