//! Pinshot CLI
//!
//! Opens a page in Chromium and runs one capture against it.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pinshot::browser::{BrowserController, CdpInteractions, CdpResultsView};
use pinshot::output::screenshot_filename;
use pinshot::{
    CaptureMode, CaptureOutcome, CapturedImage, DownloadDir, ImageExporter, ImageFormat,
    InteractionSource, OutputSink, Pinshot, PinshotConfig, Point, Rect, ScriptedInteractions,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Web page region capture, pinning and full-page screenshots
#[derive(Parser, Debug)]
#[command(name = "pinshot")]
#[command(version)]
#[command(about = "Capture, pin and stitch web page screenshots")]
struct Args {
    /// Page to capture
    url: String,

    #[command(subcommand)]
    command: Command,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory saves land in
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select a region and save it
    Save {
        /// Select `LEFT,TOP,WIDTH,HEIGHT` instead of waiting for the mouse
        #[arg(long, value_parser = parse_region)]
        region: Option<Rect>,
    },
    /// Select a region and pin it on the page
    Pin {
        /// Select `LEFT,TOP,WIDTH,HEIGHT` instead of waiting for the mouse
        #[arg(long, value_parser = parse_region)]
        region: Option<Rect>,

        /// Stop listening for widget input after this many idle seconds
        #[arg(long, default_value = "300")]
        idle_timeout: u64,
    },
    /// Capture the whole page
    Fullpage {
        /// Also export as png, jpeg or pdf (repeatable)
        #[arg(long = "export")]
        exports: Vec<ImageFormat>,
    },
}

fn parse_region(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("expected LEFT,TOP,WIDTH,HEIGHT: {}", e))?;

    match parts[..] {
        [left, top, width, height] if width > 0 && height > 0 => Ok(Rect::new(
            i32::try_from(left).map_err(|e| e.to_string())?,
            i32::try_from(top).map_err(|e| e.to_string())?,
            u32::try_from(width).map_err(|e| e.to_string())?,
            u32::try_from(height).map_err(|e| e.to_string())?,
        )),
        [_, _, _, _] => Err("width and height must be positive".to_string()),
        _ => Err("expected LEFT,TOP,WIDTH,HEIGHT".to_string()),
    }
}

fn scripted_drag(region: &Rect) -> ScriptedInteractions {
    let from = region.origin();
    let to = Point::new(
        region.left + region.width as i32,
        region.top + region.height as i32,
    );
    ScriptedInteractions::drag(from, to)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "pinshot=debug,info"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let mut config = PinshotConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.output.clone() {
        config.output_dir = dir;
    }
    if let Some(path) = args.chrome_path.clone() {
        config.browser.chrome_path = Some(path);
    }
    if args.headed {
        config.browser.headless = false;
    }

    let mode = match args.command {
        Command::Save { .. } => CaptureMode::Save,
        Command::Pin { .. } => CaptureMode::Pin,
        Command::Fullpage { .. } => CaptureMode::FullPage,
    };
    let region = match &args.command {
        Command::Save { region } | Command::Pin { region, .. } => *region,
        Command::Fullpage { .. } => None,
    };
    if mode != CaptureMode::FullPage && region.is_none() && config.browser.headless {
        bail!("interactive selection needs --headed, or pass --region");
    }

    info!("Pinshot {} starting", pinshot::VERSION);

    let controller = BrowserController::with_config(config.browser.clone())
        .await
        .context("launching browser")?;

    let result = run(&controller, &args, &config, mode, region).await;

    if let Err(e) = controller.close().await {
        warn!("Browser did not close cleanly: {}", e);
    }
    result
}

async fn run(
    controller: &BrowserController,
    args: &Args,
    config: &PinshotConfig,
    mode: CaptureMode,
    region: Option<Rect>,
) -> anyhow::Result<()> {
    let page = controller
        .navigate(&args.url)
        .await
        .with_context(|| format!("opening {}", args.url))?;

    let live = CdpInteractions::attach(&page).await?;
    let agent = controller.agent(&page);
    agent.install().await?;

    let downloads = DownloadDir::new(&config.output_dir);
    let results = Arc::new(CdpResultsView::new(
        controller.new_page().await?,
        downloads.clone(),
    ));

    let pinshot = Pinshot::new(
        Arc::new(agent.clone()),
        agent.session(),
        results.clone(),
        config.clone(),
    );

    let mut events: Box<dyn InteractionSource> = match (&args.command, region) {
        (_, Some(region)) => Box::new(scripted_drag(&region)),
        (Command::Pin { idle_timeout, .. }, None) => {
            Box::new(live.with_idle_timeout(Duration::from_secs(*idle_timeout)))
        }
        (_, None) => Box::new(live),
    };

    let outcome = pinshot.run(mode, events.as_mut()).await?;

    match &outcome {
        CaptureOutcome::Saved(path) => println!("{}", path.display()),
        CaptureOutcome::FullPage {
            path,
            width,
            height,
            slices,
        } => {
            println!("{}", path.display());
            info!("{}x{} from {} slices", width, height, slices);

            if let Command::Fullpage { exports } = &args.command {
                export_all(path, exports, config, &downloads, results.as_ref()).await?;
            }
        }
        CaptureOutcome::Pinned | CaptureOutcome::Closed => info!(?outcome, "Pin finished"),
        CaptureOutcome::Cancelled | CaptureOutcome::Discarded => {
            info!(?outcome, "Nothing captured")
        }
        CaptureOutcome::Superseded => warn!("Capture ended early: the page navigated"),
    }

    Ok(())
}

async fn export_all(
    source: &std::path::Path,
    formats: &[ImageFormat],
    config: &PinshotConfig,
    downloads: &DownloadDir,
    results: &CdpResultsView,
) -> anyhow::Result<()> {
    if formats.is_empty() {
        return Ok(());
    }

    let data = tokio::fs::read(source)
        .await
        .with_context(|| format!("reading {}", source.display()))?;
    let image = CapturedImage::from_png(data)?;
    let exporter = ImageExporter::new()
        .jpeg_quality(config.jpeg_quality)
        .with_pdf(results);

    for &format in formats {
        let exported = exporter.export(&image, format).await?;
        let path = downloads
            .save(&exported, &screenshot_filename(Utc::now(), format))
            .await?;
        println!("{}", path.display());
    }
    Ok(())
}
