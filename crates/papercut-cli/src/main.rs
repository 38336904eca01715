//! papercut: turn a silhouette photograph into a printable papercut
//! stencil.
//!
//! Three subcommands:
//!
//! - `panel` runs the full tool: mask extraction, white-on-gray panel
//!   composition, tiling onto an A4 grid and one SVG page per tile.
//! - `mask` writes only the final bilevel mask.
//! - `bridge` thickens connections narrower than a minimum bridge width
//!   in a mask that was saved earlier.
//!
//! # Usage
//!
//! ```text
//! papercut panel fox.jpg -o out/fox --cols 3 --rows 4 --overlap-mm 5
//! papercut mask fox.jpg -o fox_mask.png --invert-mode keep
//! papercut bridge fox_mask.png -o fox_bridged.png --min-bridge-mm 1.5
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::error::Error as _;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use papercut_export::{ExportError, PageMetadata};
use papercut_pipeline::diagnostics::Clock;
use papercut_pipeline::{
    BinaryMask, BridgeParams, FillStrategyKind, FitMode, InvertMode, MaskOutput,
    MorphologyParams, NormalizationParams, PanelConfig, PanelLayout, PipelineConfig,
    PipelineError, ThresholdPair, units,
};
use tracing_subscriber::EnvFilter;

/// Papercut stencil builder: photo in, mask, panel tiles and printable
/// A4 pages out.
#[derive(Parser)]
#[command(name = "papercut", version)]
struct Cli {
    /// Log debug details (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the mask, compose the panel, and write tiles and pages.
    Panel(PanelArgs),
    /// Write only the final bilevel mask.
    Mask(MaskArgs),
    /// Thicken thin bridges in a saved mask.
    Bridge(BridgeArgs),
}

#[derive(Args)]
struct PanelArgs {
    /// Input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output base name, without extension. Defaults to the input path
    /// without its extension.
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Skip the SVG pages.
    #[arg(long)]
    no_pages: bool,

    /// Also write the whole panel as `<BASE>_panel.png`.
    #[arg(long)]
    debug_panel: bool,

    /// Also write intermediate masks as `<BASE>_debug_<name>.png`.
    #[arg(long)]
    debug_masks: bool,

    /// Print per-stage timing and pixel counts.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a report.
    #[arg(long, requires = "diagnostics")]
    json: bool,
}

#[derive(Args)]
struct MaskArgs {
    /// Input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output PNG path.
    #[arg(long, short)]
    output: PathBuf,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args)]
struct BridgeArgs {
    /// Mask PNG; pixels above 127 are paper.
    input: PathBuf,

    /// Output PNG path.
    #[arg(long, short)]
    output: PathBuf,

    /// Resolution of the mask.
    #[arg(long, default_value_t = 300, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    dpi: u32,

    /// Narrowest paper connection that survives cutting, in mm.
    #[arg(long, default_value_t = 1.2)]
    min_bridge_mm: f64,
}

/// Segmentation tuning shared by `panel` and `mask`.
#[derive(Args)]
struct TuningArgs {
    /// Background threshold: darker pixels are background (0-255).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_BG)]
    threshold: u8,

    /// How far below `--threshold` interior details are cut.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DETAIL_DELTA)]
    detail_delta: u8,

    /// Gaussian blur sigma before thresholding.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR)]
    blur: f32,

    /// Closing radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DILATE_PX)]
    dilate_px: u32,

    /// Extra closing radius bridging dotted interior details.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DETAIL_JOIN_PX)]
    detail_join_px: u32,

    /// Edge smoothing radius in pixels (scaled with the panel).
    #[arg(long, alias = "antialias-radius", default_value_t = PipelineConfig::DEFAULT_ANTIALIAS)]
    antialias: f32,

    /// Silhouette/background polarity.
    #[arg(long, value_enum, default_value_t = Invert::Auto)]
    invert_mode: Invert,

    /// Always invert (same as `--invert-mode flip`).
    #[arg(long, alias = "flip-silhouette")]
    flip: bool,

    /// Target resolution for source normalization (0 ignores DPI).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NORMALIZE_DPI)]
    normalize_dpi: f64,

    /// Minimum normalization upscale factor.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NORMALIZE_SCALE)]
    normalize_scale: f64,

    /// Normalization blur radius before adaptive scaling.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NORMALIZE_BLUR)]
    normalize_blur: f32,

    /// Normalization preset: `noblur` forces zero blur, `off` skips
    /// normalization.
    #[arg(long, value_enum, default_value_t = NormalizePreset::Default)]
    normalize_preset: NormalizePreset,

    /// Source resolution in DPI, when known.
    #[arg(long)]
    source_dpi: Option<f64>,

    /// Flood-fill implementation.
    #[arg(long, value_enum, default_value_t = Fill::Labelling)]
    fill_strategy: Fill,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other tuning flags except `--source-dpi` are
    /// ignored. The JSON must be a valid `PipelineConfig` serialization;
    /// missing fields take their defaults.
    #[arg(long, conflicts_with = "config")]
    config_json: Option<String>,

    /// Full pipeline config read from a JSON file (see `--config-json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Page grid and composition flags for `panel`.
#[derive(Args)]
struct LayoutArgs {
    /// Resolution of the panel and pages.
    #[arg(long, default_value_t = PanelLayout::DEFAULT_DPI, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    dpi: u32,

    /// Page columns.
    #[arg(long, default_value_t = PanelLayout::DEFAULT_COLS)]
    cols: u32,

    /// Page rows.
    #[arg(long, default_value_t = PanelLayout::DEFAULT_ROWS)]
    rows: u32,

    /// Print margin on each page side, in mm.
    #[arg(long, default_value_t = PanelLayout::DEFAULT_MARGIN_MM)]
    margin_mm: f64,

    /// Strip shared by neighbouring pages, in mm.
    #[arg(long, default_value_t = 0.0)]
    overlap_mm: f64,

    /// How the silhouette is sized into the panel.
    #[arg(long, alias = "fit-mode", value_enum, default_value_t = Fit::Fit)]
    fit: Fit,

    /// Horizontal content shift in mm (positive = right).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    shift_x_mm: f64,

    /// Vertical content shift in mm (positive = down).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    shift_y_mm: f64,

    /// Background color: `#RRGGBB` or a gray level 0-255.
    #[arg(long, default_value = "#8E8E8E", value_parser = parse_bg_color)]
    bg_gray: [u8; 3],
}

#[derive(Clone, Copy, ValueEnum)]
enum Invert {
    /// Decide from the image.
    Auto,
    /// Never invert.
    Keep,
    /// Always invert.
    Flip,
}

#[derive(Clone, Copy, ValueEnum)]
enum NormalizePreset {
    /// Adaptive upscale and blur.
    Default,
    /// Upscale only.
    Noblur,
    /// No normalization.
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
enum Fill {
    /// Connected-component labelling.
    Labelling,
    /// Queue-based flood fill.
    BreadthFirst,
}

#[derive(Clone, Copy, ValueEnum)]
enum Fit {
    /// Whole silhouette visible.
    Fit,
    /// Panel fully covered, silhouette cropped.
    Fill,
    /// Exact panel size, aspect ratio ignored.
    Stretch,
}

/// Errors reported by the command-line tool.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Reading or writing a file failed.
    #[error("cannot access {}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// `--config-json` or `--config` is not a valid config.
    #[error("invalid pipeline config JSON")]
    Config(#[source] serde_json::Error),

    /// Diagnostics could not be serialized.
    #[error("cannot serialize diagnostics")]
    Diagnostics(#[source] serde_json::Error),

    /// The mask pipeline or panel composition failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Encoding an output failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Parse `#RRGGBB`, `RRGGBB` or a single gray level.
fn parse_bg_color(s: &str) -> Result<[u8; 3], String> {
    let s = s.trim();
    if let Ok(level) = s.parse::<u8>() {
        return Ok([level; 3]);
    }
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected #RRGGBB or 0-255, got '{s}'"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color '{s}': {e}"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Build a [`PipelineConfig`] from the tuning flags.
///
/// `--config-json` and `--config` replace every tuning flag.
fn config_from_cli(args: &TuningArgs) -> Result<PipelineConfig, CliError> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(CliError::Config);
    }
    if let Some(ref path) = args.config {
        let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
        return serde_json::from_str(&json).map_err(CliError::Config);
    }

    let normalization = match args.normalize_preset {
        NormalizePreset::Off => NormalizationParams::disabled(),
        NormalizePreset::Default | NormalizePreset::Noblur => NormalizationParams {
            target_dpi: args.normalize_dpi,
            min_upscale: args.normalize_scale,
            blur_radius: if matches!(args.normalize_preset, NormalizePreset::Noblur) {
                0.0
            } else {
                args.normalize_blur
            },
        },
    };

    let invert_mode = if args.flip {
        InvertMode::Flip
    } else {
        match args.invert_mode {
            Invert::Auto => InvertMode::Auto,
            Invert::Keep => InvertMode::Keep,
            Invert::Flip => InvertMode::Flip,
        }
    };

    Ok(PipelineConfig {
        thresholds: ThresholdPair::from_delta(args.threshold, args.detail_delta),
        blur: args.blur,
        morphology: MorphologyParams {
            dilate_px: args.dilate_px,
            detail_join_px: args.detail_join_px,
            antialias: args.antialias,
        },
        normalization,
        invert_mode,
        fill_strategy: match args.fill_strategy {
            Fill::Labelling => FillStrategyKind::Labelling,
            Fill::BreadthFirst => FillStrategyKind::BreadthFirst,
        },
        ..PipelineConfig::default()
    })
}

fn panel_config_from_cli(args: &LayoutArgs) -> PanelConfig {
    PanelConfig {
        layout: PanelLayout {
            dpi: args.dpi,
            cols: args.cols,
            rows: args.rows,
            margin_mm: args.margin_mm,
            overlap_mm: args.overlap_mm,
        },
        fit: match args.fit {
            Fit::Fit => FitMode::Fit,
            Fit::Fill => FitMode::Fill,
            Fit::Stretch => FitMode::Stretch,
        },
        shift_x_mm: args.shift_x_mm,
        shift_y_mm: args.shift_y_mm,
        background: args.bg_gray,
    }
}

/// `<base><suffix>`, e.g. `out/fox` + `_mask.png`.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Run the mask pipeline, with timing when asked.
fn run_pipeline(
    bytes: &[u8],
    config: &PipelineConfig,
    source_dpi: Option<f64>,
    diagnostics: Option<bool>,
) -> Result<MaskOutput, CliError> {
    let source_dpi = source_dpi.map(|d| (d, d));
    let Some(json) = diagnostics else {
        return Ok(papercut_pipeline::process_with_source_dpi(
            bytes, config, source_dpi,
        )?);
    };
    let (output, diag) =
        papercut_pipeline::process_with_diagnostics(bytes, config, source_dpi, &StdClock)?;
    if json {
        let text = serde_json::to_string_pretty(&diag).map_err(CliError::Diagnostics)?;
        println!("{text}");
    } else {
        println!("{}", diag.report());
    }
    Ok(output)
}

fn run_panel(args: &PanelArgs) -> Result<(), CliError> {
    let config = config_from_cli(&args.tuning)?;
    let panel_config = panel_config_from_cli(&args.layout);
    // Fail on an unusable grid before doing any image work.
    panel_config.validate()?;
    let layout = panel_config.layout;

    let base = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(""));

    tracing::info!(input = %args.input.display(), "loading image");
    let bytes = read_file(&args.input)?;
    let output = run_pipeline(
        &bytes,
        &config,
        args.tuning.source_dpi,
        args.diagnostics.then_some(args.json),
    )?;

    let mask_path = with_suffix(&base, "_mask.png");
    let mask = output.final_mask();
    write_file(&mask_path, &papercut_export::encode_png_gray(mask.as_gray())?)?;
    println!("Mask: {}", mask_path.display());

    let original = papercut_pipeline::render_preview(
        &output.masks.paper,
        output.antialias,
        panel_config.background,
    );
    let original_path = with_suffix(&base, "_original.png");
    write_file(&original_path, &papercut_export::encode_png_rgb(&original)?)?;
    println!("Original-size PNG: {}", original_path.display());

    if args.debug_masks {
        write_debug_masks(&base, &output)?;
    }

    let panel = papercut_pipeline::compose_panel(&output.processed, &config, &panel_config)?;
    if args.debug_panel {
        let panel_path = with_suffix(&base, "_panel.png");
        write_file(&panel_path, &papercut_export::encode_png_rgb(&panel.image)?)?;
        println!("Debug panel: {}", panel_path.display());
    }

    tracing::info!(count = layout.page_count(), "slicing panel into tiles");
    let tiles = papercut_export::slice_panel(&panel.image, &layout)?;
    let title = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("papercut");
    let description = format!(
        "{}x{} A4 pages at {} dpi, margin {} mm, overlap {} mm",
        layout.cols, layout.rows, layout.dpi, layout.margin_mm, layout.overlap_mm
    );
    let metadata = PageMetadata {
        title: Some(title),
        description: Some(&description),
    };
    for tile in &tiles {
        let png = papercut_export::encode_png_rgb(&tile.image)?;
        let page = tile.rect.page;
        write_file(&with_suffix(&base, &format!("_tile_{page}.png")), &png)?;
        if !args.no_pages {
            let svg = papercut_export::tile_page_svg(tile, &png, &layout, &metadata);
            write_file(&with_suffix(&base, &format!("_page_{page}.svg")), svg.as_bytes())?;
        }
    }
    println!(
        "Tiles: {} ({})",
        tiles.len(),
        with_suffix(&base, "_tile_<n>.png").display()
    );
    if !args.no_pages {
        println!(
            "Pages: {} ({})",
            tiles.len(),
            with_suffix(&base, "_page_<n>.svg").display()
        );
    }

    print_summary(&config, &panel_config, output.flipped);
    Ok(())
}

fn write_debug_masks(base: &Path, output: &MaskOutput) -> Result<(), CliError> {
    let masks = &output.masks;
    let named: [(&str, &BinaryMask); 4] = [
        ("paper", &masks.paper),
        ("filled", &masks.filled),
        ("holes", &masks.holes),
        ("outline", &masks.outline),
    ];
    for (name, mask) in named {
        let path = with_suffix(base, &format!("_debug_{name}.png"));
        write_file(&path, &papercut_export::encode_png_gray(mask.as_gray())?)?;
    }
    for (name, gray) in [("normalized", &output.normalized), ("processed", &output.processed)] {
        let path = with_suffix(base, &format!("_debug_{name}.png"));
        write_file(&path, &papercut_export::encode_png_gray(gray)?)?;
    }
    println!("Debug masks: {}", with_suffix(base, "_debug_<name>.png").display());
    Ok(())
}

fn print_summary(config: &PipelineConfig, panel: &PanelConfig, flipped: bool) {
    let layout = &panel.layout;
    let thresholds = config.thresholds.corrected();
    let invert = match config.invert_mode {
        InvertMode::Auto if flipped => "auto->flip".to_string(),
        InvertMode::Auto => "auto->keep".to_string(),
        mode => mode.to_string(),
    };
    println!(
        "DPI={}, margin={} mm, shift={}x{} mm, threshold_bg={}, threshold_detail={}, blur={}, dilate={}px, invert={invert}",
        layout.dpi,
        layout.margin_mm,
        panel.shift_x_mm,
        panel.shift_y_mm,
        thresholds.background,
        thresholds.detail,
        config.blur,
        config.morphology.dilate_px,
    );
    println!(
        "Rule of thumb: min bridge ~2.0 mm (~{}px); hard min ~1.4 mm (~{}px).",
        units::mm_to_px(2.0, layout.dpi),
        units::mm_to_px(1.4, layout.dpi),
    );
    println!("Adjust --shift-x-mm/--shift-y-mm if a seam hits a thin detail.");
}

fn run_mask(args: &MaskArgs) -> Result<(), CliError> {
    let config = config_from_cli(&args.tuning)?;
    let bytes = read_file(&args.input)?;
    let output = run_pipeline(&bytes, &config, args.tuning.source_dpi, None)?;
    let mask = output.final_mask();
    write_file(&args.output, &papercut_export::encode_png_gray(mask.as_gray())?)?;
    println!(
        "Mask: {} ({}x{}, paper {:.1}%, flipped: {})",
        args.output.display(),
        output.dimensions.width,
        output.dimensions.height,
        mask.ratio() * 100.0,
        output.flipped,
    );
    Ok(())
}

fn run_bridge(args: &BridgeArgs) -> Result<(), CliError> {
    let bytes = read_file(&args.input)?;
    let gray = papercut_pipeline::grayscale::decode_and_grayscale(&bytes)?;
    let mask = BinaryMask::from_gray(&gray);
    let params = BridgeParams {
        dpi: args.dpi,
        min_bridge_mm: args.min_bridge_mm,
    };
    let outcome = papercut_pipeline::enforce_min_bridge(&mask, &params);
    write_file(
        &args.output,
        &papercut_export::encode_png_gray(outcome.mask.as_gray())?,
    )?;
    println!(
        "Bridged mask: {} (min bridge {} mm = {} px, thin pixels {}, {})",
        args.output.display(),
        args.min_bridge_mm,
        params.min_bridge_px(),
        outcome.thin_pixels,
        if outcome.reinforced {
            "reinforced"
        } else {
            "unchanged"
        },
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Panel(args) => run_panel(args),
        Command::Mask(args) => run_mask(args),
        Command::Bridge(args) => run_bridge(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
