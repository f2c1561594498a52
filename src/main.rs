use anyhow::{bail, Context, Result};
use bokeh::refine::mask_to_gray;
use bokeh::{BackgroundBlur, BlurLevel, FixedMask, MaskPolarity, RefineConfig, SegmentationModel};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image (any format the image crate can decode)
    input: PathBuf,

    /// Output image path, defaults to <input stem>_blurred.png
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Background blur intensity
    #[arg(short, long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(0..=30))]
    blur_level: u32,

    /// Path to segmentation model (ONNX file)
    #[arg(long, conflicts_with = "mask", required_unless_present = "mask")]
    model: Option<PathBuf>,

    /// Model inference resolution (square)
    #[arg(long, default_value_t = 512)]
    model_size: u32,

    /// Index of the model output holding the matte
    #[arg(long, default_value_t = 0)]
    output_index: usize,

    /// Pre-computed grayscale mask to use instead of a model
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Only use the segment with this label
    #[arg(long)]
    label: Option<String>,

    /// Mask values strictly above this count as foreground
    #[arg(long, default_value_t = 128)]
    threshold: u8,

    /// Edge smoothing strength (Gaussian sigma in pixels)
    #[arg(long, default_value_t = 0.5)]
    edge_sigma: f32,

    /// The mask marks the foreground with low values
    #[arg(long)]
    invert_mask: bool,

    /// Also write the refined mask to this path
    #[arg(long)]
    save_mask: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let image = image::open(&args.input)
        .with_context(|| format!("Failed to open image {}", args.input.display()))?
        .to_rgb8();
    tracing::info!(
        "Loaded {} ({}x{})",
        args.input.display(),
        image.width(),
        image.height()
    );

    let polarity = if args.invert_mask {
        MaskPolarity::ForegroundLow
    } else {
        MaskPolarity::ForegroundHigh
    };
    let model = load_model(&args, polarity)?;

    let mut pipeline = BackgroundBlur::new(model).with_refine_config(RefineConfig {
        threshold: args.threshold,
        edge_sigma: args.edge_sigma,
    });
    if let Some(label) = &args.label {
        pipeline = pipeline.with_label(label.clone());
    }

    let level = BlurLevel::new(args.blur_level)?;

    let start = Instant::now();
    let (output, refined) = match pipeline.process_with_mask(&image, level) {
        Ok(result) => result,
        Err(failure) => bail!("Error: {}", failure.diagnostic()),
    };
    tracing::info!(
        "Blurred background at level {} in {:.1}ms",
        level,
        start.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(mask_path) = &args.save_mask {
        mask_to_gray(&refined)
            .save(mask_path)
            .with_context(|| format!("Failed to write mask {}", mask_path.display()))?;
        tracing::info!("Refined mask written to {}", mask_path.display());
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    output
        .save(&output_path)
        .with_context(|| format!("Failed to write image {}", output_path.display()))?;
    tracing::info!("Wrote {}", output_path.display());

    Ok(())
}

fn load_model(args: &Args, polarity: MaskPolarity) -> Result<Box<dyn SegmentationModel>> {
    if let Some(mask_path) = &args.mask {
        tracing::info!("Using pre-computed mask {}", mask_path.display());
        let mask = image::open(mask_path)
            .with_context(|| format!("Failed to open mask {}", mask_path.display()))?;
        let model = FixedMask::new(mask.to_luma8().into())
            .with_polarity(polarity)
            .fit_to_frame();
        return Ok(Box::new(model));
    }

    let Some(model_path) = &args.model else {
        bail!("either --model or --mask is required");
    };
    load_onnx_model(model_path, args.model_size, args.output_index, polarity)
}

#[cfg(feature = "onnx")]
fn load_onnx_model(
    path: &Path,
    input_size: u32,
    output_index: usize,
    polarity: MaskPolarity,
) -> Result<Box<dyn SegmentationModel>> {
    let model = bokeh::segmentation::OnnxSegmenter::new(path, input_size)
        .context("Failed to load segmentation model")?
        .with_output_index(output_index)
        .with_polarity(polarity);
    Ok(Box::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_model(
    path: &Path,
    _input_size: u32,
    _output_index: usize,
    _polarity: MaskPolarity,
) -> Result<Box<dyn SegmentationModel>> {
    bail!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    )
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    input.with_file_name(format!("{stem}_blurred.png"))
}
