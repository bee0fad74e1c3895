//! zentile CLI: batch-compress the PNG images in a directory.
//!
//! Output rasters keep the input dimensions; each is the flat-color region
//! reconstruction at the requested quality, re-encoded as PNG.

use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use zentile::{
    compress, compress_series, CompressConfig, CompressionResult, PixelGrid, QualityLevel,
    SplitMode,
};

/// Content-aware lossy PNG compression.
///
/// Compresses every PNG in INPUT_DIR into OUTPUT_DIR, painting each image
/// as a small set of flat-color rectangles chosen by entropy analysis.
#[derive(Parser, Debug)]
#[command(name = "zentile")]
#[command(version, about, long_about = None)]
#[command(after_help = "\
QUALITY:
    0.0 - 1.0   continuous scale (0.0 = heaviest compression)
    highest | high | medium | low | lowest
    Out-of-range or unrecognized values fall back to 0.5 with a warning.

EXAMPLES:
    zentile ./photos ./compressed
    zentile ./photos ./compressed 0.75
    zentile ./photos ./compressed high
    zentile ./photos ./compressed --series")]
struct Args {
    /// Directory containing input PNG images
    input_dir: PathBuf,

    /// Directory where compressed images are written (created if missing)
    output_dir: PathBuf,

    /// Compression quality: a decimal in [0.0, 1.0] or a named level
    quality: Option<String>,

    /// Probe a bounded set of split positions instead of every cut
    /// (faster on large images, may miss the best partition)
    #[arg(long)]
    sampled: bool,

    /// Write one output per named quality level instead of a single quality
    #[arg(long, conflicts_with = "quality")]
    series: bool,
}

#[derive(Debug, Clone, Copy)]
enum QualityArg {
    Score(f64),
    Level(QualityLevel),
}

impl QualityArg {
    fn suffix(self) -> String {
        match self {
            QualityArg::Score(score) => format!("{score:.2}"),
            QualityArg::Level(level) => level.name().to_string(),
        }
    }

    fn describe(self) -> String {
        match self {
            QualityArg::Score(score) => {
                format!("{score:.2} ({})", QualityLevel::from_score(score).name())
            }
            QualityArg::Level(level) => level.name().to_string(),
        }
    }

    fn config(self, split: SplitMode) -> CompressConfig {
        let config = CompressConfig::new().split(split);
        match self {
            QualityArg::Score(score) => config.quality_score(score),
            QualityArg::Level(level) => config.quality_level(level),
        }
    }
}

fn parse_quality(raw: &str) -> QualityArg {
    if let Ok(value) = raw.parse::<f64>() {
        if (0.0..=1.0).contains(&value) {
            return QualityArg::Score(value);
        }
        eprintln!("warning: quality {value} out of range [0.0, 1.0], using 0.5");
        return QualityArg::Score(0.5);
    }
    match raw {
        "highest" => QualityArg::Level(QualityLevel::Highest),
        "high" => QualityArg::Level(QualityLevel::High),
        "medium" => QualityArg::Level(QualityLevel::Medium),
        "low" => QualityArg::Level(QualityLevel::Low),
        "lowest" => QualityArg::Level(QualityLevel::Lowest),
        _ => {
            eprintln!("warning: unknown quality '{raw}', using 0.5");
            QualityArg::Score(0.5)
        }
    }
}

fn find_png_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if !dir.is_dir() {
        return Err(format!("input directory does not exist: {}", dir.display()).into());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if path.is_file() && is_png {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode_png(path: &Path) -> Result<PixelGrid, Box<dyn Error>> {
    let img = image::open(path)?.to_rgba8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    let pixels: Vec<rgb::RGBA<u8>> = img
        .pixels()
        .map(|p| rgb::RGBA {
            r: p.0[0],
            g: p.0[1],
            b: p.0[2],
            a: p.0[3],
        })
        .collect();
    Ok(PixelGrid::from_rgba(&pixels, width, height)?)
}

fn encode_png(path: &Path, grid: &PixelGrid) -> Result<(), Box<dyn Error>> {
    let file = fs::File::create(path)?;
    let buf = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(buf, grid.width() as u32, grid.height() as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let bytes: Vec<u8> = grid
        .to_rgba()
        .iter()
        .flat_map(|p| [p.r, p.g, p.b, p.a])
        .collect();

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bytes)?;
    writer.finish()?;
    Ok(())
}

/// Per-file work: decode, compress (once or per level), encode.
/// Returns the results so the batch summary can aggregate them.
fn process_file(
    input: &Path,
    output_dir: &Path,
    quality: QualityArg,
    series: bool,
    split: SplitMode,
) -> Result<Vec<CompressionResult>, Box<dyn Error>> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let grid = decode_png(input)?;

    let mut outputs = Vec::new();
    if series {
        for (level, result) in compress_series(&grid)? {
            let output = output_dir.join(format!("{stem}_q{}.png", level.name()));
            encode_png(&output, &result.image)?;
            outputs.push(result);
        }
    } else {
        let result = compress(&grid, &quality.config(split))?;
        let output = output_dir.join(format!("{stem}_q{}.png", quality.suffix()));
        encode_png(&output, &result.image)?;
        outputs.push(result);
    }
    Ok(outputs)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let quality = args
        .quality
        .as_deref()
        .map(parse_quality)
        .unwrap_or(QualityArg::Score(0.5));
    let split = if args.sampled {
        SplitMode::Sampled
    } else {
        SplitMode::Exhaustive
    };

    let inputs = find_png_files(&args.input_dir)?;
    if inputs.is_empty() {
        println!(
            "no PNG files found in input directory: {}",
            args.input_dir.display()
        );
        return Ok(());
    }

    if !args.output_dir.exists() {
        fs::create_dir_all(&args.output_dir)?;
        println!("created output directory: {}", args.output_dir.display());
    }

    println!("found {} PNG file(s) to compress", inputs.len());
    if args.series {
        println!("quality: series ({} levels)", QualityLevel::ALL.len());
    } else {
        println!("quality: {}", quality.describe());
    }
    println!("output directory: {}\n", args.output_dir.display());

    let mut processed = 0usize;
    let mut total_time = 0.0f64;
    let mut total_pixels = 0usize;
    let mut total_regions = 0usize;

    for input in &inputs {
        let name = input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        match process_file(input, &args.output_dir, quality, args.series, split) {
            Ok(results) => {
                processed += 1;
                for result in &results {
                    total_time += result.processing_time_seconds;
                    total_pixels += result.original_pixels;
                    total_regions += result.compressed_regions;
                }
                // With --series, report the batch's last (heaviest) pass.
                let last = &results[results.len() - 1];
                println!(
                    "{name}: ok ({:.1}% of pixels kept as regions, {:.2}s)",
                    last.compression_ratio * 100.0,
                    last.processing_time_seconds
                );
            }
            Err(err) => {
                println!("{name}: failed: {err}");
            }
        }
    }

    println!("\nfiles processed: {processed}/{}", inputs.len());
    println!("total processing time: {total_time:.2}s");
    if processed > 0 && total_pixels > 0 {
        println!(
            "average compression ratio: {:.1}%",
            total_regions as f64 / total_pixels as f64 * 100.0
        );
        println!(
            "average time per image: {:.2}s",
            total_time / processed as f64
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
