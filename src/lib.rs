#![forbid(unsafe_code)]

//! # zentile
//!
//! Content-aware lossy raster compression. An image is converted to HSLA,
//! carved into axis-aligned rectangles by an entropy-guided binary
//! partition tree, simplified by pruning visually uniform subtrees, and
//! painted back out one flat color per rectangle. Uniform areas collapse
//! into large regions; detailed areas stay finely subdivided.
//!
//! "Compression" here is measured in region count, not bytes: the output is
//! a full-resolution raster meant to be re-encoded by whatever container
//! the caller uses.
//!
//! ```
//! use zentile::{compress, CompressConfig, PixelGrid};
//!
//! # fn main() -> Result<(), zentile::CompressError> {
//! let pixels = vec![rgb::RGBA { r: 128, g: 128, b: 128, a: 255 }; 16];
//! let grid = PixelGrid::from_rgba(&pixels, 4, 4)?;
//!
//! let result = compress(&grid, &CompressConfig::new().quality_score(0.8))?;
//! assert_eq!(result.compressed_regions, 1); // uniform image, one region
//! assert_eq!(result.image.width(), 4);
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod error;
pub mod grid;
pub mod hsla;
pub mod stats;
pub mod tree;

pub use convert::{hsla_to_rgba, rgba_to_hsla};
pub use error::CompressError;
pub use grid::PixelGrid;
pub use hsla::{Hsla, SIMILARITY_THRESHOLD};
pub use stats::{ImageStats, Rect, HUE_BINS};
pub use tree::{PartitionTree, SplitMode};

use std::time::Instant;

/// The two knobs driving subtree pruning.
///
/// A subtree collapses into one region when at least `minimum_similarity`
/// of its leaf area lies within `color_tolerance`
/// ([`Hsla::component_distance`]) of the subtree's mean color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneConfig {
    /// Required similar-area fraction, in `[0, 1]`.
    pub minimum_similarity: f64,
    /// Color distance at or below which a leaf counts as similar.
    pub color_tolerance: f64,
}

impl PruneConfig {
    pub const fn new(minimum_similarity: f64, color_tolerance: f64) -> Self {
        Self {
            minimum_similarity,
            color_tolerance,
        }
    }

    /// Map a scalar quality score in `[0, 1]` to pruning knobs.
    ///
    /// Both curves are superlinear so neighboring scores stay visibly
    /// distinct: similarity rises as `q^1.5` from 0.85 to 0.995,
    /// tolerance falls as `(1 − q)²` from 0.30, floored at 0.005. Scores
    /// outside `[0, 1]` are clamped.
    pub fn for_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        let similarity = 0.85 + 0.145 * score.powf(1.5);
        let tolerance = (0.30 * (1.0 - score).powi(2)).max(0.005);
        Self::new(similarity, tolerance)
    }
}

/// Named quality presets, highest fidelity first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLevel {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 5] = [
        QualityLevel::Highest,
        QualityLevel::High,
        QualityLevel::Medium,
        QualityLevel::Low,
        QualityLevel::Lowest,
    ];

    /// Fixed pruning knobs for this level.
    pub fn config(self) -> PruneConfig {
        match self {
            QualityLevel::Highest => PruneConfig::new(0.99, 0.025),
            QualityLevel::High => PruneConfig::new(0.99, 0.05),
            QualityLevel::Medium => PruneConfig::new(0.99, 0.1),
            QualityLevel::Low => PruneConfig::new(0.95, 0.15),
            QualityLevel::Lowest => PruneConfig::new(0.90, 0.2),
        }
    }

    /// Band a scalar score into a level.
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        if score >= 0.9 {
            QualityLevel::Highest
        } else if score >= 0.7 {
            QualityLevel::High
        } else if score >= 0.3 {
            QualityLevel::Medium
        } else if score >= 0.1 {
            QualityLevel::Low
        } else {
            QualityLevel::Lowest
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityLevel::Highest => "highest",
            QualityLevel::High => "high",
            QualityLevel::Medium => "medium",
            QualityLevel::Low => "low",
            QualityLevel::Lowest => "lowest",
        }
    }
}

/// Quality selection: a scalar score, a named level, or explicit knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quality {
    Score(f64),
    Level(QualityLevel),
    Explicit(PruneConfig),
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Score(0.5)
    }
}

/// Configuration for a compression run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressConfig {
    pub quality: Quality,
    /// Split-search strategy. Leave at the default unless build speed on
    /// large images matters more than fidelity.
    pub split: SplitMode,
}

impl CompressConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quality_score(mut self, score: f64) -> Self {
        self.quality = Quality::Score(score);
        self
    }

    pub fn quality_level(mut self, level: QualityLevel) -> Self {
        self.quality = Quality::Level(level);
        self
    }

    pub fn prune(mut self, config: PruneConfig) -> Self {
        self.quality = Quality::Explicit(config);
        self
    }

    pub fn split(mut self, mode: SplitMode) -> Self {
        self.split = mode;
        self
    }

    /// Resolve the quality selection to concrete pruning knobs.
    pub fn prune_config(&self) -> PruneConfig {
        match self.quality {
            Quality::Score(score) => PruneConfig::for_score(score),
            Quality::Level(level) => level.config(),
            Quality::Explicit(config) => config,
        }
    }
}

/// Outcome of one compression run.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// The reconstructed image, same dimensions as the input.
    pub image: PixelGrid,
    /// Regions per pixel; smaller means heavier compression.
    pub compression_ratio: f64,
    pub original_pixels: usize,
    pub compressed_regions: usize,
    pub processing_time_seconds: f64,
}

/// Compress a grid: build statistics and the partition tree, prune, render.
///
/// Fails only on empty input. The reported time spans the whole pipeline,
/// statistics build through render.
pub fn compress(
    grid: &PixelGrid,
    config: &CompressConfig,
) -> Result<CompressionResult, CompressError> {
    let start = Instant::now();

    let mut tree = PartitionTree::build(grid, config.split)?;
    tree.prune(&config.prune_config());
    let image = tree.render();

    let compressed_regions = tree.leaf_count();
    let compression_ratio = tree.compression_ratio();

    Ok(CompressionResult {
        image,
        compression_ratio,
        original_pixels: grid.width() * grid.height(),
        compressed_regions,
        processing_time_seconds: start.elapsed().as_secs_f64(),
    })
}

/// Compress once per named level, highest quality first.
pub fn compress_series(
    grid: &PixelGrid,
) -> Result<Vec<(QualityLevel, CompressionResult)>, CompressError> {
    QualityLevel::ALL
        .iter()
        .map(|&level| {
            compress(grid, &CompressConfig::new().quality_level(level)).map(|result| (level, result))
        })
        .collect()
}
