//! Summed-area tables over an HSLA grid.
//!
//! One pass at construction buys O(1) queries for the mean color and the
//! hue-bin histogram (and from it, entropy) of any axis-aligned rectangle,
//! which is what makes the exhaustive split search in the partition tree
//! affordable.

use std::f64::consts::PI;

use crate::grid::PixelGrid;
use crate::hsla::Hsla;

/// Number of 10-degree hue histogram bins.
pub const HUE_BINS: usize = 36;

/// Inclusive axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub ul_x: usize,
    pub ul_y: usize,
    pub lr_x: usize,
    pub lr_y: usize,
}

impl Rect {
    pub const fn new(ul_x: usize, ul_y: usize, lr_x: usize, lr_y: usize) -> Self {
        Self {
            ul_x,
            ul_y,
            lr_x,
            lr_y,
        }
    }

    pub fn width(&self) -> usize {
        self.lr_x - self.ul_x + 1
    }

    pub fn height(&self) -> usize {
        self.lr_y - self.ul_y + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_single_pixel(&self) -> bool {
        self.ul_x == self.lr_x && self.ul_y == self.lr_y
    }
}

fn hue_bin(hue: f64) -> usize {
    ((hue / 10.0) as usize).min(HUE_BINS - 1)
}

/// Prefix-sum tables over a pixel grid.
///
/// Each cell holds the sum over the inclusive rectangle from the origin to
/// that cell of: saturation-weighted hue unit-vector components, saturation,
/// luminance, and a 36-bin hue histogram. Immutable after construction;
/// queries are pure.
///
/// Callers must pass rectangles that lie inside the image and are not
/// inverted; that contract is checked with debug assertions only.
#[derive(Debug, Clone)]
pub struct ImageStats {
    width: usize,
    height: usize,
    hue_x: Vec<f64>,
    hue_y: Vec<f64>,
    saturation: Vec<f64>,
    luminance: Vec<f64>,
    hue_hist: Vec<u32>,
}

fn scalar_at(table: &[f64], index: Option<usize>) -> f64 {
    index.map_or(0.0, |i| table[i])
}

impl ImageStats {
    /// Build all five tables in one row-major sweep.
    pub fn new(grid: &PixelGrid) -> Self {
        let width = grid.width();
        let height = grid.height();
        let total = width * height;

        let mut hue_x = vec![0.0f64; total];
        let mut hue_y = vec![0.0f64; total];
        let mut saturation = vec![0.0f64; total];
        let mut luminance = vec![0.0f64; total];
        let mut hue_hist = vec![0u32; total * HUE_BINS];

        let pixels = grid.pixels();
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let px = pixels[i];

                let (sin_h, cos_h) = (px.hue * PI / 180.0).sin_cos();
                let left = (x > 0).then(|| i - 1);
                let top = (y > 0).then(|| i - width);
                let diag = (x > 0 && y > 0).then(|| i - width - 1);

                let hx = px.saturation * cos_h
                    + scalar_at(&hue_x, left)
                    + scalar_at(&hue_x, top)
                    - scalar_at(&hue_x, diag);
                let hy = px.saturation * sin_h
                    + scalar_at(&hue_y, left)
                    + scalar_at(&hue_y, top)
                    - scalar_at(&hue_y, diag);
                let s = px.saturation
                    + scalar_at(&saturation, left)
                    + scalar_at(&saturation, top)
                    - scalar_at(&saturation, diag);
                let l = px.luminance
                    + scalar_at(&luminance, left)
                    + scalar_at(&luminance, top)
                    - scalar_at(&luminance, diag);

                hue_x[i] = hx;
                hue_y[i] = hy;
                saturation[i] = s;
                luminance[i] = l;

                for bin in 0..HUE_BINS {
                    let from_left = left.map_or(0, |j| hue_hist[j * HUE_BINS + bin]);
                    let from_top = top.map_or(0, |j| hue_hist[j * HUE_BINS + bin]);
                    let from_diag = diag.map_or(0, |j| hue_hist[j * HUE_BINS + bin]);
                    // from_left covers from_diag's rectangle, so this never underflows.
                    hue_hist[i * HUE_BINS + bin] = from_left - from_diag + from_top;
                }
                hue_hist[i * HUE_BINS + hue_bin(px.hue)] += 1;
            }
        }

        Self {
            width,
            height,
            hue_x,
            hue_y,
            saturation,
            luminance,
            hue_hist,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn is_valid(&self, region: Rect) -> bool {
        region.lr_x < self.width
            && region.lr_y < self.height
            && region.ul_x <= region.lr_x
            && region.ul_y <= region.lr_y
    }

    /// Number of pixels inside `region`.
    pub fn area(&self, region: Rect) -> u64 {
        debug_assert!(self.is_valid(region), "invalid rectangle {region:?}");
        region.area()
    }

    fn table_sum(&self, table: &[f64], region: Rect) -> f64 {
        let at = |x: isize, y: isize| -> f64 {
            if x < 0 || y < 0 {
                0.0
            } else {
                table[y as usize * self.width + x as usize]
            }
        };
        let x0 = region.ul_x as isize - 1;
        let y0 = region.ul_y as isize - 1;
        let x1 = region.lr_x as isize;
        let y1 = region.lr_y as isize;
        at(x1, y1) - at(x0, y1) - at(x1, y0) + at(x0, y0)
    }

    /// Mean color of `region`.
    ///
    /// Hue is recovered from the saturation-weighted unit-vector mean via
    /// `atan2`; averaging angles directly is wrong because hue is cyclic,
    /// and the weighting makes near-gray pixels count for little. Alpha is
    /// always 1.0.
    pub fn average_color(&self, region: Rect) -> Hsla {
        debug_assert!(self.is_valid(region), "invalid rectangle {region:?}");

        let count = region.area() as f64;
        let avg_hx = self.table_sum(&self.hue_x, region) / count;
        let avg_hy = self.table_sum(&self.hue_y, region) / count;
        let avg_s = self.table_sum(&self.saturation, region) / count;
        let avg_l = self.table_sum(&self.luminance, region) / count;

        let mut hue = avg_hy.atan2(avg_hx) * 180.0 / PI;
        if hue < 0.0 {
            hue += 360.0;
        }

        Hsla::new(hue, avg_s, avg_l, 1.0)
    }

    /// Per-bin pixel counts for `region`.
    pub fn hue_histogram(&self, region: Rect) -> [u32; HUE_BINS] {
        debug_assert!(self.is_valid(region), "invalid rectangle {region:?}");

        let at = |x: isize, y: isize, bin: usize| -> i64 {
            if x < 0 || y < 0 {
                0
            } else {
                self.hue_hist[(y as usize * self.width + x as usize) * HUE_BINS + bin] as i64
            }
        };
        let x0 = region.ul_x as isize - 1;
        let y0 = region.ul_y as isize - 1;
        let x1 = region.lr_x as isize;
        let y1 = region.lr_y as isize;

        let mut histogram = [0u32; HUE_BINS];
        for (bin, slot) in histogram.iter_mut().enumerate() {
            let count = at(x1, y1, bin) - at(x0, y1, bin) - at(x1, y0, bin) + at(x0, y0, bin);
            *slot = count as u32;
        }
        histogram
    }

    /// Shannon entropy (bits) of the hue-bin distribution over `region`.
    ///
    /// Ranges from 0 (single bin) to `log2(36)`.
    pub fn entropy(&self, region: Rect) -> f64 {
        let histogram = self.hue_histogram(region);
        entropy_from_distribution(&histogram, self.area(region))
    }
}

fn entropy_from_distribution(distribution: &[u32], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    let mut entropy = 0.0;
    for &count in distribution {
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_of(colors: &[Hsla], width: usize, height: usize) -> PixelGrid {
        assert_eq!(colors.len(), width * height);
        let mut grid = PixelGrid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                *grid.get_mut(x, y).unwrap() = colors[y * width + x];
            }
        }
        grid
    }

    #[test]
    fn area_counts_pixels() {
        let stats = ImageStats::new(&PixelGrid::new(7, 5));
        assert_eq!(stats.area(Rect::new(0, 0, 6, 4)), 35);
        assert_eq!(stats.area(Rect::new(2, 1, 4, 3)), 9);
        assert_eq!(stats.area(Rect::new(3, 3, 3, 3)), 1);
    }

    #[test]
    fn uniform_image_has_zero_entropy_and_exact_mean() {
        let color = Hsla::new(200.0, 0.6, 0.4, 1.0);
        let grid = grid_of(&vec![color; 12], 4, 3);
        let stats = ImageStats::new(&grid);

        for rect in [
            Rect::new(0, 0, 3, 2),
            Rect::new(1, 0, 2, 2),
            Rect::new(0, 1, 3, 1),
            Rect::new(2, 2, 2, 2),
        ] {
            assert_eq!(stats.entropy(rect), 0.0);
            let mean = stats.average_color(rect);
            assert!((mean.hue - 200.0).abs() < 1e-9);
            assert!((mean.saturation - 0.6).abs() < 1e-9);
            assert!((mean.luminance - 0.4).abs() < 1e-9);
            assert_eq!(mean.alpha, 1.0);
        }
    }

    #[test]
    fn histogram_matches_naive_count() {
        // Hues straddling several bins, including the top bin's clamp.
        let hues = [0.0, 9.9, 10.0, 15.0, 120.0, 255.5, 350.0, 359.9, 355.0];
        let colors: Vec<Hsla> = hues
            .iter()
            .map(|&h| Hsla::new(h, 0.8, 0.5, 1.0))
            .collect();
        let grid = grid_of(&colors, 3, 3);
        let stats = ImageStats::new(&grid);

        for rect in [
            Rect::new(0, 0, 2, 2),
            Rect::new(1, 1, 2, 2),
            Rect::new(0, 0, 0, 2),
            Rect::new(2, 0, 2, 1),
        ] {
            let mut expected = [0u32; HUE_BINS];
            for y in rect.ul_y..=rect.lr_y {
                for x in rect.ul_x..=rect.lr_x {
                    let h = hues[y * 3 + x];
                    expected[((h / 10.0) as usize).min(HUE_BINS - 1)] += 1;
                }
            }
            let actual = stats.hue_histogram(rect);
            assert_eq!(actual, expected);
            assert_eq!(
                actual.iter().map(|&c| c as u64).sum::<u64>(),
                stats.area(rect)
            );
        }
    }

    #[test]
    fn two_tone_region_entropy_is_one_bit() {
        let red = Hsla::new(0.0, 1.0, 0.5, 1.0);
        let blue = Hsla::new(240.0, 1.0, 0.5, 1.0);
        let grid = grid_of(&[red, red, blue, blue], 2, 2);
        let stats = ImageStats::new(&grid);
        assert!((stats.entropy(Rect::new(0, 0, 1, 1)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mean_hue_averages_around_the_wheel() {
        // 350 and 10 degrees average to 0, not 180.
        let a = Hsla::new(350.0, 1.0, 0.5, 1.0);
        let b = Hsla::new(10.0, 1.0, 0.5, 1.0);
        let grid = grid_of(&[a, b], 2, 1);
        let stats = ImageStats::new(&grid);
        let mean = stats.average_color(Rect::new(0, 0, 1, 0));
        assert!(mean.hue < 1e-9 || mean.hue > 359.999, "hue {}", mean.hue);
    }

    #[test]
    fn full_hue_gradient_maximizes_entropy() {
        // 16 hues evenly spread over the wheel: every pixel lands in its own
        // bin, and the hue unit vectors nearly cancel.
        let hues: Vec<f64> = (0..16).map(|i| i as f64 * 359.0 / 15.0).collect();
        let colors: Vec<Hsla> = hues.iter().map(|&h| Hsla::new(h, 1.0, 0.5, 1.0)).collect();
        let grid = grid_of(&colors, 16, 1);
        let stats = ImageStats::new(&grid);

        let full = Rect::new(0, 0, 15, 0);
        assert!((stats.entropy(full) - 4.0).abs() < 1e-9);

        // Saturation and luminance average arithmetically.
        let mean = stats.average_color(full);
        assert!((mean.saturation - 1.0).abs() < 1e-9);
        assert!((mean.luminance - 0.5).abs() < 1e-9);

        // The residual direction vector is tiny relative to the pixel count.
        let (mut vx, mut vy) = (0.0f64, 0.0f64);
        for &h in &hues {
            let (sin_h, cos_h) = (h * PI / 180.0).sin_cos();
            vx += cos_h;
            vy += sin_h;
        }
        assert!((vx * vx + vy * vy).sqrt() / 16.0 < 0.05);
    }

    #[test]
    fn saturation_weighting_lets_gray_defer_to_color() {
        // Three grays and one saturated green: the mean hue should be green's.
        let gray = Hsla::new(0.0, 0.0, 0.5, 1.0);
        let green = Hsla::new(120.0, 1.0, 0.5, 1.0);
        let grid = grid_of(&[gray, gray, gray, green], 2, 2);
        let stats = ImageStats::new(&grid);
        let mean = stats.average_color(Rect::new(0, 0, 1, 1));
        assert!((mean.hue - 120.0).abs() < 1e-9);
        assert!((mean.saturation - 0.25).abs() < 1e-9);
    }
}
