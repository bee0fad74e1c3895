//! Adaptive binary partitioning of an image.
//!
//! The tree is grown top-down: each region is cut along the axis-aligned
//! position that minimizes the area-weighted hue entropy of the two halves,
//! and recursion stops where a region is a single pixel or already
//! near-uniform. Pruning then collapses subtrees whose leaves a single mean
//! color can stand in for.

use crate::error::CompressError;
use crate::grid::PixelGrid;
use crate::hsla::Hsla;
use crate::stats::{ImageStats, Rect};
use crate::PruneConfig;

/// Regions below this hue entropy (bits) are not split further.
const ENTROPY_CUTOFF: f64 = 0.1;

/// Candidate cap for [`SplitMode::Sampled`].
const MAX_SAMPLED_CANDIDATES: usize = 8;

/// How cut positions are enumerated during the split search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Score every cut position. Deterministic best quality; the default.
    #[default]
    Exhaustive,
    /// Probe a bounded set of positions (quartile marks plus an even
    /// stride, at most 8 per axis). Faster on large regions, may miss the
    /// optimal cut.
    Sampled,
}

#[derive(Debug, Clone)]
struct Node {
    region: Rect,
    color: Hsla,
    children: Option<Box<(Node, Node)>>,
}

impl Node {
    fn leaf(region: Rect, color: Hsla) -> Self {
        Self {
            region,
            color,
            children: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Binary partition tree over an image.
///
/// Nodes own their children exclusively; the only mutation after
/// construction is [`PartitionTree::prune`], which turns internal nodes
/// into leaves. Every node keeps the mean color its region had at build
/// time.
#[derive(Debug, Clone)]
pub struct PartitionTree {
    root: Node,
    width: usize,
    height: usize,
}

impl PartitionTree {
    /// Build the tree for `grid`. Fails on empty images.
    pub fn build(grid: &PixelGrid, mode: SplitMode) -> Result<Self, CompressError> {
        if grid.is_empty() {
            return Err(CompressError::ZeroDimension);
        }

        let stats = ImageStats::new(grid);
        let full = Rect::new(0, 0, grid.width() - 1, grid.height() - 1);
        Ok(Self {
            root: build_node(&stats, full, mode),
            width: grid.width(),
            height: grid.height(),
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Paint every leaf's rectangle with its color.
    ///
    /// Leaves tile the image, so each output pixel is written exactly once.
    pub fn render(&self) -> PixelGrid {
        let mut output = PixelGrid::new(self.width, self.height);
        render_node(&self.root, &mut output);
        output
    }

    /// Collapse subtrees whose leaves are close enough to the subtree's
    /// stored mean color.
    ///
    /// Post-order: children are pruned first, so a parent sees the already
    /// simplified subtree when it takes its own tally. Mean colors are
    /// never recomputed.
    pub fn prune(&mut self, config: &PruneConfig) {
        prune_node(&mut self.root, config);
    }

    pub fn leaf_count(&self) -> usize {
        count_leaves(&self.root)
    }

    /// Leaves per pixel. Smaller means heavier compression.
    pub fn compression_ratio(&self) -> f64 {
        let total = self.width * self.height;
        if total == 0 {
            return 0.0;
        }
        self.leaf_count() as f64 / total as f64
    }

    /// Leaf rectangles and colors in depth-first order.
    pub fn leaves(&self) -> Vec<(Rect, Hsla)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &mut out);
        out
    }
}

fn build_node(stats: &ImageStats, region: Rect, mode: SplitMode) -> Node {
    let color = stats.average_color(region);

    if region.is_single_pixel() {
        return Node::leaf(region, color);
    }
    if stats.entropy(region) < ENTROPY_CUTOFF {
        return Node::leaf(region, color);
    }

    let (first, second) = best_split(stats, region, mode);
    Node {
        region,
        color,
        children: Some(Box::new((
            build_node(stats, first, mode),
            build_node(stats, second, mode),
        ))),
    }
}

/// Find the cut minimizing area-weighted child entropy.
///
/// Horizontal cuts are scored before vertical ones, ascending within each
/// orientation; the strictly-smaller comparison keeps the first of any tied
/// minima, so the build is deterministic. Regions one pixel tall offer only
/// vertical cuts and vice versa.
fn best_split(stats: &ImageStats, region: Rect, mode: SplitMode) -> (Rect, Rect) {
    let total_area = stats.area(region) as f64;
    let mut best_score = f64::INFINITY;
    let mut best: Option<(Rect, Rect)> = None;

    let mut consider = |first: Rect, second: Rect| {
        let score = (stats.entropy(first) * stats.area(first) as f64
            + stats.entropy(second) * stats.area(second) as f64)
            / total_area;
        if score < best_score {
            best_score = score;
            best = Some((first, second));
        }
    };

    if region.height() > 1 {
        for split_y in split_candidates(region.ul_y, region.lr_y, mode) {
            let top = Rect::new(region.ul_x, region.ul_y, region.lr_x, split_y);
            let bottom = Rect::new(region.ul_x, split_y + 1, region.lr_x, region.lr_y);
            consider(top, bottom);
        }
    }

    if region.width() > 1 {
        for split_x in split_candidates(region.ul_x, region.lr_x, mode) {
            let left = Rect::new(region.ul_x, region.ul_y, split_x, region.lr_y);
            let right = Rect::new(split_x + 1, region.ul_y, region.lr_x, region.lr_y);
            consider(left, right);
        }
    }

    // A region reaching this point spans more than one pixel along some axis.
    best.expect("multi-pixel region always has at least one cut")
}

/// Cut positions in `[start, end)`; a cut at `p` separates `p` from `p + 1`.
fn split_candidates(start: usize, end: usize, mode: SplitMode) -> Vec<usize> {
    let span = end - start;
    if mode == SplitMode::Exhaustive || span <= MAX_SAMPLED_CANDIDATES {
        return (start..end).collect();
    }

    // Quartile/third marks first, then an even stride until the cap.
    let mut candidates = vec![
        start + span / 4,
        start + span / 3,
        start + span / 2,
        start + 2 * span / 3,
        start + 3 * span / 4,
    ];
    let step = (span / 10).max(1);
    let mut position = start + step;
    while position < end && candidates.len() < MAX_SAMPLED_CANDIDATES {
        candidates.push(position);
        position += step;
    }
    candidates
}

fn render_node(node: &Node, output: &mut PixelGrid) {
    match &node.children {
        Some(children) => {
            render_node(&children.0, output);
            render_node(&children.1, output);
        }
        None => {
            for y in node.region.ul_y..=node.region.lr_y {
                for x in node.region.ul_x..=node.region.lr_x {
                    if let Some(px) = output.get_mut(x, y) {
                        *px = node.color;
                    }
                }
            }
        }
    }
}

fn prune_node(node: &mut Node, config: &PruneConfig) {
    let Some(children) = node.children.as_mut() else {
        return;
    };
    prune_node(&mut children.0, config);
    prune_node(&mut children.1, config);

    if should_prune(node, config) {
        node.children = None;
    }
}

fn should_prune(node: &Node, config: &PruneConfig) -> bool {
    if node.is_leaf() {
        return false;
    }
    let (similar, total) = tally_similar(node, &node.color, config.color_tolerance);
    total > 0 && similar as f64 / total as f64 >= config.minimum_similarity
}

/// Pixel area of leaves within `tolerance` of `reference`, and the total
/// leaf area, over `node`'s subtree.
fn tally_similar(node: &Node, reference: &Hsla, tolerance: f64) -> (u64, u64) {
    match &node.children {
        None => {
            let area = node.region.area();
            if node.color.component_distance(reference) <= tolerance {
                (area, area)
            } else {
                (0, area)
            }
        }
        Some(children) => {
            let (similar_a, total_a) = tally_similar(&children.0, reference, tolerance);
            let (similar_b, total_b) = tally_similar(&children.1, reference, tolerance);
            (similar_a + similar_b, total_a + total_b)
        }
    }
}

fn count_leaves(node: &Node) -> usize {
    match &node.children {
        None => 1,
        Some(children) => count_leaves(&children.0) + count_leaves(&children.1),
    }
}

fn collect_leaves(node: &Node, out: &mut Vec<(Rect, Hsla)>) {
    match &node.children {
        None => out.push((node.region, node.color)),
        Some(children) => {
            collect_leaves(&children.0, out);
            collect_leaves(&children.1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from_rgba(bytes: &[(u8, u8, u8)], width: usize, height: usize) -> PixelGrid {
        let pixels: Vec<rgb::RGBA<u8>> = bytes
            .iter()
            .map(|&(r, g, b)| rgb::RGBA { r, g, b, a: 255 })
            .collect();
        PixelGrid::from_rgba(&pixels, width, height).unwrap()
    }

    fn assert_leaves_tile(tree: &PartitionTree) {
        let (width, height) = tree.dimensions();
        let mut covered = vec![0u32; width * height];
        for (region, _) in tree.leaves() {
            for y in region.ul_y..=region.lr_y {
                for x in region.ul_x..=region.lr_x {
                    covered[y * width + x] += 1;
                }
            }
        }
        assert!(
            covered.iter().all(|&c| c == 1),
            "leaves must cover every pixel exactly once"
        );
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(matches!(
            PartitionTree::build(&PixelGrid::new(0, 0), SplitMode::Exhaustive),
            Err(CompressError::ZeroDimension)
        ));
        assert!(matches!(
            PartitionTree::build(&PixelGrid::new(4, 0), SplitMode::Exhaustive),
            Err(CompressError::ZeroDimension)
        ));
    }

    #[test]
    fn uniform_image_is_a_single_leaf() {
        let grid = grid_from_rgba(&[(128, 128, 128); 16], 4, 4);
        let tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert!((tree.compression_ratio() - 1.0 / 16.0).abs() < 1e-12);
        assert_eq!(tree.render(), grid);
    }

    #[test]
    fn two_pixel_row_splits_between_the_pixels() {
        let grid = grid_from_rgba(&[(255, 0, 0), (0, 0, 255)], 2, 1);
        let tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();

        assert_eq!(tree.leaf_count(), 2);
        let leaves = tree.leaves();
        assert_eq!(leaves[0].0, Rect::new(0, 0, 0, 0));
        assert_eq!(leaves[1].0, Rect::new(1, 0, 1, 0));
        assert!((leaves[0].1.hue - 0.0).abs() < 1e-9);
        assert!((leaves[1].1.hue - 240.0).abs() < 1e-9);

        // Reconstruction is exact to within channel rounding.
        assert_eq!(tree.render(), grid);
    }

    #[test]
    fn banded_image_splits_at_the_band_edge() {
        // Rows 0-1 red, rows 2-3 blue: the y=1 cut gives two zero-entropy
        // halves and wins over every alternative.
        let mut bytes = Vec::new();
        for y in 0..4 {
            for _ in 0..4 {
                bytes.push(if y < 2 { (255, 0, 0) } else { (0, 0, 255) });
            }
        }
        let grid = grid_from_rgba(&bytes, 4, 4);
        let mut tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();

        assert_eq!(tree.leaf_count(), 2);
        let leaves = tree.leaves();
        assert_eq!(leaves[0].0, Rect::new(0, 0, 3, 1));
        assert_eq!(leaves[1].0, Rect::new(0, 2, 3, 3));

        // Pruning cannot simplify a two-leaf split of dissimilar colors.
        tree.prune(&PruneConfig::new(0.90, 0.2));
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.render(), grid);
    }

    #[test]
    fn noisy_image_leaves_tile_exactly() {
        let bytes: Vec<(u8, u8, u8)> = (0..35u32)
            .map(|i| {
                let h = i.wrapping_mul(2654435761) as u8;
                (h, h.wrapping_add(90), h.wrapping_add(170))
            })
            .collect();
        let grid = grid_from_rgba(&bytes, 7, 5);

        let tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();
        assert_leaves_tile(&tree);

        let sampled = PartitionTree::build(&grid, SplitMode::Sampled).unwrap();
        assert_leaves_tile(&sampled);
    }

    #[test]
    fn pruning_never_adds_leaves() {
        let bytes: Vec<(u8, u8, u8)> = (0..64u32)
            .map(|i| {
                let h = i.wrapping_mul(2654435761) as u8;
                (h, h.wrapping_add(50), h.wrapping_add(100))
            })
            .collect();
        let grid = grid_from_rgba(&bytes, 8, 8);
        let mut tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();

        let mut previous = tree.leaf_count();
        for config in [
            PruneConfig::new(1.0, 0.0),
            PruneConfig::new(0.99, 0.025),
            PruneConfig::new(0.95, 0.15),
            PruneConfig::new(0.85, 0.30),
        ] {
            tree.prune(&config);
            let current = tree.leaf_count();
            assert!(current <= previous, "prune increased leaves");
            previous = current;
        }
        assert_leaves_tile(&tree);
    }

    #[test]
    fn aggressive_prune_collapses_near_uniform_tree() {
        // Two hues 20 degrees apart: distinct bins force splits at build
        // time, but the colors sit within a loose tolerance of their mean.
        let mut bytes = Vec::new();
        for i in 0..16 {
            bytes.push(if i % 2 == 0 { (255, 64, 64) } else { (255, 128, 64) });
        }
        let grid = grid_from_rgba(&bytes, 4, 4);
        let mut tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();
        assert!(tree.leaf_count() > 1);

        tree.prune(&PruneConfig::new(0.85, 0.30));
        assert_eq!(tree.leaf_count(), 1);
        assert_leaves_tile(&tree);
    }

    #[test]
    fn strict_prune_preserves_distinct_leaves() {
        let grid = grid_from_rgba(&[(255, 0, 0), (0, 0, 255)], 2, 1);
        let mut tree = PartitionTree::build(&grid, SplitMode::Exhaustive).unwrap();
        tree.prune(&PruneConfig::new(1.0, 0.0));
        assert_eq!(tree.leaf_count(), 2);
    }
}
