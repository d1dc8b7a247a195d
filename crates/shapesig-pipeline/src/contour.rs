//! Contour tracing: extract the ordered boundary of the dominant
//! foreground component from a binary mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable tracing
//! algorithms and the [`ContourTracerKind`] enum for selecting one at
//! runtime. Every tracer must be deterministic: the boundary start point
//! and direction feed straight into the descriptor, and the spectral
//! stage is only invariant to start-point changes that come from the
//! shape itself.
//!
//! # Moore-neighbor tracing
//!
//! The dominant component is the largest 8-connected foreground region
//! (ties go to the region reached first in raster order). The walk starts
//! at that region's first pixel in raster order, whose west neighbor is
//! never part of the region, and visits neighbors in the fixed clockwise
//! order of [`NEIGHBORS`]. It stops when it is back at the start pixel and
//! about to repeat its first move (Jacob's stopping criterion), or after a
//! bounded number of moves.

use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Contour, Dimensions, GridPoint};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Moore-neighbor boundary following with Jacob's stopping criterion.
    #[default]
    MooreNeighbor,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask and an upper bound on boundary-walk moves.
/// Output: the clockwise boundary of the dominant component, or an empty
/// contour if the mask has no foreground.
pub trait ContourTracer {
    /// Trace the dominant boundary in the given mask.
    fn trace(&self, mask: &BinaryMask, max_steps: usize) -> Contour;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &BinaryMask, max_steps: usize) -> Contour {
        match *self {
            Self::MooreNeighbor => trace_moore(mask, max_steps),
        }
    }
}

/// Neighbor offsets in visit order: clockwise in image coordinates
/// (y pointing down), starting from west.
pub const NEIGHBORS: [(i64, i64); 8] = [
    (-1, 0),  // W
    (-1, -1), // NW
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
];

/// After moving in direction `d`, the cell examined just before the new
/// pixel (direction `d - 1` from the old one) lies in direction
/// `BACKTRACK[d]` from the new pixel.
const BACKTRACK: [usize; 8] = [6, 6, 0, 0, 2, 2, 4, 4];

/// Default walk bound for a mask: every boundary pixel can be entered at
/// most four times before the walk must have closed.
#[must_use]
pub fn default_step_bound(dimensions: Dimensions) -> usize {
    usize::try_from(dimensions.pixel_count())
        .unwrap_or(usize::MAX)
        .saturating_mul(4)
        .saturating_add(8)
}

/// Trace the dominant boundary with the default tracer and step bound.
#[must_use = "returns the traced contour"]
pub fn trace_contour(mask: &BinaryMask) -> Contour {
    ContourTracerKind::default().trace(mask, default_step_bound(mask.dimensions()))
}

/// Moore-neighbor tracing of the dominant component.
fn trace_moore(mask: &BinaryMask, max_steps: usize) -> Contour {
    let Some(region) = DominantRegion::find(mask) else {
        return Contour::default();
    };

    let start = region.start;
    let mut points = vec![start];
    let mut current = start;
    // The start pixel's west neighbor is outside the region.
    let mut backtrack = 0;
    let mut second: Option<GridPoint> = None;
    let mut steps = 0;

    loop {
        if steps >= max_steps {
            tracing::warn!(
                steps,
                points = points.len(),
                "contour walk hit its step bound; returning partial boundary"
            );
            break;
        }

        let found = (1..=8)
            .map(|i| (backtrack + i) % 8)
            .find_map(|d| region.neighbor(current, d).map(|p| (d, p)));
        let Some((dir, next)) = found else {
            // Isolated pixel: the contour is the pixel itself.
            break;
        };

        if current == start {
            match second {
                None => second = Some(next),
                Some(s) if s == next => break,
                Some(_) => {}
            }
        }

        backtrack = BACKTRACK[dir];
        current = next;
        points.push(next);
        steps += 1;
    }

    // The closing move lands back on the start pixel; keep it only once.
    if points.len() > 1 && points.last() == Some(&start) {
        points.pop();
    }

    tracing::debug!(
        points = points.len(),
        region_pixels = region.pixel_count,
        "traced dominant contour"
    );
    Contour::new(points)
}

/// The largest 8-connected foreground component of a mask.
struct DominantRegion {
    labels: image::ImageBuffer<image::Luma<u32>, Vec<u32>>,
    label: u32,
    start: GridPoint,
    pixel_count: u64,
}

impl DominantRegion {
    /// Label the mask's components and pick the dominant one.
    ///
    /// Returns `None` if the mask has no foreground.
    fn find(mask: &BinaryMask) -> Option<Self> {
        if mask.is_empty() {
            return None;
        }

        let labels = connected_components(&mask.to_gray(), Connectivity::Eight, image::Luma([0u8]));

        let mut counts: Vec<u64> = Vec::new();
        for p in labels.pixels() {
            let label = p.0[0] as usize;
            if label == 0 {
                continue;
            }
            if counts.len() <= label {
                counts.resize(label + 1, 0);
            }
            counts[label] += 1;
        }
        let max = counts.iter().copied().max().filter(|&m| m > 0)?;

        // The first pixel in raster order belonging to any largest region
        // both breaks ties and becomes the start pixel.
        let (x, y, pixel) = labels
            .enumerate_pixels()
            .find(|(_, _, p)| p.0[0] != 0 && counts[p.0[0] as usize] == max)?;
        let label = pixel.0[0];

        Some(Self {
            labels,
            label,
            start: GridPoint::new(x, y),
            pixel_count: max,
        })
    }

    /// The neighbor of `p` in direction `dir`, if it belongs to the region.
    fn neighbor(&self, p: GridPoint, dir: usize) -> Option<GridPoint> {
        let (dx, dy) = NEIGHBORS[dir];
        let x = u32::try_from(i64::from(p.x) + dx).ok()?;
        let y = u32::try_from(i64::from(p.y) + dy).ok()?;
        if x >= self.labels.width() || y >= self.labels.height() {
            return None;
        }
        (self.labels.get_pixel(x, y).0[0] == self.label).then_some(GridPoint::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(width: u32, height: u32, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> BinaryMask {
        BinaryMask::from_fn(width, height, |x, y| xs.contains(&x) && ys.contains(&y))
    }

    fn disk(size: u32, cx: f64, cy: f64, r: f64) -> BinaryMask {
        BinaryMask::from_fn(size, size, |x, y| {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            dx.hypot(dy) <= r
        })
    }

    /// Twice the signed area (shoelace); positive for clockwise traversal
    /// in image coordinates.
    fn signed_area2(contour: &Contour) -> i64 {
        let pts = contour.points();
        (0..pts.len())
            .map(|i| {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum()
    }

    fn assert_eight_connected(contour: &Contour) {
        for pair in contour.points().windows(2) {
            assert_eq!(
                pair[0].chebyshev_distance(pair[1]),
                1,
                "consecutive points {:?} -> {:?} are not 8-neighbors",
                pair[0],
                pair[1],
            );
        }
        assert!(contour.is_closed(), "contour is not closed");
    }

    #[test]
    fn default_is_moore_neighbor() {
        assert_eq!(ContourTracerKind::default(), ContourTracerKind::MooreNeighbor);
    }

    #[test]
    fn empty_mask_produces_empty_contour() {
        let mask = BinaryMask::new(10, 10);
        assert!(trace_contour(&mask).is_empty());
    }

    #[test]
    fn zero_area_mask_produces_empty_contour() {
        assert!(trace_contour(&BinaryMask::new(0, 0)).is_empty());
    }

    #[test]
    fn single_pixel_is_a_one_point_contour() {
        let mut mask = BinaryMask::new(5, 5);
        mask.set(2, 3, true);
        let contour = trace_contour(&mask);
        assert_eq!(contour.points(), &[GridPoint::new(2, 3)]);
    }

    #[test]
    fn square_block_is_traced_clockwise_from_top_left() {
        let mask = block(5, 5, 1..4, 1..4);
        let contour = trace_contour(&mask);
        let expected = [
            (1, 1),
            (2, 1),
            (3, 1),
            (3, 2),
            (3, 3),
            (2, 3),
            (1, 3),
            (1, 2),
        ]
        .map(|(x, y)| GridPoint::new(x, y));
        assert_eq!(contour.points(), &expected);
        assert!(signed_area2(&contour) > 0);
    }

    #[test]
    fn one_pixel_wide_line_is_walked_out_and_back() {
        let mask = block(5, 3, 0..5, 1..2);
        let contour = trace_contour(&mask);
        assert_eq!(contour.len(), 8);
        assert_eq!(contour.first(), Some(&GridPoint::new(0, 1)));
        assert_eq!(contour.points()[4], GridPoint::new(4, 1));
        assert_eight_connected(&contour);
    }

    #[test]
    fn disk_boundary_is_connected_closed_and_clockwise() {
        let mask = disk(41, 20.0, 20.0, 12.0);
        let contour = trace_contour(&mask);
        assert!(contour.len() > 40, "got {} points", contour.len());
        assert_eight_connected(&contour);
        assert!(signed_area2(&contour) > 0);
        for p in contour.points() {
            assert!(mask.get(p.x, p.y), "boundary point {p:?} is not foreground");
        }
    }

    #[test]
    fn largest_component_wins() {
        let mut mask = block(20, 20, 1..3, 1..3);
        for y in 8..14 {
            for x in 8..14 {
                mask.set(x, y, true);
            }
        }
        let contour = trace_contour(&mask);
        assert_eq!(contour.first(), Some(&GridPoint::new(8, 8)));
        assert!(contour.points().iter().all(|p| p.x >= 8 && p.y >= 8));
    }

    #[test]
    fn equal_components_tie_break_to_raster_order() {
        let mut mask = block(20, 20, 10..13, 2..5);
        for y in 10..13 {
            for x in 1..4 {
                mask.set(x, y, true);
            }
        }
        let contour = trace_contour(&mask);
        assert_eq!(contour.first(), Some(&GridPoint::new(10, 2)));
    }

    #[test]
    fn shape_touching_border_is_traced() {
        let mask = BinaryMask::from_fn(4, 3, |_, _| true);
        let contour = trace_contour(&mask);
        // Every pixel except the two interior ones lies on the border.
        assert_eq!(contour.len(), 10);
        assert_eight_connected(&contour);
    }

    #[test]
    fn step_bound_truncates_walk() {
        let mask = block(5, 5, 1..4, 1..4);
        let contour = ContourTracerKind::MooreNeighbor.trace(&mask, 3);
        assert_eq!(contour.len(), 4);
        assert!(!contour.is_closed());
    }

    #[test]
    fn tracing_is_deterministic() {
        let mask = disk(31, 14.3, 16.1, 9.5);
        assert_eq!(trace_contour(&mask), trace_contour(&mask));
    }

    #[test]
    fn default_step_bound_scales_with_area() {
        let bound = default_step_bound(Dimensions {
            width: 10,
            height: 20,
        });
        assert_eq!(bound, 808);
    }
}
