// Context areas - per-scale neighbourhoods the texture energy is summed over
//
// The four crossings of a scale (primary pair shrunk, orthogonal pair
// stretched) are sorted into the four quadrants around the centre cell.
// Straight lines between neighbouring quadrant corners then bound, for every
// run scale they pass, the first or last frame of the area.

use crate::grid::RegionDescriptor;
use crate::structure::crossing::{ThresholdCrossing, ThresholdPair};

/// Frames `start..=end` (relative to the centre frame) of one run scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextInterval {
    pub run_scale: usize,
    pub start: i32,
    pub end: i32,
}

impl ContextInterval {
    pub fn len(&self) -> i32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Low,
    High,
}

/// Ordered run-scale intervals of one centre scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextArea {
    scale: usize,
    intervals: Vec<ContextInterval>,
}

impl ContextArea {
    /// Build the area of `scale` from its crossing pairs
    ///
    /// # Arguments
    /// * `primary`, `orthogonal` - Crossing pairs of the descriptor at `scale`
    /// * `primary_factor` - Stretch applied to the primary pair (0.7 by default)
    /// * `orthogonal_factor` - Stretch applied to the orthogonal pair (2.0 by default)
    ///
    /// # Returns
    /// An empty area when any bounding crossing is missing or a boundary
    /// line leaves the scale range.
    pub fn build(
        scale: usize,
        primary: &ThresholdPair,
        orthogonal: &ThresholdPair,
        noof_scales: usize,
        primary_factor: f64,
        orthogonal_factor: f64,
    ) -> Self {
        let mut corners = [
            primary.tc1.rescaled(primary_factor),
            primary.tc2.rescaled(primary_factor),
            orthogonal.tc1.rescaled(orthogonal_factor),
            orthogonal.tc2.rescaled(orthogonal_factor),
        ];
        sort_into_quadrants(&mut corners);

        let mut bounds = vec![(0, 0); noof_scales];
        let mut valid = true;
        use Boundary::{High, Low};
        for (base, slope, kind) in [
            (0, 1, High),
            (1, 0, Low),
            (1, 2, Low),
            (2, 1, Low),
            (2, 3, Low),
            (3, 2, High),
            (3, 0, High),
            (0, 3, High),
        ] {
            find_block_boundary(
                &mut bounds,
                scale,
                &corners[base],
                &corners[slope],
                kind,
                &mut valid,
            );
        }

        if !valid {
            return Self::empty(scale);
        }

        let intervals = bounds
            .into_iter()
            .enumerate()
            .map(|(run_scale, (start, end))| ContextInterval {
                run_scale,
                start,
                end,
            })
            .collect();
        Self::from_intervals(scale, intervals)
    }

    /// Area from explicit intervals; intervals with `start == end` are dropped
    pub fn from_intervals(scale: usize, intervals: Vec<ContextInterval>) -> Self {
        Self {
            scale,
            intervals: intervals
                .into_iter()
                .filter(|interval| interval.start != interval.end)
                .collect(),
        }
    }

    pub fn empty(scale: usize) -> Self {
        Self {
            scale,
            intervals: Vec::new(),
        }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn intervals(&self) -> &[ContextInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of (run scale, frame) samples summed per output cell
    pub fn area_size(&self) -> i32 {
        self.intervals.iter().map(ContextInterval::len).sum()
    }

    /// Reach of the area around its centre, for margin propagation
    pub fn region_descriptor(&self) -> RegionDescriptor {
        if self.is_empty() {
            return RegionDescriptor::invalid();
        }

        let centre = self.scale as i32;
        let (mut low_scale, mut high_scale, mut low_frame, mut high_frame) = (0, 0, 0, 0);
        for interval in &self.intervals {
            let offset = interval.run_scale as i32 - centre;
            low_scale = low_scale.min(offset);
            high_scale = high_scale.max(offset);
            low_frame = low_frame.min(interval.start);
            high_frame = high_frame.max(interval.end);
        }

        RegionDescriptor::new(
            low_scale.unsigned_abs() as usize,
            high_scale.unsigned_abs() as usize,
            low_frame.unsigned_abs() as usize,
            high_frame.unsigned_abs() as usize,
        )
    }
}

/// Move each crossing to the slot of its quadrant
///
/// Slot 0 takes (scale up or level, frame forward), 1 (scale up, frame back
/// or level), 2 (scale down or level, frame back), 3 (scale down, frame
/// forward or level). Checks run in order and each sees the result of the
/// previous swap.
fn sort_into_quadrants(corners: &mut [ThresholdCrossing; 4]) {
    let quadrant_tests: [fn(i32, i32) -> bool; 4] = [
        |ds, fr| ds >= 0 && fr > 0,
        |ds, fr| ds > 0 && fr <= 0,
        |ds, fr| ds <= 0 && fr < 0,
        |ds, fr| ds < 0 && fr >= 0,
    ];

    for index in 0..4 {
        for (slot, in_quadrant) in quadrant_tests.iter().enumerate() {
            let tc = &corners[index];
            if in_quadrant(tc.sub_scale_offset(), tc.sub_point().frame) {
                corners.swap(slot, index);
            }
        }
    }
}

/// Trace the line from `base`'s sub point along `slope`'s sub offset and set
/// the start (`Low`) or end (`High`) frame of every run scale it passes
fn find_block_boundary(
    bounds: &mut [(i32, i32)],
    scale: usize,
    base: &ThresholdCrossing,
    slope: &ThresholdCrossing,
    kind: Boundary,
    valid: &mut bool,
) {
    if !base.is_found() || !slope.is_found() || !*valid {
        *valid = false;
        return;
    }

    let dscale = f64::from(slope.sub_point().scale - scale as i32);
    // a level slope adds nothing the neighbouring lines do not cover
    if dscale == 0.0 {
        return;
    }

    let increment = if dscale > 0.0 { 1 } else { -1 };
    let base_scale = base.sub_point().scale;
    let base_frame = f64::from(base.sub_point().frame);
    let slope_frame = f64::from(slope.sub_point().frame);
    let noof_scales = bounds.len() as i32;

    let mut run_scale = base_scale;
    loop {
        let c = f64::from(run_scale - base_scale) / dscale;
        let frame = base_frame + c * slope_frame;
        if (0..noof_scales).contains(&run_scale) {
            let bound = &mut bounds[run_scale as usize];
            match kind {
                Boundary::High => bound.1 = frame.ceil() as i32,
                Boundary::Low => bound.0 = frame.floor() as i32,
            }
        } else {
            *valid = false;
        }

        run_scale += increment;
        if c >= 1.0 || !*valid {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::crossing::{CrossingPoint, DEFAULT_THRESHOLD};

    fn found(scale: usize, sub_scale: i32, sub_frame: i32) -> ThresholdCrossing {
        ThresholdCrossing::found(
            scale,
            CrossingPoint::new(scale as i32, 0, 0.9),
            CrossingPoint::new(sub_scale, sub_frame, 0.1),
            DEFAULT_THRESHOLD,
        )
    }

    /// Pulse-like geometry: frame crossings at +/-2, scale crossings at +/-1
    fn diamond(scale: usize) -> (ThresholdPair, ThresholdPair) {
        let s = scale as i32;
        (
            ThresholdPair::new(found(scale, s, 2), found(scale, s, -2)),
            ThresholdPair::new(found(scale, s + 1, 0), found(scale, s - 1, 0)),
        )
    }

    #[test]
    fn test_quadrant_sorting() {
        let mut corners = [
            found(5, 3, 0),  // down, level
            found(5, 5, -2), // level, back
            found(5, 7, 0),  // up, level
            found(5, 5, 2),  // level, forward
        ];
        sort_into_quadrants(&mut corners);

        assert_eq!(corners[0].sub_point().frame, 2);
        assert_eq!(corners[1].sub_point().scale, 7);
        assert_eq!(corners[2].sub_point().frame, -2);
        assert_eq!(corners[3].sub_point().scale, 3);
    }

    #[test]
    fn test_diamond_area() {
        let (primary, orthogonal) = diamond(4);
        let area = ContextArea::build(4, &primary, &orthogonal, 9, 1.0, 2.0);

        assert!(!area.is_empty());
        let runs: Vec<usize> = area.intervals().iter().map(|i| i.run_scale).collect();
        assert_eq!(runs, vec![2, 3, 4, 5, 6]);

        // frame crossings at +/-2 carried unchanged to every run scale
        for interval in area.intervals() {
            assert_eq!((interval.start, interval.end), (-2, 2));
        }

        let rd = area.region_descriptor();
        assert_eq!(rd.low_scale_horizon, 2);
        assert_eq!(rd.high_scale_horizon, 2);
        assert_eq!(rd.low_frame_horizon, 2);
        assert_eq!(rd.high_frame_horizon, 2);
        assert_eq!(area.area_size(), 25);
    }

    #[test]
    fn test_missing_crossing_empties_area() {
        let (primary, mut orthogonal) = diamond(4);
        orthogonal.tc2 = ThresholdCrossing::illegal(4);
        let area = ContextArea::build(4, &primary, &orthogonal, 9, 0.7, 2.0);
        assert!(area.is_empty());
        assert_eq!(area.region_descriptor(), RegionDescriptor::invalid());
    }

    #[test]
    fn test_boundary_leaving_scale_range_empties_area() {
        let (primary, orthogonal) = diamond(1);
        // stretched orthogonal crossings reach scale -1
        let area = ContextArea::build(1, &primary, &orthogonal, 4, 0.7, 2.0);
        assert!(area.is_empty());
    }

    #[test]
    fn test_from_intervals_prunes_zero_width() {
        let area = ContextArea::from_intervals(
            1,
            vec![
                ContextInterval {
                    run_scale: 0,
                    start: 0,
                    end: 0,
                },
                ContextInterval {
                    run_scale: 1,
                    start: -1,
                    end: 3,
                },
            ],
        );
        assert_eq!(area.intervals().len(), 1);
        assert_eq!(area.area_size(), 5);
    }
}
