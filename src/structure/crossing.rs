// ThresholdCrossing - directional correlation-decay events
//
// A crossing records where a line scan from (scale, delay 0) first sees the
// correlation drop below the threshold: the last sample still above it
// (super), the first sample below it (sub), and the interpolation fraction
// between the two. Crossings are plain values; copying one never aliases
// another descriptor's data.

use crate::error::StatsError;

/// Correlation threshold used when none is configured
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Integer mapping applied to fractional scan coordinates
pub type RoundingMap = fn(f64) -> i32;

/// Round away from zero
pub fn round_away(x: f64) -> i32 {
    if x > 0.0 {
        x.ceil() as i32
    } else {
        x.floor() as i32
    }
}

pub fn floor_map(x: f64) -> i32 {
    x.floor() as i32
}

pub fn ceil_map(x: f64) -> i32 {
    x.ceil() as i32
}

/// Outcome of a line scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CrossingStatus {
    /// The correlation dropped to the threshold inside the grid
    Found,
    /// The scan left the grid, or the correlation became undefined, first
    NotFound,
    /// Zero-length scan direction
    IllegalSearch,
}

impl CrossingStatus {
    /// Numeric code used in flat stats arrays
    pub fn code(&self) -> i32 {
        match self {
            CrossingStatus::Found => 1,
            CrossingStatus::NotFound => 2,
            CrossingStatus::IllegalSearch => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, StatsError> {
        match code {
            1 => Ok(CrossingStatus::Found),
            2 => Ok(CrossingStatus::NotFound),
            3 => Ok(CrossingStatus::IllegalSearch),
            other => Err(StatsError::InvalidStatus { code: other }),
        }
    }
}

/// A sample on a scan line: absolute scale, frame delay and correlation there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingPoint {
    pub scale: i32,
    pub frame: i32,
    pub xcorr: f64,
}

impl CrossingPoint {
    pub fn new(scale: i32, frame: i32, xcorr: f64) -> Self {
        Self {
            scale,
            frame,
            xcorr,
        }
    }

    /// The scan origin: zero delay at the centre scale, fully correlated
    pub fn origin(scale: usize) -> Self {
        Self::new(scale as i32, 0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCrossing {
    scale: usize,
    super_point: CrossingPoint,
    sub_point: CrossingPoint,
    delta: f64,
    status: CrossingStatus,
}

impl ThresholdCrossing {
    /// Assemble a crossing from stored parts, e.g. on stats import
    pub fn new(
        scale: usize,
        super_point: CrossingPoint,
        sub_point: CrossingPoint,
        delta: f64,
        status: CrossingStatus,
    ) -> Self {
        Self {
            scale,
            super_point,
            sub_point,
            delta,
            status,
        }
    }

    /// A found crossing with `delta` solved against `threshold`
    pub fn found(
        scale: usize,
        super_point: CrossingPoint,
        sub_point: CrossingPoint,
        threshold: f64,
    ) -> Self {
        Self::new(
            scale,
            super_point,
            sub_point,
            interpolate(threshold, super_point.xcorr, sub_point.xcorr),
            CrossingStatus::Found,
        )
    }

    pub fn not_found(scale: usize, super_point: CrossingPoint, sub_point: CrossingPoint) -> Self {
        Self::new(scale, super_point, sub_point, 0.0, CrossingStatus::NotFound)
    }

    /// Degenerate scan request; both points sit at the origin
    pub fn illegal(scale: usize) -> Self {
        let origin = CrossingPoint::new(scale as i32, 0, 0.0);
        Self::new(scale, origin, origin, 0.0, CrossingStatus::IllegalSearch)
    }

    /// Copy with frame offsets and scale offsets (around the centre scale)
    /// stretched by `factor`, rounded away from zero
    pub fn rescaled(&self, factor: f64) -> Self {
        let centre = self.scale as i32;
        let stretch = |point: CrossingPoint| CrossingPoint {
            scale: round_away(factor * f64::from(point.scale - centre)) + centre,
            frame: round_away(factor * f64::from(point.frame)),
            xcorr: point.xcorr,
        };
        Self {
            super_point: stretch(self.super_point),
            sub_point: stretch(self.sub_point),
            ..*self
        }
    }

    /// Combine two scans of the same direction into one conservative crossing
    ///
    /// # Arguments
    /// * `tc1`, `tc2` - Crossings from the floor- and ceil-rounded scans
    /// * `threshold` - Threshold used to re-solve `delta`
    ///
    /// # Returns
    /// The other input unchanged when either is not found. Otherwise the
    /// super point with the lower correlation and the sub point with the
    /// higher correlation, keeping the centre scale and status of `tc1`.
    pub fn merge(tc1: &ThresholdCrossing, tc2: &ThresholdCrossing, threshold: f64) -> Self {
        if !tc1.is_found() {
            return *tc2;
        }
        if !tc2.is_found() {
            return *tc1;
        }

        let super_point = if tc2.super_point.xcorr < tc1.super_point.xcorr {
            tc2.super_point
        } else {
            tc1.super_point
        };
        let sub_point = if tc2.sub_point.xcorr > tc1.sub_point.xcorr {
            tc2.sub_point
        } else {
            tc1.sub_point
        };

        Self {
            super_point,
            sub_point,
            delta: interpolate(threshold, super_point.xcorr, sub_point.xcorr),
            ..*tc1
        }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn super_point(&self) -> CrossingPoint {
        self.super_point
    }

    pub fn sub_point(&self) -> CrossingPoint {
        self.sub_point
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn status(&self) -> CrossingStatus {
        self.status
    }

    pub fn is_found(&self) -> bool {
        self.status == CrossingStatus::Found
    }

    /// Sub point scale relative to the centre scale
    pub fn sub_scale_offset(&self) -> i32 {
        self.sub_point.scale - self.scale as i32
    }
}

/// Solve `threshold = above + delta * (below - above)` for `delta`
fn interpolate(threshold: f64, above: f64, below: f64) -> f64 {
    let span = below - above;
    if span == 0.0 {
        return 0.0;
    }
    (threshold - above) / span
}

/// The two crossings bounding one scale's support along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    pub tc1: ThresholdCrossing,
    pub tc2: ThresholdCrossing,
}

impl ThresholdPair {
    pub fn new(tc1: ThresholdCrossing, tc2: ThresholdCrossing) -> Self {
        Self { tc1, tc2 }
    }

    pub fn illegal(scale: usize) -> Self {
        Self::new(
            ThresholdCrossing::illegal(scale),
            ThresholdCrossing::illegal(scale),
        )
    }

    pub fn both_found(&self) -> bool {
        self.tc1.is_found() && self.tc2.is_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn crossing(scale: usize, above: (i32, i32, f64), below: (i32, i32, f64)) -> ThresholdCrossing {
        ThresholdCrossing::found(
            scale,
            CrossingPoint::new(above.0, above.1, above.2),
            CrossingPoint::new(below.0, below.1, below.2),
            DEFAULT_THRESHOLD,
        )
    }

    #[test]
    fn test_round_away_from_zero() {
        assert_eq!(round_away(1.2), 2);
        assert_eq!(round_away(-1.2), -2);
        assert_eq!(round_away(0.0), 0);
        assert_eq!(round_away(3.0), 3);
        assert_eq!(floor_map(-0.5), -1);
        assert_eq!(ceil_map(-0.5), 0);
    }

    #[test]
    fn test_status_codes_round_trip() {
        for status in [
            CrossingStatus::Found,
            CrossingStatus::NotFound,
            CrossingStatus::IllegalSearch,
        ] {
            assert_eq!(CrossingStatus::from_code(status.code()), Ok(status));
        }
        assert_eq!(
            CrossingStatus::from_code(0),
            Err(StatsError::InvalidStatus { code: 0 })
        );
    }

    #[test]
    fn test_found_solves_delta() {
        let tc = crossing(3, (3, 1, 0.5), (3, 2, 0.15));
        assert!(tc.is_found());
        assert_relative_eq!(tc.delta(), 0.3 / 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_rescale_stretches_around_centre() {
        let tc = crossing(5, (6, 1, 0.6), (7, 2, 0.1));
        let stretched = tc.rescaled(2.0);
        assert_eq!(stretched.super_point().scale, 7);
        assert_eq!(stretched.sub_point().scale, 9);
        assert_eq!(stretched.sub_point().frame, 4);

        let backward = ThresholdCrossing::found(
            5,
            CrossingPoint::new(4, -1, 0.6),
            CrossingPoint::new(3, -3, 0.1),
            DEFAULT_THRESHOLD,
        );
        let shrunk = backward.rescaled(0.7);
        // -1.4 and -2.1 both round away from zero
        assert_eq!(shrunk.sub_point().scale, 3);
        assert_eq!(shrunk.sub_point().frame, -3);
        assert_eq!(shrunk.super_point().frame, -1);
        assert_eq!(shrunk.delta(), backward.delta());
        assert_eq!(shrunk.status(), CrossingStatus::Found);
    }

    #[test]
    fn test_merge_with_not_found_returns_other() {
        let lost = ThresholdCrossing::not_found(
            2,
            CrossingPoint::new(2, 4, 0.4),
            CrossingPoint::new(2, 5, 0.3),
        );
        let found = crossing(2, (3, 1, 0.45), (4, 2, 0.05));

        assert_eq!(ThresholdCrossing::merge(&lost, &found, DEFAULT_THRESHOLD), found);
        assert_eq!(ThresholdCrossing::merge(&found, &lost, DEFAULT_THRESHOLD), found);

        let illegal = ThresholdCrossing::illegal(2);
        assert_eq!(
            ThresholdCrossing::merge(&illegal, &lost, DEFAULT_THRESHOLD),
            lost
        );
    }

    #[test]
    fn test_merge_picks_conservative_points() {
        let floor = crossing(4, (5, 1, 0.5), (5, 2, 0.1));
        let ceil = crossing(4, (5, 1, 0.3), (6, 2, 0.15));

        let merged = ThresholdCrossing::merge(&floor, &ceil, DEFAULT_THRESHOLD);
        assert_eq!(merged.super_point().xcorr, 0.3);
        assert_eq!(merged.sub_point(), CrossingPoint::new(6, 2, 0.15));
        assert_relative_eq!(merged.delta(), (0.2 - 0.3) / (0.15 - 0.3), epsilon = 1e-12);
        assert_eq!(merged.scale(), 4);
        assert!(merged.is_found());
    }

    #[test]
    fn test_illegal_pair() {
        let pair = ThresholdPair::illegal(1);
        assert!(!pair.both_found());
        assert_eq!(pair.tc1.status(), CrossingStatus::IllegalSearch);
        assert_eq!(pair.tc2.sub_point().scale, 1);
    }
}
