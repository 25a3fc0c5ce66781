// PasCalculator - pulse/tone/chirp activation signal
//
// For one descriptor type the calculator holds, per scale, the crossing pair
// along the descriptor's primary axis and the pair along its orthogonal
// axis. The PAS value of a cell is the cell itself minus the average of the
// two primary-axis boundary samples, each linearly blended between the
// crossing's super and sub points by its delta.

use super::crossing::{CrossingPoint, CrossingStatus, ThresholdCrossing, ThresholdPair};
use super::moments::ScaleMoments;
use crate::error::StatsError;
use crate::grid::{Grid, GridBuffer, Margin, MarginCalculator, RegionDescriptor};

/// Flat export of a fitted PAS calculator
///
/// Crossing slots run over the primary axis (scales `0..n`) followed by the
/// orthogonal axis (scales `n..2n`). Each slot packs
/// `scale_super, frame_super, scale_sub, frame_sub` for tc1 then tc2 into
/// `sample_points`, and two entries each into `status` and `deltas`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PasStats {
    pub noof_scales: usize,
    pub mean: Vec<f64>,
    pub sigma: Vec<f64>,
    pub sample_points: Vec<i32>,
    pub status: Vec<i32>,
    pub deltas: Vec<f64>,
    pub margin: Margin,
}

impl PasStats {
    fn write_slot(&mut self, slot: usize, pair: &ThresholdPair) {
        for (k, tc) in [pair.tc1, pair.tc2].iter().enumerate() {
            let (above, below) = (tc.super_point(), tc.sub_point());
            let base = slot * 8 + k * 4;
            self.sample_points[base..base + 4]
                .copy_from_slice(&[above.scale, above.frame, below.scale, below.frame]);
            self.status[slot * 2 + k] = tc.status().code();
            self.deltas[slot * 2 + k] = tc.delta();
        }
    }

    fn read_slot(&self, slot: usize, scale: usize) -> Result<ThresholdPair, StatsError> {
        let crossing = |k: usize| -> Result<ThresholdCrossing, StatsError> {
            let p = &self.sample_points[slot * 8 + k * 4..slot * 8 + k * 4 + 4];
            Ok(ThresholdCrossing::new(
                scale,
                CrossingPoint::new(p[0], p[1], 0.0),
                CrossingPoint::new(p[2], p[3], 0.0),
                self.deltas[slot * 2 + k],
                CrossingStatus::from_code(self.status[slot * 2 + k])?,
            ))
        };
        Ok(ThresholdPair::new(crossing(0)?, crossing(1)?))
    }

    fn check_layout(&self) -> Result<(), StatsError> {
        let n = self.noof_scales;
        let expected = [
            ("mean", self.mean.len(), n),
            ("sigma", self.sigma.len(), n),
            ("sample_points", self.sample_points.len(), 2 * n * 8),
            ("status", self.status.len(), 2 * n * 2),
            ("deltas", self.deltas.len(), 2 * n * 2),
        ];
        for (field, actual, expected) in expected {
            if actual != expected {
                return Err(StatsError::LayoutMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PasCalculator {
    noof_scales: usize,
    primary: Vec<ThresholdPair>,
    orthogonal: Vec<ThresholdPair>,
    normalize: bool,
    moments: ScaleMoments,
    margin: Margin,
    pas: GridBuffer,
}

impl PasCalculator {
    /// Create a calculator from per-scale crossing pairs
    ///
    /// # Panics
    /// If the primary and orthogonal tables differ in length
    pub fn new(
        primary: Vec<ThresholdPair>,
        orthogonal: Vec<ThresholdPair>,
        normalize: bool,
    ) -> Self {
        assert_eq!(primary.len(), orthogonal.len());
        let noof_scales = primary.len();
        Self {
            noof_scales,
            primary,
            orthogonal,
            normalize,
            moments: ScaleMoments::identity(noof_scales),
            margin: Margin::default(),
            pas: GridBuffer::zeroed(noof_scales, 0, Margin::default()),
        }
    }

    /// Rebuild a fitted calculator without rerunning any scans
    pub fn from_stats(stats: &PasStats, normalize: bool) -> Result<Self, StatsError> {
        stats.check_layout()?;
        let n = stats.noof_scales;

        let primary = (0..n)
            .map(|scale| stats.read_slot(scale, scale))
            .collect::<Result<Vec<_>, _>>()?;
        let orthogonal = (0..n)
            .map(|scale| stats.read_slot(n + scale, scale))
            .collect::<Result<Vec<_>, _>>()?;

        let mut calculator = Self::new(primary, orthogonal, normalize);
        calculator.margin = stats.margin;
        if normalize {
            calculator.moments = ScaleMoments::from_parts(stats.mean.clone(), stats.sigma.clone());
        }
        Ok(calculator)
    }

    /// Fix the margin against a calibration grid and, when normalizing,
    /// estimate the per-scale moments of its PAS
    ///
    /// # Arguments
    /// * `calibration` - Noise representation with the same scale count
    /// * `white` - Assume zero-mean PAS output (white calibration noise)
    pub fn initialize(&mut self, calibration: &Grid<'_>, white: bool) {
        assert_eq!(calibration.noof_scales(), self.noof_scales);
        self.set_margins(calibration.margin());

        if self.normalize {
            self.moments = ScaleMoments::identity(self.noof_scales);
            self.calc_pas(calibration);
            let fitted = self.fitted_scales();
            self.moments = ScaleMoments::estimate(&self.pas.view(), fitted, white);
            self.calc_pas(calibration);
        }
    }

    fn set_margins(&mut self, in_margin: Margin) {
        let mut calculator = MarginCalculator::new(self.noof_scales);
        for (scale, pair) in self.primary.iter().enumerate() {
            if !pair.both_found() {
                continue;
            }
            let (a, b) = (pair.tc1.sub_point(), pair.tc2.sub_point());
            let (low_frame, high_frame) = if a.frame < b.frame {
                (a.frame, b.frame)
            } else {
                (b.frame, a.frame)
            };
            let (low_scale, high_scale) = if a.scale < b.scale {
                (a.scale, b.scale)
            } else {
                (b.scale, a.scale)
            };
            let centre = scale as i32;

            calculator.set_region_descriptor(
                scale,
                RegionDescriptor::new(
                    (low_scale - centre).unsigned_abs() as usize,
                    (high_scale - centre).unsigned_abs() as usize,
                    low_frame.unsigned_abs() as usize,
                    high_frame.unsigned_abs() as usize,
                ),
            );
        }
        self.margin = calculator.calc_margins(in_margin);
        tracing::debug!(margin = ?self.margin, "pas margins set");
    }

    /// Compute the PAS of `input` into the owned buffer
    ///
    /// # Panics
    /// If `input` has a different scale count
    pub fn calc_pas(&mut self, input: &Grid<'_>) -> Grid<'_> {
        assert_eq!(
            input.noof_scales(),
            self.noof_scales,
            "pas calculator and input disagree on scale count"
        );

        let mut pas = GridBuffer::zeroed(self.noof_scales, input.noof_frames(), self.margin);
        for (scale, pair) in self.primary.iter().enumerate() {
            if pair.both_found() {
                self.calc_p4_scale(scale, pair, input, &mut pas);
            }
        }
        self.pas = pas;
        self.pas.view()
    }

    fn calc_p4_scale(
        &self,
        scale: usize,
        pair: &ThresholdPair,
        input: &Grid<'_>,
        pas: &mut GridBuffer,
    ) {
        let noof_frames = input.noof_frames() as i64;
        let samples = [pair.tc1, pair.tc2].map(|tc| {
            let (above, below) = (tc.super_point(), tc.sub_point());
            (above.scale, above.frame, below.scale, below.frame, tc.delta())
        });

        let in_scale_range = |s: i32| s >= 0 && (s as usize) < self.noof_scales;
        if !samples
            .iter()
            .all(|&(sp, _, sb, _, _)| in_scale_range(sp) && in_scale_range(sb))
        {
            log::warn!("[PasCalculator] scale {} has crossings outside the grid", scale);
            return;
        }

        // keep every shifted read inside the input
        let frames = self.margin.frame_range(input.noof_frames());
        let (mut first, mut end) = (frames.start as i64, frames.end as i64);
        for &(_, fp, _, fb, _) in &samples {
            for offset in [i64::from(fp), i64::from(fb)] {
                first = first.max(-offset);
                end = end.min(noof_frames - offset);
            }
        }

        let out = pas.as_mut_slice();
        for frame in first..end {
            let mut p = 0.0;
            for &(sp, fp, sb, fb, delta) in &samples {
                let above = input.element_at(sp as usize, (frame + i64::from(fp)) as usize);
                let below = input.element_at(sb as usize, (frame + i64::from(fb)) as usize);
                p -= (1.0 - delta) * above + delta * below;
            }
            p = p / 2.0 + input.element_at(scale, frame as usize);
            if self.normalize {
                p = self.moments.normalize(scale, p);
            }
            out[input.index(scale, frame as usize)] = p;
        }
    }

    /// Scales whose primary pair was found in both directions
    pub fn fitted_scales(&self) -> Vec<usize> {
        self.primary
            .iter()
            .enumerate()
            .filter(|(_, pair)| pair.both_found())
            .map(|(scale, _)| scale)
            .collect()
    }

    /// Latest PAS output with its margin
    pub fn pas(&self) -> Grid<'_> {
        self.pas.view()
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn noof_scales(&self) -> usize {
        self.noof_scales
    }

    pub fn is_normalized(&self) -> bool {
        self.normalize
    }

    pub fn moments(&self) -> &ScaleMoments {
        &self.moments
    }

    pub fn primary(&self) -> &[ThresholdPair] {
        &self.primary
    }

    pub fn orthogonal(&self) -> &[ThresholdPair] {
        &self.orthogonal
    }

    /// Export everything needed to rebuild this calculator
    pub fn stats(&self) -> PasStats {
        let n = self.noof_scales;
        let mut stats = PasStats {
            noof_scales: n,
            mean: self.moments.mean().to_vec(),
            sigma: self.moments.sigma().to_vec(),
            sample_points: vec![0; 2 * n * 8],
            status: vec![0; 2 * n * 2],
            deltas: vec![0.0; 2 * n * 2],
            margin: self.margin,
        };
        for scale in 0..n {
            stats.write_slot(scale, &self.primary[scale]);
            stats.write_slot(n + scale, &self.orthogonal[scale]);
        }
        stats
    }
}
