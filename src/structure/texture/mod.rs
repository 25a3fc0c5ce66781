// TextureCalculator - windowed PAS energy over per-scale context areas
//
// The texture of a cell is the mean squared PAS over the cell's context
// area. The first valid frame of a scale is summed in full; every later
// frame slides the window by one, removing the column leaving each interval
// and adding the column entering it.

pub mod context;

pub use context::{ContextArea, ContextInterval};

use super::moments::ScaleMoments;
use super::pas::PasCalculator;
use crate::error::StatsError;
use crate::grid::{Grid, GridBuffer, Margin, MarginCalculator};

/// Flat export of a fitted texture calculator
///
/// `context_areas` holds three `noof_scales x noof_scales` planes per
/// scale: at `scale * 3n + run_scale` the start frame, `+ n` the end frame
/// and `+ 2n` the run scale itself. Run scales without an interval export
/// `start == end == 0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextureStats {
    pub noof_scales: usize,
    pub mean: Vec<f64>,
    pub sigma: Vec<f64>,
    pub area_sizes: Vec<i32>,
    pub context_areas: Vec<i32>,
    pub margin: Margin,
}

#[derive(Debug, Clone)]
pub struct TextureCalculator {
    noof_scales: usize,
    areas: Vec<ContextArea>,
    area_sizes: Vec<i32>,
    normalize: bool,
    moments: ScaleMoments,
    margin: Margin,
    texture: GridBuffer,
}

impl TextureCalculator {
    /// Build context areas from the crossings held by `pas` and, when the
    /// PAS is normalized, fit texture moments on its current output
    ///
    /// # Arguments
    /// * `pas` - Initialized PAS calculator whose output is the calibration PAS
    /// * `primary_factor` - Stretch of the primary-axis crossings
    /// * `orthogonal_factor` - Stretch of the orthogonal-axis crossings
    pub fn new(pas: &PasCalculator, primary_factor: f64, orthogonal_factor: f64) -> Self {
        let noof_scales = pas.noof_scales();
        let areas: Vec<ContextArea> = (0..noof_scales)
            .map(|scale| {
                ContextArea::build(
                    scale,
                    &pas.primary()[scale],
                    &pas.orthogonal()[scale],
                    noof_scales,
                    primary_factor,
                    orthogonal_factor,
                )
            })
            .collect();

        let mut calculator = Self::with_areas(areas, pas.is_normalized(), noof_scales);
        calculator.margin = calculator.calc_margins(pas.margin());

        if calculator.normalize {
            calculator.initialize(&pas.pas());
        }
        tracing::debug!(
            noof_scales,
            margin = ?calculator.margin,
            empty_areas = calculator.areas.iter().filter(|a| a.is_empty()).count(),
            "texture calculator built"
        );
        calculator
    }

    fn with_areas(areas: Vec<ContextArea>, normalize: bool, noof_scales: usize) -> Self {
        let area_sizes = areas.iter().map(ContextArea::area_size).collect();
        Self {
            noof_scales,
            areas,
            area_sizes,
            normalize,
            moments: ScaleMoments::identity(noof_scales),
            margin: Margin::default(),
            texture: GridBuffer::zeroed(noof_scales, 0, Margin::default()),
        }
    }

    /// Rebuild a fitted calculator paired with `pas`
    pub fn from_stats(pas: &PasCalculator, stats: &TextureStats) -> Result<Self, StatsError> {
        let n = stats.noof_scales;
        let expected = [
            ("noof_scales", n, pas.noof_scales()),
            ("mean", stats.mean.len(), n),
            ("sigma", stats.sigma.len(), n),
            ("area_sizes", stats.area_sizes.len(), n),
            ("context_areas", stats.context_areas.len(), 3 * n * n),
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

        let mut areas = Vec::with_capacity(n);
        for scale in 0..n {
            let base = scale * 3 * n;
            let mut intervals = Vec::with_capacity(n);
            for run_scale in 0..n {
                let found = stats.context_areas[base + 2 * n + run_scale];
                if found != run_scale as i32 {
                    return Err(StatsError::ContextAreaMismatch {
                        scale,
                        run_scale,
                        found,
                    });
                }
                intervals.push(ContextInterval {
                    run_scale,
                    start: stats.context_areas[base + run_scale],
                    end: stats.context_areas[base + n + run_scale],
                });
            }
            areas.push(ContextArea::from_intervals(scale, intervals));
        }

        let mut calculator = Self::with_areas(areas, pas.is_normalized(), n);
        calculator.area_sizes = stats.area_sizes.clone();
        calculator.margin = stats.margin;
        if calculator.normalize {
            calculator.moments = ScaleMoments::from_parts(stats.mean.clone(), stats.sigma.clone());
        }
        Ok(calculator)
    }

    fn calc_margins(&self, pas_margin: Margin) -> Margin {
        let mut calculator = MarginCalculator::new(self.noof_scales);
        for area in &self.areas {
            calculator.set_region_descriptor(area.scale(), area.region_descriptor());
        }
        calculator.calc_margins(pas_margin)
    }

    fn initialize(&mut self, calibration_pas: &Grid<'_>) {
        self.moments = ScaleMoments::identity(self.noof_scales);
        self.calc_texture(calibration_pas);

        let view = self.texture.view();
        let scales: Vec<usize> = self
            .areas
            .iter()
            .filter(|area| !area.is_empty() && view.is_valid(area.scale()))
            .map(ContextArea::scale)
            .collect();
        self.moments = ScaleMoments::estimate(&view, scales, false);
    }

    /// Compute the texture of a PAS grid into the owned buffer
    ///
    /// # Panics
    /// If `pas` has a different scale count
    pub fn calc_texture(&mut self, pas: &Grid<'_>) -> Grid<'_> {
        assert_eq!(
            pas.noof_scales(),
            self.noof_scales,
            "texture calculator and pas disagree on scale count"
        );

        let mut texture = GridBuffer::zeroed(self.noof_scales, pas.noof_frames(), self.margin);
        for area in &self.areas {
            self.calc_b4_context_area(area, pas, &mut texture);
        }
        self.texture = texture;
        self.texture.view()
    }

    fn calc_b4_context_area(&self, area: &ContextArea, pas: &Grid<'_>, texture: &mut GridBuffer) {
        let scale = area.scale();
        let area_size = self.area_sizes[scale];
        if area.is_empty() || area_size <= 0 || !texture.view().is_valid(scale) {
            return;
        }

        let Some(frames) = sliding_range(area, &self.margin, pas.noof_frames()) else {
            return;
        };

        let row = texture.view().index(scale, 0);
        let out = &mut texture.as_mut_slice()[row..row + pas.noof_frames()];
        out[frames.start] = context_energy(area, pas, frames.start);

        for frame in frames.start + 1..frames.end {
            let mut energy = out[frame - 1];
            for interval in area.intervals().iter().filter(|i| !i.is_empty()) {
                let leaving = (frame as i64 + i64::from(interval.start) - 1) as usize;
                let entering = (frame as i64 + i64::from(interval.end)) as usize;
                energy -= pas.element_at(interval.run_scale, leaving).powi(2);
                energy += pas.element_at(interval.run_scale, entering).powi(2);
            }
            out[frame] = energy;
        }

        let size = f64::from(area_size);
        for value in &mut out[frames] {
            *value /= size;
            if self.normalize {
                *value = self.moments.normalize(scale, *value);
            }
        }
    }

    /// Latest texture output with its margin
    pub fn texture(&self) -> Grid<'_> {
        self.texture.view()
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn noof_scales(&self) -> usize {
        self.noof_scales
    }

    pub fn context_area(&self, scale: usize) -> &ContextArea {
        &self.areas[scale]
    }

    pub fn area_sizes(&self) -> &[i32] {
        &self.area_sizes
    }

    pub fn moments(&self) -> &ScaleMoments {
        &self.moments
    }

    /// Export everything needed to rebuild this calculator
    pub fn stats(&self) -> TextureStats {
        let n = self.noof_scales;
        let mut context_areas = vec![0; 3 * n * n];
        for (scale, area) in self.areas.iter().enumerate() {
            let base = scale * 3 * n;
            for run_scale in 0..n {
                context_areas[base + 2 * n + run_scale] = run_scale as i32;
            }
            for interval in area.intervals() {
                context_areas[base + interval.run_scale] = interval.start;
                context_areas[base + n + interval.run_scale] = interval.end;
            }
        }

        TextureStats {
            noof_scales: n,
            mean: self.moments.mean().to_vec(),
            sigma: self.moments.sigma().to_vec(),
            area_sizes: self.area_sizes.clone(),
            context_areas,
            margin: self.margin,
        }
    }
}

/// Valid frames of the texture margin for which every interval read stays
/// inside the PAS grid
fn sliding_range(
    area: &ContextArea,
    margin: &Margin,
    noof_frames: usize,
) -> Option<std::ops::Range<usize>> {
    let valid = margin.frame_range(noof_frames);
    let (mut first, mut end) = (valid.start as i64, valid.end as i64);
    for interval in area.intervals().iter().filter(|i| !i.is_empty()) {
        first = first.max(-i64::from(interval.start));
        end = end.min(noof_frames as i64 - i64::from(interval.end));
    }
    (first < end).then(|| first as usize..end as usize)
}

/// Sum of squared PAS over the context area centred on `frame`
pub fn context_energy(area: &ContextArea, pas: &Grid<'_>, frame: usize) -> f64 {
    area.intervals()
        .iter()
        .filter(|interval| !interval.is_empty())
        .map(|interval| {
            let first = (frame as i64 + i64::from(interval.start)) as usize;
            let last = (frame as i64 + i64::from(interval.end)) as usize;
            (first..=last)
                .map(|run_frame| pas.element_at(interval.run_scale, run_frame).powi(2))
                .sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::crossing::{
        CrossingPoint, ThresholdCrossing, ThresholdPair, DEFAULT_THRESHOLD,
    };
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn found(scale: usize, sub_scale: i32, sub_frame: i32) -> ThresholdCrossing {
        ThresholdCrossing::found(
            scale,
            CrossingPoint::new(scale as i32, 0, 0.9),
            CrossingPoint::new(sub_scale, sub_frame, 0.1),
            DEFAULT_THRESHOLD,
        )
    }

    fn pulse_calculator(noof_scales: usize, normalize: bool) -> PasCalculator {
        let primary = (0..noof_scales)
            .map(|scale| ThresholdPair::new(found(scale, scale as i32, 2), found(scale, scale as i32, -2)))
            .collect();
        let orthogonal = (0..noof_scales)
            .map(|scale| {
                let s = scale as i32;
                ThresholdPair::new(found(scale, s + 1, 0), found(scale, s - 1, 0))
            })
            .collect();
        PasCalculator::new(primary, orthogonal, normalize)
    }

    fn random_grid(rng: &mut StdRng, noof_scales: usize, noof_frames: usize) -> Vec<f64> {
        (0..noof_scales * noof_frames)
            .map(|_| rng.gen_range(-2.0..2.0))
            .collect()
    }

    #[test]
    fn test_sliding_window_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let noof_scales = rng.gen_range(1..6);
            let noof_frames = rng.gen_range(20..60);
            let pas_data = random_grid(&mut rng, noof_scales, noof_frames);
            let pas = Grid::new(&pas_data, noof_scales, noof_frames);

            let scale = rng.gen_range(0..noof_scales);
            let intervals = (0..noof_scales)
                .map(|run_scale| {
                    let start = rng.gen_range(-5..3);
                    ContextInterval {
                        run_scale,
                        start,
                        end: start + rng.gen_range(0..6),
                    }
                })
                .collect();
            let area = ContextArea::from_intervals(scale, intervals);
            if area.is_empty() {
                continue;
            }

            let mut areas: Vec<ContextArea> =
                (0..noof_scales).map(ContextArea::empty).collect();
            areas[scale] = area.clone();
            let mut calculator = TextureCalculator::with_areas(areas, false, noof_scales);
            calculator.margin = calculator.calc_margins(Margin::default());

            let texture = calculator.calc_texture(&pas);
            let frames = sliding_range(&area, &texture.margin(), noof_frames)
                .expect("frames remain");
            let size = f64::from(area.area_size());
            for frame in frames {
                let brute = context_energy(&area, &pas, frame) / size;
                assert_relative_eq!(texture.element_at(scale, frame), brute, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_margin_composes_on_pas_margin() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = random_grid(&mut rng, 8, 64);
        let grid = Grid::new(&data, 8, 64);
        let mut pas = pulse_calculator(8, false);
        pas.initialize(&grid, true);

        let texture = TextureCalculator::new(&pas, 0.7, 2.0);
        assert!(texture.margin().contains(&pas.margin()));
        assert!(texture.margin().first_frame_offset > pas.margin().first_frame_offset);
        // interior scales see the full diamond, edge scales leave the range
        assert!(!texture.context_area(4).is_empty());
        assert!(texture.context_area(0).is_empty());
        assert!(texture.context_area(7).is_empty());
    }

    #[test]
    fn test_normalized_texture_has_unit_moments() {
        let mut rng = StdRng::seed_from_u64(2);
        let data = random_grid(&mut rng, 8, 300);
        let grid = Grid::new(&data, 8, 300);
        let mut pas = pulse_calculator(8, true);
        pas.initialize(&grid, true);
        let mut texture = TextureCalculator::new(&pas, 0.7, 2.0);

        let out = texture.calc_texture(&pas.pas());
        let frames = out.valid_frames();
        let n = frames.len() as f64;
        let values: Vec<f64> = frames.map(|f| out.element_at(4, f)).collect();
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| v * v).sum::<f64>() / n - mean * mean;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        assert_relative_eq!(var, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_stats_round_trip_reproduces_texture() {
        let mut rng = StdRng::seed_from_u64(3);
        let calibration = random_grid(&mut rng, 6, 200);
        let input = random_grid(&mut rng, 6, 80);
        let mut pas = pulse_calculator(6, true);
        pas.initialize(&Grid::new(&calibration, 6, 200), true);
        let mut fitted = TextureCalculator::new(&pas, 0.7, 2.0);

        let pas_out = pas.calc_pas(&Grid::new(&input, 6, 80)).as_slice().to_vec();
        let pas_view = Grid::new(&pas_out, 6, 80);
        let expected = fitted.calc_texture(&pas_view).as_slice().to_vec();

        let stats = fitted.stats();
        let mut restored = TextureCalculator::from_stats(&pas, &stats).unwrap();
        assert_eq!(restored.calc_texture(&pas_view).as_slice(), expected.as_slice());
        assert_eq!(restored.stats(), stats);
    }

    #[test]
    fn test_stats_reject_bad_run_scale_plane() {
        let pas = pulse_calculator(3, false);
        let mut stats = TextureCalculator::new(&pas, 0.7, 2.0).stats();
        stats.context_areas[3 * 3 + 2 * 3 + 1] = 0;

        assert_eq!(
            TextureCalculator::from_stats(&pas, &stats).unwrap_err(),
            StatsError::ContextAreaMismatch {
                scale: 1,
                run_scale: 1,
                found: 0
            }
        );
    }

    #[test]
    fn test_stats_reject_scale_count_mismatch() {
        let pas = pulse_calculator(3, false);
        let other = pulse_calculator(4, false);
        let stats = TextureCalculator::new(&other, 0.7, 2.0).stats();
        assert!(matches!(
            TextureCalculator::from_stats(&pas, &stats),
            Err(StatsError::LayoutMismatch {
                field: "noof_scales",
                ..
            })
        ));
    }
}
