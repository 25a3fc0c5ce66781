// Correlator - per-scale moments, pairwise correlation and line scans
//
// Correlations between a scale series and a delayed cross-scale series are
// computed on demand while the extractor scans outward from each scale.
// Every value visited within the delay window is memoized in a dense cache
// that doubles as the exported correlation matrix.

use super::crossing::{CrossingPoint, RoundingMap, ThresholdCrossing};
use crate::grid::Grid;

/// Anything a line scan can read correlations from
pub trait CorrelationSource {
    fn noof_scales(&self) -> usize;

    /// Correlation at `delay` between `scale` and `xscale`, `None` when undefined
    fn correlation(&mut self, delay: i32, scale: usize, xscale: usize) -> Option<f64>;
}

/// Dense (scale, xscale, delay) store, delay in `[-max_delay, max_delay]`
#[derive(Debug, Clone)]
pub struct CorrelationCache {
    noof_scales: usize,
    max_delay: usize,
    values: Vec<f64>,
    visited: Vec<bool>,
}

impl CorrelationCache {
    pub fn new(noof_scales: usize, max_delay: usize) -> Self {
        let len = noof_scales * noof_scales * (2 * max_delay + 1);
        Self {
            noof_scales,
            max_delay,
            values: vec![0.0; len],
            visited: vec![false; len],
        }
    }

    pub fn noof_delays(&self) -> usize {
        2 * self.max_delay + 1
    }

    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    fn index(&self, delay: i32, scale: usize, xscale: usize) -> Option<usize> {
        if delay.unsigned_abs() as usize > self.max_delay {
            return None;
        }
        let offset = (delay + self.max_delay as i32) as usize;
        Some((scale * self.noof_scales + xscale) * self.noof_delays() + offset)
    }

    pub fn get(&self, delay: i32, scale: usize, xscale: usize) -> Option<f64> {
        let index = self.index(delay, scale, xscale)?;
        self.visited[index].then(|| self.values[index])
    }

    /// Store a value; delays outside the window are dropped
    pub fn insert(&mut self, delay: i32, scale: usize, xscale: usize, value: f64) {
        if let Some(index) = self.index(delay, scale, xscale) {
            self.values[index] = value;
            self.visited[index] = true;
        }
    }

    /// Flat matrix, unvisited cells read as zero
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Correlation engine over one calibration grid
pub struct Correlator<'a> {
    grid: Grid<'a>,
    means: Vec<f64>,
    stddevs: Vec<f64>,
    cache: CorrelationCache,
}

impl<'a> Correlator<'a> {
    /// Compute per-scale moments and seed the zero-delay autocorrelations
    pub fn new(grid: Grid<'a>, max_delay: usize) -> Self {
        let noof_scales = grid.noof_scales();
        let noof_frames = grid.noof_frames();
        let n = noof_frames as f64;

        let mut means = vec![0.0; noof_scales];
        let mut stddevs = vec![0.0; noof_scales];
        for scale in 0..noof_scales {
            let row = &grid.as_slice()[grid.index(scale, 0)..grid.index(scale, 0) + noof_frames];
            let (sum, squares) = row
                .iter()
                .fold((0.0, 0.0), |(sum, squares), x| (sum + x, squares + x * x));

            let mean = sum / n;
            let variance = squares - n * mean * mean;
            means[scale] = mean;
            stddevs[scale] = if variance > n * f64::EPSILON {
                (variance / (n - 1.0)).sqrt()
            } else {
                0.0
            };
        }

        let mut cache = CorrelationCache::new(noof_scales, max_delay);
        // flat scales have no defined autocorrelation
        for scale in (0..noof_scales).filter(|&scale| stddevs[scale] > 0.0) {
            cache.insert(0, scale, scale, 1.0);
        }

        tracing::debug!(
            noof_scales,
            noof_frames,
            max_delay,
            "correlator moments computed"
        );

        Self {
            grid,
            means,
            stddevs,
            cache,
        }
    }

    pub fn mean(&self, scale: usize) -> f64 {
        self.means[scale]
    }

    pub fn stddev(&self, scale: usize) -> f64 {
        self.stddevs[scale]
    }

    pub fn max_delay(&self) -> usize {
        self.cache.max_delay()
    }

    /// Normalized cross-correlation over the overlapping frames
    ///
    /// # Returns
    /// `None` when at most one frame overlaps or either series has zero
    /// variance.
    pub fn calc_correlation(&self, delay: i32, scale: usize, xscale: usize) -> Option<f64> {
        let noof_frames = self.grid.noof_frames() as i64;
        let delay = i64::from(delay);
        let first = 0i64.max(-delay);
        let end = noof_frames.min(noof_frames - delay);
        let count = end - first;
        if count <= 1 {
            return None;
        }

        let norm = self.stddevs[scale] * self.stddevs[xscale];
        if norm == 0.0 {
            return None;
        }

        let (mean, xmean) = (self.means[scale], self.means[xscale]);
        let sum: f64 = (first..end)
            .map(|frame| {
                let x = self.grid.element_at(scale, frame as usize) - mean;
                let y = self.grid.element_at(xscale, (frame + delay) as usize) - xmean;
                x * y
            })
            .sum();

        Some(sum / ((count - 1) as f64 * norm))
    }

    /// Fill every cell of the correlation matrix
    pub fn compute_full_matrix(&mut self) {
        let noof_scales = self.grid.noof_scales();
        let max_delay = self.cache.max_delay() as i32;
        for scale in 0..noof_scales {
            for xscale in 0..noof_scales {
                for delay in -max_delay..=max_delay {
                    self.correlation(delay, scale, xscale);
                }
            }
        }
    }

    pub fn correlation_matrix(&self) -> &[f64] {
        self.cache.as_slice()
    }

    pub fn scan_line_from_origin(
        &mut self,
        scale: usize,
        dscale: i32,
        dframe: i32,
        threshold: f64,
    ) -> ThresholdCrossing {
        scan_line_from_origin(self, scale, dscale, dframe, threshold)
    }

    pub fn scan_line_rational(
        &mut self,
        scale: usize,
        dscale: f64,
        dframe: f64,
        map: RoundingMap,
        threshold: f64,
    ) -> ThresholdCrossing {
        scan_line_rational(self, scale, dscale, dframe, map, threshold)
    }
}

impl CorrelationSource for Correlator<'_> {
    fn noof_scales(&self) -> usize {
        self.grid.noof_scales()
    }

    fn correlation(&mut self, delay: i32, scale: usize, xscale: usize) -> Option<f64> {
        if let Some(cached) = self.cache.get(delay, scale, xscale) {
            return Some(cached);
        }
        let value = self.calc_correlation(delay, scale, xscale)?;
        self.cache.insert(delay, scale, xscale, value);
        Some(value)
    }
}

/// Walk an integer direction from (scale, delay 0) until the correlation
/// drops to `threshold`
///
/// # Arguments
/// * `dscale`, `dframe` - Step per sample; (0, 0) is an illegal search
///
/// # Returns
/// A found crossing between the last sample above the threshold and the
/// first below it, or a not-found crossing when the scan leaves the scale
/// range, stops exactly on the threshold or the correlation becomes
/// undefined first.
pub fn scan_line_from_origin<S: CorrelationSource + ?Sized>(
    source: &mut S,
    scale: usize,
    dscale: i32,
    dframe: i32,
    threshold: f64,
) -> ThresholdCrossing {
    if dscale == 0 && dframe == 0 {
        return ThresholdCrossing::illegal(scale);
    }

    let mut step = 0;
    scan(source, scale, threshold, |_| {
        step += 1;
        (scale as i32 + step * dscale, step * dframe)
    })
}

/// Walk a fractional direction, mapping the minor axis to integers with `map`
///
/// The major axis (larger magnitude) advances one sample per step; the minor
/// coordinate follows the exact line and is rounded by `map`. A zero
/// component is an illegal search, axis-aligned scans use
/// [`scan_line_from_origin`].
pub fn scan_line_rational<S: CorrelationSource + ?Sized>(
    source: &mut S,
    scale: usize,
    dscale: f64,
    dframe: f64,
    map: RoundingMap,
    threshold: f64,
) -> ThresholdCrossing {
    if dscale == 0.0 || dframe == 0.0 {
        return ThresholdCrossing::illegal(scale);
    }

    let centre = scale as i32;
    let mut step = 0;
    if dscale.abs() < dframe.abs() {
        let direction = dframe.signum() as i32;
        scan(source, scale, threshold, |_| {
            step += direction;
            (centre + map(dscale / dframe * f64::from(step)), step)
        })
    } else {
        let direction = dscale.signum() as i32;
        scan(source, scale, threshold, |_| {
            step += direction;
            (centre + step, map(dframe / dscale * f64::from(step)))
        })
    }
}

fn scan<S, F>(source: &mut S, scale: usize, threshold: f64, mut next: F) -> ThresholdCrossing
where
    S: CorrelationSource + ?Sized,
    F: FnMut(&CrossingPoint) -> (i32, i32),
{
    let noof_scales = source.noof_scales() as i32;
    let mut previous = CrossingPoint::origin(scale);

    loop {
        let (xscale, delay) = next(&previous);
        if xscale < 0 || xscale >= noof_scales {
            let outside = CrossingPoint::new(xscale, delay, f64::NAN);
            return ThresholdCrossing::not_found(scale, previous, outside);
        }

        let xcorr = source.correlation(delay, scale, xscale as usize);
        let point = CrossingPoint::new(xscale, delay, xcorr.unwrap_or(f64::NAN));
        match xcorr {
            Some(value) if value < threshold => {
                return ThresholdCrossing::found(scale, previous, point, threshold)
            }
            Some(value) if value > threshold => previous = point,
            // exactly on the threshold or NaN: no crossing to interpolate
            Some(_) | None => return ThresholdCrossing::not_found(scale, previous, point),
        }
    }
}
