// Per-scale (mean, sigma) tables used to z-score PAS and texture output

use crate::grid::Grid;

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleMoments {
    mean: Vec<f64>,
    sigma: Vec<f64>,
}

impl ScaleMoments {
    /// Zero mean, unit sigma: normalization becomes a no-op
    pub fn identity(noof_scales: usize) -> Self {
        Self {
            mean: vec![0.0; noof_scales],
            sigma: vec![1.0; noof_scales],
        }
    }

    pub fn from_parts(mean: Vec<f64>, sigma: Vec<f64>) -> Self {
        assert_eq!(mean.len(), sigma.len());
        Self { mean, sigma }
    }

    /// Estimate moments of every valid scale over the valid frames of `grid`
    ///
    /// # Arguments
    /// * `grid` - Calibration output with its margin set
    /// * `scales` - Scales to estimate; others keep zero mean and unit sigma
    /// * `zero_mean` - Assume a zero mean and use the second moment only
    pub fn estimate<I>(grid: &Grid<'_>, scales: I, zero_mean: bool) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut moments = Self::identity(grid.noof_scales());
        let frames = grid.valid_frames();
        let n = frames.len() as f64;
        if frames.is_empty() {
            return moments;
        }

        for scale in scales {
            let (sum, squares) = frames.clone().fold((0.0, 0.0), |(sum, squares), frame| {
                let value = grid.element_at(scale, frame);
                (sum + value, squares + value * value)
            });

            let (mean, sigma) = if zero_mean {
                (0.0, (squares / n).sqrt())
            } else {
                let mean = sum / n;
                (mean, (squares / n - mean * mean).sqrt())
            };

            // a flat calibration row would turn every later value into inf
            if sigma > 0.0 && sigma.is_finite() {
                moments.mean[scale] = mean;
                moments.sigma[scale] = sigma;
            } else {
                log::warn!(
                    "[ScaleMoments] scale {} has no spread over {} frames, left unnormalized",
                    scale,
                    frames.len()
                );
            }
        }

        moments
    }

    pub fn noof_scales(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    #[inline]
    pub fn normalize(&self, scale: usize, value: f64) -> f64 {
        (value - self.mean[scale]) / self.sigma[scale]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Margin;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_is_noop() {
        let moments = ScaleMoments::identity(3);
        assert_eq!(moments.normalize(2, 4.5), 4.5);
    }

    #[test]
    fn test_zero_mean_uses_second_moment() {
        let data = vec![3.0, -3.0, 3.0, -3.0, 1.0, 1.0, 1.0, 1.0];
        let grid = Grid::new(&data, 2, 4);

        let moments = ScaleMoments::estimate(&grid, 0..2, true);
        assert_eq!(moments.mean(), &[0.0, 0.0]);
        assert_relative_eq!(moments.sigma()[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(moments.sigma()[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_full_moments_over_valid_frames() {
        // frames 0 and 3 lie in the margin and are ignored
        let data = vec![100.0, 1.0, 3.0, -100.0];
        let mut grid = Grid::new(&data, 1, 4);
        grid.set_margin(Margin::new(1, 1, 0, 0));

        let moments = ScaleMoments::estimate(&grid, [0], false);
        assert_relative_eq!(moments.mean()[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(moments.sigma()[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moments.normalize(0, 4.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_scale_keeps_identity() {
        let data = vec![2.0; 6];
        let grid = Grid::new(&data, 1, 6);
        let moments = ScaleMoments::estimate(&grid, [0], false);
        assert_eq!(moments, ScaleMoments::identity(1));
    }
}
