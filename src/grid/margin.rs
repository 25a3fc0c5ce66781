// MarginCalculator - combine per-scale access horizons into a valid sub-rectangle
//
// Each stage reads a neighbourhood around the cell it computes. The region
// descriptor of a scale records how far that neighbourhood reaches along
// both axes; the calculator turns the table into a margin that extends the
// margin of the stage's input.

use super::Margin;

/// How far a computation centred on one scale reads from its centre
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub low_scale_horizon: usize,
    pub high_scale_horizon: usize,
    pub low_frame_horizon: usize,
    pub high_frame_horizon: usize,
    /// Invalid scales are excluded from scale-offset selection
    pub valid: bool,
}

impl RegionDescriptor {
    pub fn new(
        low_scale_horizon: usize,
        high_scale_horizon: usize,
        low_frame_horizon: usize,
        high_frame_horizon: usize,
    ) -> Self {
        Self {
            low_scale_horizon,
            high_scale_horizon,
            low_frame_horizon,
            high_frame_horizon,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct MarginCalculator {
    descriptors: Vec<RegionDescriptor>,
}

impl MarginCalculator {
    /// Create a calculator with every scale marked invalid
    pub fn new(noof_scales: usize) -> Self {
        Self {
            descriptors: vec![RegionDescriptor::invalid(); noof_scales],
        }
    }

    pub fn noof_scales(&self) -> usize {
        self.descriptors.len()
    }

    pub fn set_region_descriptor(&mut self, scale: usize, descriptor: RegionDescriptor) {
        self.descriptors[scale] = descriptor;
    }

    pub fn region_descriptor(&self, scale: usize) -> RegionDescriptor {
        self.descriptors[scale]
    }

    /// Extend `in_margin` by the horizons of the registered scales
    ///
    /// # Arguments
    /// * `in_margin` - Margin of the stage input
    ///
    /// # Returns
    /// The output margin. When no scale can be computed from valid input the
    /// scale offsets are both set to the scale count and the frame offsets of
    /// `in_margin` are passed through.
    pub fn calc_margins(&self, in_margin: Margin) -> Margin {
        let noof_scales = self.descriptors.len();
        let degenerate = Margin {
            first_scale_offset: noof_scales,
            last_scale_offset: noof_scales,
            ..in_margin
        };

        let first = self.descriptors.iter().enumerate().find(|(scale, rd)| {
            rd.valid && *scale >= in_margin.first_scale_offset + rd.low_scale_horizon
        });
        let last = self.descriptors.iter().enumerate().rev().find(|(scale, rd)| {
            rd.valid && scale + in_margin.last_scale_offset + rd.high_scale_horizon < noof_scales
        });

        let (Some((_, first_rd)), Some((_, last_rd))) = (first, last) else {
            return degenerate;
        };

        let first_scale_offset = in_margin.first_scale_offset + first_rd.low_scale_horizon;
        let last_scale_offset = in_margin.last_scale_offset + last_rd.high_scale_horizon;
        if first_scale_offset + last_scale_offset >= noof_scales {
            return degenerate;
        }

        let band = first_scale_offset..noof_scales - last_scale_offset;
        let (first_frame_offset, last_frame_offset) = self.descriptors[band].iter().fold(
            (in_margin.first_frame_offset, in_margin.last_frame_offset),
            |(low, high), rd| {
                (
                    low.max(in_margin.first_frame_offset + rd.low_frame_horizon),
                    high.max(in_margin.last_frame_offset + rd.high_frame_horizon),
                )
            },
        );

        let out = Margin {
            first_frame_offset,
            last_frame_offset,
            first_scale_offset,
            last_scale_offset,
        };
        assert!(out.first_scale_offset + out.last_scale_offset < noof_scales);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_uniform_frame_horizon() {
        let mut calc = MarginCalculator::new(4);
        for scale in 0..4 {
            calc.set_region_descriptor(scale, RegionDescriptor::new(0, 0, 1, 1));
        }

        let out = calc.calc_margins(Margin::default());
        assert_eq!(out, Margin::new(1, 1, 0, 0));
    }

    #[test]
    fn test_frame_offsets_take_maximum_not_sum() {
        let mut calc = MarginCalculator::new(3);
        calc.set_region_descriptor(0, RegionDescriptor::new(0, 0, 2, 1));
        calc.set_region_descriptor(1, RegionDescriptor::new(0, 0, 5, 0));
        calc.set_region_descriptor(2, RegionDescriptor::new(0, 0, 1, 3));

        let out = calc.calc_margins(Margin::new(1, 2, 0, 0));
        assert_eq!(out.first_frame_offset, 6);
        assert_eq!(out.last_frame_offset, 5);
    }

    #[test]
    fn test_scale_horizons_shift_band() {
        let mut calc = MarginCalculator::new(6);
        for scale in 0..6 {
            calc.set_region_descriptor(scale, RegionDescriptor::new(2, 1, 0, 0));
        }

        let out = calc.calc_margins(Margin::default());
        assert_eq!(out.first_scale_offset, 2);
        assert_eq!(out.last_scale_offset, 1);
    }

    #[test]
    fn test_invalid_scales_are_skipped() {
        let mut calc = MarginCalculator::new(5);
        calc.set_region_descriptor(2, RegionDescriptor::new(0, 0, 1, 1));
        calc.set_region_descriptor(3, RegionDescriptor::new(0, 0, 4, 1));

        let out = calc.calc_margins(Margin::default());
        // scale 0 passes the scan condition but is invalid, so scale 2 is chosen
        assert_eq!(out.first_scale_offset, 0);
        assert_eq!(out.last_scale_offset, 0);
        assert_eq!(out.first_frame_offset, 4);
    }

    #[test]
    fn test_no_valid_scale_is_degenerate() {
        let calc = MarginCalculator::new(4);
        let out = calc.calc_margins(Margin::new(3, 2, 0, 0));

        assert_eq!(out.first_scale_offset, 4);
        assert_eq!(out.last_scale_offset, 4);
        assert_eq!(out.first_frame_offset, 3);
        assert_eq!(out.last_frame_offset, 2);
        assert!(out.is_degenerate(4));
    }

    #[test]
    fn test_overlapping_scale_offsets_are_degenerate() {
        let mut calc = MarginCalculator::new(4);
        for scale in 0..4 {
            calc.set_region_descriptor(scale, RegionDescriptor::new(2, 2, 0, 0));
        }

        let out = calc.calc_margins(Margin::default());
        assert!(out.is_degenerate(4));
    }

    #[test]
    fn test_margins_never_shrink() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let noof_scales = rng.gen_range(1..12);
            let mut calc = MarginCalculator::new(noof_scales);
            for scale in 0..noof_scales {
                let mut rd = RegionDescriptor::new(
                    rng.gen_range(0..3),
                    rng.gen_range(0..3),
                    rng.gen_range(0..6),
                    rng.gen_range(0..6),
                );
                rd.valid = rng.gen_bool(0.8);
                calc.set_region_descriptor(scale, rd);
            }

            let input = Margin::new(
                rng.gen_range(0..4),
                rng.gen_range(0..4),
                rng.gen_range(0..2),
                rng.gen_range(0..2),
            );
            let out = calc.calc_margins(input);
            assert!(out.contains(&input), "{:?} shrank to {:?}", input, out);
            if !out.is_degenerate(noof_scales) {
                assert!(out.first_scale_offset + out.last_scale_offset < noof_scales);
            }
        }
    }
}
