use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use structure_extractor::TfRepresentation;

/// White noise smoothed by a 3x3 box, so correlations fall to zero after
/// three scales or frames
pub fn smoothed_noise(noof_scales: usize, noof_frames: usize, seed: u64) -> TfRepresentation {
    let mut rng = StdRng::seed_from_u64(seed);
    let nf = noof_frames + 2;
    let white: Vec<f64> = (0..(noof_scales + 2) * nf)
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();

    let mut data = Vec::with_capacity(noof_scales * noof_frames);
    for scale in 0..noof_scales {
        for frame in 0..noof_frames {
            let mut sum = 0.0;
            for ds in 0..3 {
                for df in 0..3 {
                    sum += white[(scale + ds) * nf + frame + df];
                }
            }
            data.push(sum / 9.0);
        }
    }

    TfRepresentation {
        noof_scales,
        noof_frames,
        frame_rate: 100.0,
        data,
    }
}
