//! End-to-end behaviour of the public API on synthetic chunks.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::testing::{
    checkerboard, init_tracing, noise, reversed_padded, sparse_weights, transpose,
};
use crate::{
    Axis, ClipReport, ClipperConfig, Downsampler, Error, ErrorKind, IntensityClipper, KernelFamily,
    Strided, StridedMut, Upsampler,
};

const AXES: [Axis; 3] = [Axis::Time, Axis::Freq, Axis::Joint];

fn clip_dense(config: ClipperConfig, intensity: &[f32], weights: &mut [f32]) -> ClipReport {
    let stride = config.nt_chunk as isize;
    IntensityClipper::new(config)
        .unwrap()
        .clip(Strided::new(intensity, stride), StridedMut::new(weights, stride))
        .unwrap()
}

#[test]
fn test_factor_three_rejected_and_twenty_four_accepted_everywhere() {
    init_tracing();

    for (df, dt) in [(3, 1), (1, 3)] {
        assert_eq!(
            Downsampler::new(df, dt).unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Upsampler::new(df, dt).unwrap_err().kind(),
            ErrorKind::Configuration
        );
        for axis in AXES {
            let config = ClipperConfig::new(48, 192, axis, 3.0).with_downsampling(df, dt);
            assert_eq!(
                IntensityClipper::new(config).unwrap_err().kind(),
                ErrorKind::Configuration
            );
        }
    }

    assert!(Downsampler::new(24, 24).is_ok());
    assert!(Upsampler::new(24, 24).is_ok());
    for axis in AXES {
        let config = ClipperConfig::new(48, 192, axis, 3.0).with_downsampling(24, 24);
        assert!(IntensityClipper::new(config).is_ok(), "{axis}");
    }
}

#[test]
fn test_supported_pairs_match_tables() {
    for df in [1, 2, 4, 8, 16, 24, 32] {
        for dt in [1, 2, 4, 8, 16, 24, 32] {
            assert!(KernelFamily::Downsample.is_supported(df, dt));
            assert!(KernelFamily::Upsample.is_supported(df, dt));
            assert!(Downsampler::new(df, dt).is_ok());
            assert!(Upsampler::new(df, dt).is_ok());
        }
    }
    for df in [3, 5, 6, 7, 9, 12, 20] {
        assert!(!KernelFamily::Downsample.is_supported(df, 1));
        assert!(!KernelFamily::Upsample.is_supported(1, df));
    }
}

#[test]
fn test_chunk_not_divisible_by_eight_fails_before_clipping() {
    for axis in AXES {
        let err = IntensityClipper::new(ClipperConfig::new(16, 60, axis, 3.0)).unwrap_err();
        assert_eq!(
            err,
            Error::NotDivisible {
                name: "nt_chunk",
                value: 60,
                divisor: 8
            }
        );
    }
}

#[test]
fn test_no_outliers_leaves_weights_unchanged() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(101);
    let (nfreq, nt) = (64, 128);

    for axis in AXES {
        for (df, dt) in [(1, 1), (2, 2), (4, 8), (1, 16)] {
            for two_pass in [false, true] {
                let base = checkerboard(nfreq, nt, df, dt);
                let jitter = noise(&mut rng, nfreq * nt, 0.25);
                let intensity: Vec<f32> = base.iter().zip(&jitter).map(|(b, j)| b + j).collect();
                let mut weights = sparse_weights(&mut rng, nfreq * nt, 0.05);
                let before = weights.clone();

                let config = ClipperConfig::new(nfreq, nt, axis, 3.0)
                    .with_downsampling(df, dt)
                    .with_iterations(3, 3.0)
                    .with_two_pass(two_pass);
                let report = clip_dense(config, &intensity, &mut weights);

                let label = format!("{axis} (Df,Dt)=({df},{dt}) two_pass={two_pass}");
                assert_eq!(report.rejected, 0, "{label}");
                assert_eq!(weights, before, "{label}");
            }
        }
    }
}

#[test]
fn test_single_outlier_masks_exactly_its_block() {
    let (nfreq, nt, df, dt) = (64, 64, 2, 2);
    let mut intensity = checkerboard(nfreq, nt, df, dt);
    intensity[10 * nt + 10] = 1000.0;

    for axis in AXES {
        let mut weights = vec![1.0f32; nfreq * nt];
        let config = ClipperConfig::new(nfreq, nt, axis, 3.0).with_downsampling(df, dt);
        let report = clip_dense(config, &intensity, &mut weights);

        assert_eq!(report.rejected, 1, "{axis}");
        for f in 0..nfreq {
            for t in 0..nt {
                let masked = (10..12).contains(&f) && (10..12).contains(&t);
                let expected = if masked { 0.0 } else { 1.0 };
                assert_eq!(weights[f * nt + t], expected, "{axis} at ({f},{t})");
            }
        }
    }
}

#[test]
fn test_iter_sigma_has_no_effect_with_one_iteration() {
    let mut rng = StdRng::seed_from_u64(7);
    let (nfreq, nt) = (32, 64);
    let mut intensity = noise(&mut rng, nfreq * nt, 1.0);
    intensity[5 * nt + 17] = 40.0;
    intensity[20 * nt + 3] = -25.0;
    let weights = sparse_weights(&mut rng, nfreq * nt, 0.1);

    for axis in AXES {
        let base = ClipperConfig::new(nfreq, nt, axis, 2.0).with_downsampling(2, 2);

        let mut loose = weights.clone();
        let loose_report = clip_dense(base.with_iterations(1, 100.0), &intensity, &mut loose);
        let mut tight = weights.clone();
        let tight_report = clip_dense(base.with_iterations(1, 0.1), &intensity, &mut tight);

        assert_eq!(loose, tight, "{axis}");
        assert_eq!(loose_report, tight_report, "{axis}");
    }
}

#[test]
fn test_extra_iterations_reject_more() {
    let mut rng = StdRng::seed_from_u64(31);
    let (nfreq, nt) = (32, 64);
    let mut intensity = noise(&mut rng, nfreq * nt, 1.0);
    // A large outlier inflates the first variance enough to hide a moderate one.
    intensity[4 * nt + 8] = 400.0;
    intensity[4 * nt + 40] = 12.0;
    let weights = vec![1.0f32; nfreq * nt];

    let base = ClipperConfig::new(nfreq, nt, Axis::Time, 3.0);

    let mut once = weights.clone();
    clip_dense(base, &intensity, &mut once);
    assert_eq!(once[4 * nt + 8], 0.0);
    assert_eq!(once[4 * nt + 40], 1.0);

    let mut twice = weights.clone();
    clip_dense(base.with_iterations(2, 3.0), &intensity, &mut twice);
    assert_eq!(twice[4 * nt + 8], 0.0);
    assert_eq!(twice[4 * nt + 40], 0.0);
}

#[test]
fn test_time_and_freq_agree_on_symmetric_data() {
    let (n, d) = (64, 2);
    let mut intensity = checkerboard(n, n, d, d);
    intensity[10 * n + 10] = 1000.0;
    intensity[41 * n + 41] = -800.0;

    let mut time_weights = vec![1.0f32; n * n];
    let mut freq_weights = vec![1.0f32; n * n];
    let config = ClipperConfig::new(n, n, Axis::Time, 3.0).with_downsampling(d, d);
    clip_dense(config, &intensity, &mut time_weights);
    clip_dense(
        ClipperConfig {
            axis: Axis::Freq,
            ..config
        },
        &intensity,
        &mut freq_weights,
    );

    assert_eq!(time_weights, freq_weights);
    assert_eq!(time_weights.iter().filter(|&&w| w == 0.0).count(), 8);
}

#[test]
fn test_freq_axis_is_time_axis_transposed() {
    let mut rng = StdRng::seed_from_u64(55);
    let n = 64;
    let mut intensity = noise(&mut rng, n * n, 1.0);
    intensity[3 * n + 50] = 90.0;
    intensity[33 * n + 12] = -70.0;
    let weights = sparse_weights(&mut rng, n * n, 0.05);

    for (df, dt) in [(1, 1), (2, 4), (8, 8)] {
        let config = ClipperConfig::new(n, n, Axis::Time, 3.0).with_downsampling(df, dt);
        let mut time_weights = weights.clone();
        clip_dense(config, &intensity, &mut time_weights);

        let intensity_t = transpose(&intensity, n, n);
        let mut freq_weights = transpose(&weights, n, n);
        let config_t = ClipperConfig {
            axis: Axis::Freq,
            ..config.with_downsampling(dt, df)
        };
        clip_dense(config_t, &intensity_t, &mut freq_weights);

        assert_eq!(
            transpose(&freq_weights, n, n),
            time_weights,
            "(Df,Dt)=({df},{dt})"
        );
    }
}

#[test]
fn test_joint_over_one_coarse_row_matches_time_axis() {
    let mut rng = StdRng::seed_from_u64(77);
    let (df, dt, nt) = (4, 2, 128);
    let mut intensity = noise(&mut rng, df * nt, 1.0);
    intensity[nt + 31] = 300.0;
    let mut weights = sparse_weights(&mut rng, df * nt, 0.1);
    weights[nt + 31] = 1.0;

    for two_pass in [false, true] {
        let time = ClipperConfig::new(df, nt, Axis::Time, 2.5)
            .with_downsampling(df, dt)
            .with_iterations(2, 3.5)
            .with_two_pass(two_pass);
        let joint = ClipperConfig {
            axis: Axis::Joint,
            ..time
        };

        let mut time_weights = weights.clone();
        let time_report = clip_dense(time, &intensity, &mut time_weights);
        let mut joint_weights = weights.clone();
        let joint_report = clip_dense(joint, &intensity, &mut joint_weights);

        assert_eq!(time_weights, joint_weights);
        assert_eq!(time_report.live, joint_report.live);
        assert_eq!(time_report.rejected, joint_report.rejected);
        assert!(time_report.rejected >= 1);
    }
}

#[test]
fn test_reversed_strides_match_forward_clip() {
    let mut rng = StdRng::seed_from_u64(13);
    let (nfreq, nt, pad) = (32, 64, 8);
    let mut intensity = noise(&mut rng, nfreq * nt, 1.0);
    intensity[7 * nt + 7] = 60.0;
    let weights = sparse_weights(&mut rng, nfreq * nt, 0.1);
    let stride = -((nt + pad) as isize);

    for axis in AXES {
        let config = ClipperConfig::new(nfreq, nt, axis, 3.0).with_downsampling(2, 2);
        let mut forward = weights.clone();
        let forward_report = clip_dense(config, &intensity, &mut forward);

        let reversed_i = reversed_padded(&intensity, nfreq, nt, pad, f32::NAN);
        let mut reversed_w = reversed_padded(&weights, nfreq, nt, pad, -1.0);
        let report = IntensityClipper::new(config)
            .unwrap()
            .clip(
                Strided::new(&reversed_i, stride),
                StridedMut::new(&mut reversed_w, stride),
            )
            .unwrap();

        assert_eq!(report, forward_report, "{axis}");
        let expected = reversed_padded(&forward, nfreq, nt, pad, -1.0);
        assert_eq!(reversed_w, expected, "{axis}");
    }
}

#[test]
fn test_downsample_upsample_round_trip_on_uniform_weights() {
    let mut rng = StdRng::seed_from_u64(2);
    for df in [1, 2, 4, 8, 16, 24] {
        for dt in [1, 2, 4, 8, 16, 24] {
            let (nfreq_ds, nt_ds) = (2, 16);
            let (nfreq, nt) = (nfreq_ds * df, nt_ds * dt);
            let intensity = noise(&mut rng, nfreq * nt, 3.0);
            let weights = vec![1.0f32; nfreq * nt];

            let mut ds_i = vec![0.0f32; nfreq_ds * nt_ds];
            let mut ds_w = vec![0.0f32; nfreq_ds * nt_ds];
            Downsampler::new(df, dt)
                .unwrap()
                .downsample(
                    nfreq_ds,
                    nt_ds,
                    StridedMut::new(&mut ds_i, nt_ds as isize),
                    StridedMut::new(&mut ds_w, nt_ds as isize),
                    Strided::new(&intensity, nt as isize),
                    Strided::new(&weights, nt as isize),
                )
                .unwrap();
            assert!(ds_w.iter().all(|&w| w == (df * dt) as f32));

            let mut mask = vec![1.0f32; nfreq * nt];
            Upsampler::new(df, dt)
                .unwrap()
                .upsample(
                    nfreq_ds,
                    nt_ds,
                    StridedMut::new(&mut mask, nt as isize),
                    Strided::new(&ds_w, nt_ds as isize),
                    0.0,
                )
                .unwrap();
            assert!(mask.iter().all(|&m| m == 1.0), "(Df,Dt)=({df},{dt})");
        }
    }
}
