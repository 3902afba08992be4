use common::float_ext::FloatExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

fn reference_moments(intensity: &[f32], weights: &[f32]) -> (f64, f64) {
    let (mut w, mut wi) = (0.0f64, 0.0f64);
    for (&i, &wt) in intensity.iter().zip(weights) {
        if wt > 0.0 {
            w += wt as f64;
            wi += wt as f64 * i as f64;
        }
    }
    let mean = wi / w;
    let mut wdd = 0.0f64;
    for (&i, &wt) in intensity.iter().zip(weights) {
        if wt > 0.0 {
            let d = i as f64 - mean;
            wdd += wt as f64 * d * d;
        }
    }
    (mean, wdd / w)
}

fn random_population(rng: &mut StdRng, len: usize) -> (Vec<f32>, Vec<f32>) {
    let intensity = (0..len).map(|_| rng.random_range(-3.0..3.0)).collect();
    let weights = (0..len)
        .map(|_| {
            if rng.random_bool(0.2) {
                0.0
            } else {
                rng.random_range(0.5..1.5)
            }
        })
        .collect();
    (intensity, weights)
}

#[test]
fn test_horizontal_moments_match_reference() {
    let mut rng = StdRng::seed_from_u64(5);
    let (intensity, mut weights) = random_population(&mut rng, 256);
    let (mean, var) = reference_moments(&intensity, &weights);
    let live = weights.iter().filter(|&&w| w > 0.0).count();

    let buf = WeightedBuffer::new(&intensity, &mut weights);
    let one = buf.moments::<Horizontal, false>();
    let two = buf.moments::<Horizontal, true>();

    for m in [one, two] {
        assert_eq!(m.live, live);
        for lane in 0..LANES {
            assert!((m.mean.as_array()[lane] as f64).relatively_eq(mean, 1e-4));
            assert!((m.var.as_array()[lane] as f64).relatively_eq(var, 1e-3));
        }
    }
}

#[test]
fn test_per_lane_tracks_eight_populations() {
    let mut rng = StdRng::seed_from_u64(9);
    let chunks = 32;
    let (intensity, mut weights) = random_population(&mut rng, chunks * LANES);

    let expected: Vec<(f64, f64)> = (0..LANES)
        .map(|lane| {
            let i: Vec<f32> = (0..chunks).map(|c| intensity[c * LANES + lane]).collect();
            let w: Vec<f32> = (0..chunks).map(|c| weights[c * LANES + lane]).collect();
            reference_moments(&i, &w)
        })
        .collect();

    let buf = WeightedBuffer::new(&intensity, &mut weights);
    let m = buf.moments::<PerLane, true>();
    for (lane, (mean, var)) in expected.into_iter().enumerate() {
        assert!(
            (m.mean.as_array()[lane] as f64).relatively_eq(mean, 1e-4),
            "lane {lane}"
        );
        assert!(
            (m.var.as_array()[lane] as f64).relatively_eq(var, 1e-3),
            "lane {lane}"
        );
    }
}

#[test]
fn test_empty_population_has_zero_moments() {
    let intensity = vec![f32::NAN; 16];
    let mut weights = vec![0.0f32; 16];
    let buf = WeightedBuffer::new(&intensity, &mut weights);

    for m in [
        buf.moments::<Horizontal, false>(),
        buf.moments::<Horizontal, true>(),
        buf.moments::<PerLane, false>(),
    ] {
        assert_eq!(m.mean, Lane::ZERO);
        assert_eq!(m.var, Lane::ZERO);
        assert_eq!(m.live, 0);
    }
}

#[test]
fn test_zero_weight_nan_does_not_pollute() {
    let mut intensity = vec![2.0f32; 16];
    intensity[3] = f32::NAN;
    intensity[12] = f32::INFINITY;
    let mut weights = vec![1.0f32; 16];
    weights[3] = 0.0;
    weights[12] = 0.0;

    let buf = WeightedBuffer::new(&intensity, &mut weights);
    let m = buf.moments::<Horizontal, false>();
    assert_eq!(m.mean, Lane::splat(2.0));
    assert_eq!(m.var, Lane::ZERO);
    assert_eq!(m.live, 14);
}

#[test]
fn test_two_pass_survives_large_offset() {
    let intensity: Vec<f32> = (0..64)
        .map(|k| if k % 2 == 0 { 10_001.0 } else { 9_999.0 })
        .collect();
    let mut weights = vec![1.0f32; 64];
    let buf = WeightedBuffer::new(&intensity, &mut weights);

    let m = buf.moments::<Horizontal, true>();
    assert_eq!(m.mean, Lane::splat(10_000.0));
    assert!(m.var.as_array()[0].approximately_eq(1.0));

    let one_pass = buf.moments::<Horizontal, false>();
    assert!(one_pass.var.as_array().iter().all(|&v| v >= 0.0));
}

#[test]
fn test_mask_boundary_is_inclusive() {
    let intensity: Vec<f32> = (0..16).map(|k| if k % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let mut weights = vec![1.0f32; 16];
    weights[4] = 0.0;
    weights[5] = 0.0;
    let buf = WeightedBuffer::new(&intensity, &mut weights);
    let m = buf.moments::<Horizontal, false>();
    assert_eq!(m.mean, Lane::ZERO);
    assert_eq!(m.var, Lane::splat(1.0));
    let thresh = m.threshold(1.0);

    let first = buf.mask(m.mean, thresh, 0);
    assert_eq!(first.count(), 6);
    assert!(!first.get(4));
    assert!(!first.get(5));
    assert!(buf.mask(m.mean, thresh, 8).all());
}

#[test]
fn test_iterate_rejects_outlier_and_keeps_it_rejected() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut intensity: Vec<f32> = (0..128).map(|_| rng.random_range(-1.0..1.0)).collect();
    intensity[40] = 500.0;
    let mut weights = vec![1.0f32; 128];

    let mut buf = WeightedBuffer::new(&intensity, &mut weights);
    let initial = buf.moments::<Horizontal, true>();
    assert!(initial.mean.as_array()[0] > 3.0);

    let m = buf.iterate::<Horizontal, true>(initial, 3, 3.0);
    assert!(m.mean.as_array()[0].abs() < 0.3);
    assert_eq!(m.live, 127);
    assert_eq!(weights[40], 0.0);
    assert_eq!(weights.iter().filter(|&&w| w > 0.0).count(), 127);
}

#[test]
fn test_iterate_zero_rounds_is_identity() {
    let mut rng = StdRng::seed_from_u64(2);
    let (intensity, mut weights) = random_population(&mut rng, 64);
    let before = weights.clone();

    let mut buf = WeightedBuffer::new(&intensity, &mut weights);
    let initial = buf.moments::<Horizontal, false>();
    // A tiny iteration sigma would reject almost everything if any round ran.
    let m = buf.iterate::<Horizontal, false>(initial, 0, 1e-6);
    assert_eq!(m, initial);
    assert_eq!(weights, before);
}

#[test]
fn test_apply_mask_zeroes_dropped_lanes() {
    let intensity = vec![0.0f32; 8];
    let mut weights = vec![2.0f32; 8];
    let mut buf = WeightedBuffer::new(&intensity, &mut weights);
    let keep = LaneMask::from_array([true, false, true, true, false, true, true, true]);
    buf.apply_mask(0, keep);
    assert_eq!(weights, vec![2.0, 0.0, 2.0, 2.0, 0.0, 2.0, 2.0, 2.0]);
}
