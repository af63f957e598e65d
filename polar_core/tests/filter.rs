use polar_core::AdaptiveMedianFilter;
use proptest::prelude::*;

fn naive_median(values: &[f32]) -> f32 {
    let mut v = values.to_vec();
    v.sort_by(f32::total_cmp);
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

#[test]
fn single_spike_is_rejected_in_noisy_window() {
    let mut f = AdaptiveMedianFilter::new(5, 2.0).unwrap();
    for v in [10.0, 14.0, 6.0, 12.0, 8.0, 10.0, 12.0] {
        f.filter(v);
    }
    let before = f.rejected();
    let out = f.filter(100.0);
    assert_eq!(out, 12.0);
    assert_eq!(f.rejected(), before + 1);
    assert!(f.values().iter().all(|v| *v <= 14.0));
}

#[test]
fn gradual_trend_inside_noise_band_is_tracked() {
    let mut f = AdaptiveMedianFilter::new(5, 2.0).unwrap();
    for v in [10.0, 14.0, 6.0, 12.0, 8.0, 10.0, 12.0] {
        f.filter(v);
    }
    let before = f.rejected();
    let outputs: Vec<f32> = [13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0, 20.0, 20.0, 20.0, 20.0]
        .into_iter()
        .map(|v| f.filter(v))
        .collect();
    assert_eq!(
        outputs,
        vec![12.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0, 20.0, 20.0]
    );
    assert_eq!(f.rejected(), before);
}

#[test]
fn spike_at_wrap_boundary_is_rejected() {
    let mut f = AdaptiveMedianFilter::new(5, 1.0).unwrap();
    // Seed plus one full pass: the cursor is back at slot 0.
    for _ in 0..6 {
        assert_eq!(f.filter(10.0), 10.0);
    }
    assert_eq!(f.filter(1000.0), 10.0);
    let after: Vec<f32> = (0..6).map(|_| f.filter(10.0)).collect();
    assert_eq!(after, vec![10.0; 6]);
    assert_eq!(f.values(), &[10.0; 5]);
    assert_eq!(f.rejected(), 1);
}

#[test]
fn spike_at_wrap_leaves_even_window_output_unchanged() {
    let mut f = AdaptiveMedianFilter::new(2, 1.0).unwrap();
    for _ in 0..3 {
        f.filter(10.0);
    }
    // Three calls: seed, slot 0, slot 1 -> next write is slot 0 again.
    assert_eq!(f.filter(1000.0), 10.0);
    assert_eq!(f.values(), &[10.0, 10.0]);
}

#[test]
fn flat_window_holds_level_until_reset() {
    let mut f = AdaptiveMedianFilter::new(3, 3.0).unwrap();
    for _ in 0..4 {
        f.filter(20.0);
    }
    for _ in 0..12 {
        assert_eq!(f.filter(40.0), 20.0);
    }
    f.reset();
    assert_eq!(f.filter(40.0), 40.0);
}

#[test]
fn zero_threshold_only_admits_identical_samples() {
    let mut f = AdaptiveMedianFilter::new(3, 0.0).unwrap();
    f.filter(5.0);
    f.filter(5.0);
    assert_eq!(f.filter(5.0), 5.0);
    assert_eq!(f.filter(5.1), 5.0);
    assert_eq!(f.rejected(), 1);
}

proptest! {
    #[test]
    fn output_is_median_of_window(
        window in 1usize..10,
        threshold in 0.0f32..5.0,
        samples in prop::collection::vec(-1_000.0f32..1_000.0, 1..80),
    ) {
        let mut f = AdaptiveMedianFilter::new(window, threshold).unwrap();
        for s in samples {
            let out = f.filter(s);
            prop_assert_eq!(f.values().len(), window);
            prop_assert_eq!(out, naive_median(f.values()));
        }
    }

    #[test]
    fn first_output_equals_first_sample(window in 1usize..16, s in -1e6f32..1e6) {
        let mut f = AdaptiveMedianFilter::new(window, 3.0).unwrap();
        prop_assert_eq!(f.filter(s), s);
    }

    #[test]
    fn output_stays_within_seen_range(
        samples in prop::collection::vec(0.0f32..500.0, 1..60),
    ) {
        let mut f = AdaptiveMedianFilter::new(5, 3.0).unwrap();
        let lo = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for s in samples {
            let out = f.filter(s);
            prop_assert!(out >= lo && out <= hi, "{out} outside [{lo}, {hi}]");
        }
    }
}
