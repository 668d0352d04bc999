//! Outlier-resistant mean of a weighing burst.
//!
//! Each interior sample is weighted by the inverse square of its summed
//! distance to both neighbours, so a sample that sits between two close
//! neighbours dominates and isolated spikes (a paw on the wall, a jump)
//! contribute almost nothing.  The two endpoints carry zero weight.

/// Robust mean of `samples`.  Returns `None` for an empty slice.
pub fn robust_mean(samples: &[f32]) -> Option<f32> {
    let n = samples.len();
    if n == 0 {
        return None;
    }
    if n < 3 {
        return Some(mean(samples));
    }

    let interior = &samples[1..n - 1];
    let distance = |i: usize| (samples[i - 1] - samples[i]).abs() + (samples[i + 1] - samples[i]).abs();

    // Zero distance means an infinite weight: those samples win outright.
    let flat: Vec<f32> = (1..n - 1)
        .filter(|&i| distance(i) == 0.0)
        .map(|i| samples[i])
        .collect();
    if !flat.is_empty() {
        return Some(mean(&flat));
    }

    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for (k, &w) in interior.iter().enumerate() {
        let d = f64::from(distance(k + 1));
        let weight = 1.0 / (d * d);
        weighted += weight * f64::from(w);
        total += weight;
    }

    if total > 0.0 && total.is_finite() {
        Some((weighted / total) as f32)
    } else {
        Some(mean(interior))
    }
}

/// Plain arithmetic mean; 0 for an empty slice.
pub fn mean(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}
