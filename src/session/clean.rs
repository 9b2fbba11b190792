//! Impulsive RFI removal for total-power scans.

/// Samples per sliding window used to estimate the local spread.
pub const WINDOW: usize = 201;
/// Half-width of the neighbourhood a flagged sample is replaced from.
const PATCH_HALF_WIDTH: usize = 10;
/// Rejection threshold in robust standard deviations.
const THRESHOLD: f64 = 4.0;
/// MAD to Gaussian sigma.
const MAD_SCALE: f64 = 1.4826;

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Median and scaled median absolute deviation.
fn robust_stats(values: &[f64]) -> (f64, f64) {
    let mut scratch = values.to_vec();
    let centre = median(&mut scratch);
    for (s, v) in scratch.iter_mut().zip(values) {
        *s = (v - centre).abs();
    }
    (centre, MAD_SCALE * median(&mut scratch))
}

/// Replace samples more than four robust sigmas from the median of any
/// `WINDOW`-sample window that holds them. Each flagged sample becomes the
/// median of the 21 samples centred on it. Windows with no spread are
/// skipped. Returns the number of samples replaced.
pub fn clean_outliers(power: &mut [f64]) -> usize {
    let n = power.len();
    if n < WINDOW {
        return 0;
    }

    let mut flagged = vec![false; n];
    for start in 0..=n - WINDOW {
        let window = &power[start..start + WINDOW];
        let (centre, sigma) = robust_stats(window);
        if sigma <= 0.0 {
            continue;
        }
        for (i, v) in window.iter().enumerate() {
            if (v - centre).abs() > THRESHOLD * sigma {
                flagged[start + i] = true;
            }
        }
    }

    let mut replaced = 0;
    for b in (0..n).filter(|&b| flagged[b]) {
        let lo = b.saturating_sub(PATCH_HALF_WIDTH);
        let hi = (b + PATCH_HALF_WIDTH + 1).min(n);
        let mut patch = power[lo..hi].to_vec();
        power[b] = median(&mut patch);
        replaced += 1;
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp_with_noise(n: usize) -> Vec<f64> {
        // Deterministic jitter so the spread is never zero.
        (0..n)
            .map(|i| 10.0 + 0.001 * i as f64 + 0.05 * ((i * 7919) % 13) as f64 / 13.0)
            .collect()
    }

    #[test]
    fn spike_is_replaced_by_its_neighbourhood() {
        let mut power = ramp_with_noise(600);
        let clean = power.clone();
        power[250] *= 50.0;

        let replaced = clean_outliers(&mut power);
        assert!(replaced >= 1);
        assert!(power[250] < 11.0);
        assert_abs_diff_eq!(power[250], clean[250], epsilon = 0.1);
        assert!(power.iter().all(|p| *p < 11.0));
    }

    #[test]
    fn monotone_scan_is_unchanged() {
        let mut power: Vec<f64> = (0..400).map(|i| 2.0 + (i as f64 / 40.0).powi(3)).collect();
        let before = power.clone();
        clean_outliers(&mut power);
        assert_eq!(power, before);
    }

    #[test]
    fn short_and_flat_scans_are_left_alone() {
        let mut short = vec![1.0, 100.0, 1.0];
        assert_eq!(clean_outliers(&mut short), 0);
        assert_eq!(short, vec![1.0, 100.0, 1.0]);

        let mut flat = vec![3.0; WINDOW + 5];
        assert_eq!(clean_outliers(&mut flat), 0);
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
