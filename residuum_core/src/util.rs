//! Small statistics and time helpers shared by the pipeline stages.

use chrono::NaiveDateTime;

/// Seconds from `earlier` to `later` (negative if `later` is before `earlier`).
#[inline]
pub fn secs_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    let d = later - earlier;
    // Millisecond precision is plenty for sensor cadences of seconds to minutes.
    d.num_milliseconds() as f64 / 1000.0
}

/// Linear interpolation of `y` at `x` between `(x0, y0)` and `(x1, y1)`,
/// clamped to the endpoint values outside the interval.
#[inline]
pub fn lerp_clamped(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    y0 + t * (y1 - y0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Median; `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    let v = sorted(values);
    let n = v.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(v[n / 2])
    } else {
        Some((v[n / 2 - 1] + v[n / 2]) / 2.0)
    }
}

/// Percentile `p` in [0, 100] with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let v = sorted(values);
    let n = v.len();
    if n == 0 {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(v[lo] + (v[hi] - v[lo]) * frac)
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by n).
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (divides by n − 1); needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().map(|x| (x - m) * (x - m)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[3.0, 1.0, 2.0], Some(2.0))]
    #[case(&[4.0, 1.0, 3.0, 2.0], Some(2.5))]
    #[case(&[], None)]
    fn median_cases(#[case] v: &[f64], #[case] want: Option<f64>) {
        assert_eq!(median(v), want);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let v: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_eq!(percentile(&v, 2.0), Some(2.0));
        // rank = 0.5 * 3 = 1.5 → halfway between 20 and 30
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 50.0), Some(25.0));
        assert_eq!(percentile(&[7.0], 1.0), Some(7.0));
        assert_eq!(percentile(&[], 1.0), None);
    }

    #[test]
    fn variance_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_variance(&v), Some(4.0));
        let s = sample_std(&v).unwrap();
        assert!((s - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn lerp_clamps_outside_interval() {
        assert!((lerp_clamped(14.0, 8.0, -0.002, 20.0, -0.008) + 0.005).abs() < 1e-12);
        assert_eq!(lerp_clamped(30.0, 8.0, -0.002, 20.0, -0.008), -0.008);
        assert_eq!(lerp_clamped(0.0, 8.0, -0.002, 20.0, -0.008), -0.002);
    }
}
