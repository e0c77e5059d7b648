//! Hourly-bucketed occupancy autocorrelation for periodicity detection.
//! Direct O(N·L) computation, no FFT: N is bounded by the 84-day window
//! (2016 hourly bins), L by the 1..1008h scan range.

use chrono::{DateTime, Duration, Timelike, Utc};

const FIXED_LAG_CANDIDATES_HOURS: [i64; 4] = [24, 168, 504, 720];
const MAX_SCAN_LAG_HOURS: i64 = 1008;
const BUCKET_HOURS: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub struct LagCandidate {
    pub period: Duration,
    pub correlation: f64,
    pub std_dev: Duration,
    pub weekend_masked: bool,
}

/// Bin raw access timestamps into an hourly occupancy signal spanning
/// `[first, last]`, 1.0 where any access fell in that hour, else 0.0.
fn bucketize(samples: &[DateTime<Utc>]) -> (Vec<f64>, DateTime<Utc>) {
    let first = samples[0];
    let last = *samples.last().unwrap();
    let span_hours = last.signed_duration_since(first).num_hours().max(1) + 1;
    let mut signal = vec![0.0_f64; span_hours as usize];
    for t in samples {
        let idx = t.signed_duration_since(first).num_hours();
        if idx >= 0 && (idx as usize) < signal.len() {
            signal[idx as usize] = 1.0;
        }
    }
    (signal, first)
}

/// Apply a weekend mask (zero out Saturday/Sunday hours) if doing so
/// improves correlation at the tested lag.
fn weekend_mask(signal: &[f64], origin: DateTime<Utc>) -> Vec<f64> {
    signal
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let t = origin + Duration::hours(i as i64);
            let weekday = t.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                0.0
            } else {
                *v
            }
        })
        .collect()
}

fn autocorrelation_at_lag(signal: &[f64], lag: usize) -> f64 {
    if lag == 0 || lag >= signal.len() {
        return 0.0;
    }
    let n = signal.len() - lag;
    if n == 0 {
        return 0.0;
    }
    let mean: f64 = signal.iter().sum::<f64>() / signal.len() as f64;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..signal.len() {
        denominator += (signal[i] - mean).powi(2);
    }
    for i in 0..n {
        numerator += (signal[i] - mean) * (signal[i + lag] - mean);
    }
    if denominator.abs() < 1e-9 {
        return 0.0;
    }
    numerator / denominator
}

fn std_dev_of_intervals(samples: &[DateTime<Utc>], period: Duration) -> Duration {
    if samples.len() < 2 {
        return Duration::zero();
    }
    let period_secs = period.num_seconds().max(1) as f64;
    let residuals: Vec<f64> = samples
        .windows(2)
        .map(|w| {
            let gap = w[1].signed_duration_since(w[0]).num_seconds() as f64;
            (gap % period_secs).min(period_secs - (gap % period_secs))
        })
        .collect();
    let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
    let variance = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / residuals.len() as f64;
    Duration::seconds(variance.sqrt() as i64)
}

/// Find the best-correlating lag among the fixed candidates plus a full
/// 1..1008h scan, optionally under a weekend mask. Returns `None` when no
/// lag clears a noise-scaled threshold.
pub fn detect_period(samples: &[DateTime<Utc>], _now: DateTime<Utc>) -> Option<LagCandidate> {
    let (signal, origin) = bucketize(samples);
    if signal.len() < 2 {
        return None;
    }

    let threshold = noise_threshold(signal.len());

    let best_unmasked = best_lag(&signal, threshold);
    let masked_signal = weekend_mask(&signal, origin);
    let best_masked = best_lag(&masked_signal, threshold);

    let (best, masked) = match (best_unmasked, best_masked) {
        (Some(u), Some(m)) if m.1 > u.1 => (m, true),
        (Some(u), Some(_)) => (u, false),
        (Some(u), None) => (u, false),
        (None, Some(m)) => (m, true),
        (None, None) => return None,
    };

    let (lag_hours, correlation) = best;
    let period = Duration::hours(lag_hours as i64 * BUCKET_HOURS);
    let std_dev = std_dev_of_intervals(samples, period);

    Some(LagCandidate {
        period,
        correlation,
        std_dev,
        weekend_masked: masked,
    })
}

/// Correlation threshold that grows with signal length (more samples
/// demand a stronger peak to avoid noise false-positives).
fn noise_threshold(n: usize) -> f64 {
    (0.15 + (n as f64).ln() / 200.0).min(0.4)
}

fn best_lag(signal: &[f64], threshold: f64) -> Option<(usize, f64)> {
    let max_lag = (signal.len().saturating_sub(1)).min(MAX_SCAN_LAG_HOURS as usize);
    if max_lag == 0 {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    let candidates: Vec<usize> = FIXED_LAG_CANDIDATES_HOURS
        .iter()
        .map(|l| *l as usize)
        .filter(|l| *l <= max_lag)
        .chain(1..=max_lag)
        .collect();

    for lag in candidates {
        let corr = autocorrelation_at_lag(signal, lag);
        if corr > threshold {
            if best.map(|(_, c)| corr > c).unwrap_or(true) {
                best = Some((lag, corr));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_daily_signal_peaks_at_lag_24() {
        let start = Utc::now() - Duration::days(30);
        let samples: Vec<DateTime<Utc>> = (0..30)
            .map(|d| start + Duration::days(d) + Duration::hours(8))
            .collect();
        let found = detect_period(&samples, start + Duration::days(30)).unwrap();
        assert_eq!(found.period.num_hours(), 24);
    }

    #[test]
    fn sparse_random_samples_find_no_strong_period() {
        let start = Utc::now() - Duration::days(30);
        let samples = vec![
            start,
            start + Duration::hours(5),
            start + Duration::days(3) + Duration::hours(2),
        ];
        // Too sparse to meaningfully bucketize/correlate; should not panic.
        let _ = detect_period(&samples, start + Duration::days(30));
    }
}
