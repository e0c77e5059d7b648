//! Adaptive per-owner component weighting.
//!
//! Shares its shape with `AdvancedImportanceScorer::adjust_weights_based_on_performance`
//! + `normalize_weights`, reworked from a single global performance map into
//! a per-owner sliding window of labeled retrieval outcomes: learning is
//! tied to retrieval feedback (actioned/ignored/dismissed) rather than
//! importance-level buckets.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// How a surfaced memory was treated by the owner, with the component
/// breakdown that produced its score — the learning signal.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOutcome {
    pub at: DateTime<Utc>,
    pub actioned: bool,
    pub components: [f64; 5],
}

const WINDOW_DAYS: i64 = 30;
const MIN_ACTIONED_SAMPLES: usize = 20;
const LEARNING_RATE: f64 = 0.3;
const MIN_CONFIDENCE: f64 = 0.5;

/// Learns a per-owner weight vector from retrieval feedback. Until enough
/// confident data has accumulated, `active_weights` returns the supplied
/// defaults with confidence 0 ("Until then, defaults are used
/// and confidence=0").
#[derive(Debug, Clone, Default)]
pub struct WeightLearner {
    outcomes: VecDeque<RetrievalOutcome>,
    learned: Option<[f64; 5]>,
    confidence: f64,
}

impl WeightLearner {
    pub fn new() -> Self {
        Self {
            outcomes: VecDeque::new(),
            learned: None,
            confidence: 0.0,
        }
    }

    pub fn record(&mut self, outcome: RetrievalOutcome) {
        self.outcomes.push_back(outcome);
        self.evict_stale(outcome.at);
        self.recompute();
    }

    fn evict_stale(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::days(WINDOW_DAYS);
        while self
            .outcomes
            .front()
            .map(|o| o.at < cutoff)
            .unwrap_or(false)
        {
            self.outcomes.pop_front();
        }
    }

    fn recompute(&mut self) {
        let actioned: Vec<&RetrievalOutcome> = self.outcomes.iter().filter(|o| o.actioned).collect();
        if actioned.len() < MIN_ACTIONED_SAMPLES {
            self.learned = None;
            self.confidence = 0.0;
            return;
        }

        // Per-component mean contribution among actioned outcomes, treated
        // as the empirical weight signal; variance across components is the
        // confidence gate (flat components carry no distinguishing signal).
        let n = actioned.len() as f64;
        let mut means = [0.0_f64; 5];
        for outcome in &actioned {
            for i in 0..5 {
                means[i] += outcome.components[i];
            }
        }
        for m in means.iter_mut() {
            *m /= n;
        }

        let mut variances = [0.0_f64; 5];
        for outcome in &actioned {
            for i in 0..5 {
                let d = outcome.components[i] - means[i];
                variances[i] += d * d;
            }
        }
        for v in variances.iter_mut() {
            *v /= n;
        }
        let total_variance: f64 = variances.iter().sum();

        if total_variance < 1e-6 {
            self.learned = None;
            self.confidence = 0.0;
            return;
        }

        let raw: [f64; 5] = variances;
        let sum: f64 = raw.iter().sum();
        let normalized = if sum > 0.0 {
            let mut w = [0.0; 5];
            for i in 0..5 {
                w[i] = raw[i] / sum;
            }
            w
        } else {
            [0.2; 5]
        };

        self.learned = Some(normalized);
        // Confidence grows with sample count beyond the minimum, saturating
        // at 1.0 once the window is well-populated.
        self.confidence = ((actioned.len() as f64 - MIN_ACTIONED_SAMPLES as f64) / MIN_ACTIONED_SAMPLES as f64)
            .clamp(0.0, 1.0)
            .max(if total_variance > 1e-6 { 0.5 } else { 0.0 });
    }

    /// Blend defaults with the learned vector at `LEARNING_RATE` when
    /// confidence clears the gate; otherwise return defaults unchanged.
    pub fn active_weights(&self, defaults: [f64; 5]) -> ([f64; 5], f64) {
        let Some(learned) = self.learned else {
            return (defaults, 0.0);
        };
        if self.confidence < MIN_CONFIDENCE {
            return (defaults, self.confidence);
        }
        let mut blended = [0.0; 5];
        for i in 0..5 {
            blended[i] = defaults[i] * (1.0 - LEARNING_RATE) + learned[i] * LEARNING_RATE;
        }
        let sum: f64 = blended.iter().sum();
        if sum > 0.0 {
            for w in blended.iter_mut() {
                *w /= sum;
            }
        }
        (blended, self.confidence)
    }
}
