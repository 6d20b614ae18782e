//! Time-domain heart rate variability features from RR intervals.
//!
//! RR intervals are in milliseconds. Beats outside the artifact filter range
//! are discarded before any statistic is computed.

use crate::domain::model::HrvFeatures;
use crate::utils::error::{Result, SwipError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const MIN_BEATS_FLOOR: usize = 3;
const NN50_THRESHOLD_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFilter {
    pub min_rr_ms: f64,
    pub max_rr_ms: f64,
    pub min_beats: usize,
}

impl Default for ArtifactFilter {
    fn default() -> Self {
        Self {
            min_rr_ms: 300.0,
            max_rr_ms: 2000.0,
            min_beats: MIN_BEATS_FLOOR,
        }
    }
}

impl ArtifactFilter {
    pub fn accepts(&self, rr_ms: f64) -> bool {
        rr_ms.is_finite() && rr_ms >= self.min_rr_ms && rr_ms <= self.max_rr_ms
    }

    fn required_beats(&self) -> usize {
        self.min_beats.max(MIN_BEATS_FLOOR)
    }
}

pub fn compute_features(rr_ms: &[f64], filter: &ArtifactFilter) -> Result<HrvFeatures> {
    let clean: Vec<f64> = rr_ms.iter().copied().filter(|rr| filter.accepts(*rr)).collect();

    let dropped = rr_ms.len() - clean.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} RR intervals outside [{}, {}] ms", dropped, filter.min_rr_ms, filter.max_rr_ms);
    }

    let required = filter.required_beats();
    if clean.len() < required {
        return Err(SwipError::InsufficientData {
            message: format!(
                "{} valid RR intervals, at least {} required",
                clean.len(),
                required
            ),
        });
    }

    let n = clean.len() as f64;
    let mean_rr = clean.iter().sum::<f64>() / n;
    let variance = clean.iter().map(|rr| (rr - mean_rr).powi(2)).sum::<f64>() / (n - 1.0);
    let sdnn = variance.sqrt();

    let diffs: Vec<f64> = clean.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
    let nn50 = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_MS).count();
    let pnn50 = 100.0 * nn50 as f64 / diffs.len() as f64;

    let hr_mean = clean.iter().map(|rr| 60_000.0 / rr).sum::<f64>() / n;

    Ok(HrvFeatures {
        sdnn,
        rmssd,
        pnn50,
        mean_rr,
        hr_mean,
    })
}

/// Rolling RR buffer covering at most `window_ms` of beats.
#[derive(Debug, Clone)]
pub struct RrWindow {
    window_ms: f64,
    beats: VecDeque<f64>,
    span_ms: f64,
    filter: ArtifactFilter,
}

impl RrWindow {
    pub fn new(window_seconds: f64, filter: ArtifactFilter) -> Self {
        Self {
            window_ms: window_seconds * 1000.0,
            beats: VecDeque::new(),
            span_ms: 0.0,
            filter,
        }
    }

    /// Adds a beat. Artifacts are rejected and `false` is returned.
    pub fn push(&mut self, rr_ms: f64) -> bool {
        if !self.filter.accepts(rr_ms) {
            tracing::trace!("Rejected RR interval {} ms", rr_ms);
            return false;
        }

        self.beats.push_back(rr_ms);
        self.span_ms += rr_ms;

        while self.span_ms > self.window_ms {
            match self.beats.pop_front() {
                Some(oldest) => self.span_ms -= oldest,
                None => break,
            }
        }
        true
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, rr_ms: I) -> usize {
        rr_ms.into_iter().filter(|rr| self.push(*rr)).count()
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn span_ms(&self) -> f64 {
        self.span_ms
    }

    pub fn clear(&mut self) {
        self.beats.clear();
        self.span_ms = 0.0;
    }

    pub fn features(&self) -> Result<HrvFeatures> {
        let beats: Vec<f64> = self.beats.iter().copied().collect();
        compute_features(&beats, &self.filter)
    }
}
