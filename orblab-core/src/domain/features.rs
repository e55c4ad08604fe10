//! DailyFeatureRow — aggregated per-day facts for one instrument.
//!
//! One row per (date, instrument). Everything in the row is computable from
//! bars chronologically available before each window opens, plus completed
//! prior days for the indicators. The blake3 fingerprint over canonical JSON
//! is the idempotence check: rebuilding a day from the same bars must
//! reproduce the same fingerprint bit for bit.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{InstrumentId, WindowId};
use super::range::OpeningRange;

/// Per-window facts for one trading day.
///
/// `range` is `None` when the window had no bars (holiday, weekend, feed
/// gap) — absent, never zero-width. Session statistics use only bars that
/// printed strictly before the window opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub range: Option<OpeningRange>,
    /// High-low travel from local midnight to the window open.
    pub pre_window_travel: Option<f64>,
    pub prior_session_high: Option<f64>,
    pub prior_session_low: Option<f64>,
    /// First pre-window open minus prior session close.
    pub overnight_gap: Option<f64>,
}

/// Indicator snapshot computed from completed prior days only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyIndicators {
    pub atr_14: Option<f64>,
    pub rsi_14: Option<f64>,
}

/// Aggregated per-day feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeatureRow {
    pub date: NaiveDate,
    pub instrument: InstrumentId,
    pub windows: BTreeMap<WindowId, WindowFeatures>,
    pub indicators: DailyIndicators,
}

impl DailyFeatureRow {
    /// Deterministic content hash over canonical JSON.
    ///
    /// `BTreeMap` keys give a stable field order, so identical inputs
    /// produce identical hex digests across rebuilds.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("DailyFeatureRow must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
