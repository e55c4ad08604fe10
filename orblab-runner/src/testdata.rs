//! Scripted synthetic days for tests and demos.
//!
//! Builds an in-memory bar store where every day follows one of two
//! scripts: a "win" day whose post-break run reaches any target up to 3R,
//! or a "loss" day that breaks up and then collapses through the full
//! stop. Deterministic by construction, so pipeline tests can assert exact
//! stage outcomes.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use orblab_core::costs::{ContractSpec, CostBook, FrictionSchedule, InstrumentCosts};
use orblab_core::domain::{InstrumentId, MinuteBar, StopMode, StrategyCandidate};
use orblab_core::features::FeatureConfig;
use orblab_core::session::WindowSpec;
use orblab_core::store::MemoryBarStore;

use crate::harness::SimHarness;

pub const INSTRUMENT: &str = "MES";
pub const WINDOW: &str = "ny_0930_15m";

/// A scripted store plus everything a harness needs to run against it.
pub struct Fixture {
    pub store: MemoryBarStore,
    pub windows: Vec<WindowSpec>,
    pub cost_book: CostBook,
    pub days: Vec<NaiveDate>,
}

impl Fixture {
    /// All win days.
    pub fn trending(n_days: usize) -> Self {
        Self::scripted(&vec![DayScript::Win; n_days])
    }

    /// `n_win` win days followed by `n_loss` loss days, chronologically.
    pub fn win_then_loss(n_win: usize, n_loss: usize) -> Self {
        let mut scripts = vec![DayScript::Win; n_win];
        scripts.extend(vec![DayScript::Loss; n_loss]);
        Self::scripted(&scripts)
    }

    pub fn scripted(scripts: &[DayScript]) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut store = MemoryBarStore::new();
        let mut bars = Vec::new();
        let mut days = Vec::with_capacity(scripts.len());

        for (i, script) in scripts.iter().enumerate() {
            let date = start + Duration::days(i as i64);
            days.push(date);
            bars.extend(script.bars(date));
        }

        store
            .insert(INSTRUMENT.into(), bars)
            .expect("scripted bars are valid");

        Self {
            store,
            windows: vec![window_spec()],
            cost_book: cost_book(),
            days,
        }
    }

    pub fn harness(&self) -> SimHarness<'_> {
        SimHarness::new(
            &self.store,
            &self.windows,
            &self.cost_book,
            FeatureConfig {
                history_days: 20,
                ..FeatureConfig::default()
            },
            0.0,
        )
    }
}

/// What one synthetic day does after its opening range forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayScript {
    /// Breaks up at 102.5 and runs to 110.5: wins any target up to 3R.
    Win,
    /// Breaks up at 102.5 and collapses through the full stop at 100.
    Loss,
}

impl DayScript {
    /// Minute bars for the day. The opening range is always 102.0 / 100.0,
    /// formed between 09:30 and 09:45.
    pub fn bars(&self, date: NaiveDate) -> Vec<MinuteBar> {
        let mut script = vec![
            // Range formation.
            (9, 30, 101.0, 102.0, 100.0, 101.5),
            (9, 35, 101.5, 101.9, 100.1, 101.0),
            (9, 40, 101.0, 101.8, 100.2, 101.2),
            // Break bar: close one tick-multiple beyond the high.
            (9, 45, 101.2, 102.6, 100.9, 102.5),
        ];
        match self {
            DayScript::Win => {
                script.push((9, 50, 102.5, 104.0, 102.2, 103.8));
                script.push((9, 55, 103.8, 110.5, 103.5, 110.0));
                script.push((10, 0, 110.0, 110.4, 109.0, 109.5));
            }
            DayScript::Loss => {
                script.push((9, 50, 102.4, 102.8, 99.5, 100.2));
                script.push((9, 55, 100.2, 100.8, 99.8, 100.5));
            }
        }

        script
            .into_iter()
            .map(|(h, m, o, hi, lo, c)| bar(date.and_hms_opt(h, m, 0).unwrap(), o, hi, lo, c))
            .collect()
    }
}

pub fn bar(ts_local: NaiveDateTime, o: f64, h: f64, l: f64, c: f64) -> MinuteBar {
    MinuteBar {
        instrument: INSTRUMENT.into(),
        ts_utc: Utc.from_utc_datetime(&(ts_local + Duration::hours(5))),
        ts_local,
        open: o,
        high: h,
        low: l,
        close: c,
        volume: 500,
    }
}

pub fn window_spec() -> WindowSpec {
    WindowSpec {
        id: WINDOW.into(),
        open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        open_minutes: 15,
        scan_until: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    }
}

pub fn cost_book() -> CostBook {
    let mut instruments = std::collections::BTreeMap::new();
    instruments.insert(
        InstrumentId::from(INSTRUMENT),
        InstrumentCosts {
            contract: ContractSpec {
                tick_size: 0.25,
                tick_value: 2.5,
            },
            friction: FrictionSchedule {
                commission: 2.5,
                slippage: 2.5,
                spread: 2.4,
            },
        },
    );
    CostBook {
        version: "test".to_string(),
        instruments,
    }
}

pub fn candidate(target_r: f64, stop_mode: StopMode) -> StrategyCandidate {
    StrategyCandidate {
        instrument: INSTRUMENT.into(),
        window: WINDOW.into(),
        target_r,
        stop_mode,
        filters: Vec::new(),
    }
}
