//! Score accounting and reporting

use super::task::Fingerprint;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The four ranking criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreKind {
    /// Long-window capital average over the baseline
    TimeWeighted,
    /// Highest capital over the baseline
    Peak,
    /// Final capital over the baseline
    Final,
    /// Final ratio discounted by turnover cost
    VolumeAdjusted,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 4] = [
        ScoreKind::TimeWeighted,
        ScoreKind::Peak,
        ScoreKind::Final,
        ScoreKind::VolumeAdjusted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScoreKind::TimeWeighted => "time-weighted",
            ScoreKind::Peak => "peak",
            ScoreKind::Final => "final",
            ScoreKind::VolumeAdjusted => "volume-adjusted",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per [`ScoreKind`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSet {
    pub time_weighted: Decimal,
    pub peak: Decimal,
    pub final_ratio: Decimal,
    pub volume_adjusted: Decimal,
}

impl ScoreSet {
    pub fn get(&self, kind: ScoreKind) -> Decimal {
        match kind {
            ScoreKind::TimeWeighted => self.time_weighted,
            ScoreKind::Peak => self.peak,
            ScoreKind::Final => self.final_ratio,
            ScoreKind::VolumeAdjusted => self.volume_adjusted,
        }
    }

    pub fn from_values(values: [Decimal; 4]) -> Self {
        let [time_weighted, peak, final_ratio, volume_adjusted] = values;
        Self {
            time_weighted,
            peak,
            final_ratio,
            volume_adjusted,
        }
    }

    pub fn values(&self) -> [Decimal; 4] {
        ScoreKind::ALL.map(|kind| self.get(kind))
    }

    /// Component-wise sum
    pub fn accumulate(&mut self, other: &ScoreSet) {
        self.time_weighted += other.time_weighted;
        self.peak += other.peak;
        self.final_ratio += other.final_ratio;
        self.volume_adjusted += other.volume_adjusted;
    }

    /// Component-wise division; zero divisors leave the set unchanged
    pub fn divided_by(&self, divisor: usize) -> ScoreSet {
        if divisor == 0 {
            return *self;
        }
        let divisor = Decimal::from(divisor);
        ScoreSet::from_values(self.values().map(|value| value / divisor))
    }

    pub fn all_positive(&self) -> bool {
        self.values().iter().all(|value| *value > Decimal::ZERO)
    }
}

/// Leaderboard ordering key.
///
/// `salt` breaks ties between equal scores and is never part of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreKey {
    pub value: Decimal,
    pub salt: u64,
}

/// Strictly increasing salts derived from the wall clock
#[derive(Debug, Default)]
pub struct TieBreaker {
    last: AtomicU64,
}

impl TieBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Microseconds since the epoch, bumped past the previous salt if needed
    pub fn salt(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

/// A finished, scored task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pub fingerprint: Fingerprint,
    pub scores: ScoreSet,
    pub encoding: String,
}

impl ScoreRecord {
    /// Score summary prepended to the configuration encoding
    pub fn summary(&self) -> String {
        format!(
            "time-weighted[{:.6}] peak[{:.6}] final[{:.6}] volume-adjusted[{:.6}] : {}",
            self.scores.time_weighted,
            self.scores.peak,
            self.scores.final_ratio,
            self.scores.volume_adjusted,
            self.encoding
        )
    }
}

/// Capital statistics accumulated over one simulation
#[derive(Debug, Clone)]
pub struct CapitalTracker {
    window: VecDeque<Decimal>,
    length: usize,
    sum: Decimal,
    baseline: Option<Decimal>,
    highest: Decimal,
    volume: Decimal,
    steps: usize,
}

impl CapitalTracker {
    pub fn new(length: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(length.min(1 << 16)),
            length: length.max(1),
            sum: Decimal::ZERO,
            baseline: None,
            highest: Decimal::ZERO,
            volume: Decimal::ZERO,
            steps: 0,
        }
    }

    /// Record capital at the end of an interval
    pub fn record(&mut self, capital: Decimal) {
        self.window.push_back(capital);
        self.sum += capital;
        if self.window.len() > self.length {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }

        if capital > self.highest {
            self.highest = capital;
            self.baseline.get_or_insert(capital);
        }
        self.steps += 1;
    }

    pub fn add_volume(&mut self, notional: Decimal) {
        self.volume += notional;
    }

    /// Capital has fallen below half of the highest capital seen
    pub fn below_cutoff(&self, capital: Decimal) -> bool {
        self.baseline.is_some() && capital < self.highest / Decimal::TWO
    }

    pub fn baseline(&self) -> Option<Decimal> {
        self.baseline
    }

    pub fn highest(&self) -> Decimal {
        self.highest
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Derive scores; `None` when no baseline was ever set
    pub fn finish(&self, final_capital: Decimal, fee_rate: Decimal) -> Option<ScoreSet> {
        let baseline = self.baseline.filter(|b| *b > Decimal::ZERO)?;
        let average = self.sum / Decimal::from(self.window.len());
        let final_ratio = final_capital / baseline;
        let turnover = self.volume / baseline;

        Some(ScoreSet {
            time_weighted: average / baseline,
            peak: self.highest / baseline,
            final_ratio,
            volume_adjusted: final_ratio / (Decimal::ONE + turnover * fee_rate),
        })
    }
}
