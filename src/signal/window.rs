//! Fixed-length sample window with a single measure

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;

/// What a window computes over its samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Measure {
    /// Arithmetic mean, kept as a running sum
    Mean,
    /// Weights 1..n, newest heaviest
    Linear,
    /// Weights i² for i in 1..n
    Quadratic,
    /// Wilder RSI in 0..100
    Strength,
    /// `0.5 + 1 / (2 * rs)`; above 1 when oversold, below 1 when overbought
    InverseStrength,
}

impl Measure {
    fn tracks_strength(self) -> bool {
        matches!(self, Measure::Strength | Measure::InverseStrength)
    }
}

/// Smallest positive `Decimal`; smoothed averages never decay below it
const AVERAGE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 28);

/// Wilder smoothing state
#[derive(Debug, Clone, Default)]
struct Strength {
    seed_gain: Decimal,
    seed_loss: Decimal,
    seed_deltas: usize,
    avg_gain: Decimal,
    avg_loss: Decimal,
    seeded: bool,
    /// Both averages have been positive; stays set until cleared
    populated: bool,
}

impl Strength {
    fn update(&mut self, delta: Decimal, length: usize) {
        let gain = delta.max(Decimal::ZERO);
        let loss = (-delta).max(Decimal::ZERO);
        let n = Decimal::from(length);

        if self.seeded {
            self.avg_gain = (self.avg_gain * (n - Decimal::ONE) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - Decimal::ONE) + loss) / n;
        } else {
            self.seed_gain += gain;
            self.seed_loss += loss;
            self.seed_deltas += 1;
            if self.seed_deltas < length {
                return;
            }
            self.avg_gain = self.seed_gain / n;
            self.avg_loss = self.seed_loss / n;
            self.seeded = true;
        }

        if self.populated {
            // a long one-way run would otherwise round an average to zero
            self.avg_gain = self.avg_gain.max(AVERAGE_FLOOR);
            self.avg_loss = self.avg_loss.max(AVERAGE_FLOOR);
        } else {
            self.populated = self.avg_gain > Decimal::ZERO && self.avg_loss > Decimal::ZERO;
        }
    }

    /// `avg_gain / avg_loss`, `None` when the ratio exceeds `Decimal::MAX`
    fn relative_strength(&self) -> Option<Decimal> {
        self.avg_gain.checked_div(self.avg_loss)
    }
}

/// Bounded queue of the most recent samples
#[derive(Debug, Clone)]
pub(crate) struct Window {
    measure: Measure,
    length: usize,
    samples: VecDeque<Decimal>,
    sum: Decimal,
    strength: Strength,
}

impl Window {
    pub(crate) fn new(measure: Measure, length: usize) -> Self {
        Self {
            measure,
            length,
            samples: VecDeque::with_capacity(length + 1),
            sum: Decimal::ZERO,
            strength: Strength::default(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
        self.sum = Decimal::ZERO;
        self.strength = Strength::default();
    }

    pub(crate) fn add(&mut self, sample: Decimal) {
        if self.measure.tracks_strength() {
            if let Some(&previous) = self.samples.back() {
                self.strength.update(sample - previous, self.length);
            }
        }

        self.samples.push_back(sample);
        if self.measure == Measure::Mean {
            self.sum += sample;
        }

        while self.samples.len() > self.length {
            if let Some(evicted) = self.samples.pop_front() {
                if self.measure == Measure::Mean {
                    self.sum -= evicted;
                }
            }
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        if self.samples.len() < self.length {
            return false;
        }
        !self.measure.tracks_strength() || self.strength.populated
    }

    pub(crate) fn value(&self) -> Option<Decimal> {
        if !self.is_ready() {
            return None;
        }

        let value = match self.measure {
            Measure::Mean => self.sum / Decimal::from(self.samples.len()),
            Measure::Linear => self.weighted(|i| i),
            Measure::Quadratic => self.weighted(|i| i * i),
            Measure::Strength => {
                let rs = self.strength.relative_strength();
                match rs.and_then(|rs| rs.checked_add(Decimal::ONE)) {
                    Some(divisor) => dec!(100) - dec!(100) / divisor,
                    None => dec!(100),
                }
            }
            Measure::InverseStrength => {
                let rs = self.strength.relative_strength();
                match rs.and_then(|rs| rs.checked_add(rs)) {
                    // rs below 1e-28 rounds to zero and has no finite inverse
                    Some(twice) => dec!(0.5) + Decimal::ONE.checked_div(twice)?,
                    None => dec!(0.5),
                }
            }
        };
        Some(value)
    }

    fn weighted(&self, weight_of: impl Fn(u64) -> u64) -> Decimal {
        let mut total = Decimal::ZERO;
        let mut weights = Decimal::ZERO;
        for (i, sample) in self.samples.iter().enumerate() {
            let weight = Decimal::from(weight_of(i as u64 + 1));
            total += *sample * weight;
            weights += weight;
        }
        total / weights
    }
}
