//! Incremental technical indicator over a price stream
//!
//! A [`Signal`] is fed one sample per base interval and reports a value once
//! its window is full. Ratio kinds compare a fast window against a slow window
//! of the same measure; the slow side is the only embedded state, so nesting
//! never goes deeper than one level.

use super::types::{SignalError, SignalKind};
use super::window::{Measure, Window};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Layout {
    Base(Window),
    Ratio { fast: Window, slow: Window },
}

/// Configured indicator and its accumulated state
#[derive(Debug, Clone)]
pub struct Signal {
    kind: SignalKind,
    fast_length: usize,
    slow_length: usize,
    weight: Decimal,
    layout: Layout,
}

impl Signal {
    /// Create a configured signal with empty state
    pub fn new(
        kind: SignalKind,
        fast_length: usize,
        slow_length: usize,
        weight: Decimal,
    ) -> Result<Self, SignalError> {
        let layout = Self::layout_for(kind, fast_length, slow_length)?;
        Ok(Self {
            kind,
            fast_length,
            slow_length,
            weight: weight.max(Decimal::ONE),
            layout,
        })
    }

    /// Reconfigure, discarding all accumulated state
    pub fn configure(
        &mut self,
        kind: SignalKind,
        fast_length: usize,
        slow_length: usize,
        weight: Decimal,
    ) -> Result<(), SignalError> {
        *self = Self::new(kind, fast_length, slow_length, weight)?;
        Ok(())
    }

    fn layout_for(
        kind: SignalKind,
        fast_length: usize,
        slow_length: usize,
    ) -> Result<Layout, SignalError> {
        if fast_length == 0 {
            return Err(SignalError::ZeroLength(kind));
        }
        if kind.requires_slow_length() && slow_length == 0 {
            return Err(SignalError::ZeroSlowLength(kind));
        }

        let measure = match kind {
            SignalKind::Sma | SignalKind::SmaRatio => Measure::Mean,
            SignalKind::Wma | SignalKind::WmaRatio => Measure::Linear,
            SignalKind::Ema | SignalKind::EmaRatio => Measure::Quadratic,
            SignalKind::Rsi => Measure::Strength,
            SignalKind::RsiRatio => Measure::InverseStrength,
        };

        let fast = Window::new(measure, fast_length);
        if !kind.is_ratio() || slow_length == 0 {
            return Ok(Layout::Base(fast));
        }
        Ok(Layout::Ratio {
            fast,
            slow: Window::new(measure, slow_length),
        })
    }

    /// Discard accumulated samples, keeping the configuration
    pub fn clear(&mut self) {
        match &mut self.layout {
            Layout::Base(window) => window.clear(),
            Layout::Ratio { fast, slow } => {
                fast.clear();
                slow.clear();
            }
        }
    }

    /// Feed one price sample
    pub fn add_sample(&mut self, price: Decimal) {
        match &mut self.layout {
            Layout::Base(window) => window.add(price),
            Layout::Ratio { fast, slow } => {
                slow.add(price);
                fast.add(price);
            }
        }
    }

    /// Whether every window holds enough samples to report a value
    pub fn is_ready(&self) -> bool {
        match &self.layout {
            Layout::Base(window) => window.is_ready(),
            Layout::Ratio { fast, slow } => fast.is_ready() && slow.is_ready(),
        }
    }

    /// Current value, or `None` until ready or when the result is not positive
    pub fn value(&self) -> Option<Decimal> {
        let value = match &self.layout {
            Layout::Base(window) => window.value()?,
            Layout::Ratio { fast, slow } => {
                let fast = fast.value()?;
                let slow = slow.value()?;
                if fast <= Decimal::ZERO || slow <= Decimal::ZERO {
                    return None;
                }
                self.apply_weight(fast.checked_div(slow)?)?
            }
        };
        (value > Decimal::ZERO).then_some(value)
    }

    /// Ratios at or above one are amplified, ratios below one are attenuated.
    /// `None` if the amplified ratio no longer fits a `Decimal`.
    fn apply_weight(&self, ratio: Decimal) -> Option<Decimal> {
        if ratio >= Decimal::ONE {
            ratio.checked_mul(self.weight)
        } else {
            Some(ratio / self.weight)
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn fast_length(&self) -> usize {
        self.fast_length
    }

    pub fn slow_length(&self) -> usize {
        self.slow_length
    }

    pub fn weight(&self) -> Decimal {
        self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::RoundingStrategy;
    use rust_decimal_macros::dec;

    const RSI_CLOSES: [&str; 20] = [
        "44.34", "44.09", "44.15", "43.61", "44.33", "44.83", "45.10", "45.42", "45.84", "46.08",
        "45.89", "46.03", "45.61", "46.28", "46.28", "46.00", "46.03", "46.41", "46.22", "45.64",
    ];

    fn truncated(signal: &Signal) -> Decimal {
        signal
            .value()
            .unwrap()
            .round_dp_with_strategy(8, RoundingStrategy::ToZero)
    }

    fn feed(signal: &mut Signal, samples: impl IntoIterator<Item = i64>) {
        for sample in samples {
            signal.add_sample(Decimal::from(sample));
        }
    }

    #[test]
    fn test_sma() {
        let mut sma = Signal::new(SignalKind::Sma, 10, 0, dec!(1)).unwrap();
        feed(&mut sma, 1..=9);
        assert!(!sma.is_ready());
        assert_eq!(sma.value(), None);

        feed(&mut sma, 10..=11);
        assert_eq!(sma.value(), Some(dec!(6.5)));

        feed(&mut sma, 12..=13);
        assert_eq!(sma.value(), Some(dec!(8.5)));
    }

    #[test]
    fn test_wma_and_ema() {
        let mut wma = Signal::new(SignalKind::Wma, 3, 0, dec!(1)).unwrap();
        feed(&mut wma, 2..=4);
        assert_eq!(truncated(&wma), dec!(3.33333333));
        feed(&mut wma, 5..=5);
        assert_eq!(truncated(&wma), dec!(4.33333333));

        let mut ema = Signal::new(SignalKind::Ema, 3, 0, dec!(1)).unwrap();
        feed(&mut ema, 2..=4);
        assert_eq!(truncated(&ema), dec!(3.57142857));
    }

    #[test]
    fn test_rsi_wilder() {
        let mut rsi = Signal::new(SignalKind::Rsi, 14, 0, dec!(1)).unwrap();
        let expected = [
            "70.46413502",
            "66.24961855",
            "66.48094183",
            "69.34685316",
            "66.29471265",
            "57.91502067",
        ];

        for (i, close) in RSI_CLOSES.iter().enumerate() {
            rsi.add_sample(close.parse().unwrap());
            if i < 14 {
                assert!(!rsi.is_ready());
            } else {
                assert_eq!(truncated(&rsi), expected[i - 14].parse::<Decimal>().unwrap());
            }
        }
    }

    #[test]
    fn test_moving_average_ratios() {
        let mut smar = Signal::new(SignalKind::SmaRatio, 5, 10, dec!(1)).unwrap();
        feed(&mut smar, 1..=10);
        assert_eq!(truncated(&smar), dec!(1.45454545));

        let mut wmar = Signal::new(SignalKind::WmaRatio, 3, 6, dec!(1)).unwrap();
        feed(&mut wmar, 2..=7);
        assert_eq!(wmar.value().unwrap().round_dp(8), dec!(1.1875));

        let mut emar = Signal::new(SignalKind::EmaRatio, 2, 4, dec!(1)).unwrap();
        feed(&mut emar, 2..=5);
        assert_eq!(truncated(&emar), dec!(1.10769230));
    }

    #[test]
    fn test_rsi_ratio() {
        let mut rsir = Signal::new(SignalKind::RsiRatio, 7, 14, dec!(1)).unwrap();
        for close in &RSI_CLOSES[..15] {
            rsir.add_sample(close.parse().unwrap());
        }
        assert_eq!(truncated(&rsir), dec!(1.00858312));

        for close in &RSI_CLOSES[15..] {
            rsir.add_sample(close.parse().unwrap());
        }
        assert_eq!(truncated(&rsir), dec!(1.26056324));
    }

    #[test]
    fn test_rsi_ratio_without_slow_side_is_unweighted() {
        let mut plain = Signal::new(SignalKind::RsiRatio, 14, 0, dec!(3)).unwrap();
        for close in &RSI_CLOSES[..15] {
            plain.add_sample(close.parse().unwrap());
        }
        // 0.5 + 1 / (2 * rs) with rs from the 70.46 reading
        let value = plain.value().unwrap();
        assert!(value > dec!(0.70) && value < dec!(0.72));
    }

    #[test]
    fn test_weight_amplifies_and_attenuates() {
        let mut rising = Signal::new(SignalKind::SmaRatio, 1, 2, dec!(2)).unwrap();
        feed(&mut rising, [1, 3]);
        // 3 / 2 = 1.5, amplified
        assert_eq!(rising.value(), Some(dec!(3)));

        let mut falling = Signal::new(SignalKind::SmaRatio, 1, 2, dec!(2)).unwrap();
        feed(&mut falling, [3, 1]);
        // 1 / 2 = 0.5, attenuated
        assert_eq!(falling.value(), Some(dec!(0.25)));
    }

    #[test]
    fn test_weight_clamped_to_one() {
        let signal = Signal::new(SignalKind::SmaRatio, 1, 2, dec!(0.2)).unwrap();
        assert_eq!(signal.weight(), dec!(1));
    }

    #[test]
    fn test_readiness_is_monotonic() {
        for kind in SignalKind::ALL {
            let mut signal = Signal::new(kind, 3, 6, dec!(1.5)).unwrap();
            let mut was_ready = false;
            for i in 0..40 {
                // Alternating moves keep both gain and loss averages positive
                let price = Decimal::from(100 + (i % 3)) + Decimal::from(i) / dec!(10);
                signal.add_sample(price);
                if was_ready {
                    assert!(signal.is_ready(), "{kind} lost readiness at sample {i}");
                }
                was_ready = signal.is_ready();
            }
            assert!(was_ready, "{kind} never became ready");
        }
    }

    #[test]
    fn test_rsi_stays_ready_through_long_decline() {
        for kind in [SignalKind::Rsi, SignalKind::RsiRatio] {
            let mut signal = Signal::new(kind, 2, 0, dec!(1)).unwrap();
            feed(&mut signal, [10, 11, 10, 11, 10]);
            assert!(signal.is_ready());

            let mut price = dec!(10);
            for i in 0..500 {
                price -= dec!(0.01);
                signal.add_sample(price);
                assert!(signal.is_ready(), "{kind} lost readiness after {i} declines");
            }
            assert!(signal.value().is_some());
        }
    }

    #[test]
    fn test_configure_resets_state() {
        let mut signal = Signal::new(SignalKind::Sma, 2, 0, dec!(1)).unwrap();
        feed(&mut signal, [1, 2]);
        assert!(signal.is_ready());

        signal.configure(SignalKind::Wma, 3, 0, dec!(1)).unwrap();
        assert!(!signal.is_ready());
        assert_eq!(signal.kind(), SignalKind::Wma);

        feed(&mut signal, [1, 2, 3]);
        signal.clear();
        assert!(!signal.is_ready());
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(
            Signal::new(SignalKind::Sma, 0, 0, dec!(1)).unwrap_err(),
            SignalError::ZeroLength(SignalKind::Sma)
        );
        assert_eq!(
            Signal::new(SignalKind::EmaRatio, 4, 0, dec!(1)).unwrap_err(),
            SignalError::ZeroSlowLength(SignalKind::EmaRatio)
        );
        assert!(Signal::new(SignalKind::RsiRatio, 4, 0, dec!(1)).is_ok());
    }
}
