//! Deterministic simulation of one task

use super::analytics::{CapitalTracker, ScoreSet};
use super::execution_model::{Holdings, OrderConstraints};
use super::replay::{warm_up_all, MarketCursor};
use super::task::{Fingerprint, Task};
use super::SimulationError;
use crate::allocation::{AllocationInput, AssetState, PolicyRegistry};
use crate::config::SimulationConfig;
use crate::data::{PriceStore, Variant};
use crate::telemetry::{self, CounterMetric};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantReport {
    pub scores: ScoreSet,
    /// Main-loop intervals recorded
    pub steps: usize,
    pub trades: usize,
    /// Stopped early because capital fell below half its peak
    pub cut_off: bool,
    pub final_capital: Decimal,
}

/// Outcome of a task across every variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub fingerprint: Fingerprint,
    pub encoding: String,
    /// Sum of scores over scored variants
    pub totals: ScoreSet,
    pub scored_variants: usize,
    pub variants: usize,
}

impl TaskOutcome {
    /// Scores averaged over every variant; unscored variants count as zero
    pub fn normalized(&self) -> ScoreSet {
        self.totals.divided_by(self.variants)
    }
}

/// Shared, read-only context for running tasks
#[derive(Debug, Clone)]
pub struct Simulator {
    config: Arc<SimulationConfig>,
    prices: Arc<PriceStore>,
    variants: Arc<[Variant]>,
    policies: Arc<PolicyRegistry>,
}

impl Simulator {
    pub fn new(
        config: SimulationConfig,
        prices: PriceStore,
        variants: Vec<Variant>,
        policies: PolicyRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            prices: Arc::new(prices),
            variants: variants.into(),
            policies: Arc::new(policies),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn prices(&self) -> &PriceStore {
        &self.prices
    }

    /// Simulate every variant and sum the scores
    pub fn run_task(&self, task: &Task, fingerprint: Fingerprint) -> TaskOutcome {
        let encoding = task.encode(&self.policies);
        let mut totals = ScoreSet::default();
        let mut scored_variants = 0;

        for variant in self.variants.iter() {
            match self.run_variant(task, variant) {
                Ok(report) => {
                    tracing::debug!(
                        task = %encoding,
                        variant = %variant.name,
                        steps = report.steps,
                        trades = report.trades,
                        cut_off = report.cut_off,
                        "Variant finished"
                    );
                    totals.accumulate(&report.scores);
                    scored_variants += 1;
                }
                Err(e) => {
                    tracing::debug!(task = %encoding, variant = %variant.name, error = %e, "Variant aborted");
                    telemetry::increment(CounterMetric::VariantsAborted, 1);
                }
            }
        }

        TaskOutcome {
            fingerprint,
            encoding,
            totals,
            scored_variants,
            variants: self.variants.len(),
        }
    }

    /// Simulate one variant from warm-up to the end of the data
    pub fn run_variant(
        &self,
        task: &Task,
        variant: &Variant,
    ) -> Result<VariantReport, SimulationError> {
        let config = self.config.as_ref();
        let policy = self.policies.get(task.policy)?;
        let indicators = task.canonical_indicators();

        let mut sources = Vec::new();
        for quote in task.markets.quotes.iter().filter(|q| variant.includes(q)) {
            let series = self
                .prices
                .get(quote)
                .ok_or_else(|| SimulationError::MissingSeries(quote.clone()))?;
            sources.push((quote.clone(), Arc::clone(series)));
        }
        let latest_start = sources
            .iter()
            .map(|(_, series)| series.start_secs())
            .max()
            .ok_or_else(|| SimulationError::EmptyVariant(variant.name.clone()))?;

        let mut markets = sources
            .into_iter()
            .map(|(quote, series)| MarketCursor::new(quote, series, config, &indicators, latest_start))
            .collect::<Result<Vec<_>, _>>()?;
        warm_up_all(&mut markets, config.repair_skew)?;

        let mut holdings = Holdings::new(config.initial_quantity(&task.markets.base));
        for market in &markets {
            holdings
                .quotes
                .insert(market.quote().to_string(), config.initial_quantity(market.quote()));
        }

        let mut tracker = CapitalTracker::new(config.capital_window);
        let mut prices: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut trades = 0;
        let mut cut_off = false;

        'replay: loop {
            for market in &mut markets {
                if !market.step()? {
                    break 'replay;
                }
            }

            let mut assets = BTreeMap::new();
            for market in &markets {
                let quote = market.quote();
                let price = market.price()?;
                let reference_price = market.reference_price(price)?;
                prices.insert(quote.to_string(), price);
                assets.insert(
                    quote.to_string(),
                    AssetState {
                        quantity: holdings.quantity(quote),
                        price,
                        reference_price,
                        favorability: config.favorability_of(quote),
                    },
                );
            }

            let input = AllocationInput {
                base_quantity: holdings.base,
                assets,
                reserve_fraction: config.reserve_fraction,
            };
            let deltas = policy.allocate(&input)?;

            let capital = input.capital();
            if capital <= Decimal::ZERO {
                return Err(SimulationError::CapitalExhausted(capital));
            }
            if tracker.below_cutoff(capital) {
                cut_off = true;
                break;
            }

            let limits = OrderConstraints::for_interval(config, capital, markets.len());
            for (quote, delta) in &deltas {
                let Some(&price) = prices.get(quote) else {
                    continue;
                };
                if let Some(fill) =
                    limits.size_order(*delta, price, holdings.quantity(quote), holdings.base)
                {
                    holdings.apply(quote, &fill);
                    tracker.add_volume(fill.notional);
                    trades += 1;
                }
            }

            tracker.record(capital);
        }

        let final_capital = holdings.capital(&prices);
        let scores = tracker
            .finish(final_capital, config.fee_rate)
            .ok_or(SimulationError::NoBaseline)?;

        Ok(VariantReport {
            scores,
            steps: tracker.steps(),
            trades,
            cut_off,
            final_capital,
        })
    }
}
