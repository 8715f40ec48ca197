//! Task synthesis: exhaustive grids and random exploration

use crate::allocation::PolicyRegistry;
use crate::backtest::{IndicatorConfig, MarketSet, Task};
use crate::config::{ExploreConfig, GridConfig};
use crate::signal::SignalKind;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use thiserror::Error;

/// Task generation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("unknown allocation policy: {0}")]
    UnknownPolicy(String),
    #[error("no signal kinds to draw from")]
    NoKinds,
}

/// Endless supply of candidate tasks
pub trait TaskSource {
    fn next_task(&mut self) -> Task;
}

/// Every single-indicator task in the configured grid
pub fn grid_tasks(
    grid: &GridConfig,
    markets: &MarketSet,
    policies: &PolicyRegistry,
) -> Result<Vec<Task>, GeneratorError> {
    let policy_indices = if grid.policies.is_empty() {
        (0..policies.len()).collect()
    } else {
        grid.policies
            .iter()
            .map(|name| {
                policies
                    .index_of(name)
                    .ok_or_else(|| GeneratorError::UnknownPolicy(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut tasks = Vec::new();
    for &kind in &grid.kinds {
        let slow_lengths: &[usize] = if kind.is_ratio() {
            &grid.slow_lengths
        } else {
            &[0]
        };
        let weights: &[Decimal] = if kind.is_ratio() {
            &grid.weights
        } else {
            &[Decimal::ONE]
        };

        for &fast in &grid.fast_lengths {
            for &slow in slow_lengths {
                if kind.is_ratio() && slow != 0 && slow <= fast {
                    continue;
                }
                for &weight in weights {
                    for &policy in &policy_indices {
                        let indicator = IndicatorConfig::new(kind, fast, slow, weight);
                        tasks.push(Task::new(vec![indicator], policy, markets.clone()));
                    }
                }
            }
        }
    }
    Ok(tasks)
}

/// Random multi-indicator tasks over a fixed market set
#[derive(Debug)]
pub struct RandomTasks {
    rng: StdRng,
    config: ExploreConfig,
    markets: MarketSet,
    policy_count: usize,
}

impl RandomTasks {
    /// Seeded from `config.seed` when set, from entropy otherwise
    pub fn new(
        config: ExploreConfig,
        markets: MarketSet,
        policies: &PolicyRegistry,
    ) -> Result<Self, GeneratorError> {
        if config.kinds.is_empty() {
            return Err(GeneratorError::NoKinds);
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            config,
            markets,
            policy_count: policies.len().max(1),
        })
    }

    /// `k² * length_unit`, so short windows are sampled more densely
    fn length(&mut self) -> usize {
        let k = self.rng.gen_range(1..=self.config.length_steps.max(1));
        k * k * self.config.length_unit
    }

    fn weight(&mut self) -> Decimal {
        let steps = self.rng.gen_range(0..=self.config.weight_steps);
        Decimal::ONE + self.config.weight_step * Decimal::from(steps)
    }

    fn indicator(&mut self) -> IndicatorConfig {
        let kind = *self
            .config
            .kinds
            .choose(&mut self.rng)
            .unwrap_or(&SignalKind::SmaRatio);
        let fast = self.length();
        let slow = match kind {
            // without a slow side the fast value is used as-is
            SignalKind::RsiRatio if self.rng.gen_bool(0.25) => 0,
            k if k.is_ratio() => self.length(),
            _ => 0,
        };
        let weight = self.weight();
        IndicatorConfig::new(kind, fast, slow, weight)
    }
}

impl TaskSource for RandomTasks {
    fn next_task(&mut self) -> Task {
        let count = self.rng.gen_range(1..=self.config.max_indicators.max(1));
        let indicators = (0..count).map(|_| self.indicator()).collect();
        let policy = self.rng.gen_range(0..self.policy_count);
        Task::new(indicators, policy, self.markets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn markets() -> MarketSet {
        MarketSet::new("BTC", ["ETH", "LTC"])
    }

    #[test]
    fn test_grid_size() {
        let grid = GridConfig {
            kinds: vec![SignalKind::Sma, SignalKind::SmaRatio],
            fast_lengths: vec![10, 100],
            slow_lengths: vec![50, 400],
            weights: vec![dec!(1), dec!(2)],
            policies: vec!["rating".to_string(), "equal-weight".to_string()],
        };
        let tasks = grid_tasks(&grid, &markets(), &PolicyRegistry::standard()).unwrap();

        // sma: 2 fast * 2 policies; sma-ratio: (10/50, 10/400, 100/400) * 2 weights * 2 policies
        assert_eq!(tasks.len(), 4 + 12);
        assert!(tasks.iter().all(|t| t.indicators.len() == 1));
    }

    #[test]
    fn test_grid_unknown_policy() {
        let grid = GridConfig {
            policies: vec!["martingale".to_string()],
            ..GridConfig::default()
        };
        assert_eq!(
            grid_tasks(&grid, &markets(), &PolicyRegistry::standard()).unwrap_err(),
            GeneratorError::UnknownPolicy("martingale".to_string())
        );
    }

    #[test]
    fn test_random_tasks_are_valid_and_reproducible() {
        let config = ExploreConfig {
            seed: Some(7),
            ..ExploreConfig::default()
        };
        let registry = PolicyRegistry::standard();
        let mut a = RandomTasks::new(config.clone(), markets(), &registry).unwrap();
        let mut b = RandomTasks::new(config, markets(), &registry).unwrap();

        for _ in 0..200 {
            let task = a.next_task();
            assert_eq!(task, b.next_task());
            assert!(task.validate(&registry).is_ok());
            assert!(task.indicators.len() <= 3);
        }
    }

    #[test]
    fn test_random_tasks_need_kinds() {
        let config = ExploreConfig {
            kinds: vec![],
            ..ExploreConfig::default()
        };
        assert_eq!(
            RandomTasks::new(config, markets(), &PolicyRegistry::standard()).unwrap_err(),
            GeneratorError::NoKinds
        );
    }
}
