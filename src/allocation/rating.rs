//! Rating-based allocation
//!
//! Each currency is rated by how far its price sits below its reference
//! price. Ratings are normalised against the weakest currency, sharpened by an
//! integer power and scaled by favorability, then turned into target weights
//! over the investable part of capital.

use super::types::{AllocationError, AllocationInput, Deltas};
use super::AllocationPolicy;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Reference implementation, parameterised by the rating exponent
#[derive(Debug, Clone)]
pub struct RatingPolicy {
    name: &'static str,
    power: u32,
}

impl RatingPolicy {
    pub fn new(name: &'static str, power: u32) -> Self {
        Self { name, power }
    }

    pub fn power(&self) -> u32 {
        self.power
    }
}

impl AllocationPolicy for RatingPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn allocate(&self, input: &AllocationInput) -> Result<Deltas, AllocationError> {
        validate_prices(input)?;

        let mut ratings = BTreeMap::new();
        for (currency, asset) in &input.assets {
            if asset.reference_price <= Decimal::ZERO {
                return Err(AllocationError::NonPositiveReference(currency.clone()));
            }
            let rating = asset
                .reference_price
                .checked_div(asset.price)
                .ok_or_else(|| AllocationError::Overflow(currency.clone()))?;
            ratings.insert(currency.clone(), rating);
        }

        let lowest = ratings
            .values()
            .copied()
            .min()
            .ok_or(AllocationError::NoAssets)?;

        let mut weights = BTreeMap::new();
        for (currency, rating) in ratings {
            let favorability = input.assets[&currency].favorability;
            let weight = rating
                .checked_div(lowest)
                .and_then(|relative| power(relative, self.power))
                .and_then(|sharpened| sharpened.checked_mul(favorability));
            match weight {
                Some(weight) => weights.insert(currency, weight),
                None => return Err(AllocationError::Overflow(currency)),
            };
        }

        rebalance(input, weights)
    }
}

fn power(value: Decimal, exponent: u32) -> Option<Decimal> {
    (0..exponent).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(value))
}

/// Reject inputs a policy cannot price
pub(crate) fn validate_prices(input: &AllocationInput) -> Result<(), AllocationError> {
    if input.assets.is_empty() {
        return Err(AllocationError::NoAssets);
    }
    for (currency, asset) in &input.assets {
        if asset.price <= Decimal::ZERO {
            return Err(AllocationError::NonPositivePrice(currency.clone()));
        }
        if asset.favorability < Decimal::ZERO {
            return Err(AllocationError::NegativeFavorability(currency.clone()));
        }
    }
    Ok(())
}

/// Turn raw weights into quantity deltas.
///
/// Weights are normalised to sum to `1 - reserve_fraction`; the reserve stays
/// in the base currency, so the implied targets sum to total capital.
pub(crate) fn rebalance(
    input: &AllocationInput,
    weights: BTreeMap<String, Decimal>,
) -> Result<Deltas, AllocationError> {
    let capital = input.capital();
    if capital <= Decimal::ZERO {
        return Err(AllocationError::NonPositiveCapital(capital));
    }

    let total = weights
        .values()
        .try_fold(Decimal::ZERO, |sum, weight| sum.checked_add(*weight))
        .ok_or_else(|| AllocationError::Overflow("total weight".to_string()))?;
    if total <= Decimal::ZERO {
        return Err(AllocationError::NoPositiveWeight);
    }

    let investable = capital * (Decimal::ONE - input.reserve_fraction);
    let mut deltas = Deltas::new();
    for (currency, weight) in weights {
        let asset = &input.assets[&currency];
        let target = (weight / total)
            .checked_mul(investable)
            .and_then(|value| value.checked_div(asset.price))
            .and_then(|target| target.checked_sub(asset.quantity));
        match target {
            Some(delta) => deltas.insert(currency, delta),
            None => return Err(AllocationError::Overflow(currency)),
        };
    }

    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AssetState;
    use rust_decimal_macros::dec;

    fn asset(quantity: Decimal, price: Decimal, reference_price: Decimal) -> AssetState {
        AssetState {
            quantity,
            price,
            reference_price,
            favorability: dec!(1),
        }
    }

    fn input() -> AllocationInput {
        let mut assets = BTreeMap::new();
        // ETH trades at its reference, LTC at half of it
        assets.insert("ETH".to_string(), asset(dec!(1), dec!(2), dec!(2)));
        assets.insert("LTC".to_string(), asset(dec!(0), dec!(1), dec!(2)));
        AllocationInput {
            base_quantity: dec!(8),
            assets,
            reserve_fraction: dec!(0),
        }
    }

    #[test]
    fn test_targets_sum_to_capital() {
        let input = input();
        let deltas = RatingPolicy::new("rating", 1).allocate(&input).unwrap();

        // capital 10, ratings 1 and 2 => weights 1/3 and 2/3
        let eth_target = dec!(1) + deltas["ETH"];
        let ltc_target = dec!(0) + deltas["LTC"];
        let invested = eth_target * dec!(2) + ltc_target * dec!(1);
        assert_eq!(invested.round_dp(10), dec!(10));
        assert!(ltc_target > eth_target * dec!(2));
    }

    #[test]
    fn test_power_sharpens_preference() {
        let input = input();
        let linear = RatingPolicy::new("rating", 1).allocate(&input).unwrap();
        let squared = RatingPolicy::new("rating-squared", 2).allocate(&input).unwrap();
        assert!(squared["LTC"] > linear["LTC"]);
        assert!(squared["ETH"] < linear["ETH"]);
    }

    #[test]
    fn test_reserve_stays_in_base() {
        let mut input = input();
        input.reserve_fraction = dec!(0.2);
        let deltas = RatingPolicy::new("rating", 1).allocate(&input).unwrap();

        let invested = (dec!(1) + deltas["ETH"]) * dec!(2) + deltas["LTC"];
        assert_eq!(invested.round_dp(10), dec!(8));
    }

    #[test]
    fn test_rejects_non_positive_reference() {
        let mut input = input();
        if let Some(eth) = input.assets.get_mut("ETH") {
            eth.reference_price = dec!(0);
        }
        let result = RatingPolicy::new("rating", 1).allocate(&input);
        assert_eq!(
            result,
            Err(AllocationError::NonPositiveReference("ETH".to_string()))
        );
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let mut input = input();
        if let Some(ltc) = input.assets.get_mut("LTC") {
            ltc.price = dec!(-1);
        }
        let result = RatingPolicy::new("rating", 1).allocate(&input);
        assert_eq!(result, Err(AllocationError::NonPositivePrice("LTC".to_string())));
    }

    #[test]
    fn test_zero_favorability_sells_everything() {
        let mut input = input();
        if let Some(eth) = input.assets.get_mut("ETH") {
            eth.favorability = dec!(0);
        }
        let deltas = RatingPolicy::new("rating", 1).allocate(&input).unwrap();
        assert_eq!(deltas["ETH"], dec!(-1));
    }

    #[test]
    fn test_extreme_rating_fails_instead_of_overflowing() {
        let mut input = input();
        if let Some(ltc) = input.assets.get_mut("LTC") {
            ltc.reference_price = dec!(10_000_000_000);
        }
        let result = RatingPolicy::new("rating-cubed", 3).allocate(&input);
        assert_eq!(result, Err(AllocationError::Overflow("LTC".to_string())));

        // the linear policy still fits and puts almost everything in LTC
        let deltas = RatingPolicy::new("rating", 1).allocate(&input).unwrap();
        assert!(deltas["LTC"] > dec!(9.99));
    }
}
