//! Equal-weight allocation, ignoring reference prices

use super::rating::{rebalance, validate_prices};
use super::types::{AllocationError, AllocationInput, Deltas};
use super::AllocationPolicy;

/// Splits investable capital evenly, scaled only by favorability
#[derive(Debug, Clone, Default)]
pub struct EqualWeightPolicy;

impl AllocationPolicy for EqualWeightPolicy {
    fn name(&self) -> &'static str {
        "equal-weight"
    }

    fn allocate(&self, input: &AllocationInput) -> Result<Deltas, AllocationError> {
        validate_prices(input)?;
        let weights = input
            .assets
            .iter()
            .map(|(currency, asset)| (currency.clone(), asset.favorability))
            .collect();
        rebalance(input, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AssetState;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    #[test]
    fn test_even_split_ignores_reference() {
        let mut assets = BTreeMap::new();
        for (currency, price) in [("ETH", dec!(4)), ("LTC", dec!(1))] {
            assets.insert(
                currency.to_string(),
                AssetState {
                    quantity: dec!(0),
                    price,
                    reference_price: dec!(0),
                    favorability: dec!(1),
                },
            );
        }
        let input = AllocationInput {
            base_quantity: dec!(10),
            assets,
            reserve_fraction: dec!(0),
        };

        let deltas = EqualWeightPolicy.allocate(&input).unwrap();
        assert_eq!(deltas["ETH"], dec!(1.25));
        assert_eq!(deltas["LTC"], dec!(5));
    }
}
