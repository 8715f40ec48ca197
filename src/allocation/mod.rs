//! Portfolio allocation policies
//!
//! A policy maps holdings, prices and per-currency reference prices to signed
//! quantity deltas. Policies are pure: they never keep state between calls.
//! Tasks select a policy by its index in the [`PolicyRegistry`].

mod equal;
mod rating;
mod types;

pub use equal::EqualWeightPolicy;
pub use rating::RatingPolicy;
pub use types::{AllocationError, AllocationInput, AssetState, Deltas};

use std::fmt;

/// Trait for allocation implementations
pub trait AllocationPolicy: Send + Sync + fmt::Debug {
    /// Registry name, used in result encodings
    fn name(&self) -> &'static str;

    /// Compute the deltas that move the portfolio to its target.
    /// Positive deltas buy, negative deltas sell.
    fn allocate(&self, input: &AllocationInput) -> Result<Deltas, AllocationError>;
}

/// Named policies addressable by index
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: Vec<Box<dyn AllocationPolicy>>,
}

impl PolicyRegistry {
    /// Registry with every built-in policy, in stable index order
    pub fn standard() -> Self {
        Self {
            policies: vec![
                Box::new(RatingPolicy::new("rating", 1)),
                Box::new(RatingPolicy::new("rating-squared", 2)),
                Box::new(RatingPolicy::new("rating-cubed", 3)),
                Box::new(EqualWeightPolicy),
            ],
        }
    }

    /// Add a policy after the built-ins, returning its index
    pub fn register(&mut self, policy: Box<dyn AllocationPolicy>) -> usize {
        self.policies.push(policy);
        self.policies.len() - 1
    }

    /// Look up a policy by index
    pub fn get(&self, index: usize) -> Result<&dyn AllocationPolicy, AllocationError> {
        self.policies
            .get(index)
            .map(|policy| policy.as_ref())
            .ok_or(AllocationError::UnknownPolicy(index))
    }

    /// Index of the policy registered under `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.policies.iter().position(|policy| policy.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.policies.iter().map(|policy| policy.name())
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_order() {
        let registry = PolicyRegistry::standard();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            vec!["rating", "rating-squared", "rating-cubed", "equal-weight"]
        );
        assert_eq!(registry.index_of("rating-cubed"), Some(2));
        assert_eq!(registry.get(1).unwrap().name(), "rating-squared");
    }

    #[test]
    fn test_unknown_index() {
        let registry = PolicyRegistry::standard();
        assert_eq!(
            registry.get(registry.len()).unwrap_err(),
            AllocationError::UnknownPolicy(4)
        );
    }
}
