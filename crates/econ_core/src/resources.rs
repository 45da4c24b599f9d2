//! Resource kinds and cost vectors.
//!
//! The economy has two fungible resources. All amounts are integers.

use serde::{Deserialize, Serialize};

/// A fungible resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Primary resource, gathered by every worker.
    Minerals,
    /// Secondary resource, gathered from refineries.
    Gas,
}

impl ResourceKind {
    /// All resource kinds in a fixed order.
    pub const ALL: [Self; 2] = [Self::Minerals, Self::Gas];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minerals => write!(f, "minerals"),
            Self::Gas => write!(f, "gas"),
        }
    }
}

/// An amount of every resource kind.
///
/// Used both for action costs and for ledger balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceCost {
    /// Mineral amount.
    #[serde(default)]
    pub minerals: i32,
    /// Gas amount.
    #[serde(default)]
    pub gas: i32,
}

impl ResourceCost {
    /// Zero of every resource.
    pub const ZERO: Self = Self {
        minerals: 0,
        gas: 0,
    };

    /// Create a new cost.
    #[must_use]
    pub const fn new(minerals: i32, gas: i32) -> Self {
        Self { minerals, gas }
    }

    /// A cost of a single resource kind.
    #[must_use]
    pub const fn of(kind: ResourceKind, amount: i32) -> Self {
        match kind {
            ResourceKind::Minerals => Self::new(amount, 0),
            ResourceKind::Gas => Self::new(0, amount),
        }
    }

    /// Amount of one kind.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Minerals => self.minerals,
            ResourceKind::Gas => self.gas,
        }
    }

    /// Set the amount of one kind.
    pub fn set(&mut self, kind: ResourceKind, amount: i32) {
        match kind {
            ResourceKind::Minerals => self.minerals = amount,
            ResourceKind::Gas => self.gas = amount,
        }
    }

    /// True if every component is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minerals == 0 && self.gas == 0
    }

    /// True if no component is negative.
    #[must_use]
    pub const fn is_non_negative(&self) -> bool {
        self.minerals >= 0 && self.gas >= 0
    }

    /// Clamp every component to at least zero.
    #[must_use]
    pub fn clamp_non_negative(self) -> Self {
        Self::new(self.minerals.max(0), self.gas.max(0))
    }
}

impl std::ops::Add for ResourceCost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.minerals + rhs.minerals, self.gas + rhs.gas)
    }
}

impl std::ops::Sub for ResourceCost {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.minerals - rhs.minerals, self.gas - rhs.gas)
    }
}

impl std::ops::AddAssign for ResourceCost {
    fn add_assign(&mut self, rhs: Self) {
        self.minerals += rhs.minerals;
        self.gas += rhs.gas;
    }
}

impl std::ops::SubAssign for ResourceCost {
    fn sub_assign(&mut self, rhs: Self) {
        self.minerals -= rhs.minerals;
        self.gas -= rhs.gas;
    }
}

impl std::iter::Sum for ResourceCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, cost| acc + cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_arithmetic() {
        let a = ResourceCost::new(150, 100);
        let b = ResourceCost::new(50, 25);

        assert_eq!(a + b, ResourceCost::new(200, 125));
        assert_eq!(a - b, ResourceCost::new(100, 75));

        let mut c = ResourceCost::ZERO;
        c += a;
        c -= b;
        assert_eq!(c, ResourceCost::new(100, 75));
    }

    #[test]
    fn test_cost_per_kind_access() {
        let mut cost = ResourceCost::of(ResourceKind::Gas, 75);
        assert_eq!(cost.get(ResourceKind::Minerals), 0);
        assert_eq!(cost.get(ResourceKind::Gas), 75);

        cost.set(ResourceKind::Minerals, -10);
        assert!(!cost.is_non_negative());
        assert_eq!(cost.clamp_non_negative(), ResourceCost::new(0, 75));
    }

    #[test]
    fn test_cost_sum() {
        let total: ResourceCost = [ResourceCost::new(50, 0), ResourceCost::new(100, 50)]
            .into_iter()
            .sum();
        assert_eq!(total, ResourceCost::new(150, 50));
        assert!(std::iter::empty::<ResourceCost>().sum::<ResourceCost>().is_zero());
    }
}
