// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reward tier resolution.
//!
//! A [`TierTable`] maps a donation amount to the tier whose inclusive
//! `[min, max]` range contains it, and to the next tier up with the amount
//! still missing to reach it.

use harambee_core::HarambeeError;
use harambee_core::types::Tier;

/// The next tier above a resolved one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTier<'a> {
    pub tier: &'a Tier,
    /// `tier.min - amount`, always positive.
    pub remaining: i64,
}

/// The outcome of resolving an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMatch<'a> {
    pub tier: &'a Tier,
    pub next: Option<NextTier<'a>>,
}

/// An ordered set of reward tiers.
#[derive(Debug, Clone, Default)]
pub struct TierTable {
    // Sorted by ascending `min`.
    tiers: Vec<Tier>,
}

impl TierTable {
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by_key(|t| t.min);
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Returns the tier containing `amount`, or `None` if no range does.
    ///
    /// Overlapping ranges are rejected by configuration validation; should
    /// they occur anyway, the tier with the highest `min` wins. The next
    /// tier is the lowest one whose `min` lies above `amount`.
    pub fn resolve(&self, amount: i64) -> Option<TierMatch<'_>> {
        let tier = self
            .tiers
            .iter()
            .rev()
            .find(|t| t.min <= amount && amount <= t.max)?;
        let next = self
            .tiers
            .iter()
            .find(|t| t.min > amount)
            .map(|next| NextTier {
                tier: next,
                remaining: next.min - amount,
            });
        Some(TierMatch { tier, next })
    }

    /// Like [`resolve`](Self::resolve), failing with [`HarambeeError::NoTierMatch`].
    pub fn resolve_or_err(&self, amount: i64) -> Result<TierMatch<'_>, HarambeeError> {
        self.resolve(amount)
            .ok_or(HarambeeError::NoTierMatch { amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tier(name: &str, min: i64, max: i64) -> Tier {
        Tier {
            name: name.into(),
            min,
            max,
            invite_link: None,
            channel_id: None,
        }
    }

    fn default_table() -> TierTable {
        TierTable::new(vec![
            tier("Kings", 50_000, 150_000),
            tier("Helpers", 10, 999),
            tier("Knights", 1_000, 49_999),
        ])
    }

    #[test]
    fn fifty_is_a_helper_with_950_to_knights() {
        let table = default_table();
        let m = table.resolve(50).unwrap();
        assert_eq!(m.tier.name, "Helpers");
        let next = m.next.unwrap();
        assert_eq!(next.tier.name, "Knights");
        assert_eq!(next.remaining, 950);
    }

    #[test]
    fn range_edges_are_inclusive() {
        let table = default_table();
        assert_eq!(table.resolve(10).unwrap().tier.name, "Helpers");
        assert_eq!(table.resolve(999).unwrap().tier.name, "Helpers");
        assert_eq!(table.resolve(1_000).unwrap().tier.name, "Knights");
        assert_eq!(table.resolve(150_000).unwrap().tier.name, "Kings");
    }

    #[test]
    fn top_tier_has_no_next() {
        let table = default_table();
        assert!(table.resolve(60_000).unwrap().next.is_none());
    }

    #[test]
    fn out_of_range_amounts_have_no_tier() {
        let table = default_table();
        assert!(table.resolve(9).is_none());
        assert!(table.resolve(150_001).is_none());
        assert!(matches!(
            table.resolve_or_err(5),
            Err(HarambeeError::NoTierMatch { amount: 5 })
        ));
    }

    #[test]
    fn overlap_prefers_highest_min() {
        let table = TierTable::new(vec![tier("Low", 0, 100), tier("High", 50, 200)]);
        assert_eq!(table.resolve(75).unwrap().tier.name, "High");
        assert_eq!(table.resolve(25).unwrap().tier.name, "Low");
        assert_eq!(table.resolve(25).unwrap().next.unwrap().remaining, 25);
    }

    proptest! {
        #[test]
        fn resolution_is_stable_and_remaining_positive(amount in 10i64..=150_000) {
            let table = default_table();
            let first = table.resolve(amount).unwrap();
            let second = table.resolve(amount).unwrap();
            prop_assert_eq!(&first.tier.name, &second.tier.name);
            prop_assert!(first.tier.min <= amount && amount <= first.tier.max);
            if let Some(next) = first.next {
                prop_assert!(next.remaining > 0);
                prop_assert_eq!(next.remaining, next.tier.min - amount);
            }
        }
    }
}
