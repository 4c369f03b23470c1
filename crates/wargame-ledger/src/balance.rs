//! Resource balance deduction primitives shared by Upkeep, Resource
//! Transfer, and Resource Collection (spec.md §4.5–§4.8).
//!
//! Every owed payment in the engine -- faction spending, building upkeep,
//! unit upkeep, a resource transfer -- follows the same shape: deduct
//! `min(needed, available)` per resource, never driving a balance
//! negative, and report which resource *kinds* (not amounts) came up
//! short, since deficit-type counts drive durability and organization
//! penalties (spec.md §4.8).

use wargame_types::{Resource, ResourceMap};

/// The outcome of attempting to pay a `needed` amount out of an
/// `available` balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deduction {
    /// What was actually deducted/transferred, per resource.
    pub paid: ResourceMap,
    /// `needed - paid`, per resource (zero where fully paid).
    pub shortfall: ResourceMap,
}

impl Deduction {
    /// True if every resource kind was paid in full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.shortfall.is_empty()
    }

    /// The resource kinds that came up short, in canonical order
    /// (spec.md §4.8 "Deficit type": "counts, not amounts, drive
    /// penalties").
    #[must_use]
    pub fn deficit_types(&self) -> Vec<Resource> {
        self.shortfall
            .iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(r, _)| r)
            .collect()
    }

    /// The number of distinct resource types under-paid -- the
    /// durability/organization penalty amount (spec.md §4.8).
    #[must_use]
    pub fn deficit_type_count(&self) -> u32 {
        u32::try_from(self.deficit_types().len()).unwrap_or(u32::MAX)
    }
}

/// Deduct `needed` from `balance`, paying `min(needed, available)` per
/// resource and never driving `balance` negative. Mutates `balance` in
/// place and returns the [`Deduction`] outcome.
pub fn deduct(balance: &mut ResourceMap, needed: &ResourceMap) -> Deduction {
    let mut outcome = Deduction::default();
    for (resource, amount_needed) in needed.iter() {
        if amount_needed == 0 {
            continue;
        }
        let available = balance.get(resource);
        let amount_paid = amount_needed.min(available);
        balance.set(resource, available - amount_paid);
        outcome.paid.set(resource, amount_paid);
        outcome
            .shortfall
            .set(resource, amount_needed - amount_paid);
    }
    outcome
}

/// Credit `amount` into `balance` (territory/character production,
/// transfer receipt, ...).
pub fn credit(balance: &mut ResourceMap, amount: &ResourceMap) {
    for (resource, value) in amount.iter() {
        if value == 0 {
            continue;
        }
        let current = balance.get(resource);
        balance.set(resource, current.saturating_add(value));
    }
}

/// Sum two resource maps (used to accumulate multiple production sources
/// into a single `CHARACTER_PRODUCTION` event, spec.md §4.5 step 4).
#[must_use]
pub fn sum(a: &ResourceMap, b: &ResourceMap) -> ResourceMap {
    let mut total = *a;
    credit(&mut total, b);
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payment_leaves_no_shortfall() {
        let mut balance = ResourceMap { ore: 10, ..Default::default() };
        let needed = ResourceMap { ore: 4, ..Default::default() };
        let outcome = deduct(&mut balance, &needed);
        assert!(outcome.is_full());
        assert_eq!(balance.ore, 6);
        assert_eq!(outcome.paid.ore, 4);
    }

    #[test]
    fn partial_payment_never_goes_negative() {
        // Building upkeep deficit scenario from spec.md §8 scenario 2:
        // needed {ore:2, lumber:3, coal:1}, available {ore:5, lumber:1, coal:0}.
        let mut balance = ResourceMap { ore: 5, lumber: 1, coal: 0, ..Default::default() };
        let needed = ResourceMap { ore: 2, lumber: 3, coal: 1, ..Default::default() };
        let outcome = deduct(&mut balance, &needed);
        assert_eq!(outcome.paid, ResourceMap { ore: 2, lumber: 1, coal: 0, ..Default::default() });
        assert_eq!(balance, ResourceMap { ore: 3, lumber: 0, coal: 0, ..Default::default() });
        assert_eq!(outcome.deficit_type_count(), 2);
        assert_eq!(
            outcome.deficit_types(),
            vec![Resource::Lumber, Resource::Coal]
        );
    }

    #[test]
    fn transfer_partial_scenario_from_spec() {
        // spec.md §8 scenario 1: sender ore=5, lumber=0; requests ore=10, lumber=3.
        let mut sender = ResourceMap { ore: 5, lumber: 0, ..Default::default() };
        let requested = ResourceMap { ore: 10, lumber: 3, ..Default::default() };
        let outcome = deduct(&mut sender, &requested);
        assert_eq!(outcome.paid, ResourceMap { ore: 5, ..Default::default() });
        assert_eq!(sender.ore, 0);
        assert!(!outcome.is_full());
    }

    #[test]
    fn credit_accumulates_without_overflow_panic() {
        let mut balance = ResourceMap { ore: u64::MAX, ..Default::default() };
        credit(&mut balance, &ResourceMap { ore: 5, ..Default::default() });
        assert_eq!(balance.ore, u64::MAX);
    }

    #[test]
    fn sum_combines_two_maps() {
        let a = ResourceMap { ore: 3, ..Default::default() };
        let b = ResourceMap { ore: 2, lumber: 1, ..Default::default() };
        let total = sum(&a, &b);
        assert_eq!(total.ore, 5);
        assert_eq!(total.lumber, 1);
    }
}
