//! Party identity and per-unit state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Identity token of one participant in port rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartyId(u64);

impl PartyId {
    /// A token distinct from every other token of this process.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PartyId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party#{}", self.0)
    }
}

/// State owned by one running automaton: its party token and the random
/// source used to pick among enabled guarded branches.
#[derive(Debug)]
pub struct Unit {
    party: PartyId,
    rng: StdRng,
}

impl Unit {
    pub fn new(party: PartyId) -> Self {
        Self::with_rng(party, StdRng::from_entropy())
    }

    /// Deterministic branch selection, for tests.
    pub fn seeded(party: PartyId, seed: u64) -> Self {
        Self::with_rng(party, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(party: PartyId, rng: StdRng) -> Self {
        Self { party, rng }
    }

    pub fn party(&self) -> PartyId {
        self.party
    }

    /// Pick uniformly among the indices whose guard holds.
    pub fn choose(&mut self, enabled: &[bool]) -> Option<usize> {
        let candidates: Vec<usize> = enabled
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect();
        candidates.choose(&mut self.rng).copied()
    }

    /// End of one automaton round.
    pub async fn end_round(&mut self) {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_parties_are_distinct() {
        let a = PartyId::fresh();
        let b = PartyId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn choose_only_enabled_indices() {
        let mut unit = Unit::seeded(PartyId::fresh(), 7);
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let i = unit.choose(&[false, true, true]).unwrap();
            seen[i] += 1;
        }
        assert_eq!(seen[0], 0);
        assert!(seen[1] > 0);
        assert!(seen[2] > 0);
    }

    #[test]
    fn choose_nothing_when_all_disabled() {
        let mut unit = Unit::seeded(PartyId::fresh(), 1);
        assert_eq!(unit.choose(&[false, false, false]), None);
        assert_eq!(unit.choose(&[]), None);
    }

    #[test]
    fn seeded_units_agree() {
        let mut a = Unit::seeded(PartyId::fresh(), 42);
        let mut b = Unit::seeded(PartyId::fresh(), 42);
        let guards = [true, true, false, true];
        for _ in 0..20 {
            assert_eq!(a.choose(&guards), b.choose(&guards));
        }
    }
}
