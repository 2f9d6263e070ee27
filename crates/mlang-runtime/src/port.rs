//! Ports: shared communication nodes with two-phase rendezvous.
//!
//! A port holds the last value written to it (in packed form), the
//! `reqRead`/`reqWrite` flags, and a round counter per registered party.
//! [`Port::sync`] signals the caller's next round and then waits until every
//! *other* registered party has reached that round too; a party never waits
//! on its own signal.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlang_core::Coercion;
use tokio::sync::Notify;
use tracing::trace;

use crate::error::{Result, RuntimeError};
use crate::serial::{Packed, convert, pack, unpack};
use crate::unit::PartyId;
use crate::value::Value;

#[derive(Debug, Default)]
struct PortState {
    value: Packed,
    read_requested: bool,
    write_requested: bool,
    rounds: BTreeMap<PartyId, u64>,
}

impl PortState {
    fn others_caught_up(&self, party: PartyId) -> bool {
        let mine = self.rounds.get(&party).copied().unwrap_or(0);
        self.rounds
            .iter()
            .all(|(p, &round)| *p == party || round >= mine)
    }
}

#[derive(Debug, Default)]
struct PortInner {
    state: Mutex<PortState>,
    changed: Notify,
}

/// A communication node. Clones share the same node.
#[derive(Debug, Clone, Default)]
pub struct Port {
    inner: Arc<PortInner>,
}

impl Port {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PortState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `party` as a participant and hand back a handle to this node.
    pub fn bind(&self, party: PartyId) -> Port {
        self.register(party);
        self.clone()
    }

    pub fn register(&self, party: PartyId) {
        self.state().rounds.entry(party).or_insert(0);
    }

    /// Number of registered parties.
    pub fn parties(&self) -> usize {
        self.state().rounds.len()
    }

    // ==========================================================================
    // Value and flags
    // ==========================================================================

    /// Current value, converted with the reader's serialization code.
    pub fn load(&self, code: &Coercion) -> Result<Value> {
        let packed = self.state().value.clone();
        if packed == Packed::Empty {
            return Err(RuntimeError::EmptyPort);
        }
        convert(&unpack(&packed), code)
    }

    /// Replace the value, packed with the writer's serialization code.
    pub fn store(&self, value: Value, code: &Coercion) -> Result<()> {
        let packed = pack(&value, code)?;
        self.state().value = packed;
        self.inner.changed.notify_waiters();
        Ok(())
    }

    pub fn read_requested(&self) -> bool {
        self.state().read_requested
    }

    pub fn set_read_requested(&self, on: bool) {
        self.state().read_requested = on;
    }

    pub fn write_requested(&self) -> bool {
        self.state().write_requested
    }

    pub fn set_write_requested(&self, on: bool) {
        self.state().write_requested = on;
    }

    // ==========================================================================
    // Rendezvous
    // ==========================================================================

    /// Phase one: announce that `party` reached its next round.
    pub fn signal(&self, party: PartyId) {
        let round = {
            let mut state = self.state();
            let round = state.rounds.entry(party).or_insert(0);
            *round += 1;
            *round
        };
        trace!(%party, round, "port signal");
        self.inner.changed.notify_waiters();
    }

    /// Phase two: wait until every other registered party caught up with
    /// `party`'s round.
    pub async fn wait_others(&self, party: PartyId) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state().others_caught_up(party) {
                trace!(%party, "port rendezvous complete");
                return;
            }
            notified.await;
        }
    }

    /// Signal, then wait for the others.
    pub async fn sync(&self, party: PartyId) {
        self.signal(party);
        self.wait_others(party).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn load_converts_with_reader_code() {
        let port = Port::new();
        assert_eq!(port.load(&Coercion::Direct), Err(RuntimeError::EmptyPort));

        port.store(Value::int(3), &Coercion::Direct).unwrap();
        let reader = Coercion::Inj {
            index: 0,
            inner: Box::new(Coercion::Bounded { l: 0, r: 5 }),
        };
        assert_eq!(port.load(&reader).unwrap(), Value::union(0, Value::int(3)));
        assert!(port.load(&Coercion::Bounded { l: 4, r: 5 }).is_err());
    }

    #[test]
    fn flags_are_independent() {
        let port = Port::new();
        port.set_read_requested(true);
        assert!(port.read_requested());
        assert!(!port.write_requested());
    }

    #[tokio::test]
    async fn lone_party_never_waits_on_itself() {
        let port = Port::new();
        let me = PartyId::fresh();
        port.bind(me);
        tokio::time::timeout(Duration::from_secs(1), port.sync(me))
            .await
            .expect("a single party must not block");
    }

    #[tokio::test]
    async fn sync_blocks_until_all_others_signal() {
        let port = Port::new();
        let (a, b, c) = (PartyId::fresh(), PartyId::fresh(), PartyId::fresh());
        for p in [a, b, c] {
            port.register(p);
        }

        let early = tokio::time::timeout(Duration::from_millis(50), port.sync(a)).await;
        assert!(early.is_err(), "a must wait for b and c");

        let pb = port.clone();
        let pc = port.clone();
        let tb = tokio::spawn(async move { pb.sync(b).await });
        let tc = tokio::spawn(async move { pc.sync(c).await });

        tokio::time::timeout(Duration::from_secs(1), port.wait_others(a))
            .await
            .expect("a completes once b and c signalled");
        tb.await.unwrap();
        tc.await.unwrap();
    }

    #[tokio::test]
    async fn repeated_rounds_stay_in_lockstep() {
        let port = Port::new();
        let (a, b) = (PartyId::fresh(), PartyId::fresh());
        let pa = port.bind(a);
        let pb = port.bind(b);

        let ta = tokio::spawn(async move {
            for _ in 0..5 {
                pa.sync(a).await;
            }
        });
        let tb = tokio::spawn(async move {
            for _ in 0..5 {
                pb.sync(b).await;
            }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            ta.await.unwrap();
            tb.await.unwrap();
        })
        .await
        .expect("both parties finish five rounds");
    }
}
