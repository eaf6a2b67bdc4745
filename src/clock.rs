//! Per-project logical time (spec §4.2).
//!
//! A thin facade over the Store's `agent_state` row: the component boundary
//! the spec draws between "Clock" and "Store" is preserved here even though
//! both are backed by the same table, so callers depend on `Clock`'s
//! contract rather than reaching into Store internals.

use uuid::Uuid;

use crate::domain::{AgentState, RunKind};
use crate::error::Result;
use crate::store::Store;

pub struct Clock<'a> {
    store: &'a Store,
}

impl<'a> Clock<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn initialize(&self, project_id: Uuid) -> Result<AgentState> {
        self.store.initialize_project(project_id).await
    }

    /// Atomically `current_tick += 1`. Invoked exactly once at the start of
    /// each agent cycle (spec §4.2).
    pub async fn increment(&self, project_id: Uuid) -> Result<u64> {
        self.store.increment_tick(project_id).await
    }

    pub async fn mark_decay_ran(&self, project_id: Uuid) -> Result<()> {
        self.store.mark_decay_ran(project_id).await
    }

    pub async fn mark_consolidation_ran(&self, project_id: Uuid) -> Result<()> {
        self.store.mark_consolidation_ran(project_id).await
    }

    pub async fn should_run(&self, project_id: Uuid, kind: RunKind, interval: u64) -> Result<bool> {
        let state = self.store.load_agent_state(project_id).await?;
        Ok(state.should_run(kind, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tick_is_strictly_monotonic() {
        let store = Store::open_in_memory().await.unwrap();
        let clock = Clock::new(&store);
        let pid = Uuid::new_v4();
        clock.initialize(pid).await.unwrap();
        assert_eq!(clock.increment(pid).await.unwrap(), 1);
        assert_eq!(clock.increment(pid).await.unwrap(), 2);
        assert_eq!(clock.increment(pid).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn should_run_honors_interval() {
        let store = Store::open_in_memory().await.unwrap();
        let clock = Clock::new(&store);
        let pid = Uuid::new_v4();
        clock.initialize(pid).await.unwrap();
        for _ in 0..5 {
            clock.increment(pid).await.unwrap();
        }
        assert!(!clock.should_run(pid, RunKind::Decay, 10).await.unwrap());
        clock.mark_decay_ran(pid).await.unwrap();
        for _ in 0..10 {
            clock.increment(pid).await.unwrap();
        }
        assert!(clock.should_run(pid, RunKind::Decay, 10).await.unwrap());
    }
}
