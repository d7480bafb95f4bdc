//! Phase units: each submodule is one self-contained transition of the
//! workflow state machine, runnable independently via its binary.

pub mod build;
pub mod document;
pub mod patch;
pub mod plan;
pub mod review;
pub mod test;

use anyhow::Result;

use crate::agent::AgentRunner;
use crate::config::Config;
use crate::state::StateStore;
use crate::tracker::Tracker;

/// Everything a phase needs: configuration, state store, agent runner, and
/// the tracker gateway.
pub struct PhaseContext {
    pub config: Config,
    pub store: StateStore,
    pub runner: AgentRunner,
    pub tracker: Tracker,
}

impl PhaseContext {
    pub fn new(config: Config) -> Result<Self> {
        let store = StateStore::new(&config);
        let runner = AgentRunner::new(&config);
        let tracker = Tracker::new(&config)?;
        Ok(Self {
            config,
            store,
            runner,
            tracker,
        })
    }
}
