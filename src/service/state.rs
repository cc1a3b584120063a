//! Service state management.
//!
//! Wraps the shared [`Assembler`] together with an optional handle to the
//! realtime loop and the identity of the active configuration.

use chrono::{DateTime, Utc};

use crate::assembler::Assembler;
use crate::config::KernelConfig;
use crate::realtime::LoopHandle;
use crate::store::GraphStore;

/// Shared service state.
#[derive(Clone)]
pub struct ServiceState {
    /// Graph and resolution pipeline.
    pub assembler: Assembler,
    /// Realtime loop, when one is running.
    pub realtime: Option<LoopHandle>,
    /// `KernelConfig::params_hash` of the active configuration.
    pub params_hash: String,
    /// Service start time.
    pub started_at: DateTime<Utc>,
}

impl ServiceState {
    /// State over a loaded graph.
    pub fn new(graph: GraphStore, config: KernelConfig) -> Self {
        let params_hash = config.params_hash();
        Self {
            assembler: Assembler::new(graph, config),
            realtime: None,
            params_hash,
            started_at: Utc::now(),
        }
    }

    /// State over an existing assembler handle.
    pub fn from_assembler(assembler: Assembler) -> Self {
        let params_hash = assembler.config().params_hash();
        Self {
            assembler,
            realtime: None,
            params_hash,
            started_at: Utc::now(),
        }
    }

    /// Attach the realtime loop so ingested reads are announced to it.
    pub fn with_realtime(mut self, handle: LoopHandle) -> Self {
        self.realtime = Some(handle);
        self
    }

    /// Announce processed reads to the realtime loop, if any.
    pub fn notify_reads(&self, n: usize) {
        if let Some(handle) = &self.realtime {
            handle.notify_reads(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_hash_tracks_config() {
        let a = ServiceState::new(GraphStore::new(3), KernelConfig::default());
        let mut config = KernelConfig::default();
        config.bridging.tolerance = 50;
        let b = ServiceState::new(GraphStore::new(3), config);
        assert_ne!(a.params_hash, b.params_hash);
        assert_eq!(a.params_hash, KernelConfig::default().params_hash());
    }

    #[test]
    fn test_notify_without_loop_is_noop() {
        let state = ServiceState::new(GraphStore::new(3), KernelConfig::default());
        state.notify_reads(3);
        assert!(state.realtime.is_none());
    }
}
