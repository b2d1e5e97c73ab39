//! Session cache - warm engine processes reused across games
//!
//! Level 3 - Step-level implementation
//!
//! A session is moved out of the cache on acquire and moved back on
//! release, so no two workers can ever hold the same session. Idle sessions
//! count towards the live total of their configuration.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use ucimatch_engine::{CancellationToken, EngineConfiguration, EngineSession, POLL_SLICE};

use crate::collaborators::{AffinityManager, NoAffinity};
use crate::config::OverflowPolicy;
use crate::error::AcquireError;

type Key = Arc<EngineConfiguration>;

#[derive(Default)]
struct CacheState {
    idle: FxHashMap<Key, Vec<EngineSession>>,
    live: FxHashMap<Key, usize>,
    closed: bool,
}

impl CacheState {
    fn forget(&mut self, key: &Key) {
        if let Some(live) = self.live.get_mut(key) {
            *live = live.saturating_sub(1);
        }
    }

    /// Pop a running idle session, discarding dead ones
    fn take_idle(&mut self, key: &Key) -> Option<EngineSession> {
        loop {
            let mut session = self.idle.get_mut(key)?.pop()?;
            if session.is_alive() {
                return Some(session);
            }
            debug!(engine = %key.name, session = session.id(), "discarding dead idle session");
            self.forget(key);
        }
    }
}

/// Pool of engine sessions keyed by configuration
pub struct SessionCache {
    state: Mutex<CacheState>,
    freed: Condvar,
    capacity: usize,
    overflow: OverflowPolicy,
    cancel: CancellationToken,
    affinity: Arc<dyn AffinityManager>,
}

impl SessionCache {
    /// Cache keeping up to `capacity` sessions per configuration
    pub fn new(capacity: usize, overflow: OverflowPolicy, cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            freed: Condvar::new(),
            capacity: capacity.max(1),
            overflow,
            cancel,
            affinity: Arc::new(NoAffinity),
        }
    }

    /// Consult `affinity` for every newly started session
    pub fn with_affinity(mut self, affinity: Arc<dyn AffinityManager>) -> Self {
        self.affinity = affinity;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a ready-to-use session for `config`, starting one if needed
    pub fn acquire(&self, config: &Key) -> Result<EngineSession, AcquireError> {
        let mut state = self.lock();
        loop {
            if let Some(session) = state.take_idle(config) {
                debug!(engine = %config.name, session = session.id(), "reusing session");
                return Ok(session);
            }
            let live = state.live.get(config).copied().unwrap_or(0);
            if self.overflow == OverflowPolicy::Spawn || live < self.capacity {
                *state.live.entry(Arc::clone(config)).or_insert(0) += 1;
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(AcquireError::Interrupted {
                    engine: config.name.clone(),
                });
            }
            state = self
                .freed
                .wait_timeout(state, POLL_SLICE)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);

        let mut session = EngineSession::new(Arc::clone(config), self.cancel.clone());
        if let Err(e) = session.start() {
            self.lock().forget(config);
            self.freed.notify_all();
            return Err(AcquireError::Start(e));
        }
        debug!(engine = %config.name, session = session.id(), pid = ?session.pid(), "started session");

        match self.affinity.assign(session.id(), session.pid()) {
            Ok(cores) if !cores.is_empty() => {
                debug!(engine = %config.name, session = session.id(), ?cores, "affinity assigned")
            }
            Ok(_) => {}
            Err(e) => warn!(engine = %config.name, session = session.id(), error = %e, "affinity assignment failed"),
        }
        Ok(session)
    }

    /// Hand a session back; unhealthy or surplus sessions are stopped
    pub fn release(&self, mut session: EngineSession, healthy: bool) {
        let key = Arc::clone(session.config());
        let mut state = self.lock();
        let idle = state.idle.get(&key).map_or(0, Vec::len);
        if healthy && !state.closed && idle < self.capacity && session.is_alive() {
            state.idle.entry(key).or_default().push(session);
            drop(state);
            self.freed.notify_all();
            return;
        }

        state.forget(&key);
        drop(state);
        self.freed.notify_all();

        debug!(engine = %key.name, session = session.id(), healthy, "disposing session");
        if let Err(e) = session.stop() {
            warn!(session = session.id(), error = %e, "failed to stop engine session");
        }
    }

    /// Stop every idle session; later releases are disposed of
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        let idle: Vec<(Key, Vec<EngineSession>)> = state.idle.drain().collect();
        for (key, sessions) in &idle {
            for _ in sessions {
                state.forget(key);
            }
        }
        drop(state);
        self.freed.notify_all();

        for (_, sessions) in idle {
            for mut session in sessions {
                if let Err(e) = session.stop() {
                    warn!(session = session.id(), error = %e, "failed to stop engine session");
                }
            }
        }
    }

    /// Idle sessions for `config`
    pub fn idle_count(&self, config: &Key) -> usize {
        self.lock().idle.get(config).map_or(0, Vec::len)
    }

    /// Sessions for `config` that are running, idle or checked out
    pub fn live_count(&self, config: &Key) -> usize {
        self.lock().live.get(config).copied().unwrap_or(0)
    }
}
