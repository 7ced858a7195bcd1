// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory state store for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{Result, StackState, StateError, StateLock, StateStore};

type Key = (String, String);

/// State store keeping snapshots in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<Mutex<HashMap<Key, StackState>>>,
    locks: Arc<Mutex<HashSet<Key>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots written so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn key(project: &str, stack: &str) -> Key {
    (project.to_string(), stack.to_string())
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, project: &str, stack: &str) -> Result<Option<StackState>> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(&key(project, stack)).cloned())
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key(&state.project, &state.stack), state.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn delete(&self, project: &str, stack: &str) -> Result<()> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key(project, stack));
        Ok(())
    }

    async fn list(&self, project: &str) -> Result<Vec<String>> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let mut stacks: Vec<String> = states
            .keys()
            .filter(|(p, _)| p == project)
            .map(|(_, s)| s.clone())
            .collect();
        stacks.sort();
        Ok(stacks)
    }

    async fn lock(&self, project: &str, stack: &str) -> Result<StateLock> {
        let k = key(project, stack);
        {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if !locks.insert(k.clone()) {
                return Err(StateError::Locked(stack.to_string()));
            }
        }

        let locks = self.locks.clone();
        Ok(StateLock::new(move || {
            locks.lock().unwrap_or_else(|e| e.into_inner()).remove(&k);
        }))
    }
}
