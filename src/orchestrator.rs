// src/orchestrator.rs

use futures::future::join_all;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use crate::error::FetchError;
use crate::session::{FetchRequest, Transport};

/// A unit of work: the caller's key plus the request that serves it.
#[derive(Clone, Debug)]
pub struct FetchTask<K> {
    pub key: K,
    pub request: FetchRequest,
}

impl<K> FetchTask<K> {
    pub fn new(key: K, request: FetchRequest) -> Self {
        FetchTask { key, request }
    }
}

/// Terminal state of a task. A failed task is kept, never dropped from the wave.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Done(T),
    Failed(FetchError),
}

impl<T> TaskOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done(_))
    }

    pub fn as_done(&self) -> Option<&T> {
        match self {
            TaskOutcome::Done(value) => Some(value),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            TaskOutcome::Done(_) => None,
            TaskOutcome::Failed(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, FetchError> {
        match self {
            TaskOutcome::Done(value) => Ok(value),
            TaskOutcome::Failed(error) => Err(error),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> TaskOutcome<U> {
        match self {
            TaskOutcome::Done(value) => TaskOutcome::Done(f(value)),
            TaskOutcome::Failed(error) => TaskOutcome::Failed(error),
        }
    }
}

/// Every key submitted to a wave, each paired with its outcome.
#[derive(Debug)]
pub struct WaveResult<K, T> {
    outcomes: HashMap<K, TaskOutcome<T>>,
}

impl<K: Eq + Hash, T> WaveResult<K, T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&TaskOutcome<T>> {
        self.outcomes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &TaskOutcome<T>)> {
        self.outcomes.iter()
    }

    pub fn failed_keys(&self) -> Vec<&K> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_done())
            .map(|(key, _)| key)
            .collect()
    }

    pub fn done_count(&self) -> usize {
        self.outcomes.values().filter(|outcome| outcome.is_done()).count()
    }

    pub fn into_outcomes(self) -> HashMap<K, TaskOutcome<T>> {
        self.outcomes
    }

    /// Collapses failures to `T::default()`, keeping every key present.
    pub fn into_values_or_default(self) -> HashMap<K, T>
    where
        T: Default,
    {
        self.outcomes
            .into_iter()
            .map(|(key, outcome)| {
                let value = match outcome {
                    TaskOutcome::Done(value) => value,
                    TaskOutcome::Failed(_) => T::default(),
                };
                (key, value)
            })
            .collect()
    }
}

impl<K, T> IntoIterator for WaveResult<K, T> {
    type Item = (K, TaskOutcome<T>);
    type IntoIter = std::collections::hash_map::IntoIter<K, TaskOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Runs a wave of independent fetch tasks on the current task, interleaving at I/O.
///
/// All tasks share the same transport and timeout. A task that errors, times out, or
/// whose body fails to parse becomes a `Failed` outcome for its own key only. The
/// call returns once every task has reached a terminal state.
pub struct FetchOrchestrator<'a, S: Transport + ?Sized> {
    transport: &'a S,
    label: String,
    timeout: Duration,
}

impl<'a, S: Transport + ?Sized> FetchOrchestrator<'a, S> {
    pub fn new(transport: &'a S, label: impl Into<String>) -> Self {
        FetchOrchestrator {
            transport,
            label: label.into(),
            timeout: transport.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<K, T, F>(&self, tasks: Vec<FetchTask<K>>, parse: F) -> WaveResult<K, T>
    where
        K: Eq + Hash + Debug,
        F: Fn(&K, Vec<u8>) -> Result<T, FetchError>,
    {
        let started = Instant::now();
        let wave_size = tasks.len();
        let transport = self.transport;
        let per_task = self.timeout;
        let parse = &parse;

        let pending = tasks.into_iter().map(|task| async move {
            let outcome = match timeout(per_task, transport.execute(&task.request)).await {
                Ok(Ok(body)) => parse(&task.key, body),
                Ok(Err(error)) => Err(error),
                Err(_) => Err(FetchError::Timeout(per_task)),
            };
            (task.key, outcome)
        });
        let results = join_all(pending).await;

        let mut outcomes = HashMap::with_capacity(wave_size);
        for (key, outcome) in results {
            let outcome = match outcome {
                Ok(value) => TaskOutcome::Done(value),
                Err(error) => {
                    warn!("[{}] {:?} failed: {}", self.label, key, error);
                    TaskOutcome::Failed(error)
                }
            };
            if outcomes.contains_key(&key) {
                warn!("[{}] duplicate task key {:?}, keeping the last outcome", self.label, key);
            }
            outcomes.insert(key, outcome);
        }

        let wave = WaveResult { outcomes };
        debug!(
            "[{}] wave of {} finished in {:.2?}, {} failed",
            self.label,
            wave_size,
            started.elapsed(),
            wave.len() - wave.done_count()
        );
        wave
    }
}
