// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-document debounce table.
//!
//! Each key holds at most one pending job. Scheduling again replaces the payload and restarts the
//! quiet period. Jobs for the same key never overlap: a job that fires while an earlier one is
//! still running waits for it first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;

use crate::model::DiagramId;

type InFlight = Shared<BoxFuture<'static, ()>>;

struct PendingJob {
    generation: u64,
    job: BoxFuture<'static, ()>,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    next_generation: u64,
    pending: HashMap<DiagramId, PendingJob>,
    in_flight: HashMap<DiagramId, (u64, InFlight)>,
}

#[derive(Clone)]
pub(crate) struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Replaces any pending job for `id` and restarts its timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn schedule<F>(&self, id: DiagramId, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let timer = tokio::spawn({
            let debouncer = self.clone();
            let id = id.clone();
            async move {
                tokio::time::sleep(debouncer.delay).await;
                debouncer.fire(id, generation).await;
            }
        });

        let replaced = state.pending.insert(
            id,
            PendingJob {
                generation,
                job: job.boxed(),
                timer,
            },
        );
        if let Some(previous) = replaced {
            previous.timer.abort();
            tracing::debug!("debounce: coalesced pending job");
        }
    }

    /// Runs the pending job for `id` now, after any job for `id` that is already running.
    pub(crate) async fn flush(&self, id: &DiagramId) {
        let run = {
            let mut state = self.lock();
            match state.pending.remove(id) {
                Some(pending) => {
                    pending.timer.abort();
                    Some(self.start(&mut state, id, pending.generation, pending.job))
                }
                None => state.in_flight.get(id).map(|(_, run)| run.clone()),
            }
        };

        if let Some(run) = run {
            run.await;
        }
    }

    /// Drops the pending job for `id` without running it.
    ///
    /// Waits for a job for `id` that has already started, so no write for `id` runs once this
    /// returns. A no-op when nothing is pending.
    pub(crate) async fn cancel(&self, id: &DiagramId) {
        let running = {
            let mut state = self.lock();
            if let Some(pending) = state.pending.remove(id) {
                pending.timer.abort();
                tracing::debug!(diagram_id = %id, "debounce: cancelled pending job");
            }
            state.in_flight.get(id).map(|(_, run)| run.clone())
        };

        if let Some(running) = running {
            running.await;
        }
    }

    /// Drops every pending job. Jobs that already started run to completion.
    pub(crate) fn clear(&self) {
        let mut state = self.lock();
        for (_, pending) in state.pending.drain() {
            pending.timer.abort();
        }
    }

    pub(crate) fn is_pending(&self, id: &DiagramId) -> bool {
        self.lock().pending.contains_key(id)
    }

    async fn fire(&self, id: DiagramId, generation: u64) {
        let run = {
            let mut state = self.lock();
            let current = state
                .pending
                .get(&id)
                .is_some_and(|pending| pending.generation == generation);
            if !current {
                return;
            }
            let Some(pending) = state.pending.remove(&id) else {
                return;
            };
            self.start(&mut state, &id, generation, pending.job)
        };

        run.await;
    }

    fn start(
        &self,
        state: &mut DebounceState,
        id: &DiagramId,
        generation: u64,
        job: BoxFuture<'static, ()>,
    ) -> InFlight {
        let previous = state.in_flight.get(id).map(|(_, run)| run.clone());
        let debouncer = self.clone();
        let key = id.clone();

        let run = async move {
            if let Some(previous) = previous {
                previous.await;
            }
            job.await;
            debouncer.finish(&key, generation);
        }
        .boxed()
        .shared();

        state.in_flight.insert(id.clone(), (generation, run.clone()));
        run
    }

    fn finish(&self, id: &DiagramId, generation: u64) {
        let mut state = self.lock();
        if state
            .in_flight
            .get(id)
            .is_some_and(|(running, _)| *running == generation)
        {
            state.in_flight.remove(id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
