//! # Task Scheduler
//!
//! Executor a concorrenza limitata per i job dispatchati.
//!
//! ## Algoritmo:
//! - Un semaforo con `concurrency` permessi: un permesso viene acquisito prima del
//!   lancio di ogni job e rilasciato alla sua conclusione
//! - Il primo job in volo che termina libera lo slot (nessuna assegnazione fissa)
//! - Se `concurrency > numero di job` tutti i job partono subito
//! - `on_settled` viene invocato appena un job si conclude, successo o fallimento,
//!   anche mentre il driver è in attesa di un permesso
//! - Un fallimento non interrompe il batch e non viene ritentato
//! - Un panic dentro un job diventa il ramo di fallimento (`TaskPanic`)
//! - Il risultato aggregato rispetta l'ordine di lancio, non quello di completamento
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::error::CompressFailure;
//! use asset_compressor::scheduler::TaskScheduler;
//!
//! # tokio_test::block_on(async {
//! let jobs: Vec<_> = (0..4u32)
//!     .map(|i| move || async move { Ok::<u32, CompressFailure>(i * 2) })
//!     .collect();
//! let results = TaskScheduler::new(2).run(jobs, |_, _| {}).await;
//! assert_eq!(results.into_iter().map(Result::unwrap).collect::<Vec<_>>(), vec![0, 2, 4, 6]);
//! # });
//! ```

use crate::error::TaskPanic;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct TaskScheduler {
    concurrency: usize,
}

impl TaskScheduler {
    /// Scheduler with at most `concurrency` jobs in flight (0 is treated as 1)
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job, calling `on_settled(index, &result)` as each one settles
    pub async fn run<J, Fut, T, E, F>(&self, jobs: Vec<J>, mut on_settled: F) -> Vec<Result<T, E>>
    where
        J: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskPanic> + Send + 'static,
        F: FnMut(usize, &Result<T, E>),
    {
        let total = jobs.len();
        let permits = if self.concurrency <= total {
            self.concurrency
        } else {
            total.max(1)
        };
        debug!("Scheduling {} jobs with {} slots", total, permits);

        let semaphore = Arc::new(Semaphore::new(permits));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<T, E>)>();
        let mut results: Vec<Option<Result<T, E>>> = (0..total).map(|_| None).collect();

        for (index, job) in jobs.into_iter().enumerate() {
            let permit = loop {
                tokio::select! {
                    biased;
                    Some((settled, result)) = rx.recv() => {
                        on_settled(settled, &result);
                        results[settled] = Some(result);
                    }
                    acquired = semaphore.clone().acquire_owned() => break acquired.ok(),
                }
            };

            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async move { job().await })
                    .catch_unwind()
                    .await;
                let result = outcome.unwrap_or_else(|payload| {
                    let message = panic_message(payload);
                    warn!("Job {} panicked: {}", index, message);
                    Err(E::from(TaskPanic { message }))
                });
                drop(permit);
                // The receiver only goes away if the batch itself was dropped
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        while let Some((settled, result)) = rx.recv().await {
            on_settled(settled, &result);
            results[settled] = Some(result);
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(E::from(TaskPanic {
                        message: "job was cancelled before settling".to_string(),
                    }))
                })
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
