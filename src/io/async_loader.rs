//! Asynchronous table population.
//!
//! This module publishes annotations into a table model from a background
//! thread, keeping the caller responsive while a source loads. It stands in
//! for the external per-source loaders that drive real tables.

use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use log::debug;

use crate::traits::{Annotation, AnnotationTableModel, DynTableModel};

/// Holds the state of an async population operation.
///
/// Only the in_progress flag is shared; results come through a channel.
/// This struct is wrapped in an `Arc<Mutex<>>` to allow safe sharing between
/// the starting thread and the background publishing thread.
pub struct LoadingState {
    /// True if a population operation is currently in progress
    pub in_progress: bool,
}

impl LoadingState {
    pub fn new() -> Self {
        Self { in_progress: false }
    }
}

impl Default for LoadingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a completed population operation.
pub enum LoadResult {
    /// Population completed successfully
    Success {
        /// Number of rows published to the table
        rows_published: usize,
    },
    /// Producing the annotations failed
    Error(String),
    /// No operation in progress or no result available yet
    None,
}

/// Publishes annotations into a shared table model from a background thread.
///
/// The producer callback runs off-thread, and each produced batch is pushed
/// through `add_annotations` on that thread, so listeners fire on the worker
/// exactly as they would for a real external loader.
pub struct AsyncTableLoader {
    /// Shared loading state flag
    loading_state: Arc<Mutex<LoadingState>>,

    /// Channel receiver for the completion result
    completion_receiver: Option<Receiver<Result<usize, String>>>,
}

impl AsyncTableLoader {
    /// Creates a loader with no active operation.
    pub fn new() -> Self {
        Self {
            loading_state: Arc::new(Mutex::new(LoadingState::new())),
            completion_receiver: None,
        }
    }

    /// Checks if a population operation is currently in progress.
    pub fn is_loading(&self) -> bool {
        let state = self.loading_state.lock().unwrap();
        state.in_progress
    }

    /// Starts populating `table` in the background.
    ///
    /// `produce` runs on the worker thread and yields the full annotation
    /// set for this source; the result is then published in batches of
    /// `batch_size`. Call `check_completion()` to observe the outcome.
    pub fn start_load<A, F>(&mut self, table: Arc<DynTableModel<A>>, produce: F, batch_size: usize)
    where
        A: Annotation,
        F: FnOnce() -> anyhow::Result<Vec<Arc<A>>> + Send + 'static,
    {
        let (sender, receiver) = channel();
        self.completion_receiver = Some(receiver);

        {
            let mut state = self.loading_state.lock().unwrap();
            state.in_progress = true;
        }

        let loading_state = Arc::clone(&self.loading_state);
        let batch_size = batch_size.max(1);

        thread::spawn(move || {
            let result = match produce() {
                Ok(annotations) => {
                    let total = annotations.len();
                    debug!(
                        "publishing {} rows into {} in batches of {}",
                        total,
                        table.data_store(),
                        batch_size
                    );
                    for batch in annotations.chunks(batch_size) {
                        table.add_annotations(batch.to_vec());
                    }
                    Ok(total)
                }
                Err(error) => Err(format!("{:#}", error)),
            };

            // Clear the flag before signalling completion, so a caller that
            // observed the result never still sees an in-progress load.
            {
                let mut state = loading_state.lock().unwrap();
                state.in_progress = false;
            }

            let _ = sender.send(result);
        });
    }

    /// Checks if background population has completed.
    ///
    /// Non-blocking; returns `LoadResult::None` while the worker is still
    /// running or when no operation is active.
    pub fn check_completion(&mut self) -> LoadResult {
        if let Some(receiver) = &self.completion_receiver {
            if let Ok(result) = receiver.try_recv() {
                self.completion_receiver = None;
                return match result {
                    Ok(rows_published) => LoadResult::Success { rows_published },
                    Err(message) => LoadResult::Error(message),
                };
            }
        }

        LoadResult::None
    }

    /// Blocks until the active operation completes and returns its result.
    pub fn wait_for_completion(&mut self) -> LoadResult {
        match self.completion_receiver.take() {
            Some(receiver) => match receiver.recv() {
                Ok(Ok(rows_published)) => LoadResult::Success { rows_published },
                Ok(Err(message)) => LoadResult::Error(message),
                Err(_) => LoadResult::Error("worker thread exited without a result".to_string()),
            },
            None => LoadResult::None,
        }
    }
}

impl Default for AsyncTableLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticTableSource;

    #[test]
    fn test_loader_creation() {
        let loader = AsyncTableLoader::new();
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_check_completion_when_idle() {
        let mut loader = AsyncTableLoader::new();
        assert!(matches!(loader.check_completion(), LoadResult::None));
    }

    #[test]
    fn test_background_population() {
        let source = SyntheticTableSource::with_config("em-raw", 120, 7);
        let table = Arc::new(DynTableModel::Source(source.create_table()));

        let mut loader = AsyncTableLoader::new();
        loader.start_load(table.clone(), move || Ok(source.generate_annotations()), 32);

        match loader.wait_for_completion() {
            LoadResult::Success { rows_published } => assert_eq!(rows_published, 120),
            LoadResult::Error(message) => panic!("load failed: {}", message),
            LoadResult::None => panic!("no load was started"),
        }
        assert_eq!(table.num_annotations(), 120);
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_producer_error_is_reported() {
        let source = SyntheticTableSource::with_config("em-raw", 1, 7);
        let table = Arc::new(DynTableModel::Source(source.create_table()));

        let mut loader = AsyncTableLoader::new();
        loader.start_load(
            table.clone(),
            || Err(anyhow::anyhow!("source unreachable")),
            32,
        );

        match loader.wait_for_completion() {
            LoadResult::Error(message) => assert!(message.contains("source unreachable")),
            _ => panic!("expected an error result"),
        }
        assert_eq!(table.num_annotations(), 0);
    }
}
