//! Model lifecycle shared by every adapter
//!
//! A model moves `Unloaded -> Loading -> Ready` on the first `load` (explicit
//! or implied by a prediction call) and back to `Unloaded` on `unload`. A
//! failed load returns the slot to `Unloaded` so the next call retries.

use crate::error::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Observable lifecycle state of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
}

/// Holder for a lazily loaded model
pub struct ModelSlot<M> {
    model: Mutex<Option<Arc<M>>>,
    state: RwLock<ModelState>,
}

impl<M> ModelSlot<M> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            model: Mutex::new(None),
            state: RwLock::new(ModelState::Unloaded),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        *self.state.read()
    }

    /// Return the loaded model, running `loader` first if the slot is empty.
    ///
    /// Concurrent callers wait for the in-flight load instead of starting
    /// another one.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<M>>,
    {
        let mut guard = self.model.lock().await;
        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }

        *self.state.write() = ModelState::Loading;
        let loading = LoadingGuard::new(&self.state);

        let model = Arc::new(loader().await?);
        *guard = Some(Arc::clone(&model));
        loading.finish();

        Ok(model)
    }

    /// Drop the loaded model. Returns false when nothing was loaded.
    ///
    /// In-flight predictions holding an `Arc` keep the weights alive until
    /// they finish.
    pub async fn unload(&self) -> bool {
        let mut guard = self.model.lock().await;
        let was_loaded = guard.take().is_some();
        *self.state.write() = ModelState::Unloaded;
        was_loaded
    }
}

/// Returns the state to `Unloaded` unless the load finishes, including when
/// the loading future is dropped mid-await
struct LoadingGuard<'a> {
    state: &'a RwLock<ModelState>,
    done: bool,
}

impl<'a> LoadingGuard<'a> {
    fn new(state: &'a RwLock<ModelState>) -> Self {
        Self { state, done: false }
    }

    fn finish(mut self) {
        *self.state.write() = ModelState::Ready;
        self.done = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.write() = ModelState::Unloaded;
        }
    }
}

impl<M> Default for ModelSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}
