//! Process-wide, load-once engine handles.

use crate::error::{Result, ScribeError};
use std::fmt;
use std::sync::{Arc, OnceLock};

type Loader<E> = Box<dyn Fn() -> Result<Arc<E>> + Send + Sync>;

/// Engine constructed on first use and shared afterwards.
///
/// The first `get()` runs the loader; concurrent callers block until it
/// finishes. The outcome is cached either way, so a model that failed to load
/// is not retried for the life of the process.
pub struct LazyEngine<E: ?Sized> {
    name: String,
    loader: Loader<E>,
    cell: OnceLock<std::result::Result<Arc<E>, String>>,
}

impl<E: ?Sized> LazyEngine<E> {
    pub fn new<F>(name: &str, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<E>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            loader: Box::new(loader),
            cell: OnceLock::new(),
        }
    }

    /// Wrap an engine that is already loaded.
    pub fn ready(name: &str, engine: Arc<E>) -> Self
    where
        E: 'static,
    {
        Self {
            name: name.to_string(),
            loader: Box::new(|| Err(ScribeError::Other("engine already loaded".to_string()))),
            cell: OnceLock::from(Ok(engine)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the engine if needed and return the shared handle.
    pub fn get(&self) -> Result<Arc<E>> {
        let outcome = self.cell.get_or_init(|| {
            tracing::info!(engine = %self.name, "Loading recognition engine");
            match (self.loader)() {
                Ok(engine) => Ok(engine),
                Err(e) => {
                    tracing::warn!(engine = %self.name, error = %e, "Recognition engine failed to load");
                    Err(e.to_string())
                }
            }
        });

        match outcome {
            Ok(engine) => Ok(Arc::clone(engine)),
            Err(message) => Err(ScribeError::EngineInit {
                message: message.clone(),
            }),
        }
    }

    /// Whether a load has been attempted.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<E: ?Sized> fmt::Debug for LazyEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.get() {
            None => "pending",
            Some(Ok(_)) => "loaded",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("LazyEngine")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}
