use anyhow::{Result, anyhow};

/// Lazily loaded model owned by a strategy.
///
/// A failed load is remembered only for reporting; the next call tries
/// again.
pub(crate) enum ModelSlot<T> {
    Unloaded,
    Loaded(T),
    Failed(String),
}

impl<T> ModelSlot<T> {
    pub(crate) fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns the loaded model, running `load` unless one is already loaded.
    pub(crate) fn get_or_load<F>(&mut self, load: F) -> Result<&mut T>
    where
        F: FnOnce() -> Result<T>,
    {
        if !self.is_loaded() {
            match load() {
                Ok(model) => *self = Self::Loaded(model),
                Err(err) => {
                    *self = Self::Failed(format!("{err:#}"));
                    return Err(err);
                }
            }
        }
        match self {
            Self::Loaded(model) => Ok(model),
            Self::Failed(reason) => Err(anyhow!("model unavailable: {reason}")),
            Self::Unloaded => Err(anyhow!("model not loaded")),
        }
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl<T> Default for ModelSlot<T> {
    fn default() -> Self {
        Self::Unloaded
    }
}
