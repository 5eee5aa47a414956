//! Image store adapter: batch fetch of encoded images by name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::retry::StepError;

/// Trait for the image store service.
///
/// Missing names are simply omitted from the result; the caller
/// substitutes a placeholder.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetches encoded images by name.
    async fn fetch(&self, names: &[String]) -> Result<HashMap<String, String>, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryImageStoreState {
    images: HashMap<String, String>,
    fail_on_fetch: bool,
}

/// In-memory image store for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageStore {
    state: Arc<RwLock<InMemoryImageStoreState>>,
}

impl InMemoryImageStore {
    /// Creates a new empty image store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an encoded image under a name.
    pub fn add_image(&self, name: impl Into<String>, encoded: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .images
            .insert(name.into(), encoded.into());
    }

    /// Configures the store to fail fetches with a transient error.
    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.state.write().unwrap().fail_on_fetch = fail;
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn fetch(&self, names: &[String]) -> Result<HashMap<String, String>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_fetch {
            return Err(StepError::Transient("image store unavailable".to_string()));
        }

        Ok(names
            .iter()
            .filter_map(|name| {
                state
                    .images
                    .get(name)
                    .map(|encoded| (name.clone(), encoded.clone()))
            })
            .collect())
    }
}
