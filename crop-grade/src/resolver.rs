//! Startup model resolution.
//!
//! The artifact is offered to an ordered chain of loaders. The first one that
//! produces a classifier wins; if none does, or there is no artifact at all,
//! the service runs in mock mode. Resolution happens once and the resulting
//! [`ModelState`] never changes afterwards.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::classifier::Classifier;
use crate::crop_net::CropNet;
use crate::error::Result;
use crate::timer::Timer;

/// One way of turning a model artifact into a classifier
pub trait ModelLoader: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>>;
}

/// Rebuilds the `crop-net` layer graph in code and reads only its weights
pub struct WeightsLoader;

impl ModelLoader for WeightsLoader {
    fn name(&self) -> &'static str {
        "weights"
    }

    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>> {
        Ok(Arc::new(CropNet::load(path)?))
    }
}

#[derive(Clone)]
pub enum ModelState {
    Loaded {
        /// Name of the loader that succeeded
        loader: &'static str,
        classifier: Arc<dyn Classifier>,
    },
    Mock,
}

impl ModelState {
    pub fn is_mock(&self) -> bool {
        matches!(self, ModelState::Mock)
    }

    pub fn loader(&self) -> Option<&'static str> {
        match self {
            ModelState::Loaded { loader, .. } => Some(*loader),
            ModelState::Mock => None,
        }
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Loaded { loader, .. } => f.debug_struct("Loaded").field("loader", loader).finish(),
            ModelState::Mock => write!(f, "Mock"),
        }
    }
}

pub struct ModelResolver {
    loaders: Vec<Box<dyn ModelLoader>>,
}

impl ModelResolver {
    /// A resolver with no loaders; every artifact resolves to mock mode
    pub fn empty() -> Self {
        ModelResolver { loaders: Vec::new() }
    }

    /// Full deserialization first (when built with TensorFlow), then the
    /// rebuilt architecture with weights only.
    pub fn standard() -> Self {
        let resolver = ModelResolver::empty();

        #[cfg(feature = "tensorflow")]
        let resolver = resolver.with_loader(crate::saved_model::SavedModelLoader::default());

        resolver.with_loader(WeightsLoader)
    }

    pub fn with_loader<L: ModelLoader + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    pub fn resolve(&self, path: &Path) -> ModelState {
        if !path.exists() {
            warn!(
                "Model artifact {} not found, using mock predictions",
                path.display()
            );
            return ModelState::Mock;
        }

        for loader in &self.loaders {
            let mut t = Timer::started(&format!("Loading model with '{}'", loader.name()));

            match loader.load(path) {
                Ok(classifier) => {
                    t.stop();
                    info!("Model loaded from {} by '{}'", path.display(), loader.name());
                    return ModelState::Loaded {
                        loader: loader.name(),
                        classifier,
                    };
                }
                Err(err) => {
                    t.stop();
                    warn!("Loader '{}' failed on {}: {}", loader.name(), path.display(), err);
                }
            }
        }

        warn!("No loader could use {}, using mock predictions", path.display());
        ModelState::Mock
    }
}

impl Default for ModelResolver {
    fn default() -> Self {
        ModelResolver::standard()
    }
}
