pub mod api;
pub mod engine;
pub mod error;
pub mod identity;
pub mod label;
pub mod model;
pub mod quantity;
pub mod store;

use std::sync::Arc;

use axum::Router;
use openerp_core::Module;
use openerp_sql::SQLStore;
use serde::Deserialize;

use engine::ReceivingEngine;
use store::ReceivingStore;

pub use error::ReceivingError;

/// Settings of the receiving module, read from the `[receiving]` section
/// of the server config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceivingConfig {
    /// Leading segment of every pack identifier.
    pub pack_prefix: String,
}

impl Default for ReceivingConfig {
    fn default() -> Self {
        Self {
            pack_prefix: identity::DEFAULT_PREFIX.to_string(),
        }
    }
}

/// The Receiving module: pack-level verification of inbound goods.
///
/// Splits receipt lines into labelled packs, verifies each pack by scan,
/// and refuses to approve a header until every one of its packs is verified.
pub struct ReceivingModule {
    engine: Arc<ReceivingEngine>,
}

impl ReceivingModule {
    /// Create the receiving module with default settings.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, openerp_core::ServiceError> {
        Self::with_config(db, &ReceivingConfig::default())
    }

    /// Create with explicit settings, initialising storage.
    pub fn with_config(
        db: Arc<dyn SQLStore>,
        config: &ReceivingConfig,
    ) -> Result<Self, openerp_core::ServiceError> {
        let store = Arc::new(ReceivingStore::new(db)?);
        let engine = Arc::new(ReceivingEngine::new(store, config)?);
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Arc<ReceivingEngine> {
        &self.engine
    }
}

impl Module for ReceivingModule {
    fn name(&self) -> &str {
        "receiving"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.engine))
    }
}
