use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{IncidentStore, InMemoryStore, SledStore, UserStore};
use std::sync::Arc;

/// Incident and user stores sharing one backend
#[derive(Clone)]
pub struct Stores {
    pub incidents: Arc<dyn IncidentStore>,
    pub users: Arc<dyn UserStore>,
}

/// Create stores based on configuration
pub fn create_stores(config: &StateConfig) -> Result<Stores> {
    match config.backend {
        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = Arc::new(SledStore::new(path)?);
            Ok(Stores {
                incidents: store.clone(),
                users: store,
            })
        }

        StateBackend::Memory => Ok(create_in_memory_stores()),
    }
}

/// Create in-memory stores (for testing and development)
pub fn create_in_memory_stores() -> Stores {
    tracing::info!("Initializing in-memory storage backend");
    let store = Arc::new(InMemoryStore::new());
    Stores {
        incidents: store.clone(),
        users: store,
    }
}
