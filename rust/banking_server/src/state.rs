use anyhow::Result;
use common::ServiceConfig;
use std::sync::atomic::AtomicU64;
use sysinfo::System;

use crate::models::ModelSet;

// Application state
pub struct AppState {
    pub models: ModelSet,
    pub total_requests: AtomicU64,
    pub system: tokio::sync::Mutex<System>,
}

impl AppState {
    pub fn new(models: ModelSet) -> Self {
        Self {
            models,
            total_requests: AtomicU64::new(0),
            system: tokio::sync::Mutex::new(System::new_all()),
        }
    }

    /// Load every artifact named by the config. Fails if any of them cannot
    /// be loaded; there is no partially-loaded state.
    pub fn load(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(ModelSet::load(&config.models)?))
    }
}
