use std::sync::Arc;

use gapakerem_catalog::PricingEngine;
use gapakerem_core::{ObjectStore, ReferenceStore};
use gapakerem_store::app_config::BookingRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReferenceStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub pricing: Arc<PricingEngine>,
    pub max_proof_bytes: usize,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReferenceStore>,
        objects: Arc<dyn ObjectStore>,
        rules: &BookingRules,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            objects,
            pricing: Arc::new(PricingEngine::new(rules.pricing())),
            max_proof_bytes: rules.max_proof_bytes,
            auth: AuthConfig { secret: jwt_secret.into() },
        }
    }
}
