//! Shared application state for every HTTP handler, grounded on
//! `at-bridge`'s `ApiState` (a single `Arc`-shared struct threaded through
//! request contexts via axum's `State` extractor, per SPEC_FULL §10's
//! "plumb a handle through request contexts rather than module-level
//! state").

use std::sync::Arc;
use std::time::Instant;

use sbx_store::Store;
use sbx_worker::{AdmissionController, TimeoutSupervisor};

use crate::rate_limit::RateLimiter;

pub struct ApiState {
    pub store: Arc<Store>,
    pub admission: Arc<AdmissionController>,
    pub timeout_supervisor: Arc<TimeoutSupervisor>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(
        store: Arc<Store>,
        admission: Arc<AdmissionController>,
        timeout_supervisor: Arc<TimeoutSupervisor>,
    ) -> Self {
        Self {
            store,
            admission,
            timeout_supervisor,
            rate_limiter: RateLimiter::new(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
