#![doc(test(attr(deny(warnings))))]

//! Family Budget is the core of a household budgeting application: shared
//! expense and budget records per family, progress aggregation with status
//! thresholds, alerts, and the membership workflow (join requests and
//! invitations) on top of a managed backend reached through [`storage::Gateway`].

pub mod config;
pub mod core;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod presentation;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Family Budget tracing initialized.");
    });
}
