//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod backend;
pub mod fixtures;
pub mod recorder;

#[allow(unused_imports)]
pub use backend::{FakeBackend, FetchPlan};
#[allow(unused_imports)]
pub use fixtures::{job_context, media_request, relay_settings, TestEnvironment, CHAT, STATUS};
#[allow(unused_imports)]
pub use recorder::{GatewayCall, RecordingGateway};
