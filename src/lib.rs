/// Authentication core: password verification, access/refresh token
/// issuance and per-device refresh sessions with one-time rotation.

pub mod auth;
pub mod configuration;
pub mod context;
pub mod error;
pub mod principal;
pub mod service;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod validators;

pub use context::RequestContext;
pub use service::AuthService;
