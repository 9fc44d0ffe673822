//! Domain facade: stateless functions tying the connection pool and
//! attendance cache to the HTTP and CLI surfaces. Each submodule mirrors
//! one concern from the source implementation's `core/` package.

pub mod attendance;
pub mod backup;
pub mod device_manager;
pub mod fingerprint;
pub mod user_sync;
