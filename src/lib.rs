//! # fingerprint-ctl
//!
//! Middleware bridging a fleet of ZKTeco-class biometric terminals to
//! HRIS, object storage, and human operators.
//!
//! ## Main components
//!
//! - [`pool::DevicePool`] / [`pool::ClientSlot`] — the device connection
//!   manager: a thread-safe, retry-wrapped registry of per-device
//!   protocol sessions with write-mode guard discipline.
//! - [`cache::AttendanceCache`] — per-device in-memory attendance
//!   snapshots refreshed in the background.
//! - [`scheduler::Scheduler`] — staggers cache refresh, daily backup, and
//!   cleanup jobs across the fleet without overlap.
//! - [`domain`] — stateless facade functions tying the above to the HTTP
//!   and CLI surfaces.
//! - [`protocol::DeviceProtocol`] — the narrow trait every device session
//!   implements; [`protocol::MockProtocolClient`] is the scripted test
//!   double used throughout this crate's test suite.

pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod hris;
pub mod http;
pub mod notify;
pub mod pool;
pub mod protocol;
pub mod retry;
pub mod scheduler;
pub mod storage;
