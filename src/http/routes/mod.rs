pub mod attendance;
pub mod backup;
pub mod devices;
pub mod fingerprints;
pub mod users;
