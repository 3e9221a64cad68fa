/// Deterministic in-process generator for dry runs and tests.
pub mod synthetic;

/// HTTP adapter to an external generation server.
pub mod remote;
