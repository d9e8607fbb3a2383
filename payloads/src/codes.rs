//! Error codes produced by the client itself. Servers may return any other
//! code in an error body; those reach the caller verbatim.

/// The request was superseded or its scope was disposed.
pub const CANCELED: &str = "CANCELED";
/// The transport gave up waiting for a response.
pub const TIMEOUT: &str = "TIMEOUT";
/// The server could not be reached.
pub const NETWORK: &str = "NETWORK";
/// Credentials were missing, expired, or refused.
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const UNKNOWN: &str = "UNKNOWN";
