//! Error types for the address pool.

use thiserror::Error;

/// Errors returned by pool operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Invalid bound address: {0}")]
    InvalidBoundAddress(String),

    #[error("Bound address {0} is outside of {1}")]
    BoundOutOfRange(String, String),

    #[error("Start address {0} is greater than end address {1}")]
    BoundOrderViolation(String, String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Subnet {0} overlaps with existing subnet {1}")]
    SubnetOverlap(String, String),

    #[error("Subnet {cidr} expands to {hosts} addresses, limit is {limit}")]
    SubnetTooLarge { cidr: String, hosts: u64, limit: u64 },

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Address is already free: {0}")]
    AlreadyFree(String),

    #[error("Address not available: {0}")]
    AddressUnavailable(String),

    #[error("MAC {mac} already holds a reservation for {ip}")]
    AlreadyReserved { mac: String, ip: String },

    #[error("No free address available")]
    PoolExhausted,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must fix its input.
    Validation,
    /// State conflict, a different input may succeed.
    Conflict,
    NotFound,
    /// No free capacity left.
    Exhausted,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCidr(_)
            | Error::InvalidBoundAddress(_)
            | Error::BoundOutOfRange(..)
            | Error::BoundOrderViolation(..)
            | Error::InvalidMac(_)
            | Error::InvalidAddress(_)
            | Error::SubnetTooLarge { .. } => ErrorKind::Validation,
            Error::SubnetOverlap(..)
            | Error::AlreadyFree(_)
            | Error::AddressUnavailable(_)
            | Error::AlreadyReserved { .. } => ErrorKind::Conflict,
            Error::AddressNotFound(_) => ErrorKind::NotFound,
            Error::PoolExhausted => ErrorKind::Exhausted,
            Error::Database(_) | Error::Migration(_) | Error::Corrupt(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::InvalidCidr("x".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::AlreadyFree("10.0.0.1".to_string()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::AddressNotFound("10.0.0.1".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::PoolExhausted.kind(), ErrorKind::Exhausted);
        assert_eq!(
            Error::Corrupt("bad status".to_string()).kind(),
            ErrorKind::Internal
        );
    }
}
