//! Protocol error definitions.

use odra::prelude::*;

/// Manager and collaborator errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ManagerError {
    // Entry point errors (1xx)
    InvalidAmount = 100,
    Paused = 101,
    Reentrant = 102,

    // Accounting errors (2xx)
    ArithmeticFault = 200,

    // Access control errors (4xx)
    Unauthorized = 400,

    // Collaborator errors (5xx)
    CollaboratorFailure = 500,
    InsufficientTokenBalance = 501,
    InsufficientBasketUnits = 502,
    BasketMismatch = 503,

    // Oracle errors (6xx)
    OraclePriceUnavailable = 600,

    // Configuration errors (9xx)
    InvalidConfig = 900,
    NotInitialized = 901,
}

impl ManagerError {
    pub const fn message(&self) -> &'static str {
        match self {
            ManagerError::InvalidAmount => "Invalid amount: must be non-zero",
            ManagerError::Paused => "Operation blocked: manager is paused",
            ManagerError::Reentrant => "Reentrant call rejected",

            ManagerError::ArithmeticFault => "Arithmetic fault: zero reference rate or overflow",

            ManagerError::Unauthorized => "Unauthorized caller",

            ManagerError::CollaboratorFailure => "Collaborator call failed",
            ManagerError::InsufficientTokenBalance => "Insufficient token balance",
            ManagerError::InsufficientBasketUnits => "Insufficient basket units",
            ManagerError::BasketMismatch => "Basket collateral and quantity lengths differ",

            ManagerError::OraclePriceUnavailable => "Oracle price unavailable",

            ManagerError::InvalidConfig => "Invalid configuration parameter",
            ManagerError::NotInitialized => "Contract storage not initialized",
        }
    }
}

impl core::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ManagerError> for OdraError {
    fn from(error: ManagerError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}
