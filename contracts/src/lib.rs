//! RToken Manager Contracts
//!
//! Accounting and recovery engine for a basket-backed elastic token.
//!
//! ## Architecture
//!
//! - **Manager**: entry points, accounting preamble, vault switching
//! - **DilutionAccountant** (`dilution`): BU ⇄ token exchange rate
//! - **SlowMintingQueue** (`slow_minting`): rate-limited issuance with rollback
//! - **AuctionQueue** (`auction`): rebalancing triggers and migration chunks
//! - **DefaultDetector** (`default_detector`): two-horizon default state machine
//! - **VaultSwitcher** (`vault_switch`): backup vault selection
//!
//! ## Collaborators
//!
//! The manager reaches its collaborators only through the traits in
//! [`interfaces`]. Reference implementations ship alongside:
//!
//! - **RToken**: CEP-18 elastic token, manager-controlled mint/burn
//! - **CollateralToken**: CEP-18 collateral with a redemption rate
//! - **BasketVault**: basket of collaterals issuing basket units
//! - **TwapOracle**: time-weighted prices from posted observations
//! - **RevenueFaucet**: linear revenue stream into the manager
//!
//! ## Pause
//!
//! While paused, `issue`, `redeem`, `poke` and `detect_default` revert;
//! owner configuration and views stay available.

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod interfaces;
pub mod math;

// Accounting ledgers
pub mod dilution;
pub mod slow_minting;
pub mod auction;
pub mod default_detector;
pub mod vault_switch;

// Contract modules
pub mod manager;
pub mod cep18;
pub mod rtoken;
pub mod collateral;
pub mod vault;
pub mod oracle;
pub mod faucet;
