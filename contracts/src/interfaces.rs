//! Collaborator interfaces consumed by the manager.
//!
//! The manager only talks to its collaborators through these traits; the
//! concrete modules in this crate are one implementation of each.

use odra::prelude::*;
use odra::casper_types::U256;

/// Collateral basket holding the backing assets
#[odra::external_contract]
pub trait Vault {
    /// Basket units held by `account`
    fn basket_units(&self, account: Address) -> U256;
    /// Per-collateral amounts needed to issue `amount` BUs (rounded up)
    fn token_amounts(&self, amount: U256) -> Vec<U256>;
    /// Per-collateral amounts paid out for `amount` BUs (rounded down)
    fn redemption_amounts(&self, amount: U256) -> Vec<U256>;
    /// BUs issuable against the collateral `account` holds
    fn max_issuable(&self, account: Address) -> U256;
    /// Pull collateral from the caller and credit it `amount` BUs
    fn issue(&mut self, amount: U256);
    /// Burn `amount` of the caller's BUs and pay collateral to `recipient`
    fn redeem(&mut self, recipient: Address, amount: U256);
    /// Reference-currency value of one BU (scaled by 1e18)
    fn basket_rate(&self) -> U256;
    /// Number of collaterals in the basket
    fn basket_size(&self) -> u32;
    /// Collateral at `index`
    fn collateral_at(&self, index: u32) -> Address;
    /// Number of backup vaults
    fn num_backups(&self) -> u32;
    /// Backup vault at `index`
    fn backup_at(&self, index: u32) -> Address;
}

/// Windowed price source
#[odra::external_contract]
pub trait Oracle {
    /// Reference-currency price of `asset` over the trailing `window` (scaled by 1e18)
    fn consult(&self, asset: Address, window: u64) -> U256;
}

/// Elastic token ledger
#[odra::external_contract]
pub trait TokenLedger {
    fn mint(&mut self, to: Address, amount: U256);
    fn burn_from(&mut self, from: Address, amount: U256);
    fn burn(&mut self, amount: U256);
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn balance_of(&self, account: Address) -> U256;
    fn total_supply(&self) -> U256;
}

/// Collateral token
#[odra::external_contract]
pub trait Collateral {
    /// Value of one whole token in its underlying (scaled by 1e18)
    fn redemption_rate(&self) -> U256;
    /// Asset priced against the peg
    fn underlying(&self) -> Address;
    /// Token actually held by the vault
    fn wrapped(&self) -> Address;
    /// Whether the token is its own underlying
    fn is_direct(&self) -> bool;
    fn decimals(&self) -> u8;
    fn balance_of(&self, account: Address) -> U256;
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
    fn approve(&mut self, spender: Address, amount: U256) -> bool;
}

/// Revenue emission source
#[odra::external_contract]
pub trait Faucet {
    /// Release vested revenue to the beneficiary, returning the amount
    fn drip(&mut self) -> U256;
}

/// Pluggable rebalancing execution
#[odra::external_contract]
pub trait AuctionExecutor {
    /// Start trading toward `deficit` BUs of `vault` before `end_at`
    fn launch(&mut self, vault: Address, deficit: U256, end_at: u64);
}
