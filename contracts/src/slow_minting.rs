//! Slow-minting queue.
//!
//! Newly issued tokens are minted into the manager's escrow and released to
//! the issuer once the vesting time has passed.
//!
//! ## Design
//!
//! - Records are append-only and addressed by a monotonically increasing index
//! - Records are never deleted, only moved to a terminal status
//! - Availability times never decrease with the index, so records complete in
//!   creation order
//! - A record issued against a basket that is no longer current is reverted:
//!   escrow is burned and the issuer's collateral is returned
//!
//! ## Flow
//!
//! 1. `issue(amount)` pulls collateral, issues BUs and calls [`MintingCursor::schedule`]
//! 2. Every accounting preamble walks pending records from `first_pending`
//! 3. [`resolve`] decides whether a record completes, reverts or keeps waiting

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::ManagerError;
use crate::math::{issuance_rate, vesting_blocks};

/// Slow-minting lifecycle
#[odra::odra_type]
#[derive(Copy)]
pub enum MintingStatus {
    /// Escrowed, waiting for its availability time
    Pending,
    /// Escrow released to the issuer
    Completed,
    /// Escrow burned, collateral returned
    Reverted,
}

/// Slow-minting record
#[odra::odra_type]
pub struct SlowMinting {
    /// Position in the queue
    pub index: u64,
    /// Account that requested the issuance
    pub issuer: Address,
    /// Token amount held in escrow
    pub amount: U256,
    /// Basket units issued for this request
    pub bus: U256,
    /// Vault the BUs were issued into
    pub vault: Address,
    /// Time at which the escrow may be released
    pub available_at: u64,
    /// Current status
    pub status: MintingStatus,
}

impl SlowMinting {
    /// Whether the record reached a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, MintingStatus::Pending)
    }
}

/// Queue bookkeeping
#[odra::odra_type]
#[derive(Default)]
pub struct MintingCursor {
    /// Index the next record will receive
    pub next_index: u64,
    /// Lowest index that may still be pending
    pub first_pending: u64,
    /// Availability time of the most recent record
    pub last_available_at: u64,
    /// Tokens currently held in escrow for pending records
    pub escrowed: U256,
}

impl MintingCursor {
    /// Append a pending record for `amount` tokens.
    ///
    /// Vesting takes `ceil(amount / rate)` blocks of `block_duration`, where
    /// the per-block rate is derived from the live supply and never drops
    /// below the issuance floor. The record becomes available no earlier than
    /// the previous one.
    pub fn schedule(
        &mut self,
        issuer: Address,
        vault: Address,
        amount: U256,
        bus: U256,
        live_supply: U256,
        issuance_fraction: U256,
        block_duration: u64,
        now: u64,
    ) -> Result<SlowMinting, ManagerError> {
        if amount.is_zero() {
            return Err(ManagerError::InvalidAmount);
        }
        let rate = issuance_rate(live_supply, issuance_fraction)?;
        let blocks = vesting_blocks(amount, rate)?;
        let vesting = blocks
            .checked_mul(block_duration)
            .ok_or(ManagerError::ArithmeticFault)?;
        let available_at = now
            .max(self.last_available_at)
            .checked_add(vesting)
            .ok_or(ManagerError::ArithmeticFault)?;

        let record = SlowMinting {
            index: self.next_index,
            issuer,
            amount,
            bus,
            vault,
            available_at,
            status: MintingStatus::Pending,
        };

        self.next_index += 1;
        self.last_available_at = available_at;
        self.escrowed = self
            .escrowed
            .checked_add(amount)
            .ok_or(ManagerError::ArithmeticFault)?;
        Ok(record)
    }

    /// Release escrow accounting for a record leaving the pending state
    pub fn release(&mut self, record: &SlowMinting) {
        self.escrowed = self.escrowed.saturating_sub(record.amount);
    }

    /// Number of records ever created
    pub fn len(&self) -> u64 {
        self.next_index
    }

    /// Whether no record was ever created
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }
}

/// Outcome of examining a pending record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintingAction {
    /// Already terminal, nothing to do
    Skip,
    /// Originating basket replaced: burn escrow, refund collateral
    Revert,
    /// Vesting elapsed: release escrow to the issuer
    Complete,
    /// Still vesting; later records are vesting too
    Wait,
}

/// Decide what happens to `record` at `now` given the current vault
pub fn resolve(record: &SlowMinting, current_vault: Address, now: u64) -> MintingAction {
    if record.is_terminal() {
        return MintingAction::Skip;
    }
    if record.vault != current_vault {
        return MintingAction::Revert;
    }
    if now >= record.available_at {
        MintingAction::Complete
    } else {
        MintingAction::Wait
    }
}
