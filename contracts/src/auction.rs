//! Auction-trigger queue.
//!
//! Decides *whether* a rebalancing action is due and how much residual
//! backing to migrate from the most recent past vault. Choosing what to trade
//! and at what price belongs to an external `AuctionExecutor`.
//!
//! At most one auction record is open at any time.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::ManagerError;
use crate::math::fraction_of;

/// Auction lifecycle
#[odra::odra_type]
#[derive(Copy)]
pub enum AuctionStatus {
    /// Running until `end_at`
    Open,
    /// Closed by a later poke
    Closed,
}

/// Auction record
#[odra::odra_type]
pub struct Auction {
    /// Position in the auction log
    pub index: u64,
    /// Vault whose BU shortfall triggered the auction
    pub vault: Address,
    /// BU shortfall at the time the auction opened
    pub deficit: U256,
    /// Time after which the auction may be closed
    pub end_at: u64,
    /// Current status
    pub status: AuctionStatus,
}

impl Auction {
    /// Whether the record is open
    pub fn is_open(&self) -> bool {
        matches!(self.status, AuctionStatus::Open)
    }
}

/// What a poke should do with the latest auction record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStep {
    /// Latest auction still running: do nothing else this call
    Wait,
    /// Latest auction expired: close it, then continue
    CloseAndContinue,
    /// No open auction: continue
    Continue,
}

/// Examine the latest auction record at `now`
pub fn next_step(latest: Option<&Auction>, now: u64) -> AuctionStep {
    match latest {
        Some(auction) if auction.is_open() => {
            if now >= auction.end_at {
                AuctionStep::CloseAndContinue
            } else {
                AuctionStep::Wait
            }
        }
        _ => AuctionStep::Continue,
    }
}

/// BUs to pull from the previous vault in one poke.
///
/// Bounded by `max_auction_size` of the live BU-equivalent supply, by the
/// shortfall of the current vault, and by what is left in the previous one.
pub fn migration_chunk(
    target_bus: U256,
    held_bus: U256,
    residual_bus: U256,
    max_auction_size: U256,
) -> Result<U256, ManagerError> {
    let deficit = target_bus.saturating_sub(held_bus);
    let cap = fraction_of(target_bus, max_auction_size)?;
    Ok(cap.min(deficit).min(residual_bus))
}
