//! Common types used across the manager and its collaborators.

use odra::casper_types::U256;
use crate::errors::ManagerError;
use crate::math::SCALE;

/// Manager configuration (owner-settable)
///
/// All fractions are scaled by `SCALE` (1e18 = 100%). Windows, delays and
/// periods share the unit of the block time.
#[odra::odra_type]
pub struct ManagerConfig {
    /// Timestamp of the first staking reward boundary
    pub rewards_start: u64,
    /// Time between staking reward boundaries
    pub rewards_period: u64,
    /// Lifetime of a rebalancing auction
    pub auction_period: u64,
    /// Staking pool withdrawal delay (read by the staking pool)
    pub staking_withdrawal_delay: u64,
    /// Short observation window used to suspect default
    pub short_window: u64,
    /// Long observation window used to confirm or clear default
    pub long_window: u64,
    /// Minimum time in default before switching vaults
    pub default_delay: u64,
    /// Time per vesting block for slow mintings
    pub block_duration: u64,
    /// Max auction size as a fraction of live BU-equivalent supply
    pub max_auction_size: U256,
    /// Per-block issuance as a fraction of live supply
    pub issuance_rate: U256,
    /// Price drop below peg that counts as default
    pub default_threshold: U256,
    /// Fraction of basket appreciation skimmed as revenue (`f`)
    pub revenue_factor: U256,
}

impl ManagerConfig {
    /// Check structural constraints
    pub fn validate(&self) -> Result<(), ManagerError> {
        let scale = U256::from(SCALE);
        if self.max_auction_size > scale
            || self.issuance_rate > scale
            || self.default_threshold > scale
            || self.revenue_factor > scale
        {
            return Err(ManagerError::InvalidConfig);
        }
        if self.short_window > self.long_window {
            return Err(ManagerError::InvalidConfig);
        }
        if self.rewards_period == 0 || self.auction_period == 0 || self.block_duration == 0 {
            return Err(ManagerError::InvalidConfig);
        }
        Ok(())
    }

    /// First reward boundary at or after `now`
    pub fn next_reward_at(&self, now: u64) -> u64 {
        if now <= self.rewards_start || self.rewards_period == 0 {
            return self.rewards_start;
        }
        let elapsed = now - self.rewards_start;
        let periods = elapsed.div_ceil(self.rewards_period);
        self.rewards_start
            .saturating_add(periods.saturating_mul(self.rewards_period))
    }
}

/// Observable default-detection state
#[odra::odra_type]
#[derive(Copy)]
pub enum DefaultStatus {
    /// No default signal recorded
    Sound,
    /// A short-window scan flagged the basket
    ShortDefaultSuspected,
    /// A long-window re-scan still flags the basket
    LongDefaultConfirmed,
}

/// Caller capability required by a guarded entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Configuration owner
    Owner,
    /// Pause controller
    Pauser,
}
