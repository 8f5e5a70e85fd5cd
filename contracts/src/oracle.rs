//! TWAP Oracle Contract
//!
//! Feeders post spot prices per asset; each observation carries the running
//! price·time integral so `consult` can average over any trailing window by
//! differencing two cumulative values.
//!
//! - zero window: latest posted price
//! - window longer than history: averaged from the first observation
//! - no observation: `OraclePriceUnavailable`

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::ManagerError;

/// Posted price point
#[odra::odra_type]
pub struct Observation {
    /// Block time of the post
    pub timestamp: u64,
    /// Spot price (scaled by 1e18)
    pub price: U256,
    /// Σ price·dt up to `timestamp`
    pub cumulative: U256,
}

impl Observation {
    /// Cumulative value at `at >= timestamp`, holding `price` constant
    pub fn cumulative_at(&self, at: u64) -> Result<U256, ManagerError> {
        let elapsed = U256::from(at.saturating_sub(self.timestamp));
        let accrued = self
            .price
            .checked_mul(elapsed)
            .ok_or(ManagerError::ArithmeticFault)?;
        self.cumulative
            .checked_add(accrued)
            .ok_or(ManagerError::ArithmeticFault)
    }

    /// Next observation of `price` posted at `now`
    pub fn next(&self, price: U256, now: u64) -> Result<Observation, ManagerError> {
        Ok(Observation {
            timestamp: now,
            price,
            cumulative: self.cumulative_at(now)?,
        })
    }
}

/// Average price over `[start, now]` given the anchor in force at `start`
pub fn time_weighted(
    anchor: &Observation,
    latest: &Observation,
    start: u64,
    now: u64,
) -> Result<U256, ManagerError> {
    if now <= start {
        return Ok(latest.price);
    }
    let total = latest.cumulative_at(now)?;
    let before = anchor.cumulative_at(start)?;
    let span = total
        .checked_sub(before)
        .ok_or(ManagerError::ArithmeticFault)?;
    Ok(span / U256::from(now - start))
}

/// TWAP Oracle Contract
#[odra::module]
pub struct TwapOracle {
    /// Observations per asset, oldest first
    observations: Mapping<(Address, u32), Observation>,
    /// Number of observations per asset
    observation_count: Mapping<Address, u32>,
    /// Authorized price feeders
    feeders: Mapping<Address, bool>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl TwapOracle {
    /// Initialize with the caller as admin
    pub fn init(&mut self, feeder: Address) {
        self.admin.set(self.env().caller());
        self.feeders.set(&feeder, true);
    }

    // ========== Feeder Functions ==========

    /// Record a spot price for `asset` at the current block time
    pub fn post_price(&mut self, asset: Address, price: U256) {
        let caller = self.env().caller();
        if !self.is_feeder(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
        if price.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }

        let now = self.env().get_block_time();
        let count = self.observation_count(asset);
        if count == 0 {
            self.observations.set(
                &(asset, 0),
                Observation {
                    timestamp: now,
                    price,
                    cumulative: U256::zero(),
                },
            );
            self.observation_count.set(&asset, 1);
            return;
        }

        let latest = self.observation_at(asset, count - 1);
        if latest.timestamp >= now {
            // Same block: the newer price replaces the older one
            self.observations.set(
                &(asset, count - 1),
                Observation { price, ..latest },
            );
            return;
        }

        let next = match latest.next(price, now) {
            Ok(next) => next,
            Err(error) => self.env().revert(error),
        };
        self.observations.set(&(asset, count), next);
        self.observation_count.set(&asset, count + 1);
    }

    // ========== Price Queries ==========

    /// Time-weighted average price of `asset` over the trailing `window`
    pub fn consult(&self, asset: Address, window: u64) -> U256 {
        let count = self.observation_count(asset);
        if count == 0 {
            self.env().revert(ManagerError::OraclePriceUnavailable);
        }

        let latest = self.observation_at(asset, count - 1);
        if window == 0 {
            return latest.price;
        }

        let now = self.env().get_block_time();
        let first = self.observation_at(asset, 0);
        let start = now.saturating_sub(window).max(first.timestamp);

        let mut index = count - 1;
        let anchor = loop {
            let observation = self.observation_at(asset, index);
            if observation.timestamp <= start || index == 0 {
                break observation;
            }
            index -= 1;
        };

        match time_weighted(&anchor, &latest, start, now) {
            Ok(price) => price,
            Err(error) => self.env().revert(error),
        }
    }

    /// Latest posted price of `asset`
    pub fn latest_price(&self, asset: Address) -> Option<U256> {
        match self.observation_count(asset) {
            0 => None,
            count => self.observations.get(&(asset, count - 1)).map(|o| o.price),
        }
    }

    pub fn observation_count(&self, asset: Address) -> u32 {
        self.observation_count.get(&asset).unwrap_or(0)
    }

    pub fn is_feeder(&self, account: Address) -> bool {
        self.feeders.get(&account).unwrap_or(false)
    }

    // ========== Admin Functions ==========

    pub fn add_feeder(&mut self, feeder: Address) {
        self.require_admin();
        self.feeders.set(&feeder, true);
    }

    pub fn remove_feeder(&mut self, feeder: Address) {
        self.require_admin();
        self.feeders.set(&feeder, false);
    }

    // ========== Internal Functions ==========

    fn observation_at(&self, asset: Address, index: u32) -> Observation {
        self.observations
            .get(&(asset, index))
            .unwrap_or_revert_with(self, ManagerError::NotInitialized)
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
    }
}
