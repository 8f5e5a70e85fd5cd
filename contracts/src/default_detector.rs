//! Two-horizon collateral default detector.
//!
//! ```text
//!   Sound ──short scan flags──▶ ShortDefaultSuspected
//!     ▲                                 │ long window elapsed
//!     │ long scan clean                 ▼
//!     └────────────────────────── long re-scan ──flags──▶ LongDefaultConfirmed
//!                                                          │ default delay elapsed
//!                                                          ▼
//!                                                     vault switch
//! ```
//!
//! While in default, no scan happens until the long window has elapsed since
//! `last_default`; this throttles oracle and collateral calls.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::ManagerError;
use crate::math::{fraction_of, scale};
use crate::types::{DefaultStatus, ManagerConfig};

/// Persistent detector state
#[odra::odra_type]
#[derive(Default)]
pub struct DefaultState {
    /// Whether the current basket is flagged
    pub in_default: bool,
    /// Time the current default episode started
    pub last_default: u64,
    /// Whether a long-window re-scan confirmed the episode
    pub confirmed: bool,
}

/// Scan the detector wants at `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStep {
    /// Sound basket: scan with the short window
    ScanShort(u64),
    /// In default, long window not elapsed yet
    Throttled,
    /// In default, long window elapsed: re-scan with the long window
    ScanLong(u64),
}

/// Result of feeding a scan into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change
    Unchanged,
    /// Sound → ShortDefaultSuspected
    Suspected,
    /// ShortDefaultSuspected → Sound
    Cleared,
    /// Default persists; `switch_due` once the default delay elapsed
    Confirmed { switch_due: bool },
}

impl DefaultState {
    /// Observable status
    pub fn status(&self) -> DefaultStatus {
        match (self.in_default, self.confirmed) {
            (false, _) => DefaultStatus::Sound,
            (true, false) => DefaultStatus::ShortDefaultSuspected,
            (true, true) => DefaultStatus::LongDefaultConfirmed,
        }
    }

    /// Which scan, if any, to run at `now`
    pub fn next_step(&self, now: u64, config: &ManagerConfig) -> DetectionStep {
        if !self.in_default {
            return DetectionStep::ScanShort(config.short_window);
        }
        if now >= self.last_default.saturating_add(config.long_window) {
            DetectionStep::ScanLong(config.long_window)
        } else {
            DetectionStep::Throttled
        }
    }

    /// Apply a short-window scan result
    pub fn on_short_scan(&mut self, flagged: bool, now: u64) -> Transition {
        if !flagged {
            return Transition::Unchanged;
        }
        self.in_default = true;
        self.last_default = now;
        self.confirmed = false;
        Transition::Suspected
    }

    /// Apply a long-window re-scan result
    pub fn on_long_scan(&mut self, flagged: bool, now: u64, default_delay: u64) -> Transition {
        if !flagged {
            self.in_default = false;
            self.confirmed = false;
            return Transition::Cleared;
        }
        self.confirmed = true;
        let switch_due = now >= self.last_default.saturating_add(default_delay);
        Transition::Confirmed { switch_due }
    }

    /// Basket replaced: the episode is over
    pub fn on_switch(&mut self) {
        self.in_default = false;
        self.confirmed = false;
    }
}

/// Everything observed about one collateral during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralObservation {
    /// Collateral token
    pub collateral: Address,
    /// Asset whose price is checked against the peg
    pub underlying: Address,
    /// Token the basket actually holds for this collateral
    pub wrapped: Address,
    /// Whether the collateral is the underlying itself
    pub is_direct: bool,
    /// Redemption rate now
    pub redemption_rate: U256,
    /// Highest redemption rate seen by earlier scans, if any
    pub last_rate: Option<U256>,
    /// Underlying price over the scan window
    pub price: U256,
}

impl CollateralObservation {
    /// Rate to keep as the regression baseline after this scan.
    ///
    /// The baseline only ratchets up, so a rate that drops and stays down
    /// keeps flagging until it recovers.
    pub fn baseline(&self) -> U256 {
        match self.last_rate {
            Some(last) if last > self.redemption_rate => last,
            _ => self.redemption_rate,
        }
    }
}

/// Insertion-ordered set of defaulted token addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultedSet(Vec<Address>);

impl DefaultedSet {
    /// Insert unless already present
    pub fn insert(&mut self, token: Address) {
        if !self.0.contains(&token) {
            self.0.push(token);
        }
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.0.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<Address> {
        self.0
    }
}

/// Lowest price still considered on peg (peg = 1.0)
pub fn price_floor(default_threshold: U256) -> Result<U256, ManagerError> {
    fraction_of(scale(), scale().saturating_sub(default_threshold))
}

/// Flag a collateral into `defaulted`.
///
/// A regression of the redemption rate flags the collateral. A price below
/// the floor flags the underlying, plus the wrapped token when the
/// collateral is a derivative of that underlying.
pub fn evaluate(observation: &CollateralObservation, floor: U256, defaulted: &mut DefaultedSet) {
    if let Some(last) = observation.last_rate {
        if observation.redemption_rate < last {
            defaulted.insert(observation.collateral);
        }
    }
    if observation.price < floor {
        defaulted.insert(observation.underlying);
        if !observation.is_direct {
            defaulted.insert(observation.wrapped);
        }
    }
}
