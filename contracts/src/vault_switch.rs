//! Backup vault selection.
//!
//! Among the backups that pass a short-window default scan, the one with the
//! highest basket rate wins. Ties keep the lowest index.

use odra::prelude::*;
use odra::casper_types::U256;

/// A backup vault that passed the default scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupCandidate {
    /// Position in the vault's backup list
    pub index: u32,
    /// Backup vault
    pub vault: Address,
    /// Basket rate in the reference currency
    pub basket_rate: U256,
}

/// Pick the replacement vault, if any qualifies
pub fn select_backup(candidates: &[BackupCandidate]) -> Option<BackupCandidate> {
    let mut best: Option<BackupCandidate> = None;
    for candidate in candidates {
        match best {
            Some(current)
                if candidate.basket_rate < current.basket_rate
                    || (candidate.basket_rate == current.basket_rate
                        && candidate.index >= current.index) => {}
            _ => best = Some(*candidate),
        }
    }
    best
}
