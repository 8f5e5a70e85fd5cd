//! Revenue Faucet Contract
//!
//! Holds token revenue and streams it to a beneficiary (the manager). Each
//! `drip` releases the share of the current balance proportional to the time
//! elapsed since the previous drip, so a balance drains over one `period`
//! unless it is topped up. Once the manager holds the tokens, its next melt
//! burns them.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::ManagerError;
use crate::interfaces::TokenLedgerContractRef;
use crate::math::mul_div;

/// Amount of `balance` vested after `elapsed` out of `period`
pub fn vested(balance: U256, elapsed: u64, period: u64) -> Result<U256, ManagerError> {
    if elapsed >= period {
        return Ok(balance);
    }
    mul_div(balance, U256::from(elapsed), U256::from(period))
}

/// Revenue Faucet Contract
#[odra::module]
pub struct RevenueFaucet {
    /// Token being streamed
    token: Var<Address>,
    /// Recipient of every drip
    beneficiary: Var<Address>,
    /// Time for a full balance to drain
    period: Var<u64>,
    /// Block time of the last drip
    last_drip: Var<u64>,
    /// Total released (all time)
    total_dripped: Var<U256>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl RevenueFaucet {
    /// Initialize the faucet
    pub fn init(&mut self, token: Address, beneficiary: Address, period: u64) {
        if period == 0 {
            self.env().revert(ManagerError::InvalidConfig);
        }
        self.token.set(token);
        self.beneficiary.set(beneficiary);
        self.period.set(period);
        self.last_drip.set(self.env().get_block_time());
        self.total_dripped.set(U256::zero());
        self.admin.set(self.env().caller());
    }

    /// Release vested revenue to the beneficiary
    pub fn drip(&mut self) -> U256 {
        let now = self.env().get_block_time();
        let last = self.last_drip.get().unwrap_or(now);
        if now <= last {
            return U256::zero();
        }

        let this = self.env().self_address();
        let mut token = self.token_ref();
        let balance = token.balance_of(this);
        let amount = match vested(balance, now - last, self.period()) {
            Ok(amount) => amount,
            Err(error) => self.env().revert(error),
        };
        self.last_drip.set(now);
        if amount.is_zero() {
            return amount;
        }

        if !token.transfer(self.get_beneficiary(), amount) {
            self.env().revert(ManagerError::CollaboratorFailure);
        }
        self.total_dripped.set(self.get_total_dripped() + amount);
        amount
    }

    // ========== View Functions ==========

    pub fn period(&self) -> u64 {
        self.period.get().unwrap_or(1)
    }

    pub fn get_beneficiary(&self) -> Address {
        self.beneficiary.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn get_total_dripped(&self) -> U256 {
        self.total_dripped.get().unwrap_or(U256::zero())
    }

    pub fn last_drip(&self) -> u64 {
        self.last_drip.get().unwrap_or(0)
    }

    // ========== Admin Functions ==========

    /// Change the drain period (admin only)
    pub fn set_period(&mut self, period: u64) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
        if period == 0 {
            self.env().revert(ManagerError::InvalidConfig);
        }
        self.period.set(period);
    }

    // ========== Internal Functions ==========

    fn token_ref(&self) -> TokenLedgerContractRef {
        let token = self.token.get_or_revert_with(ManagerError::NotInitialized);
        TokenLedgerContractRef::new(self.env(), token)
    }
}
