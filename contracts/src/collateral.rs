//! Collateral Token Contract
//!
//! CEP-18 compatible basket asset. A token is either *direct* (priced itself)
//! or a derivative of an `underlying` asset, in which case its redemption
//! rate expresses how much underlying one whole token is worth. The operator
//! moves the rate as the derivative accrues (or loses) value.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::cep18;
use crate::errors::ManagerError;
use crate::math::scale;

/// Collateral Token Contract
#[odra::module]
pub struct CollateralToken {
    // ===== CEP-18 Token State =====
    name: Var<String>,
    symbol: Var<String>,
    decimals: Var<u8>,
    total_supply: Var<U256>,
    balances: Mapping<Address, U256>,
    allowances: Mapping<(Address, Address), U256>,

    // ===== Derivative State =====
    /// Underlying asset; `None` for direct tokens
    underlying: Var<Option<Address>>,
    /// Underlying per whole token (scaled by 1e18)
    redemption_rate: Var<U256>,
    /// Admin, also the rate operator
    admin: Var<Address>,
}

#[odra::module]
impl CollateralToken {
    /// Initialize the token
    pub fn init(&mut self, name: String, symbol: String, decimals: u8, underlying: Option<Address>) {
        cep18::init(&self.env(), &name, &symbol, decimals);
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.total_supply.set(U256::zero());
        self.underlying.set(underlying);
        self.redemption_rate.set(scale());
        self.admin.set(self.env().caller());
    }

    // ===== CEP-18 Standard Functions =====

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(18)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or(U256::zero())
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.approve_internal(owner, spender, amount);
        true
    }

    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();
        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            self.env().revert(ManagerError::InsufficientTokenBalance);
        }

        self.transfer_internal(owner, recipient, amount);
        self.approve_internal(owner, spender, current_allowance - amount);
        true
    }

    // ===== Derivative Views =====

    /// Underlying per whole token (scaled by 1e18)
    pub fn redemption_rate(&self) -> U256 {
        self.redemption_rate.get().unwrap_or(scale())
    }

    /// Asset priced against the peg (the token itself when direct)
    pub fn underlying(&self) -> Address {
        match self.underlying.get().flatten() {
            Some(underlying) => underlying,
            None => self.env().self_address(),
        }
    }

    pub fn wrapped(&self) -> Address {
        self.env().self_address()
    }

    pub fn is_direct(&self) -> bool {
        self.underlying.get().flatten().is_none()
    }

    // ===== Admin Functions =====

    /// Provision balances (admin only)
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_admin();

        let new_balance = self.balance_of(to) + amount;
        self.balances.set(&to, new_balance);
        cep18::set_balance(&self.env(), to, new_balance);

        let new_supply = self.total_supply() + amount;
        self.total_supply.set(new_supply);
        cep18::set_total_supply(&self.env(), new_supply);
    }

    /// Move the redemption rate (admin only)
    pub fn set_redemption_rate(&mut self, rate: U256) {
        self.require_admin();
        if rate.is_zero() {
            self.env().revert(ManagerError::InvalidConfig);
        }
        self.redemption_rate.set(rate);
    }

    // ===== Internal Functions =====

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(ManagerError::InsufficientTokenBalance);
        }

        let new_from_balance = from_balance - amount;
        self.balances.set(&from, new_from_balance);
        cep18::set_balance(&self.env(), from, new_from_balance);

        let new_to_balance = self.balance_of(to) + amount;
        self.balances.set(&to, new_to_balance);
        cep18::set_balance(&self.env(), to, new_to_balance);
    }

    fn approve_internal(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        cep18::set_allowance(&self.env(), owner, spender, amount);
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
    }
}
