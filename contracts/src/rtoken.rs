//! RToken Contract
//!
//! CEP-18 compatible elastic token. The manager is the only minter and burner:
//! it mints into its own escrow on issuance and burns on redemption, melting
//! and slow-minting rollback.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::cep18;
use crate::errors::ManagerError;

const DECIMALS: u8 = 18;

/// RToken Contract
#[odra::module]
pub struct RToken {
    /// Token name
    name: Var<String>,
    /// Token symbol
    symbol: Var<String>,
    /// Total supply
    total_supply: Var<U256>,
    /// Balance mapping
    balances: Mapping<Address, U256>,
    /// Allowance mapping (owner, spender) -> amount
    allowances: Mapping<(Address, Address), U256>,
    /// Deployer, allowed to wire the manager
    admin: Var<Address>,
    /// Manager contract (sole minter/burner)
    manager: Var<Option<Address>>,
}

#[odra::module]
impl RToken {
    /// Initialize the token
    pub fn init(&mut self, name: String, symbol: String) {
        cep18::init(&self.env(), &name, &symbol, DECIMALS);
        self.name.set(name);
        self.symbol.set(symbol);
        self.total_supply.set(U256::zero());
        self.admin.set(self.env().caller());
        self.manager.set(None);
    }

    // ========== CEP-18 Standard Functions ==========

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
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

    /// Transfer tokens to recipient
    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    /// Approve spender to spend tokens
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.approve_internal(owner, spender, amount);
        true
    }

    /// Transfer tokens from owner to recipient (requires allowance)
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

    // ========== Manager Functions ==========

    /// Mint new tokens (manager only)
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_manager();

        let new_balance = self.balance_of(to) + amount;
        self.balances.set(&to, new_balance);
        cep18::set_balance(&self.env(), to, new_balance);

        let new_supply = self.total_supply() + amount;
        self.total_supply.set(new_supply);
        cep18::set_total_supply(&self.env(), new_supply);
    }

    /// Burn tokens from an account (manager only)
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_manager();
        self.burn_internal(from, amount);
    }

    /// Burn the caller's own tokens
    pub fn burn(&mut self, amount: U256) {
        let caller = self.env().caller();
        self.burn_internal(caller, amount);
    }

    // ========== Admin Functions ==========

    /// Wire the manager (admin only)
    pub fn set_manager(&mut self, manager: Address) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
        self.manager.set(Some(manager));
    }

    pub fn get_manager(&self) -> Option<Address> {
        self.manager.get().flatten()
    }

    // ========== Internal Functions ==========

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

    fn burn_internal(&mut self, from: Address, amount: U256) {
        let current_balance = self.balance_of(from);
        if current_balance < amount {
            self.env().revert(ManagerError::InsufficientTokenBalance);
        }

        let new_balance = current_balance - amount;
        self.balances.set(&from, new_balance);
        cep18::set_balance(&self.env(), from, new_balance);

        let new_supply = self.total_supply() - amount;
        self.total_supply.set(new_supply);
        cep18::set_total_supply(&self.env(), new_supply);
    }

    fn require_manager(&self) {
        let caller = self.env().caller();
        if self.manager.get().flatten() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
    }
}
