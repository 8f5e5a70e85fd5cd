//! Basket Vault Contract
//!
//! Holds a fixed basket of collateral tokens and issues basket units (BUs)
//! against it. One whole BU (1e18 base units) is backed by `quantities[i]`
//! base units of `collaterals[i]`.
//!
//! - issue pulls collateral rounded up
//! - redeem pays collateral rounded down
//!
//! Rounding always favours the vault, so outstanding BUs stay fully backed.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::ManagerError;
use crate::interfaces::CollateralContractRef;
use crate::math::{mul_div, mul_div_up, pow10, scale};

/// Basket composition
#[odra::odra_type]
pub struct Basket {
    /// Collateral token addresses
    pub collaterals: Vec<Address>,
    /// Base units of each collateral per whole BU
    pub quantities: Vec<U256>,
}

impl Basket {
    pub fn new(collaterals: Vec<Address>, quantities: Vec<U256>) -> Result<Self, ManagerError> {
        if collaterals.is_empty() || collaterals.len() != quantities.len() {
            return Err(ManagerError::BasketMismatch);
        }
        if quantities.iter().any(|quantity| quantity.is_zero()) {
            return Err(ManagerError::InvalidConfig);
        }
        Ok(Self { collaterals, quantities })
    }

    pub fn len(&self) -> usize {
        self.collaterals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collaterals.is_empty()
    }

    /// Collateral needed to issue `bus` (rounded up)
    pub fn issue_amounts(&self, bus: U256) -> Result<Vec<U256>, ManagerError> {
        self.quantities
            .iter()
            .map(|quantity| mul_div_up(bus, *quantity, scale()))
            .collect()
    }

    /// Collateral released for `bus` (rounded down)
    pub fn redemption_amounts(&self, bus: U256) -> Result<Vec<U256>, ManagerError> {
        self.quantities
            .iter()
            .map(|quantity| mul_div(bus, *quantity, scale()))
            .collect()
    }

    /// Largest BU amount fully covered by `balances` (same order as the basket)
    pub fn max_issuable(&self, balances: &[U256]) -> Result<U256, ManagerError> {
        if balances.len() != self.len() {
            return Err(ManagerError::BasketMismatch);
        }
        let mut issuable = U256::MAX;
        for (balance, quantity) in balances.iter().zip(self.quantities.iter()) {
            issuable = issuable.min(mul_div(*balance, scale(), *quantity)?);
        }
        Ok(issuable)
    }

    /// Reference value of one whole BU from each collateral's redemption
    /// rate and decimals (scaled by 1e18)
    pub fn rate(&self, redemption_rates: &[U256], decimals: &[u8]) -> Result<U256, ManagerError> {
        if redemption_rates.len() != self.len() || decimals.len() != self.len() {
            return Err(ManagerError::BasketMismatch);
        }
        let mut total = U256::zero();
        for ((quantity, rate), decimals) in self
            .quantities
            .iter()
            .zip(redemption_rates.iter())
            .zip(decimals.iter())
        {
            let value = mul_div(*quantity, *rate, pow10(*decimals))?;
            total = total.checked_add(value).ok_or(ManagerError::ArithmeticFault)?;
        }
        Ok(total)
    }
}

/// Basket Vault Contract
#[odra::module]
pub struct BasketVault {
    /// Basket composition
    basket: Var<Basket>,
    /// BU balances
    balances: Mapping<Address, U256>,
    /// Outstanding BUs
    total_units: Var<U256>,
    /// Ordered backup vaults
    backups: Var<Vec<Address>>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl BasketVault {
    /// Initialize with a fixed basket
    pub fn init(&mut self, collaterals: Vec<Address>, quantities: Vec<U256>) {
        let basket = match Basket::new(collaterals, quantities) {
            Ok(basket) => basket,
            Err(error) => self.env().revert(error),
        };
        self.basket.set(basket);
        self.total_units.set(U256::zero());
        self.backups.set(Vec::new());
        self.admin.set(self.env().caller());
    }

    // ========== Issuance ==========

    /// Pull collateral from the caller and credit it `amount` BUs
    pub fn issue(&mut self, amount: U256) {
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        let issuer = self.env().caller();
        let this = self.env().self_address();
        let basket = self.get_basket();
        let amounts = self.ok_or_revert(basket.issue_amounts(amount));

        for (collateral, needed) in basket.collaterals.iter().zip(amounts.iter()) {
            let mut token = CollateralContractRef::new(self.env(), *collateral);
            if !token.transfer_from(issuer, this, *needed) {
                self.env().revert(ManagerError::CollaboratorFailure);
            }
        }

        let balance = self.basket_units(issuer);
        self.balances.set(&issuer, balance + amount);
        self.total_units.set(self.total_units() + amount);
    }

    /// Burn `amount` of the caller's BUs and pay the collateral to `recipient`
    pub fn redeem(&mut self, recipient: Address, amount: U256) {
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        let holder = self.env().caller();
        let balance = self.basket_units(holder);
        if balance < amount {
            self.env().revert(ManagerError::InsufficientBasketUnits);
        }
        self.balances.set(&holder, balance - amount);
        self.total_units.set(self.total_units() - amount);

        let basket = self.get_basket();
        let amounts = self.ok_or_revert(basket.redemption_amounts(amount));
        for (collateral, paid) in basket.collaterals.iter().zip(amounts.iter()) {
            if paid.is_zero() {
                continue;
            }
            let mut token = CollateralContractRef::new(self.env(), *collateral);
            if !token.transfer(recipient, *paid) {
                self.env().revert(ManagerError::CollaboratorFailure);
            }
        }
    }

    // ========== Quotes ==========

    pub fn token_amounts(&self, amount: U256) -> Vec<U256> {
        self.ok_or_revert(self.get_basket().issue_amounts(amount))
    }

    pub fn redemption_amounts(&self, amount: U256) -> Vec<U256> {
        self.ok_or_revert(self.get_basket().redemption_amounts(amount))
    }

    /// BUs issuable against the collateral `account` holds
    pub fn max_issuable(&self, account: Address) -> U256 {
        let basket = self.get_basket();
        let balances: Vec<U256> = basket
            .collaterals
            .iter()
            .map(|collateral| CollateralContractRef::new(self.env(), *collateral).balance_of(account))
            .collect();
        self.ok_or_revert(basket.max_issuable(&balances))
    }

    /// Reference value of one whole BU (scaled by 1e18)
    pub fn basket_rate(&self) -> U256 {
        let basket = self.get_basket();
        let mut rates = Vec::new();
        let mut decimals = Vec::new();
        for collateral in basket.collaterals.iter() {
            let token = CollateralContractRef::new(self.env(), *collateral);
            rates.push(token.redemption_rate());
            decimals.push(token.decimals());
        }
        self.ok_or_revert(basket.rate(&rates, &decimals))
    }

    // ========== Views ==========

    pub fn basket_units(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    pub fn total_units(&self) -> U256 {
        self.total_units.get().unwrap_or(U256::zero())
    }

    pub fn get_basket(&self) -> Basket {
        self.basket.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn basket_size(&self) -> u32 {
        self.get_basket().len() as u32
    }

    pub fn collateral_at(&self, index: u32) -> Address {
        match self.get_basket().collaterals.get(index as usize) {
            Some(collateral) => *collateral,
            None => self.env().revert(ManagerError::BasketMismatch),
        }
    }

    pub fn num_backups(&self) -> u32 {
        self.backups.get().unwrap_or_default().len() as u32
    }

    pub fn backup_at(&self, index: u32) -> Address {
        match self.backups.get().unwrap_or_default().get(index as usize) {
            Some(backup) => *backup,
            None => self.env().revert(ManagerError::NotInitialized),
        }
    }

    // ========== Admin Functions ==========

    /// Replace the ordered backup list (admin only)
    pub fn set_backups(&mut self, backups: Vec<Address>) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
        self.backups.set(backups);
    }

    // ========== Internal Functions ==========

    fn ok_or_revert<T>(&self, result: Result<T, ManagerError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }
}
