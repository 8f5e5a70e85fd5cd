//! Dilution and melting accountant.
//!
//! Tracks the BU ⇄ token exchange rate as two independent factors:
//!
//! - **melting ratio**: grows whenever revenue tokens are burned without the
//!   backing shrinking, so every remaining token claims more BUs.
//! - **basket dilution ratio**: grows with the share `f` of basket
//!   appreciation that is skimmed as revenue, so every token claims fewer
//!   BUs.
//!
//! `toBUs(amount) = amount * melting_ratio / basket_dilution_ratio`.
//! Conversions always recompute from the stored ratios; converted amounts are
//! never cached.

use odra::casper_types::U256;
use crate::errors::ManagerError;
use crate::math::{mul_div, mul_div_up, scale};

/// Exchange-rate state owned by the manager
#[odra::odra_type]
pub struct DilutionState {
    /// Accumulated melting factor (starts at SCALE, never decreases)
    pub melting_ratio: U256,
    /// Running total of melted tokens
    pub melted: U256,
    /// Dilution since the last accumulation point
    pub current_basket_dilution: U256,
    /// Product of all prior accumulation points
    pub historical_basket_dilution: U256,
    /// `current * historical / SCALE`
    pub basket_dilution_ratio: U256,
    /// Basket rate observed at the last accumulation point
    pub reference_rate: U256,
}

impl DilutionState {
    /// Fresh state seeded from a live basket rate
    pub fn new(reference_rate: U256) -> Result<Self, ManagerError> {
        if reference_rate.is_zero() {
            return Err(ManagerError::ArithmeticFault);
        }
        Ok(Self {
            melting_ratio: scale(),
            melted: U256::zero(),
            current_basket_dilution: scale(),
            historical_basket_dilution: scale(),
            basket_dilution_ratio: scale(),
            reference_rate,
        })
    }

    /// Record `burned` tokens leaving circulation.
    ///
    /// `live_supply` is the supply after the burn. The ratio compounds by
    /// `(live_supply + burned) / live_supply`; with nothing left in
    /// circulation the ratio is left untouched.
    pub fn melt(&mut self, burned: U256, live_supply: U256) -> Result<(), ManagerError> {
        if burned.is_zero() {
            return Ok(());
        }
        self.melted = self
            .melted
            .checked_add(burned)
            .ok_or(ManagerError::ArithmeticFault)?;
        if live_supply.is_zero() {
            return Ok(());
        }
        let grown = live_supply
            .checked_add(burned)
            .ok_or(ManagerError::ArithmeticFault)?;
        self.melting_ratio = mul_div(self.melting_ratio, grown, live_supply)?;
        Ok(())
    }

    /// Recompute the current dilution from the basket's present rate.
    ///
    /// `current = SCALE + f * (SCALE * rate / reference - SCALE) / SCALE`.
    /// A basket trading below its reference leaves the dilution at SCALE.
    pub fn dilute(&mut self, current_rate: U256, revenue_factor: U256) -> Result<(), ManagerError> {
        if self.reference_rate.is_zero() {
            return Err(ManagerError::ArithmeticFault);
        }
        let growth = mul_div(scale(), current_rate, self.reference_rate)?;
        let appreciation = growth.saturating_sub(scale());
        let skimmed = mul_div(revenue_factor, appreciation, scale())?;
        self.current_basket_dilution = scale()
            .checked_add(skimmed)
            .ok_or(ManagerError::ArithmeticFault)?;
        self.refresh_ratio()
    }

    /// Fold the current dilution into history and re-seed the reference rate.
    ///
    /// Must run before the revenue factor or the basket changes.
    pub fn accumulate(&mut self, new_reference_rate: U256) -> Result<(), ManagerError> {
        if new_reference_rate.is_zero() {
            return Err(ManagerError::ArithmeticFault);
        }
        self.historical_basket_dilution = mul_div(
            self.historical_basket_dilution,
            self.current_basket_dilution,
            scale(),
        )?;
        self.current_basket_dilution = scale();
        self.reference_rate = new_reference_rate;
        self.refresh_ratio()
    }

    /// Token amount to basket units
    pub fn to_bus(&self, amount: U256) -> Result<U256, ManagerError> {
        mul_div(amount, self.melting_ratio, self.basket_dilution_ratio)
    }

    /// Token amount to basket units, rounded up.
    ///
    /// Used on the issue side so the deposit always covers the minted amount.
    pub fn to_bus_up(&self, amount: U256) -> Result<U256, ManagerError> {
        mul_div_up(amount, self.melting_ratio, self.basket_dilution_ratio)
    }

    /// Basket units to token amount
    pub fn from_bus(&self, bus: U256) -> Result<U256, ManagerError> {
        mul_div(bus, self.basket_dilution_ratio, self.melting_ratio)
    }

    /// `supply * melting_ratio <= bus * basket_dilution_ratio`
    pub fn is_collateralized(&self, supply: U256, bus: U256) -> bool {
        let required = supply.checked_mul(self.melting_ratio);
        let backing = bus.checked_mul(self.basket_dilution_ratio);
        match (required, backing) {
            (Some(required), Some(backing)) => required <= backing,
            _ => false,
        }
    }

    fn refresh_ratio(&mut self) -> Result<(), ManagerError> {
        self.basket_dilution_ratio = mul_div(
            self.current_basket_dilution,
            self.historical_basket_dilution,
            scale(),
        )?;
        Ok(())
    }
}
