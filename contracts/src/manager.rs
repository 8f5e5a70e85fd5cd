//! Manager Contract
//!
//! Orchestrates the accounting and recovery engine of the basket-backed token.
//!
//! ## Entry flow
//!
//! Every state-changing entry point runs, in order:
//!
//! 1. pause gate (`Paused`)
//! 2. reentrancy lock (`Reentrant`)
//! 3. accounting preamble: faucet drip → melt → dilute → process slow mintings
//! 4. the operation itself
//!
//! Any failure reverts the whole call, including the preamble.
//!
//! ## Embedded ledgers
//!
//! - [`DilutionState`]: BU ⇄ token exchange rate
//! - [`MintingCursor`] + records: slow-minting queue
//! - [`Auction`] log: rebalancing triggers
//! - [`DefaultState`] + defaulted set: two-horizon default detection
//! - past vaults: baskets being wound down, oldest first

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::auction::{self, Auction, AuctionStatus, AuctionStep};
use crate::default_detector::{
    evaluate, price_floor, CollateralObservation, DefaultState, DefaultedSet, DetectionStep,
    Transition,
};
use crate::dilution::DilutionState;
use crate::errors::ManagerError;
use crate::interfaces::{
    AuctionExecutorContractRef, CollateralContractRef, FaucetContractRef, OracleContractRef,
    TokenLedgerContractRef, VaultContractRef,
};
use crate::slow_minting::{resolve, MintingAction, MintingCursor, MintingStatus, SlowMinting};
use crate::types::{DefaultStatus, ManagerConfig, Role};
use crate::vault_switch::{select_backup, BackupCandidate};

// ========== Events ==========

/// Tokens queued for slow minting
#[odra::event]
pub struct SlowMintingQueued {
    pub index: u64,
    pub issuer: Address,
    pub amount: U256,
    pub bus: U256,
    pub available_at: u64,
}

/// Escrow released to the issuer
#[odra::event]
pub struct SlowMintingCompleted {
    pub index: u64,
    pub issuer: Address,
    pub amount: U256,
}

/// Escrow burned after a basket switch
#[odra::event]
pub struct SlowMintingReverted {
    pub index: u64,
    pub issuer: Address,
    pub amount: U256,
    pub vault: Address,
}

/// Revenue tokens burned
#[odra::event]
pub struct Melted {
    pub amount: U256,
    pub melting_ratio: U256,
}

/// Basket dilution recomputed
#[odra::event]
pub struct BasketDiluted {
    pub basket_rate: U256,
    pub basket_dilution_ratio: U256,
}

/// Dilution folded into history
#[odra::event]
pub struct DilutionAccumulated {
    pub historical_basket_dilution: U256,
    pub reference_rate: U256,
}

/// Tokens redeemed for collateral
#[odra::event]
pub struct Redeemed {
    pub redeemer: Address,
    pub amount: U256,
    pub bus: U256,
    pub vault: Address,
}

/// Residual backing moved out of a past vault
#[odra::event]
pub struct MigrationChunkMoved {
    pub from: Address,
    pub to: Address,
    pub redeemed: U256,
    pub reissued: U256,
}

/// Rebalancing auction opened
#[odra::event]
pub struct AuctionStarted {
    pub index: u64,
    pub vault: Address,
    pub deficit: U256,
    pub end_at: u64,
}

/// Rebalancing auction closed
#[odra::event]
pub struct AuctionClosed {
    pub index: u64,
}

/// Short-window scan flagged the basket
#[odra::event]
pub struct DefaultSuspected {
    pub tokens: Vec<Address>,
    pub at: u64,
}

/// Long-window re-scan found the basket sound
#[odra::event]
pub struct DefaultCleared {
    pub at: u64,
}

/// Long-window re-scan still flags the basket
#[odra::event]
pub struct DefaultConfirmed {
    pub tokens: Vec<Address>,
    pub switch_due: bool,
}

/// Backing moved to a new vault
#[odra::event]
pub struct VaultSwitched {
    pub from: Address,
    pub to: Address,
    pub reference_rate: U256,
}

/// Pause gate toggled
#[odra::event]
pub struct PauseToggled {
    pub paused: bool,
}

/// Configuration replaced
#[odra::event]
pub struct ConfigUpdated {
    pub revenue_factor_changed: bool,
}

/// Manager Contract
#[odra::module(events = [
    SlowMintingQueued,
    SlowMintingCompleted,
    SlowMintingReverted,
    Melted,
    BasketDiluted,
    DilutionAccumulated,
    Redeemed,
    MigrationChunkMoved,
    AuctionStarted,
    AuctionClosed,
    DefaultSuspected,
    DefaultCleared,
    DefaultConfirmed,
    VaultSwitched,
    PauseToggled,
    ConfigUpdated
])]
pub struct Manager {
    // === Access ===
    /// Configuration owner
    owner: Var<Address>,
    /// Pause controller
    pauser: Var<Address>,
    /// Global pause gate
    paused: Var<bool>,
    /// Reentrancy lock
    entered: Var<bool>,

    // === Collaborators ===
    /// Elastic token ledger
    token: Var<Address>,
    /// Current backing vault
    vault: Var<Address>,
    /// Price oracle
    oracle: Var<Address>,
    /// Optional revenue faucet
    faucet: Var<Option<Address>>,
    /// Optional auction executor
    auction_executor: Var<Option<Address>>,

    // === Configuration ===
    config: Var<ManagerConfig>,

    // === Dilution ===
    dilution: Var<DilutionState>,

    // === Slow minting ===
    minting_cursor: Var<MintingCursor>,
    mintings: Mapping<u64, SlowMinting>,

    // === Auctions ===
    auctions: Mapping<u64, Auction>,
    auction_count: Var<u64>,

    // === Default detection ===
    default_state: Var<DefaultState>,
    /// Live defaulted set, replaced wholesale on each scan
    defaulted: Var<Vec<Address>>,
    /// Defaulted set at the time of the last vault switch
    last_switch_defaulted: Var<Vec<Address>>,
    /// Last observed redemption rate per collateral
    last_redemption_rates: Mapping<Address, U256>,

    // === Past vaults (oldest first) ===
    past_vaults: Mapping<u32, Address>,
    past_vault_count: Var<u32>,
}

#[odra::module]
impl Manager {
    /// Initialize the manager against a live basket
    pub fn init(&mut self, token: Address, vault: Address, oracle: Address, config: ManagerConfig) {
        let validated = config.validate();
        self.ok_or_revert(validated);

        let owner = self.env().caller();
        self.owner.set(owner);
        self.pauser.set(owner);
        self.paused.set(false);
        self.entered.set(false);

        self.token.set(token);
        self.vault.set(vault);
        self.oracle.set(oracle);
        self.faucet.set(None);
        self.auction_executor.set(None);
        self.config.set(config);

        let rate = self.vault_ref(vault).basket_rate();
        let dilution = self.ok_or_revert(DilutionState::new(rate));
        self.dilution.set(dilution);

        self.minting_cursor.set(MintingCursor::default());
        self.auction_count.set(0);
        self.default_state.set(DefaultState::default());
        self.defaulted.set(Vec::new());
        self.last_switch_defaulted.set(Vec::new());
        self.past_vault_count.set(0);
    }

    // ========== User Functions ==========

    /// Queue a slow minting of `amount` tokens.
    ///
    /// The caller must have approved the manager for the collateral amounts
    /// returned by `quote_issue(amount)`.
    pub fn issue(&mut self, amount: U256) {
        self.require_not_paused();
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        self.enter();
        self.before();

        let issuer = self.env().caller();
        let manager = self.env().self_address();
        let now = self.env().get_block_time();
        let config = self.current_config();
        let dilution = self.current_dilution();

        let bus = self.ok_or_revert(dilution.to_bus_up(amount));
        if bus.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }

        let vault = self.current_vault();
        self.pull_basket(vault, issuer, bus);
        self.vault_ref(vault).issue(bus);

        let mut token = self.token_ref();
        let live_supply = token.total_supply();
        let mut cursor = self.minting_cursor.get_or_default();
        let scheduled = cursor.schedule(
            issuer,
            vault,
            amount,
            bus,
            live_supply,
            config.issuance_rate,
            config.block_duration,
            now,
        );
        let record = self.ok_or_revert(scheduled);
        self.mintings.set(&record.index, record.clone());
        self.minting_cursor.set(cursor);

        token.mint(manager, amount);

        self.env().emit_event(SlowMintingQueued {
            index: record.index,
            issuer,
            amount,
            bus,
            available_at: record.available_at,
        });
        self.exit();
    }

    /// Burn `amount` tokens and redeem their BUs from the oldest non-empty vault
    pub fn redeem(&mut self, amount: U256) {
        self.require_not_paused();
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        self.enter();
        self.before();

        let redeemer = self.env().caller();
        let bus = self.ok_or_revert(self.current_dilution().to_bus(amount));
        if bus.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }

        self.token_ref().burn_from(redeemer, amount);

        let vault = self.oldest_nonempty_vault();
        self.vault_ref(vault).redeem(redeemer, bus);

        self.env().emit_event(Redeemed {
            redeemer,
            amount,
            bus,
            vault,
        });
        self.exit();
    }

    /// Run the accounting preamble and the auction trigger
    pub fn poke(&mut self) {
        self.require_not_paused();
        self.enter();
        self.before();
        self.try_auction();
        self.exit();
    }

    /// Advance the default-detection state machine
    pub fn detect_default(&mut self) {
        self.require_not_paused();
        self.enter();
        self.before();

        let now = self.env().get_block_time();
        let config = self.current_config();
        let mut state = self.default_state.get_or_default();
        let vault = self.current_vault();

        match state.next_step(now, &config) {
            DetectionStep::ScanShort(window) => {
                let flagged = self.scan_basket(vault, window, true);
                if state.on_short_scan(!flagged.is_empty(), now) == Transition::Suspected {
                    let tokens = flagged.into_vec();
                    self.defaulted.set(tokens.clone());
                    self.default_state.set(state);
                    self.env().emit_event(DefaultSuspected { tokens, at: now });
                }
            }
            DetectionStep::Throttled => {}
            DetectionStep::ScanLong(window) => {
                let flagged = self.scan_basket(vault, window, true);
                match state.on_long_scan(!flagged.is_empty(), now, config.default_delay) {
                    Transition::Confirmed { switch_due } => {
                        let tokens = flagged.into_vec();
                        self.defaulted.set(tokens.clone());
                        self.default_state.set(state);
                        self.env().emit_event(DefaultConfirmed { tokens, switch_due });
                        if switch_due {
                            self.switch_vault();
                        }
                    }
                    Transition::Cleared => {
                        self.defaulted.set(Vec::new());
                        self.default_state.set(state);
                        self.env().emit_event(DefaultCleared { at: now });
                    }
                    Transition::Unchanged | Transition::Suspected => {}
                }
            }
        }

        self.exit();
    }

    // ========== Quotes ==========

    /// Collateral amounts needed to issue `amount` tokens
    pub fn quote_issue(&self, amount: U256) -> Vec<U256> {
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        let bus = self.ok_or_revert(self.current_dilution().to_bus_up(amount));
        self.vault_ref(self.current_vault()).token_amounts(bus)
    }

    /// Collateral amounts paid out for redeeming `amount` tokens
    pub fn quote_redeem(&self, amount: U256) -> Vec<U256> {
        if amount.is_zero() {
            self.env().revert(ManagerError::InvalidAmount);
        }
        let bus = self.ok_or_revert(self.current_dilution().to_bus(amount));
        self.vault_ref(self.oldest_nonempty_vault()).redemption_amounts(bus)
    }

    /// Token amount to BUs at the current ratios
    pub fn to_bus(&self, amount: U256) -> U256 {
        self.ok_or_revert(self.current_dilution().to_bus(amount))
    }

    /// BUs to token amount at the current ratios
    pub fn from_bus(&self, bus: U256) -> U256 {
        self.ok_or_revert(self.current_dilution().from_bus(bus))
    }

    // ========== Pause Controls ==========

    /// Close the gate (pauser only)
    pub fn pause(&mut self) {
        self.require_role(Role::Pauser);
        self.paused.set(true);
        self.env().emit_event(PauseToggled { paused: true });
    }

    /// Open the gate (pauser only)
    pub fn unpause(&mut self) {
        self.require_role(Role::Pauser);
        self.paused.set(false);
        self.env().emit_event(PauseToggled { paused: false });
    }

    // ========== Admin Functions ==========

    /// Replace the pause controller (owner only)
    pub fn set_pauser(&mut self, pauser: Address) {
        self.require_role(Role::Owner);
        self.pauser.set(pauser);
    }

    /// Hand over ownership (owner only)
    pub fn transfer_ownership(&mut self, new_owner: Address) {
        self.require_role(Role::Owner);
        self.owner.set(new_owner);
    }

    /// Move backing to `vault` (owner only)
    pub fn set_vault(&mut self, vault: Address) {
        self.require_role(Role::Owner);
        self.enter();
        self.before();
        if vault != self.current_vault() {
            self.adopt_vault(vault);
        }
        self.exit();
    }

    /// Replace the configuration (owner only).
    ///
    /// Dilution accrued under the old revenue factor is folded into history
    /// before the new factor takes effect.
    pub fn set_config(&mut self, config: ManagerConfig) {
        self.require_role(Role::Owner);
        let validated = config.validate();
        self.ok_or_revert(validated);
        self.enter();
        self.before();

        let previous = self.current_config();
        let revenue_factor_changed = previous.revenue_factor != config.revenue_factor;
        if revenue_factor_changed {
            self.accumulate_dilution_factor();
        }
        self.config.set(config);

        self.env().emit_event(ConfigUpdated { revenue_factor_changed });
        self.exit();
    }

    /// Set or clear the revenue faucet (owner only)
    pub fn set_faucet(&mut self, faucet: Option<Address>) {
        self.require_role(Role::Owner);
        self.faucet.set(faucet);
    }

    /// Set or clear the auction executor (owner only)
    pub fn set_auction_executor(&mut self, executor: Option<Address>) {
        self.require_role(Role::Owner);
        self.auction_executor.set(executor);
    }

    // ========== View Functions ==========

    pub fn get_config(&self) -> ManagerConfig {
        self.current_config()
    }

    pub fn get_dilution(&self) -> DilutionState {
        self.current_dilution()
    }

    pub fn melting_ratio(&self) -> U256 {
        self.current_dilution().melting_ratio
    }

    pub fn basket_dilution_ratio(&self) -> U256 {
        self.current_dilution().basket_dilution_ratio
    }

    pub fn get_vault(&self) -> Address {
        self.current_vault()
    }

    pub fn get_token(&self) -> Address {
        self.token.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn get_oracle(&self) -> Address {
        self.oracle.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn get_faucet(&self) -> Option<Address> {
        self.faucet.get().flatten()
    }

    pub fn get_auction_executor(&self) -> Option<Address> {
        self.auction_executor.get().flatten()
    }

    pub fn get_owner(&self) -> Address {
        self.owner.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn get_pauser(&self) -> Address {
        self.pauser.get_or_revert_with(ManagerError::NotInitialized)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get().unwrap_or(false)
    }

    /// Slow-minting record at `index`
    pub fn get_minting(&self, index: u64) -> Option<SlowMinting> {
        self.mintings.get(&index)
    }

    /// Number of slow-minting records ever created
    pub fn minting_count(&self) -> u64 {
        self.minting_cursor.get_or_default().len()
    }

    /// Tokens held in escrow for pending mintings
    pub fn escrowed(&self) -> U256 {
        self.minting_cursor.get_or_default().escrowed
    }

    /// Auction record at `index`
    pub fn get_auction(&self, index: u64) -> Option<Auction> {
        self.auctions.get(&index)
    }

    pub fn auction_count(&self) -> u64 {
        self.auction_count.get().unwrap_or(0)
    }

    pub fn default_status(&self) -> DefaultStatus {
        self.default_state.get_or_default().status()
    }

    pub fn get_default_state(&self) -> DefaultState {
        self.default_state.get_or_default()
    }

    /// Tokens flagged by the most recent scan of the current episode
    pub fn defaulted_tokens(&self) -> Vec<Address> {
        self.defaulted.get().unwrap_or_default()
    }

    /// Tokens that were flagged when the last vault switch happened
    pub fn last_switch_defaulted(&self) -> Vec<Address> {
        self.last_switch_defaulted.get().unwrap_or_default()
    }

    pub fn last_redemption_rate(&self, collateral: Address) -> Option<U256> {
        self.last_redemption_rates.get(&collateral)
    }

    pub fn past_vault_count(&self) -> u32 {
        self.past_vault_count.get().unwrap_or(0)
    }

    /// Past vault at `index` (0 = oldest)
    pub fn past_vault_at(&self, index: u32) -> Option<Address> {
        self.past_vaults.get(&index)
    }

    /// Next staking reward boundary
    pub fn next_reward_at(&self) -> u64 {
        self.current_config().next_reward_at(self.env().get_block_time())
    }

    /// Whether live supply is fully backed by the current vault's BUs
    pub fn is_fully_collateralized(&self) -> bool {
        let manager = self.env().self_address();
        let supply = self.token_ref().total_supply();
        let bus = self.vault_ref(self.current_vault()).basket_units(manager);
        self.current_dilution().is_collateralized(supply, bus)
    }

    // ========== Accounting Preamble ==========

    fn before(&mut self) {
        self.drip_faucet();
        self.melt();
        self.dilute_basket();
        self.process_mintings();
    }

    fn drip_faucet(&mut self) {
        if let Some(faucet) = self.faucet.get().flatten() {
            FaucetContractRef::new(self.env(), faucet).drip();
        }
    }

    /// Burn the manager's own balance above escrow
    fn melt(&mut self) {
        let manager = self.env().self_address();
        let mut token = self.token_ref();
        let escrowed = self.minting_cursor.get_or_default().escrowed;
        let revenue = token.balance_of(manager).saturating_sub(escrowed);
        if revenue.is_zero() {
            return;
        }

        token.burn(revenue);
        let live_supply = token.total_supply();

        let mut dilution = self.current_dilution();
        let melted = dilution.melt(revenue, live_supply);
        self.ok_or_revert(melted);
        let melting_ratio = dilution.melting_ratio;
        self.dilution.set(dilution);

        self.env().emit_event(Melted {
            amount: revenue,
            melting_ratio,
        });
    }

    fn dilute_basket(&mut self) {
        let basket_rate = self.vault_ref(self.current_vault()).basket_rate();
        let revenue_factor = self.current_config().revenue_factor;

        let mut dilution = self.current_dilution();
        let previous = dilution.basket_dilution_ratio;
        let diluted = dilution.dilute(basket_rate, revenue_factor);
        self.ok_or_revert(diluted);
        let basket_dilution_ratio = dilution.basket_dilution_ratio;
        self.dilution.set(dilution);

        if basket_dilution_ratio != previous {
            self.env().emit_event(BasketDiluted {
                basket_rate,
                basket_dilution_ratio,
            });
        }
    }

    fn accumulate_dilution_factor(&mut self) {
        let reference_rate = self.vault_ref(self.current_vault()).basket_rate();
        let mut dilution = self.current_dilution();
        let accumulated = dilution.accumulate(reference_rate);
        self.ok_or_revert(accumulated);
        let historical_basket_dilution = dilution.historical_basket_dilution;
        self.dilution.set(dilution);

        self.env().emit_event(DilutionAccumulated {
            historical_basket_dilution,
            reference_rate,
        });
    }

    /// Complete or revert pending mintings in index order
    fn process_mintings(&mut self) {
        let now = self.env().get_block_time();
        let current = self.current_vault();
        let mut cursor = self.minting_cursor.get_or_default();
        let mut token = self.token_ref();

        let mut index = cursor.first_pending;
        while index < cursor.next_index {
            let mut record = match self.mintings.get(&index) {
                Some(record) => record,
                None => self.env().revert(ManagerError::NotInitialized),
            };

            match resolve(&record, current, now) {
                MintingAction::Skip => {}
                MintingAction::Wait => break,
                MintingAction::Revert => {
                    token.burn(record.amount);
                    self.vault_ref(record.vault).redeem(record.issuer, record.bus);
                    record.status = MintingStatus::Reverted;
                    cursor.release(&record);
                    self.mintings.set(&index, record.clone());
                    self.env().emit_event(SlowMintingReverted {
                        index,
                        issuer: record.issuer,
                        amount: record.amount,
                        vault: record.vault,
                    });
                }
                MintingAction::Complete => {
                    if !token.transfer(record.issuer, record.amount) {
                        self.env().revert(ManagerError::CollaboratorFailure);
                    }
                    record.status = MintingStatus::Completed;
                    cursor.release(&record);
                    self.mintings.set(&index, record.clone());
                    self.env().emit_event(SlowMintingCompleted {
                        index,
                        issuer: record.issuer,
                        amount: record.amount,
                    });
                }
            }
            index += 1;
        }

        cursor.first_pending = index;
        self.minting_cursor.set(cursor);
    }

    // ========== Auctions ==========

    fn try_auction(&mut self) {
        let now = self.env().get_block_time();
        let count = self.auction_count.get().unwrap_or(0);
        let latest = if count > 0 { self.auctions.get(&(count - 1)) } else { None };

        match auction::next_step(latest.as_ref(), now) {
            AuctionStep::Wait => return,
            AuctionStep::CloseAndContinue => {
                if let Some(mut closing) = latest {
                    closing.status = AuctionStatus::Closed;
                    self.auctions.set(&closing.index, closing.clone());
                    self.env().emit_event(AuctionClosed { index: closing.index });
                }
            }
            AuctionStep::Continue => {}
        }

        let manager = self.env().self_address();
        let config = self.current_config();
        let live_supply = self.token_ref().total_supply();
        let target = self.ok_or_revert(self.current_dilution().to_bus(live_supply));
        let current = self.current_vault();
        let mut held = self.vault_ref(current).basket_units(manager);

        if let Some(previous) = self.latest_past_vault() {
            let mut previous_ref = self.vault_ref(previous);
            let residual = previous_ref.basket_units(manager);
            let chunk = self.ok_or_revert(auction::migration_chunk(
                target,
                held,
                residual,
                config.max_auction_size,
            ));
            if !chunk.is_zero() {
                previous_ref.redeem(manager, chunk);
                let mut current_ref = self.vault_ref(current);
                let reissued = current_ref.max_issuable(manager);
                if !reissued.is_zero() {
                    self.approve_basket(current, reissued);
                    current_ref.issue(reissued);
                }
                held = current_ref.basket_units(manager);
                self.env().emit_event(MigrationChunkMoved {
                    from: previous,
                    to: current,
                    redeemed: chunk,
                    reissued,
                });
            }
        }

        if held >= target {
            return;
        }

        let deficit = target - held;
        let end_at = now.saturating_add(config.auction_period);
        self.auctions.set(
            &count,
            Auction {
                index: count,
                vault: current,
                deficit,
                end_at,
                status: AuctionStatus::Open,
            },
        );
        self.auction_count.set(count + 1);
        self.env().emit_event(AuctionStarted {
            index: count,
            vault: current,
            deficit,
            end_at,
        });

        if let Some(executor) = self.auction_executor.get().flatten() {
            AuctionExecutorContractRef::new(self.env(), executor).launch(current, deficit, end_at);
        }
    }

    // ========== Default Detection ==========

    /// Scan every collateral of `vault` over `window`.
    ///
    /// With `record`, a redemption rate above the stored baseline replaces it.
    fn scan_basket(&mut self, vault: Address, window: u64, record: bool) -> DefaultedSet {
        let config = self.current_config();
        let floor = self.ok_or_revert(price_floor(config.default_threshold));
        let oracle = OracleContractRef::new(self.env(), self.get_oracle());
        let vault_ref = self.vault_ref(vault);

        let mut flagged = DefaultedSet::default();
        for index in 0..vault_ref.basket_size() {
            let collateral = vault_ref.collateral_at(index);
            let collateral_ref = CollateralContractRef::new(self.env(), collateral);
            let underlying = collateral_ref.underlying();
            let observation = CollateralObservation {
                collateral,
                underlying,
                wrapped: collateral_ref.wrapped(),
                is_direct: collateral_ref.is_direct(),
                redemption_rate: collateral_ref.redemption_rate(),
                last_rate: self.last_redemption_rates.get(&collateral),
                price: oracle.consult(underlying, window),
            };
            evaluate(&observation, floor, &mut flagged);
            if record {
                self.last_redemption_rates
                    .set(&collateral, observation.baseline());
            }
        }
        flagged
    }

    /// Switch to the best sound backup; keeps the current vault if none qualifies
    fn switch_vault(&mut self) {
        let short_window = self.current_config().short_window;
        let current = self.current_vault();
        let current_ref = self.vault_ref(current);

        let mut candidates = Vec::new();
        for index in 0..current_ref.num_backups() {
            let backup = current_ref.backup_at(index);
            if backup == current {
                continue;
            }
            if self.scan_basket(backup, short_window, false).is_empty() {
                candidates.push(BackupCandidate {
                    index,
                    vault: backup,
                    basket_rate: self.vault_ref(backup).basket_rate(),
                });
            }
        }

        if let Some(choice) = select_backup(&candidates) {
            self.adopt_vault(choice.vault);
        }
    }

    /// Retire the current vault and re-baseline accounting against `vault`
    fn adopt_vault(&mut self, vault: Address) {
        let previous = self.current_vault();
        let count = self.past_vault_count.get().unwrap_or(0);
        self.past_vaults.set(&count, previous);
        self.past_vault_count.set(count + 1);
        self.vault.set(vault);

        let mut state = self.default_state.get_or_default();
        state.on_switch();
        self.default_state.set(state);
        self.last_switch_defaulted
            .set(self.defaulted.get().unwrap_or_default());
        self.defaulted.set(Vec::new());

        self.process_mintings();
        self.accumulate_dilution_factor();

        let reference_rate = self.current_dilution().reference_rate;
        self.env().emit_event(VaultSwitched {
            from: previous,
            to: vault,
            reference_rate,
        });
    }

    // ========== Internal Functions ==========

    fn ok_or_revert<T>(&self, result: Result<T, ManagerError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }

    fn require_role(&self, role: Role) {
        let caller = self.env().caller();
        let holder = match role {
            Role::Owner => self.owner.get(),
            Role::Pauser => self.pauser.get(),
        };
        if holder != Some(caller) {
            self.env().revert(ManagerError::Unauthorized);
        }
    }

    fn require_not_paused(&self) {
        if self.paused.get().unwrap_or(false) {
            self.env().revert(ManagerError::Paused);
        }
    }

    fn enter(&mut self) {
        if self.entered.get().unwrap_or(false) {
            self.env().revert(ManagerError::Reentrant);
        }
        self.entered.set(true);
    }

    fn exit(&mut self) {
        self.entered.set(false);
    }

    fn current_config(&self) -> ManagerConfig {
        self.config.get_or_revert_with(ManagerError::NotInitialized)
    }

    fn current_dilution(&self) -> DilutionState {
        self.dilution.get_or_revert_with(ManagerError::NotInitialized)
    }

    fn current_vault(&self) -> Address {
        self.vault.get_or_revert_with(ManagerError::NotInitialized)
    }

    fn token_ref(&self) -> TokenLedgerContractRef {
        TokenLedgerContractRef::new(self.env(), self.get_token())
    }

    fn vault_ref(&self, vault: Address) -> VaultContractRef {
        VaultContractRef::new(self.env(), vault)
    }

    fn latest_past_vault(&self) -> Option<Address> {
        match self.past_vault_count.get().unwrap_or(0) {
            0 => None,
            count => self.past_vaults.get(&(count - 1)),
        }
    }

    /// Oldest past vault still holding the manager's BUs, else the current one
    fn oldest_nonempty_vault(&self) -> Address {
        let manager = self.env().self_address();
        for index in 0..self.past_vault_count.get().unwrap_or(0) {
            if let Some(vault) = self.past_vaults.get(&index) {
                if !self.vault_ref(vault).basket_units(manager).is_zero() {
                    return vault;
                }
            }
        }
        self.current_vault()
    }

    /// Pull the collateral for `bus` BUs from `from` and approve `vault` for it
    fn pull_basket(&mut self, vault: Address, from: Address, bus: U256) {
        let manager = self.env().self_address();
        let vault_ref = self.vault_ref(vault);
        let amounts = vault_ref.token_amounts(bus);
        if amounts.len() != vault_ref.basket_size() as usize {
            self.env().revert(ManagerError::CollaboratorFailure);
        }
        for (index, amount) in amounts.iter().enumerate() {
            let collateral = vault_ref.collateral_at(index as u32);
            let mut collateral_ref = CollateralContractRef::new(self.env(), collateral);
            if !collateral_ref.transfer_from(from, manager, *amount) {
                self.env().revert(ManagerError::CollaboratorFailure);
            }
            if !collateral_ref.approve(vault, *amount) {
                self.env().revert(ManagerError::CollaboratorFailure);
            }
        }
    }

    /// Approve `vault` for the collateral behind `bus` BUs held by the manager
    fn approve_basket(&mut self, vault: Address, bus: U256) {
        let vault_ref = self.vault_ref(vault);
        let amounts = vault_ref.token_amounts(bus);
        for (index, amount) in amounts.iter().enumerate() {
            let collateral = vault_ref.collateral_at(index as u32);
            let mut collateral_ref = CollateralContractRef::new(self.env(), collateral);
            if !collateral_ref.approve(vault, *amount) {
                self.env().revert(ManagerError::CollaboratorFailure);
            }
        }
    }
}
