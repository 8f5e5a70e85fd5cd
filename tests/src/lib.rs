//! RToken Manager Integration Tests
//!
//! End-to-end scenarios on the Odra test VM: the manager wired to a real
//! token, two collateral tokens, a basket vault with one backup and a TWAP
//! oracle.

#[cfg(test)]
mod setup {
    use odra::casper_types::U256;
    use odra::host::{Deployer, HostEnv, HostRef};
    use odra::prelude::*;
    use rtoken_manager_contracts::collateral::{
        CollateralToken, CollateralTokenHostRef, CollateralTokenInitArgs,
    };
    use rtoken_manager_contracts::manager::{Manager, ManagerHostRef, ManagerInitArgs};
    use rtoken_manager_contracts::math::{scale, SCALE};
    use rtoken_manager_contracts::oracle::{TwapOracle, TwapOracleHostRef, TwapOracleInitArgs};
    use rtoken_manager_contracts::rtoken::{RToken, RTokenHostRef, RTokenInitArgs};
    use rtoken_manager_contracts::types::ManagerConfig;
    use rtoken_manager_contracts::vault::{BasketVault, BasketVaultHostRef, BasketVaultInitArgs};

    /// Block time per vesting block in the test config
    pub const BLOCK: u64 = 10;
    pub const SHORT_WINDOW: u64 = 60;
    pub const LONG_WINDOW: u64 = 600;
    pub const DEFAULT_DELAY: u64 = 1_200;
    pub const AUCTION_PERIOD: u64 = 600;

    pub fn tokens(n: u64) -> U256 {
        U256::from(n) * scale()
    }

    pub fn config() -> ManagerConfig {
        ManagerConfig {
            rewards_start: 0,
            rewards_period: 1_000,
            auction_period: AUCTION_PERIOD,
            staking_withdrawal_delay: 1_000,
            short_window: SHORT_WINDOW,
            long_window: LONG_WINDOW,
            default_delay: DEFAULT_DELAY,
            block_duration: BLOCK,
            max_auction_size: U256::from(SCALE / 100),
            issuance_rate: U256::from(SCALE / 4_000),
            default_threshold: U256::from(SCALE / 20),
            revenue_factor: U256::zero(),
        }
    }

    pub struct Fixture {
        pub env: HostEnv,
        pub admin: Address,
        pub alice: Address,
        pub bob: Address,
        /// Direct collateral, priced by the oracle
        pub usdx: CollateralTokenHostRef,
        /// Derivative of `usdx`
        pub cusdy: CollateralTokenHostRef,
        pub oracle: TwapOracleHostRef,
        /// 1 BU = 0.5 USDX + 0.5 cUSDY
        pub vault: BasketVaultHostRef,
        /// 1 BU = 1 USDX
        pub backup: BasketVaultHostRef,
        pub rtoken: RTokenHostRef,
        pub manager: ManagerHostRef,
    }

    pub fn setup() -> Fixture {
        let env = odra_test::env();
        let admin = env.get_account(0);
        let alice = env.get_account(1);
        let bob = env.get_account(2);
        env.set_caller(admin);

        let mut usdx = CollateralToken::deploy(
            &env,
            CollateralTokenInitArgs {
                name: String::from("USD X"),
                symbol: String::from("USDX"),
                decimals: 18,
                underlying: None,
            },
        );
        let usdx_addr = usdx.address().clone();

        let mut cusdy = CollateralToken::deploy(
            &env,
            CollateralTokenInitArgs {
                name: String::from("Compound USD Y"),
                symbol: String::from("cUSDY"),
                decimals: 18,
                underlying: Some(usdx_addr),
            },
        );
        let cusdy_addr = cusdy.address().clone();

        let mut oracle = TwapOracle::deploy(&env, TwapOracleInitArgs { feeder: admin });
        oracle.post_price(usdx_addr, scale());

        let half = scale() / U256::from(2u64);
        let mut vault = BasketVault::deploy(
            &env,
            BasketVaultInitArgs {
                collaterals: vec![usdx_addr, cusdy_addr],
                quantities: vec![half, half],
            },
        );
        let backup = BasketVault::deploy(
            &env,
            BasketVaultInitArgs {
                collaterals: vec![usdx_addr],
                quantities: vec![scale()],
            },
        );
        vault.set_backups(vec![backup.address().clone()]);

        let mut rtoken = RToken::deploy(
            &env,
            RTokenInitArgs {
                name: String::from("Basket Dollar"),
                symbol: String::from("BUSD"),
            },
        );
        let manager = Manager::deploy(
            &env,
            ManagerInitArgs {
                token: rtoken.address().clone(),
                vault: vault.address().clone(),
                oracle: oracle.address().clone(),
                config: config(),
            },
        );
        rtoken.set_manager(manager.address().clone());

        for holder in [alice, bob] {
            usdx.mint(holder, tokens(100_000_000));
            cusdy.mint(holder, tokens(100_000_000));
        }

        Fixture {
            env,
            admin,
            alice,
            bob,
            usdx,
            cusdy,
            oracle,
            vault,
            backup,
            rtoken,
            manager,
        }
    }

    impl Fixture {
        pub fn manager_addr(&self) -> Address {
            self.manager.address().clone()
        }

        pub fn vault_addr(&self) -> Address {
            self.vault.address().clone()
        }

        pub fn backup_addr(&self) -> Address {
            self.backup.address().clone()
        }

        pub fn usdx_addr(&self) -> Address {
            self.usdx.address().clone()
        }

        pub fn cusdy_addr(&self) -> Address {
            self.cusdy.address().clone()
        }

        /// Approve the quoted collateral and queue a slow minting
        pub fn issue(&mut self, who: Address, amount: U256) {
            self.env.set_caller(who);
            let quote = self.manager.quote_issue(amount);
            let manager = self.manager_addr();
            self.usdx.approve(manager, quote[0]);
            self.cusdy.approve(manager, quote[1]);
            self.manager.issue(amount);
            self.env.set_caller(self.admin);
        }

        /// Issue, wait for the record to vest and poke it through
        pub fn issue_and_vest(&mut self, who: Address, amount: U256) {
            self.issue(who, amount);
            let index = self.manager.minting_count() - 1;
            if let Some(record) = self.manager.get_minting(index) {
                self.advance_to(record.available_at);
            }
            self.manager.poke();
        }

        pub fn advance_to(&self, time: u64) {
            let now = self.env.block_time();
            if time > now {
                self.env.advance_block_time(time - now);
            }
        }

        /// Move the cUSDY redemption rate (admin is the operator)
        pub fn set_cusdy_rate(&mut self, rate: U256) {
            self.env.set_caller(self.admin);
            self.cusdy.set_redemption_rate(rate);
        }
    }
}

#[cfg(test)]
mod issuance_tests {
    use super::setup::*;
    use odra::prelude::Addressable;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::errors::ManagerError;
    use rtoken_manager_contracts::math::scale;
    use rtoken_manager_contracts::slow_minting::MintingStatus;

    #[test]
    fn test_issue_escrows_until_vested() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let usdx_before = f.usdx.balance_of(alice);
        let start = f.env.block_time();

        f.issue(alice, tokens(100));

        let record = f.manager.get_minting(0).unwrap();
        assert_eq!(record.status, MintingStatus::Pending);
        assert_eq!(record.bus, tokens(100));
        assert_eq!(record.available_at, start + BLOCK);
        assert_eq!(f.manager.escrowed(), tokens(100));
        assert_eq!(f.rtoken.balance_of(alice), U256::zero());
        assert_eq!(f.rtoken.balance_of(manager), tokens(100));
        assert_eq!(f.vault.basket_units(manager), tokens(100));
        assert_eq!(f.usdx.balance_of(alice), usdx_before - tokens(50));

        f.advance_to(record.available_at);
        f.manager.poke();

        let record = f.manager.get_minting(0).unwrap();
        assert_eq!(record.status, MintingStatus::Completed);
        assert_eq!(f.manager.escrowed(), U256::zero());
        assert_eq!(f.rtoken.balance_of(alice), tokens(100));
        assert_eq!(f.rtoken.balance_of(manager), U256::zero());
        assert!(f.manager.is_fully_collateralized());
    }

    #[test]
    fn test_zero_revenue_factor_keeps_dilution_at_scale() {
        let mut f = setup();
        let alice = f.alice;

        f.issue(alice, tokens(1_000_000));
        f.manager.poke();

        assert_eq!(f.manager.basket_dilution_ratio(), scale());
        let melting_ratio = f.manager.melting_ratio();
        assert_eq!(
            f.manager.to_bus(tokens(1_000_000)),
            tokens(1_000_000) * melting_ratio / scale()
        );
    }

    #[test]
    fn test_small_supply_vests_at_issuance_floor() {
        let mut f = setup();
        let alice = f.alice;
        let start = f.env.block_time();

        // Proportional rate is zero; the 10,000-token floor applies
        f.issue(alice, tokens(10_000_000));
        let first = f.manager.get_minting(0).unwrap();
        assert_eq!(first.available_at, start + 1_000 * BLOCK);

        // Queued behind the first record
        f.issue(alice, tokens(10_000));
        let second = f.manager.get_minting(1).unwrap();
        assert_eq!(second.available_at, first.available_at + BLOCK);
    }

    #[test]
    fn test_mintings_complete_in_index_order() {
        let mut f = setup();
        let alice = f.alice;
        let bob = f.bob;

        f.issue(alice, tokens(20_000));
        f.issue(bob, tokens(5_000));
        let first = f.manager.get_minting(0).unwrap();
        let second = f.manager.get_minting(1).unwrap();
        assert!(second.available_at > first.available_at);

        f.advance_to(first.available_at);
        f.manager.poke();
        assert_eq!(f.manager.get_minting(0).unwrap().status, MintingStatus::Completed);
        assert_eq!(f.manager.get_minting(1).unwrap().status, MintingStatus::Pending);
        assert_eq!(f.rtoken.balance_of(bob), U256::zero());

        f.advance_to(second.available_at);
        f.manager.poke();
        assert_eq!(f.manager.get_minting(1).unwrap().status, MintingStatus::Completed);
        assert_eq!(f.rtoken.balance_of(bob), tokens(5_000));

        // Re-processing terminal records is a no-op
        f.manager.poke();
        assert_eq!(f.rtoken.balance_of(alice), tokens(20_000));
        assert_eq!(f.rtoken.balance_of(bob), tokens(5_000));
    }

    #[test]
    fn test_issue_deposit_rounds_up() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        f.issue_and_vest(alice, tokens(3));

        // One token of revenue melts: 3 BUs now back 2 tokens
        f.env.set_caller(alice);
        f.rtoken.transfer(manager, tokens(1));
        f.env.set_caller(f.admin);
        f.manager.poke();
        assert_eq!(
            f.manager.melting_ratio(),
            scale() * U256::from(3u64) / U256::from(2u64)
        );

        f.issue(alice, U256::one());
        f.issue(alice, U256::one());
        assert_eq!(f.manager.get_minting(1).unwrap().bus, U256::from(2u64));
        assert_eq!(f.rtoken.total_supply(), tokens(2) + U256::from(2u64));
        assert_eq!(f.vault.basket_units(manager), tokens(3) + U256::from(4u64));
        assert!(f.manager.is_fully_collateralized());

        f.manager.poke();
        assert_eq!(f.manager.auction_count(), 0);
    }

    #[test]
    fn test_issue_zero_rejected() {
        let mut f = setup();
        f.env.set_caller(f.alice);
        assert_eq!(
            f.manager.try_issue(U256::zero()),
            Err(ManagerError::InvalidAmount.into())
        );
        assert_eq!(
            f.manager.try_quote_issue(U256::zero()),
            Err(ManagerError::InvalidAmount.into())
        );
        assert_eq!(f.manager.minting_count(), 0);
    }

    #[test]
    fn test_issue_without_allowance_leaves_no_trace() {
        let mut f = setup();
        f.env.set_caller(f.alice);
        assert!(f.manager.try_issue(tokens(100)).is_err());
        assert_eq!(f.manager.minting_count(), 0);
        assert_eq!(f.rtoken.total_supply(), U256::zero());
    }

    #[test]
    fn test_faucet_revenue_melts_into_ratio() {
        use odra::host::{Deployer, HostRef};
        use rtoken_manager_contracts::faucet::{RevenueFaucet, RevenueFaucetInitArgs};

        let mut f = setup();
        let alice = f.alice;
        f.issue_and_vest(alice, tokens(100));

        let faucet = RevenueFaucet::deploy(
            &f.env,
            RevenueFaucetInitArgs {
                token: f.rtoken.address().clone(),
                beneficiary: f.manager_addr(),
                period: 1_000,
            },
        );
        let faucet_addr = faucet.address().clone();
        f.manager.set_faucet(Some(faucet_addr));

        f.env.set_caller(alice);
        f.rtoken.transfer(faucet_addr, tokens(10));
        f.env.set_caller(f.admin);

        f.env.advance_block_time(1_000);
        f.manager.poke();

        assert_eq!(f.rtoken.balance_of(faucet_addr), U256::zero());
        assert_eq!(f.rtoken.total_supply(), tokens(90));
        assert_eq!(f.manager.get_dilution().melted, tokens(10));
        assert_eq!(
            f.manager.melting_ratio(),
            scale() * U256::from(100u64) / U256::from(90u64)
        );
        assert!(f.manager.is_fully_collateralized());
        assert!(f.manager.to_bus(tokens(90)) <= tokens(100));
    }
}

#[cfg(test)]
mod redemption_tests {
    use super::setup::*;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::errors::ManagerError;

    #[test]
    fn test_redeem_zero_fails_and_leaves_balances_unchanged() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        f.issue_and_vest(alice, tokens(100));

        let balance = f.rtoken.balance_of(alice);
        let supply = f.rtoken.total_supply();
        let units = f.vault.basket_units(manager);
        let usdx = f.usdx.balance_of(alice);

        f.env.set_caller(alice);
        assert_eq!(
            f.manager.try_redeem(U256::zero()),
            Err(ManagerError::InvalidAmount.into())
        );
        assert_eq!(
            f.manager.try_quote_redeem(U256::zero()),
            Err(ManagerError::InvalidAmount.into())
        );

        assert_eq!(f.rtoken.balance_of(alice), balance);
        assert_eq!(f.rtoken.total_supply(), supply);
        assert_eq!(f.vault.basket_units(manager), units);
        assert_eq!(f.usdx.balance_of(alice), usdx);
    }

    #[test]
    fn test_redeem_burns_and_returns_collateral() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        f.issue_and_vest(alice, tokens(100));

        let usdx_before = f.usdx.balance_of(alice);
        let cusdy_before = f.cusdy.balance_of(alice);

        f.env.set_caller(alice);
        assert_eq!(f.manager.quote_redeem(tokens(40)), vec![tokens(20), tokens(20)]);
        f.manager.redeem(tokens(40));

        assert_eq!(f.rtoken.balance_of(alice), tokens(60));
        assert_eq!(f.rtoken.total_supply(), tokens(60));
        assert_eq!(f.vault.basket_units(manager), tokens(60));
        assert_eq!(f.usdx.balance_of(alice), usdx_before + tokens(20));
        assert_eq!(f.cusdy.balance_of(alice), cusdy_before + tokens(20));
    }

    #[test]
    fn test_redeem_beyond_balance_reverts_atomically() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        f.issue_and_vest(alice, tokens(100));

        f.env.set_caller(alice);
        assert_eq!(
            f.manager.try_redeem(tokens(101)),
            Err(ManagerError::InsufficientTokenBalance.into())
        );
        assert_eq!(f.rtoken.balance_of(alice), tokens(100));
        assert_eq!(f.vault.basket_units(manager), tokens(100));
    }
}

#[cfg(test)]
mod access_tests {
    use super::setup::*;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::errors::ManagerError;
    use rtoken_manager_contracts::math::{scale, SCALE};

    #[test]
    fn test_pause_blocks_state_changing_entry_points() {
        let mut f = setup();
        let alice = f.alice;
        f.issue_and_vest(alice, tokens(100));

        f.manager.pause();
        assert!(f.manager.is_paused());

        f.env.set_caller(alice);
        assert_eq!(f.manager.try_issue(tokens(1)), Err(ManagerError::Paused.into()));
        assert_eq!(f.manager.try_redeem(tokens(1)), Err(ManagerError::Paused.into()));
        assert_eq!(f.manager.try_poke(), Err(ManagerError::Paused.into()));
        assert_eq!(f.manager.try_detect_default(), Err(ManagerError::Paused.into()));

        // Quotes stay available
        assert_eq!(f.manager.quote_issue(tokens(2)), vec![tokens(1), tokens(1)]);

        f.env.set_caller(f.admin);
        f.manager.unpause();
        f.env.set_caller(alice);
        f.manager.redeem(tokens(1));
        assert_eq!(f.rtoken.balance_of(alice), tokens(99));
    }

    #[test]
    fn test_only_pauser_toggles_gate() {
        let mut f = setup();
        let bob = f.bob;

        f.env.set_caller(f.alice);
        assert_eq!(f.manager.try_pause(), Err(ManagerError::Unauthorized.into()));

        f.env.set_caller(f.admin);
        f.manager.set_pauser(bob);
        assert_eq!(f.manager.get_pauser(), bob);
        assert_eq!(f.manager.try_pause(), Err(ManagerError::Unauthorized.into()));

        f.env.set_caller(bob);
        f.manager.pause();
        assert!(f.manager.is_paused());
    }

    #[test]
    fn test_configuration_is_owner_only() {
        let mut f = setup();
        let backup = f.backup_addr();
        let alice = f.alice;

        f.env.set_caller(alice);
        let denied = ManagerError::Unauthorized;
        assert_eq!(f.manager.try_set_config(config()), Err(denied.into()));
        assert_eq!(f.manager.try_set_vault(backup), Err(denied.into()));
        assert_eq!(f.manager.try_set_pauser(alice), Err(denied.into()));
        assert_eq!(f.manager.try_set_faucet(None), Err(denied.into()));
        assert_eq!(f.manager.try_set_auction_executor(None), Err(denied.into()));
        assert_eq!(f.manager.get_vault(), f.vault_addr());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut f = setup();
        let mut invalid = config();
        invalid.short_window = invalid.long_window + 1;
        assert_eq!(
            f.manager.try_set_config(invalid),
            Err(ManagerError::InvalidConfig.into())
        );

        let mut invalid = config();
        invalid.revenue_factor = scale() + U256::one();
        assert_eq!(
            f.manager.try_set_config(invalid),
            Err(ManagerError::InvalidConfig.into())
        );
    }

    #[test]
    fn test_revenue_factor_change_rebaselines_dilution() {
        let mut f = setup();
        let mut updated = config();
        updated.revenue_factor = U256::from(SCALE / 2);
        f.manager.set_config(updated.clone());
        assert_eq!(f.manager.get_config(), updated);
        assert_eq!(f.manager.get_dilution().reference_rate, f.vault.basket_rate());

        // Basket appreciates 10%; half of it is skimmed
        f.set_cusdy_rate(scale() * U256::from(12u64) / U256::from(10u64));
        f.manager.poke();
        assert_eq!(
            f.manager.basket_dilution_ratio(),
            scale() + scale() / U256::from(20u64)
        );
    }

    #[test]
    fn test_only_manager_mints_tokens() {
        let mut f = setup();
        f.env.set_caller(f.alice);
        assert_eq!(
            f.rtoken.try_mint(f.alice, tokens(1)),
            Err(ManagerError::Unauthorized.into())
        );
    }

    #[test]
    fn test_oracle_without_observations_is_unavailable() {
        let mut f = setup();
        let bob = f.bob;
        assert_eq!(
            f.oracle.try_consult(bob, SHORT_WINDOW),
            Err(ManagerError::OraclePriceUnavailable.into())
        );

        f.env.set_caller(f.alice);
        assert_eq!(
            f.oracle.try_post_price(bob, scale()),
            Err(ManagerError::Unauthorized.into())
        );
    }
}

#[cfg(test)]
mod default_tests {
    use super::setup::*;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::math::scale;
    use rtoken_manager_contracts::types::DefaultStatus;

    fn rate(tenths: u64) -> U256 {
        scale() * U256::from(tenths) / U256::from(10u64)
    }

    #[test]
    fn test_redemption_rate_drop_suspects_default() {
        let mut f = setup();
        let cusdy = f.cusdy_addr();

        f.manager.detect_default();
        assert_eq!(f.manager.default_status(), DefaultStatus::Sound);
        assert_eq!(f.manager.last_redemption_rate(cusdy), Some(scale()));

        f.set_cusdy_rate(rate(9));
        f.manager.detect_default();

        assert_eq!(f.manager.default_status(), DefaultStatus::ShortDefaultSuspected);
        assert_eq!(f.manager.defaulted_tokens(), vec![cusdy]);
        let state = f.manager.get_default_state();
        assert!(state.in_default);
        assert_eq!(state.last_default, f.env.block_time());
    }

    #[test]
    fn test_default_clears_after_clean_long_window() {
        let mut f = setup();

        f.manager.detect_default();
        f.set_cusdy_rate(rate(9));
        f.manager.detect_default();
        let suspected_at = f.env.block_time();

        // Throttled before the long window elapses
        f.env.advance_block_time(LONG_WINDOW / 2);
        f.manager.detect_default();
        assert_eq!(f.manager.default_status(), DefaultStatus::ShortDefaultSuspected);

        // Rate recovered before the long re-scan
        f.advance_to(suspected_at + LONG_WINDOW);
        f.set_cusdy_rate(rate(10));
        f.manager.detect_default();
        assert_eq!(f.manager.default_status(), DefaultStatus::Sound);
        assert!(f.manager.defaulted_tokens().is_empty());
    }

    #[test]
    fn test_single_rate_collapse_switches_vault() {
        let mut f = setup();
        let cusdy = f.cusdy_addr();
        let backup = f.backup_addr();

        f.manager.detect_default();
        f.set_cusdy_rate(rate(5));
        f.manager.detect_default();
        let suspected_at = f.env.block_time();
        assert_eq!(f.manager.last_redemption_rate(cusdy), Some(scale()));

        // The rate never moves again
        f.advance_to(suspected_at + LONG_WINDOW);
        f.manager.detect_default();
        assert_eq!(f.manager.default_status(), DefaultStatus::LongDefaultConfirmed);
        assert_eq!(f.manager.defaulted_tokens(), vec![cusdy]);

        f.advance_to(suspected_at + DEFAULT_DELAY);
        f.manager.detect_default();
        assert_eq!(f.manager.get_vault(), backup);
        assert_eq!(f.manager.last_switch_defaulted(), vec![cusdy]);
    }

    #[test]
    fn test_price_drop_flags_underlying_and_derivative() {
        let mut f = setup();
        let usdx = f.usdx_addr();
        let cusdy = f.cusdy_addr();
        assert_eq!(f.cusdy.underlying(), usdx);
        assert_eq!(f.cusdy.wrapped(), cusdy);
        assert!(!f.cusdy.is_direct());

        f.env.advance_block_time(100);
        f.oracle.post_price(usdx, rate(9));
        f.env.advance_block_time(SHORT_WINDOW + 40);
        f.manager.detect_default();

        assert_eq!(f.manager.default_status(), DefaultStatus::ShortDefaultSuspected);
        assert_eq!(f.manager.defaulted_tokens(), vec![usdx, cusdy]);
    }

    #[test]
    fn test_confirmed_default_switches_to_backup() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let original = f.vault_addr();
        let backup = f.backup_addr();
        let cusdy = f.cusdy_addr();
        f.issue_and_vest(alice, tokens(100));

        f.manager.detect_default();
        f.set_cusdy_rate(rate(9));
        f.manager.detect_default();
        let suspected_at = f.env.block_time();

        // Still defaulting after the long window, but the delay is not over
        f.advance_to(suspected_at + LONG_WINDOW);
        f.set_cusdy_rate(rate(8));
        f.manager.detect_default();
        assert_eq!(f.manager.default_status(), DefaultStatus::LongDefaultConfirmed);
        assert_eq!(f.manager.get_vault(), original);

        f.advance_to(suspected_at + DEFAULT_DELAY);
        f.set_cusdy_rate(rate(7));
        f.manager.detect_default();

        assert_eq!(f.manager.get_vault(), backup);
        assert_eq!(f.manager.past_vault_count(), 1);
        assert_eq!(f.manager.past_vault_at(0), Some(original));
        assert_eq!(f.manager.default_status(), DefaultStatus::Sound);
        assert!(f.manager.defaulted_tokens().is_empty());
        assert_eq!(f.manager.last_switch_defaulted(), vec![cusdy]);

        let dilution = f.manager.get_dilution();
        assert_eq!(dilution.current_basket_dilution, scale());
        assert_eq!(dilution.reference_rate, f.backup.basket_rate());

        // Redemptions drain the retired basket first
        f.env.set_caller(alice);
        f.manager.redeem(tokens(10));
        assert_eq!(f.vault.basket_units(manager), tokens(90));
        assert_eq!(f.backup.basket_units(manager), U256::zero());
    }

    #[test]
    fn test_switch_without_sound_backup_keeps_vault() {
        let mut f = setup();
        let usdx = f.usdx_addr();
        let original = f.vault_addr();

        // USDX backs both baskets, so the backup fails its scan too
        f.env.advance_block_time(100);
        f.oracle.post_price(usdx, rate(9));
        f.env.advance_block_time(100);
        f.manager.detect_default();
        let suspected_at = f.env.block_time();

        f.advance_to(suspected_at + DEFAULT_DELAY);
        f.manager.detect_default();

        assert_eq!(f.manager.default_status(), DefaultStatus::LongDefaultConfirmed);
        assert_eq!(f.manager.get_vault(), original);
        assert_eq!(f.manager.past_vault_count(), 0);
    }
}

#[cfg(test)]
mod vault_switch_tests {
    use super::setup::*;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::auction::AuctionStatus;
    use rtoken_manager_contracts::math::scale;
    use rtoken_manager_contracts::slow_minting::MintingStatus;

    #[test]
    fn test_switch_rolls_back_pending_mintings() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let backup = f.backup_addr();
        let usdx_before = f.usdx.balance_of(alice);
        let cusdy_before = f.cusdy.balance_of(alice);

        f.issue(alice, tokens(100));
        f.manager.set_vault(backup);

        let record = f.manager.get_minting(0).unwrap();
        assert_eq!(record.status, MintingStatus::Reverted);
        assert_eq!(f.manager.escrowed(), U256::zero());
        assert_eq!(f.rtoken.total_supply(), U256::zero());
        assert_eq!(f.rtoken.balance_of(alice), U256::zero());
        assert_eq!(f.vault.basket_units(manager), U256::zero());
        assert_eq!(f.usdx.balance_of(alice), usdx_before);
        assert_eq!(f.cusdy.balance_of(alice), cusdy_before);

        // Later pokes leave the reverted record alone
        f.env.advance_block_time(BLOCK);
        f.manager.poke();
        assert_eq!(f.manager.get_minting(0).unwrap().status, MintingStatus::Reverted);
        assert_eq!(f.rtoken.balance_of(alice), U256::zero());
    }

    #[test]
    fn test_manual_switch_rebaselines_dilution() {
        let mut f = setup();
        let backup = f.backup_addr();
        f.manager.set_vault(backup);

        assert_eq!(f.manager.get_vault(), backup);
        assert_eq!(f.manager.past_vault_at(0), Some(f.vault_addr()));
        let dilution = f.manager.get_dilution();
        assert_eq!(dilution.current_basket_dilution, scale());
        assert_eq!(dilution.reference_rate, f.backup.basket_rate());
    }

    #[test]
    fn test_poke_migrates_residual_and_opens_auction() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let backup = f.backup_addr();
        f.issue_and_vest(alice, tokens(100));
        f.manager.set_vault(backup);

        // 1% of supply moves per poke; half of it is reissuable in USDX
        f.manager.poke();
        assert_eq!(f.vault.basket_units(manager), tokens(99));
        assert_eq!(f.backup.basket_units(manager), tokens(1) / U256::from(2u64));
        assert_eq!(f.manager.auction_count(), 1);
        let auction = f.manager.get_auction(0).unwrap();
        assert_eq!(auction.status, AuctionStatus::Open);
        assert_eq!(auction.vault, backup);
        assert_eq!(auction.deficit, tokens(100) - tokens(1) / U256::from(2u64));
        assert_eq!(auction.end_at, f.env.block_time() + AUCTION_PERIOD);

        // A running auction blocks further work
        f.manager.poke();
        assert_eq!(f.manager.auction_count(), 1);
        assert_eq!(f.vault.basket_units(manager), tokens(99));

        f.advance_to(auction.end_at);
        f.manager.poke();
        assert_eq!(f.manager.get_auction(0).unwrap().status, AuctionStatus::Closed);
        assert_eq!(f.manager.auction_count(), 2);
        assert_eq!(f.manager.get_auction(1).unwrap().status, AuctionStatus::Open);
        assert_eq!(f.vault.basket_units(manager), tokens(98));
        assert_eq!(f.backup.basket_units(manager), tokens(1));
    }

    #[test]
    fn test_melting_ratio_never_decreases() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let backup = f.backup_addr();
        let mut seen = vec![f.manager.melting_ratio()];

        f.issue_and_vest(alice, tokens(100));
        seen.push(f.manager.melting_ratio());

        f.env.set_caller(alice);
        f.rtoken.transfer(manager, tokens(10));
        f.env.set_caller(f.admin);
        f.manager.poke();
        seen.push(f.manager.melting_ratio());

        f.env.set_caller(alice);
        f.manager.redeem(tokens(30));
        f.env.set_caller(f.admin);
        seen.push(f.manager.melting_ratio());

        // Pending minting is rolled back by the switch
        f.issue(alice, tokens(10));
        f.manager.set_vault(backup);
        seen.push(f.manager.melting_ratio());

        f.manager.poke();
        seen.push(f.manager.melting_ratio());

        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(seen.last() > seen.first());
    }

    #[test]
    fn test_fully_backed_poke_opens_no_auction() {
        let mut f = setup();
        let alice = f.alice;
        f.issue_and_vest(alice, tokens(100));
        f.manager.poke();
        assert_eq!(f.manager.auction_count(), 0);
    }
}

#[cfg(test)]
mod executor {
    use odra::casper_types::U256;
    use odra::prelude::*;
    use odra::ContractRef;
    use rtoken_manager_contracts::manager::ManagerContractRef;

    /// Auction executor that records launches and can call back into a manager
    #[odra::module]
    pub struct RecordingExecutor {
        launches: Var<u32>,
        last_vault: Var<Option<Address>>,
        last_deficit: Var<U256>,
        last_end_at: Var<u64>,
        callback: Var<Option<Address>>,
    }

    #[odra::module]
    impl RecordingExecutor {
        pub fn init(&mut self, callback: Option<Address>) {
            self.callback.set(callback);
        }

        pub fn launch(&mut self, vault: Address, deficit: U256, end_at: u64) {
            self.launches.set(self.launch_count() + 1);
            self.last_vault.set(Some(vault));
            self.last_deficit.set(deficit);
            self.last_end_at.set(end_at);
            if let Some(manager) = self.callback.get().flatten() {
                ManagerContractRef::new(self.env(), manager).poke();
            }
        }

        pub fn launch_count(&self) -> u32 {
            self.launches.get().unwrap_or(0)
        }

        pub fn last_vault(&self) -> Option<Address> {
            self.last_vault.get().flatten()
        }

        pub fn last_deficit(&self) -> U256 {
            self.last_deficit.get().unwrap_or_default()
        }

        pub fn last_end_at(&self) -> u64 {
            self.last_end_at.get().unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod executor_tests {
    use super::executor::{RecordingExecutor, RecordingExecutorInitArgs};
    use super::setup::*;
    use odra::prelude::Addressable;
    use odra::host::{Deployer, HostRef};
    use pretty_assertions::assert_eq;
    use rtoken_manager_contracts::errors::ManagerError;

    #[test]
    fn test_opened_auction_is_launched_on_executor() {
        let mut f = setup();
        let alice = f.alice;
        let backup = f.backup_addr();
        f.issue_and_vest(alice, tokens(100));

        let executor = RecordingExecutor::deploy(
            &f.env,
            RecordingExecutorInitArgs { callback: None },
        );
        f.manager.set_auction_executor(Some(executor.address().clone()));
        f.manager.set_vault(backup);
        assert_eq!(executor.launch_count(), 0);

        f.manager.poke();
        let auction = f.manager.get_auction(0).unwrap();
        assert_eq!(executor.launch_count(), 1);
        assert_eq!(executor.last_vault(), Some(backup));
        assert_eq!(executor.last_deficit(), auction.deficit);
        assert_eq!(executor.last_end_at(), auction.end_at);

        // A running auction is not launched again
        f.manager.poke();
        assert_eq!(executor.launch_count(), 1);
    }

    #[test]
    fn test_nested_entry_reverts_whole_call() {
        let mut f = setup();
        let alice = f.alice;
        let manager = f.manager_addr();
        let backup = f.backup_addr();
        f.issue_and_vest(alice, tokens(100));

        let executor = RecordingExecutor::deploy(
            &f.env,
            RecordingExecutorInitArgs { callback: Some(manager) },
        );
        f.manager.set_auction_executor(Some(executor.address().clone()));
        f.manager.set_vault(backup);

        assert_eq!(f.manager.try_poke(), Err(ManagerError::Reentrant.into()));
        assert_eq!(f.manager.auction_count(), 0);
        assert_eq!(executor.launch_count(), 0);
        assert_eq!(f.vault.basket_units(manager), tokens(100));
    }
}
