//! Deploy the manager and its reference collaborators to Casper livenet/testnet.
//!
//! Usage:
//!   cargo run --bin deploy_livenet --release
//!
//! Requires .env file with:
//!   ODRA_CASPER_LIVENET_SECRET_KEY_PATH=/path/to/secret_key.pem
//!   ODRA_CASPER_LIVENET_NODE_ADDRESS=https://node.testnet.casper.network
//!   ODRA_CASPER_LIVENET_CHAIN_NAME=casper-test
//!   ODRA_CASPER_LIVENET_PAYMENT_AMOUNT=200000000000
//!
//! Optional overrides:
//!   RTOKEN_NAME, RTOKEN_SYMBOL, RTOKEN_FAUCET_PERIOD

use odra::casper_types::U256;
use odra::host::{Deployer, HostRef};
use odra::prelude::*;

use rtoken_manager_contracts::collateral::{CollateralToken, CollateralTokenInitArgs};
use rtoken_manager_contracts::faucet::{RevenueFaucet, RevenueFaucetInitArgs};
use rtoken_manager_contracts::manager::{Manager, ManagerInitArgs};
use rtoken_manager_contracts::math::SCALE;
use rtoken_manager_contracts::oracle::{TwapOracle, TwapOracleInitArgs};
use rtoken_manager_contracts::rtoken::{RToken, RTokenInitArgs};
use rtoken_manager_contracts::types::ManagerConfig;
use rtoken_manager_contracts::vault::{BasketVault, BasketVaultInitArgs};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() {
    // Load environment from .env file
    dotenv::dotenv().ok();

    println!("=== RToken Manager Livenet Deployment ===");
    println!();

    let env = odra_casper_livenet_env::env();

    let payment_amount: u64 = env_or("ODRA_CASPER_LIVENET_PAYMENT_AMOUNT", 200_000_000_000);
    env.set_gas(payment_amount);

    let deployer = env.caller();
    println!("Deployer: {:?}", deployer);
    println!();

    let name: String = env_or("RTOKEN_NAME", String::from("Basket Dollar"));
    let symbol: String = env_or("RTOKEN_SYMBOL", String::from("BUSD"));
    let faucet_period: u64 = env_or("RTOKEN_FAUCET_PERIOD", 604_800_000);

    // Block time is in milliseconds
    let now: u64 = env.block_time();
    let config = ManagerConfig {
        rewards_start: now,
        rewards_period: 604_800_000, // 1 week
        auction_period: 1_800_000, // 30 min
        staking_withdrawal_delay: 1_209_600_000, // 2 weeks
        short_window: 3_600_000, // 1 hour
        long_window: 86_400_000, // 1 day
        default_delay: 86_400_000, // 1 day
        block_duration: 16_384, // ~16s per vesting block
        max_auction_size: U256::from(SCALE / 100), // 1%
        issuance_rate: U256::from(SCALE / 4_000), // 0.025% per block
        default_threshold: U256::from(SCALE / 20), // 5%
        revenue_factor: U256::zero(),
    };

    // ==================== Phase 1: Assets ====================
    println!("=== Phase 1: Deploying Assets ===");
    println!();

    println!("Deploying CollateralToken (USDX)...");
    let mut usdx = CollateralToken::deploy(
        &env,
        CollateralTokenInitArgs {
            name: String::from("USD X"),
            symbol: String::from("USDX"),
            decimals: 6,
            underlying: None,
        },
    );
    let usdx_addr = usdx.address().clone();
    println!("USDX deployed at: {:?}", usdx_addr);

    println!("Deploying CollateralToken (cUSDY)...");
    let cusdy = CollateralToken::deploy(
        &env,
        CollateralTokenInitArgs {
            name: String::from("Compound USD Y"),
            symbol: String::from("cUSDY"),
            decimals: 8,
            underlying: Some(usdx_addr),
        },
    );
    let cusdy_addr = cusdy.address().clone();
    println!("cUSDY deployed at: {:?}", cusdy_addr);

    println!("Deploying TwapOracle...");
    let mut oracle = TwapOracle::deploy(&env, TwapOracleInitArgs { feeder: deployer });
    let oracle_addr = oracle.address().clone();
    println!("TwapOracle deployed at: {:?}", oracle_addr);

    println!();

    // ==================== Phase 2: Basket ====================
    println!("=== Phase 2: Deploying Basket Vault ===");
    println!();

    // 1 BU = 0.5 USDX + 0.5 cUSDY
    println!("Deploying BasketVault...");
    let vault = BasketVault::deploy(
        &env,
        BasketVaultInitArgs {
            collaterals: vec![usdx_addr, cusdy_addr],
            quantities: vec![U256::from(500_000u64), U256::from(50_000_000u64)],
        },
    );
    let vault_addr = vault.address().clone();
    println!("BasketVault deployed at: {:?}", vault_addr);

    println!();

    // ==================== Phase 3: Token and Manager ====================
    println!("=== Phase 3: Deploying Token and Manager ===");
    println!();

    println!("Deploying RToken ({})...", symbol);
    let mut rtoken = RToken::deploy(&env, RTokenInitArgs { name, symbol });
    let rtoken_addr = rtoken.address().clone();
    println!("RToken deployed at: {:?}", rtoken_addr);

    println!("Deploying Manager...");
    let mut manager = Manager::deploy(
        &env,
        ManagerInitArgs {
            token: rtoken_addr,
            vault: vault_addr,
            oracle: oracle_addr,
            config,
        },
    );
    let manager_addr = manager.address().clone();
    println!("Manager deployed at: {:?}", manager_addr);

    println!("Deploying RevenueFaucet...");
    let faucet = RevenueFaucet::deploy(
        &env,
        RevenueFaucetInitArgs {
            token: rtoken_addr,
            beneficiary: manager_addr,
            period: faucet_period,
        },
    );
    let faucet_addr = faucet.address().clone();
    println!("RevenueFaucet deployed at: {:?}", faucet_addr);

    println!();

    // ==================== Phase 4: Wiring ====================
    println!("=== Phase 4: Cross-contract Configuration ===");
    println!();

    println!("Configuring RToken -> Manager link...");
    rtoken.set_manager(manager_addr);
    println!("Done.");

    println!("Configuring Manager -> RevenueFaucet link...");
    manager.set_faucet(Some(faucet_addr));
    println!("Done.");

    println!("Seeding oracle prices at peg...");
    oracle.post_price(usdx_addr, U256::from(SCALE));
    println!("Done.");

    println!("Provisioning deployer with USDX...");
    usdx.mint(deployer, U256::from(1_000_000_000_000u64));
    println!("Done.");

    println!();
    println!("=== Deployment Complete ===");
    println!();
    println!("Contract Addresses:");
    println!("  RToken:         {:?}", rtoken_addr);
    println!("  Manager:        {:?}", manager_addr);
    println!("  BasketVault:    {:?}", vault_addr);
    println!("  TwapOracle:     {:?}", oracle_addr);
    println!("  RevenueFaucet:  {:?}", faucet_addr);
    println!("  USDX:           {:?}", usdx_addr);
    println!("  cUSDY:          {:?}", cusdy_addr);
}
