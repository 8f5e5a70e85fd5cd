//! CEP-18 named-key mirror shared by the token modules.
//!
//! Wallets and explorers read balances from the standard `balances` and
//! `allowances` dictionaries keyed by the base64 of the serialized `Key`.

use odra::prelude::*;
use odra::casper_types::{U256, Key};
use odra::casper_types::bytesrepr::ToBytes;
use odra::ContractEnv;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

const NAME_KEY: &str = "name";
const SYMBOL_KEY: &str = "symbol";
const DECIMALS_KEY: &str = "decimals";
const TOTAL_SUPPLY_KEY: &str = "total_supply";
const BALANCES_DICT: &str = "balances";
const ALLOWANCES_DICT: &str = "allowances";

/// Create the dictionaries and metadata keys
pub fn init(env: &ContractEnv, name: &str, symbol: &str, decimals: u8) {
    env.init_dictionary(BALANCES_DICT);
    env.init_dictionary(ALLOWANCES_DICT);
    env.set_named_value(NAME_KEY, String::from(name));
    env.set_named_value(SYMBOL_KEY, String::from(symbol));
    env.set_named_value(DECIMALS_KEY, decimals);
    env.set_named_value(TOTAL_SUPPLY_KEY, U256::zero());
}

pub fn set_balance(env: &ContractEnv, owner: Address, amount: U256) {
    let key = balance_key(owner);
    env.set_dictionary_value(BALANCES_DICT, key.as_bytes(), amount);
}

pub fn set_allowance(env: &ContractEnv, owner: Address, spender: Address, amount: U256) {
    let key = allowance_key(owner, spender);
    env.set_dictionary_value(ALLOWANCES_DICT, key.as_bytes(), amount);
}

pub fn set_total_supply(env: &ContractEnv, amount: U256) {
    env.set_named_value(TOTAL_SUPPLY_KEY, amount);
}

pub fn balance_key(owner: Address) -> String {
    let key = Key::from(owner);
    BASE64_STANDARD.encode(key.to_bytes().unwrap_or_default())
}

pub fn allowance_key(owner: Address, spender: Address) -> String {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&Key::from(owner).to_bytes().unwrap_or_default());
    bytes.extend_from_slice(&Key::from(spender).to_bytes().unwrap_or_default());
    BASE64_STANDARD.encode(bytes)
}
