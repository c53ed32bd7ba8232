// Sanity checks for the shipped default config files.

use sleeper_draft::valuation::strategy::WeightTable;

fn read(path: &str) -> toml::Value {
    let content = std::fs::read_to_string(path).unwrap_or_else(|_| panic!("{path} should exist"));
    toml::from_str(&content).unwrap_or_else(|e| panic!("{path} is not valid TOML: {e}"))
}

#[test]
fn server_toml_is_valid() {
    let v = read("defaults/server.toml");
    assert_eq!(v["server"]["port"].as_integer(), Some(8000));
    assert_eq!(v["sleeper"]["base_url"].as_str(), Some("https://api.sleeper.app"));
    assert_eq!(v["cache"]["ttl_secs"].as_integer(), Some(3));
}

#[test]
fn strategy_toml_weights_match_built_ins() {
    let v = read("defaults/strategy.toml");
    let weights: WeightTable = v["weights"].clone().try_into().expect("weights table");
    assert_eq!(weights, WeightTable::default());
    assert_eq!(v["llm"]["candidate_limit"].as_integer(), Some(8));
}

#[test]
fn credentials_example_is_valid_toml() {
    let v = read("defaults/credentials.toml.example");
    assert!(v.get("anthropic_api_key").is_some());
}
