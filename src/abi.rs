//! ABI Loader
//!
//! Reads contract ABIs from a directory of JSON files, either bare ABI
//! arrays or build artifacts (Foundry/Hardhat) carrying an `abi` field.
//! The bots call through the typed bindings in `contracts`; a deployed
//! `IHyperdrive` ABI found on disk is checked against those bindings so a
//! pool emitting different event signatures is caught at startup instead
//! of its logs being silently skipped.

use crate::contracts::IHyperdrive;
use alloy::json_abi::JsonAbi;
use alloy::primitives::B256;
use alloy::sol_types::SolEvent;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Load every ABI under `dir`, keyed by file stem.
pub fn load_all_abis<P: AsRef<Path>>(dir: P) -> Result<HashMap<String, JsonAbi>> {
    let mut abis = HashMap::new();
    visit(dir.as_ref(), &mut abis)?;
    debug!("Loaded {} ABIs from {}", abis.len(), dir.as_ref().display());
    Ok(abis)
}

fn visit(dir: &Path, abis: &mut HashMap<String, JsonAbi>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read ABI dir {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            visit(&path, abis)?;
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_abi(&path)? {
            Some(abi) => {
                abis.insert(stem.to_string(), abi);
            }
            None => warn!("No ABI found in {}, skipping", path.display()),
        }
    }
    Ok(())
}

/// Parse one file. `Ok(None)` when the JSON holds no ABI.
pub fn load_abi(path: &Path) -> Result<Option<JsonAbi>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value =
        serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let abi = match json {
        Value::Array(_) => json,
        Value::Object(mut artifact) => match artifact.remove("abi") {
            Some(abi) => abi,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };

    serde_json::from_value(abi)
        .map(Some)
        .with_context(|| format!("Invalid ABI in {}", path.display()))
}

/// Name of the pool ABI file (without extension)
pub const HYPERDRIVE_ABI: &str = "IHyperdrive";

/// Signature and topic0 of every event the log decoder understands
pub fn bound_events() -> [(&'static str, B256); 10] {
    fn event<E: SolEvent>() -> (&'static str, B256) {
        (E::SIGNATURE, E::SIGNATURE_HASH)
    }
    [
        event::<IHyperdrive::Initialize>(),
        event::<IHyperdrive::AddLiquidity>(),
        event::<IHyperdrive::RemoveLiquidity>(),
        event::<IHyperdrive::RedeemWithdrawalShares>(),
        event::<IHyperdrive::OpenLong>(),
        event::<IHyperdrive::OpenShort>(),
        event::<IHyperdrive::CloseLong>(),
        event::<IHyperdrive::CloseShort>(),
        event::<IHyperdrive::CreateCheckpoint>(),
        event::<IHyperdrive::TransferSingle>(),
    ]
}

/// Fail when `abi` lacks any event the decoder depends on.
pub fn check_hyperdrive_events(abi: &JsonAbi) -> Result<()> {
    let missing: Vec<&str> = bound_events()
        .into_iter()
        .filter(|(_, topic)| !abi.events().any(|e| e.selector() == *topic))
        .map(|(signature, _)| signature)
        .collect();
    if !missing.is_empty() {
        bail!("IHyperdrive ABI does not declare events: {}", missing.join(", "));
    }
    Ok(())
}

/// Check the pool ABI under `dir`, if the directory exists.
pub fn verify_abi_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        debug!("ABI dir {} not found; using built-in bindings", dir.display());
        return Ok(());
    }
    let abis = load_all_abis(dir)?;
    match abis.get(HYPERDRIVE_ABI) {
        Some(abi) => check_hyperdrive_events(abi)
            .with_context(|| format!("{} under {} does not match the bindings", HYPERDRIVE_ABI, dir.display())),
        None => {
            warn!("No {} ABI under {}; using built-in bindings", HYPERDRIVE_ABI, dir.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const ERC20_ABI: &str = r#"[{"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8"}],"stateMutability":"view"}]"#;

    fn fresh_dir(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();
        dir
    }

    #[test]
    fn test_loads_bare_and_artifact_abis() {
        let dir = fresh_dir("hyperdrive_abi_test");
        fs::write(dir.join("ERC20.json"), ERC20_ABI).unwrap();
        fs::write(
            dir.join("nested").join("IHyperdrive.json"),
            format!(r#"{{"abi": {}, "bytecode": "0x"}}"#, ERC20_ABI),
        )
        .unwrap();
        fs::write(dir.join("README.md"), "ignored").unwrap();
        fs::write(dir.join("addresses.json"), r#"{"hyperdrive": "0x00"}"#).unwrap();

        let abis = load_all_abis(&dir).unwrap();
        assert_eq!(abis.len(), 2);
        assert!(abis["ERC20"].function("decimals").is_some());
        assert!(abis.contains_key("IHyperdrive"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bad_abi_names_file() {
        let dir = fresh_dir("hyperdrive_abi_bad_test");
        fs::write(dir.join("Broken.json"), r#"[{"type": 5}]"#).unwrap();

        let err = load_all_abis(&dir).unwrap_err();
        assert!(format!("{:#}", err).contains("Broken.json"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_hyperdrive_events_checked_by_selector() {
        let signatures = bound_events().map(|(sig, _)| format!("event {}", sig));
        let complete = JsonAbi::parse(signatures.iter().map(String::as_str)).unwrap();
        assert!(check_hyperdrive_events(&complete).is_ok());

        let partial = JsonAbi::parse([
            "event OpenLong(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice, uint256 bondAmount)",
            // bondAmount dropped: different selector
            "event CloseLong(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice)",
        ])
        .unwrap();
        let err = check_hyperdrive_events(&partial).unwrap_err().to_string();
        assert!(!err.contains("OpenLong("));
        assert!(err.contains("CloseLong("));
        assert!(err.contains("TransferSingle("));
    }

    #[test]
    fn test_verify_abi_dir_rejects_mismatched_pool_abi() {
        let dir = fresh_dir("hyperdrive_abi_verify_test");
        assert!(verify_abi_dir(dir.join("missing")).is_ok());

        fs::write(dir.join("ERC20.json"), ERC20_ABI).unwrap();
        assert!(verify_abi_dir(&dir).is_ok(), "no pool ABI only warns");

        fs::write(dir.join("IHyperdrive.json"), ERC20_ABI).unwrap();
        let err = verify_abi_dir(&dir).unwrap_err();
        assert!(format!("{:#}", err).contains("OpenShort("));

        let _ = fs::remove_dir_all(&dir);
    }
}
