//! Command implementations.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use comfy_table::Table;
use weaver_deploy::{
    ArtifactStore, Component, FileLedgerStore, Ledger, NetworkConfig, Registry, RpcChainClient,
    RunReport, StepRunner, constructor_arguments, pool_salt_inputs, predict_address,
    standard_plan,
};

use crate::settings::Settings;

/// Write the effective settings to `path`.
pub fn init(settings: &Settings, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }
    settings.save_to_file(path)
}

/// Run the standard plan against the selected network.
pub async fn deploy(settings: &Settings, network: &NetworkConfig) -> Result<()> {
    let sender = settings
        .sender
        .context("No sender configured: set `sender` in the settings file or WEAVER_SENDER")?;

    let store = FileLedgerStore::new(settings.ledger_dir.clone());
    // Held for the whole run: only one orchestration process per chain.
    let _lock = store.lock(network.chain_id)?;

    let mut client = RpcChainClient::new(
        &settings.rpc_url,
        sender,
        ArtifactStore::new(settings.artifacts_dir.clone()),
    )?
    .poll_interval(Duration::from_millis(settings.poll_interval_ms))
    .receipt_timeout(settings.receipt_timeout_secs.map(Duration::from_secs));

    let remote_chain_id = client
        .chain_id()
        .await
        .context(format!("Failed to query the chain id of {}", settings.rpc_url))?;
    if remote_chain_id != network.chain_id {
        anyhow::bail!(
            "{} serves chain {remote_chain_id}, but network `{}` is chain {}",
            settings.rpc_url,
            network.name,
            network.chain_id
        );
    }

    let mut ledger = Ledger::load_or_default(store, network.chain_id)?;

    tracing::info!(
        network = %network.name,
        chain_id = network.chain_id,
        %sender,
        ledger = %settings.ledger_dir.display(),
        "Deploying protocol..."
    );

    let plan = standard_plan(network);
    let report = StepRunner::new(&mut client, &mut ledger, network)
        .run(&plan)
        .await?;

    println!("{}", report_table(&report));
    Ok(())
}

fn report_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Step", "Deployed", "Reused", "Registered", "Wiring calls", "Wiring skipped",
    ]);
    for step in &report.steps {
        table.add_row(vec![
            step.step.clone(),
            step.deployed.len().to_string(),
            step.reused.len().to_string(),
            step.registered.len().to_string(),
            step.wiring_calls.to_string(),
            step.skipped_wiring.to_string(),
        ]);
    }
    table
}

/// Print the ledger of the selected network.
pub fn status(settings: &Settings, network: &NetworkConfig) -> Result<()> {
    let ledger = Ledger::load(FileLedgerStore::new(settings.ledger_dir.clone()), network.chain_id)?;

    let mut deployments = Table::new();
    deployments.set_header(vec!["Component", "Address"]);
    for (name, address) in ledger.deployments() {
        deployments.add_row(vec![name.clone(), address.to_string()]);
    }
    println!("{deployments}");

    if !ledger.entities().is_empty() {
        let mut entities = Table::new();
        entities.set_header(vec!["Entity", "Owner", "Asset", "Address"]);
        for entity in ledger.entities() {
            entities.add_row(vec![
                entity.name.clone(),
                entity.owner.clone(),
                entity.asset.clone().unwrap_or_default(),
                entity
                    .address
                    .map(|address| address.to_string())
                    .unwrap_or_default(),
            ]);
        }
        println!("{entities}");
    }

    match ledger.pool_bytecode_hash() {
        Some(hash) => println!("Pool bytecode hash: {hash}"),
        None => println!("Pool bytecode hash: not recorded"),
    }
    Ok(())
}

/// Print the predicted pool address of `symbol`.
pub fn predict(settings: &Settings, network: &NetworkConfig, symbol: &str) -> Result<()> {
    let asset = network
        .asset(symbol)
        .context(format!("Asset `{symbol}` is not listed on network `{}`", network.name))?;
    let ledger = Ledger::load(FileLedgerStore::new(settings.ledger_dir.clone()), network.chain_id)?;

    let factory = ledger.get(Component::PoolFactory.as_ref())?;
    let address = predict_address(
        factory,
        &pool_salt_inputs(network, asset),
        ledger.pool_bytecode_hash(),
    )?;

    tracing::debug!(%factory, asset = %symbol, "Pool address predicted");
    println!("{address}");
    Ok(())
}

/// Record the code fingerprint of `contract` as the ledger's pool bytecode hash.
pub fn fingerprint(settings: &Settings, network: &NetworkConfig, contract: &str) -> Result<()> {
    let hash = ArtifactStore::new(settings.artifacts_dir.clone()).code_fingerprint(contract)?;

    let store = FileLedgerStore::new(settings.ledger_dir.clone());
    let _lock = store.lock(network.chain_id)?;
    let mut ledger = Ledger::load_or_default(store, network.chain_id)?;

    if let Some(previous) = ledger.pool_bytecode_hash().filter(|previous| *previous != hash) {
        tracing::warn!(%previous, %hash, "Replacing recorded pool bytecode hash");
    }
    ledger.set_pool_bytecode_hash(hash);
    ledger.persist()?;

    println!("{hash}");
    Ok(())
}

/// Print the constructor arguments of `component` as a JSON array.
pub fn verify_args(settings: &Settings, network: &NetworkConfig, component: &str) -> Result<()> {
    let ledger = Ledger::load(FileLedgerStore::new(settings.ledger_dir.clone()), network.chain_id)?;
    let arguments = constructor_arguments(&standard_plan(network), &ledger, component)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&arguments).context("Failed to render arguments")?
    );
    Ok(())
}

/// List the networks of the registry.
pub fn networks(registry: &Registry) {
    let mut table = Table::new();
    table.set_header(vec!["Network", "Chain id", "Assets", "Connectors"]);
    for network in registry.values() {
        let assets: Vec<&str> = network.assets.iter().map(|asset| asset.symbol.as_str()).collect();
        table.add_row(vec![
            network.name.clone(),
            network.chain_id.to_string(),
            assets.join(", "),
            network.connectors.len().to_string(),
        ]);
    }
    println!("{table}");
}
