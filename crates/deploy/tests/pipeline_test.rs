//! Step runner tests against an in-memory chain and ledger.
//!
//! Run with: cargo test --test pipeline_test

use std::collections::{BTreeMap, HashSet};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, address, keccak256},
};
use weaver_deploy::{
    CallRequest, ChainClient, DeployRequest, Ledger, LedgerDocument, MemoryLedgerStore,
    NetworkConfig, Receipt, RegisteredEntity, Registry, RemoteCallError, RunError, Step,
    StepRunner,
    pipeline::{Arg, Deployment, PREFLIGHT, PipelineError, StepViolation},
    pool_salt_inputs, predict_address, standard_plan,
};

const POOL_FACTORY: Address = address!("00000000000000000000000000000000000000a1");
const LOCALHOST_CHAIN_ID: u64 = 31337;

/// A chain that records every request, hands out sequential addresses and fails the
/// requests it was told to fail.
#[derive(Debug, Default)]
struct FakeChain {
    deploys: Vec<DeployRequest>,
    calls: Vec<CallRequest>,
    failing_deploys: HashSet<usize>,
    failing_calls: HashSet<usize>,
    deployed: u8,
}

impl FakeChain {
    /// Fail the deploy request with this attempt number.
    fn fail_deploy(mut self, attempt: usize) -> Self {
        self.failing_deploys.insert(attempt);
        self
    }

    /// Fail the call request with this attempt number.
    fn fail_call(mut self, attempt: usize) -> Self {
        self.failing_calls.insert(attempt);
        self
    }

    fn request_count(&self) -> usize {
        self.deploys.len() + self.calls.len()
    }
}

impl ChainClient for FakeChain {
    async fn deploy(&mut self, request: &DeployRequest) -> Result<Address, RemoteCallError> {
        let attempt = self.deploys.len();
        self.deploys.push(request.clone());
        if self.failing_deploys.contains(&attempt) {
            return Err(RemoteCallError::Rejected(format!("deploy #{attempt}")));
        }
        self.deployed += 1;
        Ok(Address::with_last_byte(self.deployed))
    }

    async fn call(&mut self, request: &CallRequest) -> Result<Receipt, RemoteCallError> {
        let attempt = self.calls.len();
        self.calls.push(request.clone());
        if self.failing_calls.contains(&attempt) {
            return Err(RemoteCallError::Rejected(format!("call #{attempt}")));
        }
        Ok(Receipt {
            transaction_hash: keccak256(attempt.to_be_bytes()),
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn localhost() -> NetworkConfig {
    Registry::builtin()
        .unwrap()
        .resolve("localhost")
        .unwrap()
        .clone()
}

fn step(network: &NetworkConfig, name: &str) -> Step {
    standard_plan(network)
        .into_iter()
        .find(|step| step.name == name)
        .unwrap()
}

fn ledger_with(entries: &[(&str, Address)]) -> Ledger<MemoryLedgerStore> {
    let document = LedgerDocument {
        deployments: entries
            .iter()
            .map(|(name, address)| (name.to_string(), *address))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    };
    let store = MemoryLedgerStore::with_document(LOCALHOST_CHAIN_ID, document);
    Ledger::load(store, LOCALHOST_CHAIN_ID).unwrap()
}

fn persisted(ledger: &Ledger<MemoryLedgerStore>) -> &LedgerDocument {
    ledger.store().document(LOCALHOST_CHAIN_ID).unwrap()
}

async fn run(
    chain: &mut FakeChain,
    ledger: &mut Ledger<MemoryLedgerStore>,
    network: &NetworkConfig,
    steps: &[Step],
) -> Result<weaver_deploy::RunReport, RunError> {
    StepRunner::new(chain, ledger, network).run(steps).await
}

#[tokio::test]
async fn test_pool_indexer_is_deployed_against_recorded_factory() {
    let network = localhost();
    let mut ledger = ledger_with(&[("PoolFactory", POOL_FACTORY)]);
    let mut chain = FakeChain::default();

    let report = run(&mut chain, &mut ledger, &network, &[step(&network, "deploy_pool_indexer")])
        .await
        .unwrap();

    assert_eq!(chain.deploys.len(), 1);
    assert_eq!(chain.deploys[0].contract, "PoolIndexer");
    assert_eq!(chain.deploys[0].args, vec![DynSolValue::Address(POOL_FACTORY)]);
    assert!(chain.calls.is_empty());

    let indexer = report.steps[0].deployed[0].1;
    assert_eq!(ledger.get("PoolFactory").unwrap(), POOL_FACTORY);
    assert_eq!(ledger.get("PoolIndexer").unwrap(), indexer);
    assert_eq!(ledger.deployments().len(), 2);

    // durable before the run moves on
    assert_eq!(persisted(&ledger).deployments.get("PoolIndexer"), Some(&indexer));
}

#[tokio::test]
async fn test_rerun_issues_no_deploy() {
    let network = localhost();
    let steps = [step(&network, "deploy_pool_indexer")];
    let mut ledger = ledger_with(&[("PoolFactory", POOL_FACTORY)]);

    let mut chain = FakeChain::default();
    run(&mut chain, &mut ledger, &network, &steps).await.unwrap();
    let indexer = ledger.get("PoolIndexer").unwrap();

    let mut chain = FakeChain::default();
    let report = run(&mut chain, &mut ledger, &network, &steps).await.unwrap();

    assert!(chain.deploys.is_empty());
    assert_eq!(report.deploy_count(), 0);
    assert_eq!(report.steps[0].reused, vec![("PoolIndexer".to_string(), indexer)]);
    assert_eq!(ledger.get("PoolIndexer").unwrap(), indexer);
}

#[tokio::test]
async fn test_missing_dependency_aborts_before_any_request() {
    let network = localhost();
    let mut ledger = ledger_with(&[("PoolFactory", POOL_FACTORY)]);
    let mut chain = FakeChain::default();

    let err = run(&mut chain, &mut ledger, &network, &[step(&network, "deploy_router")])
        .await
        .unwrap_err();

    assert_eq!(err.chain_id, LOCALHOST_CHAIN_ID);
    assert_eq!(err.step, "deploy_router");
    assert!(matches!(
        &err.cause,
        PipelineError::MissingDependency { name, .. } if name == "PoolIndexer"
    ));
    assert_eq!(chain.request_count(), 0);
    assert_eq!(ledger.store().writes(), 0);
}

#[tokio::test]
async fn test_connector_batch_reports_failed_index_and_keeps_the_rest() {
    init_tracing();
    let network = localhost();
    let registry = Address::repeat_byte(0xc0);
    let steps = [step(&network, "mint_connectors")];
    let mut ledger = ledger_with(&[("ConnectorRegistry", registry)]);
    let mut chain = FakeChain::default().fail_call(2);

    let err = run(&mut chain, &mut ledger, &network, &steps).await.unwrap_err();

    assert_eq!(err.step, "mint_connectors");
    assert_eq!(err.cause.failed_indices(), vec![2]);
    assert_eq!(chain.calls.len(), 5);
    assert!(chain.calls.iter().all(|call| call.target == registry));

    let registered: Vec<&str> = ledger.entities().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        registered,
        vec!["Connector:1", "Connector:2", "Connector:4", "Connector:5"]
    );
    assert_eq!(persisted(&ledger).registered_entities.len(), 4);

    // the operator re-runs once the cause is fixed: only the failed item is sent again
    let mut chain = FakeChain::default();
    let report = run(&mut chain, &mut ledger, &network, &steps).await.unwrap();
    assert_eq!(chain.calls.len(), 1);
    assert_eq!(report.steps[0].registered, vec!["Connector:3".to_string()]);
    assert_eq!(report.steps[0].already_registered.len(), 4);
    assert_eq!(ledger.entities().len(), 5);
}

#[tokio::test]
async fn test_wiring_failure_keeps_deploy_persisted() {
    let network = localhost();
    let indexer = Address::repeat_byte(0xb2);
    let mut ledger = ledger_with(&[("PoolFactory", POOL_FACTORY), ("PoolIndexer", indexer)]);
    let mut chain = FakeChain::default().fail_call(0);

    let err = run(&mut chain, &mut ledger, &network, &[step(&network, "deploy_router")])
        .await
        .unwrap_err();

    let PipelineError::Wiring {
        index,
        signature,
        target,
        ..
    } = &err.cause
    else {
        panic!("expected a wiring error, got {err:?}");
    };
    assert_eq!(*index, 0);
    assert_eq!(signature, "grantRole(bytes32,address)");
    assert_eq!(*target, POOL_FACTORY);

    let router = ledger.get("Router").unwrap();
    assert_eq!(persisted(&ledger).deployments.get("Router"), Some(&router));

    // re-running reuses the router and retries the wiring
    let mut chain = FakeChain::default();
    run(&mut chain, &mut ledger, &network, &[step(&network, "deploy_router")])
        .await
        .unwrap();
    assert!(chain.deploys.is_empty());
    assert_eq!(chain.calls.len(), 1);
    assert_eq!(
        chain.calls[0].args[1],
        DynSolValue::Address(router),
        "wiring is bound to the reused address"
    );
}

#[tokio::test]
async fn test_reuse_without_rewire_skips_wiring() {
    let network = localhost();
    let mut ledger = ledger_with(&[
        ("PoolFactory", POOL_FACTORY),
        ("PoolIndexer", Address::repeat_byte(0xb2)),
        ("Router", Address::repeat_byte(0xb3)),
    ]);

    let mut chain = FakeChain::default();
    let report = run(&mut chain, &mut ledger, &network, &[step(&network, "deploy_router")])
        .await
        .unwrap();
    assert_eq!(chain.calls.len(), 1);
    assert_eq!(report.steps[0].wiring_calls, 1);

    let mut chain = FakeChain::default();
    let once = step(&network, "deploy_router").rewire_on_reuse(false);
    let report = run(&mut chain, &mut ledger, &network, &[once]).await.unwrap();
    assert_eq!(chain.request_count(), 0);
    assert_eq!(report.steps[0].skipped_wiring, 1);
}

#[tokio::test]
async fn test_ledger_of_another_chain_is_rejected() {
    let network = localhost();
    let store = MemoryLedgerStore::default();
    let mut ledger = Ledger::load_or_default(store, 421614).unwrap();
    let mut chain = FakeChain::default();

    let err = run(&mut chain, &mut ledger, &network, &standard_plan(&network))
        .await
        .unwrap_err();

    assert_eq!(err.step, PREFLIGHT);
    assert!(matches!(
        err.cause,
        PipelineError::ChainMismatch {
            ledger: 421614,
            network: LOCALHOST_CHAIN_ID
        }
    ));
    assert_eq!(chain.request_count(), 0);
}

#[tokio::test]
async fn test_pool_creation_requires_fingerprint() {
    let network = localhost();
    let steps = [step(&network, "create_pools")];
    let mut ledger = ledger_with(&[
        ("PoolFactory", POOL_FACTORY),
        ("LpToken:ETH", Address::repeat_byte(0xe1)),
        ("LpToken:BTC", Address::repeat_byte(0xb1)),
    ]);

    let mut chain = FakeChain::default();
    let err = run(&mut chain, &mut ledger, &network, &steps).await.unwrap_err();
    assert!(matches!(err.cause, PipelineError::Configuration(_)));
    assert_eq!(chain.request_count(), 0);

    let fingerprint = B256::repeat_byte(0x42);
    ledger.set_pool_bytecode_hash(fingerprint);

    let mut chain = FakeChain::default();
    run(&mut chain, &mut ledger, &network, &steps).await.unwrap();
    assert_eq!(chain.calls.len(), network.assets.len());

    for asset in &network.assets {
        let pool = ledger.entity(&format!("Pool:{}", asset.symbol)).unwrap();
        let expected = predict_address(
            POOL_FACTORY,
            &pool_salt_inputs(&network, asset),
            Some(fingerprint),
        )
        .unwrap();
        assert_eq!(pool.address, Some(expected));
        assert_eq!(pool.owner, "PoolFactory");
        assert_eq!(pool.asset.as_deref(), Some(asset.symbol.as_str()));
    }
}

#[tokio::test]
async fn test_missing_fingerprint_stops_the_plan_before_any_request() {
    let network = localhost();
    let mut ledger =
        Ledger::load_or_default(MemoryLedgerStore::default(), LOCALHOST_CHAIN_ID).unwrap();
    let mut chain = FakeChain::default();

    let err = run(&mut chain, &mut ledger, &network, &standard_plan(&network))
        .await
        .unwrap_err();

    assert_eq!(err.step, "create_pools");
    assert!(matches!(err.cause, PipelineError::Configuration(_)));
    assert_eq!(chain.request_count(), 0);
    assert!(ledger.deployments().is_empty());
    assert_eq!(ledger.store().writes(), 0);
}

#[tokio::test]
async fn test_registered_pools_need_no_fingerprint() {
    let network = localhost();
    let mut ledger = ledger_with(&[
        ("PoolFactory", POOL_FACTORY),
        ("LpToken:ETH", Address::repeat_byte(0xe1)),
        ("LpToken:BTC", Address::repeat_byte(0xb1)),
    ]);
    for asset in &network.assets {
        ledger.register(RegisteredEntity {
            name: format!("Pool:{}", asset.symbol),
            owner: "PoolFactory".to_string(),
            asset: Some(asset.symbol.clone()),
            address: None,
        });
    }
    let mut chain = FakeChain::default();

    let report = run(&mut chain, &mut ledger, &network, &[step(&network, "create_pools")])
        .await
        .unwrap();

    assert_eq!(chain.request_count(), 0);
    assert_eq!(report.steps[0].already_registered.len(), network.assets.len());
}

#[tokio::test]
async fn test_malformed_step_is_rejected_before_any_request() {
    let network = localhost();
    let mut ledger = ledger_with(&[("PoolFactory", POOL_FACTORY)]);
    let mut chain = FakeChain::default();
    let malformed = Step::deploy(
        "deploy_self_referencing",
        Deployment::new("Router", "Router").arg(Arg::Deployed),
    );

    let err = run(
        &mut chain,
        &mut ledger,
        &network,
        &[step(&network, "deploy_pool_indexer"), malformed],
    )
    .await
    .unwrap_err();

    assert_eq!(err.step, "deploy_self_referencing");
    assert!(matches!(
        err.cause,
        PipelineError::InvalidStep {
            reason: StepViolation::DeployedBeforeAction,
            ..
        }
    ));
    assert_eq!(chain.request_count(), 0);
}

#[tokio::test]
async fn test_full_plan_resumes_after_failure() {
    init_tracing();
    let network = localhost();
    let plan = standard_plan(&network);
    let mut ledger = Ledger::load_or_default(MemoryLedgerStore::default(), LOCALHOST_CHAIN_ID).unwrap();
    ledger.set_pool_bytecode_hash(B256::repeat_byte(0x42));

    // the router deploy is the third deploy request
    let mut chain = FakeChain::default().fail_deploy(2);
    let err = run(&mut chain, &mut ledger, &network, &plan).await.unwrap_err();
    assert_eq!(err.step, "deploy_router");
    assert!(matches!(err.cause, PipelineError::RemoteCall { ref component, .. } if component == "Router"));
    let factory = ledger.get("PoolFactory").unwrap();
    let indexer = ledger.get("PoolIndexer").unwrap();

    let mut chain = FakeChain::default();
    let report = run(&mut chain, &mut ledger, &network, &plan).await.unwrap();

    // four remaining singletons plus one LP token per asset
    assert_eq!(report.deploy_count(), 4 + network.assets.len());
    assert_eq!(chain.deploys[0].contract, "Router");
    assert_eq!(ledger.get("PoolFactory").unwrap(), factory);
    assert_eq!(ledger.get("PoolIndexer").unwrap(), indexer);

    let expected_calls = 1 // router role
        + 1 + network.executors.len() + 1 // executor role, keepers, oracle updater
        + 2 // fee collector, plugin
        + 1 // plugin
        + network.assets.len()
        + network.connectors.len();
    assert_eq!(chain.calls.len(), expected_calls);
    assert_eq!(
        ledger.entities().len(),
        network.assets.len() + network.connectors.len()
    );

    // a fully wired network needs no further deploys
    let mut chain = FakeChain::default();
    let report = run(&mut chain, &mut ledger, &network, &plan).await.unwrap();
    assert_eq!(report.deploy_count(), 0);
    assert!(chain.deploys.is_empty());
}
