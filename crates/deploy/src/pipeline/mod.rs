//! Sequential step runner.
//!
//! Steps run strictly in order, each one building on the ledger writes of the previous
//! ones. Every dependency of a step is resolved before it issues its first remote call.
//! A successful deploy is persisted before anything else happens, so an aborted run can
//! be resumed: re-running skips what is already recorded and continues where it failed.

pub(crate) mod bindings;
mod error;
mod step;

use alloy_core::primitives::Address;

pub use error::{ItemFailure, PREFLIGHT, PipelineError, RunError};
pub use step::{
    Action, Arg, Call, Deployment, EntityAddress, Registration, Step, StepViolation, Target,
    WiringCall,
};

use bindings::Bindings;

use crate::{
    client::{ChainClient, DeployRequest},
    ledger::{Ledger, LedgerStore, RegisteredEntity},
    predictor::{ConfigurationError, predict_address},
    registry::NetworkConfig,
};

/// What a completed step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    /// Components deployed by this run of the step.
    pub deployed: Vec<(String, Address)>,
    /// Components already in the ledger and left untouched.
    pub reused: Vec<(String, Address)>,
    /// Entities registered by this run of the step.
    pub registered: Vec<String>,
    /// Entities already registered and skipped.
    pub already_registered: Vec<String>,
    pub wiring_calls: usize,
    pub skipped_wiring: usize,
}

impl StepReport {
    fn new(step: &str) -> Self {
        Self {
            step: step.to_string(),
            ..Default::default()
        }
    }
}

/// Outcome of a fully successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Number of deploy requests issued over the whole run.
    pub fn deploy_count(&self) -> usize {
        self.steps.iter().map(|step| step.deployed.len()).sum()
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.step == name)
    }
}

/// Drives steps against a chain, recording progress in its ledger.
///
/// The runner is the only writer of the ledger for the duration of a run.
pub struct StepRunner<'a, C, S> {
    client: &'a mut C,
    ledger: &'a mut Ledger<S>,
    network: &'a NetworkConfig,
}

impl<'a, C: ChainClient, S: LedgerStore> StepRunner<'a, C, S> {
    pub fn new(client: &'a mut C, ledger: &'a mut Ledger<S>, network: &'a NetworkConfig) -> Self {
        Self {
            client,
            ledger,
            network,
        }
    }

    /// Run `steps` in order, stopping at the first step that fails.
    pub async fn run(&mut self, steps: &[Step]) -> Result<RunReport, RunError> {
        let chain_id = self.ledger.chain_id();
        if chain_id != self.network.chain_id {
            return Err(RunError {
                chain_id,
                step: PREFLIGHT.to_string(),
                cause: PipelineError::ChainMismatch {
                    ledger: chain_id,
                    network: self.network.chain_id,
                },
            });
        }

        self.preflight(steps)?;

        tracing::info!(
            chain_id,
            network = %self.network.name,
            steps = steps.len(),
            "Starting deployment run"
        );

        let mut report = RunReport::default();
        for step in steps {
            let outcome = self.run_step(step).await.map_err(|cause| RunError {
                chain_id,
                step: step.name.clone(),
                cause,
            })?;
            report.steps.push(outcome);
        }

        tracing::info!(
            chain_id,
            deployed = report.deploy_count(),
            "✓ Deployment run completed"
        );
        Ok(report)
    }

    /// Reject a plan that would fail on its own configuration partway through, before
    /// anything is sent.
    fn preflight(&self, steps: &[Step]) -> Result<(), RunError> {
        let chain_id = self.ledger.chain_id();
        let fingerprint = self.ledger.pool_bytecode_hash();

        for step in steps {
            let fail = |cause| RunError {
                chain_id,
                step: step.name.clone(),
                cause,
            };

            step.validate().map_err(|reason| {
                fail(PipelineError::InvalidStep {
                    step: step.name.clone(),
                    reason,
                })
            })?;

            if fingerprint.is_none() && self.predicts_unregistered(step) {
                return Err(fail(ConfigurationError::MissingFingerprint.into()));
            }
        }
        Ok(())
    }

    /// Whether `step` still has to register an entity at a predicted address.
    fn predicts_unregistered(&self, step: &Step) -> bool {
        let Action::RegisterEach(registrations) = &step.action else {
            return false;
        };
        registrations.iter().any(|registration| {
            matches!(registration.address, EntityAddress::Predicted { .. })
                && self.ledger.entity(&registration.entity).is_none()
        })
    }

    /// Run a single step.
    pub async fn run_step(&mut self, step: &Step) -> Result<StepReport, PipelineError> {
        step.validate()
            .map_err(|reason| PipelineError::InvalidStep {
                step: step.name.clone(),
                reason,
            })?;
        let bindings = Bindings::resolve(step, &*self.ledger)?;

        tracing::info!(step = %step.name, "Running step");
        let mut report = StepReport::new(&step.name);

        match &step.action {
            Action::Deploy(deployment) => {
                let (address, reused) = self.deploy_one(step, &bindings, deployment).await?;
                if reused {
                    report.reused.push((deployment.target.clone(), address));
                } else {
                    report.deployed.push((deployment.target.clone(), address));
                }
                let bindings = bindings.with_deployed(address);
                self.wire(step, &bindings, reused, &mut report).await?;
            }
            Action::Configure { target } => {
                let address = bindings.address(target)?;
                let bindings = bindings.with_deployed(address);
                self.wire(step, &bindings, false, &mut report).await?;
            }
            Action::DeployEach(deployments) => {
                self.deploy_each(step, &bindings, deployments, &mut report)
                    .await?;
                let reused = report.deployed.is_empty() && !report.reused.is_empty();
                self.wire(step, &bindings, reused, &mut report).await?;
            }
            Action::RegisterEach(registrations) => {
                self.register_each(step, &bindings, registrations, &mut report)
                    .await?;
                let reused = report.registered.is_empty() && !report.already_registered.is_empty();
                self.wire(step, &bindings, reused, &mut report).await?;
            }
        }

        tracing::info!(
            step = %step.name,
            deployed = report.deployed.len(),
            reused = report.reused.len(),
            registered = report.registered.len(),
            wiring_calls = report.wiring_calls,
            "Step completed"
        );
        Ok(report)
    }

    /// Deploy a component unless the ledger already has it, persisting a fresh address.
    ///
    /// Returns the address and whether it was reused.
    async fn deploy_one(
        &mut self,
        step: &Step,
        bindings: &Bindings,
        deployment: &Deployment,
    ) -> Result<(Address, bool), PipelineError> {
        if deployment.skip_if_present {
            if let Some(address) = self.ledger.find(&deployment.target) {
                tracing::info!(
                    step = %step.name,
                    component = %deployment.target,
                    %address,
                    "Already deployed, skipping"
                );
                return Ok((address, true));
            }
        }

        let request = DeployRequest {
            contract: deployment.contract.clone(),
            args: bindings.values(&deployment.args)?,
        };
        let address = self
            .client
            .deploy(&request)
            .await
            .map_err(|source| PipelineError::RemoteCall {
                step: step.name.clone(),
                component: deployment.target.clone(),
                source,
            })?;

        self.ledger.set(deployment.target.clone(), address);
        self.ledger.persist()?;

        tracing::info!(
            step = %step.name,
            component = %deployment.target,
            %address,
            "Component deployed"
        );
        Ok((address, false))
    }

    async fn wire(
        &mut self,
        step: &Step,
        bindings: &Bindings,
        reused: bool,
        report: &mut StepReport,
    ) -> Result<(), PipelineError> {
        for (index, wiring) in step.wiring.iter().enumerate() {
            if reused && !wiring.repeat_on_reuse {
                tracing::warn!(
                    step = %step.name,
                    index,
                    signature = %wiring.call.signature,
                    "Component reused, wiring call not repeated"
                );
                report.skipped_wiring += 1;
                continue;
            }

            let request = bindings.call_request(&wiring.call)?;
            tracing::debug!(
                step = %step.name,
                index,
                to = %request.target,
                signature = %request.signature,
                "Sending wiring call"
            );
            self.client
                .call(&request)
                .await
                .map_err(|source| PipelineError::Wiring {
                    step: step.name.clone(),
                    index,
                    signature: request.signature.clone(),
                    target: request.target,
                    source,
                })?;
            report.wiring_calls += 1;
        }
        Ok(())
    }

    async fn deploy_each(
        &mut self,
        step: &Step,
        bindings: &Bindings,
        deployments: &[Deployment],
        report: &mut StepReport,
    ) -> Result<(), PipelineError> {
        let mut pending = Vec::new();
        for (index, deployment) in deployments.iter().enumerate() {
            let existing = deployment
                .skip_if_present
                .then(|| self.ledger.find(&deployment.target))
                .flatten();
            match existing {
                Some(address) => report.reused.push((deployment.target.clone(), address)),
                None => {
                    let request = DeployRequest {
                        contract: deployment.contract.clone(),
                        args: bindings.values(&deployment.args)?,
                    };
                    pending.push((index, deployment, request));
                }
            }
        }

        let total = deployments.len();
        let mut failures = Vec::new();
        for (index, deployment, request) in pending {
            match self.client.deploy(&request).await {
                Ok(address) => {
                    self.ledger.set(deployment.target.clone(), address);
                    self.ledger.persist()?;
                    tracing::info!(
                        step = %step.name,
                        index,
                        component = %deployment.target,
                        %address,
                        "Component deployed"
                    );
                    report.deployed.push((deployment.target.clone(), address));
                }
                Err(source) => {
                    tracing::warn!(
                        step = %step.name,
                        index,
                        component = %deployment.target,
                        error = %source,
                        "Batch deploy failed"
                    );
                    failures.push(ItemFailure {
                        index,
                        item: deployment.target.clone(),
                        source,
                    });
                }
            }
        }

        batch_result(step, total, failures)
    }

    async fn register_each(
        &mut self,
        step: &Step,
        bindings: &Bindings,
        registrations: &[Registration],
        report: &mut StepReport,
    ) -> Result<(), PipelineError> {
        let fingerprint = self.ledger.pool_bytecode_hash();

        let mut pending = Vec::new();
        for (index, registration) in registrations.iter().enumerate() {
            if self.ledger.entity(&registration.entity).is_some() {
                report.already_registered.push(registration.entity.clone());
                continue;
            }

            let address = match &registration.address {
                EntityAddress::None => None,
                EntityAddress::Fixed(address) => Some(*address),
                EntityAddress::Predicted { factory, salt } => Some(predict_address(
                    bindings.address(factory)?,
                    &bindings.values(salt)?,
                    fingerprint,
                )?),
            };
            let request = bindings.call_request(&registration.call)?;
            pending.push((index, registration, request, address));
        }

        let total = registrations.len();
        let mut failures = Vec::new();
        for (index, registration, request, address) in pending {
            match self.client.call(&request).await {
                Ok(receipt) => {
                    self.ledger.register(RegisteredEntity {
                        name: registration.entity.clone(),
                        owner: registration.owner.clone(),
                        asset: registration.asset.clone(),
                        address,
                    });
                    self.ledger.persist()?;
                    tracing::info!(
                        step = %step.name,
                        index,
                        entity = %registration.entity,
                        transaction = %receipt.transaction_hash,
                        "Entity registered"
                    );
                    report.registered.push(registration.entity.clone());
                }
                Err(source) => {
                    tracing::warn!(
                        step = %step.name,
                        index,
                        entity = %registration.entity,
                        error = %source,
                        "Batch call failed"
                    );
                    failures.push(ItemFailure {
                        index,
                        item: registration.entity.clone(),
                        source,
                    });
                }
            }
        }

        batch_result(step, total, failures)
    }
}

fn batch_result(step: &Step, total: usize, failures: Vec<ItemFailure>) -> Result<(), PipelineError> {
    if failures.is_empty() {
        return Ok(());
    }
    Err(PipelineError::Batch {
        step: step.name.clone(),
        total,
        failures,
    })
}
