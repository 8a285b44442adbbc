//! Resolution of step arguments against the ledger.

use std::collections::HashMap;

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};

use super::{
    PipelineError,
    step::{Arg, Call, Step, StepViolation, Target},
};
use crate::{client::CallRequest, ledger::Ledger};

/// Ledger addresses a step depends on, captured before the step issues anything.
#[derive(Debug, Clone)]
pub(crate) struct Bindings {
    step: String,
    components: HashMap<String, Address>,
    deployed: Option<Address>,
}

impl Bindings {
    /// Look up every dependency of `step`, failing on the first absent one.
    pub(crate) fn resolve<S>(step: &Step, ledger: &Ledger<S>) -> Result<Self, PipelineError> {
        let mut components = HashMap::new();
        for name in step.dependencies() {
            let Some(address) = ledger.find(&name) else {
                return Err(PipelineError::MissingDependency {
                    step: step.name.clone(),
                    name,
                });
            };
            components.insert(name, address);
        }

        Ok(Self {
            step: step.name.clone(),
            components,
            deployed: None,
        })
    }

    /// Bind the address of the component the step deployed or reused.
    pub(crate) fn with_deployed(mut self, address: Address) -> Self {
        self.deployed = Some(address);
        self
    }

    pub(crate) fn address(&self, name: &str) -> Result<Address, PipelineError> {
        self.components
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::MissingDependency {
                step: self.step.clone(),
                name: name.to_string(),
            })
    }

    fn deployed(&self) -> Result<Address, PipelineError> {
        self.deployed.ok_or_else(|| PipelineError::InvalidStep {
            step: self.step.clone(),
            reason: StepViolation::DeployedUnbound,
        })
    }

    pub(crate) fn value(&self, arg: &Arg) -> Result<DynSolValue, PipelineError> {
        Ok(match arg {
            Arg::Value(value) => value.clone(),
            Arg::Component(name) => DynSolValue::Address(self.address(name)?),
            Arg::Deployed => DynSolValue::Address(self.deployed()?),
        })
    }

    pub(crate) fn values(&self, args: &[Arg]) -> Result<Vec<DynSolValue>, PipelineError> {
        args.iter().map(|arg| self.value(arg)).collect()
    }

    pub(crate) fn target(&self, target: &Target) -> Result<Address, PipelineError> {
        match target {
            Target::Component(name) => self.address(name),
            Target::Deployed => self.deployed(),
            Target::Address(address) => Ok(*address),
        }
    }

    pub(crate) fn call_request(&self, call: &Call) -> Result<CallRequest, PipelineError> {
        Ok(CallRequest {
            target: self.target(&call.target)?,
            signature: call.signature.clone(),
            args: self.values(&call.args)?,
        })
    }
}
