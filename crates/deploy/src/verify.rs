//! Constructor arguments for source verification tooling.
//!
//! Purely derived from the plan and the ledger; nothing is written.

use alloy_core::dyn_abi::DynSolValue;
use serde_json::Value;

use crate::{
    ledger::Ledger,
    pipeline::{Action, Deployment, PipelineError, Step, bindings::Bindings},
};

/// Resolved constructor arguments of `component`, in declaration order.
pub fn constructor_arguments<S>(
    plan: &[Step],
    ledger: &Ledger<S>,
    component: &str,
) -> Result<Vec<Value>, PipelineError> {
    let (step, deployment) = find_deployment(plan, component)
        .ok_or_else(|| PipelineError::NotInPlan(component.to_string()))?;

    let bindings = Bindings::resolve(step, ledger)?;
    let values = bindings.values(&deployment.args)?;
    Ok(values.iter().map(render).collect())
}

fn find_deployment<'a>(plan: &'a [Step], component: &str) -> Option<(&'a Step, &'a Deployment)> {
    plan.iter().find_map(|step| {
        let deployment = match &step.action {
            Action::Deploy(deployment) => Some(deployment).filter(|d| d.target == component),
            Action::DeployEach(deployments) => deployments.iter().find(|d| d.target == component),
            _ => None,
        }?;
        Some((step, deployment))
    })
}

/// Render an ABI value the way verification tools expect it on the command line.
pub fn render(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Bool(flag) => Value::Bool(*flag),
        DynSolValue::Uint(number, _) => Value::String(number.to_string()),
        DynSolValue::Int(number, _) => Value::String(number.to_string()),
        DynSolValue::FixedBytes(word, size) => Value::String(prefixed(&word[..*size])),
        DynSolValue::Bytes(bytes) => Value::String(prefixed(bytes)),
        DynSolValue::String(text) => Value::String(text.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(render).collect())
        }
        other => Value::String(prefixed(&other.abi_encode_packed())),
    }
}

fn prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
