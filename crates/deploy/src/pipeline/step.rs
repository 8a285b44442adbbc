//! Declarative description of the units of orchestration work.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256},
};

use crate::client::uint;

/// Why a step cannot be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StepViolation {
    #[error("the deployed address is not known before the action completes")]
    DeployedBeforeAction,
    #[error("wiring refers to the deployed address of a batch step")]
    DeployedInBatchWiring,
    #[error("no deployed address is bound at this point")]
    DeployedUnbound,
}

/// An argument of a deploy or call, resolved when the step runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A literal value.
    Value(DynSolValue),
    /// The ledger address of a component.
    Component(String),
    /// The address of the component this step deployed or reused.
    Deployed,
}

impl Arg {
    pub fn value(value: DynSolValue) -> Self {
        Self::Value(value)
    }

    pub fn address(address: Address) -> Self {
        Self::Value(DynSolValue::Address(address))
    }

    pub fn uint(value: U256) -> Self {
        Self::Value(uint(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Value(DynSolValue::Bool(value))
    }

    pub fn word(value: B256) -> Self {
        Self::Value(DynSolValue::FixedBytes(value, 32))
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::Component(name.into())
    }

    fn component_name(&self) -> Option<&str> {
        match self {
            Self::Component(name) => Some(name),
            _ => None,
        }
    }
}

/// The address a call is sent to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Component(String),
    Deployed,
    /// An external address from the network configuration.
    Address(Address),
}

impl Target {
    pub fn component(name: impl Into<String>) -> Self {
        Self::Component(name.into())
    }

    fn component_name(&self) -> Option<&str> {
        match self {
            Self::Component(name) => Some(name),
            _ => None,
        }
    }
}

/// A method invocation on a component.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub target: Target,
    /// Canonical signature, e.g. `grantRole(bytes32,address)`.
    pub signature: String,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn new(target: Target, signature: impl Into<String>) -> Self {
        Self {
            target,
            signature: signature.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    fn components(&self) -> impl Iterator<Item = &str> {
        self.target
            .component_name()
            .into_iter()
            .chain(self.args.iter().filter_map(Arg::component_name))
    }

    fn uses_deployed(&self) -> bool {
        self.target == Target::Deployed || self.args.contains(&Arg::Deployed)
    }
}

/// A post-deploy call granting a permission or registering one component with another.
#[derive(Debug, Clone, PartialEq)]
pub struct WiringCall {
    pub call: Call,
    /// Whether the call is sent again when the step reuses an already deployed component.
    pub repeat_on_reuse: bool,
}

/// Deployment of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// Ledger key written on success.
    pub target: String,
    /// Artifact to deploy.
    pub contract: String,
    pub args: Vec<Arg>,
    /// Reuse the ledger entry instead of deploying when `target` is already recorded.
    pub skip_if_present: bool,
}

impl Deployment {
    pub fn new(target: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            contract: contract.into(),
            args: Vec::new(),
            skip_if_present: true,
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Deploy even when the target is already recorded, replacing the entry.
    pub fn always(mut self) -> Self {
        self.skip_if_present = false;
        self
    }
}

/// Where the address of a registered entity comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAddress {
    /// The entity has no address of its own.
    None,
    Fixed(Address),
    /// Created by `factory` through `CREATE2` with the hash of `salt` as salt.
    Predicted { factory: String, salt: Vec<Arg> },
}

/// A call creating a sub-resource that is recorded as a registered entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Unique entity name, used to skip entities already registered.
    pub entity: String,
    pub owner: String,
    pub asset: Option<String>,
    pub call: Call,
    pub address: EntityAddress,
}

impl Registration {
    pub fn new(entity: impl Into<String>, owner: impl Into<String>, call: Call) -> Self {
        Self {
            entity: entity.into(),
            owner: owner.into(),
            asset: None,
            call,
            address: EntityAddress::None,
        }
    }

    pub fn asset(mut self, symbol: impl Into<String>) -> Self {
        self.asset = Some(symbol.into());
        self
    }

    pub fn predicted(mut self, factory: impl Into<String>, salt: Vec<Arg>) -> Self {
        self.address = EntityAddress::Predicted {
            factory: factory.into(),
            salt,
        };
        self
    }

    pub fn fixed(mut self, address: Address) -> Self {
        self.address = EntityAddress::Fixed(address);
        self
    }

    fn components(&self) -> impl Iterator<Item = &str> {
        let predicted: Vec<&str> = match &self.address {
            EntityAddress::Predicted { factory, salt } => std::iter::once(factory.as_str())
                .chain(salt.iter().filter_map(Arg::component_name))
                .collect(),
            _ => Vec::new(),
        };
        self.call.components().chain(predicted)
    }
}

/// What a step does before its wiring calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Deploy or reuse one component.
    Deploy(Deployment),
    /// Only wire an existing component.
    Configure { target: String },
    /// Deploy several independent components.
    DeployEach(Vec<Deployment>),
    /// Send several independent calls, each registering an entity.
    RegisterEach(Vec<Registration>),
}

/// One unit of orchestration work.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    /// Ledger names that must be present before anything is sent.
    pub prerequisites: Vec<String>,
    pub action: Action,
    pub wiring: Vec<WiringCall>,
    rewire_on_reuse: bool,
}

impl Step {
    fn with_action(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            action,
            wiring: Vec::new(),
            rewire_on_reuse: true,
        }
    }

    pub fn deploy(name: impl Into<String>, deployment: Deployment) -> Self {
        Self::with_action(name, Action::Deploy(deployment))
    }

    pub fn configure(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_action(
            name,
            Action::Configure {
                target: target.into(),
            },
        )
    }

    pub fn deploy_each(name: impl Into<String>, deployments: Vec<Deployment>) -> Self {
        Self::with_action(name, Action::DeployEach(deployments))
    }

    pub fn register_each(name: impl Into<String>, registrations: Vec<Registration>) -> Self {
        Self::with_action(name, Action::RegisterEach(registrations))
    }

    /// Declare a prerequisite not already implied by the step's arguments.
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.prerequisites.push(name.into());
        self
    }

    /// Append a wiring call using the step's reuse policy.
    pub fn wire(mut self, call: Call) -> Self {
        self.wiring.push(WiringCall {
            call,
            repeat_on_reuse: self.rewire_on_reuse,
        });
        self
    }

    /// Append a wiring call that is only sent right after a fresh deployment.
    pub fn wire_once(mut self, call: Call) -> Self {
        self.wiring.push(WiringCall {
            call,
            repeat_on_reuse: false,
        });
        self
    }

    /// Set whether wiring is replayed when the component is reused, for the calls
    /// already added and the ones added after.
    pub fn rewire_on_reuse(mut self, rewire: bool) -> Self {
        self.rewire_on_reuse = rewire;
        for wiring in &mut self.wiring {
            wiring.repeat_on_reuse = rewire;
        }
        self
    }

    /// Every ledger name the step reads, declared or referenced, in first-use order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut names: Vec<&str> = self.prerequisites.iter().map(String::as_str).collect();

        match &self.action {
            Action::Deploy(deployment) => {
                names.extend(deployment.args.iter().filter_map(Arg::component_name));
            }
            Action::Configure { target } => names.push(target.as_str()),
            Action::DeployEach(deployments) => {
                for deployment in deployments {
                    names.extend(deployment.args.iter().filter_map(Arg::component_name));
                }
            }
            Action::RegisterEach(registrations) => {
                for registration in registrations {
                    names.extend(registration.components());
                }
            }
        }

        for wiring in &self.wiring {
            names.extend(wiring.call.components());
        }

        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !unique.iter().any(|known| known == name) {
                unique.push(name.to_string());
            }
        }
        unique
    }

    /// Structural check run before the step issues anything.
    ///
    /// [`Arg::Deployed`] and [`Target::Deployed`] only make sense in the wiring of a step
    /// that deploys or configures exactly one component.
    pub fn validate(&self) -> Result<(), StepViolation> {
        let single = matches!(self.action, Action::Deploy(_) | Action::Configure { .. });

        let action_uses_deployed = match &self.action {
            Action::Deploy(deployment) => deployment.args.contains(&Arg::Deployed),
            Action::DeployEach(deployments) => deployments
                .iter()
                .any(|deployment| deployment.args.contains(&Arg::Deployed)),
            Action::RegisterEach(registrations) => registrations.iter().any(|registration| {
                registration.call.uses_deployed()
                    || matches!(
                        &registration.address,
                        EntityAddress::Predicted { salt, .. } if salt.contains(&Arg::Deployed)
                    )
            }),
            Action::Configure { .. } => false,
        };
        if action_uses_deployed {
            return Err(StepViolation::DeployedBeforeAction);
        }

        if !single && self.wiring.iter().any(|wiring| wiring.call.uses_deployed()) {
            return Err(StepViolation::DeployedInBatchWiring);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_step() -> Step {
        Step::deploy(
            "deploy_router",
            Deployment::new("Router", "Router")
                .arg(Arg::component("PoolFactory"))
                .arg(Arg::component("PoolIndexer")),
        )
        .requires("PoolFactory")
        .wire(
            Call::new(Target::component("PoolFactory"), "grantRole(bytes32,address)")
                .arg(Arg::word(B256::ZERO))
                .arg(Arg::Deployed),
        )
    }

    #[test]
    fn test_dependencies_are_unique_and_ordered() {
        assert_eq!(router_step().dependencies(), vec!["PoolFactory", "PoolIndexer"]);
    }

    #[test]
    fn test_configure_depends_on_its_target() {
        let step = Step::configure("configure_router", "Router")
            .wire(Call::new(Target::Deployed, "unpause()"));
        assert_eq!(step.dependencies(), vec!["Router"]);
        assert_eq!(step.validate(), Ok(()));
    }

    #[test]
    fn test_registration_dependencies_include_factory() {
        let step = Step::register_each(
            "create_pools",
            vec![
                Registration::new(
                    "Pool:ETH",
                    "PoolFactory",
                    Call::new(Target::component("PoolFactory"), "createPool(address,address)")
                        .arg(Arg::address(Address::ZERO))
                        .arg(Arg::component("LpToken:ETH")),
                )
                .predicted("PoolFactory", vec![Arg::address(Address::ZERO)]),
            ],
        );
        assert_eq!(step.dependencies(), vec!["PoolFactory", "LpToken:ETH"]);
    }

    #[test]
    fn test_rewire_policy_applies_to_existing_calls() {
        let step = router_step().rewire_on_reuse(false);
        assert!(step.wiring.iter().all(|wiring| !wiring.repeat_on_reuse));

        let step = router_step().wire_once(Call::new(Target::Deployed, "initialize()"));
        assert!(step.wiring[0].repeat_on_reuse);
        assert!(!step.wiring[1].repeat_on_reuse);
    }

    #[test]
    fn test_validate_rejects_deployed_in_constructor() {
        let step = Step::deploy("bad", Deployment::new("Router", "Router").arg(Arg::Deployed));
        assert_eq!(step.validate(), Err(StepViolation::DeployedBeforeAction));
    }

    #[test]
    fn test_validate_rejects_deployed_in_batch_wiring() {
        let step = Step::deploy_each("tokens", vec![Deployment::new("LpToken:ETH", "LpToken")])
            .wire(Call::new(Target::Deployed, "initialize()"));
        assert_eq!(step.validate(), Err(StepViolation::DeployedInBatchWiring));
    }
}
