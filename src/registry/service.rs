//! Loaded registry and its reloadable handle.

use crate::registry::{
    config::{RegistryConfig, WorkflowConfig},
    domain::{
        AuthorizationError, GateDefinition, GateId, Glossary, MergeGateDefinition, Persona,
        PersonaId, RegistryError, StateName, WorkflowName, WorkflowTemplate,
    },
};
use minijinja::Environment;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Persona authorization data and workflow templates for one configuration
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    version: String,
    personas: BTreeMap<PersonaId, Persona>,
    workflows: BTreeMap<WorkflowName, WorkflowTemplate>,
    default_workflow: WorkflowName,
    glossary: Glossary,
    unblock_template: String,
}

impl Registry {
    /// Builds and validates a registry from a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when any identifier, workflow chain,
    /// capability reference, or the unblock template is invalid.
    pub fn from_config(config: RegistryConfig) -> Result<Self, RegistryError> {
        let version = config.version.trim().to_owned();
        if version.is_empty() {
            return Err(RegistryError::EmptyVersion);
        }
        validate_unblock_template(&config.unblock_template)?;

        let personas = build_personas(&config)?;
        let mut workflows = BTreeMap::new();
        let mut sequence_gates = BTreeSet::new();
        for workflow_config in &config.workflows {
            let template = build_workflow(workflow_config, &personas)?;
            for gate in template.gates() {
                if !sequence_gates.insert(gate.name().clone()) {
                    return Err(RegistryError::DuplicateGate(gate.name().clone()));
                }
            }
            let name = template.name().clone();
            if workflows.insert(name.clone(), template).is_some() {
                return Err(RegistryError::DuplicateWorkflow(name));
            }
        }

        let merge_gates: BTreeSet<&GateId> = workflows
            .values()
            .map(|template| template.merge_gate().name())
            .collect();
        if let Some(collision) = merge_gates
            .iter()
            .find(|gate| sequence_gates.contains(**gate))
        {
            return Err(RegistryError::DuplicateGate((*collision).clone()));
        }
        for persona in personas.values() {
            if let Some(unknown) = persona
                .capabilities()
                .iter()
                .find(|gate| !sequence_gates.contains(*gate) && !merge_gates.contains(gate))
            {
                return Err(RegistryError::UnknownCapability {
                    persona: persona.id().clone(),
                    gate: unknown.clone(),
                });
            }
        }

        let default_workflow = WorkflowName::new(config.default_workflow)?;
        if !workflows.contains_key(&default_workflow) {
            return Err(RegistryError::UnknownWorkflow(default_workflow));
        }

        Ok(Self {
            version,
            personas,
            workflows,
            default_workflow,
            glossary: Glossary::new(config.glossary.terms, config.glossary.domains),
            unblock_template: config.unblock_template,
        })
    }

    /// Parses and builds a registry from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when parsing or validation fails.
    pub fn from_toml_str(document: &str) -> Result<Self, RegistryError> {
        Self::from_config(RegistryConfig::from_toml_str(document)?)
    }

    /// Builds the registry from the bundled default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the bundled document is invalid.
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::from_config(RegistryConfig::bundled()?)
    }

    /// Decides whether `persona` may execute `gate`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] naming the violated rule when the
    /// persona is unknown or lacks the capability.
    pub fn authorize(&self, persona: &PersonaId, gate: &GateId) -> Result<(), AuthorizationError> {
        let entry = self
            .personas
            .get(persona)
            .ok_or_else(|| AuthorizationError::UnknownPersona(persona.clone()))?;
        if entry.can_execute(gate) {
            Ok(())
        } else {
            Err(AuthorizationError::MissingCapability {
                persona: persona.clone(),
                gate: gate.clone(),
            })
        }
    }

    /// Returns the capability set of `persona`, or `None` when unknown.
    #[must_use]
    pub fn capabilities_of(&self, persona: &PersonaId) -> Option<&BTreeSet<GateId>> {
        self.personas.get(persona).map(Persona::capabilities)
    }

    /// Returns the persona definition, if registered.
    #[must_use]
    pub fn persona(&self, persona: &PersonaId) -> Option<&Persona> {
        self.personas.get(persona)
    }

    /// Returns the configuration version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a workflow template.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownWorkflow`] when no template has the
    /// given name.
    pub fn workflow(&self, name: &WorkflowName) -> Result<&WorkflowTemplate, RegistryError> {
        self.workflows
            .get(name)
            .ok_or_else(|| RegistryError::UnknownWorkflow(name.clone()))
    }

    /// Returns the default workflow name.
    #[must_use]
    pub const fn default_workflow(&self) -> &WorkflowName {
        &self.default_workflow
    }

    /// Returns the glossary for this version.
    #[must_use]
    pub const fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    /// Returns the unblock step template.
    #[must_use]
    pub fn unblock_template(&self) -> &str {
        &self.unblock_template
    }
}

fn validate_unblock_template(template: &str) -> Result<(), RegistryError> {
    let probe = BTreeMap::from([
        ("key", "evidence.ref"),
        ("gate", "probe.gate"),
        ("state", "PROBE"),
    ]);
    Environment::new()
        .render_str(template, probe)
        .map(drop)
        .map_err(|err| RegistryError::InvalidUnblockTemplate(err.to_string()))
}

fn build_personas(config: &RegistryConfig) -> Result<BTreeMap<PersonaId, Persona>, RegistryError> {
    let mut personas = BTreeMap::new();
    for persona_config in &config.personas {
        let id = PersonaId::new(persona_config.id.clone())?;
        let capabilities = persona_config
            .capabilities
            .iter()
            .map(|gate| GateId::new(gate.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut persona = Persona::new(id.clone(), capabilities);
        if let Some(description) = &persona_config.description {
            persona = persona.with_description(description.clone());
        }
        if personas.insert(id.clone(), persona).is_some() {
            return Err(RegistryError::DuplicatePersona(id));
        }
    }
    Ok(personas)
}

fn authorized_for<'a>(
    personas: &'a BTreeMap<PersonaId, Persona>,
    gate: &'a GateId,
) -> impl Iterator<Item = PersonaId> + 'a {
    personas
        .values()
        .filter(move |persona| persona.can_execute(gate))
        .map(|persona| persona.id().clone())
}

fn build_workflow(
    config: &WorkflowConfig,
    personas: &BTreeMap<PersonaId, Persona>,
) -> Result<WorkflowTemplate, RegistryError> {
    let name = WorkflowName::new(config.name.clone())?;
    let initial_state = StateName::new(config.initial_state.clone())?;

    let mut gates = Vec::with_capacity(config.gates.len());
    for (position, gate_config) in config.gates.iter().enumerate() {
        let gate_id = GateId::new(gate_config.name.clone())?;
        let gate = GateDefinition::new(
            gate_id.clone(),
            position,
            StateName::new(gate_config.from.clone())?,
            StateName::new(gate_config.to.clone())?,
        )
        .with_authorized_personas(authorized_for(personas, &gate_id))
        .with_required_inputs(gate_config.required_inputs.iter().cloned());
        gates.push(gate);
    }

    let merge_id = GateId::new(config.merge_gate.name.clone())?;
    let merge_gate = MergeGateDefinition::new(merge_id.clone())
        .with_authorized_personas(authorized_for(personas, &merge_id))
        .with_required_inputs(config.merge_gate.required_inputs.iter().cloned());

    let joinable_states = config
        .joinable_states
        .iter()
        .map(|state| StateName::new(state.clone()))
        .collect::<Result<BTreeSet<_>, _>>()?;

    WorkflowTemplate::new(name, initial_state, gates, merge_gate, joinable_states)
}

/// Reloadable holder of the active registry version.
///
/// Each request should call [`RegistryHandle::current`] once and use that
/// version throughout, so a concurrent reload never mixes two versions into
/// one decision.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<Registry>>,
}

impl RegistryHandle {
    /// Creates a handle holding `registry`.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Returns the active registry version.
    #[must_use]
    pub fn current(&self) -> Arc<Registry> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Installs a new configuration version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::VersionAlreadyLoaded`] when `registry` carries
    /// the version that is already active.
    pub fn reload(&self, registry: Registry) -> Result<(), RegistryError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if guard.version() == registry.version() {
            return Err(RegistryError::VersionAlreadyLoaded(registry.version().to_owned()));
        }
        tracing::info!(
            from = guard.version(),
            to = registry.version(),
            "registry configuration reloaded"
        );
        *guard = Arc::new(registry);
        Ok(())
    }
}
