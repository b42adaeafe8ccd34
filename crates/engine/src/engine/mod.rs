//! The engine: action registry, world state and the selection loop.
//!
//! A run stores the caller's base state under [`BASE_PARAM`], optionally
//! invokes an entry point with explicit arguments, and then repeats:
//!
//! 1. collect every registered action whose inputs the store can satisfy,
//! 2. ask the [`SelectionPolicy`] to pick one,
//! 3. invoke it and apply each produced [`Update`] to the store,
//!    cascading invalidation from outputs declared as cascading,
//! 4. stop once a terminal action has run.

mod cascade;
mod policy;

use std::any::Any;

use actionflow_types::{OutputParam, Param, ParamValue, TypeTag, Update};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use policy::{FirstCandidate, PreferAction, SelectionPolicy};

use crate::{
    action::{Action, ActionBuilder},
    config::EngineConfig,
    error::{EngineError, Result},
    graph::{ActionNode, DependencyGraph},
    store::WorldState,
};

/// Reserved slot holding the run's base state.
pub const BASE_PARAM: &str = "base";

/// Explicit first action of a run, with its argument values.
///
/// Positional values bind to the entry action's inputs in declaration order;
/// keyword values bind by input name.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    action: String,
    args: Vec<ParamValue>,
    kwargs: IndexMap<String, ParamValue>,
}

impl EntryPoint {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
        }
    }

    pub fn arg<T: Any + Send + Sync>(self, value: T) -> Self {
        self.arg_value(ParamValue::new(value))
    }

    pub fn arg_value(mut self, value: ParamValue) -> Self {
        self.args.push(value);
        self
    }

    pub fn kwarg<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.kwarg_value(name, ParamValue::new(value))
    }

    pub fn kwarg_value(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Selection loop iterations, the entry point excluded.
    pub iterations: u64,
    /// Names of the actions executed, in order, the entry point included.
    pub trail: Vec<String>,
}

pub struct Engine<B> {
    actions: IndexMap<String, Action>,
    store: WorldState,
    policy: Box<dyn SelectionPolicy<B>>,
    graph: Option<DependencyGraph<ActionNode>>,
    config: EngineConfig,
}

impl<B: Any + Send + Sync> Engine<B> {
    pub fn new<P>(policy: P) -> Self
    where
        P: SelectionPolicy<B> + 'static,
    {
        Self::with_config(policy, EngineConfig::default())
    }

    pub fn with_config<P>(policy: P, config: EngineConfig) -> Self
    where
        P: SelectionPolicy<B> + 'static,
    {
        Self {
            actions: IndexMap::new(),
            store: WorldState::new(),
            policy: Box::new(policy),
            graph: config.track_graph.then(DependencyGraph::new),
            config,
        }
    }

    /// Build an action and register it.
    ///
    /// `configure` receives a builder already carrying the name, terminal
    /// flag and description, and adds the declarations and body.
    pub fn action<F>(&mut self, name: impl Into<String>, terminal: bool, description: impl Into<String>, configure: F) -> Result<&Action>
    where
        F: FnOnce(ActionBuilder) -> ActionBuilder,
    {
        let builder = Action::builder(name).terminal(terminal).description(description);
        self.register(configure(builder).build()?)
    }

    /// Register an action, replacing any action with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CascadeCycle`] when the action's input
    /// dependencies would close a cascade cycle; the registry is unchanged.
    pub fn register(&mut self, action: Action) -> Result<&Action> {
        let edges = cascade::invalidation_edges(
            self.actions
                .values()
                .filter(|existing| existing.name() != action.name())
                .chain(std::iter::once(&action)),
        );
        if let Some(path) = cascade::find_cycle(&edges) {
            return Err(EngineError::CascadeCycle { path });
        }

        debug!(
            action = %action.name(),
            terminal = action.is_terminal(),
            inputs = action.input_declarations().len(),
            outputs = action.output_declarations().len(),
            "registering action"
        );
        let (position, replaced) = self.actions.insert_full(action.name().to_string(), action);
        if replaced.is_some() {
            debug!(action = %self.actions[position].name(), "replaced previously registered action");
        }
        self.link_in_graph(position);
        Ok(&self.actions[position])
    }

    /// Connect the action at `position` to every producer of its inputs and
    /// every consumer of its outputs, itself included.
    fn link_in_graph(&mut self, position: usize) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let action = &self.actions[position];
        graph.detach(action.name());
        let node = graph.add_node(ActionNode::from(action));

        for other in self.actions.values() {
            let other_node = graph.add_node(ActionNode::from(other));
            for output in action.output_declarations() {
                if other.input_declarations().contains(&output.name) {
                    graph.connect(node, other_node, output.name.clone());
                }
            }
            for output in other.output_declarations() {
                if action.input_declarations().contains(&output.name) {
                    graph.connect(other_node, node, output.name.clone());
                }
            }
        }
    }

    /// Run until a terminal action has executed.
    ///
    /// # Errors
    ///
    /// Any fault raised by the store, an action, the selection policy or the
    /// iteration limit aborts the run and is returned as is.
    pub fn run(&mut self, base_state: B, entry_point: Option<EntryPoint>) -> Result<RunSummary> {
        self.store.set(Param::new(BASE_PARAM, TypeTag::of::<B>()), Some(ParamValue::new(base_state)))?;
        info!(actions = self.actions.len(), entry_point = ?entry_point.as_ref().map(EntryPoint::action), "starting run");

        let mut summary = RunSummary::default();
        if let Some(entry_point) = entry_point {
            let name = entry_point.action.clone();
            self.run_entry_point(entry_point)?;
            summary.trail.push(name);
        }

        loop {
            if let Some(limit) = self.config.max_iterations.filter(|&limit| summary.iterations >= limit) {
                return Err(EngineError::IterationLimit { limit });
            }

            let candidates: Vec<&Action> =
                self.actions.values().filter(|action| action.can_invoke_with(self.store.declarations())).collect();
            debug!(
                iteration = summary.iterations,
                candidates = ?candidates.iter().map(|action| action.name()).collect::<Vec<_>>(),
                "filtered candidate actions"
            );

            let base = self.store.get_as::<B>(BASE_PARAM).ok_or_else(|| EngineError::MissingParameter {
                action: "selection policy".to_string(),
                name: BASE_PARAM.to_string(),
            })?;
            let Some(index) = self.policy.select(base, &candidates) else {
                warn!(candidates = candidates.len(), "selection policy chose nothing");
                return Err(EngineError::NoSelection {
                    candidates: candidates.len(),
                });
            };
            let Some(action) = candidates.get(index).copied() else {
                warn!(index, candidates = candidates.len(), "selection policy chose an index out of range");
                return Err(EngineError::InvalidSelection {
                    index,
                    candidates: candidates.len(),
                });
            };

            let name = action.name().to_string();
            let terminal = action.is_terminal();
            let produced = action.invoke(&self.store)?;
            self.apply_all(produced)?;

            summary.iterations += 1;
            summary.trail.push(name);
            if terminal {
                info!(action = ?summary.trail.last(), iterations = summary.iterations, "terminal action reached");
                break;
            }
        }
        Ok(summary)
    }

    fn run_entry_point(&mut self, entry_point: EntryPoint) -> Result<()> {
        let EntryPoint { action, args, kwargs } = entry_point;
        let entry = self.actions.get(&action).ok_or_else(|| EngineError::UnknownAction { name: action.clone() })?;
        if args.len() > entry.input_declarations().len() {
            return Err(EngineError::TooManyArguments {
                action,
                expected: entry.input_declarations().len(),
                actual: args.len(),
            });
        }

        for (input, value) in entry.input_declarations().iter().zip(args) {
            self.store.set(input.to_param(), Some(value))?;
        }
        for (name, value) in kwargs {
            let input = entry.get_input_declaration(&name).ok_or_else(|| EngineError::UnknownParameter {
                action: action.clone(),
                name: name.clone(),
            })?;
            self.store.set(input.to_param(), Some(value))?;
        }

        debug!(action = %action, "invoking entry point");
        let produced = entry.invoke(&self.store)?;
        self.apply_all(produced)
    }

    fn apply_all(&mut self, produced: Vec<(OutputParam, Update)>) -> Result<()> {
        for (declaration, update) in produced {
            self.apply(declaration, update)?;
        }
        Ok(())
    }

    /// Fold one produced update into the store.
    fn apply(&mut self, declaration: OutputParam, update: Update) -> Result<()> {
        match update {
            Update::Unchanged => {
                debug!(param = %declaration.name, "output left unchanged");
                return Ok(());
            }
            Update::Removed => {
                debug!(param = %declaration.name, cascade = declaration.cascade, "removing output");
                self.store.remove(&declaration.name);
            }
            Update::Set(value) => {
                debug!(param = %declaration.name, type_tag = %value.type_tag(), cascade = declaration.cascade, "storing output");
                self.store.set(declaration.to_param(), Some(value))?;
            }
        }
        if declaration.cascade {
            self.cascade(&declaration.name);
        }
        Ok(())
    }

    /// Remove every slot declared stale by a change to `name`, transitively.
    pub fn cascade(&mut self, name: &str) {
        let edges = cascade::invalidation_edges(self.actions.values());
        for stale in cascade::stale_slots(&edges, name) {
            let removed = self.store.remove(&stale);
            debug!(origin = %name, param = %stale, removed, "cascade invalidated parameter");
        }
    }

    pub fn store(&self) -> &WorldState {
        &self.store
    }

    /// The base state of the current or last run.
    pub fn base_state(&self) -> Option<&B> {
        self.store.get_as::<B>(BASE_PARAM)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn get_action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&DependencyGraph<ActionNode>> {
        self.graph.as_ref()
    }

    /// Mermaid diagram of the producer/consumer graph, when tracked.
    pub fn display(&self) -> Option<String> {
        self.graph.as_ref().map(DependencyGraph::render_mermaid)
    }

    /// Renderer URL for [`display`](Self::display): the configured base URL
    /// followed by the URL-safe base64 encoding of the diagram.
    pub fn diagram_url(&self) -> Option<String> {
        self.display().map(|diagram| format!("{}{}", self.config.renderer_url, URL_SAFE.encode(diagram.as_bytes())))
    }
}
