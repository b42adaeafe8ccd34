//! Actions: declared units of domain logic.
//!
//! An [`Action`] is built once through [`ActionBuilder`], which records the
//! slots it consumes and produces alongside its body, and never changes
//! afterwards. The engine asks it two things: whether the current world state
//! can feed it ([`Action::can_invoke_with`]) and what it produces when run
//! against that state ([`Action::invoke`]).

mod body;

use std::{any::Any, fmt, future::Future};

use actionflow_types::{Declaration, DeclarationSet, InputParam, OutputParam, TypeTag, Update};
use indexmap::IndexMap;
use tracing::debug;

pub use body::{Inputs, Outputs};
use body::ActionBody;

use crate::{
    error::{EngineError, Result},
    store::WorldState,
};

/// Placeholder used in summaries when a declaration set is empty.
const EMPTY_SUMMARY: &str = "None\n";

pub struct Action {
    name: String,
    terminal: bool,
    description: String,
    inputs: DeclarationSet<InputParam>,
    outputs: DeclarationSet<OutputParam>,
    body: ActionBody,
}

impl Action {
    pub fn builder(name: impl Into<String>) -> ActionBuilder {
        ActionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether running this action ends the run loop.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_declarations(&self) -> &DeclarationSet<InputParam> {
        &self.inputs
    }

    pub fn output_declarations(&self) -> &DeclarationSet<OutputParam> {
        &self.outputs
    }

    /// Whether every declared input is available in `available` with a
    /// compatible type.
    pub fn can_invoke_with<D: Declaration>(&self, available: &DeclarationSet<D>) -> bool {
        self.inputs.is_satisfied_by(available)
    }

    pub fn get_input_declaration(&self, name: &str) -> Option<&InputParam> {
        self.inputs.get(name)
    }

    /// Run the body against `store` and pair what it produced with the
    /// output declarations.
    ///
    /// Declarations paired with a new value carry that value's runtime type,
    /// refined with the supertypes of the declared output type when both
    /// name the same type.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingParameter`] when a declared input has no value.
    /// - [`EngineError::ActionFailed`] when the body itself fails.
    /// - [`EngineError::ShapeMismatch`] / [`EngineError::OutputNameMismatch`]
    ///   when the produced outputs do not line up with the declarations.
    pub fn invoke(&self, store: &WorldState) -> Result<Vec<(OutputParam, Update)>> {
        let mut values = IndexMap::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let value = store.get(&input.name).ok_or_else(|| EngineError::MissingParameter {
                action: self.name.clone(),
                name: input.name.clone(),
            })?;
            values.insert(input.name.clone(), value.clone());
        }

        debug!(action = %self.name, inputs = values.len(), "invoking action");
        let outputs = self.body.call(Inputs::new(values))?.map_err(|source| EngineError::ActionFailed {
            action: self.name.clone(),
            source,
        })?;
        self.pair_outputs(outputs)
    }

    fn pair_outputs(&self, outputs: Outputs) -> Result<Vec<(OutputParam, Update)>> {
        if self.outputs.is_empty() {
            return Ok(Vec::new());
        }
        if outputs.is_empty() {
            return Ok(self.outputs.iter().map(|declaration| (declaration.clone(), Update::Unchanged)).collect());
        }
        if outputs.len() != self.outputs.len() {
            return Err(EngineError::ShapeMismatch {
                action: self.name.clone(),
                expected: self.outputs.len(),
                actual: outputs.len(),
            });
        }

        self.outputs
            .iter()
            .zip(outputs.into_entries())
            .enumerate()
            .map(|(position, (declaration, (name, update)))| {
                if let Some(name) = name.filter(|name| *name != declaration.name) {
                    return Err(EngineError::OutputNameMismatch {
                        action: self.name.clone(),
                        position,
                        expected: declaration.name.clone(),
                        actual: name,
                    });
                }
                Ok(match update {
                    Update::Set(value) => {
                        let value = value.refined(&declaration.type_tag);
                        (declaration.retyped(value.type_tag().clone()), Update::Set(value))
                    }
                    Update::Unchanged | Update::Removed => (declaration.clone(), update),
                })
            })
            .collect()
    }

    /// Human-readable input and output summaries, one `name: Type` line per
    /// declaration.
    pub fn get_info(&self) -> [String; 2] {
        [summarize(&self.inputs), summarize(&self.outputs)]
    }
}

fn summarize<D: Declaration + fmt::Display>(declarations: &DeclarationSet<D>) -> String {
    if declarations.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }
    declarations.iter().map(|declaration| format!("{declaration}\n")).collect()
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("terminal", &self.terminal)
            .field("inputs", &self.inputs.names().collect::<Vec<_>>())
            .field("outputs", &self.outputs.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Declarative description of an action, validated by [`ActionBuilder::build`].
pub struct ActionBuilder {
    name: String,
    terminal: bool,
    description: String,
    inputs: Vec<InputParam>,
    outputs: Vec<OutputParam>,
    body: Option<ActionBody>,
}

impl ActionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminal: false,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            body: None,
        }
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, input: InputParam) -> Self {
        self.inputs.push(input);
        self
    }

    /// Shorthand for an input of type `T` without dependencies.
    pub fn requires<T: Any>(self, name: impl Into<String>) -> Self {
        self.input(InputParam::new(name, TypeTag::of::<T>()))
    }

    pub fn output(mut self, output: OutputParam) -> Self {
        self.outputs.push(output);
        self
    }

    /// Shorthand for a non-cascading output of type `T`.
    pub fn produces<T: Any>(self, name: impl Into<String>) -> Self {
        self.output(OutputParam::new(name, TypeTag::of::<T>()))
    }

    /// Body run to completion on the calling thread.
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&Inputs) -> anyhow::Result<Outputs> + Send + Sync + 'static,
    {
        self.body = Some(ActionBody::blocking(body));
        self
    }

    /// Body that may await other asynchronous work. The engine still waits
    /// for it to finish before doing anything else.
    pub fn suspendable_body<F, Fut>(mut self, body: F) -> Self
    where
        F: Fn(Inputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outputs>> + Send + 'static,
    {
        self.body = Some(ActionBody::suspendable(body));
        self
    }

    /// Validate the declarations and produce the action.
    ///
    /// # Errors
    ///
    /// Declaration faults: no body, a duplicated input or output name, or an
    /// output with an empty name.
    pub fn build(self) -> Result<Action> {
        let Some(body) = self.body else {
            return Err(EngineError::MissingBody { action: self.name });
        };
        let inputs = collect_unique(&self.name, "input", self.inputs)?;
        if self.outputs.iter().any(|output| output.name.is_empty()) {
            return Err(EngineError::EmptyOutputName { action: self.name });
        }
        let outputs = collect_unique(&self.name, "output", self.outputs)?;

        Ok(Action {
            name: self.name,
            terminal: self.terminal,
            description: self.description,
            inputs,
            outputs,
            body,
        })
    }
}

fn collect_unique<D: Declaration>(action: &str, kind: &'static str, declarations: Vec<D>) -> Result<DeclarationSet<D>> {
    let mut set = DeclarationSet::new();
    for declaration in declarations {
        if set.contains(declaration.name()) {
            return Err(EngineError::DuplicateDeclaration {
                action: action.to_string(),
                kind,
                name: declaration.name().to_string(),
            });
        }
        set.add(declaration);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use actionflow_types::{Param, ParamValue};

    use super::*;

    fn store_with(entries: Vec<(&str, ParamValue)>) -> WorldState {
        let mut store = WorldState::new();
        for (name, value) in entries {
            let param = Param::new(name, value.type_tag().clone());
            store.set(param, Some(value)).unwrap();
        }
        store
    }

    fn adder() -> Action {
        Action::builder("add")
            .requires::<i64>("base")
            .input(InputParam::new("increment", TypeTag::of::<i64>()).with_deps(Vec::<String>::new()))
            .produces::<i64>("result")
            .description("adds its inputs")
            .body(|inputs| Ok(Outputs::one(inputs.get::<i64>("base")? + inputs.get::<i64>("increment")?)))
            .build()
            .unwrap()
    }

    #[test]
    fn declarations_are_recorded_in_order() {
        let action = adder();
        let inputs: Vec<&str> = action.input_declarations().names().collect();
        assert_eq!(inputs, vec!["base", "increment"]);
        assert_eq!(action.output_declarations().len(), 1);
        assert_eq!(action.output_declarations().get_index(0).map(|o| o.name.as_str()), Some("result"));
        assert!(!action.is_terminal());
        assert_eq!(action.description(), "adds its inputs");
    }

    #[test]
    fn invoke_returns_the_single_output() {
        let action = adder();
        let store = store_with(vec![("base", ParamValue::new(10_i64)), ("increment", ParamValue::new(5_i64))]);
        assert!(action.can_invoke_with(store.declarations()));

        let produced = action.invoke(&store).unwrap();
        assert_eq!(produced.len(), 1);
        let (declaration, update) = &produced[0];
        assert_eq!(declaration.name, "result");
        assert_eq!(declaration.type_tag, TypeTag::of::<i64>());
        assert_eq!(update.value().and_then(|value| value.downcast_ref::<i64>()), Some(&15));
    }

    #[test]
    fn missing_input_is_reported_by_name() {
        let action = adder();
        let store = store_with(vec![("base", ParamValue::new(10_i64))]);
        assert!(!action.can_invoke_with(store.declarations()));

        let error = action.invoke(&store).unwrap_err();
        assert!(matches!(error, EngineError::MissingParameter { ref name, .. } if name == "increment"));
    }

    #[test]
    fn actions_without_outputs_return_nothing() {
        let action = Action::builder("log")
            .body(|_| Ok(Outputs::one("ignored".to_string())))
            .build()
            .unwrap();
        assert!(action.invoke(&WorldState::new()).unwrap().is_empty());
    }

    #[test]
    fn multiple_outputs_pair_positionally() {
        let action = Action::builder("split")
            .produces::<String>("head")
            .output(OutputParam::new("tail", TypeTag::any()).cascading(true))
            .body(|_| Ok(Outputs::none().push(Update::set("a".to_string())).set("tail", vec![1_u8, 2])))
            .build()
            .unwrap();

        let produced = action.invoke(&WorldState::new()).unwrap();
        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].0.name, "head");
        assert_eq!(produced[1].0.name, "tail");
        assert!(produced[1].0.cascade);
        assert_eq!(produced[1].0.type_tag, TypeTag::of::<Vec<u8>>(), "runtime type replaces the declared one");
    }

    #[test]
    fn outputs_of_the_declared_type_keep_its_supertypes() {
        let number = TypeTag::named("Number");
        let action = Action::builder("measure")
            .output(OutputParam::new("reading", TypeTag::of::<f64>().extends(&number)))
            .body(|_| Ok(Outputs::one(2.5_f64)))
            .build()
            .unwrap();

        let produced = action.invoke(&WorldState::new()).unwrap();
        let (declaration, update) = &produced[0];
        assert!(declaration.type_tag.is_subtype_of(&number));
        assert!(update.value().is_some_and(|value| value.is_instance_of(&number)));
    }

    #[test]
    fn empty_outputs_leave_every_slot_unchanged() {
        let action = Action::builder("maybe").produces::<i64>("value").body(|_| Ok(Outputs::none())).build().unwrap();
        let produced = action.invoke(&WorldState::new()).unwrap();
        assert!(matches!(produced.as_slice(), [(_, Update::Unchanged)]));
    }

    #[test]
    fn output_count_mismatch_is_a_shape_fault() {
        let action = Action::builder("pair")
            .produces::<i64>("left")
            .produces::<i64>("right")
            .body(|_| Ok(Outputs::one(1_i64)))
            .build()
            .unwrap();
        let error = action.invoke(&WorldState::new()).unwrap_err();
        assert!(matches!(error, EngineError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn misnamed_output_is_rejected() {
        let action = Action::builder("named").produces::<i64>("value").body(|_| Ok(Outputs::none().set("other", 1_i64))).build().unwrap();
        let error = action.invoke(&WorldState::new()).unwrap_err();
        assert!(matches!(error, EngineError::OutputNameMismatch { position: 0, .. }));
    }

    #[test]
    fn body_errors_carry_the_action_name() {
        let action = Action::builder("flaky").body(|_| anyhow::bail!("upstream unavailable")).build().unwrap();
        let error = action.invoke(&WorldState::new()).unwrap_err();
        assert_eq!(error.to_string(), "action 'flaky' failed: upstream unavailable");
    }

    #[test]
    fn builder_rejects_malformed_declarations() {
        assert!(matches!(Action::builder("no-body").build(), Err(EngineError::MissingBody { .. })));

        let duplicate = Action::builder("dup").requires::<i64>("x").requires::<u8>("x").body(|_| Ok(Outputs::none())).build();
        assert!(matches!(duplicate, Err(EngineError::DuplicateDeclaration { kind: "input", .. })));

        let unnamed = Action::builder("unnamed").produces::<i64>("").body(|_| Ok(Outputs::none())).build();
        assert!(matches!(unnamed, Err(EngineError::EmptyOutputName { .. })));
    }

    #[test]
    fn info_lists_declarations_or_none() {
        let [inputs, outputs] = adder().get_info();
        assert_eq!(inputs, "base: i64\nincrement: i64\n");
        assert_eq!(outputs, "result: i64\n");

        let bare = Action::builder("bare").body(|_| Ok(Outputs::none())).build().unwrap();
        assert_eq!(bare.get_info(), ["None\n".to_string(), "None\n".to_string()]);
    }

    #[test]
    fn suspendable_actions_complete_before_returning() {
        let action = Action::builder("wait")
            .requires::<u64>("delay_ms")
            .produces::<String>("status")
            .suspendable_body(|inputs: Inputs| async move {
                let delay = *inputs.get::<u64>("delay_ms")?;
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                Ok::<_, anyhow::Error>(Outputs::one("ready".to_string()))
            })
            .build()
            .unwrap();

        let store = store_with(vec![("delay_ms", ParamValue::new(5_u64))]);
        let produced = action.invoke(&store).unwrap();
        assert_eq!(produced[0].1.value().and_then(|value| value.downcast_ref::<String>()).map(String::as_str), Some("ready"));
    }
}
