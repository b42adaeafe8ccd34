//! World state: the live values the engine's actions read from.
//!
//! The store pairs a [`DeclarationSet`] describing what it holds with the
//! values themselves. Both maps always contain exactly the same names.

use std::any::Any;

use actionflow_types::{DeclarationSet, Param, ParamValue};
use indexmap::IndexMap;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default)]
pub struct WorldState {
    declarations: DeclarationSet<Param>,
    values: IndexMap<String, ParamValue>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `param`, or remove the slot when `value` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TypeMismatch`] when the value's runtime type is
    /// not a subtype of the declared type. The store is left untouched.
    ///
    /// A value of exactly the declared type picks up the supertypes the
    /// declaration extends.
    pub fn set(&mut self, param: Param, value: Option<ParamValue>) -> Result<()> {
        let Some(value) = value else {
            self.remove(&param.name);
            return Ok(());
        };
        let value = value.refined(&param.type_tag);
        if !value.is_instance_of(&param.type_tag) {
            return Err(EngineError::TypeMismatch {
                name: param.name,
                expected: param.type_tag.to_string(),
                actual: value.type_tag().to_string(),
            });
        }
        self.values.insert(param.name.clone(), value);
        self.declarations.add(param);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Current value of `name` when it holds a `T`.
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(ParamValue::downcast_ref::<T>)
    }

    /// Remove a slot. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.values.shift_remove(name).is_some();
        self.declarations.remove(name);
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// What the store currently holds, for compatibility checks.
    pub fn declarations(&self) -> &DeclarationSet<Param> {
        &self.declarations
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Param, &ParamValue)> {
        self.declarations.iter().filter_map(|param| self.values.get(&param.name).map(|value| (param, value)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use actionflow_types::TypeTag;

    use super::*;

    fn assert_lockstep(state: &WorldState) {
        let declared: Vec<&str> = state.declarations().names().collect();
        let valued: Vec<&str> = state.values.keys().map(String::as_str).collect();
        assert_eq!(declared, valued);
    }

    #[test]
    fn set_then_get_returns_the_same_value() {
        let mut state = WorldState::new();
        let value = ParamValue::new(42_i64);
        state.set(Param::new("answer", TypeTag::of::<i64>()), Some(value.clone())).unwrap();

        assert!(state.get("answer").unwrap().ptr_eq(&value));
        assert_eq!(state.get_as::<i64>("answer"), Some(&42));
        assert_lockstep(&state);
    }

    #[test]
    fn setting_none_removes_the_slot() {
        let mut state = WorldState::new();
        let param = Param::new("greeting", TypeTag::of::<String>());
        state.set(param.clone(), Some(ParamValue::new("hello".to_string()))).unwrap();
        state.set(param, None).unwrap();

        assert!(state.get("greeting").is_none());
        assert!(!state.declarations().contains("greeting"));
        assert_lockstep(&state);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut state = WorldState::new();
        state.set(Param::new("a", TypeTag::of::<u8>()), Some(ParamValue::new(1_u8))).unwrap();

        assert!(state.remove("a"));
        assert!(!state.remove("a"));
        assert!(!state.remove("never-set"));
        assert!(state.is_empty());
        assert_lockstep(&state);
    }

    #[test]
    fn wrong_runtime_type_is_rejected() {
        let mut state = WorldState::new();
        let error = state.set(Param::new("ratio", TypeTag::of::<f64>()), Some(ParamValue::new(10_i64))).unwrap_err();

        assert!(matches!(error, EngineError::TypeMismatch { ref name, .. } if name == "ratio"));
        assert!(state.is_empty());
    }

    #[test]
    fn subtype_values_fit_general_slots() {
        let mut state = WorldState::new();
        let shape = TypeTag::named("Shape");
        let square = ParamValue::tagged(TypeTag::of::<u32>().extends(&shape), 4_u32).unwrap();
        state.set(Param::new("shape", shape), Some(square)).unwrap();

        assert_eq!(state.get_as::<u32>("shape"), Some(&4));
        assert_eq!(state.declarations().get("shape").map(|p| p.type_tag.name()), Some("Shape"));
    }

    #[test]
    fn stored_values_inherit_the_declared_supertypes() {
        let mut state = WorldState::new();
        let shape = TypeTag::named("Shape");
        let circle = TypeTag::of::<f32>().extends(&shape);
        state.set(Param::new("circle", circle), Some(ParamValue::new(1.5_f32))).unwrap();

        assert!(state.get("circle").unwrap().is_instance_of(&shape));
    }
}
