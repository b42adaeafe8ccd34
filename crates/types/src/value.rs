//! Type-erased runtime values and per-slot updates.

use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use crate::{ParamError, TypeTag};

/// A shared, type-erased value together with its runtime [`TypeTag`].
///
/// Cloning is cheap; clones point at the same underlying value.
#[derive(Clone)]
pub struct ParamValue {
    type_tag: TypeTag,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ParamValue {
    /// Wrap a value, tagging it with its own Rust type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_tag: TypeTag::of::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Wrap a value under an explicit tag, typically one that declares
    /// supertypes via [`TypeTag::extends`].
    ///
    /// Fails when the tag was created for a different Rust type.
    pub fn tagged<T: Any + Send + Sync>(type_tag: TypeTag, value: T) -> Result<Self, ParamError> {
        if type_tag.rust_type_id().is_some_and(|type_id| type_id != TypeId::of::<T>()) {
            return Err(ParamError::TagMismatch {
                tag: type_tag.name().to_string(),
                actual: TypeTag::of::<T>().name().to_string(),
            });
        }
        Ok(Self {
            type_tag,
            inner: Arc::new(value),
        })
    }

    /// Runtime type of the wrapped value.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// The same value, its tag also carrying the supertypes `declared` knows
    /// of when both name the same type. See [`TypeTag::refine`].
    pub fn refined(&self, declared: &TypeTag) -> Self {
        Self {
            type_tag: self.type_tag.refine(declared),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether this value may be stored in a slot declared as `type_tag`.
    pub fn is_instance_of(&self, type_tag: &TypeTag) -> bool {
        self.type_tag.is_subtype_of(type_tag)
    }

    /// Whether both handles share the same underlying value.
    pub fn ptr_eq(&self, other: &ParamValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamValue({})", self.type_tag)
    }
}

/// What an action wants done with one of its output slots.
#[derive(Debug, Clone, Default)]
pub enum Update {
    /// Leave the slot as it is.
    #[default]
    Unchanged,
    /// Delete the slot.
    Removed,
    /// Store a new value in the slot.
    Set(ParamValue),
}

impl Update {
    pub fn set<T: Any + Send + Sync>(value: T) -> Self {
        Self::Set(ParamValue::new(value))
    }

    /// `Some` sets the slot, `None` removes it.
    pub fn from_option<T: Any + Send + Sync>(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::set(value),
            None => Self::Removed,
        }
    }

    pub fn value(&self) -> Option<&ParamValue> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl From<ParamValue> for Update {
    fn from(value: ParamValue) -> Self {
        Self::Set(value)
    }
}
