//! Parameter declarations and ordered declaration sets.
//!
//! A declaration names a slot and the type it holds. Actions declare the
//! slots they consume with [`InputParam`] and the slots they produce with
//! [`OutputParam`]; the world state describes what it currently holds with
//! plain [`Param`]s. [`DeclarationSet`] keeps any of them ordered and unique by
//! name, and answers the compatibility question the engine asks on every loop
//! iteration: is this requirement set satisfied by that availability set?

use std::fmt;

use indexmap::IndexMap;

use crate::TypeTag;

/// Common view over the declaration kinds.
pub trait Declaration: Clone {
    /// Slot name, unique within a declaration set.
    fn name(&self) -> &str;
    /// Declared type of the slot.
    fn type_tag(&self) -> &TypeTag;
}

/// A named, typed slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub type_tag: TypeTag,
}

impl Param {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }
}

/// A slot an action consumes.
///
/// `deps` lists the slots that become stale whenever this slot is replaced
/// or removed by a cascading producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputParam {
    pub name: String,
    pub type_tag: TypeTag,
    pub deps: Vec<String>,
}

impl InputParam {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            deps: Vec::new(),
        }
    }

    /// Declare the slots invalidated when this one changes.
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_param(&self) -> Param {
        Param::new(self.name.clone(), self.type_tag.clone())
    }
}

/// A slot an action produces.
///
/// When `cascade` is set, replacing or removing the slot invalidates every
/// dependency declared against it by consuming actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputParam {
    pub name: String,
    pub type_tag: TypeTag,
    pub cascade: bool,
}

impl OutputParam {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            cascade: false,
        }
    }

    pub fn cascading(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    /// Same slot, retyped to the runtime type of a produced value.
    pub fn retyped(&self, type_tag: TypeTag) -> Self {
        Self {
            name: self.name.clone(),
            type_tag,
            cascade: self.cascade,
        }
    }

    pub fn to_param(&self) -> Param {
        Param::new(self.name.clone(), self.type_tag.clone())
    }
}

macro_rules! impl_declaration {
    ($($ty:ty),+) => {
        $(
            impl Declaration for $ty {
                fn name(&self) -> &str {
                    &self.name
                }

                fn type_tag(&self) -> &TypeTag {
                    &self.type_tag
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}: {}", self.name, self.type_tag)
                }
            }
        )+
    };
}

impl_declaration!(Param, InputParam, OutputParam);

/// Ordered collection of declarations, unique by name.
#[derive(Debug, Clone)]
pub struct DeclarationSet<D> {
    params: IndexMap<String, D>,
}

impl<D> Default for DeclarationSet<D> {
    fn default() -> Self {
        Self { params: IndexMap::new() }
    }
}

impl<D: Declaration> DeclarationSet<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&D> {
        self.params.get(name)
    }

    /// Declaration at `index` in insertion order.
    pub fn get_index(&self, index: usize) -> Option<&D> {
        self.params.get_index(index).map(|(_, param)| param)
    }

    /// Insert or replace by name. A replaced declaration keeps its position.
    pub fn add(&mut self, param: D) {
        self.params.insert(param.name().to_string(), param);
    }

    /// Remove by name; absent names are ignored.
    pub fn remove(&mut self, name: &str) -> Option<D> {
        self.params.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.params.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Compatibility test: every slot required here is available in
    /// `available` with the same or a narrower type.
    ///
    /// A requirement for a general type accepts a more specific available
    /// type; a requirement for a specific type never accepts a more general
    /// one. Runs in O(len of `self`).
    pub fn is_satisfied_by<A: Declaration>(&self, available: &DeclarationSet<A>) -> bool {
        self.params.iter().all(|(name, required)| {
            available
                .get(name)
                .is_some_and(|offered| offered.type_tag().is_subtype_of(required.type_tag()))
        })
    }
}

impl<D: Declaration> FromIterator<D> for DeclarationSet<D> {
    fn from_iter<T: IntoIterator<Item = D>>(iter: T) -> Self {
        let mut set = Self::new();
        for param in iter {
            set.add(param);
        }
        set
    }
}

impl<'a, D: Declaration> IntoIterator for &'a DeclarationSet<D> {
    type Item = &'a D;
    type IntoIter = indexmap::map::Values<'a, String, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.values()
    }
}
