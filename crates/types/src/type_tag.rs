//! Runtime type identities and their subtype order.
//!
//! Declarations and values carry a [`TypeTag`] instead of a static Rust type so
//! the engine can compare an available value against a requirement that was
//! only known when an action was registered. Tags form an explicit partial
//! order: a tag is a subtype of itself, of every tag it [`extends`](TypeTag::extends)
//! (transitively), of [`TypeTag::any`], and of any union containing one of those.
//!
//! A Rust type can also declare its supertypes once for the whole process with
//! [`TypeTag::declare_supertypes`]; every later [`TypeTag::of`] for that type,
//! including the tag of each [`ParamValue::new`](crate::ParamValue::new), then
//! carries them.

use std::{
    any::{TypeId, type_name},
    collections::{HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, PoisonError, RwLock},
};

use once_cell::sync::Lazy;
use regex::Regex;

static MODULE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Za-z_][A-Za-z0-9_]*::)+").expect("module path regex should compile"));

/// Supertypes declared per Rust type, already closed transitively.
static DECLARED_SUPERTYPES: Lazy<RwLock<HashMap<TypeId, HashSet<TagKey>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Separator used when rendering union members, kept from the diagram format.
const UNION_SEPARATOR: &str = "｜";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TagKey {
    Rust(TypeId),
    Named(String),
    Union(Vec<TagKey>),
    Any,
}

#[derive(Debug)]
enum TagKind {
    Single,
    Any,
    Union(Vec<TypeTag>),
}

#[derive(Debug)]
struct TagInner {
    key: TagKey,
    name: String,
    kind: TagKind,
    ancestors: HashSet<TagKey>,
}

/// Explicit runtime type identity used by declarations and values.
///
/// Tags are cheap to clone. Two tags are equal when they name the same Rust
/// type or the same abstract name; the declared supertypes do not take part
/// in equality.
#[derive(Clone)]
pub struct TypeTag {
    inner: Arc<TagInner>,
}

impl TypeTag {
    /// Tag for a concrete Rust type, named by its path-stripped type name.
    ///
    /// The tag carries whatever supertypes were declared for `T` through
    /// [`declare_supertypes`](Self::declare_supertypes).
    pub fn of<T: ?Sized + 'static>() -> Self {
        let type_id = TypeId::of::<T>();
        let ancestors = DECLARED_SUPERTYPES
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
            .unwrap_or_default();
        Self::with_ancestors(TagKey::Rust(type_id), short_type_name(type_name::<T>()), TagKind::Single, ancestors)
    }

    /// Record, for the rest of the process, that `T` is a subtype of every tag
    /// in `parents` and of everything those extend. Returns the updated tag.
    ///
    /// Declarations accumulate; declare a parent's own supertypes before
    /// naming it here so they are picked up.
    pub fn declare_supertypes<T: ?Sized + 'static>(parents: impl IntoIterator<Item = TypeTag>) -> Self {
        {
            let mut registry = DECLARED_SUPERTYPES.write().unwrap_or_else(PoisonError::into_inner);
            let ancestors = registry.entry(TypeId::of::<T>()).or_default();
            for parent in parents {
                ancestors.insert(parent.inner.key.clone());
                ancestors.extend(parent.inner.ancestors.iter().cloned());
            }
        }
        Self::of::<T>()
    }

    /// Abstract tag identified only by its name, usable as a declared supertype.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::build(TagKey::Named(name.clone()), name, TagKind::Single)
    }

    /// Top type: every tag is a subtype of it.
    pub fn any() -> Self {
        Self::build(TagKey::Any, "Any".to_string(), TagKind::Any)
    }

    /// Union of several tags. A tag is a subtype of the union when it is a
    /// subtype of at least one member.
    pub fn one_of(members: impl IntoIterator<Item = TypeTag>) -> Self {
        let members: Vec<TypeTag> = members.into_iter().collect();
        let name = members.iter().map(|member| member.name().to_string()).collect::<Vec<_>>().join(UNION_SEPARATOR);
        let key = TagKey::Union(members.iter().map(|member| member.inner.key.clone()).collect());
        Self::build(key, name, TagKind::Union(members))
    }

    fn build(key: TagKey, name: String, kind: TagKind) -> Self {
        Self::with_ancestors(key, name, kind, HashSet::new())
    }

    fn with_ancestors(key: TagKey, name: String, kind: TagKind, ancestors: HashSet<TagKey>) -> Self {
        Self {
            inner: Arc::new(TagInner {
                key,
                name,
                kind,
                ancestors,
            }),
        }
    }

    /// Returns a copy of this tag that also extends `parent` and everything
    /// `parent` extends.
    pub fn extends(&self, parent: &TypeTag) -> Self {
        let mut ancestors = self.inner.ancestors.clone();
        ancestors.insert(parent.inner.key.clone());
        ancestors.extend(parent.inner.ancestors.iter().cloned());
        self.with_ancestor_set(ancestors)
    }

    /// This tag, also carrying the supertypes `declared` knows of when both
    /// name the same type.
    ///
    /// A value built from a bare Rust type only knows its declared supertypes;
    /// refining it against the slot it is stored in keeps the `extends`
    /// closure the slot was declared with. Tags of another identity are left
    /// as they are.
    pub fn refine(&self, declared: &TypeTag) -> Self {
        if self.inner.key != declared.inner.key || declared.inner.ancestors.is_subset(&self.inner.ancestors) {
            return self.clone();
        }
        let ancestors = self.inner.ancestors.union(&declared.inner.ancestors).cloned().collect();
        self.with_ancestor_set(ancestors)
    }

    fn with_ancestor_set(&self, ancestors: HashSet<TagKey>) -> Self {
        let kind = match &self.inner.kind {
            TagKind::Single => TagKind::Single,
            TagKind::Any => TagKind::Any,
            TagKind::Union(members) => TagKind::Union(members.clone()),
        };
        Self::with_ancestors(self.inner.key.clone(), self.inner.name.clone(), kind, ancestors)
    }

    /// Display name of the tag.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The Rust type this tag was created for, if any.
    pub fn rust_type_id(&self) -> Option<TypeId> {
        match self.inner.key {
            TagKey::Rust(type_id) => Some(type_id),
            _ => None,
        }
    }

    /// Members of a union tag; empty for every other tag.
    pub fn members(&self) -> &[TypeTag] {
        match &self.inner.kind {
            TagKind::Union(members) => members,
            _ => &[],
        }
    }

    /// Whether a value of this tag may stand in where `other` is required.
    pub fn is_subtype_of(&self, other: &TypeTag) -> bool {
        if matches!(other.inner.kind, TagKind::Any) {
            return true;
        }
        if let TagKind::Union(members) = &self.inner.kind {
            return !members.is_empty() && members.iter().all(|member| member.is_subtype_of(other));
        }
        if let TagKind::Union(members) = &other.inner.kind {
            return members.iter().any(|member| self.is_subtype_of(member));
        }
        if matches!(self.inner.kind, TagKind::Any) {
            return false;
        }
        self.inner.key == other.inner.key || self.inner.ancestors.contains(&other.inner.key)
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.inner.name)
    }
}

/// Strip module paths from a `std::any::type_name` rendering.
fn short_type_name(full: &str) -> String {
    MODULE_PATH.replace_all(full, "").into_owned()
}
