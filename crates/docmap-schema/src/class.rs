//! Class identity for mapped types.
//!
//! A "class" is any Rust type that can be turned into a document and rebuilt
//! from one. Its identity is the [`TypeId`] of the type, paired with a short
//! human-readable name used for default index names and error messages.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A type whose instances map onto documents.
///
/// The default [`Mapped::class_name`] is the unqualified type name, so a
/// `crate::model::Tweet` is named `Tweet` and indexes as `tweet` unless an
/// explicit index is declared.
pub trait Mapped: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the class, used for default index names.
    fn class_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Stable identity of a mapped class.
#[derive(Clone, Copy)]
pub struct ClassId {
    type_id: TypeId,
    name: &'static str,
}

impl ClassId {
    /// The identity of `T`.
    pub fn of<T: Mapped>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::class_name(),
        }
    }

    /// The class name (unqualified).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The underlying type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns `true` if this is the identity of `T`.
    pub fn is<T: Mapped>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

// Identity is the type id alone; the name is informational.
impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.name)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strip the module path and generic arguments from a type name.
///
/// `app::model::Tweet` becomes `Tweet`; `app::Page<app::Tweet>` becomes `Page`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(pos) => &full[..pos],
        None => full,
    };
    match base.rfind("::") {
        Some(pos) => &base[pos + 2..],
        None => base,
    }
}
