//! Monitored host objects and type identity.
//!
//! Live objects implement [`MonitorTarget`]. A target reports its runtime
//! [`TypeKey`] and hands out views of itself for the supertypes it plays the
//! role of, which is how members declared on a "base type" or "interface"
//! reach the right sub-object without inheritance.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Stable identity of a monitored type.
///
/// Built from [`std::any::type_name`] for Rust types, or from an explicit
/// name for virtual contracts that only exist in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    /// Key of a Rust type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Key with an explicit name.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Full name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Name without module path or generic arguments.
    #[must_use]
    pub fn short_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upcast helper implemented for every sized `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A live object whose annotated members can be monitored.
///
/// The defaults cover a type that is only monitored through its own
/// descriptor. Override [`MonitorTarget::view`] to expose embedded
/// components for supertypes:
///
/// ```
/// use std::any::Any;
/// use livemon::{MonitorTarget, TypeKey};
///
/// struct Actor { hp: i32 }
/// struct Player { actor: Actor, name: String }
///
/// impl MonitorTarget for Player {
///     fn view(&self, declaring: &TypeKey) -> Option<&dyn Any> {
///         if *declaring == TypeKey::of::<Actor>() {
///             Some(&self.actor)
///         } else if *declaring == TypeKey::of::<Player>() {
///             Some(self)
///         } else {
///             None
///         }
///     }
/// }
/// ```
pub trait MonitorTarget: AsAny + Send + Sync {
    /// Runtime type of this object.
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// The sub-object playing the role of `declaring`, if any.
    fn view(&self, declaring: &TypeKey) -> Option<&dyn Any> {
        (*declaring == TypeKey::of::<Self>()).then(|| self.as_any())
    }
}

/// Shared reference to a registered target.
pub type Target = Arc<dyn MonitorTarget>;

impl fmt::Debug for dyn MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_key())
    }
}

/// Identity of a registered target, derived from its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    #[must_use]
    pub fn of(target: &Target) -> Self {
        Self(Arc::as_ptr(target).cast::<()>() as usize)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Resolves the view a member accessor runs against.
///
/// Static members get `None`; instance members need a target exposing
/// `declaring`.
pub(crate) fn view_for<'a>(
    target: Option<&'a dyn MonitorTarget>,
    declaring: &TypeKey,
    is_static: bool,
    member: &str,
) -> Result<Option<&'a dyn Any>, AccessError> {
    if is_static {
        return Ok(None);
    }
    let target = target.ok_or_else(|| AccessError::MissingTarget {
        member: member.to_string(),
    })?;
    target
        .view(declaring)
        .map(Some)
        .ok_or_else(|| AccessError::TargetMismatch {
            member: member.to_string(),
            expected: declaring.to_string(),
        })
}

/// Downcasts an accessor view to the declaring Rust type.
pub(crate) fn downcast<'a, T: Any>(
    view: Option<&'a dyn Any>,
    member: &str,
) -> Result<&'a T, AccessError> {
    let view = view.ok_or_else(|| AccessError::MissingTarget {
        member: member.to_string(),
    })?;
    view.downcast_ref::<T>()
        .ok_or_else(|| AccessError::TargetMismatch {
            member: member.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
}
