//! Explicit type catalog standing in for runtime reflection.
//!
//! Types describe their monitorable members once through [`TypeBuilder`].
//! Every accessor is compiled into a type-erased closure over `&dyn Any`, so
//! the hot path never matches on member shapes again. Descriptors are grouped
//! into named [`Assembly`] values whose loaders may fail, and a
//! [`TypeCatalog`] is what the startup scan walks.

/// Attribute vocabulary.
pub mod attributes;
/// Typed descriptor builder.
pub mod builder;
/// Lookup over loaded descriptors.
pub mod index;

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{AccessError, ScanError};
use crate::event::EventSource;
use crate::target::TypeKey;
use crate::value::{Value, ValueType};

pub use attributes::{
    Comparison, Condition, FormatOptions, MonitorAttribute, ShowIf, UiPosition, ValidationMethod,
};
pub use builder::{invoker, TypeBuilder};
pub use index::TypeIndex;

/// Compiled read accessor. Static members receive `None`.
pub type Getter = Arc<dyn Fn(Option<&dyn Any>) -> Result<Value, AccessError> + Send + Sync>;

/// Compiled write accessor. Targets mutate through interior mutability.
pub type Setter = Arc<dyn Fn(Option<&dyn Any>, &Value) -> Result<(), AccessError> + Send + Sync>;

/// Compiled accessor returning the event a member exposes.
pub type EventAccessor = Arc<
    dyn for<'a> Fn(Option<&'a dyn Any>) -> Result<&'a dyn EventSource, AccessError> + Send + Sync,
>;

/// Compiled method invocation taking the in-arguments.
pub type Invoker =
    Arc<dyn Fn(Option<&dyn Any>, &[Value]) -> Result<MethodOutput, AccessError> + Send + Sync>;

/// Return value and out-parameter values of one method call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodOutput {
    pub ret: Value,
    pub outs: Vec<Value>,
}

impl MethodOutput {
    #[must_use]
    pub const fn returning(ret: Value) -> Self {
        Self {
            ret,
            outs: Vec::new(),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Property,
    Event,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Property => write!(f, "property"),
            Self::Event => write!(f, "event"),
            Self::Method => write!(f, "method"),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// One method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// Out-parameters are produced by the call instead of passed in.
    pub is_out: bool,
}

impl ParamDescriptor {
    #[must_use]
    pub fn input(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            is_out: false,
        }
    }

    #[must_use]
    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            is_out: true,
        }
    }
}

/// Compiled accessors of a member, one variant per member shape.
#[derive(Clone)]
pub enum MemberAccess {
    Field {
        get: Getter,
        set: Option<Setter>,
    },
    Property {
        get: Option<Getter>,
        set: Option<Setter>,
    },
    Event {
        source: EventAccessor,
    },
    Method {
        invoke: Invoker,
        params: Vec<ParamDescriptor>,
    },
}

impl MemberAccess {
    #[must_use]
    pub const fn kind(&self) -> MemberKind {
        match self {
            Self::Field { .. } => MemberKind::Field,
            Self::Property { .. } => MemberKind::Property,
            Self::Event { .. } => MemberKind::Event,
            Self::Method { .. } => MemberKind::Method,
        }
    }

    /// Read accessor of a field or property.
    #[must_use]
    pub fn getter(&self) -> Option<&Getter> {
        match self {
            Self::Field { get, .. } => Some(get),
            Self::Property { get, .. } => get.as_ref(),
            _ => None,
        }
    }

    /// Write accessor of a field or property.
    #[must_use]
    pub fn setter(&self) -> Option<&Setter> {
        match self {
            Self::Field { set, .. } | Self::Property { set, .. } => set.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for MemberAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { set, .. } => f
                .debug_struct("Field")
                .field("writable", &set.is_some())
                .finish_non_exhaustive(),
            Self::Property { get, set } => f
                .debug_struct("Property")
                .field("readable", &get.is_some())
                .field("writable", &set.is_some())
                .finish(),
            Self::Event { .. } => f.debug_struct("Event").finish_non_exhaustive(),
            Self::Method { params, .. } => f
                .debug_struct("Method")
                .field("params", params)
                .finish_non_exhaustive(),
        }
    }
}

/// A member of a described type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub is_static: bool,
    pub visibility: Visibility,
    /// Field/property type, method return type, or event signature.
    pub value_type: ValueType,
    pub access: MemberAccess,
    /// Present when the member is monitored.
    pub monitor: Option<MonitorAttribute>,
}

impl MemberDescriptor {
    #[must_use]
    pub const fn kind(&self) -> MemberKind {
        self.access.kind()
    }

    #[must_use]
    pub const fn is_monitored(&self) -> bool {
        self.monitor.is_some()
    }

    /// In-parameters of a method, empty for other kinds.
    pub fn inputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params().iter().filter(|p| !p.is_out)
    }

    /// Out-parameters of a method, empty for other kinds.
    pub fn outputs(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params().iter().filter(|p| p.is_out)
    }

    fn params(&self) -> &[ParamDescriptor] {
        match &self.access {
            MemberAccess::Method { params, .. } => params,
            _ => &[],
        }
    }
}

/// Description of one type: identity, supertypes, members and type-level options.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub key: TypeKey,
    /// Base types and implemented contracts, nearest first.
    pub supertypes: Vec<TypeKey>,
    pub members: Vec<MemberDescriptor>,
    /// Aggregate options applied to every member of this type.
    pub options: Option<FormatOptions>,
}

impl TypeDescriptor {
    /// Descriptor for a virtual contract with no Rust type of its own.
    #[must_use]
    pub fn contract(key: TypeKey) -> Self {
        Self {
            key,
            supertypes: Vec::new(),
            members: Vec::new(),
            options: None,
        }
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Types that describe themselves.
pub trait Monitored: 'static {
    fn describe() -> TypeDescriptor;
}

type TypeLoader = Box<dyn Fn() -> Result<TypeDescriptor, ScanError> + Send + Sync>;

/// A named group of lazily loaded type descriptors.
pub struct Assembly {
    name: String,
    loaders: Vec<TypeLoader>,
}

impl Assembly {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaders: Vec::new(),
        }
    }

    /// Adds a type that describes itself.
    #[must_use]
    pub fn with<T: Monitored>(self) -> Self {
        self.with_loader(|| Ok(T::describe()))
    }

    /// Adds an already built descriptor.
    #[must_use]
    pub fn with_type(self, descriptor: TypeDescriptor) -> Self {
        self.with_loader(move || Ok(descriptor.clone()))
    }

    /// Adds a loader that may fail when the type is loaded during the scan.
    #[must_use]
    pub fn with_loader(
        mut self,
        loader: impl Fn() -> Result<TypeDescriptor, ScanError> + Send + Sync + 'static,
    ) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub(crate) fn loaders(&self) -> impl Iterator<Item = &TypeLoader> {
        self.loaders.iter()
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("name", &self.name)
            .field("types", &self.loaders.len())
            .finish()
    }
}

/// Every assembly the startup scan walks.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    assemblies: Vec<Assembly>,
}

impl TypeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_assembly(mut self, assembly: Assembly) -> Self {
        self.assemblies.push(assembly);
        self
    }

    pub fn add(&mut self, assembly: Assembly) {
        self.assemblies.push(assembly);
    }

    #[must_use]
    pub fn assemblies(&self) -> &[Assembly] {
        &self.assemblies
    }
}

/// Runs a user-supplied accessor, turning a panic into an [`AccessError`].
pub(crate) fn guard<R>(f: impl FnOnce() -> Result<R, AccessError>) -> Result<R, AccessError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(AccessError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Crate {
        weight: f32,
    }

    impl Monitored for Crate {
        fn describe() -> TypeDescriptor {
            TypeBuilder::<Self>::new()
                .field("weight", |c: &Self| c.weight)
                .monitored(MonitorAttribute::new())
                .build()
        }
    }

    #[test]
    fn test_assembly_loaders() {
        let assembly = Assembly::new("game")
            .with::<Crate>()
            .with_type(TypeDescriptor::contract(TypeKey::named("IPickup")))
            .with_loader(|| {
                Err(ScanError::TypeLoad {
                    assembly: "game".into(),
                    type_name: "Broken".into(),
                    reason: "generic instantiation".into(),
                })
            });
        assert_eq!(assembly.len(), 3);
        let results: Vec<_> = assembly.loaders().map(|l| l()).collect();
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().map(|d| d.key.name()), Ok("IPickup"));
        assert!(results[2].is_err());
    }

    #[test]
    fn test_member_lookup_and_kind() {
        let desc = Crate::describe();
        let member = desc.member("weight").unwrap();
        assert_eq!(member.kind(), MemberKind::Field);
        assert!(member.is_monitored());
        assert!(member.access.getter().is_some());
        assert!(member.access.setter().is_none());
        assert!(desc.member("missing").is_none());
    }

    #[test]
    fn test_guard_catches_panic() {
        let result: Result<(), AccessError> = guard(|| panic!("getter exploded"));
        assert_eq!(
            result,
            Err(AccessError::Panicked {
                message: "getter exploded".to_string()
            })
        );
        assert_eq!(guard(|| Ok(3)), Ok(3));
    }

    #[test]
    fn test_catalog_collects_assemblies() {
        let catalog = TypeCatalog::new()
            .with_assembly(Assembly::new("a"))
            .with_assembly(Assembly::new("b").with::<Crate>());
        assert_eq!(catalog.assemblies().len(), 2);
        assert!(catalog.assemblies()[0].is_empty());
    }
}
