//! Monitor profiles: immutable, compiled metadata per monitored member.
//!
//! A profile is built once during the startup scan and shared by every
//! handle of its member. It owns the compiled accessors, the value
//! processor, the optional validator, the optional update event and the
//! resolved display data.

/// Profile construction from member descriptors.
pub mod builder;
/// Member eligibility rules.
pub mod classifier;
/// Display metadata.
pub mod format;
/// Number format strings.
pub mod number_format;
/// Value-to-text processors.
pub mod processor;
/// Startup scan and profile lookup.
pub mod registry;
/// Show-if predicates.
pub mod validator;

use std::fmt;

use crate::error::{AccessError, ResolveError};
use crate::event::EventSource;
use crate::reflect::{
    guard, EventAccessor, Getter, Invoker, MemberAccess, MemberDescriptor, MemberKind, MethodOutput, Setter,
    TypeIndex,
};
use crate::target::{view_for, MonitorTarget, TypeKey};
use crate::value::{Value, ValueType};

pub use builder::build_profile;
pub use classifier::{classify, Classification};
pub use format::FormatData;
pub use number_format::NumberFormat;
pub use processor::{ProcessorSource, ValueProcessor};
pub use registry::{CancellationToken, ProfileRegistry, ScanOutcome, ScanReport};
pub use validator::Validator;

/// An event member located on a declaring type or one of its supertypes.
#[derive(Clone)]
pub struct ResolvedEvent {
    /// Type that declares the event.
    pub declaring: TypeKey,
    pub name: String,
    pub is_static: bool,
    pub signature: Vec<ValueType>,
    source: EventAccessor,
}

impl ResolvedEvent {
    /// Finds the event `name` on `declaring` or its supertypes.
    pub fn resolve(index: &TypeIndex, declaring: &TypeKey, name: &str) -> Result<Self, ResolveError> {
        let (owner, member) = index
            .find_member(declaring, name)
            .ok_or_else(|| ResolveError::MemberNotFound {
                type_name: declaring.to_string(),
                member: name.to_string(),
            })?;
        Self::from_member(&owner.key, member)
    }

    /// Wraps an event member declared on `declaring`.
    pub fn from_member(declaring: &TypeKey, member: &MemberDescriptor) -> Result<Self, ResolveError> {
        let invalid = |expected: &str| ResolveError::InvalidSignature {
            type_name: declaring.to_string(),
            member: member.name.clone(),
            expected: expected.to_string(),
        };
        let MemberAccess::Event { source } = &member.access else {
            return Err(invalid("event"));
        };
        let ValueType::Delegate(signature) = &member.value_type else {
            return Err(invalid("event with a delegate signature"));
        };
        Ok(Self {
            declaring: declaring.clone(),
            name: member.name.clone(),
            is_static: member.is_static,
            signature: signature.clone(),
            source: source.clone(),
        })
    }

    /// The event object on `target`, or the static event.
    pub fn source<'a>(&self, target: Option<&'a dyn MonitorTarget>) -> Result<&'a dyn EventSource, AccessError> {
        let view = view_for(target, &self.declaring, self.is_static, &self.name)?;
        (self.source)(view)
    }
}

impl fmt::Debug for ResolvedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedEvent")
            .field("declaring", &self.declaring)
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// An out-parameter of a monitored method with its own processor.
#[derive(Debug, Clone)]
pub struct OutSlot {
    pub name: String,
    pub value_type: ValueType,
    pub processor: ValueProcessor,
}

/// Compiled access of a profile, one variant per handle kind.
#[derive(Clone)]
pub enum ProfileAccess {
    /// Field or property. `set` is present only with write access enabled.
    Value { get: Getter, set: Option<Setter> },
    /// Monitored event.
    Event(ResolvedEvent),
    /// Method invoked with fixed arguments on every refresh.
    Method {
        invoke: Invoker,
        arguments: Vec<Value>,
        out_slots: Vec<OutSlot>,
    },
}

impl fmt::Debug for ProfileAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { set, .. } => f
                .debug_struct("Value")
                .field("writable", &set.is_some())
                .finish_non_exhaustive(),
            Self::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Self::Method { arguments, out_slots, .. } => f
                .debug_struct("Method")
                .field("arguments", arguments)
                .field("out_slots", out_slots)
                .finish_non_exhaustive(),
        }
    }
}

/// Compiled metadata of one monitored member.
#[derive(Debug, Clone)]
pub struct MonitorProfile {
    pub declaring_type: TypeKey,
    pub name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    /// Field/property type, method return type, or event signature.
    pub value_type: ValueType,
    pub access: ProfileAccess,
    pub processor: ValueProcessor,
    pub validator: Option<Validator>,
    /// Event raised by the target when the value changes.
    pub update_event: Option<ResolvedEvent>,
    pub format: FormatData,
}

impl MonitorProfile {
    /// True if handles of this profile must be refreshed every tick.
    #[must_use]
    pub const fn receive_tick(&self) -> bool {
        match self.access {
            ProfileAccess::Value { .. } => self.update_event.is_none(),
            ProfileAccess::Event(_) => false,
            ProfileAccess::Method { .. } => true,
        }
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        matches!(self.access, ProfileAccess::Value { set: Some(_), .. })
    }

    /// Reads the current value of a field or property.
    pub fn read(&self, target: Option<&dyn MonitorTarget>) -> Result<Value, AccessError> {
        let ProfileAccess::Value { get, .. } = &self.access else {
            return Err(AccessError::NotReadable {
                member: self.name.clone(),
            });
        };
        let view = view_for(target, &self.declaring_type, self.is_static, &self.name)?;
        guard(|| get(view))
    }

    /// Writes a field or property.
    pub fn write(&self, target: Option<&dyn MonitorTarget>, value: &Value) -> Result<(), AccessError> {
        let ProfileAccess::Value { set: Some(set), .. } = &self.access else {
            return Err(AccessError::NotWritable {
                member: self.name.clone(),
            });
        };
        if !value.fits(&self.value_type) {
            return Err(AccessError::TypeMismatch {
                member: self.name.clone(),
                expected: self.value_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
        let view = view_for(target, &self.declaring_type, self.is_static, &self.name)?;
        guard(|| set(view, value))
    }

    /// Invokes a monitored method with its configured arguments.
    pub fn call(&self, target: Option<&dyn MonitorTarget>) -> Result<MethodOutput, AccessError> {
        let ProfileAccess::Method { invoke, arguments, .. } = &self.access else {
            return Err(AccessError::NotReadable {
                member: self.name.clone(),
            });
        };
        let view = view_for(target, &self.declaring_type, self.is_static, &self.name)?;
        guard(|| invoke(view, arguments))
    }
}
