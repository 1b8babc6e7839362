//! Eligibility of members for monitoring.

use crate::reflect::{MemberAccess, MemberDescriptor, MemberKind, Visibility};
use crate::settings::ScanSettings;
use crate::value::ValueType;

/// Result of classifying one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub eligible: bool,
    pub value_type: ValueType,
    pub kind: MemberKind,
    /// Why the member was rejected.
    pub reason: Option<String>,
}

impl Classification {
    fn accept(member: &MemberDescriptor) -> Self {
        Self {
            eligible: true,
            value_type: member.value_type.clone(),
            kind: member.kind(),
            reason: None,
        }
    }

    fn reject(member: &MemberDescriptor, reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            value_type: member.value_type.clone(),
            kind: member.kind(),
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether `member` can be monitored and extracts its value type.
///
/// Out-parameters of stack-only types are accepted because method handles
/// render them through an erased processor; everywhere else such types,
/// and pointers, are rejected.
#[must_use]
pub fn classify(member: &MemberDescriptor, settings: &ScanSettings) -> Classification {
    if member.visibility == Visibility::Private && !settings.include_non_public {
        return Classification::reject(member, "non-public members are excluded");
    }

    match &member.access {
        MemberAccess::Field { .. } => classify_value(member),
        MemberAccess::Property { get, .. } => {
            if get.is_none() {
                Classification::reject(member, "property has no getter")
            } else {
                classify_value(member)
            }
        }
        MemberAccess::Event { .. } => match &member.value_type {
            ValueType::Delegate(args) if args.iter().all(ValueType::is_supported) => {
                Classification::accept(member)
            }
            ValueType::Delegate(_) => {
                Classification::reject(member, "event signature has unsupported argument types")
            }
            other => Classification::reject(member, format!("event has non-delegate type {other}")),
        },
        MemberAccess::Method { .. } => classify_method(member, settings),
    }
}

fn classify_value(member: &MemberDescriptor) -> Classification {
    if member.value_type.is_supported() && member.value_type != ValueType::Unit {
        Classification::accept(member)
    } else {
        Classification::reject(member, format!("type {} cannot be monitored", member.value_type))
    }
}

fn classify_method(member: &MemberDescriptor, settings: &ScanSettings) -> Classification {
    let arity = member.inputs().count();
    if arity > settings.max_method_arity {
        return Classification::reject(
            member,
            format!("method takes {arity} arguments, at most {} allowed", settings.max_method_arity),
        );
    }
    if let Some(param) = member.inputs().find(|p| !p.value_type.is_supported()) {
        return Classification::reject(
            member,
            format!("parameter '{}' has unsupported type {}", param.name, param.value_type),
        );
    }
    if let Some(param) = member
        .outputs()
        .find(|p| !p.value_type.is_supported() && !matches!(p.value_type, ValueType::ByRefLike(_)))
    {
        return Classification::reject(
            member,
            format!("out-parameter '{}' has unsupported type {}", param.name, param.value_type),
        );
    }
    let returns = member.value_type != ValueType::Unit;
    if returns && !member.value_type.is_supported() {
        return Classification::reject(member, format!("return type {} cannot be monitored", member.value_type));
    }
    if !returns && member.outputs().next().is_none() {
        return Classification::reject(member, "method produces no value");
    }
    Classification::accept(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::reflect::{invoker, MethodOutput, ParamDescriptor, TypeBuilder};

    struct Probe {
        value: i32,
        changed: Event<()>,
    }

    fn member(desc: &crate::reflect::TypeDescriptor, name: &str) -> MemberDescriptor {
        desc.member(name).cloned().unwrap()
    }

    fn noop() -> crate::reflect::Invoker {
        invoker(|_, _| Ok(MethodOutput::default()))
    }

    #[test]
    fn test_fields_and_events_are_eligible() {
        let desc = TypeBuilder::<Probe>::new()
            .field("value", |p: &Probe| p.value)
            .event("changed", |p: &Probe| &p.changed)
            .build();
        let settings = ScanSettings::default();

        let c = classify(&member(&desc, "value"), &settings);
        assert!(c.eligible);
        assert_eq!(c.value_type, ValueType::I32);
        assert_eq!(c.kind, MemberKind::Field);

        let c = classify(&member(&desc, "changed"), &settings);
        assert!(c.eligible);
        assert_eq!(c.value_type, ValueType::Delegate(Vec::new()));
    }

    #[test]
    fn test_private_members_respect_settings() {
        let desc = TypeBuilder::<Probe>::new()
            .field("value", |p: &Probe| p.value)
            .private()
            .build();
        let strict = ScanSettings {
            include_non_public: false,
            ..ScanSettings::default()
        };
        assert!(!classify(&member(&desc, "value"), &strict).eligible);
        assert!(classify(&member(&desc, "value"), &ScanSettings::default()).eligible);
    }

    #[test]
    fn test_write_only_property_rejected() {
        let desc = TypeBuilder::<Probe>::new()
            .write_only_property("value", |_: &Probe, _: i32| {})
            .build();
        let c = classify(&member(&desc, "value"), &ScanSettings::default());
        assert!(!c.eligible);
        assert!(c.reason.unwrap().contains("getter"));
    }

    #[test]
    fn test_pointer_field_rejected() {
        let mut m = member(&TypeBuilder::<Probe>::new().field("value", |p: &Probe| p.value).build(), "value");
        m.value_type = ValueType::Pointer;
        assert!(!classify(&m, &ScanSettings::default()).eligible);
    }

    #[test]
    fn test_method_rules() {
        let settings = ScanSettings::default();
        let desc = TypeBuilder::<Probe>::new()
            .method_raw("void", false, ValueType::Unit, Vec::new(), noop())
            .method_raw(
                "span_out",
                false,
                ValueType::Unit,
                vec![ParamDescriptor::output("span", ValueType::ByRefLike("Span".into()))],
                noop(),
            )
            .method_raw(
                "too_many",
                false,
                ValueType::I32,
                vec![
                    ParamDescriptor::input("a", ValueType::I32),
                    ParamDescriptor::input("b", ValueType::I32),
                    ParamDescriptor::input("c", ValueType::I32),
                ],
                noop(),
            )
            .method_raw(
                "ptr_out",
                false,
                ValueType::I32,
                vec![ParamDescriptor::output("p", ValueType::Pointer)],
                noop(),
            )
            .method("ok", |p: &Probe| p.value)
            .build();

        assert!(!classify(&member(&desc, "void"), &settings).eligible);
        assert!(classify(&member(&desc, "span_out"), &settings).eligible);
        assert!(!classify(&member(&desc, "too_many"), &settings).eligible);
        assert!(!classify(&member(&desc, "ptr_out"), &settings).eligible);
        assert!(classify(&member(&desc, "ok"), &settings).eligible);
    }
}
