//! Show-if validators.
//!
//! A validator is a compiled predicate deciding whether a handle is
//! visible, optionally paired with an `Event<bool>` that pushes visibility
//! changes. Unresolvable or inapplicable show-if attributes produce no
//! validator and the member stays visible.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{AccessError, ResolveError};
use crate::logging::log_at;
use crate::reflect::{Comparison, Condition, MemberAccess, MemberDescriptor, MemberKind, ShowIf, TypeIndex, ValidationMethod};
use crate::settings::MonitorSettings;
use crate::target::{view_for, MonitorTarget, TypeKey};
use crate::value::{Value, ValueType};

use super::ResolvedEvent;

type Predicate = Arc<dyn Fn(Option<&dyn MonitorTarget>, &Value) -> Result<bool, AccessError> + Send + Sync>;

/// Compiled show-if condition.
#[derive(Clone)]
pub struct Validator {
    predicate: Option<Predicate>,
    event: Option<ResolvedEvent>,
    needs_value: bool,
}

impl Validator {
    /// Evaluates the predicate. Without one, the member is visible.
    pub fn evaluate(&self, target: Option<&dyn MonitorTarget>, value: &Value) -> Result<bool, AccessError> {
        match &self.predicate {
            Some(predicate) => predicate(target, value),
            None => Ok(true),
        }
    }

    /// Event toggling visibility, if any.
    #[must_use]
    pub const fn event(&self) -> Option<&ResolvedEvent> {
        self.event.as_ref()
    }

    #[must_use]
    pub const fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// True if the predicate inspects the member's current value.
    #[must_use]
    pub const fn needs_value(&self) -> bool {
        self.needs_value
    }

    /// True if the handle must re-evaluate the predicate every tick.
    #[must_use]
    pub const fn is_polled(&self) -> bool {
        self.event.is_none() && self.predicate.is_some()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("predicate", &self.predicate.is_some())
            .field("event", &self.event)
            .field("needs_value", &self.needs_value)
            .finish()
    }
}

fn predicate(
    f: impl Fn(Option<&dyn MonitorTarget>, &Value) -> Result<bool, AccessError> + Send + Sync + 'static,
) -> Predicate {
    Arc::new(f)
}

/// Compiles the show-if attribute of `member`, declared on `declaring`.
#[must_use]
pub fn create_validator(
    index: &TypeIndex,
    declaring: &TypeKey,
    member: &MemberDescriptor,
    show_if: &ShowIf,
    settings: &MonitorSettings,
) -> Option<Validator> {
    let logging = &settings.logging;
    let mut needs_value = false;

    let predicate = show_if.method.as_ref().and_then(|method| {
        let resolved = match method {
            ValidationMethod::ByMember(name) => by_member(index, declaring, member, name),
            ValidationMethod::Comparison { comparison, other } => {
                comparison_predicate(member, *comparison, other).map(|p| Some((p, true)))
            }
            ValidationMethod::Condition(condition) => {
                condition_predicate(member, *condition).map(|p| p.map(|p| (p, true)))
            }
        };
        match resolved {
            Ok(Some((p, value))) => {
                needs_value = value;
                Some(p)
            }
            Ok(None) => None,
            Err(err) => {
                let severity = match err {
                    ResolveError::MemberNotFound { .. } => logging.validator_not_found,
                    _ => logging.invalid_validator,
                };
                log_at!(
                    severity,
                    declaring = %declaring,
                    member = %member.name,
                    error = %err,
                    "show-if condition ignored"
                );
                None
            }
        }
    });

    let event = show_if.event.as_deref().and_then(|name| {
        let resolved = ResolvedEvent::resolve(index, declaring, name).and_then(|event| {
            if event.signature == [ValueType::Bool] {
                Ok(event)
            } else {
                Err(ResolveError::InvalidSignature {
                    type_name: event.declaring.to_string(),
                    member: name.to_string(),
                    expected: "Event<bool>".to_string(),
                })
            }
        });
        match resolved {
            Ok(event) => Some(event),
            Err(err) => {
                let severity = match err {
                    ResolveError::MemberNotFound { .. } => logging.validator_not_found,
                    _ => logging.invalid_validator,
                };
                log_at!(
                    severity,
                    declaring = %declaring,
                    member = %member.name,
                    error = %err,
                    "show-if event ignored"
                );
                None
            }
        }
    });

    if predicate.is_none() && event.is_none() {
        return None;
    }
    Some(Validator {
        predicate,
        event,
        needs_value,
    })
}

/// A bool field, property or zero-argument method, or a method taking the
/// member's value and returning bool.
fn by_member(
    index: &TypeIndex,
    declaring: &TypeKey,
    monitored: &MemberDescriptor,
    name: &str,
) -> Result<Option<(Predicate, bool)>, ResolveError> {
    let (owner, member) = index
        .find_member(declaring, name)
        .ok_or_else(|| ResolveError::MemberNotFound {
            type_name: declaring.to_string(),
            member: name.to_string(),
        })?;
    let invalid = || ResolveError::InvalidSignature {
        type_name: owner.key.to_string(),
        member: name.to_string(),
        expected: format!("bool member, fn() -> bool or fn({}) -> bool", monitored.value_type),
    };

    let owner_key = owner.key.clone();
    let member_name = member.name.clone();
    let is_static = member.is_static;

    match &member.access {
        MemberAccess::Field { .. } | MemberAccess::Property { .. } => {
            let get = member.access.getter().cloned().ok_or_else(invalid)?;
            if *member.value_type.underlying() != ValueType::Bool {
                return Err(invalid());
            }
            let p = predicate(move |target, _| {
                let view = view_for(target, &owner_key, is_static, &member_name)?;
                expect_bool(&member_name, &get(view)?)
            });
            Ok(Some((p, false)))
        }
        MemberAccess::Method { invoke, params } => {
            if member.value_type != ValueType::Bool || params.iter().any(|p| p.is_out) {
                return Err(invalid());
            }
            let invoke = invoke.clone();
            match params.as_slice() {
                [] => {
                    let p = predicate(move |target, _| {
                        let view = view_for(target, &owner_key, is_static, &member_name)?;
                        expect_bool(&member_name, &invoke(view, &[])?.ret)
                    });
                    Ok(Some((p, false)))
                }
                [param] if param.value_type == monitored.value_type => {
                    let p = predicate(move |target, value| {
                        let view = view_for(target, &owner_key, is_static, &member_name)?;
                        let args = std::slice::from_ref(value);
                        expect_bool(&member_name, &invoke(view, args)?.ret)
                    });
                    Ok(Some((p, true)))
                }
                _ => Err(invalid()),
            }
        }
        MemberAccess::Event { .. } => Err(invalid()),
    }
}

fn expect_bool(member: &str, value: &Value) -> Result<bool, AccessError> {
    value.as_bool().ok_or_else(|| AccessError::TypeMismatch {
        member: member.to_string(),
        expected: "bool".to_string(),
        actual: value.type_name().to_string(),
    })
}

fn comparison_predicate(
    member: &MemberDescriptor,
    comparison: Comparison,
    other: &Value,
) -> Result<Predicate, ResolveError> {
    let value_type = &member.value_type;
    if !matches!(member.kind(), MemberKind::Field | MemberKind::Property) {
        return Err(ResolveError::ConditionNotApplicable {
            condition: format!("{comparison:?}"),
            value_type: format!("{} member", member.kind()),
        });
    }
    if comparison.is_relational() && !value_type.is_orderable() {
        return Err(ResolveError::NotOrderable {
            comparison: format!("{comparison:?}"),
            value_type: value_type.to_string(),
        });
    }
    if !other.fits(value_type) {
        return Err(ResolveError::IncompatibleOperand {
            operand: other.to_string(),
            value_type: value_type.to_string(),
        });
    }
    let other = other.clone();
    Ok(predicate(move |_, value| Ok(compare(comparison, value, &other))))
}

fn compare(comparison: Comparison, value: &Value, other: &Value) -> bool {
    let ordering = value.compare(other);
    match comparison {
        Comparison::Equals => value.loosely_equals(other),
        Comparison::NotEquals => !value.loosely_equals(other),
        Comparison::Greater => ordering == Some(Ordering::Greater),
        Comparison::GreaterOrEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        Comparison::Lesser => ordering == Some(Ordering::Less),
        Comparison::LesserOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

/// `Ok(None)` when the condition does not apply to the member's type.
fn condition_predicate(member: &MemberDescriptor, condition: Condition) -> Result<Option<Predicate>, ResolveError> {
    if !matches!(member.kind(), MemberKind::Field | MemberKind::Property) {
        return Err(ResolveError::ConditionNotApplicable {
            condition: format!("{condition:?}"),
            value_type: format!("{} member", member.kind()),
        });
    }
    if !condition_applies(condition, &member.value_type) {
        tracing::debug!(
            member = %member.name,
            condition = ?condition,
            value_type = %member.value_type,
            "condition does not apply to member type, member stays visible"
        );
        return Ok(None);
    }
    Ok(Some(predicate(move |_, value| Ok(condition_holds(condition, value)))))
}

fn condition_applies(condition: Condition, value_type: &ValueType) -> bool {
    let base = value_type.underlying();
    match condition {
        Condition::True | Condition::False => *base == ValueType::Bool,
        Condition::Null | Condition::NotNull => value_type.is_nullable(),
        Condition::Zero | Condition::NotZero | Condition::Negative | Condition::Positive => base.is_numeric(),
        Condition::NotNullOrEmptyString | Condition::NotNullOrWhiteSpace => *base == ValueType::Str,
        Condition::CollectionNotEmpty => matches!(base, ValueType::Collection(_)),
    }
}

fn condition_holds(condition: Condition, value: &Value) -> bool {
    match condition {
        Condition::True => value.as_bool() == Some(true),
        Condition::False => value.as_bool() == Some(false),
        Condition::Null => value.is_null(),
        Condition::NotNull => !value.is_null(),
        Condition::Zero => value.sign() == Some(Ordering::Equal),
        Condition::NotZero => value.is_numeric() && value.sign() != Some(Ordering::Equal),
        Condition::Negative => value.sign() == Some(Ordering::Less),
        Condition::Positive => value.sign() == Some(Ordering::Greater),
        Condition::NotNullOrEmptyString => value.as_str().is_some_and(|s| !s.is_empty()),
        Condition::NotNullOrWhiteSpace => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        Condition::CollectionNotEmpty => value.as_collection().is_some_and(|c| !c.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering as AtomicOrdering};

    use super::*;
    use crate::event::Event;
    use crate::reflect::{TypeBuilder, TypeDescriptor};
    use crate::settings::LoggingSettings;

    struct Sentry {
        hp: AtomicI32,
        alert: AtomicBool,
        name: String,
        toggled: Event<bool>,
        pinged: Event<()>,
    }

    impl MonitorTarget for Sentry {}

    fn sentry(hp: i32) -> Sentry {
        Sentry {
            hp: AtomicI32::new(hp),
            alert: AtomicBool::new(false),
            name: String::new(),
            toggled: Event::new(),
            pinged: Event::new(),
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeBuilder::<Sentry>::new()
            .field("hp", |s: &Sentry| s.hp.load(AtomicOrdering::Relaxed))
            .field("name", |s: &Sentry| s.name.clone())
            .property("alert", |s: &Sentry| s.alert.load(AtomicOrdering::Relaxed))
            .method("is_critical", |s: &Sentry| s.hp.load(AtomicOrdering::Relaxed) < 10)
            .method_with("above", "hp", |_: &Sentry, hp: i32| hp > 50)
            .method("count", |s: &Sentry| s.hp.load(AtomicOrdering::Relaxed))
            .event("toggled", |s: &Sentry| &s.toggled)
            .event("pinged", |s: &Sentry| &s.pinged)
            .build()
    }

    fn setup() -> (TypeIndex, TypeDescriptor, MonitorSettings) {
        let mut index = TypeIndex::new();
        let desc = descriptor();
        index.insert(desc.clone());
        let mut settings = MonitorSettings::default();
        settings.logging = LoggingSettings::silent();
        (index, desc, settings)
    }

    fn validator(show_if: &ShowIf, member: &str) -> Option<Validator> {
        let (index, desc, settings) = setup();
        create_validator(
            &index,
            &TypeKey::of::<Sentry>(),
            desc.member(member).unwrap(),
            show_if,
            &settings,
        )
    }

    #[test]
    fn test_by_member_property_and_method() {
        let target = sentry(5);
        let v = validator(&ShowIf::member("alert"), "hp").unwrap();
        assert!(!v.needs_value());
        assert!(v.is_polled());
        assert_eq!(v.evaluate(Some(&target), &Value::Null), Ok(false));
        target.alert.store(true, AtomicOrdering::Relaxed);
        assert_eq!(v.evaluate(Some(&target), &Value::Null), Ok(true));

        let v = validator(&ShowIf::member("is_critical"), "hp").unwrap();
        assert_eq!(v.evaluate(Some(&target), &Value::Null), Ok(true));
    }

    #[test]
    fn test_by_member_taking_value() {
        let target = sentry(5);
        let v = validator(&ShowIf::member("above"), "hp").unwrap();
        assert!(v.needs_value());
        assert_eq!(v.evaluate(Some(&target), &Value::Int(80)), Ok(true));
        assert_eq!(v.evaluate(Some(&target), &Value::Int(20)), Ok(false));
    }

    #[test]
    fn test_by_member_unresolvable() {
        assert!(validator(&ShowIf::member("missing"), "hp").is_none());
        assert!(validator(&ShowIf::member("count"), "hp").is_none());
        assert!(validator(&ShowIf::member("pinged"), "hp").is_none());
    }

    #[test]
    fn test_comparison() {
        let v = validator(&ShowIf::compare(Comparison::GreaterOrEqual, Value::Int(10)), "hp").unwrap();
        assert!(v.needs_value());
        assert_eq!(v.evaluate(None, &Value::Int(10)), Ok(true));
        assert_eq!(v.evaluate(None, &Value::Int(9)), Ok(false));

        let v = validator(&ShowIf::compare(Comparison::NotEquals, Value::UInt(3)), "hp").unwrap();
        assert_eq!(v.evaluate(None, &Value::Int(3)), Ok(false));
        assert_eq!(v.evaluate(None, &Value::Int(4)), Ok(true));
    }

    #[test]
    fn test_comparison_rejections() {
        assert!(validator(&ShowIf::compare(Comparison::Equals, Value::Str("x".into())), "hp").is_none());
        assert!(validator(&ShowIf::compare(Comparison::Greater, Value::Int(1)), "is_critical").is_none());
        assert!(validator(&ShowIf::compare(Comparison::Equals, Value::Int(1)), "toggled").is_none());
    }

    #[test]
    fn test_conditions() {
        let v = validator(&ShowIf::condition(Condition::Positive), "hp").unwrap();
        assert_eq!(v.evaluate(None, &Value::Int(5)), Ok(true));
        assert_eq!(v.evaluate(None, &Value::Int(0)), Ok(false));

        let v = validator(&ShowIf::condition(Condition::NotNullOrWhiteSpace), "name").unwrap();
        assert_eq!(v.evaluate(None, &Value::Str("  ".into())), Ok(false));
        assert_eq!(v.evaluate(None, &Value::Str("bob".into())), Ok(true));

        assert!(validator(&ShowIf::condition(Condition::Positive), "name").is_none());
        assert!(validator(&ShowIf::condition(Condition::CollectionNotEmpty), "hp").is_none());
    }

    #[test]
    fn test_event_driven() {
        let v = validator(&ShowIf::event("toggled"), "hp").unwrap();
        assert!(!v.has_predicate());
        assert!(!v.is_polled());
        assert_eq!(v.event().map(|e| e.name.as_str()), Some("toggled"));
        assert_eq!(v.evaluate(None, &Value::Null), Ok(true));

        let v = validator(&ShowIf::condition(Condition::Positive).with_event("toggled"), "hp").unwrap();
        assert!(v.has_predicate());
        assert!(!v.is_polled());

        assert!(validator(&ShowIf::event("pinged"), "hp").is_none());
    }
}
