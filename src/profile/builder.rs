//! Builds a [`MonitorProfile`] from a monitored member.
//!
//! Optional hooks named by the attribute (value processor, show-if member
//! or event, update event) are resolved here. A hook that cannot be
//! resolved is logged at its configured severity and the profile falls
//! back to the next tier; only an ineligible member fails the build.

use crate::error::{ResolveError, ScanError};
use crate::logging::log_at;
use crate::reflect::{MemberAccess, MemberDescriptor, MonitorAttribute, TypeDescriptor, TypeIndex};
use crate::settings::MonitorSettings;
use crate::value::ValueType;

use super::classifier::classify;
use super::format::{member_label, FormatData};
use super::processor::{create_element_processor, create_processor};
use super::validator::create_validator;
use super::{MonitorProfile, OutSlot, ProfileAccess, ResolvedEvent};

/// Compiles the profile of `member`, declared on `owner`.
pub fn build_profile(
    index: &TypeIndex,
    owner: &TypeDescriptor,
    member: &MemberDescriptor,
    attribute: &MonitorAttribute,
    settings: &MonitorSettings,
) -> Result<MonitorProfile, ScanError> {
    let ineligible = |reason: String| ScanError::Ineligible {
        type_name: owner.key.to_string(),
        member: member.name.clone(),
        reason,
    };

    let classification = classify(member, &settings.scan);
    if !classification.eligible {
        return Err(ineligible(classification.reason.unwrap_or_default()));
    }

    let format = FormatData::resolve(&owner.key, owner.options.as_ref(), &member.name, attribute, settings);

    let access = match &member.access {
        MemberAccess::Field { .. } | MemberAccess::Property { .. } => {
            let get = member
                .access
                .getter()
                .cloned()
                .ok_or_else(|| ineligible("member has no getter".to_string()))?;
            let set = if attribute.write_access {
                let set = member.access.setter().cloned();
                if set.is_none() {
                    tracing::debug!(
                        declaring = %owner.key,
                        member = %member.name,
                        "write access requested on a read-only member"
                    );
                }
                set
            } else {
                None
            };
            ProfileAccess::Value { get, set }
        }
        MemberAccess::Event { .. } => ProfileAccess::Event(
            ResolvedEvent::from_member(&owner.key, member).map_err(|err| ineligible(err.to_string()))?,
        ),
        MemberAccess::Method { invoke, .. } => {
            let inputs: Vec<_> = member.inputs().collect();
            if inputs.len() != attribute.arguments.len() {
                return Err(ineligible(format!(
                    "method takes {} argument(s), attribute supplies {}",
                    inputs.len(),
                    attribute.arguments.len()
                )));
            }
            if let Some((param, arg)) = inputs
                .iter()
                .zip(&attribute.arguments)
                .find(|(param, arg)| !arg.fits(&param.value_type))
            {
                return Err(ineligible(format!(
                    "argument {arg} does not fit parameter '{}' of type {}",
                    param.name, param.value_type
                )));
            }
            let out_slots = member
                .outputs()
                .map(|param| OutSlot {
                    name: param.name.clone(),
                    value_type: param.value_type.clone(),
                    processor: create_element_processor(
                        &member_label(&param.name, &settings.names),
                        &param.value_type,
                        settings,
                    ),
                })
                .collect();
            ProfileAccess::Method {
                invoke: invoke.clone(),
                arguments: attribute.arguments.clone(),
                out_slots,
            }
        }
    };

    let processor = match access {
        ProfileAccess::Event(_) => create_element_processor(&format.label, &ValueType::Unit, settings),
        _ => create_processor(
            index,
            &owner.key,
            &member.name,
            &member.value_type,
            &format,
            attribute.value_processor.as_deref(),
            settings,
        ),
    };

    let validator = attribute
        .show_if
        .as_ref()
        .and_then(|show_if| create_validator(index, &owner.key, member, show_if, settings));

    let update_event = match (&access, attribute.update_event.as_deref()) {
        (ProfileAccess::Value { .. }, Some(name)) => {
            resolve_update_event(index, owner, member, name, settings)
        }
        (_, Some(name)) => {
            tracing::debug!(
                declaring = %owner.key,
                member = %member.name,
                event = name,
                "update events only apply to fields and properties"
            );
            None
        }
        (_, None) => None,
    };

    Ok(MonitorProfile {
        declaring_type: owner.key.clone(),
        name: member.name.clone(),
        kind: classification.kind,
        is_static: member.is_static,
        value_type: classification.value_type,
        access,
        processor,
        validator,
        update_event,
        format,
    })
}

/// Resolves an update event taking no arguments or the new value.
fn resolve_update_event(
    index: &TypeIndex,
    owner: &TypeDescriptor,
    member: &MemberDescriptor,
    name: &str,
    settings: &MonitorSettings,
) -> Option<ResolvedEvent> {
    let resolved = ResolvedEvent::resolve(index, &owner.key, name).and_then(|event| {
        let accepted = event.signature.is_empty() || event.signature == [member.value_type.clone()];
        if accepted {
            Ok(event)
        } else {
            Err(ResolveError::InvalidSignature {
                type_name: event.declaring.to_string(),
                member: name.to_string(),
                expected: format!("Event<()> or Event<{}>", member.value_type),
            })
        }
    });
    match resolved {
        Ok(event) => Some(event),
        Err(err) => {
            log_at!(
                settings.logging.update_event_not_found,
                declaring = %owner.key,
                member = %member.name,
                error = %err,
                "update event unavailable, member will be polled"
            );
            None
        }
    }
}
