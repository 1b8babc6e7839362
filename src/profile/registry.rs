//! Startup scan producing the process-wide profile cache.
//!
//! The scan runs in two passes. The first loads every type descriptor of
//! every assembly that is not banned; a loader that fails or panics only
//! loses its own type. The second pass builds one profile per monitored
//! member, once all supertypes are known so hooks can resolve through
//! them. Cancellation is checked between types and between members.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;

use crate::error::{ConfigError, ScanError};
use crate::logging::log_at;
use crate::reflect::{panic_message, TypeCatalog, TypeIndex};
use crate::settings::MonitorSettings;
use crate::target::TypeKey;

use super::builder::build_profile;
use super::MonitorProfile;

/// Cooperative cancellation flag shared with a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters collected by one scan.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub assemblies_scanned: usize,
    pub assemblies_skipped: usize,
    pub types_loaded: usize,
    pub type_failures: usize,
    pub profiles_built: usize,
    pub members_rejected: usize,
    pub duration: Duration,
}

/// Result of a scan that did not fail.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ProfileRegistry),
    /// Stopped through the [`CancellationToken`]; nothing was produced.
    Cancelled,
}

/// Profiles of every monitored member, split into static and instance.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    index: TypeIndex,
    static_profiles: Vec<Arc<MonitorProfile>>,
    instance_profiles: HashMap<TypeKey, Vec<Arc<MonitorProfile>>>,
    report: ScanReport,
}

impl ProfileRegistry {
    /// Scans `catalog`.
    ///
    /// Only invalid assembly filters fail the scan. Everything else a type
    /// or member can get wrong is logged at its configured severity and
    /// skipped.
    pub fn scan(
        catalog: &TypeCatalog,
        settings: &MonitorSettings,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, ConfigError> {
        let started = Instant::now();
        let filters = settings.scan.compile_filters()?;
        let mut registry = Self::default();

        if !registry.load_types(catalog, &filters, settings, cancel) || !registry.build_profiles(settings, cancel) {
            log_at!(settings.logging.cancellation, "profile scan cancelled");
            return Ok(ScanOutcome::Cancelled);
        }

        registry.report.duration = started.elapsed();
        tracing::info!(
            types = registry.report.types_loaded,
            profiles = registry.report.profiles_built,
            rejected = registry.report.members_rejected,
            elapsed_ms = registry.report.duration.as_millis(),
            "profile scan completed"
        );
        Ok(ScanOutcome::Completed(registry))
    }

    /// Returns false if cancelled.
    fn load_types(
        &mut self,
        catalog: &TypeCatalog,
        filters: &[Regex],
        settings: &MonitorSettings,
        cancel: &CancellationToken,
    ) -> bool {
        for assembly in catalog.assemblies() {
            if filters.iter().any(|f| f.is_match(assembly.name())) {
                tracing::debug!(assembly = assembly.name(), "assembly banned by filter, skipping");
                self.report.assemblies_skipped += 1;
                continue;
            }
            self.report.assemblies_scanned += 1;

            for loader in assembly.loaders() {
                if cancel.is_cancelled() {
                    return false;
                }
                let loaded = catch_unwind(AssertUnwindSafe(|| loader())).unwrap_or_else(|payload| {
                    Err(ScanError::TypeLoad {
                        assembly: assembly.name().to_string(),
                        type_name: "<unknown>".to_string(),
                        reason: panic_message(payload.as_ref()),
                    })
                });
                match loaded {
                    Ok(descriptor) => {
                        let key = descriptor.key.clone();
                        if self.index.insert(descriptor) {
                            self.report.types_loaded += 1;
                        } else {
                            tracing::debug!(assembly = assembly.name(), type_name = %key, "duplicate type descriptor ignored");
                        }
                    }
                    Err(err) => {
                        self.report.type_failures += 1;
                        log_at!(
                            settings.logging.scan_failure,
                            assembly = assembly.name(),
                            error = %err,
                            "type failed to load, skipping"
                        );
                    }
                }
            }
        }
        true
    }

    /// Returns false if cancelled.
    fn build_profiles(&mut self, settings: &MonitorSettings, cancel: &CancellationToken) -> bool {
        let descriptors: Vec<_> = self.index.iter().cloned().collect();
        for descriptor in descriptors {
            for member in &descriptor.members {
                let Some(attribute) = &member.monitor else {
                    continue;
                };
                if cancel.is_cancelled() {
                    return false;
                }
                let built = catch_unwind(AssertUnwindSafe(|| {
                    build_profile(&self.index, &descriptor, member, attribute, settings)
                }))
                .unwrap_or_else(|payload| {
                    Err(ScanError::Ineligible {
                        type_name: descriptor.key.to_string(),
                        member: member.name.clone(),
                        reason: panic_message(payload.as_ref()),
                    })
                });
                match built {
                    Ok(profile) => {
                        self.report.profiles_built += 1;
                        let profile = Arc::new(profile);
                        if profile.is_static {
                            self.static_profiles.push(profile);
                        } else {
                            self.instance_profiles
                                .entry(descriptor.key.clone())
                                .or_default()
                                .push(profile);
                        }
                    }
                    Err(err) => {
                        self.report.members_rejected += 1;
                        log_at!(
                            settings.logging.scan_failure,
                            error = %err,
                            "monitored member skipped"
                        );
                    }
                }
            }
        }
        true
    }

    /// Instance profiles that apply to an object of type `runtime`, from
    /// the type itself and every supertype.
    ///
    /// Supertypes reachable through several paths appear once in the
    /// ancestry, so each inherited member yields exactly one profile.
    #[must_use]
    pub fn profiles_for(&self, runtime: &TypeKey) -> Vec<Arc<MonitorProfile>> {
        self.index
            .ancestry(runtime)
            .iter()
            .filter_map(|key| self.instance_profiles.get(key))
            .flatten()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn static_profiles(&self) -> &[Arc<MonitorProfile>] {
        &self.static_profiles
    }

    /// Instance profiles declared directly on `declaring`.
    #[must_use]
    pub fn declared_profiles(&self, declaring: &TypeKey) -> &[Arc<MonitorProfile>] {
        self.instance_profiles.get(declaring).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn instance_profile_count(&self) -> usize {
        self.instance_profiles.values().map(Vec::len).sum()
    }

    #[must_use]
    pub const fn index(&self) -> &TypeIndex {
        &self.index
    }

    #[must_use]
    pub const fn report(&self) -> &ScanReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI32;

    use super::*;
    use crate::reflect::{Assembly, MonitorAttribute, TypeBuilder, TypeDescriptor};
    use crate::settings::LoggingSettings;

    struct Actor {
        hp: AtomicI32,
    }

    struct Player {
        speed: f32,
    }

    static WORLD_TIME: AtomicI32 = AtomicI32::new(0);

    fn actor() -> TypeDescriptor {
        TypeBuilder::<Actor>::new()
            .implements(TypeKey::named("IDamageable"))
            .field("hp", |a: &Actor| a.hp.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new())
            .static_field("world_time", || WORLD_TIME.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new())
            .build()
    }

    fn player() -> TypeDescriptor {
        TypeBuilder::<Player>::new()
            .extends::<Actor>()
            .implements(TypeKey::named("IDamageable"))
            .field("speed", |p: &Player| p.speed)
            .monitored(MonitorAttribute::new())
            .field("unmonitored", |p: &Player| p.speed)
            .build()
    }

    fn settings() -> MonitorSettings {
        let mut settings = MonitorSettings::default();
        settings.logging = LoggingSettings::silent();
        settings
    }

    fn completed(outcome: ScanOutcome) -> ProfileRegistry {
        match outcome {
            ScanOutcome::Completed(registry) => registry,
            ScanOutcome::Cancelled => panic!("scan was cancelled"),
        }
    }

    #[test]
    fn test_scan_partitions_profiles() {
        let catalog = TypeCatalog::new().with_assembly(Assembly::new("game").with_type(player()).with_type(actor()));
        let registry = completed(ProfileRegistry::scan(&catalog, &settings(), &CancellationToken::new()).unwrap());

        assert_eq!(registry.static_profiles().len(), 1);
        assert_eq!(registry.instance_profile_count(), 2);
        assert_eq!(registry.report().types_loaded, 2);
        assert_eq!(registry.report().profiles_built, 3);

        let names: Vec<_> = registry
            .profiles_for(&TypeKey::of::<Player>())
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["speed", "hp"]);
        assert!(registry.declared_profiles(&TypeKey::named("IDamageable")).is_empty());
    }

    #[test]
    fn test_failing_loaders_are_isolated() {
        let catalog = TypeCatalog::new().with_assembly(
            Assembly::new("game")
                .with_loader(|| {
                    Err(ScanError::TypeLoad {
                        assembly: "game".into(),
                        type_name: "Generic<T>".into(),
                        reason: "open generic".into(),
                    })
                })
                .with_loader(|| panic!("loader exploded"))
                .with_type(actor()),
        );
        let registry = completed(ProfileRegistry::scan(&catalog, &settings(), &CancellationToken::new()).unwrap());
        assert_eq!(registry.report().type_failures, 2);
        assert_eq!(registry.report().types_loaded, 1);
        assert_eq!(registry.static_profiles().len(), 1);
    }

    #[test]
    fn test_banned_assemblies_skipped() {
        let catalog = TypeCatalog::new()
            .with_assembly(Assembly::new("std").with_type(actor()))
            .with_assembly(Assembly::new("game").with_type(player()));
        let registry = completed(ProfileRegistry::scan(&catalog, &settings(), &CancellationToken::new()).unwrap());
        assert_eq!(registry.report().assemblies_skipped, 1);
        assert_eq!(registry.report().assemblies_scanned, 1);
        assert!(registry.static_profiles().is_empty());
        assert_eq!(registry.profiles_for(&TypeKey::of::<Player>()).len(), 1);
    }

    #[test]
    fn test_invalid_filter_fails_scan() {
        let mut settings = settings();
        settings.scan.banned_assemblies = vec!["(".to_string()];
        let result = ProfileRegistry::scan(&TypeCatalog::new(), &settings, &CancellationToken::new());
        assert!(matches!(result, Err(ConfigError::InvalidFilter { .. })));
    }

    #[test]
    fn test_cancelled_scan_produces_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let catalog = TypeCatalog::new().with_assembly(Assembly::new("game").with_type(actor()));
        let outcome = ProfileRegistry::scan(&catalog, &settings(), &cancel).unwrap();
        assert!(matches!(outcome, ScanOutcome::Cancelled));
    }
}
