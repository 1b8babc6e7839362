//! Startup, cancellation and cross-thread registration.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use livemon::reflect::{Monitored, TypeDescriptor};
use livemon::settings::LoggingSettings;
use livemon::{
    Assembly, MonitorAttribute, MonitorSettings, MonitorTarget, MonitoringContext, Registration, ScanError,
    StartupState, Target, TypeBuilder, TypeCatalog, TypeKey,
};

struct Crate {
    weight: AtomicI32,
}

impl MonitorTarget for Crate {}

impl Monitored for Crate {
    fn describe() -> TypeDescriptor {
        TypeBuilder::<Crate>::new()
            .field("weight", |c: &Crate| c.weight.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new())
            .build()
    }
}

fn settings() -> MonitorSettings {
    let mut settings = MonitorSettings::default();
    settings.display.rich_text = false;
    settings.logging = LoggingSettings::silent();
    settings
}

fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_assembly(Assembly::new("game").with::<Crate>())
        .with_assembly(Assembly::new("plugins").with_loader(|| {
            Err(ScanError::TypeLoad {
                assembly: "plugins".to_string(),
                type_name: "Broken".to_string(),
                reason: "missing dependency".to_string(),
            })
        }))
}

fn new_crate(weight: i32) -> Target {
    Arc::new(Crate {
        weight: AtomicI32::new(weight),
    })
}

#[test]
fn registrations_before_startup_are_queued() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    let early = new_crate(4);
    assert!(matches!(context.register_target(Arc::clone(&early)), Registration::Queued));
    assert!(matches!(
        context.register_target(Arc::clone(&early)),
        Registration::AlreadyRegistered
    ));

    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    context.events().on_profiling_completed(move |summary| {
        sink.store(summary.instance_handles.len(), Ordering::Relaxed);
    });

    context.start(&catalog()).unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 1);
    assert_eq!(context.handles_for_target(&early)[0].state(), "Weight: 4");

    let report = context.registry().unwrap().report();
    assert_eq!(report.type_failures, 1);
    assert_eq!(report.profiles_built, 1);
}

#[test]
fn late_completion_subscriber_is_replayed() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    context.register_target(new_crate(1));
    context.start(&catalog()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&calls);
    let token = context.events().on_profiling_completed(move |summary| {
        assert_eq!(summary.handle_count(), 1);
        sink.fetch_add(1, Ordering::Relaxed);
    });
    assert!(token.is_none());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn background_scan_completes_on_await() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    let target = new_crate(9);
    context.start_background(catalog()).unwrap();
    assert_eq!(context.startup_state(), StartupState::Scanning);
    context.register_target(Arc::clone(&target));

    let state = context.await_startup(Duration::from_secs(10)).unwrap();
    assert_eq!(state, StartupState::Ready);
    assert_eq!(context.handles_for_target(&target).len(), 1);
    assert!(context.events().is_profiling_completed());
}

#[test]
fn background_scan_completes_through_tick() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    context.start_background(catalog()).unwrap();
    for _ in 0..1000 {
        context.tick();
        if context.startup_state() != StartupState::Scanning {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(context.startup_state(), StartupState::Ready);
}

#[test]
fn cancelled_startup_creates_nothing() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    let target = new_crate(2);
    context.register_target(Arc::clone(&target));
    context.cancel_startup();

    let err = context.start(&catalog()).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(context.startup_state(), StartupState::Cancelled);
    assert_eq!(context.all_handles().count(), 0);
    assert_eq!(context.polled_count(), 0);
    assert_eq!(context.validated_count(), 0);
    assert!(!context.events().is_profiling_completed());
    assert!(matches!(context.register_target(target), Registration::Ignored));
}

#[test]
fn cancelled_background_scan_reports_cancellation() {
    let mut context = MonitoringContext::new(settings()).unwrap();
    context.cancel_startup();
    context.start_background(catalog()).unwrap();
    let err = context.await_startup(Duration::from_secs(10)).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(context.tick(), livemon::TickReport::default());
    assert_eq!(context.startup_state(), StartupState::Cancelled);
}

#[test]
fn remote_registration_applies_on_tick() {
    let mut context = started();
    let remote = context.remote();
    let target = new_crate(7);
    let sent = Arc::clone(&target);
    thread::spawn(move || remote.register(sent).unwrap()).join().unwrap();
    assert!(!context.is_registered(&target));

    context.tick();
    assert_eq!(context.handles_for_target(&target).len(), 1);

    let remote = context.remote();
    let sent = Arc::clone(&target);
    thread::spawn(move || remote.unregister(sent).unwrap()).join().unwrap();
    context.tick();
    assert!(!context.is_registered(&target));
}

#[test]
fn targets_without_monitored_members_get_no_handles() {
    struct Rock;
    impl MonitorTarget for Rock {}

    let mut context = started();
    let rock: Target = Arc::new(Rock);
    let Registration::Registered(handles) = context.register_target(Arc::clone(&rock)) else {
        panic!("expected registration");
    };
    assert!(handles.is_empty());
    assert!(!context.is_registered(&rock));
    assert_eq!(context.unregister_target(&rock), 0);
}

#[test]
fn settings_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("livemon.toml");
    std::fs::write(&path, "[display]\nrich_text = false\n\n[scan]\nbanned_assemblies = [\"^plugins$\"]\n").unwrap();

    let mut settings = MonitorSettings::load(&path).unwrap();
    settings.logging = LoggingSettings::silent();
    let mut context = MonitoringContext::new(settings).unwrap();
    context.start(&catalog()).unwrap();

    let report = context.registry().unwrap().report();
    assert_eq!(report.assemblies_skipped, 1);
    assert_eq!(report.type_failures, 0);
    assert!(context.registry().unwrap().declared_profiles(&TypeKey::of::<Crate>()).len() == 1);
}

fn started() -> MonitoringContext {
    let mut context = MonitoringContext::new(settings()).unwrap();
    context.start(&catalog()).unwrap();
    context
}
