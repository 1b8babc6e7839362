use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;

use super::*;
use crate::profile::{build_profile, ProcessorSource};
use crate::reflect::{
    invoker, Condition, MethodOutput, MonitorAttribute, ParamDescriptor, ShowIf, TypeBuilder, TypeDescriptor,
    TypeIndex,
};
use crate::value::ValueType;
use crate::settings::LoggingSettings;

struct Reactor {
    temp: AtomicI32,
    setpoint: AtomicI32,
    valve: AtomicU8,
    broken: AtomicBool,
    temp_changed: Event<i32>,
    setpoint_changed: Event<i32>,
    alarm: Event<()>,
    shown: Event<bool>,
}

impl MonitorTarget for Reactor {}

fn reactor(temp: i32) -> Arc<Reactor> {
    Arc::new(Reactor {
        temp: AtomicI32::new(temp),
        setpoint: AtomicI32::new(0),
        valve: AtomicU8::new(0),
        broken: AtomicBool::new(false),
        temp_changed: Event::new(),
        setpoint_changed: Event::new(),
        alarm: Event::new(),
        shown: Event::new(),
    })
}

fn descriptor() -> TypeDescriptor {
    TypeBuilder::<Reactor>::new()
        .writable_field(
            "temp",
            |r: &Reactor| r.temp.load(Ordering::Relaxed),
            |r: &Reactor, v: i32| r.temp.store(v, Ordering::Relaxed),
        )
        .writable_field(
            "setpoint",
            |r: &Reactor| r.setpoint.load(Ordering::Relaxed),
            |r: &Reactor, v: i32| {
                r.setpoint.store(v, Ordering::Relaxed);
                r.setpoint_changed.invoke(&v);
            },
        )
        .writable_field(
            "valve",
            |r: &Reactor| r.valve.load(Ordering::Relaxed),
            |r: &Reactor, v: u8| r.valve.store(v, Ordering::Relaxed),
        )
        .try_property("pressure", |r: &Reactor| {
            if r.broken.load(Ordering::Relaxed) {
                Err(AccessError::failed("sensor offline"))
            } else {
                Ok(r.temp.load(Ordering::Relaxed) * 2)
            }
        })
        .property("meltdown", |r: &Reactor| {
            assert!(!r.broken.load(Ordering::Relaxed), "core breach");
            false
        })
        .event("temp_changed", |r: &Reactor| &r.temp_changed)
        .event("setpoint_changed", |r: &Reactor| &r.setpoint_changed)
        .event("alarm", |r: &Reactor| &r.alarm)
        .event("shown", |r: &Reactor| &r.shown)
        .method_with_out("readout", "trend", |r: &Reactor| {
            let temp = r.temp.load(Ordering::Relaxed);
            (temp, temp > 50)
        })
        .method_raw(
            "spectrum",
            false,
            ValueType::I32,
            vec![ParamDescriptor::output("samples", ValueType::ByRefLike("Span<f32>".into()))],
            invoker(|view, _args| {
                let reactor = view
                    .and_then(|v| v.downcast_ref::<Reactor>())
                    .ok_or_else(|| AccessError::failed("not a reactor"))?;
                let temp = reactor.temp.load(Ordering::Relaxed);
                let samples: Vec<String> = (1..=3).map(|i| (temp * i).to_string()).collect();
                Ok(MethodOutput {
                    ret: Value::Int(3),
                    outs: vec![Value::Str(format!("[{}]", samples.join(", ")))],
                })
            }),
        )
        .build()
}

fn settings() -> MonitorSettings {
    let mut settings = MonitorSettings::default();
    settings.display.rich_text = false;
    settings.logging = LoggingSettings::silent();
    settings
}

fn handle_for(member: &str, attribute: &MonitorAttribute, reactor: &Arc<Reactor>) -> (MonitorHandle, Receiver<TickCommand>) {
    let desc = descriptor();
    let mut index = TypeIndex::new();
    index.insert(desc.clone());
    let settings = settings();
    let profile = build_profile(&index, &desc, desc.member(member).unwrap(), attribute, &settings).unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();
    let target: Target = reactor.clone();
    let handle = MonitorHandle::create(HandleId(1), Arc::new(profile), Some(target), Arc::new(settings), tx);
    (handle, rx)
}

fn record(handle: &MonitorHandle) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle
        .value_updated()
        .subscribe(move |text: &String| sink.lock().unwrap().push(text.clone()));
    seen
}

fn record_active(handle: &MonitorHandle) -> Arc<Mutex<Vec<bool>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle
        .active_state_changed()
        .subscribe(move |enabled: &bool| sink.lock().unwrap().push(*enabled));
    seen
}

#[test]
fn test_initial_state_read_silently() {
    let r = reactor(20);
    let (handle, rx) = handle_for("temp", &MonitorAttribute::new(), &r);
    assert_eq!(handle.state(), "Temp: 20");
    assert_eq!(handle.value(), Some(Value::Int(20)));
    assert!(handle.is_enabled());
    assert_eq!(handle.display_name(), "Temp");
    assert!(matches!(rx.try_recv(), Ok(TickCommand::Refresh(h)) if h.id() == handle.id()));
}

#[test]
fn test_refresh_raises_only_on_change() {
    let r = reactor(20);
    let (handle, _rx) = handle_for("temp", &MonitorAttribute::new(), &r);
    let seen = record(&handle);

    handle.refresh();
    handle.refresh();
    assert!(seen.lock().unwrap().is_empty());

    r.temp.store(25, Ordering::Relaxed);
    handle.refresh();
    handle.refresh();
    assert_eq!(*seen.lock().unwrap(), vec!["Temp: 25".to_string()]);
}

#[test]
fn test_set_value_always_raises_once() {
    let r = reactor(20);
    let (handle, _rx) = handle_for("temp", &MonitorAttribute::new().write_access(), &r);
    let seen = record(&handle);

    handle.set_value(Value::Int(20)).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["Temp: 20".to_string()]);

    handle.set_value(Value::Int(31)).unwrap();
    assert_eq!(r.temp.load(Ordering::Relaxed), 31);
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(handle.state(), "Temp: 31");
}

#[test]
fn test_set_value_with_update_event_raises_once() {
    let r = reactor(20);
    let attr = MonitorAttribute::new().write_access().update_event("setpoint_changed");
    let (handle, rx) = handle_for("setpoint", &attr, &r);
    assert!(rx.try_recv().is_err());
    let seen = record(&handle);

    handle.set_value(Value::Int(7)).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["Setpoint: 7".to_string()]);

    handle.set_value(Value::Int(7)).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);

    r.setpoint_changed.invoke(&7);
    assert_eq!(seen.lock().unwrap().len(), 2);
    r.setpoint.store(9, Ordering::Relaxed);
    r.setpoint_changed.invoke(&9);
    assert_eq!(seen.lock().unwrap().last().unwrap(), "Setpoint: 9");
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn test_set_value_out_of_range_keeps_handle_healthy() {
    let r = reactor(20);
    let (handle, _rx) = handle_for("valve", &MonitorAttribute::new().write_access(), &r);
    let seen = record(&handle);

    let err = handle.set_value(Value::Int(300)).unwrap_err();
    assert!(matches!(err, AccessError::TypeMismatch { ref expected, .. } if expected == "u8"));
    let err = handle.set_value(Value::Int(-1)).unwrap_err();
    assert!(matches!(err, AccessError::TypeMismatch { .. }));
    assert!(handle.is_enabled());
    assert!(!handle.is_faulted());
    assert!(seen.lock().unwrap().is_empty());

    handle.set_value(Value::Int(255)).unwrap();
    assert_eq!(r.valve.load(Ordering::Relaxed), 255);
    assert_eq!(handle.state(), "Valve: 255");
}

#[test]
fn test_set_value_rejections() {
    let r = reactor(20);
    let (read_only, _rx) = handle_for("temp", &MonitorAttribute::new(), &r);
    assert!(matches!(read_only.set_value(Value::Int(1)), Err(AccessError::NotWritable { .. })));

    let (handle, _rx) = handle_for("temp", &MonitorAttribute::new().write_access(), &r);
    let err = handle.set_value(Value::Str("hot".into())).unwrap_err();
    assert!(matches!(err, AccessError::TypeMismatch { .. }));
    assert!(!handle.is_faulted());
    assert_eq!(r.temp.load(Ordering::Relaxed), 20);

    handle.dispose();
    assert!(matches!(handle.set_value(Value::Int(1)), Err(AccessError::Disposed { id: 1 })));
}

#[test]
fn test_event_handle_counts_every_invocation() {
    let r = reactor(0);
    let (handle, rx) = handle_for("alarm", &MonitorAttribute::new(), &r);
    assert_eq!(handle.state(), "Alarm: 0 (listeners: 0)");
    assert!(rx.try_recv().is_err());
    let seen = record(&handle);

    for _ in 0..3 {
        r.alarm.invoke(&());
    }
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], "Alarm: 3 (listeners: 0)");
    assert_eq!(handle.invocation_count(), 3);
    assert_eq!(handle.value(), Some(Value::UInt(3)));
}

#[test]
fn test_update_event_pushes_value() {
    let r = reactor(20);
    let (handle, rx) = handle_for("temp", &MonitorAttribute::new().update_event("temp_changed"), &r);
    assert!(rx.try_recv().is_err());
    let seen = record(&handle);

    r.temp_changed.invoke(&42);
    r.temp_changed.invoke(&42);
    assert_eq!(*seen.lock().unwrap(), vec!["Temp: 42".to_string()]);
    assert_eq!(handle.value(), Some(Value::Int(42)));
}

#[test]
fn test_method_handle_always_raises() {
    let r = reactor(60);
    let (handle, rx) = handle_for("readout", &MonitorAttribute::new(), &r);
    assert_eq!(handle.state(), "Readout");
    assert!(matches!(rx.try_recv(), Ok(TickCommand::Refresh(_))));
    let seen = record(&handle);

    handle.refresh();
    handle.refresh();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], "Readout: 60\nTrend: true");
}

#[test]
fn test_stack_only_out_parameter_uses_generic_processor() {
    let r = reactor(4);
    let (handle, _rx) = handle_for("spectrum", &MonitorAttribute::new(), &r);
    let ProfileAccess::Method { out_slots, .. } = &handle.profile().access else {
        panic!("expected a method profile");
    };
    assert_eq!(out_slots.len(), 1);
    assert_eq!(out_slots[0].value_type, ValueType::ByRefLike("Span<f32>".into()));
    assert_eq!(out_slots[0].processor.source(), &ProcessorSource::Generic);

    handle.refresh();
    assert_eq!(handle.state(), "Spectrum: 3\nSamples: [4, 8, 12]");

    r.temp.store(5, Ordering::Relaxed);
    handle.refresh();
    assert_eq!(handle.state(), "Spectrum: 3\nSamples: [5, 10, 15]");
}

#[test]
fn test_faulty_getter_disables_handle() {
    let r = reactor(10);
    let (handle, rx) = handle_for("pressure", &MonitorAttribute::new(), &r);
    let active = record_active(&handle);
    assert!(handle.is_enabled());

    r.broken.store(true, Ordering::Relaxed);
    handle.refresh();
    assert!(!handle.is_enabled());
    assert!(handle.is_faulted());
    assert_eq!(*active.lock().unwrap(), vec![false]);

    let commands: Vec<_> = rx.try_iter().collect();
    assert!(matches!(commands.last(), Some(TickCommand::StopRefresh(id)) if *id == handle.id()));

    r.broken.store(false, Ordering::Relaxed);
    handle.refresh();
    assert!(handle.is_faulted());

    handle.set_enabled(true);
    assert!(!handle.is_faulted());
    assert!(handle.is_enabled());
    assert_eq!(handle.state(), "Pressure: 20");
}

#[test]
fn test_panicking_getter_faults_at_creation() {
    let r = reactor(10);
    r.broken.store(true, Ordering::Relaxed);
    let (handle, rx) = handle_for("meltdown", &MonitorAttribute::new(), &r);
    assert!(handle.is_faulted());
    assert!(!handle.is_enabled());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_polled_validator_gates_visibility() {
    let r = reactor(5);
    let attr = MonitorAttribute::new().show_if(ShowIf::condition(Condition::Positive));
    let (handle, rx) = handle_for("temp", &attr, &r);
    assert!(handle.is_enabled());
    let commands: Vec<_> = rx.try_iter().collect();
    assert!(commands.iter().any(|c| matches!(c, TickCommand::Validate(_))));
    let active = record_active(&handle);

    r.temp.store(0, Ordering::Relaxed);
    handle.validate();
    assert!(!handle.is_enabled());

    r.temp.store(3, Ordering::Relaxed);
    handle.validate();
    assert!(handle.is_enabled());
    assert_eq!(*active.lock().unwrap(), vec![false, true]);
    assert_eq!(handle.state(), "Temp: 3");
}

#[test]
fn test_validator_does_not_revive_faulted_handle() {
    let r = reactor(5);
    let attr = MonitorAttribute::new().show_if(ShowIf::condition(Condition::Positive));
    let (handle, _rx) = handle_for("pressure", &attr, &r);

    r.broken.store(true, Ordering::Relaxed);
    handle.validate();
    assert!(handle.is_faulted());

    r.broken.store(false, Ordering::Relaxed);
    handle.validate();
    assert!(!handle.is_enabled());
}

#[test]
fn test_event_driven_validator() {
    let r = reactor(5);
    let (handle, rx) = handle_for("temp", &MonitorAttribute::new().show_if(ShowIf::event("shown")), &r);
    assert!(handle.is_enabled());
    assert!(!rx.try_iter().any(|c| matches!(c, TickCommand::Validate(_))));

    r.shown.invoke(&false);
    assert!(!handle.is_enabled());
    r.shown.invoke(&true);
    assert!(handle.is_enabled());
}

#[test]
fn test_disabled_by_default() {
    let r = reactor(5);
    let (handle, rx) = handle_for("temp", &MonitorAttribute::new().disabled(), &r);
    assert!(!handle.is_enabled());
    assert!(rx.try_recv().is_err());
    assert_eq!(handle.state(), "Temp: 5");
}

#[test]
fn test_dispose_unsubscribes_and_fires_once() {
    let r = reactor(5);
    let (handle, rx) = handle_for("alarm", &MonitorAttribute::new(), &r);
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    handle.disposing().subscribe(move |_: &()| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    assert_eq!(r.alarm.subscriber_count(), 1);

    assert!(handle.dispose());
    assert!(!handle.dispose());
    assert_eq!(disposed.load(Ordering::Relaxed), 1);
    assert_eq!(r.alarm.subscriber_count(), 0);
    assert!(handle.is_disposed());
    assert!(!handle.is_enabled());

    let commands: Vec<_> = rx.try_iter().collect();
    assert!(commands.iter().any(|c| matches!(c, TickCommand::StopRefresh(_))));
    assert!(commands.iter().any(|c| matches!(c, TickCommand::StopValidate(_))));

    r.alarm.invoke(&());
    assert_eq!(handle.invocation_count(), 0);
}

#[test]
fn test_dropped_handle_leaves_host_event_inert() {
    let r = reactor(5);
    let (handle, rx) = handle_for("alarm", &MonitorAttribute::new(), &r);
    drop(rx);
    drop(handle);
    r.alarm.invoke(&());
    assert_eq!(r.alarm.subscriber_count(), 1);
}
