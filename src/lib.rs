//! # livemon - Live In-Process Value Monitoring
//!
//! livemon discovers annotated members of host types once, at startup, and
//! turns every live object registered with it into a set of handles whose
//! formatted state a UI overlay can display. Values are polled once per
//! tick with a dirty check, or pushed by update events; events are counted
//! and methods are invoked on every refresh.
//!
//! ## Core Concepts
//!
//! - **TypeDescriptor**: The reflected shape of a host type, built with `TypeBuilder`
//! - **MonitorProfile**: Everything resolved once per monitored member: accessors, processor, validator
//! - **MonitorHandle**: One profile bound to one target, with `value_updated` for UI layers
//! - **MonitoringContext**: Startup scan, target registration and the per-frame update dispatcher
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use livemon::reflect::{Assembly, Condition, MonitorAttribute, Monitored, ShowIf, TypeBuilder, TypeCatalog, TypeDescriptor};
//! use livemon::{MonitorSettings, MonitorTarget, MonitoringContext, Target};
//!
//! struct Enemy { hp: AtomicI32 }
//!
//! impl MonitorTarget for Enemy {}
//!
//! impl Monitored for Enemy {
//!     fn describe() -> TypeDescriptor {
//!         TypeBuilder::<Enemy>::new()
//!             .field("hp", |e: &Enemy| e.hp.load(Ordering::Relaxed))
//!             .monitored(MonitorAttribute::new().show_if(ShowIf::condition(Condition::Positive)))
//!             .build()
//!     }
//! }
//!
//! let mut context = MonitoringContext::new(MonitorSettings::default())?;
//! context.start(&TypeCatalog::new().with_assembly(Assembly::new("game").with::<Enemy>()))?;
//!
//! let enemy = Arc::new(Enemy { hp: AtomicI32::new(5) });
//! let target: Target = enemy.clone();
//! context.register_target(Arc::clone(&target));
//!
//! let hp = context.handles_for_target(&target)[0].clone();
//! assert!(hp.is_enabled());
//!
//! enemy.hp.store(0, Ordering::Relaxed);
//! context.tick();
//! assert!(!hp.is_enabled());
//! # Ok::<(), livemon::MonitorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod event;
pub mod logging;
pub mod settings;
pub mod target;
pub mod value;

// Discovery and profiles
pub mod profile;
pub mod reflect;

// Live monitoring
pub mod handle;
pub mod manager;
pub mod overlay;

// Re-export primary types at crate root for convenience
pub use error::{AccessError, ConfigError, MonitorError, MonitorResult, ResolveError, ScanError};
pub use event::{Event, EventArgs, EventSource, SubscriptionToken};
pub use handle::{HandleId, MonitorHandle};
pub use logging::LogSeverity;
pub use settings::MonitorSettings;
pub use target::{MonitorTarget, Target, TargetId, TypeKey};
pub use value::{Color, MonitorValue, Value, ValueType};

pub use manager::{
    ContextId, MonitoringContext, MonitoringEvents, ProfilingSummary, Registration, RegistrationSender,
    StartupState, TickReport,
};
pub use overlay::{OverlayFilter, OverlaySnapshot};
pub use profile::{MonitorProfile, ProfileRegistry};
pub use reflect::{Assembly, MonitorAttribute, TypeBuilder, TypeCatalog};
