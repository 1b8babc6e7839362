//! livemon demo
//!
//! Simulates a small scene for a number of frames and prints the overlay
//! after each one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use livemon::reflect::{Condition, Monitored, ShowIf, TypeDescriptor, UiPosition};
use livemon::{
    Assembly, Color, Event, MonitorAttribute, MonitorSettings, MonitorTarget, MonitoringContext, OverlayFilter,
    Target, TypeBuilder, TypeCatalog,
};

static FRAME: AtomicI32 = AtomicI32::new(0);

/// Demo configuration
struct Config {
    /// Settings file, if any
    settings: Option<PathBuf>,
    frames: u32,
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config {
        settings: None,
        frames: 5,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" | "-s" => {
                if i + 1 < args.len() {
                    config.settings = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --settings requires a value");
                    std::process::exit(1);
                }
            }
            "--frames" | "-f" => {
                if i + 1 < args.len() {
                    config.frames = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("error: invalid frame count: {}", args[i + 1]);
                        std::process::exit(1);
                    });
                    i += 2;
                } else {
                    eprintln!("error: --frames requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("livemon-demo - live monitoring overlay demo");
                println!();
                println!("USAGE:");
                println!("    livemon-demo [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -s, --settings <FILE>     TOML settings file");
                println!("    -f, --frames <N>          Frames to simulate [default: 5]");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

struct Player {
    health: AtomicI32,
    position: Mutex<glam::Vec3>,
    shielded: AtomicBool,
    jumped: Event<()>,
    shield_toggled: Event<bool>,
}

impl MonitorTarget for Player {}

impl Player {
    fn position(&self) -> glam::Vec3 {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Monitored for Player {
    fn describe() -> TypeDescriptor {
        TypeBuilder::<Player>::new()
            .field("health", |p: &Player| p.health.load(Ordering::Relaxed))
            .monitored(
                MonitorAttribute::new()
                    .show_if(ShowIf::condition(Condition::Positive))
                    .color(Color::rgb(220, 60, 60))
                    .tag("combat"),
            )
            .property("position", Player::position)
            .monitored(MonitorAttribute::new().format("F1"))
            .field("shielded", |p: &Player| p.shielded.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new().update_event("shield_toggled"))
            .event("jumped", |p: &Player| &p.jumped)
            .monitored(MonitorAttribute::new())
            .event("shield_toggled", |p: &Player| &p.shield_toggled)
            .static_field("frame", || FRAME.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new().position(UiPosition::UpperRight))
            .build()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();
    let settings = match &config.settings {
        Some(path) => MonitorSettings::load(path)?,
        None => MonitorSettings::default(),
    };

    let mut context = MonitoringContext::new(settings)?;
    context.start_background(TypeCatalog::new().with_assembly(Assembly::new("demo").with::<Player>()))?;

    let player = Arc::new(Player {
        health: AtomicI32::new(3),
        position: Mutex::new(glam::Vec3::ZERO),
        shielded: AtomicBool::new(false),
        jumped: Event::new(),
        shield_toggled: Event::new(),
    });
    let target: Target = player.clone();

    // Spawned from a loader thread; applied on the next tick.
    let remote = context.remote();
    thread::spawn(move || remote.register(target)).join().map_err(|_| "loader thread panicked")??;

    for frame in 0..config.frames {
        FRAME.store(i32::try_from(frame)?, Ordering::Relaxed);
        context.tick();

        *player.position.lock().unwrap_or_else(PoisonError::into_inner) += glam::Vec3::new(0.5, 0.0, 0.25);
        player.health.fetch_sub(1, Ordering::Relaxed);
        if frame % 2 == 0 {
            player.jumped.invoke(&());
        }
        let shielded = !player.shielded.load(Ordering::Relaxed);
        player.shielded.store(shielded, Ordering::Relaxed);
        player.shield_toggled.invoke(&shielded);

        println!("--- frame {frame} ---");
        print!("{}", context.snapshot(&OverlayFilter::new()).render_text());
    }

    let snapshot = context.snapshot(&OverlayFilter::new().include_disabled());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    context.shutdown();
    Ok(())
}
