//! Print joystick hot-plug events as they happen.
//!
//! ```text
//! cargo run --example watch                  # native backend, default config
//! cargo run --example watch -- watch.toml    # native backend, config from file
//! cargo run --example watch -- --virtual     # simulated hub plugging/unplugging
//! ```

use std::time::Duration;
use stickwatch::{Enumerator, EnumeratorConfig, EventFilter, LogListener, VirtualHub};

fn setup_logging() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{:<5} {}] {}", record.level(), record.target(), message))
        })
        .level(log::LevelFilter::Warn)
        .level_for("stickwatch", log::LevelFilter::Debug)
        .level_for("watch", log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("Unable to set up logger");
}

fn main() {
    setup_logging();

    let arg = std::env::args().nth(1);
    let hub = VirtualHub::new();
    let enumerator = match arg.as_deref() {
        Some("--virtual") => {
            hub.plug("Virtual Stick");
            Enumerator::simulated(&hub)
        }
        Some(path) => {
            let config = EnumeratorConfig::load(path).expect("load config");
            Enumerator::new(config)
        }
        None => Enumerator::new(EnumeratorConfig::default()),
    };

    enumerator.register_filtered(LogListener::new(), EventFilter::All);
    if let Err(err) = enumerator.start() {
        log::error!("hot-plug monitoring unavailable: {err}");
    }

    println!("{} device(s) connected", enumerator.number_connected());
    match enumerator.devices().to_json() {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("snapshot: {err}"),
    }

    if arg.as_deref() == Some("--virtual") {
        for round in 0..3 {
            std::thread::sleep(Duration::from_millis(500));
            let pad = hub.plug(&format!("Virtual Pad {round}"));
            std::thread::sleep(Duration::from_millis(500));
            hub.unplug(&pad);
        }
        std::thread::sleep(Duration::from_millis(200));
        log::info!("done: {} device(s) connected", enumerator.number_connected());
        enumerator.shutdown();
        return;
    }

    loop {
        // Sleep a touch; all work happens on the listener thread
        std::thread::sleep(Duration::from_millis(250));
    }
}
