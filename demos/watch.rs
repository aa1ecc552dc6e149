// SPDX-License-Identifier: MPL-2.0

//! Hotplug watcher example.
//!
//! Prints one JSON line per attach or detach event for the devices matching
//! a vendor/product ID pair, including the devices already plugged in.
//!
//! # Usage
//!
//! ```bash
//! # Every USB device
//! cargo run --example watch
//!
//! # One vendor/product pair (hexadecimal)
//! cargo run --example watch -- 1050 0407
//! cargo run --example watch -- 0x0403 0x6001
//! ```
//!
//! Set `RUST_LOG=usb_hotplug=debug` to see the events as they are published,
//! or `RUST_LOG=usb_hotplug=trace` to also see every scan.

use std::env;

use usb_hotplug::{DetectorConfig, DeviceFilter, HotplugDetector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let filter = match args.as_slice() {
        [_] => DeviceFilter::any(),
        [_, vendor_id, product_id] => DeviceFilter::from_hex(vendor_id, product_id)?,
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    let detector = HotplugDetector::new(DetectorConfig::new().with_filter(filter))?;
    eprintln!("Watching USB devices with the {} backend", detector.backend_name());

    let mut events = detector.events();
    detector.start()?;

    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {program} [<vendor_id> <product_id>]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {program}");
    eprintln!("  {program} 1050 0407");
}
