/// MOCO Browser Extension - time tracking from third-party pages
/// Built with Rust + WASM + Yew

pub mod api;
pub mod bridge;
pub mod changeset;
pub mod coordinator;
pub mod error;
pub mod messages;
pub mod model;
pub mod ports;
pub mod projects;
pub mod settings;
pub mod time_format;
pub mod tracker;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

use crate::coordinator::CoordinatorConfig;
use crate::time_format::FormatOptions;
use crate::tracker::TrackerConfig;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Register the background listeners
#[wasm_bindgen]
pub fn start_background() {
    bridge::start_background(CoordinatorConfig::default(), TrackerConfig::default());
}

// Duration formatting for the page bubble
#[wasm_bindgen]
pub fn format_duration(seconds: f64, hhmm: bool, show_seconds: bool) -> String {
    time_format::format_duration(seconds.max(0.0) as u64, FormatOptions { hhmm, show_seconds })
}
