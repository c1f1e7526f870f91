//! Console logging for the browser build.

use tracing::Level;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_wasm::{WASMLayer, WASMLayerConfigBuilder};
use wasm_bindgen::prelude::*;

/// Install the panic hook and route `tracing` output to the browser console.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logging(max_level: Level) {
    console_error_panic_hook::set_once();

    let layer = WASMLayer::new(WASMLayerConfigBuilder::new().set_max_level(max_level).build());
    let subscriber = Registry::default().with(layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// JavaScript entry point for [`init_logging`].
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging_js(verbose: bool) {
    init_logging(if verbose { Level::DEBUG } else { Level::INFO });
}
