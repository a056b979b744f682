//! WASM module: the ATM client in the browser
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            AtmApp (JS API)              │
//! │  load, connect, deposit, withdraw,      │
//! │  queryBalance, state, onEvent           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │          Client (state machine)         │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │   BrowserProvider (window.ethereum)     │
//! │   request({method, params}) → Promise   │
//! └─────────────────────────────────────────┘
//! ```

mod app;
mod provider;

pub use app::AtmApp;
pub use provider::{BrowserHost, BrowserProvider};

use std::time::Duration;
use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;

/// `setTimeout` as a future.
pub async fn sleep(duration: Duration) {
    let ms = duration.as_millis().min(i32::MAX as u128) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .map(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
