//! BrowserProvider - EIP-1193 provider injected as `window.ethereum`

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderHost, WalletProvider};
use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

pub struct BrowserProvider {
    ethereum: JsValue,
}

impl BrowserProvider {
    pub fn new(ethereum: JsValue) -> Self { Self { ethereum } }
}

#[async_trait(?Send)]
impl WalletProvider for BrowserProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let request = Reflect::get(&self.ethereum, &JsValue::from_str("request")).map_err(js_error)?;
        let request: Function = request
            .dyn_into()
            .map_err(|_| ProviderError::Malformed("ethereum.request is not a function".into()))?;

        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let args = json!({"method": method, "params": params})
            .serialize(&serializer)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let promise: Promise = request
            .call1(&self.ethereum, &args)
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| ProviderError::Malformed("ethereum.request did not return a promise".into()))?;
        let reply = JsFuture::from(promise).await.map_err(js_error)?;
        if reply.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(reply).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    fn name(&self) -> &str { "browser" }
}

/// Map a rejected promise to a provider error, keeping the EIP-1193 code.
fn js_error(err: JsValue) -> ProviderError {
    let code = Reflect::get(&err, &JsValue::from_str("code")).ok().and_then(|v| v.as_f64());
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    match code {
        Some(code) => ProviderError::rpc(code as i64, message),
        None => ProviderError::Transport(message),
    }
}

/// Looks for `window.ethereum`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserHost;

impl ProviderHost for BrowserHost {
    fn detect(&self) -> Option<Provider> {
        let window: JsValue = web_sys::window()?.into();
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        Some(Arc::new(BrowserProvider::new(ethereum)))
    }
}
