//! AtmApp: the browser client exposed to JavaScript

use super::log;
use super::provider::BrowserHost;
use crate::client::{Client, ClientConfig};
use crate::error::AtmError;
use crate::session::Address;
use alloy_primitives::U256;
use futures::StreamExt;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

fn to_js<T: Serialize>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new()
        .serialize_maps_as_objects(true)
        .serialize_large_number_types_as_bigints(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn js_err(err: AtmError) -> JsValue {
    to_js(&serde_json::json!({"error": err.kind(), "message": err.to_string()}))
}

/// Whole units from a JS number. Fractions and negatives are rejected.
fn amount(value: f64) -> Result<U256, JsValue> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(js_err(AtmError::InvalidAmount));
    }
    Ok(U256::from(value as u64))
}

#[wasm_bindgen]
pub struct AtmApp {
    client: Client,
}

#[wasm_bindgen]
impl AtmApp {
    /// `config` is an optional `ClientConfig` object (`{ledger: {address}, policy, ...}`).
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<AtmApp, JsValue> {
        let config: ClientConfig = if config.is_undefined() || config.is_null() {
            ClientConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        log!("[AtmApp] ledger at {}", config.ledger.address);
        Ok(Self { client: Client::new(BrowserHost, config) })
    }

    /// Detect `window.ethereum` and pick up an already authorized account.
    #[wasm_bindgen]
    pub async fn load(&self) -> JsValue {
        let status = self.client.load().await;
        to_js(&status)
    }

    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<JsValue, JsValue> {
        let session = self.client.connect().await.map_err(js_err)?;
        Ok(to_js(&session))
    }

    #[wasm_bindgen]
    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Forward an `accountsChanged` event from the wallet.
    #[wasm_bindgen(js_name = "accountsChanged")]
    pub fn accounts_changed(&self, accounts: JsValue) -> Result<(), JsValue> {
        let raw: Vec<String> =
            serde_wasm_bindgen::from_value(accounts).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let accounts = raw.iter().map(|a| Address::parse(a)).collect::<Result<Vec<_>, _>>().map_err(js_err)?;
        self.client.accounts_changed(&accounts).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "queryBalance")]
    pub async fn query_balance(&self) -> Result<JsValue, JsValue> {
        let balance = self.client.query_balance().await.map_err(js_err)?;
        Ok(to_js(&balance.to_string()))
    }

    #[wasm_bindgen]
    pub async fn deposit(&self, value: f64) -> Result<JsValue, JsValue> {
        let confirmation = self.client.deposit(amount(value)?).await.map_err(js_err)?;
        Ok(to_js(&confirmation))
    }

    #[wasm_bindgen]
    pub async fn withdraw(&self, value: f64) -> Result<JsValue, JsValue> {
        let confirmation = self.client.withdraw(amount(value)?).await.map_err(js_err)?;
        Ok(to_js(&confirmation))
    }

    /// Full snapshot: status, prompt, session, ledger view, transactions.
    #[wasm_bindgen]
    pub fn state(&self) -> JsValue {
        to_js(&self.client.snapshot())
    }

    /// Display lines, oldest first.
    #[wasm_bindgen]
    pub fn transactions(&self) -> js_sys::Array {
        let arr = js_sys::Array::new();
        for record in self.client.transactions() {
            arr.push(&JsValue::from_str(&record.display_line()));
        }
        arr
    }

    /// Call `callback(event)` for every state change and notice.
    #[wasm_bindgen(js_name = "onEvent")]
    pub fn on_event(&self, callback: js_sys::Function) {
        let mut rx = self.client.subscribe();
        spawn_local(async move {
            while let Some(event) = rx.next().await {
                if let Err(e) = callback.call1(&JsValue::NULL, &to_js(&event)) {
                    log!("[AtmApp] event callback failed: {:?}", e);
                }
            }
        });
    }
}
