//! `ProtectionHost` backed by a JS object
//!
//! The extension passes an object exposing `isProtectionActive`,
//! `isWhitelisted`, `isWhitelistedScamsByPattern`, `recordAll`,
//! `updateBadgeCount`, `onScam` and `navigate`. Calls are synchronous.

use hs_core::host::{HostError, ProtectionHost, RecordType, ScamAction, ScamContext};
use js_sys::{Array, Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};

pub struct JsProtectionHost {
    target: JsValue,
}

impl JsProtectionHost {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn call(&self, call: &'static str, method: &str, args: &[JsValue]) -> Result<JsValue, HostError> {
        let function = Reflect::get(&self.target, &JsValue::from_str(method))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| HostError::new(call, format!("host has no '{method}' function")))?;

        let args: Array = args.iter().collect();
        function
            .apply(&self.target, &args)
            .map_err(|e| HostError::new(call, e.as_string().unwrap_or_else(|| format!("{e:?}"))))
    }

    /// Boolean queries treat a failing host as "no".
    fn query(&self, call: &'static str, method: &str, args: &[JsValue]) -> bool {
        match self.call(call, method, args) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }
}

impl ProtectionHost for JsProtectionHost {
    fn is_protection_active(&self, feature: &str, url: &str, tab_id: i32) -> bool {
        self.query(
            "is_protection_active",
            "isProtectionActive",
            &[feature.into(), url.into(), tab_id.into()],
        )
    }

    fn is_whitelisted(&self, domain: &str, table: &str, category: &str) -> bool {
        self.query("is_whitelisted", "isWhitelisted", &[domain.into(), table.into(), category.into()])
    }

    fn is_whitelisted_scams_by_pattern(&self, domain: &str) -> bool {
        self.query("is_whitelisted_scams_by_pattern", "isWhitelistedScamsByPattern", &[domain.into()])
    }

    fn record_all(
        &self,
        record_type: RecordType,
        tab_id: i32,
        source_domain: &str,
        matched_domain: &str,
        silent: bool,
    ) -> Result<(), HostError> {
        self.call(
            "record_all",
            "recordAll",
            &[
                record_type.as_str().into(),
                tab_id.into(),
                source_domain.into(),
                matched_domain.into(),
                silent.into(),
            ],
        )?;
        Ok(())
    }

    fn update_badge_count(&self, tab_id: i32) -> Result<(), HostError> {
        self.call("update_badge_count", "updateBadgeCount", &[tab_id.into()])?;
        Ok(())
    }

    fn on_scam(&self, context: &ScamContext) -> Result<ScamAction, HostError> {
        let json = serde_json::to_string(context).map_err(|e| HostError::new("on_scam", e.to_string()))?;
        let arg = js_sys::JSON::parse(&json).map_err(|_| HostError::new("on_scam", "context is not valid JSON"))?;

        let action = self.call("on_scam", "onScam", &[arg])?;
        let redirect_url = Reflect::get(&action, &JsValue::from_str("redirectUrl"))
            .ok()
            .and_then(|v| v.as_string())
            .ok_or_else(|| HostError::new("on_scam", "action has no redirectUrl"))?;
        Ok(ScamAction { redirect_url })
    }

    fn navigate(&self, tab_id: i32, url: &str) -> Result<(), HostError> {
        self.call("navigate", "navigate", &[tab_id.into(), url.into()])?;
        Ok(())
    }
}
