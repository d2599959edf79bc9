//! WebAssembly bindings for HeurShield
//!
//! Entry points for the content script. The loaded engine and the current
//! navigation's accumulators live in thread-local state; the page is reached
//! through [`BrowserDocument`] and the extension through [`JsProtectionHost`].

mod dom;
mod host;
mod logger;

use std::cell::RefCell;

use hs_compiler::{compile, load_database as load_rules};
use hs_core::{
    config::EngineConfig,
    engine::HeuristicsEngine,
    processor::NavigationContext,
    report::BlockReport,
    scanner::ScanReport,
};
use log::LevelFilter;
use wasm_bindgen::prelude::*;
use web_sys::Element;

pub use dom::BrowserDocument;
pub use host::JsProtectionHost;

struct EngineState {
    engine: HeuristicsEngine,
    ctx: NavigationContext<Element>,
}

thread_local! {
    static STATE: RefCell<Option<EngineState>> = const { RefCell::new(None) };
}

fn with_state<T>(f: impl FnOnce(&mut EngineState) -> Result<T, JsValue>) -> Result<T, JsValue> {
    STATE.with(|state| match state.borrow_mut().as_mut() {
        Some(state) => f(state),
        None => Err(JsValue::from_str("Heuristics database not loaded")),
    })
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))?;
    js_sys::JSON::parse(&json)
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn scan_to_js(scan: &ScanReport) -> JsValue {
    let result = js_sys::Object::new();
    let blocked = js_sys::Array::new();
    for url in &scan.blocked {
        blocked.push(&JsValue::from_str(url));
    }
    set(&result, "blocked", &blocked);
    set(&result, "skipped", &JsValue::from(scan.skipped.len() as u32));
    set(&result, "excluded", &JsValue::from(scan.excluded() as u32));
    set(&result, "failures", &JsValue::from(scan.failures.len() as u32));
    result.into()
}

#[wasm_bindgen]
pub fn init_logging(level: Option<String>) {
    let level = level
        .as_deref()
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    logger::init(level);
}

/// Compile raw rule records into the database object the engine loads.
#[wasm_bindgen]
pub fn compile_heuristics(raw_json: &str) -> Result<JsValue, JsValue> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(raw_json).map_err(|e| JsValue::from_str(&format!("Invalid rule feed: {}", e)))?;
    let output = compile(&records);
    let stats = output.stats();

    let result = js_sys::Object::new();
    set(&result, "database", &to_js(&output.rules)?);
    set(&result, "records", &JsValue::from(stats.records as u32));
    set(&result, "compiled", &JsValue::from(stats.compiled as u32));
    set(&result, "skipped", &JsValue::from(output.issues.len() as u32));
    Ok(result.into())
}

/// Load a raw or compiled database, replacing any loaded one.
#[wasm_bindgen]
pub fn load_database(database_json: &str, config_json: Option<String>) -> Result<JsValue, JsValue> {
    let output = load_rules(database_json).map_err(|e| JsValue::from_str(&format!("Failed to load database: {}", e)))?;
    let config = match config_json {
        Some(json) => EngineConfig::from_json(&json).map_err(|e| JsValue::from_str(&e.to_string()))?,
        None => EngineConfig::default(),
    };

    let entries = output.rules.entry_count();
    let engine = HeuristicsEngine::new(output.rules, config);
    STATE.with(|state| {
        *state.borrow_mut() = Some(EngineState {
            engine,
            ctx: NavigationContext::new(),
        })
    });

    let result = js_sys::Object::new();
    set(&result, "entries", &JsValue::from(entries as u32));
    set(&result, "issues", &JsValue::from(output.issues.len() as u32));
    Ok(result.into())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    STATE.with(|state| state.borrow().is_some())
}

/// Evaluate the database against the current page and hide adserver hits.
/// Block candidates stay queued for `urls_to_block_report` and
/// `scan_for_threats`.
#[wasm_bindgen]
pub fn process_page(page_url: &str) -> Result<JsValue, JsValue> {
    let doc = BrowserDocument::current().map_err(|e| JsValue::from_str(&e.to_string()))?;
    with_state(|state| {
        let report = state
            .engine
            .process_page(&doc, page_url, &mut state.ctx)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let hidden = state.ctx.apply_hiding(&doc);

        let result = js_sys::Object::new();
        set(&result, "evaluated", &JsValue::from(report.selectors_evaluated as u32));
        set(&result, "skipped", &JsValue::from(report.selectors_skipped as u32));
        set(&result, "matched", &JsValue::from(report.selectors_matched as u32));
        set(&result, "failures", &JsValue::from(report.failures.len() as u32));
        set(&result, "hidden", &JsValue::from(hidden as u32));
        set(&result, "candidates", &JsValue::from(state.ctx.block_count() as u32));
        Ok(result.into())
    })
}

/// The message to send to the background, or `"Nothing to block"`.
#[wasm_bindgen]
pub fn urls_to_block_report() -> Result<JsValue, JsValue> {
    with_state(|state| match BlockReport::from_context(&state.ctx).message() {
        Some(message) => to_js(&message),
        None => Ok(JsValue::from_str(hs_core::report::NOTHING_TO_BLOCK)),
    })
}

/// Act on the queued block candidates, emptying the queue.
#[wasm_bindgen]
pub fn scan_for_threats(host: JsValue, source_url: &str, tab_id: i32) -> Result<JsValue, JsValue> {
    let host = JsProtectionHost::new(host);
    with_state(|state| {
        let candidates = state.ctx.drain_urls_to_block();
        let scan = state.engine.scan_for_threats(&host, &candidates, source_url, tab_id);
        Ok(scan_to_js(&scan))
    })
}

/// Process, hide, report and scan in one call on a fresh context.
#[wasm_bindgen]
pub fn run_navigation(host: JsValue, page_url: &str, tab_id: i32) -> Result<JsValue, JsValue> {
    let doc = BrowserDocument::current().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let host = JsProtectionHost::new(host);
    with_state(|state| {
        let outcome = state
            .engine
            .run_navigation(&doc, page_url, tab_id, &host)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let result = js_sys::Object::new();
        set(&result, "hidden", &JsValue::from(outcome.hidden as u32));
        set(&result, "report", &to_js(&outcome.report)?);
        set(&result, "scan", &scan_to_js(&outcome.scan));
        Ok(result.into())
    })
}
