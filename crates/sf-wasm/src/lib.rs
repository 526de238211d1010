//! WebAssembly bindings for ShieldForge

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;

use sf_compiler::{prioritize_rules as prioritize, FilterParser, ParsedList};
use sf_core::types::{CompiledRule, DEFAULT_RULE_ID_START};

/// Forwards `log` records to the browser console.
struct ConsoleLogger;

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = JsValue::from_str(&format!("[ShieldForge] {}", record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&message),
            Level::Warn => web_sys::console::warn_1(&message),
            Level::Info => web_sys::console::info_1(&message),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&message),
        }
    }

    fn flush(&self) {}
}

/// Route compiler logs to the console. Later calls only change the level.
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let _ = log::set_logger(&CONSOLE_LOGGER);
    log::set_max_level(filter);
}

/// Compile one list's text into `{rules, cosmeticRules, scriptlets, stats, nextId}`.
///
/// Pass the previous call's `nextId` as `start_id` to keep ids unique across
/// lists compiled separately.
#[wasm_bindgen]
pub fn compile_filter_list(text: &str, list_id: &str, start_id: Option<u32>) -> Result<JsValue, JsValue> {
    let (parsed, next_id) = compile_list(text, list_id, start_id);

    let json = serde_json::to_string(&parsed)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize compiled list: {}", e)))?;
    let js_result = js_sys::JSON::parse(&json)?;
    let _ = js_sys::Reflect::set(&js_result, &"nextId".into(), &JsValue::from(next_id));

    Ok(js_result)
}

/// Order a JSON rule array for the engine and cut it to `max_rules`.
#[wasm_bindgen]
pub fn prioritize_rules(rules_json: &str, max_rules: u32) -> Result<JsValue, JsValue> {
    let json = prioritize_json(rules_json, max_rules as usize).map_err(|e| JsValue::from_str(&e))?;
    js_sys::JSON::parse(&json)
}

/// Classify one filter line: `comment`, `cosmetic`, `scriptlet`,
/// `exception`, `network`, or `null` for a blank line.
#[wasm_bindgen]
pub fn classify_filter_line(line: &str) -> JsValue {
    match sf_compiler::classify_line(line) {
        Some(kind) => JsValue::from_str(kind_name(kind)),
        None => JsValue::NULL,
    }
}

fn kind_name(kind: sf_compiler::LineKind) -> &'static str {
    use sf_compiler::LineKind;
    match kind {
        LineKind::Comment => "comment",
        LineKind::Cosmetic => "cosmetic",
        LineKind::Scriptlet => "scriptlet",
        LineKind::Exception => "exception",
        LineKind::Network => "network",
    }
}

fn compile_list(text: &str, list_id: &str, start_id: Option<u32>) -> (ParsedList, u32) {
    let mut parser = FilterParser::with_start_id(start_id.unwrap_or(DEFAULT_RULE_ID_START));
    let parsed = parser.parse_filter_list(text, list_id);
    (parsed, parser.ids().peek())
}

fn prioritize_json(rules_json: &str, max_rules: usize) -> Result<String, String> {
    let rules: Vec<CompiledRule> =
        serde_json::from_str(rules_json).map_err(|e| format!("Invalid rules JSON: {}", e))?;
    let ordered = prioritize(rules, max_rules);
    serde_json::to_string(&ordered).map_err(|e| format!("Failed to serialize rules: {}", e))
}
