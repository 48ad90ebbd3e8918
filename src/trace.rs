use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines render trace, enabled by pointing `PLATEN_TRACE` at a file
/// path. One line per event plus a counter summary when a session closes.
#[derive(Clone)]
pub(crate) struct RenderTrace {
    inner: Arc<Mutex<TraceState>>,
}

struct TraceState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl RenderTrace {
    pub fn from_env() -> Option<Self> {
        let path = std::env::var("PLATEN_TRACE").ok()?;
        if path.is_empty() {
            return None;
        }
        RenderTrace::new(path).ok()
    }

    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(TraceState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_event(&self, kind: &str, cursor: usize) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(
                state.writer,
                "{{\"type\":\"{}\",\"cursor\":{}}}",
                json_escape(kind),
                cursor
            );
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let counts_json = if counters.is_empty() {
                "{}".to_string()
            } else {
                let mut out = String::from("{");
                for (idx, (key, value)) in counters.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{}\":{}", json_escape(key), value));
                }
                out.push('}');
                out
            };
            let json = format!(
                "{{\"type\":\"trace.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
