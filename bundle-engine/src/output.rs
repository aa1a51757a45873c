//! The output sink: what kinds the interpreter may write to it, and how it
//! receives data. Grounded on `original_source/core/OutputHandlerBase.h`
//! (lines 26, 40, 44, 58: the sink base class, `TextOutputHandler`, and
//! `addOutput`). Only the default text sink is implemented; any other
//! transport is an external collaborator per spec §1.

use crate::value::{Value, ValueKind};

/// What an `Output` statement writes to. `accepted_kinds` gates which
/// expression kinds `Statement::Output` may carry; `add_output` buffers one
/// value in the sink's own encoding and reports whether it succeeded.
pub trait OutputSink {
    fn accepted_kinds(&self) -> &[ValueKind];
    fn add_output(&mut self, value: &Value) -> bool;
    fn result(&self) -> &[u8];
}

/// Byte encoding a [`TextSink`] writes with. Any code point that cannot be
/// represented in the chosen encoding is replaced with a NUL byte, matching
/// spec §4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    fn encode(self, text: &str, out: &mut Vec<u8>) {
        match self {
            TextEncoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            TextEncoding::Latin1 => {
                for ch in text.chars() {
                    let byte = u32::from(ch).try_into().unwrap_or(0u8);
                    out.push(if u32::from(byte) == u32::from(ch) { byte } else { 0 });
                }
            }
        }
    }
}

/// The default `OutputSink`: accepts only `String` values and encodes them
/// to a configurable byte encoding, one value appended after another with
/// no separator (the separator, if any, is the producing task's concern —
/// it writes one already-delimited line per `Output` statement).
#[derive(Debug, Clone)]
pub struct TextSink {
    encoding: TextEncoding,
    buffer: Vec<u8>,
    accepted: [ValueKind; 1],
}

impl TextSink {
    pub fn new(encoding: TextEncoding) -> Self {
        TextSink {
            encoding,
            buffer: Vec::new(),
            accepted: [ValueKind::String],
        }
    }

    pub fn as_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

impl Default for TextSink {
    fn default() -> Self {
        TextSink::new(TextEncoding::default())
    }
}

impl OutputSink for TextSink {
    fn accepted_kinds(&self) -> &[ValueKind] {
        &self.accepted
    }

    fn add_output(&mut self, value: &Value) -> bool {
        match value {
            Value::String(s) => {
                self.encoding.encode(s, &mut self.buffer);
                true
            }
            _ => false,
        }
    }

    fn result(&self) -> &[u8] {
        &self.buffer
    }
}
