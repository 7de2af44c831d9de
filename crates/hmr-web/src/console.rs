//! `tracing` output to the browser console.

use std::io;

use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wasm_bindgen::JsValue;
use web_sys::console;

/// Prefix on every console line.
pub const CONSOLE_PREFIX: &str = "[hmr]";

/// Buffers one formatted event and hands it to the console method matching
/// its level when dropped.
pub struct ConsoleWriter {
    level: Level,
    buffer: Vec<u8>,
}

impl ConsoleWriter {
    fn line(&self) -> String {
        let text = String::from_utf8_lossy(&self.buffer);
        format!("{CONSOLE_PREFIX} {}", text.trim_end())
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = JsValue::from_str(&self.line());
        match self.level {
            Level::ERROR => console::error_1(&line),
            Level::WARN => console::warn_1(&line),
            Level::INFO => console::info_1(&line),
            _ => console::debug_1(&line),
        }
    }
}

/// [`MakeWriter`] producing a [`ConsoleWriter`] per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            level: Level::INFO,
            buffer: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            level: *meta.level(),
            buffer: Vec::new(),
        }
    }
}

/// Send `tracing` events at `max_level` and above to the console.
///
/// Does nothing when a global subscriber is already set.
pub fn install(max_level: LevelFilter) {
    // No system clock on wasm32, so timestamps are left to the console.
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(MakeConsoleWriter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false);

    let _ = tracing_subscriber::registry()
        .with(max_level)
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_line_is_prefixed_and_trimmed() {
        let mut writer = MakeConsoleWriter.make_writer();
        writer.write_all(b"Applied hot update for src/a.ts\n").unwrap();

        assert_eq!(writer.line(), "[hmr] Applied hot update for src/a.ts");
    }
}
