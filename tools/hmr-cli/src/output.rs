//! Output formatting for the CLI.

use console::style;
use hmr_client::sim::PageEvent;

/// Output handler for CLI messages.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style("ℹ").blue(), msg);
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style("✓").green(), msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: &str) {
        if self.json {
            return;
        }
        eprintln!("{} {}", style("⚠").yellow(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
            return;
        }
        eprintln!("{} {}", style("✗").red(), style(msg).red());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if !self.verbose || self.json {
            return;
        }
        eprintln!("{} {}", style("→").dim(), style(msg).dim());
    }

    /// Print a header/title.
    pub fn header(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a step in a process.
    pub fn step(&self, num: usize, total: usize, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style(format!("[{}/{}]", num, total)).dim(), msg);
    }

    /// Print JSON output.
    pub fn json<T: serde::Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Print a key-value pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.json {
            return;
        }
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print something that happened to the page.
    pub fn page_event(&self, event: &PageEvent) {
        if self.json {
            return;
        }
        println!("  {}", describe_event(event));
    }

    /// Print plain text.
    pub fn raw(&self, text: &str) {
        if self.json {
            return;
        }
        print!("{}", text);
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// One-line, colored description of a page event.
pub fn describe_event(event: &PageEvent) -> String {
    match event {
        PageEvent::Import { specifier } => {
            format!("{} {}", style("import").cyan(), specifier)
        }
        PageEvent::StylesheetInserted { href } => {
            format!("{} {}", style("+ link").green(), href)
        }
        PageEvent::StylesheetRemoved { href } => {
            format!("{} {}", style("- link").dim(), href)
        }
        PageEvent::Status { status, message } => match message {
            Some(message) => format!("{} {} ({})", style("status").yellow(), status, message),
            None => format!("{} {}", style("status").yellow(), status),
        },
        PageEvent::Fallback { reason } => {
            format!("{} {}", style("fallback").red(), reason)
        }
        PageEvent::Reload => style("reload").red().bold().to_string(),
    }
}
