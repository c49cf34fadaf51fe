//! Terminal output: the job's answer on stdout, failures on stderr.

use owo_colors::OwoColorize;
use serde_json::Value;

use crate::error::JobFailure;

pub struct JsonPrinter {
    pub pretty: bool,
}

impl JsonPrinter {
    pub fn render(&self, value: &Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| value.to_string())
    }

    pub fn print(&self, value: &Value) {
        println!("{}", self.render(value));
    }
}

pub struct FailurePrinter {
    pub color: bool,
}

impl FailurePrinter {
    pub fn headline(&self, failure: &JobFailure) -> String {
        let kind = failure.kind().to_string();
        let kind = if self.color { kind.red().bold().to_string() } else { kind };
        match &failure.step_id {
            Some(id) => {
                let id = if self.color { id.yellow().to_string() } else { id.clone() };
                format!("{}: [{}] {}", kind, id, failure.error)
            }
            None => format!("{}: {}", kind, failure.error),
        }
    }

    pub fn print(&self, failure: &JobFailure) {
        eprintln!("{}", self.headline(failure));
        if !failure.completed.is_empty() {
            let done = failure.completed.join(", ");
            if self.color {
                eprintln!("{} {}", "completed:".dimmed(), done.dimmed());
            } else {
                eprintln!("completed: {}", done);
            }
        }
    }
}
