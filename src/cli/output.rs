use colored::Colorize;
use serde::Serialize;

use crate::error::SagepipeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Pretty,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Pretty
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// A `key: value` line with the key highlighted on a terminal.
pub fn field_line(key: &str, value: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{} {}", format!("{key}:").bold(), value)
    } else {
        format!("{key}: {value}")
    }
}

pub fn success_line(message: &str, is_tty: bool) -> String {
    if is_tty {
        message.green().to_string()
    } else {
        message.to_string()
    }
}

/// The text `print_error` emits: pretty JSON in JSON mode, otherwise an
/// `Error: ...` line.
pub fn render_error(err: &SagepipeError, mode: OutputMode, is_tty: bool) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&err.to_json()).unwrap_or_default(),
        OutputMode::Pretty => {
            let label = if is_tty {
                "Error".red().bold().to_string()
            } else {
                "Error".to_string()
            };
            format!("{label}: {err}")
        }
    }
}

/// JSON errors go to stdout so scripts can parse them; pretty ones to stderr.
pub fn print_error(err: &SagepipeError, mode: OutputMode, is_tty: bool) {
    let rendered = render_error(err, mode, is_tty);
    match mode {
        OutputMode::Json => println!("{rendered}"),
        OutputMode::Pretty => eprintln!("{rendered}"),
    }
}
