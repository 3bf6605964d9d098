//! Output formatting for the CLI.

use clap::ValueEnum;
use serde_json::Value;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a JSON document; text mode prints bare strings without quotes.
pub fn print_value(value: &Value, format: OutputFormat) {
    match (format, value) {
        (OutputFormat::Text, Value::String(text)) => println!("{}", text),
        _ => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", value),
        },
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({"status": "error", "message": message}));
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", label), value);
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("{}", text);
    println!("{}", "-".repeat(50));
}
