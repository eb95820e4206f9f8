//! Output formatting for CLI commands.

use colored::Colorize;
use l4gate_streams::{Address, Backend, Protocol, Stream, Violation};
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "l4gate.cli.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                let table = Table::new(data).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            println!("{}", format_json(data, "[]"));
        }
    }
}

/// Print a single item. Both formats render JSON.
pub fn print_single<T: Serialize>(data: &T, _format: OutputFormat) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    });
    serde_json::to_string_pretty(&wrapped).unwrap_or_else(|_| fallback.to_string())
}

/// `TCP 0.0.0.0:443`, `SOCKET /run/app.sock`.
pub fn format_address(address: &Address) -> String {
    match (&address.protocol, address.port) {
        (Protocol::Socket, _) | (_, None) => format!("{} {}", address.protocol, address.address),
        (protocol, Some(port)) => format!("{} {}:{}", protocol, address.address, port),
    }
}

fn format_backend(backend: &Backend) -> String {
    let mut out = format_address(&backend.target);
    if let Some(weight) = backend.weight {
        out.push_str(&format!(" w={weight}"));
    }
    out
}

/// One line of a stream listing.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StreamRow {
    #[tabled(rename = "ID")]
    pub id: String,

    #[tabled(rename = "Name")]
    pub name: String,

    #[tabled(rename = "Type")]
    pub stream_type: String,

    #[tabled(rename = "Binding")]
    pub binding: String,

    #[tabled(rename = "Default Backend")]
    pub default_backend: String,

    #[tabled(rename = "Routes")]
    pub routes: usize,

    #[tabled(rename = "Enabled")]
    pub enabled: bool,
}

impl From<&Stream> for StreamRow {
    fn from(stream: &Stream) -> Self {
        Self {
            id: stream.id.to_string(),
            name: stream.name.clone(),
            stream_type: stream.stream_type.to_string(),
            binding: format_address(&stream.binding),
            default_backend: format_backend(&stream.default_backend),
            routes: stream.routes.len(),
            enabled: stream.enabled,
        }
    }
}

/// One validation failure.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ViolationRow {
    #[tabled(rename = "Path")]
    pub path: String,

    #[tabled(rename = "Message")]
    pub message: String,
}

impl From<&Violation> for ViolationRow {
    fn from(violation: &Violation) -> Self {
        Self {
            path: violation.path.clone(),
            message: violation.message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l4gate_streams::{FeatureSet, Route, StreamId, StreamType};

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(&Address::tcp("0.0.0.0", 443)), "TCP 0.0.0.0:443");
        assert_eq!(format_address(&Address::udp("::", 53)), "UDP :::53");
        assert_eq!(
            format_address(&Address::socket("/run/app.sock")),
            "SOCKET /run/app.sock"
        );
        let portless = Address {
            port: None,
            ..Address::tcp("10.0.0.1", 1)
        };
        assert_eq!(format_address(&portless), "TCP 10.0.0.1");
    }

    #[test]
    fn test_stream_row() {
        let stream = Stream {
            id: StreamId::new(),
            enabled: false,
            name: "edge".to_string(),
            stream_type: StreamType::SniRouter,
            binding: Address::tcp("0.0.0.0", 443),
            default_backend: Backend {
                weight: Some(2),
                ..Backend::new(Address::tcp("10.0.0.1", 8443))
            },
            routes: vec![Route::default(), Route::default()],
            feature_set: FeatureSet::default(),
        };

        let row = StreamRow::from(&stream);
        assert_eq!(row.id, stream.id.to_string());
        assert_eq!(row.stream_type, "SNI_ROUTER");
        assert_eq!(row.default_backend, "TCP 10.0.0.1:8443 w=2");
        assert_eq!(row.routes, 2);
        assert!(!row.enabled);
    }

    #[test]
    fn test_json_output_is_wrapped() {
        let out = format_json(&serde_json::json!({ "exists": true }), "{}");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["schemaVersion"], CLI_SCHEMA_VERSION);
        assert_eq!(value["data"]["exists"], true);
    }
}
