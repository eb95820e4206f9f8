//! Stream configuration model.
//!
//! A stream is a TCP/UDP/Unix-socket listener forwarded to one or more
//! backends, optionally routed by TLS SNI. These are plain values: a stream
//! is replaced wholesale on every write and has no mutation methods.
//!
//! Consistency is checked by [`crate::validation`], not here. Enumerations
//! therefore keep an `Unknown` variant so that a value built in code (or read
//! back from storage) with a literal outside the known set stays
//! representable and can be reported by the validator.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::id::StreamId;

/// Transport of an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Unix domain socket; the address is a filesystem path.
    Socket,
    /// A literal outside the known set.
    Unknown(String),
}

impl Protocol {
    pub const TCP: &'static str = "TCP";
    pub const UDP: &'static str = "UDP";
    pub const SOCKET: &'static str = "SOCKET";
    const VARIANTS: &'static [&'static str] = &[Self::TCP, Self::UDP, Self::SOCKET];

    /// Wire literal of this protocol.
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => Self::TCP,
            Protocol::Udp => Self::UDP,
            Protocol::Socket => Self::SOCKET,
            Protocol::Unknown(raw) => raw,
        }
    }

    /// Strict decoding: `None` for anything but the three known literals.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            Self::TCP => Some(Protocol::Tcp),
            Self::UDP => Some(Protocol::Udp),
            Self::SOCKET => Some(Protocol::Socket),
            _ => None,
        }
    }

    /// Lenient decoding used for stored rows: unknown literals are kept.
    pub fn from_wire(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| Protocol::Unknown(s.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Protocol::Unknown(_))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::unknown_variant(&raw, Self::VARIANTS))
    }
}

/// Shape of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Every connection goes to the default backend.
    Simple,
    /// Connections are routed by TLS SNI; unmatched ones use the default backend.
    SniRouter,
    /// A literal outside the known set.
    Unknown(String),
}

impl StreamType {
    pub const SIMPLE: &'static str = "SIMPLE";
    pub const SNI_ROUTER: &'static str = "SNI_ROUTER";
    const VARIANTS: &'static [&'static str] = &[Self::SIMPLE, Self::SNI_ROUTER];

    pub fn as_str(&self) -> &str {
        match self {
            StreamType::Simple => Self::SIMPLE,
            StreamType::SniRouter => Self::SNI_ROUTER,
            StreamType::Unknown(raw) => raw,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            Self::SIMPLE => Some(StreamType::Simple),
            Self::SNI_ROUTER => Some(StreamType::SniRouter),
            _ => None,
        }
    }

    pub fn from_wire(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| StreamType::Unknown(s.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StreamType::Unknown(_))
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StreamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StreamType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::unknown_variant(&raw, Self::VARIANTS))
    }
}

/// A network or filesystem address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub protocol: Protocol,
    /// IP or hostname for TCP/UDP, socket path for `Socket`.
    pub address: String,
    /// Only meaningful for TCP/UDP. Kept wide so out-of-range input survives
    /// until validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl Address {
    pub fn tcp(address: impl Into<String>, port: i32) -> Self {
        Self {
            protocol: Protocol::Tcp,
            address: address.into(),
            port: Some(port),
        }
    }

    pub fn udp(address: impl Into<String>, port: i32) -> Self {
        Self {
            protocol: Protocol::Udp,
            address: address.into(),
            port: Some(port),
        }
    }

    pub fn socket(path: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Socket,
            address: path.into(),
            port: None,
        }
    }
}

/// Failure-count/cool-down policy guarding a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreaker {
    /// Failures before the breaker opens.
    pub max_failures: i32,
    /// Seconds the breaker stays open.
    pub open_seconds: i32,
}

/// An upstream target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    pub target: Address,
    /// Load-balancing hint; no range is enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreaker>,
}

impl Backend {
    pub fn new(target: Address) -> Self {
        Self {
            target,
            weight: None,
            circuit_breaker: None,
        }
    }
}

/// SNI domain names mapped to a backend group. Only used by SNI routers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub backends: Vec<Backend>,
}

/// Socket-level tuning flags.
///
/// `tcp_keep_alive`, `tcp_no_delay` and `tcp_deferred` only apply to TCP
/// bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureSet {
    pub use_proxy_protocol: bool,
    pub socket_keep_alive: bool,
    pub tcp_keep_alive: bool,
    pub tcp_no_delay: bool,
    pub tcp_deferred: bool,
}

fn default_enabled() -> bool {
    true
}

/// A configured listener and where its traffic goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: StreamId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub binding: Address,
    pub default_backend: Backend,
    /// Ignored unless `stream_type` is [`StreamType::SniRouter`].
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub feature_set: FeatureSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_wire_literals() {
        for (protocol, literal) in [
            (Protocol::Tcp, "\"TCP\""),
            (Protocol::Udp, "\"UDP\""),
            (Protocol::Socket, "\"SOCKET\""),
        ] {
            assert_eq!(serde_json::to_string(&protocol).unwrap(), literal);
            let parsed: Protocol = serde_json::from_str(literal).unwrap();
            assert_eq!(parsed, protocol);
        }
    }

    #[test]
    fn test_stream_type_wire_literals() {
        assert_eq!(
            serde_json::to_string(&StreamType::SniRouter).unwrap(),
            "\"SNI_ROUTER\""
        );
        let parsed: StreamType = serde_json::from_str("\"SIMPLE\"").unwrap();
        assert_eq!(parsed, StreamType::Simple);
    }

    #[test]
    fn test_unknown_literals_rejected_at_decode() {
        assert!(serde_json::from_str::<Protocol>("\"SCTP\"").is_err());
        assert!(serde_json::from_str::<Protocol>("\"tcp\"").is_err());
        assert!(serde_json::from_str::<StreamType>("\"ROUND_ROBIN\"").is_err());
    }

    #[test]
    fn test_unknown_literals_kept_by_lenient_decoding() {
        let protocol = Protocol::from_wire("SCTP");
        assert_eq!(protocol, Protocol::Unknown("SCTP".to_string()));
        assert!(!protocol.is_known());
        assert_eq!(serde_json::to_string(&protocol).unwrap(), "\"SCTP\"");

        assert_eq!(StreamType::from_wire("SNI_ROUTER"), StreamType::SniRouter);
        assert!(!StreamType::from_wire("").is_known());
    }

    #[test]
    fn test_stream_json_shape() {
        let json = serde_json::json!({
            "id": StreamId::new(),
            "name": "edge",
            "type": "SNI_ROUTER",
            "binding": { "protocol": "TCP", "address": "0.0.0.0", "port": 443 },
            "defaultBackend": {
                "target": { "protocol": "SOCKET", "address": "/run/app.sock" },
                "circuitBreaker": { "maxFailures": 3, "openSeconds": 30 }
            },
            "routes": [{
                "domainNames": ["*.example.com"],
                "backends": [{ "target": { "protocol": "TCP", "address": "10.0.0.1", "port": 9000 }, "weight": 2 }]
            }],
            "featureSet": { "tcpNoDelay": true }
        });

        let stream: Stream = serde_json::from_value(json).unwrap();
        assert!(stream.enabled);
        assert_eq!(stream.stream_type, StreamType::SniRouter);
        assert_eq!(stream.default_backend.target.port, None);
        assert_eq!(
            stream.default_backend.circuit_breaker,
            Some(CircuitBreaker {
                max_failures: 3,
                open_seconds: 30
            })
        );
        assert_eq!(stream.routes[0].backends[0].weight, Some(2));
        assert!(stream.feature_set.tcp_no_delay);
        assert!(!stream.feature_set.use_proxy_protocol);

        let encoded = serde_json::to_value(&stream).unwrap();
        assert_eq!(encoded["type"], "SNI_ROUTER");
        assert!(encoded["defaultBackend"]["target"].get("port").is_none());
        let decoded: Stream = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, stream);
    }
}
