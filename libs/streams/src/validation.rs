//! Stream consistency validation.
//!
//! [`validate`] walks the whole stream depth-first and records every
//! violation it finds instead of stopping at the first one. Each violation
//! carries a path mirroring the JSON field structure
//! (`routes[0].backends[1].target.port`) and a localizable message key, so
//! API layers can point at the offending field without re-deriving it.
//!
//! Check order is fixed: name, type, binding, default backend, routes (SNI
//! routers only), feature set. The same input always yields the same list in
//! the same order.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::dns::{
    is_valid_domain_name, MAX_PORT, MIN_CIRCUIT_BREAKER_FAILURES,
    MIN_CIRCUIT_BREAKER_OPEN_SECONDS, MIN_PORT,
};
use crate::model::{
    Address, Backend, CircuitBreaker, FeatureSet, Protocol, Route, Stream, StreamType,
};

/// Message keys emitted by the validator.
pub mod keys {
    pub const STREAM_MISSING: &str = "validation.stream.missing";
    pub const VALUE_BLANK: &str = "validation.value.blank";
    pub const STREAM_TYPE_INVALID: &str = "validation.stream.type.invalid";
    pub const PROTOCOL_INVALID: &str = "validation.address.protocol.invalid";
    pub const SOCKET_PATH_INVALID: &str = "validation.address.socket-path.invalid";
    pub const PORT_REQUIRED: &str = "validation.address.port.required";
    pub const PORT_OUT_OF_RANGE: &str = "validation.address.port.out-of-range";
    pub const PORT_NOT_ALLOWED: &str = "validation.address.port.not-allowed";
    pub const MAX_FAILURES_TOO_LOW: &str = "validation.circuit-breaker.max-failures.too-low";
    pub const OPEN_SECONDS_TOO_LOW: &str = "validation.circuit-breaker.open-seconds.too-low";
    pub const ROUTES_REQUIRED: &str = "validation.routes.required";
    pub const DOMAIN_NAMES_REQUIRED: &str = "validation.route.domain-names.required";
    pub const DOMAIN_NAME_INVALID: &str = "validation.route.domain-name.invalid";
    pub const BACKENDS_REQUIRED: &str = "validation.route.backends.required";
    pub const TCP_ONLY_FEATURE: &str = "validation.feature-set.tcp-only";
}

/// A localizable message: a key plus optional integer parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub key: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<&'static str, i64>,
}

impl Message {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &'static str, value: impl Into<i64>) -> Self {
        self.params.insert(name, value.into());
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)?;
        if !self.params.is_empty() {
            let params = self
                .params
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " ({params})")?;
        }
        Ok(())
    }
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: Message,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in one validation pass, in check order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("invalid stream configuration ({} violation(s))", .violations.len())]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// True if some violation sits exactly at `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl IntoIterator for ValidationError {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

/// Validates a stream, returning all violations on failure.
pub fn validate(stream: &Stream) -> Result<(), ValidationError> {
    validate_stream(Some(stream))
}

/// Validates a possibly absent stream.
///
/// An absent stream yields exactly one violation at `stream` and nothing else
/// is checked.
pub fn validate_stream(stream: Option<&Stream>) -> Result<(), ValidationError> {
    let Some(stream) = stream else {
        let mut violations = Violations::default();
        violations.add(&FieldPath::root().field("stream"), Message::new(keys::STREAM_MISSING));
        return violations.into_result();
    };

    let mut violations = Violations::default();
    let root = FieldPath::root();

    check_name(&mut violations, &root, &stream.name);
    check_type(&mut violations, &root, &stream.stream_type);
    check_address(&mut violations, &root.field("binding"), &stream.binding);
    check_backend(
        &mut violations,
        &root.field("defaultBackend"),
        &stream.default_backend,
    );

    // Routes only mean something to SNI routers; a simple stream may carry
    // leftovers from an earlier edit.
    if stream.stream_type == StreamType::SniRouter {
        check_routes(&mut violations, &root.field("routes"), &stream.routes);
    }

    check_feature_set(
        &mut violations,
        &root.field("featureSet"),
        &stream.feature_set,
        &stream.binding.protocol,
    );

    violations.into_result()
}

/// Location of a field inside a stream document.
#[derive(Debug, Clone)]
struct FieldPath(String);

impl FieldPath {
    fn root() -> Self {
        Self(String::new())
    }

    fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }
}

/// Collector threaded through the checks of one validation pass.
#[derive(Debug, Default)]
struct Violations(Vec<Violation>);

impl Violations {
    fn add(&mut self, path: &FieldPath, message: Message) {
        self.0.push(Violation {
            path: path.0.clone(),
            message,
        });
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations: self.0 })
        }
    }
}

fn check_name(violations: &mut Violations, root: &FieldPath, name: &str) {
    if name.trim().is_empty() {
        violations.add(&root.field("name"), Message::new(keys::VALUE_BLANK));
    }
}

fn check_type(violations: &mut Violations, root: &FieldPath, stream_type: &StreamType) {
    if !stream_type.is_known() {
        violations.add(&root.field("type"), Message::new(keys::STREAM_TYPE_INVALID));
    }
}

fn check_address(violations: &mut Violations, path: &FieldPath, address: &Address) {
    if !address.protocol.is_known() {
        violations.add(&path.field("protocol"), Message::new(keys::PROTOCOL_INVALID));
    }

    let is_socket = address.protocol == Protocol::Socket;

    if address.address.trim().is_empty() {
        violations.add(&path.field("address"), Message::new(keys::VALUE_BLANK));
    } else if is_socket && !address.address.starts_with('/') {
        // Reported on the protocol field, not the address.
        violations.add(&path.field("protocol"), Message::new(keys::SOCKET_PATH_INVALID));
    }

    let port_path = path.field("port");
    match (is_socket, address.port) {
        (false, None) => violations.add(&port_path, Message::new(keys::PORT_REQUIRED)),
        (false, Some(port)) if !(MIN_PORT..=MAX_PORT).contains(&port) => violations.add(
            &port_path,
            Message::new(keys::PORT_OUT_OF_RANGE)
                .with_param("min", MIN_PORT)
                .with_param("max", MAX_PORT),
        ),
        (true, Some(_)) => violations.add(&port_path, Message::new(keys::PORT_NOT_ALLOWED)),
        _ => {}
    }
}

fn check_circuit_breaker(violations: &mut Violations, path: &FieldPath, breaker: &CircuitBreaker) {
    if breaker.max_failures < MIN_CIRCUIT_BREAKER_FAILURES {
        violations.add(
            &path.field("maxFailures"),
            Message::new(keys::MAX_FAILURES_TOO_LOW)
                .with_param("min", MIN_CIRCUIT_BREAKER_FAILURES),
        );
    }

    if breaker.open_seconds < MIN_CIRCUIT_BREAKER_OPEN_SECONDS {
        violations.add(
            &path.field("openSeconds"),
            Message::new(keys::OPEN_SECONDS_TOO_LOW)
                .with_param("min", MIN_CIRCUIT_BREAKER_OPEN_SECONDS),
        );
    }
}

fn check_backend(violations: &mut Violations, path: &FieldPath, backend: &Backend) {
    check_address(violations, &path.field("target"), &backend.target);

    if let Some(breaker) = &backend.circuit_breaker {
        check_circuit_breaker(violations, &path.field("circuitBreaker"), breaker);
    }
}

fn check_routes(violations: &mut Violations, path: &FieldPath, routes: &[Route]) {
    if routes.is_empty() {
        violations.add(path, Message::new(keys::ROUTES_REQUIRED));
        return;
    }

    for (index, route) in routes.iter().enumerate() {
        check_route(violations, &path.index(index), route);
    }
}

fn check_route(violations: &mut Violations, path: &FieldPath, route: &Route) {
    let domains_path = path.field("domainNames");
    if route.domain_names.is_empty() {
        violations.add(&domains_path, Message::new(keys::DOMAIN_NAMES_REQUIRED));
    }
    for (index, domain) in route.domain_names.iter().enumerate() {
        let domain_path = domains_path.index(index);
        if domain.trim().is_empty() {
            violations.add(&domain_path, Message::new(keys::VALUE_BLANK));
        } else if !is_valid_domain_name(domain) {
            violations.add(&domain_path, Message::new(keys::DOMAIN_NAME_INVALID));
        }
    }

    let backends_path = path.field("backends");
    if route.backends.is_empty() {
        violations.add(&backends_path, Message::new(keys::BACKENDS_REQUIRED));
    }
    for (index, backend) in route.backends.iter().enumerate() {
        check_backend(violations, &backends_path.index(index), backend);
    }
}

fn check_feature_set(
    violations: &mut Violations,
    path: &FieldPath,
    features: &FeatureSet,
    binding_protocol: &Protocol,
) {
    if *binding_protocol == Protocol::Tcp {
        return;
    }

    let tcp_only = [
        ("tcpKeepAlive", features.tcp_keep_alive),
        ("tcpNoDelay", features.tcp_no_delay),
        ("tcpDeferred", features.tcp_deferred),
    ];
    for (field, enabled) in tcp_only {
        if enabled {
            violations.add(&path.field(field), Message::new(keys::TCP_ONLY_FEATURE));
        }
    }
}
