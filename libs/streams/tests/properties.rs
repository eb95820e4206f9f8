//! Property tests for the validator and stream identity.

use l4gate_streams::{
    validate, validation::keys, Address, Backend, CircuitBreaker, FeatureSet, Route, Stream,
    StreamId, StreamType,
};
use proptest::prelude::*;
use ulid::Ulid;

fn valid_stream() -> Stream {
    Stream {
        id: StreamId::new(),
        enabled: true,
        name: "prop".to_string(),
        stream_type: StreamType::Simple,
        binding: Address::tcp("0.0.0.0", 8080),
        default_backend: Backend::new(Address::tcp("127.0.0.1", 9090)),
        routes: Vec::new(),
        feature_set: FeatureSet::default(),
    }
}

fn keys_of(stream: &Stream) -> Vec<(String, &'static str)> {
    match validate(stream) {
        Ok(()) => Vec::new(),
        Err(err) => err
            .into_iter()
            .map(|v| (v.path, v.message.key))
            .collect(),
    }
}

fn arb_route() -> impl Strategy<Value = Route> {
    (
        prop::collection::vec("[a-z_ .*-]{0,12}", 0..3),
        prop::collection::vec(any::<Option<i32>>(), 0..3),
    )
        .prop_map(|(domain_names, ports)| Route {
            domain_names,
            backends: ports
                .into_iter()
                .map(|port| {
                    Backend::new(Address {
                        port,
                        ..Address::tcp("10.0.0.1", 1)
                    })
                })
                .collect(),
        })
}

proptest! {
    /// Every port in 1..=65535 is accepted on a network binding
    #[test]
    fn in_range_ports_are_valid(port in 1i32..=65_535) {
        let mut stream = valid_stream();
        stream.binding.port = Some(port);
        prop_assert!(validate(&stream).is_ok());
    }

    /// Ports outside 1..=65535 yield exactly one range violation
    #[test]
    fn out_of_range_ports_report_once(
        port in prop_oneof![i32::MIN..=0, 65_536i32..=i32::MAX]
    ) {
        let mut stream = valid_stream();
        stream.binding = Address::udp("0.0.0.0", port);
        prop_assert_eq!(
            keys_of(&stream),
            vec![("binding.port".to_string(), keys::PORT_OUT_OF_RANGE)]
        );
    }

    /// Simple streams never report on their routes, whatever they hold
    #[test]
    fn simple_streams_ignore_routes(routes in prop::collection::vec(arb_route(), 0..4)) {
        let mut stream = valid_stream();
        stream.routes = routes;
        prop_assert!(validate(&stream).is_ok());
    }

    /// Circuit breaker fields are judged independently of each other
    #[test]
    fn circuit_breaker_fields_are_independent(max_failures in -5i32..5, open_seconds in -5i32..5) {
        let mut stream = valid_stream();
        stream.default_backend.circuit_breaker = Some(CircuitBreaker {
            max_failures,
            open_seconds,
        });

        let mut expected = Vec::new();
        if max_failures < 1 {
            expected.push((
                "defaultBackend.circuitBreaker.maxFailures".to_string(),
                keys::MAX_FAILURES_TOO_LOW,
            ));
        }
        if open_seconds < 0 {
            expected.push((
                "defaultBackend.circuitBreaker.openSeconds".to_string(),
                keys::OPEN_SECONDS_TOO_LOW,
            ));
        }
        prop_assert_eq!(keys_of(&stream), expected);
    }

    /// On a UDP binding each enabled TCP-only flag is reported once
    #[test]
    fn tcp_only_flags_on_udp(keep_alive: bool, no_delay: bool, deferred: bool, proxy: bool) {
        let mut stream = valid_stream();
        stream.binding = Address::udp("0.0.0.0", 53);
        stream.feature_set = FeatureSet {
            use_proxy_protocol: proxy,
            socket_keep_alive: proxy,
            tcp_keep_alive: keep_alive,
            tcp_no_delay: no_delay,
            tcp_deferred: deferred,
        };
        let expected = usize::from(keep_alive) + usize::from(no_delay) + usize::from(deferred);
        prop_assert_eq!(keys_of(&stream).len(), expected);

        stream.binding = Address::tcp("0.0.0.0", 53);
        prop_assert!(validate(&stream).is_ok());
    }

    /// StreamId survives Display/FromStr and JSON
    #[test]
    fn stream_id_roundtrip(raw in any::<u128>()) {
        let id = StreamId::from_ulid(Ulid::from(raw));
        let text = id.to_string();
        prop_assert!(text.starts_with("strm_"));
        prop_assert_eq!(text.parse::<StreamId>().unwrap(), id);

        let json = serde_json::to_string(&id).unwrap();
        prop_assert_eq!(serde_json::from_str::<StreamId>(&json).unwrap(), id);
    }
}
