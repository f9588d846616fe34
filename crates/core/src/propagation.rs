use std::collections::HashMap;

use opentelemetry::propagation::{
    Extractor, Injector, TextMapCompositePropagator, TextMapPropagator,
};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};

/// W3C TraceContext + Baggage.
///
/// Each member writes and reads only its own keys (`traceparent`,
/// `tracestate`, `baggage`); extraction merges both into one context.
pub fn build_propagator() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
}

/// Header names the composite propagator touches.
pub fn propagation_fields(propagator: &dyn TextMapPropagator) -> Vec<String> {
    propagator.fields().map(str::to_string).collect()
}

pub fn inject_context(propagator: &dyn TextMapPropagator, cx: &Context, carrier: &mut dyn Injector) {
    propagator.inject_context(cx, carrier);
}

pub fn extract_context(propagator: &dyn TextMapPropagator, carrier: &dyn Extractor) -> Context {
    propagator.extract(carrier)
}

/// Serialize `cx` into a fresh header map, e.g. for a message envelope.
pub fn inject_headers(propagator: &dyn TextMapPropagator, cx: &Context) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    propagator.inject_context(cx, &mut headers);
    headers
}

pub fn extract_headers(propagator: &dyn TextMapPropagator, headers: &HashMap<String, String>) -> Context {
    propagator.extract(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry::KeyValue;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn remote_context(flags: TraceFlags) -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            flags,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_round_trip_trace_and_baggage() {
        let propagator = build_propagator();
        let cx = remote_context(TraceFlags::SAMPLED)
            .with_baggage(vec![KeyValue::new("tenant", "acme")]);

        let headers = inject_headers(&propagator, &cx);
        assert!(headers.contains_key("traceparent"));
        assert!(headers.contains_key("baggage"));

        let extracted = extract_headers(&propagator, &headers);
        let span = extracted.span();
        let span_context = span.span_context();
        assert_eq!(span_context.trace_id(), TraceId::from_hex(TRACE_ID).unwrap());
        assert_eq!(span_context.span_id(), SpanId::from_hex(SPAN_ID).unwrap());
        assert!(span_context.is_sampled());
        assert!(span_context.is_remote());
        assert_eq!(
            extracted.baggage().get("tenant").map(|v| v.to_string()),
            Some("acme".to_string())
        );
    }

    #[test]
    fn test_unsampled_flag_survives_round_trip() {
        let propagator = build_propagator();
        let headers = inject_headers(&propagator, &remote_context(TraceFlags::default()));

        let extracted = extract_headers(&propagator, &headers);
        assert!(extracted.span().span_context().is_valid());
        assert!(!extracted.span().span_context().is_sampled());
    }

    #[test]
    fn test_members_extract_independently() {
        let propagator = build_propagator();

        let mut baggage_only = HashMap::new();
        baggage_only.insert("baggage".to_string(), "tenant=acme".to_string());
        let extracted = extract_headers(&propagator, &baggage_only);
        assert!(!extracted.span().span_context().is_valid());
        assert_eq!(extracted.baggage().len(), 1);

        let mut trace_only = HashMap::new();
        trace_only.insert(
            "traceparent".to_string(),
            format!("00-{TRACE_ID}-{SPAN_ID}-01"),
        );
        let extracted = extract_headers(&propagator, &trace_only);
        assert!(extracted.span().span_context().is_valid());
        assert_eq!(extracted.baggage().len(), 0);
    }

    #[test]
    fn test_fields_cover_both_members() {
        let fields = propagation_fields(&build_propagator());
        for key in ["traceparent", "tracestate", "baggage"] {
            assert!(fields.iter().any(|f| f == key), "missing {key}");
        }
    }

    #[test]
    fn test_empty_context_injects_nothing() {
        let headers = inject_headers(&build_propagator(), &Context::new());
        assert!(!headers.contains_key("traceparent"));
    }
}
