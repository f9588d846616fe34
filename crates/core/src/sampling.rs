use opentelemetry_sdk::trace::Sampler;

use crate::error::{TelemetryError, TelemetryResult};

/// Root sampling decision for new traces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SamplingPolicy {
    #[default]
    AlwaysOn,
    AlwaysOff,
    /// Probability in the open interval (0.0, 1.0)
    Ratio(f64),
}

impl SamplingPolicy {
    /// Validates `ratio` and folds the endpoints onto the constant samplers.
    /// Out-of-range and NaN values are rejected, never clamped.
    pub fn ratio(ratio: f64) -> TelemetryResult<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(TelemetryError::InvalidSamplingRatio(ratio));
        }

        Ok(if ratio == 1.0 {
            SamplingPolicy::AlwaysOn
        } else if ratio == 0.0 {
            SamplingPolicy::AlwaysOff
        } else {
            SamplingPolicy::Ratio(ratio)
        })
    }

    pub fn as_ratio(&self) -> f64 {
        match self {
            SamplingPolicy::AlwaysOn => 1.0,
            SamplingPolicy::AlwaysOff => 0.0,
            SamplingPolicy::Ratio(ratio) => *ratio,
        }
    }

    pub fn to_sampler(self, parent_based: bool) -> Sampler {
        let root = match self {
            SamplingPolicy::AlwaysOn => Sampler::AlwaysOn,
            SamplingPolicy::AlwaysOff => Sampler::AlwaysOff,
            SamplingPolicy::Ratio(ratio) => Sampler::TraceIdRatioBased(ratio),
        };

        if parent_based {
            Sampler::ParentBased(Box::new(root))
        } else {
            root
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span, TraceContextExt, Tracer, TracerProvider as _};
    use opentelemetry::Context;
    use opentelemetry_sdk::trace::SdkTracerProvider;

    #[test]
    fn test_ratio_accepts_closed_unit_interval() {
        assert_eq!(SamplingPolicy::ratio(1.0).unwrap(), SamplingPolicy::AlwaysOn);
        assert_eq!(SamplingPolicy::ratio(0.0).unwrap(), SamplingPolicy::AlwaysOff);
        assert_eq!(
            SamplingPolicy::ratio(0.25).unwrap(),
            SamplingPolicy::Ratio(0.25)
        );
        assert_eq!(SamplingPolicy::ratio(0.25).unwrap().as_ratio(), 0.25);
    }

    #[test]
    fn test_ratio_rejects_out_of_range_values() {
        for bad in [-0.01, 1.01, 5.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = SamplingPolicy::ratio(bad);
            assert!(
                matches!(result, Err(TelemetryError::InvalidSamplingRatio(_))),
                "ratio {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_constant_policies_decide_every_root() {
        for (policy, expected) in [
            (SamplingPolicy::AlwaysOn, true),
            (SamplingPolicy::AlwaysOff, false),
        ] {
            let provider = SdkTracerProvider::builder()
                .with_sampler(policy.to_sampler(true))
                .build();
            let tracer = provider.tracer("sampling-test");

            for _ in 0..50 {
                let span = tracer.start("root");
                assert_eq!(span.span_context().is_sampled(), expected);
            }
        }
    }

    #[test]
    fn test_children_inherit_root_decision() {
        let policy = SamplingPolicy::ratio(0.5).unwrap();
        let provider = SdkTracerProvider::builder()
            .with_sampler(policy.to_sampler(true))
            .build();
        let tracer = provider.tracer("sampling-test");

        let mut sampled = 0;
        let mut dropped = 0;
        for _ in 0..200 {
            let root = tracer.start("root");
            let root_sampled = root.span_context().is_sampled();
            let cx = Context::current_with_span(root);

            let mut child = tracer.start_with_context("child", &cx);
            assert_eq!(child.span_context().is_sampled(), root_sampled);
            child.end();

            if root_sampled {
                sampled += 1;
            } else {
                dropped += 1;
            }
        }

        assert!(sampled > 0);
        assert!(dropped > 0);
    }
}
