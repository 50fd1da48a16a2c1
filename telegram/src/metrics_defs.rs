//! Metrics definitions for the Bot API client.

use shared::metrics_defs::{MetricDef, MetricType};

pub const API_REQUESTS: MetricDef = MetricDef {
    name: "telegram.api.requests",
    metric_type: MetricType::Counter,
    description: "Bot API calls. Tagged with method, outcome.",
};

pub const API_RETRIES: MetricDef = MetricDef {
    name: "telegram.api.retries",
    metric_type: MetricType::Counter,
    description: "Bot API calls repeated after a 429 or 5xx answer. Tagged with method.",
};

pub const GATE_MESSAGES: MetricDef = MetricDef {
    name: "telegram.gate.messages",
    metric_type: MetricType::Counter,
    description: "Inbound messages seen by the access gate. Tagged with decision.",
};

pub const ALL_METRICS: &[MetricDef] = &[API_REQUESTS, API_RETRIES, GATE_MESSAGES];

#[cfg(test)]
mod tests {
    use super::*;
    use shared::metrics_defs::duplicate_names;

    #[test]
    fn test_metric_names() {
        assert!(duplicate_names(ALL_METRICS).is_empty());
        assert!(ALL_METRICS.iter().all(|def| def.name.starts_with("telegram.")));
    }
}
