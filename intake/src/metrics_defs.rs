//! Metrics definitions for the submission pipeline.

use shared::metrics_defs::{MetricDef, MetricType};

pub const SUBMISSIONS: MetricDef = MetricDef {
    name: "intake.submissions",
    metric_type: MetricType::Counter,
    description: "Form submissions handled. Tagged with outcome.",
};

pub const FILES_RECEIVED: MetricDef = MetricDef {
    name: "intake.files.received",
    metric_type: MetricType::Counter,
    description: "Files written to the upload directory.",
};

pub const DOCUMENTS_SENT: MetricDef = MetricDef {
    name: "intake.documents.sent",
    metric_type: MetricType::Counter,
    description: "Attachments relayed to the chat as documents.",
};

pub const CLEANUP_FAILURES: MetricDef = MetricDef {
    name: "intake.cleanup.failures",
    metric_type: MetricType::Counter,
    description: "Uploaded files that could not be deleted. Tagged with stage.",
};

pub const JANITOR_REMOVED: MetricDef = MetricDef {
    name: "intake.janitor.removed",
    metric_type: MetricType::Counter,
    description: "Expired uploads deleted by the janitor.",
};

pub const DISPATCH_DURATION: MetricDef = MetricDef {
    name: "intake.dispatch.duration",
    metric_type: MetricType::Histogram,
    description: "Time in seconds to relay one submission and its files.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SUBMISSIONS,
    FILES_RECEIVED,
    DOCUMENTS_SENT,
    CLEANUP_FAILURES,
    JANITOR_REMOVED,
    DISPATCH_DURATION,
];
