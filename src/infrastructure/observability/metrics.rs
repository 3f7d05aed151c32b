// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

use crate::domain::models::check_outcome::OutcomeKind;
use crate::domain::models::lifecycle::EntityKind;

pub const SOURCE_CHECKS_TOTAL: &str = "source_checks_total";
pub const ENTITY_EVENTS_TOTAL: &str = "entity_events_total";
pub const CHECK_DURATION_SECONDS: &str = "source_check_duration_seconds";
pub const CHECKS_IN_FLIGHT: &str = "source_checks_in_flight";

/// 注册指标说明
pub fn describe_metrics() {
    describe_counter!(SOURCE_CHECKS_TOTAL, "Total number of completed source checks by outcome");
    describe_counter!(ENTITY_EVENTS_TOTAL, "Total number of entity lifecycle events");
    describe_histogram!(CHECK_DURATION_SECONDS, "Duration of source checks in seconds");
    describe_gauge!(CHECKS_IN_FLIGHT, "Number of source checks currently running");
}

pub fn record_source_check(outcome: OutcomeKind) {
    counter!(SOURCE_CHECKS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_entity_event(kind: EntityKind, event: &'static str) {
    counter!(ENTITY_EVENTS_TOTAL, "kind" => kind.to_string(), "event" => event).increment(1);
}

pub fn record_check_duration(elapsed: Duration) {
    histogram!(CHECK_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn set_checks_in_flight(count: usize) {
    gauge!(CHECKS_IN_FLIGHT).set(count as f64);
}
