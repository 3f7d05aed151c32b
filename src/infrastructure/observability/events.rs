// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::domain::events::{EventSink, LifecycleEvent};
use crate::infrastructure::observability::metrics::{record_entity_event, record_source_check};

/// 以结构化日志输出事件
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::SourceChecked { source_id, outcome } => {
                info!(event = event.name(), %source_id, %outcome, "Source checked");
            }
            LifecycleEvent::EntityCreated { kind, entity_id }
            | LifecycleEvent::EntityUpdated { kind, entity_id }
            | LifecycleEvent::EntitySoftDeleted { kind, entity_id }
            | LifecycleEvent::EntityRestored { kind, entity_id } => {
                info!(event = event.name(), %kind, %entity_id, "Entity lifecycle event");
            }
        }
    }
}

/// 把事件计入 Prometheus 计数器
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsEventSink;

impl EventSink for MetricsEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::SourceChecked { outcome, .. } => record_source_check(*outcome),
            LifecycleEvent::EntityCreated { kind, .. }
            | LifecycleEvent::EntityUpdated { kind, .. }
            | LifecycleEvent::EntitySoftDeleted { kind, .. }
            | LifecycleEvent::EntityRestored { kind, .. } => {
                record_entity_event(*kind, event.name())
            }
        }
    }
}

/// 依次转发给多个接收端
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// 记录所有事件，供测试断言
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// 按事件名称过滤
    pub fn named(&self, name: &str) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name() == name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
