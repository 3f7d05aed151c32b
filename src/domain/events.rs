// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::check_outcome::OutcomeKind;
use crate::domain::models::lifecycle::EntityKind;

/// 生命周期事件
///
/// 核心只负责发出事件，日志、指标等消费者通过 [`EventSink`] 接入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    SourceChecked {
        source_id: Uuid,
        outcome: OutcomeKind,
    },
    EntityCreated {
        kind: EntityKind,
        entity_id: Uuid,
    },
    EntityUpdated {
        kind: EntityKind,
        entity_id: Uuid,
    },
    EntitySoftDeleted {
        kind: EntityKind,
        entity_id: Uuid,
    },
    EntityRestored {
        kind: EntityKind,
        entity_id: Uuid,
    },
}

impl LifecycleEvent {
    /// 事件名称，例如 `source.checked`、`entity.soft_deleted`
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::SourceChecked { .. } => "source.checked",
            LifecycleEvent::EntityCreated { .. } => "entity.created",
            LifecycleEvent::EntityUpdated { .. } => "entity.updated",
            LifecycleEvent::EntitySoftDeleted { .. } => "entity.soft_deleted",
            LifecycleEvent::EntityRestored { .. } => "entity.restored",
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            LifecycleEvent::SourceChecked { source_id, .. } => *source_id,
            LifecycleEvent::EntityCreated { entity_id, .. }
            | LifecycleEvent::EntityUpdated { entity_id, .. }
            | LifecycleEvent::EntitySoftDeleted { entity_id, .. }
            | LifecycleEvent::EntityRestored { entity_id, .. } => *entity_id,
        }
    }
}

/// 事件接收端
///
/// `emit` 在写路径上同步调用，实现不得阻塞。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}
