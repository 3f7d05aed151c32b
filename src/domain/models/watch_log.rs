// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::lifecycle::{EntityKind, EntityMeta, Lifecycle};

/// 检查历史
///
/// 每个改变了内容的成功检查周期追加一条，`previous_id` 指向同一来源的上一条记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchLog {
    pub meta: EntityMeta,
    pub source_id: Uuid,
    pub previous_id: Option<Uuid>,
    /// 本次发现的条目集合摘要
    pub content_hash: String,
    pub items_created: u32,
    pub items_updated: u32,
    pub items_vanished: u32,
}

impl Lifecycle for WatchLog {
    const KIND: EntityKind = EntityKind::WatchLog;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
