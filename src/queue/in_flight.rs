// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::infrastructure::observability::metrics::set_checks_in_flight;

/// 正在检查的来源集合
///
/// 插入即占用：同一来源在释放前无法被再次占用。
/// 每次占用与释放都会刷新 `source_checks_in_flight` 指标。
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<DashSet<Uuid>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用来源，已被占用时返回 `None`
    pub fn try_acquire(&self, id: Uuid) -> Option<InFlightGuard> {
        if self.ids.insert(id) {
            set_checks_in_flight(self.ids.len());
            Some(InFlightGuard {
                ids: self.ids.clone(),
                id,
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn snapshot(&self) -> Vec<Uuid> {
        self.ids.iter().map(|id| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 占用凭证，析构时释放
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<DashSet<Uuid>>,
    id: Uuid,
}

impl InFlightGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
        set_checks_in_flight(self.ids.len());
    }
}
