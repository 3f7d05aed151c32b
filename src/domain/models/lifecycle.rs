// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 实体元数据
///
/// 所有持久化记录共有的身份、审计时间戳与软删除状态。
/// `deleted_at` 为空表示存活；`version` 是乐观并发控制的版本号，
/// 每次成功写入后由仓库递增。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// 全局唯一标识符，创建时分配，不可变
    pub id: Uuid,
    /// 持久化版本号
    pub version: i64,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后一次写入时间
    pub updated_at: DateTime<Utc>,
    /// 软删除时间
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    /// 为新实体分配标识与时间戳
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// 计算下一个写入时间戳，保证严格晚于 `previous`
pub fn next_stamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// 实体种类，用于生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Source,
    Article,
    WatchLog,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityKind::Source => write!(f, "source"),
            EntityKind::Article => write!(f, "article"),
            EntityKind::WatchLog => write!(f, "watch_log"),
        }
    }
}

/// 生命周期能力
///
/// 所有实体通过组合 [`EntityMeta`] 获得统一的状态转换：
/// 写入刷新、软删除与恢复。状态转换本身是纯内存操作，
/// 持久化由 `LifecycleService` 负责。
pub trait Lifecycle: Clone + Send + Sync + 'static {
    /// 实体种类
    const KIND: EntityKind;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// 实体特有的约束校验
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn is_live(&self) -> bool {
        self.meta().is_live()
    }

    /// 刷新 `updated_at`
    fn touch(&mut self, now: DateTime<Utc>) {
        let meta = self.meta_mut();
        meta.updated_at = next_stamp(meta.updated_at, now);
    }

    /// 标记为软删除，已删除时返回 false 且不做任何修改
    fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        let meta = self.meta_mut();
        if meta.deleted_at.is_some() {
            return false;
        }
        let stamp = next_stamp(meta.updated_at.max(meta.created_at), now);
        meta.deleted_at = Some(stamp);
        meta.updated_at = stamp;
        true
    }

    /// 从软删除中恢复，已存活时返回 false 且不做任何修改
    fn mark_restored(&mut self, now: DateTime<Utc>) -> bool {
        if self.meta().deleted_at.is_none() {
            return false;
        }
        self.meta_mut().deleted_at = None;
        self.touch(now);
        true
    }
}
