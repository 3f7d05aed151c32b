// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::check_outcome::DiscoveredItem;
use crate::domain::models::lifecycle::{EntityKind, EntityMeta, Lifecycle};

/// 缺省标题
pub const DEFAULT_TITLE: &str = "New content from source";

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 200;

/// 内容实体
///
/// 由结果协调器根据来源发现的条目创建，以 `(source_id, natural_key)` 识别。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub meta: EntityMeta,
    /// 所属来源
    pub source_id: Uuid,
    /// 来源内的自然键
    pub natural_key: String,
    pub title: String,
    pub uri: String,
    pub description: Option<String>,
    pub content_hash: Option<String>,
}

impl Article {
    /// 根据发现的条目创建内容实体
    pub fn from_item(meta: EntityMeta, source_id: Uuid, item: &DiscoveredItem) -> Self {
        let mut article = Self {
            meta,
            source_id,
            natural_key: item.natural_key.clone(),
            title: String::new(),
            uri: String::new(),
            description: None,
            content_hash: None,
        };
        article.apply_item(item);
        article
    }

    /// 条目内容是否与当前记录不同
    pub fn differs_from(&self, item: &DiscoveredItem) -> bool {
        self.title != derive_title(item)
            || self.uri != item.uri
            || self.description != derive_description(item)
            || self.content_hash != item.content_hash
    }

    /// 用条目内容覆盖当前字段（不修改元数据）
    pub fn apply_item(&mut self, item: &DiscoveredItem) {
        self.title = derive_title(item);
        self.uri = item.uri.clone();
        self.description = derive_description(item);
        self.content_hash = item.content_hash.clone();
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect::<String>().trim().to_string()
}

fn derive_title(item: &DiscoveredItem) -> String {
    item.title
        .as_deref()
        .map(|title| truncate_chars(title, MAX_TITLE_CHARS))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn derive_description(item: &DiscoveredItem) -> Option<String> {
    item.description
        .as_deref()
        .map(|description| truncate_chars(description, MAX_DESCRIPTION_CHARS))
        .filter(|description| !description.is_empty())
}

impl Lifecycle for Article {
    const KIND: EntityKind = EntityKind::Article;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), String> {
        if self.natural_key.trim().is_empty() {
            return Err("article natural key must not be empty".to_string());
        }
        Ok(())
    }
}
