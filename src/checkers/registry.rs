// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;

use crate::checkers::traits::SourceChecker;
use crate::domain::models::source::SourceType;

/// 检查器注册表
///
/// 启动时按来源类型登记检查器，运行期只读
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<SourceType, Arc<dyn SourceChecker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为来源类型登记检查器，重复登记时覆盖
    pub fn register(mut self, source_type: SourceType, checker: Arc<dyn SourceChecker>) -> Self {
        self.checkers.insert(source_type, checker);
        self
    }

    pub fn resolve(&self, source_type: SourceType) -> Option<Arc<dyn SourceChecker>> {
        self.checkers.get(&source_type).cloned()
    }

    pub fn supports(&self, source_type: SourceType) -> bool {
        self.checkers.contains_key(&source_type)
    }
}
