// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 实体生命周期能力以及来源、内容、检查历史等实体
pub mod article;
pub mod check_outcome;
pub mod lifecycle;
pub mod source;
pub mod watch_log;
