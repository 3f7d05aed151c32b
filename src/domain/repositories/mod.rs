// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供（SeaORM 实现与内存实现）。
///
/// 包含的仓库接口：
/// - 通用实体仓库（entity_repository）：条件更新与可见性过滤
/// - 来源仓库（source_repository）：到期查询
/// - 内容仓库（article_repository）：按来源的事务性变更提交
/// - 检查历史仓库（watch_log_repository）：最近检查记录
pub mod article_repository;
pub mod entity_repository;
pub mod source_repository;
pub mod watch_log_repository;
