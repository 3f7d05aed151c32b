// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：来源、内容、检查历史与生命周期元数据
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：生命周期、来源登记与结果协调
/// - 事件（events）：生命周期事件与接收端接口
///
/// 领域层不依赖于任何外部实现。
pub mod events;
pub mod models;
pub mod repositories;
pub mod services;
