// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节：
/// - 数据库（database）：提供数据库连接和实体映射
/// - 指标（metrics）：Prometheus 导出器
/// - 可观测性（observability）：生命周期事件接收端与指标定义
/// - 仓库实现（repositories）：领域仓库接口的 SeaORM 与内存实现
///
/// 基础设施层依赖于领域层的抽象接口，领域层不依赖这里的任何实现。
pub mod database;
pub mod metrics;
pub mod observability;
pub mod repositories;
