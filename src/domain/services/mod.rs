// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 生命周期服务（lifecycle_service）：所有实体共用的创建、更新、软删除与恢复
/// - 来源登记处（source_registry）：来源登记、注销与调度字段维护
/// - 结果协调器（result_applier）：把检查结果落实为内容实体与检查历史
pub mod lifecycle_service;
pub mod result_applier;
pub mod source_registry;
