// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 可观测性模块
///
/// 生命周期事件的接收端与 Prometheus 指标
pub mod events;
pub mod metrics;
