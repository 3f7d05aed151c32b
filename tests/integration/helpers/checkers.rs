// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use puteus::checkers::traits::{CheckError, CheckRequest, SourceChecker};
use puteus::domain::models::check_outcome::DiscoveredItem;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// 按调用顺序返回预设结果，脚本用完后返回空集合
#[derive(Default)]
pub struct SequenceChecker {
    script: Mutex<VecDeque<Result<Vec<DiscoveredItem>, String>>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl SequenceChecker {
    pub fn new(script: Vec<Result<Vec<DiscoveredItem>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceChecker for SequenceChecker {
    async fn check(&self, _request: &CheckRequest) -> Result<Vec<DiscoveredItem>, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(items)) => Ok(items),
            Some(Err(reason)) => Err(CheckError::Transient(reason)),
            None => Ok(vec![]),
        }
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

/// 永不返回的检查器
#[derive(Default)]
pub struct HangingChecker {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl HangingChecker {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceChecker for HangingChecker {
    async fn check(&self, _request: &CheckRequest) -> Result<Vec<DiscoveredItem>, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

#[derive(Default)]
struct TrackerState {
    active: HashMap<Uuid, usize>,
    running: usize,
    max_running: usize,
    overlaps: usize,
    completed: usize,
}

/// 记录并发度的检查器：每次检查耗时 `delay`
pub struct ConcurrencyTracker {
    delay: Duration,
    state: Mutex<TrackerState>,
}

#[allow(dead_code)]
impl ConcurrencyTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// 同一来源被并发检查的次数
    pub fn overlaps(&self) -> usize {
        self.state.lock().overlaps
    }

    pub fn max_running(&self) -> usize {
        self.state.lock().max_running
    }

    pub fn completed(&self) -> usize {
        self.state.lock().completed
    }
}

#[async_trait]
impl SourceChecker for ConcurrencyTracker {
    async fn check(&self, request: &CheckRequest) -> Result<Vec<DiscoveredItem>, CheckError> {
        {
            let mut state = self.state.lock();
            let active = state.active.entry(request.source_id).or_insert(0);
            *active += 1;
            if *active > 1 {
                state.overlaps += 1;
            }
            state.running += 1;
            state.max_running = state.max_running.max(state.running);
        }

        tokio::time::sleep(self.delay).await;

        let mut state = self.state.lock();
        if let Some(active) = state.active.get_mut(&request.source_id) {
            *active -= 1;
        }
        state.running -= 1;
        state.completed += 1;
        Ok(vec![DiscoveredItem::new(request.uri.clone(), request.uri.clone())])
    }

    fn name(&self) -> &'static str {
        "concurrency_tracker"
    }
}
