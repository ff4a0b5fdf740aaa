//! 用量账本模块
//!
//! 单个滑动窗口内的用量记录。调速器持有四个账本：
//! 分钟/天 × 请求/token。
//!
//! 账本按插入顺序保存 `(时间戳, 成本)`，插入由调速器串行化，
//! 因此时间戳单调不减，过期清理只需要从队首弹出。

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// 账本条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEntry {
    /// 记录时间
    pub at: Instant,
    /// 成本（请求账本恒为1）
    pub cost: u64,
}

/// 滑动窗口用量账本
///
/// # 特性
/// - 使用 VecDeque 存储条目
/// - 维护窗口内成本总和，读取用量为 O(1)
/// - 惰性清理：只在读取或写入时清除过期条目
///
/// # 示例
/// ```rust
/// use quotagate::ledger::UsageLedger;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut ledger = UsageLedger::new(Duration::from_secs(60));
/// let now = Instant::now();
/// ledger.record(now, 120);
/// ledger.record(now, 30);
///
/// assert_eq!(ledger.len(), 2);
/// assert_eq!(ledger.total(), 150);
/// ```
#[derive(Debug, Clone)]
pub struct UsageLedger {
    /// 窗口大小
    window: Duration,
    /// 窗口内条目
    entries: VecDeque<UsageEntry>,
    /// 窗口内成本总和
    total: u64,
}

impl UsageLedger {
    /// 创建新的账本
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
            total: 0,
        }
    }

    /// 窗口大小
    pub fn window(&self) -> Duration {
        self.window
    }

    /// 窗口内条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 窗口内成本总和
    pub fn total(&self) -> u64 {
        self.total
    }

    /// 最早的条目
    pub fn oldest(&self) -> Option<&UsageEntry> {
        self.entries.front()
    }

    /// 清理过期条目
    ///
    /// 条目年龄达到窗口大小即视为过期。重复调用是幂等的。
    /// 返回被清理的条目数。
    pub fn prune(&mut self, now: Instant) -> usize {
        let mut evicted = 0;

        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.at) >= self.window {
                self.total = self.total.saturating_sub(front.cost);
                self.entries.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        evicted
    }

    /// 追加条目
    pub fn record(&mut self, at: Instant, cost: u64) {
        debug_assert!(
            self.entries.back().map_or(true, |last| last.at <= at),
            "账本时间戳必须单调不减"
        );
        self.entries.push_back(UsageEntry { at, cost });
        self.total = self.total.saturating_add(cost);
    }

    /// 计算为容纳 `cost` 需要等待的时间
    ///
    /// 若 `total + cost <= limit` 返回 `None`。否则找到决定性条目：
    /// 从最早条目开始累计，第一个使释放量足以容纳 `cost` 的条目。
    /// 等待时间 = 窗口大小 - 该条目年龄 + 安全余量。
    ///
    /// 只需释放一个条目时，决定性条目就是最早的条目。
    /// `cost` 本身超过上限时，以最新条目为准（等待整个窗口清空）；
    /// 账本为空则无需等待。
    ///
    /// 调用前应先 [`prune`](Self::prune)。
    pub fn wait_for_headroom(
        &self,
        now: Instant,
        limit: u64,
        cost: u64,
        margin: Duration,
    ) -> Option<Duration> {
        let projected = self.total.saturating_add(cost);
        if projected <= limit {
            return None;
        }

        let needed = projected - limit;
        let mut freed = 0u64;
        let mut binding = None;

        for entry in &self.entries {
            freed = freed.saturating_add(entry.cost);
            binding = Some(entry);
            if freed >= needed {
                break;
            }
        }

        binding.map(|entry| {
            let age = now.saturating_duration_since(entry.at);
            self.window.saturating_sub(age) + margin
        })
    }
}
