use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::{Buf, Bytes};

use crate::transport::TransportDriver;

use super::{ChannelPromise, WriteBufferWaterMark};
use crate::error::CoreError;

/// 写出队列的任意线程只读视图：挂起字节数与可写性标志。
///
/// # 设计背景（Why）
/// - 背压查询（`is_writable` 等）发生在任意线程，不能为读一个计数去抢占
///   执行器亲和的队列锁；
/// - 计数与标志都是单字原子量，读取天然不可撕裂，满足“一致快照”的契约。
///
/// # 契约说明（What）
/// - `pending_bytes()`：未被传输接受的字节总量（未刷新 + 在途余量）；
/// - `is_writable()`：滞回后的可写性——触及高水位转为 `false`，
///   回落到低水位及以下才恢复 `true`；
/// - 两项字节距离指标基于调用方提供的水位快照计算，保证与配置读取一致。
#[derive(Debug)]
pub struct OutboundSnapshot {
    pending_bytes: AtomicUsize,
    unwritable: AtomicBool,
}

impl OutboundSnapshot {
    fn new() -> Self {
        Self {
            pending_bytes: AtomicUsize::new(0),
            unwritable: AtomicBool::new(false),
        }
    }

    /// 未被传输接受的字节总量。
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes.load(Ordering::Acquire)
    }

    /// 滞回后的可写性信号。
    pub fn is_writable(&self) -> bool {
        !self.unwritable.load(Ordering::Acquire)
    }

    /// 距离转入不可写还可容纳的字节数。
    pub fn bytes_before_unwritable(&self, marks: WriteBufferWaterMark) -> usize {
        marks.bytes_before_unwritable(self.pending_bytes())
    }

    /// 不可写期间仍需排空的字节数；可写时恒为 0。
    pub fn bytes_before_writable(&self, marks: WriteBufferWaterMark) -> usize {
        if self.is_writable() {
            0
        } else {
            marks.bytes_before_writable(self.pending_bytes())
        }
    }

    fn add_pending(&self, bytes: usize) {
        self.pending_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    fn sub_pending(&self, bytes: usize) {
        self.pending_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// 延迟到锁外触发的通知兑现动作。
///
/// 队列变更在通道内部锁下执行，而兑现通知会运行任意回调（回调可重入通道），
/// 因此所有兑现动作先收集、解锁后再逐一触发。
#[derive(Debug)]
pub enum Completion {
    Success(ChannelPromise),
    Failure(ChannelPromise, Arc<CoreError>),
}

impl Completion {
    /// 触发兑现；必须在所有内部锁释放后调用。
    pub fn fire(self) {
        match self {
            Self::Success(promise) => {
                promise.try_success();
            }
            Self::Failure(promise, error) => {
                promise.try_failure_shared(error);
            }
        }
    }
}

/// 一轮排空的结果。
#[derive(Debug)]
pub enum DrainOutcome {
    /// 全部刷新标记内的条目已写完。
    Drained,
    /// 传输暂时饱和，剩余条目保留在队首等待下一轮。
    Saturated,
    /// 传输报错，当前及后续条目已全部以同一原因失败。
    Failed(Arc<CoreError>),
}

struct PendingWrite {
    payload: Bytes,
    promise: ChannelPromise,
}

/// 有序写出队列：刷新标记边界、字节计数与滞回闸门的载体。
///
/// # 设计背景（Why）
/// - 写入（入队）与刷新（排空）之间隔着一道显式的“刷新标记”边界：
///   write 只入队不触网，flush 先推进边界再尽力排空，
///   这使得“已交给传输的”与“仍在应用侧排队的”在关闭策略中可以区别对待；
/// - 背压不能等到内存耗尽才触发，字节计数在每次变更后立刻对照水位重估。
///
/// # 逻辑解析（How）
/// - 队列是 `VecDeque`，前 `flushed` 个条目处于刷新标记内（在途），其余未刷新；
/// - 短写（部分接受）用 `Bytes::advance` 就地推进在途条目，余量仍在队首，
///   计数随排出的字节递减——计数始终等于“传输尚未接受的字节”；
/// - 刷新标记推进时丢弃已取消的条目：被取消的写出绝不触网，也不再占用计数；
/// - 传输报错视为链路已坏：当前条目与其后全部条目共享同一失败原因。
///
/// # 契约说明（What）
/// - **顺序**：条目按入队顺序兑现（FIFO），先写者不晚于后写者完成；
/// - **计数不变量**：`pending_bytes == 未刷新条目字节 + 在途条目余量`；
/// - **跃迁恰好一次**：[`OutboundBuffer::update_writability`] 仅在穿越水位边界时
///   返回 `Some(新可写性)`，区间内波动返回 `None`；
/// - 所有修改方法仅在通道执行器上调用；兑现动作经 [`Completion`] 延迟到锁外。
pub struct OutboundBuffer {
    queue: VecDeque<PendingWrite>,
    flushed: usize,
    totals: Arc<OutboundSnapshot>,
}

impl OutboundBuffer {
    /// 构造空队列。
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            flushed: 0,
            totals: Arc::new(OutboundSnapshot::new()),
        }
    }

    /// 共享任意线程只读视图。
    pub fn snapshot(&self) -> Arc<OutboundSnapshot> {
        Arc::clone(&self.totals)
    }

    /// 队列是否为空。
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 排队条目数。
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// 入队一条写出；只记账，不触网。
    pub fn enqueue(&mut self, payload: Bytes, promise: ChannelPromise) {
        self.totals.add_pending(payload.len());
        self.queue.push_back(PendingWrite { payload, promise });
    }

    /// 推进刷新标记到队尾，丢弃途中已取消的条目。
    pub fn mark_flushed(&mut self) {
        while self.flushed < self.queue.len() {
            if self.queue[self.flushed].promise.is_cancelled() {
                if let Some(entry) = self.queue.remove(self.flushed) {
                    self.totals.sub_pending(entry.payload.len());
                }
            } else {
                self.flushed += 1;
            }
        }
    }

    /// 是否存在刷新标记内的在途条目。
    pub fn has_flushed_entries(&self) -> bool {
        self.flushed > 0
    }

    /// 尽力排空刷新标记内的条目。
    ///
    /// 短写推进余量并继续尝试；零接受视为传输饱和，保留余量返回；
    /// 报错则当前与后续条目全部失败并清空队列。
    pub fn drain(
        &mut self,
        driver: &mut dyn TransportDriver,
        completions: &mut Vec<Completion>,
    ) -> DrainOutcome {
        while self.flushed > 0 {
            let len = match self.queue.front() {
                Some(entry) => entry.payload.len(),
                None => {
                    self.flushed = 0;
                    break;
                }
            };
            if len == 0 {
                // 空载荷条目直接视为写完。
                if let Some(entry) = self.queue.pop_front() {
                    self.flushed -= 1;
                    completions.push(Completion::Success(entry.promise));
                }
                continue;
            }
            let written = match self.queue.front_mut() {
                Some(entry) => driver.write(&entry.payload),
                None => break,
            };
            match written {
                Ok(0) => return DrainOutcome::Saturated,
                Ok(written) if written < len => {
                    if let Some(entry) = self.queue.front_mut() {
                        entry.payload.advance(written);
                    }
                    self.totals.sub_pending(written);
                }
                Ok(_) => {
                    if let Some(entry) = self.queue.pop_front() {
                        self.flushed -= 1;
                        self.totals.sub_pending(entry.payload.len());
                        completions.push(Completion::Success(entry.promise));
                    }
                }
                Err(error) => {
                    let shared = Arc::new(error);
                    self.fail_all(Arc::clone(&shared), completions);
                    return DrainOutcome::Failed(shared);
                }
            }
        }
        DrainOutcome::Drained
    }

    /// 仅失败刷新标记内的条目，未刷新条目保持排队。
    pub fn fail_flushed(&mut self, error: Arc<CoreError>, completions: &mut Vec<Completion>) {
        while self.flushed > 0 {
            if let Some(entry) = self.queue.pop_front() {
                self.flushed -= 1;
                self.totals.sub_pending(entry.payload.len());
                completions.push(Completion::Failure(entry.promise, Arc::clone(&error)));
            } else {
                self.flushed = 0;
            }
        }
    }

    /// 以同一原因失败全部条目并清空队列。
    pub fn fail_all(&mut self, error: Arc<CoreError>, completions: &mut Vec<Completion>) {
        while let Some(entry) = self.queue.pop_front() {
            self.totals.sub_pending(entry.payload.len());
            completions.push(Completion::Failure(entry.promise, Arc::clone(&error)));
        }
        self.flushed = 0;
    }

    /// 对照水位重估可写性；仅在跃迁时返回新信号。
    pub fn update_writability(&self, marks: WriteBufferWaterMark) -> Option<bool> {
        let pending = self.totals.pending_bytes();
        if self.totals.unwritable.load(Ordering::Acquire) {
            if marks.is_relieved(pending) {
                self.totals.unwritable.store(false, Ordering::Release);
                return Some(true);
            }
        } else if marks.is_exceeded(pending) {
            self.totals.unwritable.store(true, Ordering::Release);
            return Some(false);
        }
        None
    }
}

impl Default for OutboundBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for OutboundBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutboundBuffer")
            .field("entries", &self.queue.len())
            .field("flushed", &self.flushed)
            .field("pending_bytes", &self.totals.pending_bytes())
            .finish()
    }
}
