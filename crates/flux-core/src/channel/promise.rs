use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use spin::Mutex;

use crate::error::CoreError;

/// 通知对象的最终结局：成功、失败或取消，三选一且恰好一次。
///
/// # 契约说明（What）
/// - `Failure` 以 `Arc` 共享失败原因——传输断裂会让整队写出共享同一个根因，
///   克隆引用而非错误链；
/// - 结局一经写入不可更改，后续完成尝试一律被拒绝。
#[derive(Clone, Debug)]
pub enum CompletionOutcome {
    Success,
    Failure(Arc<CoreError>),
    Cancelled,
}

impl CompletionOutcome {
    /// 是否成功。
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// 是否失败。
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// 是否被取消。
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 失败时返回共享原因。
    pub fn failure(&self) -> Option<&Arc<CoreError>> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

type CompletionListener = Box<dyn FnOnce(&CompletionOutcome) + Send + 'static>;

#[derive(Default)]
struct PromiseState {
    outcome: Option<CompletionOutcome>,
    listeners: Vec<CompletionListener>,
    wakers: Vec<Waker>,
}

struct PromiseShared {
    state: Mutex<PromiseState>,
    void: bool,
}

impl PromiseShared {
    fn complete(&self, outcome: CompletionOutcome) -> bool {
        if self.void {
            return false;
        }
        let (listeners, wakers, stored) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            (
                core::mem::take(&mut state.listeners),
                core::mem::take(&mut state.wakers),
                outcome,
            )
        };
        for listener in listeners {
            listener(&stored);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

/// 一次性写入的异步完成通知。
///
/// # 设计背景（Why）
/// - 所有通道操作立即返回，完成结果必须经由一个“写一次、读多次”的载体送达；
/// - 回调既可能在操作完成前注册，也可能在完成后才注册，两条路径都必须恰好触发一次，
///   否则上层的资源释放与重试逻辑会漏执行或重复执行。
///
/// # 逻辑解析（How）
/// - 内部为自旋互斥保护的状态单元：结局槽位、待触发回调表与等待唤醒的 `Waker` 表；
/// - 完成路径先在锁内占据结局槽位并取走回调表，随后在锁外逐一触发——回调可能
///   重入通道（例如失败后立刻补发），绝不能在持锁时执行；
/// - 完成后注册的回调在注册点立即以已存结局触发。
///
/// # 契约说明（What）
/// - **恰好一次**：首个 `try_*` 调用胜出并返回 `true`，其余一律返回 `false`；
/// - **任意线程**：完成与注册都可在任意线程发起；回调在完成者（或注册者）线程上同步执行；
/// - 克隆共享同一结局：任一克隆完成，所有克隆与派生的 [`ChannelFuture`] 同步可见。
///
/// # 风险提示（Trade-offs）
/// - 回调在完成者线程同步执行，长耗时回调会拖慢完成路径；需要重调度的回调
///   应自行转投执行器；
/// - 空通知（void）丢弃一切结局与回调，仅作为“不关心结果”的占位参数使用。
pub struct ChannelPromise {
    shared: Arc<PromiseShared>,
}

impl ChannelPromise {
    /// 构造未完成的通知。
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PromiseShared {
                state: Mutex::new(PromiseState::default()),
                void: false,
            }),
        }
    }

    /// 构造可复用的空通知：丢弃一切结局与回调。
    pub fn new_void() -> Self {
        Self {
            shared: Arc::new(PromiseShared {
                state: Mutex::new(PromiseState::default()),
                void: true,
            }),
        }
    }

    /// 是否为空通知。
    pub fn is_void(&self) -> bool {
        self.shared.void
    }

    /// 以成功结局完成。
    pub fn try_success(&self) -> bool {
        self.complete(CompletionOutcome::Success)
    }

    /// 以失败结局完成。
    pub fn try_failure(&self, error: CoreError) -> bool {
        self.complete(CompletionOutcome::Failure(Arc::new(error)))
    }

    /// 以共享原因失败，供一因多果的整队失败路径复用。
    pub fn try_failure_shared(&self, error: Arc<CoreError>) -> bool {
        self.complete(CompletionOutcome::Failure(error))
    }

    /// 以取消结局完成；已完成的通知不可再取消。
    pub fn try_cancel(&self) -> bool {
        self.complete(CompletionOutcome::Cancelled)
    }

    /// 是否已有结局。
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    /// 是否以取消收场。
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.shared.state.lock().outcome,
            Some(CompletionOutcome::Cancelled)
        )
    }

    /// 读取结局快照。
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        self.shared.state.lock().outcome.clone()
    }

    /// 注册完成回调：完成前注册的在完成时触发，完成后注册的立即触发，均恰好一次。
    pub fn on_complete(&self, listener: impl FnOnce(&CompletionOutcome) + Send + 'static) {
        if self.shared.void {
            return;
        }
        let mut slot = Some(Box::new(listener) as CompletionListener);
        let ready = {
            let mut state = self.shared.state.lock();
            match &state.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    if let Some(pending) = slot.take() {
                        state.listeners.push(pending);
                    }
                    None
                }
            }
        };
        if let (Some(outcome), Some(listener)) = (ready, slot) {
            listener(&outcome);
        }
    }

    /// 派生可等待、可克隆的只读视图。
    pub fn future(&self) -> ChannelFuture {
        ChannelFuture {
            shared: Arc::clone(&self.shared),
        }
    }

    fn complete(&self, outcome: CompletionOutcome) -> bool {
        self.shared.complete(outcome)
    }
}

impl Default for ChannelPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChannelPromise {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl core::fmt::Debug for ChannelPromise {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelPromise")
            .field("void", &self.shared.void)
            .field("done", &self.is_done())
            .finish()
    }
}

/// 通知的只读、可等待视图。
///
/// # 契约说明（What）
/// - `await` 解析为 [`CompletionOutcome`] 的克隆；
/// - 多个克隆可同时等待，完成时全部被唤醒；
/// - 对空通知 `await` 永不解析——空通知的语义就是“无人等待”。
pub struct ChannelFuture {
    shared: Arc<PromiseShared>,
}

impl ChannelFuture {
    /// 是否已有结局。
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    /// 读取结局快照。
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        self.shared.state.lock().outcome.clone()
    }

    /// 请求取消：对尚无结局的操作以取消收场。
    ///
    /// 返回 `true` 表示本次调用抢占了结局；已完成的操作不可追溯取消。
    /// 被取消的写出绝不会再交给传输。
    pub fn cancel(&self) -> bool {
        self.shared.complete(CompletionOutcome::Cancelled)
    }

    /// 注册完成回调，语义与 [`ChannelPromise::on_complete`] 一致。
    pub fn on_complete(&self, listener: impl FnOnce(&CompletionOutcome) + Send + 'static) {
        if self.shared.void {
            return;
        }
        let mut slot = Some(Box::new(listener) as CompletionListener);
        let ready = {
            let mut state = self.shared.state.lock();
            match &state.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    if let Some(pending) = slot.take() {
                        state.listeners.push(pending);
                    }
                    None
                }
            }
        };
        if let (Some(outcome), Some(listener)) = (ready, slot) {
            listener(&outcome);
        }
    }
}

impl Clone for ChannelFuture {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Future for ChannelFuture {
    type Output = CompletionOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(outcome) = &state.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl core::fmt::Debug for ChannelFuture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelFuture")
            .field("done", &self.is_done())
            .finish()
    }
}
