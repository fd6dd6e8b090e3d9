//! 通道契约使用的官方测试桩合集。
//!
//! # 设计定位（Why）
//! - 合约测试与端到端验证经常需要满足 [`EventExecutor`]、[`Pipeline`]、
//!   [`TransportDriver`] 等契约，但多数场景仅关注通道核心的行为本身。
//! - 过去各测试文件内重复定义手写桩对象，不仅增加维护成本，也容易在接口调整时漏改。
//! - 通过统一出口，测试可以直接复用这些桩对象，并在接口发生变更时获得集中编译错误提示。
//!
//! # 使用方式（How）
//! - 通过 `use flux_core::test_stubs::*;` 引入需要的桩类型。
//! - [`ManualExecutor`] 以显式 `run_all` 驱动任务队列，重现“跨线程转投 + 单线程消化”的调度形态；
//! - [`RecordingPipeline`] 按序捕获全部管道事件，供断言事件次数与顺序；
//! - [`ScriptedDriver`] 以脚本控制传输的接受量、失败与延迟连接，
//!   其 [`ScriptedDriverHandle`] 在驱动交给通道后仍可继续编剧与查账。
//!
//! # 契约说明（What）
//! - **前置条件**：桩对象仅用于测试或示例环境；[`ManualExecutor::in_executor`]
//!   假定只有一个线程调用 `run_all`。
//! - **后置条件**：桩对象不触发网络、定时器等真实副作用。

use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use spin::Mutex;

use crate::{
    channel::{ChannelMetadata, Pipeline},
    error::{CoreError, Result, codes},
    runtime::{EventExecutor, Task},
    transport::{TransportDriver, TransportSocketAddr},
};

/// 手动驱动的执行器桩：任务先入队，测试显式调用 [`ManualExecutor::run_all`] 消化。
///
/// # 行为描述（How）
/// - `execute` 恒入队，不就地执行；`run_all` 在调用线程上按提交顺序逐一运行，
///   期间 `in_executor` 返回 `true`，使重入的通道操作就地执行而保持顺序；
/// - 克隆共享同一队列，测试可以一手交给通道、一手留作驱动句柄。
///
/// # 契约约束（What）
/// - **前置条件**：同一时刻至多一个线程调用 `run_all`；
/// - `refuse_hosting` 之后 `can_host` 返回 `false`，用于演练注册被拒路径。
#[derive(Clone)]
pub struct ManualExecutor {
    shared: Arc<ManualExecutorShared>,
}

struct ManualExecutorShared {
    queue: Mutex<VecDeque<Task>>,
    draining: AtomicBool,
    refuse: AtomicBool,
}

impl ManualExecutor {
    /// 构造空队列的执行器桩。
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ManualExecutorShared {
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                refuse: AtomicBool::new(false),
            }),
        }
    }

    /// 之后的 `can_host` 一律拒绝，用于注册失败演练。
    pub fn refuse_hosting(&self) {
        self.shared.refuse.store(true, Ordering::Release);
    }

    /// 排队中的任务数。
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// 按提交顺序消化全部任务（含消化期间新入队的），返回执行条数。
    pub fn run_all(&self) -> usize {
        self.shared.draining.store(true, Ordering::Release);
        let mut executed = 0;
        loop {
            let task = self.shared.queue.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    executed += 1;
                }
                None => break,
            }
        }
        self.shared.draining.store(false, Ordering::Release);
        executed
    }
}

impl Default for ManualExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventExecutor for ManualExecutor {
    fn execute(&self, task: Task) {
        self.shared.queue.lock().push_back(task);
    }

    fn in_executor(&self) -> bool {
        self.shared.draining.load(Ordering::Acquire)
    }

    fn can_host(&self, _metadata: &ChannelMetadata) -> bool {
        !self.shared.refuse.load(Ordering::Acquire)
    }
}

/// 就地执行的执行器桩：`in_executor` 恒为 `true`，通道操作同步完成。
///
/// 适合只关注语义结果、不关注调度形态的测试。
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateExecutor;

impl EventExecutor for ImmediateExecutor {
    fn execute(&self, task: Task) {
        task();
    }

    fn in_executor(&self) -> bool {
        true
    }
}

/// 管道事件的录制条目，按触发顺序入册。
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEventRecord {
    Registered,
    Activated,
    Deactivated,
    WritabilityChanged(bool),
    Closed,
    Read(Bytes),
    ReadCompleted,
    Exception(&'static str),
}

/// 录制型管道观察者：按序捕获全部事件供断言。
#[derive(Default)]
pub struct RecordingPipeline {
    events: Mutex<Vec<PipelineEventRecord>>,
}

impl RecordingPipeline {
    /// 构造空录制器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 导出事件快照。
    pub fn events(&self) -> Vec<PipelineEventRecord> {
        self.events.lock().clone()
    }

    /// 统计某类事件出现的次数。
    pub fn count(&self, expected: &PipelineEventRecord) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| *event == expected)
            .count()
    }

    /// 清空录制内容。
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: PipelineEventRecord) {
        self.events.lock().push(event);
    }
}

impl Pipeline for RecordingPipeline {
    fn emit_channel_registered(&self) {
        self.push(PipelineEventRecord::Registered);
    }

    fn emit_channel_activated(&self) {
        self.push(PipelineEventRecord::Activated);
    }

    fn emit_channel_deactivated(&self) {
        self.push(PipelineEventRecord::Deactivated);
    }

    fn emit_writability_changed(&self, is_writable: bool) {
        self.push(PipelineEventRecord::WritabilityChanged(is_writable));
    }

    fn emit_channel_closed(&self) {
        self.push(PipelineEventRecord::Closed);
    }

    fn emit_read(&self, msg: Bytes) {
        self.push(PipelineEventRecord::Read(msg));
    }

    fn emit_read_completed(&self) {
        self.push(PipelineEventRecord::ReadCompleted);
    }

    fn emit_exception(&self, error: CoreError) {
        self.push(PipelineEventRecord::Exception(error.code()));
    }
}

/// 丢弃全部事件的管道观察者。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPipeline;

impl Pipeline for NoopPipeline {
    fn emit_channel_registered(&self) {}

    fn emit_channel_activated(&self) {}

    fn emit_channel_deactivated(&self) {}

    fn emit_writability_changed(&self, _is_writable: bool) {}

    fn emit_channel_closed(&self) {}

    fn emit_read(&self, _msg: Bytes) {}

    fn emit_read_completed(&self) {}

    fn emit_exception(&self, _error: CoreError) {}
}

struct ScriptedState {
    connected: bool,
    local: Option<TransportSocketAddr>,
    remote: Option<TransportSocketAddr>,
    accept: VecDeque<usize>,
    fail_write: Option<&'static str>,
    fail_connect: Option<&'static str>,
    defer_connect: bool,
    written: Vec<u8>,
    begin_read_calls: usize,
    disconnect_calls: usize,
    shutdown_calls: usize,
}

impl ScriptedState {
    fn new(connected: bool) -> Self {
        Self {
            connected,
            local: None,
            remote: None,
            accept: VecDeque::new(),
            fail_write: None,
            fail_connect: None,
            defer_connect: false,
            written: Vec::new(),
            begin_read_calls: 0,
            disconnect_calls: 0,
            shutdown_calls: 0,
        }
    }
}

/// 脚本化传输驱动：接受量、失败与延迟连接全部由测试编剧。
///
/// # 行为描述（How）
/// - `write` 依次消费 [`script_accept_sizes`](ScriptedDriver::script_accept_sizes)
///   中的接受上限（脚本耗尽后全量接受）；`0` 表示本轮饱和；
/// - [`fail_next_write`](ScriptedDriver::fail_next_write) 使下一次写出返回
///   `transport.io` 错误，模拟链路断裂；
/// - [`defer_connect`](ScriptedDriver::defer_connect) 使 `connect` 返回“进行中”，
///   测试随后通过通道的 finish-connect 入口回报结局；
/// - 驱动交给通道后，测试经 [`ScriptedDriverHandle`] 继续编剧与查账。
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedDriver {
    /// 构造未连接的驱动。
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState::new(false))),
        }
    }

    /// 构造已连接的驱动（模拟监听通道接受产生的子通道）。
    pub fn connected() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState::new(true))),
        }
    }

    /// 派生共享同一脚本状态的句柄。
    pub fn handle(&self) -> ScriptedDriverHandle {
        ScriptedDriverHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// 追加一组按调用次序消费的写出接受上限。
    pub fn script_accept_sizes(&self, sizes: Vec<usize>) {
        self.state.lock().accept.extend(sizes);
    }

    /// 令下一次写出以指定消息失败。
    pub fn fail_next_write(&self, message: &'static str) {
        self.state.lock().fail_write = Some(message);
    }

    /// 令后续 `connect` 返回“进行中”。
    pub fn defer_connect(&self) {
        self.state.lock().defer_connect = true;
    }

    /// 令下一次 `connect` 失败。
    pub fn fail_next_connect(&self, message: &'static str) {
        self.state.lock().fail_connect = Some(message);
    }

    /// 已写出的全部字节。
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ScriptedDriver`] 的共享句柄：驱动移交通道后继续编剧与查账。
#[derive(Clone)]
pub struct ScriptedDriverHandle {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedDriverHandle {
    /// 追加写出接受上限脚本。
    pub fn script_accept_sizes(&self, sizes: Vec<usize>) {
        self.state.lock().accept.extend(sizes);
    }

    /// 令下一次写出失败。
    pub fn fail_next_write(&self, message: &'static str) {
        self.state.lock().fail_write = Some(message);
    }

    /// 把传输置为已建立（配合延迟连接的 finish-connect 流程）。
    pub fn establish(&self, remote: TransportSocketAddr) {
        let mut state = self.state.lock();
        state.connected = true;
        state.remote = Some(remote);
    }

    /// 已写出的全部字节。
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// `begin_read` 的累计调用次数。
    pub fn begin_read_calls(&self) -> usize {
        self.state.lock().begin_read_calls
    }

    /// `disconnect` 的累计调用次数。
    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    /// `shutdown` 的累计调用次数。
    pub fn shutdown_calls(&self) -> usize {
        self.state.lock().shutdown_calls
    }
}

impl TransportDriver for ScriptedDriver {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn local_addr(&self) -> Option<TransportSocketAddr> {
        self.state.lock().local
    }

    fn remote_addr(&self) -> Option<TransportSocketAddr> {
        self.state.lock().remote
    }

    fn bind(&mut self, local: &TransportSocketAddr) -> Result<(), CoreError> {
        self.state.lock().local = Some(*local);
        Ok(())
    }

    fn connect(
        &mut self,
        remote: &TransportSocketAddr,
        local: Option<&TransportSocketAddr>,
    ) -> Result<bool, CoreError> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_connect.take() {
            return Err(CoreError::new(codes::TRANSPORT_IO, message));
        }
        if let Some(local) = local {
            state.local = Some(*local);
        }
        if state.defer_connect {
            return Ok(false);
        }
        state.connected = true;
        state.remote = Some(*remote);
        Ok(true)
    }

    fn disconnect(&mut self) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        state.remote = None;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.shutdown_calls += 1;
        state.connected = false;
        Ok(())
    }

    fn begin_read(&mut self) -> Result<(), CoreError> {
        self.state.lock().begin_read_calls += 1;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, CoreError> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_write.take() {
            return Err(CoreError::new(codes::TRANSPORT_IO, message));
        }
        let cap = state.accept.pop_front().unwrap_or(usize::MAX);
        let accepted = cap.min(buf.len());
        state.written.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }
}
