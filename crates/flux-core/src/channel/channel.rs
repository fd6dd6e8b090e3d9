use alloc::{
    boxed::Box,
    format,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::cmp::Ordering as CmpOrdering;

use bytes::Bytes;
use spin::{Mutex, RwLock};

use crate::{
    error::{CoreError, Result, codes},
    observability::{LogRecord, LogSeverity, Logger, NoopLogger},
    runtime::EventExecutor,
    transport::{TransportDriver, TransportSocketAddr},
};

use super::{
    ChannelConfig, ChannelFuture, ChannelId, ChannelLifecycle, ChannelMetadata, ChannelOptions,
    ChannelPromise, Extensions, LifecycleCell, OutboundBuffer, OutboundSnapshot, Pipeline,
    outbound::{Completion, DrainOutcome},
};

const LOG_TARGET: &str = "flux_core::channel";

/// 执行器亲和的传输侧状态：驱动、写出队列与读调度标记。
///
/// 整块状态由唯一的自旋互斥保护；按契约它只在通道执行器上被修改，
/// 锁本身不承担跨线程协议，仅为借用检查提供内部可变性。
struct TransportState {
    driver: Option<Box<dyn TransportDriver>>,
    outbound: Option<OutboundBuffer>,
    read_pending: bool,
    pending_connect: Option<ChannelPromise>,
}

struct ChannelInner {
    id: ChannelId,
    metadata: ChannelMetadata,
    config: ChannelConfig,
    parent: Option<Weak<ChannelInner>>,
    pipeline: Arc<dyn Pipeline>,
    logger: Arc<dyn Logger>,
    executor: RwLock<Option<Arc<dyn EventExecutor>>>,
    lifecycle: LifecycleCell,
    local_addr: RwLock<Option<TransportSocketAddr>>,
    remote_addr: RwLock<Option<TransportSocketAddr>>,
    close_promise: ChannelPromise,
    void_promise: ChannelPromise,
    totals: Arc<OutboundSnapshot>,
    transport: Mutex<TransportState>,
    extensions: Extensions,
}

impl ChannelInner {
    fn log(&self, severity: LogSeverity, message: impl Into<alloc::borrow::Cow<'static, str>>) {
        if self.logger.enabled(severity) {
            self.logger
                .log(LogRecord::new(severity, LOG_TARGET, message.into()));
        }
    }
}

/// 通道装配入口：传输工厂在此聚合元数据、驱动、管道与可选项。
///
/// # 设计背景（Why）
/// - 通道的协作方（驱动、管道、日志、父通道）数量可观，位置参数构造器
///   既难读又难扩展；Builder 允许逐项声明并在 `build` 一次性校验；
/// - 配置覆盖在装配期统一走 [`ChannelOptions`] 校验路径，
///   非法水位等问题在构造时同步暴露，而非运行中才发现。
///
/// # 契约说明（What）
/// - `new` 之后即可 `build`；日志默认 [`NoopLogger`]，配置默认取元数据缺省；
/// - `parent` 记录弱引用：父通道先行回收时子通道的 `parent()` 返回 `None`；
/// - **后置条件**：`build` 返回的通道处于 `Unregistered` 态，关闭通知已就位。
pub struct ChannelBuilder {
    metadata: ChannelMetadata,
    driver: Box<dyn TransportDriver>,
    pipeline: Arc<dyn Pipeline>,
    logger: Arc<dyn Logger>,
    parent: Option<Channel>,
    options: Option<ChannelOptions>,
}

impl ChannelBuilder {
    /// 以三个必选协作方起始装配。
    pub fn new(
        metadata: ChannelMetadata,
        driver: impl TransportDriver,
        pipeline: Arc<dyn Pipeline>,
    ) -> Self {
        Self {
            metadata,
            driver: Box::new(driver),
            pipeline,
            logger: Arc::new(NoopLogger),
            parent: None,
            options: None,
        }
    }

    /// 注入日志实现。
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// 记录父通道（如接受该连接的监听通道），仅保留弱引用。
    pub fn parent(mut self, parent: &Channel) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// 覆盖默认配置；在 `build` 时统一校验。
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// 完成装配；配置非法时同步失败。
    pub fn build(self) -> Result<Channel> {
        let config = ChannelConfig::new(&self.metadata);
        if let Some(options) = &self.options {
            config.apply(options)?;
        }
        let outbound = OutboundBuffer::new();
        let totals = outbound.snapshot();
        let inner = Arc::new(ChannelInner {
            id: ChannelId::next(),
            metadata: self.metadata,
            config,
            parent: self.parent.map(|parent| Arc::downgrade(&parent.inner)),
            pipeline: self.pipeline,
            logger: self.logger,
            executor: RwLock::new(None),
            lifecycle: LifecycleCell::new(),
            local_addr: RwLock::new(None),
            remote_addr: RwLock::new(None),
            close_promise: ChannelPromise::new(),
            void_promise: ChannelPromise::new_void(),
            totals,
            transport: Mutex::new(TransportState {
                driver: Some(self.driver),
                outbound: Some(outbound),
                read_pending: false,
                pending_connect: None,
            }),
            extensions: Extensions::new(),
        });
        Ok(Channel { inner })
    }
}

/// 一个网络端点的统一句柄。
///
/// # 设计背景（Why）
/// - 用户代码需要一个随处可克隆、随处可调用的句柄，而通道状态必须
///   只在唯一的执行器线程上变更；句柄负责把两者缝合：
///   公开操作在任意线程发起，内部透明转投到绑定的执行器后才触碰可变状态；
/// - 所有 I/O 立即返回，完成经由一次性通知送达——调用方永远不被阻塞。
///
/// # 逻辑解析（How）
/// - 句柄是 `Arc` 共享内部状态的薄包装，克隆代价为一次引用计数；
/// - 转投判定：已在执行器线程上则就地执行，否则打包任务入队；
///   注册之前（尚无执行器）操作就地执行，装配阶段按契约单线程；
/// - 只读访问器直接走原子量或读写锁快照，不经过转投。
///
/// # 契约说明（What）
/// - `close()` 幂等：对已关闭通道立即以成功兑现，且不再产生任何事件；
/// - `read()` 是提示而非保证：已有读请求在途时为空操作；
/// - 同一调用方连续发起的操作按提交顺序执行；
/// - 句柄按 `id` 排序，进程内全序稳定。
///
/// # 风险提示（Trade-offs）
/// - 注册前就地执行意味着装配阶段的并发调用不受保护；
///   契约要求 Builder 产物在注册前只被单一持有者驱动。
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// 进程内唯一标识。
    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    /// 传输种类元数据。
    pub fn metadata(&self) -> &ChannelMetadata {
        &self.inner.metadata
    }

    /// 可变配置。
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// 当前绑定的执行器；未注册或已注销时为 `None`。
    pub fn executor(&self) -> Option<Arc<dyn EventExecutor>> {
        self.inner.executor.read().as_ref().map(Arc::clone)
    }

    /// 父通道（如接受本连接的监听通道）；父通道已回收时为 `None`。
    pub fn parent(&self) -> Option<Channel> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Channel { inner })
    }

    /// 生命周期快照。
    pub fn lifecycle(&self) -> ChannelLifecycle {
        self.inner.lifecycle.load()
    }

    /// 是否尚未关闭。
    pub fn is_open(&self) -> bool {
        self.lifecycle().is_open()
    }

    /// 是否已绑定执行器。
    pub fn is_registered(&self) -> bool {
        self.lifecycle().is_registered()
    }

    /// 是否可收发数据。
    pub fn is_active(&self) -> bool {
        self.lifecycle().is_active()
    }

    /// 本端地址快照。
    pub fn local_addr(&self) -> Option<TransportSocketAddr> {
        *self.inner.local_addr.read()
    }

    /// 对端地址快照。
    pub fn remote_addr(&self) -> Option<TransportSocketAddr> {
        *self.inner.remote_addr.read()
    }

    /// 关闭通知：构造时创建，进入终态时恰好兑现一次。
    pub fn close_future(&self) -> ChannelFuture {
        self.inner.close_promise.future()
    }

    /// 滞回后的可写性信号。
    pub fn is_writable(&self) -> bool {
        self.inner.totals.is_writable()
    }

    /// 距离转入不可写还可容纳的字节数。
    pub fn bytes_before_unwritable(&self) -> usize {
        self.inner
            .totals
            .bytes_before_unwritable(self.inner.config.water_mark())
    }

    /// 不可写期间仍需排空的字节数；可写时恒为 0。
    pub fn bytes_before_writable(&self) -> usize {
        self.inner
            .totals
            .bytes_before_writable(self.inner.config.water_mark())
    }

    /// 用户附件容器。
    pub fn extensions(&self) -> &Extensions {
        &self.inner.extensions
    }

    /// 受限操作面，仅供执行器与传输实现使用。
    pub fn unsafe_ops(&self) -> ChannelUnsafe {
        ChannelUnsafe {
            channel: self.clone(),
        }
    }

    /// 声明读取兴趣（提示语义）：已有读请求在途时为空操作。
    pub fn read(&self) {
        self.dispatch(|channel| channel.unsafe_ops().begin_read());
    }

    /// 入队一条写出；不触网，完成经由返回的通知送达。
    pub fn write(&self, msg: Bytes) -> ChannelFuture {
        let promise = ChannelPromise::new();
        let future = promise.future();
        self.dispatch(move |channel| channel.unsafe_ops().write(msg, promise));
        future
    }

    /// 入队并立即刷新。
    pub fn write_and_flush(&self, msg: Bytes) -> ChannelFuture {
        let promise = ChannelPromise::new();
        let future = promise.future();
        self.dispatch(move |channel| {
            let ops = channel.unsafe_ops();
            ops.write(msg, promise);
            ops.flush();
        });
        future
    }

    /// 把已入队的写出尽力交给传输。
    pub fn flush(&self) {
        self.dispatch(|channel| channel.unsafe_ops().flush());
    }

    /// 断开连接；不支持 disconnect 的传输上与 `close` 同效。
    pub fn disconnect(&self) -> ChannelFuture {
        let promise = ChannelPromise::new();
        let future = promise.future();
        self.dispatch(move |channel| channel.unsafe_ops().disconnect(promise));
        future
    }

    /// 关闭通道；幂等，对已关闭通道立即成功。
    pub fn close(&self) -> ChannelFuture {
        let promise = ChannelPromise::new();
        let future = promise.future();
        if !self.is_open() {
            promise.try_success();
            return future;
        }
        self.dispatch(move |channel| channel.unsafe_ops().close(promise));
        future
    }

    /// 转投辅助：不在执行器线程上则打包入队，否则就地执行。
    fn dispatch(&self, task: impl FnOnce(Channel) + Send + 'static) {
        let executor = self.inner.executor.read().as_ref().map(Arc::clone);
        match executor {
            Some(executor) if !executor.in_executor() => {
                let channel = self.clone();
                executor.execute(Box::new(move || task(channel)));
            }
            _ => task(self.clone()),
        }
    }
}

impl Clone for Channel {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Channel {}

impl PartialOrd for Channel {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Channel {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.inner.id.cmp(&other.inner.id)
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("lifecycle", &self.lifecycle())
            .field("pending_bytes", &self.inner.totals.pending_bytes())
            .finish()
    }
}

/// 受限操作面：仅供通道的执行器与传输实现调用。
///
/// # 设计背景（Why）
/// - 注册、绑定、刷新等操作会触碰执行器亲和的可变状态，向用户代码开放
///   会破坏“单线程变更”这一根本约束；
/// - 驱动上报入站数据、EOF、异步故障也需要一个回到通道内部的入口。
///
/// # 契约说明（What）
/// - 仅 `local_addr`/`remote_addr`/`close_forcibly`/`register`/`deregister`/
///   `void_promise` 允许任意线程调用；其余操作必须在通道执行器上发起，
///   调试构建下以断言强制；
/// - 携带通知的操作以失败兑现上报错误，绝不跨越执行器边界抛出；
/// - 事件触发与通知兑现都发生在内部锁释放之后，回调可安全重入通道。
pub struct ChannelUnsafe {
    channel: Channel,
}

impl ChannelUnsafe {
    fn inner(&self) -> &ChannelInner {
        &self.channel.inner
    }

    fn assert_in_executor(&self) {
        if cfg!(debug_assertions) {
            if let Some(executor) = self.inner().executor.read().as_ref() {
                debug_assert!(
                    executor.in_executor(),
                    "受限操作必须在通道绑定的执行器上调用"
                );
            }
        }
    }

    /// 本端地址快照（任意线程）。
    pub fn local_addr(&self) -> Option<TransportSocketAddr> {
        self.channel.local_addr()
    }

    /// 对端地址快照（任意线程）。
    pub fn remote_addr(&self) -> Option<TransportSocketAddr> {
        self.channel.remote_addr()
    }

    /// 写出队列的任意线程只读视图。
    pub fn outbound_snapshot(&self) -> Arc<OutboundSnapshot> {
        Arc::clone(&self.inner().totals)
    }

    /// 可复用的空通知：传给不关心结果的操作。
    pub fn void_promise(&self) -> ChannelPromise {
        self.inner().void_promise.clone()
    }

    /// 绑定执行器（任意线程）。
    ///
    /// 失败路径：执行器拒绝承载该通道类型（`channel.incompatible_executor`）、
    /// 已有绑定在位（`channel.already_registered`）、或通道已关闭（`channel.closed`）。
    /// 成功后依序：兑现通知 → 注册事件 → 若传输已连接则激活事件并视配置安排读取。
    pub fn register(&self, executor: Arc<dyn EventExecutor>, promise: ChannelPromise) {
        let inner = self.inner();
        if !inner.lifecycle.load().is_open() {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_CLOSED,
                "register on a closed channel",
            ));
            return;
        }
        if !executor.can_host(&inner.metadata) {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_INCOMPATIBLE_EXECUTOR,
                "executor refused to host this channel type",
            ));
            return;
        }
        {
            let mut slot = inner.executor.write();
            if slot.is_some() {
                drop(slot);
                promise.try_failure(CoreError::new(
                    codes::CHANNEL_ALREADY_REGISTERED,
                    "channel is already registered with an executor",
                ));
                return;
            }
            *slot = Some(executor);
        }
        if let Err(current) = inner.lifecycle.try_advance(ChannelLifecycle::Registered) {
            // 竞争路径：注册途中被强制关闭，回滚绑定并以关闭失败。
            *inner.executor.write() = None;
            promise.try_failure(CoreError::new(
                codes::CHANNEL_CLOSED,
                format!("registration aborted in state {:?}", current),
            ));
            return;
        }
        inner.log(LogSeverity::Debug, format!("{} registered", inner.id));
        promise.try_success();
        inner.pipeline.emit_channel_registered();

        // 接受型子通道在注册时传输已就绪，直接进入激活态。
        let connected = {
            let transport = inner.transport.lock();
            transport
                .driver
                .as_ref()
                .map(|driver| driver.is_connected())
                .unwrap_or(false)
        };
        if connected {
            self.refresh_addresses();
            self.activate();
        }
    }

    /// 解除执行器绑定而不关闭传输（任意线程）。
    pub fn deregister(&self, promise: ChannelPromise) {
        let inner = self.inner();
        *inner.executor.write() = None;
        let _ = inner.lifecycle.try_advance(ChannelLifecycle::Unregistered);
        inner.log(LogSeverity::Debug, format!("{} deregistered", inner.id));
        promise.try_success();
    }

    /// 绑定本地地址；成功后通道进入激活态。
    pub fn bind(&self, addr: TransportSocketAddr, promise: ChannelPromise) {
        self.assert_in_executor();
        let inner = self.inner();
        if !inner.lifecycle.load().is_open() {
            promise.try_failure(CoreError::new(codes::CHANNEL_CLOSED, "bind after close"));
            return;
        }
        if !inner.lifecycle.load().is_registered() {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_NOT_CONNECTED,
                "bind requires a registered channel",
            ));
            return;
        }
        let result = {
            let mut transport = inner.transport.lock();
            match transport.driver.as_mut() {
                Some(driver) => driver.bind(&addr).map(|()| driver.local_addr()),
                None => Err(CoreError::new(codes::CHANNEL_CLOSED, "bind after close")),
            }
        };
        match result {
            Ok(resolved) => {
                *inner.local_addr.write() = resolved.or(Some(addr));
                inner.log(LogSeverity::Debug, format!("{} bound", inner.id));
                promise.try_success();
                self.activate();
            }
            Err(error) => {
                inner.log(
                    LogSeverity::Warn,
                    format!("{} bind failed: {}", inner.id, error),
                );
                promise.try_failure(error);
            }
        }
    }

    /// 发起连接；即刻建立则直接激活，进行中则挂起通知等待驱动回报。
    pub fn connect(
        &self,
        remote: TransportSocketAddr,
        local: Option<TransportSocketAddr>,
        promise: ChannelPromise,
    ) {
        self.assert_in_executor();
        let inner = self.inner();
        let lifecycle = inner.lifecycle.load();
        if !lifecycle.is_open() {
            promise.try_failure(CoreError::new(codes::CHANNEL_CLOSED, "connect after close"));
            return;
        }
        if !lifecycle.is_registered() {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_NOT_CONNECTED,
                "connect requires a registered channel",
            ));
            return;
        }
        let result = {
            let mut transport = inner.transport.lock();
            if transport.pending_connect.is_some() {
                Err(CoreError::new(
                    codes::CHANNEL_INVALID_ARGUMENT,
                    "a connect attempt is already in progress",
                ))
            } else {
                match transport.driver.as_mut() {
                    Some(driver) => match driver.connect(&remote, local.as_ref()) {
                        Ok(true) => Ok(true),
                        Ok(false) => {
                            transport.pending_connect = Some(promise.clone());
                            Ok(false)
                        }
                        Err(error) => Err(error),
                    },
                    None => Err(CoreError::new(codes::CHANNEL_CLOSED, "connect after close")),
                }
            }
        };
        match result {
            Ok(true) => {
                self.refresh_addresses();
                inner.log(LogSeverity::Debug, format!("{} connected", inner.id));
                promise.try_success();
                self.activate();
            }
            Ok(false) => {
                inner.log(
                    LogSeverity::Debug,
                    format!("{} connect in progress", inner.id),
                );
            }
            Err(error) => {
                inner.log(
                    LogSeverity::Warn,
                    format!("{} connect failed: {}", inner.id, error),
                );
                promise.try_failure(error);
            }
        }
    }

    /// 驱动回报延迟连接的结局。
    ///
    /// 挂起通知已被取消时，连接结果作废并释放传输资源；
    /// 无挂起连接时为空操作（结果可能与关闭竞争后到达）。
    pub fn finish_connect(&self, result: Result<()>) {
        self.assert_in_executor();
        let inner = self.inner();
        let pending = inner.transport.lock().pending_connect.take();
        let Some(promise) = pending else {
            return;
        };
        if promise.is_cancelled() {
            inner.log(
                LogSeverity::Debug,
                format!("{} connect cancelled, releasing transport", inner.id),
            );
            self.close(self.void_promise());
            return;
        }
        match result {
            Ok(()) => {
                self.refresh_addresses();
                inner.log(LogSeverity::Debug, format!("{} connected", inner.id));
                promise.try_success();
                self.activate();
            }
            Err(error) => {
                inner.log(
                    LogSeverity::Warn,
                    format!("{} connect failed: {}", inner.id, error),
                );
                promise.try_failure(error);
            }
        }
    }

    /// 断开连接。支持 disconnect 的传输退回已注册态；否则与 `close` 同效，
    /// 通知观察到与关闭一致的结局。
    pub fn disconnect(&self, promise: ChannelPromise) {
        self.assert_in_executor();
        let inner = self.inner();
        if !inner.metadata.has_disconnect() {
            self.close(promise);
            return;
        }
        let lifecycle = inner.lifecycle.load();
        if !lifecycle.is_open() {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_CLOSED,
                "disconnect after close",
            ));
            return;
        }
        if !lifecycle.is_active() {
            promise.try_failure(CoreError::new(
                codes::CHANNEL_NOT_CONNECTED,
                "disconnect requires an established connection",
            ));
            return;
        }
        let result = {
            let mut transport = inner.transport.lock();
            match transport.driver.as_mut() {
                Some(driver) => driver.disconnect(),
                None => Err(CoreError::new(
                    codes::CHANNEL_CLOSED,
                    "disconnect after close",
                )),
            }
        };
        match result {
            Ok(()) => {
                *inner.remote_addr.write() = None;
                let deactivated = inner
                    .lifecycle
                    .try_advance(ChannelLifecycle::Registered)
                    .is_ok();
                inner.log(LogSeverity::Debug, format!("{} disconnected", inner.id));
                promise.try_success();
                if deactivated {
                    inner.pipeline.emit_channel_deactivated();
                }
            }
            Err(error) => {
                inner.log(
                    LogSeverity::Warn,
                    format!("{} disconnect failed: {}", inner.id, error),
                );
                promise.try_failure(error);
            }
        }
    }

    /// 关闭通道并释放传输资源。
    ///
    /// 关闭积压策略：对刷新标记内的条目做一次尽力排空，
    /// 其余条目以 `channel.closed` 失败；全部写出通知先于关闭通知兑现。
    pub fn close(&self, promise: ChannelPromise) {
        let inner = self.inner();
        let prior = inner.lifecycle.close();
        if prior == ChannelLifecycle::Closed {
            promise.try_success();
            return;
        }
        let completions = self.release_transport(prior.is_active());
        for completion in completions {
            completion.fire();
        }
        if prior.is_active() {
            inner.pipeline.emit_channel_deactivated();
        }
        inner.pipeline.emit_channel_closed();
        inner.log(LogSeverity::Info, format!("{} closed", inner.id));
        inner.close_promise.try_success();
        promise.try_success();
    }

    /// 无条件同步释放资源，不产生任何管道事件（任意线程）。
    ///
    /// 仅用于注册本身失败的收尾：队列中的写出依旧以 `channel.closed` 失败，
    /// 关闭通知依旧兑现，但观察者不会看到 deactivated/closed 事件。
    pub fn close_forcibly(&self) {
        let inner = self.inner();
        let prior = inner.lifecycle.close();
        if prior == ChannelLifecycle::Closed {
            return;
        }
        let completions = self.release_transport(false);
        for completion in completions {
            completion.fire();
        }
        inner.log(LogSeverity::Debug, format!("{} forcibly closed", inner.id));
        inner.close_promise.try_success();
    }

    /// 声明下一轮读取兴趣；与在途请求合并。
    pub fn begin_read(&self) {
        self.assert_in_executor();
        let inner = self.inner();
        if !inner.lifecycle.load().is_active() {
            return;
        }
        let result = {
            let mut transport = inner.transport.lock();
            if transport.read_pending {
                return;
            }
            if transport.driver.is_none() {
                return;
            }
            transport.read_pending = true;
            transport.driver.as_mut().unwrap().begin_read()
        };
        if let Err(error) = result {
            {
                let mut transport = inner.transport.lock();
                transport.read_pending = false;
            }
            inner.log(
                LogSeverity::Warn,
                format!("{} begin_read failed: {}", inner.id, error),
            );
            inner.pipeline.emit_exception(error);
        }
    }

    /// 入队一条写出；不触网。关闭后快速失败。
    pub fn write(&self, msg: Bytes, promise: ChannelPromise) {
        self.assert_in_executor();
        let inner = self.inner();
        let marks = inner.config.water_mark();
        let enqueued = {
            let mut transport = inner.transport.lock();
            match transport.outbound.as_mut() {
                Some(outbound) => {
                    outbound.enqueue(msg, promise.clone());
                    Some(outbound.update_writability(marks))
                }
                None => None,
            }
        };
        match enqueued {
            Some(Some(is_writable)) => inner.pipeline.emit_writability_changed(is_writable),
            Some(None) => {}
            None => {
                promise.try_failure(CoreError::new(codes::CHANNEL_CLOSED, "write after close"));
            }
        }
    }

    /// 推进刷新标记并尽力排空。
    ///
    /// 打开但未连接时，刷新标记内的条目以 `channel.not_connected` 失败；
    /// 传输报错时整队失败、上报异常并强制关闭通道。
    pub fn flush(&self) {
        self.assert_in_executor();
        let inner = self.inner();
        let marks = inner.config.water_mark();
        let mut completions = Vec::new();
        let mut failure: Option<Arc<CoreError>> = None;
        let mut transition = None;
        {
            let mut transport = inner.transport.lock();
            let TransportState {
                driver, outbound, ..
            } = &mut *transport;
            let Some(outbound) = outbound.as_mut() else {
                return;
            };
            outbound.mark_flushed();
            let lifecycle = inner.lifecycle.load();
            if !lifecycle.is_active() {
                if lifecycle.is_open() && outbound.has_flushed_entries() {
                    let cause = Arc::new(CoreError::new(
                        codes::CHANNEL_NOT_CONNECTED,
                        "flush on a channel that is not connected",
                    ));
                    outbound.fail_flushed(cause, &mut completions);
                }
            } else if let Some(driver) = driver.as_mut() {
                if let DrainOutcome::Failed(cause) =
                    outbound.drain(driver.as_mut(), &mut completions)
                {
                    failure = Some(cause);
                }
            }
            if failure.is_none() {
                transition = outbound.update_writability(marks);
            }
        }
        for completion in completions {
            completion.fire();
        }
        if let Some(is_writable) = transition {
            inner.pipeline.emit_writability_changed(is_writable);
        }
        if let Some(cause) = failure {
            inner.log(
                LogSeverity::Warn,
                format!("{} flush failed: {}", inner.id, cause),
            );
            inner.pipeline.emit_exception(CoreError::new(
                codes::TRANSPORT_IO,
                format!("flush failed: {}", cause),
            ));
            self.close(self.void_promise());
        }
    }

    /// 驱动上报：到达一条入站消息。
    pub fn inbound(&self, msg: Bytes) {
        self.assert_in_executor();
        self.inner().pipeline.emit_read(msg);
    }

    /// 驱动上报：本轮读取结束；按配置自动续订下一轮。
    pub fn read_completed(&self) {
        self.assert_in_executor();
        let inner = self.inner();
        {
            let mut transport = inner.transport.lock();
            transport.read_pending = false;
        }
        inner.pipeline.emit_read_completed();
        if inner.config.auto_read() {
            self.begin_read();
        }
    }

    /// 驱动上报：读到 EOF 或对端断开，通道转入非激活态。
    pub fn inbound_eof(&self) {
        self.assert_in_executor();
        let inner = self.inner();
        if inner
            .lifecycle
            .try_advance(ChannelLifecycle::Inactive)
            .is_ok()
        {
            inner.log(LogSeverity::Debug, format!("{} inactive (eof)", inner.id));
            inner.pipeline.emit_channel_deactivated();
        }
    }

    /// 驱动上报：异步传输故障；上报异常后关闭通道。
    pub fn transport_failure(&self, error: CoreError) {
        self.assert_in_executor();
        let inner = self.inner();
        inner.log(
            LogSeverity::Warn,
            format!("{} transport failure: {}", inner.id, error),
        );
        inner.pipeline.emit_exception(error);
        self.close(self.void_promise());
    }

    /// 释放传输资源：最后一次尽力排空（仅限曾激活的通道）、
    /// 整队以 `channel.closed` 收尾、回收驱动、作废挂起连接。
    fn release_transport(&self, drain_first: bool) -> Vec<Completion> {
        let inner = self.inner();
        let mut completions = Vec::new();
        let mut transport = inner.transport.lock();
        let closed_cause = Arc::new(CoreError::new(codes::CHANNEL_CLOSED, "channel closed"));
        if drain_first {
            let TransportState {
                driver, outbound, ..
            } = &mut *transport;
            if let (Some(driver), Some(outbound)) = (driver.as_mut(), outbound.as_mut()) {
                if outbound.has_flushed_entries() {
                    let _ = outbound.drain(driver.as_mut(), &mut completions);
                }
            }
        }
        if let Some(outbound) = transport.outbound.as_mut() {
            outbound.fail_all(Arc::clone(&closed_cause), &mut completions);
        }
        transport.outbound = None;
        if let Some(mut driver) = transport.driver.take() {
            let _ = driver.shutdown();
        }
        if let Some(pending) = transport.pending_connect.take() {
            completions.push(Completion::Failure(pending, closed_cause));
        }
        completions
    }

    /// 从驱动回填地址快照。
    fn refresh_addresses(&self) {
        let inner = self.inner();
        let (local, remote) = {
            let transport = inner.transport.lock();
            match transport.driver.as_ref() {
                Some(driver) => (driver.local_addr(), driver.remote_addr()),
                None => (None, None),
            }
        };
        *inner.local_addr.write() = local;
        *inner.remote_addr.write() = remote;
    }

    /// 推进到激活态并触发激活事件；按配置安排首轮读取。
    fn activate(&self) {
        let inner = self.inner();
        if inner
            .lifecycle
            .try_advance(ChannelLifecycle::Active)
            .is_ok()
        {
            inner.pipeline.emit_channel_activated();
            if inner.config.auto_read() {
                self.begin_read();
            }
        }
    }
}

impl core::fmt::Debug for ChannelUnsafe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelUnsafe")
            .field("id", &self.channel.inner.id)
            .finish()
    }
}
