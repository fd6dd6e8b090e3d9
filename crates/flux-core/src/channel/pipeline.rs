use bytes::Bytes;

use crate::{error::CoreError, sealed::Sealed};

/// 管道观察者契约：通道核心向外广播生命周期跃迁与入站数据的唯一出口。
///
/// # 设计背景（Why）
/// - Handler 链的编排、事件在链上的传播机制不属于通道核心；核心只承诺
///   “每次状态跃迁恰好产生一个离散事件，事件之间保持发生顺序”；
/// - 以对象安全 Trait 表达，使核心可以持有 `Arc<dyn Pipeline>` 而不感知链的实现。
///
/// # 契约说明（What）
/// - 所有回调都在通道的执行器线程上触发（注册前的装配阶段除外），实现无需自带互斥；
/// - 回调内允许重新进入通道（补发写出、主动关闭）；核心保证触发时不持有内部锁；
/// - **顺序保证**：同一通道的事件按跃迁发生顺序逐一送达，不合并、不重复——
///   尤其是可写性事件，每次跃迁恰好一次。
///
/// # 风险提示（Trade-offs）
/// - 回调同步执行，长耗时处理会阻塞该执行器上的全部通道；重活请转投业务线程池。
pub trait Pipeline: Send + Sync + Sealed {
    /// 通道已绑定执行器。
    fn emit_channel_registered(&self);

    /// 连接建立（或监听生效），通道可收发。
    fn emit_channel_activated(&self);

    /// 连接不再可用：EOF、对端断开或 disconnect。
    fn emit_channel_deactivated(&self);

    /// 可写性发生跃迁，每次跃迁恰好通知一次。
    fn emit_writability_changed(&self, is_writable: bool);

    /// 通道进入终态，资源已释放。
    fn emit_channel_closed(&self);

    /// 收到一条入站消息。
    fn emit_read(&self, msg: Bytes);

    /// 本轮读取结束。
    fn emit_read_completed(&self);

    /// 捕获异常并进入容错流程。
    fn emit_exception(&self, error: CoreError);
}
