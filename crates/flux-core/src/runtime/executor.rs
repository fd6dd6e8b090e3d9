use alloc::boxed::Box;

use crate::{channel::ChannelMetadata, sealed::Sealed};

/// 提交给执行器的一次性任务。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// `EventExecutor` 定义通道绑定的单线程执行上下文契约。
///
/// # 设计背景（Why）
/// - 通道的全部状态变更必须串行发生在唯一的执行器上，以此取代热路径上的互斥锁；
/// - 公开操作在任意线程发起，核心需要一个统一入口把它们转投到正确的线程，
///   并在已处于正确线程时立即执行以避免一次无谓的排队。
///
/// # 逻辑解析（How）
/// - `execute` 接受 `FnOnce` 任务：实现若当前即处于执行器线程，可以直接运行，
///   否则入队等待调度循环消化；两种路径都必须保持同一提交方的任务顺序。
/// - `in_executor` 回答“调用线程是否就是该执行器的驱动线程”，
///   供核心做转投判定与调试断言。
///
/// # 契约说明（What）
/// - **前置条件**：实现必须可跨线程共享，任务入队不得阻塞调用线程；
/// - **后置条件**：已接受的任务最终恰好执行一次；执行器关停路径如何处置余留任务
///   由宿主定义，但不得静默丢弃后仍报告成功；
/// - **顺序保证**：同一提交方连续提交的任务按提交顺序执行；不同提交方之间按到达顺序交错，
///   彼此相对顺序不被重排。
///
/// # 设计取舍与风险（Trade-offs）
/// - 契约不提供任务返回值通道，完成语义统一经由通知对象表达，保持接口最小；
/// - `can_host` 默认接纳所有通道类型；需要区分执行模型（如仅支持数据报）的宿主应覆写，
///   注册路径将据此拒绝不兼容组合。
pub trait EventExecutor: Send + Sync + 'static + Sealed {
    /// 立即执行或入队一个任务，保持提交顺序。
    fn execute(&self, task: Task);

    /// 判断当前线程是否就是该执行器的驱动线程。
    fn in_executor(&self) -> bool;

    /// 声明能否承载指定元数据描述的通道类型。
    fn can_host(&self, metadata: &ChannelMetadata) -> bool {
        let _ = metadata;
        true
    }
}
