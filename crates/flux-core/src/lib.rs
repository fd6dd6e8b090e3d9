#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![allow(private_bounds)]
#![doc = "flux-core: 异步网络通道核心——生命周期、执行上下文亲和与写出背压契约。"]
#![doc = ""]
#![doc = "== 核心职责 =="]
#![doc = "1. 通道（Channel）：一个网络端点的统一句柄，所有 I/O 操作立即返回，完成结果经由一次性写入的通知对象（Promise）异步送达。"]
#![doc = "2. 执行上下文亲和：通道注册后绑定唯一的单线程执行器，全部状态变更串行发生在该执行器上，热路径无锁。"]
#![doc = "3. 背压：写出队列以字节计数驱动高低水位闸门，可写性跃迁逐次上报管道观察者，保证慢消费者不被写入洪峰压垮。"]
#![doc = ""]
#![doc = "== 内存分配依赖 =="]
#![doc = "`flux-core` 定位于 `no_std + alloc` 场景：通知对象、写出队列与事件分发依赖 [`alloc`] 中的 `Box`、`Arc`、`VecDeque` 等类型。"]
#![doc = "纯 `no_std`（无分配器）环境暂不支持；若在无堆平台使用，需由调用方提供等价的内存与调度设施。"]

extern crate alloc;

mod sealed;

pub mod channel;
pub mod error;
pub mod future;
pub mod observability;
pub mod runtime;
/// 测试桩命名空间，集中暴露框架官方维护的 `Noop`/`Manual`/`Scripted` 实现，供集成测试与下游传输实现复用。
///
/// # 设计背景（Why）
/// - 统一维护常见桩对象，避免在各处重复定义零尺寸结构体或手写脚本驱动；
/// - 当核心契约演进时，通过单点更新保证所有测试同步适配。
///
/// # 使用方式（How）
/// - 通过 `use flux_core::test_stubs::*;` 引入需要的桩类型；
/// - 所有桩对象在 `no_std + alloc` 环境同样可用，便于运行最小化集成测试。
pub mod test_stubs;
pub mod transport;

pub use channel::{
    Channel, ChannelBuilder, ChannelConfig, ChannelFuture, ChannelId, ChannelLifecycle,
    ChannelMetadata, ChannelOptions, ChannelPromise, ChannelUnsafe, CompletionOutcome, Extensions,
    OutboundBuffer, OutboundSnapshot, Pipeline, WriteBufferWaterMark,
};
pub use error::{CoreError, Result};
pub use future::{BoxFuture, LocalBoxFuture};
pub use observability::{LogRecord, LogSeverity, Logger, NoopLogger};
pub use runtime::{EventExecutor, Task};
pub use transport::{TransportDriver, TransportSocketAddr};

use alloc::boxed::Box;
use core::fmt;

/// `flux-core` 中所有错误必须实现的 `no_std` 基础 Trait。
///
/// # 设计背景（Why）
/// - `std::error::Error` 在 `no_std` 环境中不可用，因此需要一个对象安全、与平台无关的错误抽象来串联底层错误链。
/// - 该 Trait 作为所有错误类型的“最小公共接口”，帮助框架在 `alloc` 场景下完成跨模块错误传递。
///
/// # 逻辑解析（How）
/// - 约束实现者提供 `Debug` 与 `Display`，便于日志与可观测性收集。
/// - 通过 `source` 方法递归返回链路上的上游错误，保持与 `std::error::Error::source` 一致的语义。
///
/// # 契约说明（What）
/// - **输入/前置条件**：实现类型必须是 `'static` 生命周期并可安全跨线程共享（若需包装进错误链）。
/// - **返回/后置条件**：`source` 返回的引用生命周期受限于 `self`，以防悬垂引用。
///
/// # 设计取舍与风险（Trade-offs）
/// - 未引入 `Send + Sync` 约束，避免对 `no_std` 设备强加多余负担；需要线程安全时请在包装处叠加约束。
/// - 若底层错误不提供 `source`，错误链在此处终止，这是设计上允许的边界情况。
pub trait Error: fmt::Debug + fmt::Display + crate::sealed::Sealed {
    /// 返回当前错误的上游来源。
    #[allow(unused_parens)]
    fn source(&self) -> Option<&(dyn Error + 'static)>;
}

impl<E> Error for Box<E>
where
    E: Error + ?Sized,
{
    #[allow(unused_parens)]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        (**self).source()
    }
}
