//! 通道核心：端点句柄、受限操作面、写出队列与背压闸门。
//!
//! # 模块布局（How）
//! - `channel`：公开句柄 [`Channel`]、装配器 [`ChannelBuilder`] 与受限操作面 [`ChannelUnsafe`]；
//! - `outbound`：有序写出队列与字节计数；
//! - `watermark`：高低水位与滞回闸门的纯判定；
//! - `promise`：一次性写入的完成通知；
//! - `state`：生命周期状态机；
//! - `metadata` / `config`：传输种类常量与可变配置；
//! - `pipeline`：管道观察者契约；
//! - `id` / `extensions`：标识与用户附件。

#[allow(clippy::module_inception)]
mod channel;
mod config;
mod extensions;
mod id;
mod metadata;
mod outbound;
mod pipeline;
mod promise;
mod state;
mod watermark;

pub use channel::{Channel, ChannelBuilder, ChannelUnsafe};
pub use config::{ChannelConfig, ChannelOptions};
pub use extensions::Extensions;
pub use id::ChannelId;
pub use metadata::ChannelMetadata;
pub use outbound::{Completion, DrainOutcome, OutboundBuffer, OutboundSnapshot};
pub use pipeline::Pipeline;
pub use promise::{ChannelFuture, ChannelPromise, CompletionOutcome};
pub use state::{ChannelLifecycle, LifecycleCell};
pub use watermark::WriteBufferWaterMark;
