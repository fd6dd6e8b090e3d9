//! 契约级日志接口：通道核心通过它上报生命周期与故障信息，而不绑定任何日志后端。
//!
//! # 设计背景（Why）
//! - 核心运行在 `no_std + alloc` 轨道，不能直接依赖宿主日志设施；
//! - 注册、关闭、刷新失败等关键路径仍需留痕，否则排障只能依赖管道事件回放。
//!
//! # 契约说明（What）
//! - [`Logger`] 为对象安全 Trait，宿主以 `Arc<dyn Logger>` 注入；
//! - [`NoopLogger`] 为官方空实现，测试与最小部署默认使用；
//! - 核心只在状态跃迁与故障分支调用日志，不在每字节热路径上产生记录。

use alloc::borrow::Cow;
use core::fmt;

use crate::sealed::Sealed;

/// 日志级别，语义与主流日志生态对齐。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 单条日志记录。
///
/// # 契约说明（What）
/// - `target`：静态来源标识，约定使用模块路径风格（如 `flux_core::channel`）；
/// - `message`：记录正文，静态文案零分配，动态内容按需堆分配；
/// - 结构体按值传递，实现方不得长期持有内部引用之外的假设。
#[derive(Clone, Debug)]
pub struct LogRecord<'a> {
    severity: LogSeverity,
    target: &'static str,
    message: Cow<'a, str>,
}

impl<'a> LogRecord<'a> {
    /// 构造日志记录。
    pub fn new(
        severity: LogSeverity,
        target: &'static str,
        message: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            severity,
            target,
            message: message.into(),
        }
    }

    /// 日志级别。
    pub fn severity(&self) -> LogSeverity {
        self.severity
    }

    /// 静态来源标识。
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// 记录正文。
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}: {}", self.severity, self.target, self.message)
    }
}

/// 对象安全的日志契约。
///
/// # 设计背景（Why）
/// - 通道核心在注册、激活、关闭与刷新失败等跃迁点需要结构化留痕；
/// - 通过契约而非具体实现解耦，宿主可桥接到 tracing、syslog 或环形缓冲。
///
/// # 契约说明（What）
/// - **前置条件**：实现必须可跨线程共享（`Send + Sync`），`log` 不得阻塞调用线程；
/// - **后置条件**：`log` 返回即视为记录被接受，核心不重试、不降级；
/// - `enabled` 允许实现提前拒绝低级别记录，核心在构造动态消息前会先询问。
pub trait Logger: Send + Sync + Sealed {
    /// 写入一条记录。
    fn log(&self, record: LogRecord<'_>);

    /// 查询指定级别是否会被记录，默认全部接受。
    fn enabled(&self, severity: LogSeverity) -> bool {
        let _ = severity;
        true
    }
}

/// 丢弃全部记录的空实现。
///
/// # 契约说明（What）
/// - 不产生任何副作用，适合测试与最小部署；
/// - `enabled` 返回 `false`，使核心跳过动态消息的构造开销。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: LogRecord<'_>) {}

    fn enabled(&self, _severity: LogSeverity) -> bool {
        false
    }
}
