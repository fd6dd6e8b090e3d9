use crate::Error;
use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt;

/// 框架统一的 `Result` 别名，默认错误类型为 [`CoreError`]。
pub type Result<T, E = CoreError> = core::result::Result<T, E>;

/// 错误链路中承载底层原因的对象安全包装。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `CoreError` 表示 `flux-core` 跨层共享的稳定错误域，是所有可观察错误的最终形态。
///
/// # 设计背景（Why）
/// - 通道生命周期、写出队列与传输驱动在不同层次产生的故障需要合流为统一的错误码，
///   以便日志与告警系统能够执行精确的自动化治理。
/// - 框架需兼容 `no_std + alloc` 场景，因此不直接依赖 `std::error::Error`，而是复用 crate 内部定义的轻量抽象。
///
/// # 逻辑解析（How）
/// - 结构体以 Builder 风格方法附加底层原因，并通过 `source()` 暴露完整链路。
/// - 错误码 `code` 始终为 `'static` 字符串，承载稳定语义；`message` 面向排障人员。
///
/// # 契约说明（What）
/// - **前置条件**：调用方必须使用 [`codes`] 模块或遵循 `<域>.<语义>` 约定的自定义码值。
/// - **返回值**：构造函数返回拥有所有权的 `CoreError`，可安全跨线程移动（`Send + Sync + 'static`）。
/// - **后置条件**：除非显式调用 `with_cause`，错误不会包含额外上下文。
///
/// # 设计取舍与风险（Trade-offs）
/// - 采用 `Cow` 保存消息，静态文案零分配，动态描述按需堆分配。
/// - 当同一故障需要同时失败多个通知对象时（例如传输断裂导致整队写出失败），
///   应在通知层以 `Arc<CoreError>` 共享，而非克隆错误链。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 契约说明（What）
    /// - **输入参数**：
    ///   - `code`：遵循 `<域>.<语义>` 约定的稳定错误码；
    ///   - `message`：面向排障人员的自然语言描述，可为 `&'static str` 或堆分配字符串。
    /// - **前置条件**：`message` 不包含敏感信息。
    /// - **后置条件**：返回的 [`CoreError`] 拥有独立所有权，`cause` 初始为空。
    ///
    /// # 示例（Examples）
    /// ```rust
    /// use flux_core::CoreError;
    /// use flux_core::error::codes;
    ///
    /// let err = CoreError::new(codes::CHANNEL_CLOSED, "write after close");
    /// assert_eq!(err.code(), codes::CHANNEL_CLOSED);
    /// assert_eq!(err.message(), "write after close");
    /// assert!(err.cause().is_none(), "初始错误默认不含底层原因");
    /// ```
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 为现有错误设置底层原因。
    pub fn set_cause(&mut self, cause: impl Error + Send + Sync + 'static) {
        self.cause = Some(Box::new(cause));
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// 返回适合排障会议或值班新人的“人话”描述。
    ///
    /// # 设计意图（Why）
    /// - 运行日志常直接呈现技术细节（如 socket errno），对未熟悉通道状态机的排障人员不友好。
    /// - 通过稳定错误码映射出统一的、人类可读的摘要，可在页面、告警中复用并降低沟通成本。
    ///
    /// # 契约定义（What）
    /// - **返回值**：`Cow<'static, str>`，若存在官方摘要则返回借用的静态文案；否则克隆核心消息。
    /// - **后置条件**：不会修改内部状态，可在日志格式化、告警聚合等路径安全复用。
    pub fn human(&self) -> Cow<'static, str> {
        lookup_human_and_hint(self.code)
            .map(|(human, _)| Cow::Borrowed(human))
            .unwrap_or_else(|| self.message.clone())
    }

    /// 返回修复建议，帮助值班人员快速完成处置。
    ///
    /// # 契约定义（What）
    /// - **返回值**：当错误码在官方表中登记时返回 `Some(Cow::Borrowed(hint))`；否则返回 `None`。
    /// - **后置条件**：不影响 `CoreError` 内部 `message` 与 `cause`。
    pub fn hint(&self) -> Option<Cow<'static, str>> {
        lookup_human_and_hint(self.code).and_then(|(_, hint)| hint.map(Cow::Borrowed))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

/// 通道域的稳定错误码集合。
///
/// # 设计背景（Why）
/// - 注册冲突、执行模型不匹配、未连接写出、关闭后投递是通道生命周期的高频故障模式，
///   必须提供标准化标识以便调用方实施兜底策略。
/// - 错误码遵循 `<域>.<语义>` 命名约定，方便在跨组件日志中检索与聚合。
///
/// # 契约说明（What）
/// - **使用前提**：错误码应由实现者封装进 [`CoreError`](crate::CoreError)，
///   并确保在链路日志中携带完整上下文。
/// - **返回承诺**：调用方收到这些错误码后，可据此触发补救措施（重连、丢弃积压或请求人工干预）。
pub mod codes {
    /// 通道已绑定执行器，重复注册被拒绝。
    pub const CHANNEL_ALREADY_REGISTERED: &str = "channel.already_registered";
    /// 目标执行器无法承载该通道类型。
    pub const CHANNEL_INCOMPATIBLE_EXECUTOR: &str = "channel.incompatible_executor";
    /// 操作要求通道已注册或已建立连接。
    pub const CHANNEL_NOT_CONNECTED: &str = "channel.not_connected";
    /// 该通道类型不支持仅断开而不关闭。
    pub const CHANNEL_DISCONNECT_UNSUPPORTED: &str = "channel.disconnect_unsupported";
    /// 通道已关闭，后续操作快速失败。
    pub const CHANNEL_CLOSED: &str = "channel.closed";
    /// 构造参数违反不变量（非正读取上限、低水位不低于高水位等）。
    pub const CHANNEL_INVALID_ARGUMENT: &str = "channel.invalid_argument";
    /// 传输层 I/O 错误，包装驱动返回的底层原因。
    pub const TRANSPORT_IO: &str = "transport.io";
}

/// 根据稳定错误码查找“人话”摘要与修复建议。
///
/// # 契约说明（What）
/// - **输入参数**：`code` 为遵循 `<域>.<语义>` 规范的稳定错误码。
/// - **返回值**：若命中预置表，返回 `(human, hint)`；其中 `hint` 可为空表示暂未提供自动化指引。
/// - **后置条件**：函数本身无副作用，纯读操作，可在 `no_std + alloc` 环境下安全复用。
///
/// # 风险提示（Trade-offs）
/// - 若新增错误码，需要同步更新此表与集成测试，否则 `hint()` 将返回 `None`。
fn lookup_human_and_hint(code: &str) -> Option<(&'static str, Option<&'static str>)> {
    match code {
        codes::CHANNEL_ALREADY_REGISTERED => Some((
            "通道重复注册：句柄已绑定到某个执行器",
            Some("确认注册流程只执行一次；线程池迁移场景应先 deregister 再重新 register"),
        )),
        codes::CHANNEL_INCOMPATIBLE_EXECUTOR => Some((
            "执行模型不匹配：目标执行器无法承载该通道类型",
            Some("核对执行器的 can_host 能力声明；为该传输类型选择兼容的执行器分组"),
        )),
        codes::CHANNEL_NOT_CONNECTED => Some((
            "通道尚未连接：操作要求已注册或已建立的端点",
            Some("先完成 register/bind/connect 再发起该操作；检查连接是否被对端提前断开"),
        )),
        codes::CHANNEL_DISCONNECT_UNSUPPORTED => Some((
            "该通道类型不支持仅断开：disconnect 退化为 close",
            Some("面向连接的传输请直接调用 close；如需可重连语义请使用支持 disconnect 的传输"),
        )),
        codes::CHANNEL_CLOSED => Some((
            "通道已关闭：积压或后续写出被快速失败",
            Some("检查关闭来源（主动 close、对端断开或传输故障）；必要时重建连接后重发"),
        )),
        codes::CHANNEL_INVALID_ARGUMENT => Some((
            "构造参数非法：违反通道配置不变量",
            Some("核对读取上限必须为正、低水位必须严格小于高水位等约束"),
        )),
        codes::TRANSPORT_IO => Some((
            "传输层 I/O 故障：底层连接已断开或发生读写失败",
            Some("复查网络连通性或节点健康；必要时触发连接重建并观测是否持续报错"),
        )),
        _ => None,
    }
}

const _: fn() = || {
    fn assert_error_traits<T: Error + Send + Sync + 'static>() {}

    assert_error_traits::<CoreError>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    /// 验证错误链路：附带底层原因后 `source()` 可回溯，`Display` 输出稳定格式。
    #[test]
    fn cause_chain_is_reachable_through_source() {
        let inner = CoreError::new(codes::TRANSPORT_IO, "connection reset");
        let outer = CoreError::new(codes::CHANNEL_CLOSED, "flush aborted").with_cause(inner);

        assert_eq!(format!("{}", outer), "[channel.closed] flush aborted");

        let source = outer.source().expect("必须暴露底层原因");
        assert_eq!(format!("{}", source), "[transport.io] connection reset");
        assert!(source.source().is_none(), "错误链应在底层原因处终止");
    }

    /// 登记过的错误码应返回官方摘要与修复建议；未登记的回退到原始消息。
    #[test]
    fn human_and_hint_follow_registered_codes() {
        let registered = CoreError::new(codes::CHANNEL_INVALID_ARGUMENT, "raw detail");
        assert_ne!(registered.human(), "raw detail", "登记码应命中官方摘要");
        assert!(registered.hint().is_some(), "登记码应提供修复建议");

        let custom = CoreError::new("demo.unknown", "custom detail");
        assert_eq!(custom.human(), "custom detail", "未登记码回退到原始消息");
        assert!(custom.hint().is_none());
    }
}
