use crate::error::{CoreError, Result, codes};

/// 单一传输种类的静态属性，所有同类通道共享同一份值。
///
/// # 设计背景（Why）
/// - 是否支持“仅断开而不关闭”（如 UDP 可 disconnect 后重新 connect）与
///   单轮读取的默认消息上限，都是传输种类决定的常量，不随单个连接变化；
/// - 把它们固化为不可变值，注册与读调度路径即可做无锁判定。
///
/// # 契约说明（What）
/// - `has_disconnect`：`true` 表示 disconnect 仅退回已注册态，之后允许重新 connect；
///   `false` 的传输上 disconnect 退化为 close；
/// - `default_max_messages_per_read`：单轮读取的默认消息条数上限，必须为正，
///   作为通道配置中对应项的缺省来源；
/// - **前置条件**：`default_max_messages_per_read > 0`，否则构造同步失败并返回
///   `channel.invalid_argument`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMetadata {
    has_disconnect: bool,
    default_max_messages_per_read: usize,
}

impl ChannelMetadata {
    /// 构造传输元数据；读取上限必须为正。
    pub fn new(has_disconnect: bool, default_max_messages_per_read: usize) -> Result<Self> {
        if default_max_messages_per_read == 0 {
            return Err(CoreError::new(
                codes::CHANNEL_INVALID_ARGUMENT,
                "default_max_messages_per_read must be positive",
            ));
        }
        Ok(Self {
            has_disconnect,
            default_max_messages_per_read,
        })
    }

    /// 以默认单轮读取上限（1 条）构造。
    pub fn with_disconnect(has_disconnect: bool) -> Self {
        Self {
            has_disconnect,
            default_max_messages_per_read: 1,
        }
    }

    /// 是否支持仅断开而不关闭。
    pub const fn has_disconnect(&self) -> bool {
        self.has_disconnect
    }

    /// 单轮读取的默认消息条数上限。
    pub const fn default_max_messages_per_read(&self) -> usize {
        self.default_max_messages_per_read
    }
}
