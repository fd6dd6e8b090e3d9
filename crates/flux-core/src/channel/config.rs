use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use spin::RwLock;

use crate::error::{CoreError, Result, codes};

use super::{ChannelMetadata, WriteBufferWaterMark};

/// 通道的可变配置：水位、自动读取与单轮读取上限。
///
/// # 设计背景（Why）
/// - 配置项由任意线程读取（可写性闸门、读调度），由持有通道的一方偶发修改；
///   读取必须拿到一致快照，不能出现“新低水位配旧高水位”的撕裂组合；
/// - 水位对整体置换走读写锁（写极少、读常发且无竞争），
///   独立布尔与计数走原子量即可。
///
/// # 契约说明（What）
/// - `auto_read`：读轮结束后是否自动声明下一轮读取兴趣，默认开启；
/// - `max_messages_per_read`：单轮读取的消息条数上限，缺省取自元数据，修改时必须为正；
/// - `water_mark()` 返回按值复制的水位对，调用方基于该快照做完整判定；
/// - 全部读取器可在任意线程调用，返回一致（可能略旧）的快照。
///
/// # 风险提示（Trade-offs）
/// - 配置修改与正在执行的刷新之间不做同步屏障：一次已在途的闸门判定
///   可能仍使用旧水位，下一次队列变动即采用新值。
#[derive(Debug)]
pub struct ChannelConfig {
    water_mark: RwLock<WriteBufferWaterMark>,
    auto_read: AtomicBool,
    max_messages_per_read: AtomicUsize,
}

impl ChannelConfig {
    /// 以元数据缺省值构造配置。
    pub fn new(metadata: &ChannelMetadata) -> Self {
        Self {
            water_mark: RwLock::new(WriteBufferWaterMark::default()),
            auto_read: AtomicBool::new(true),
            max_messages_per_read: AtomicUsize::new(metadata.default_max_messages_per_read()),
        }
    }

    /// 读取当前水位对的一致快照。
    pub fn water_mark(&self) -> WriteBufferWaterMark {
        *self.water_mark.read()
    }

    /// 整体置换水位对。
    pub fn set_water_mark(&self, marks: WriteBufferWaterMark) {
        *self.water_mark.write() = marks;
    }

    /// 是否自动声明下一轮读取兴趣。
    pub fn auto_read(&self) -> bool {
        self.auto_read.load(Ordering::Acquire)
    }

    /// 开关自动读取。
    pub fn set_auto_read(&self, enabled: bool) {
        self.auto_read.store(enabled, Ordering::Release);
    }

    /// 单轮读取的消息条数上限。
    pub fn max_messages_per_read(&self) -> usize {
        self.max_messages_per_read.load(Ordering::Acquire)
    }

    /// 修改单轮读取上限；必须为正。
    pub fn set_max_messages_per_read(&self, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(CoreError::new(
                codes::CHANNEL_INVALID_ARGUMENT,
                "max_messages_per_read must be positive",
            ));
        }
        self.max_messages_per_read.store(limit, Ordering::Release);
        Ok(())
    }

    /// 导出当前配置的平面快照，便于序列化或审计。
    pub fn snapshot(&self) -> ChannelOptions {
        let marks = self.water_mark();
        ChannelOptions {
            low_water_mark: marks.low(),
            high_water_mark: marks.high(),
            auto_read: self.auto_read(),
            max_messages_per_read: self.max_messages_per_read(),
        }
    }

    /// 应用一份平面快照；任一项违反不变量则整体拒绝、配置保持原状。
    pub fn apply(&self, options: &ChannelOptions) -> Result<()> {
        let marks = WriteBufferWaterMark::new(options.low_water_mark, options.high_water_mark)?;
        if options.max_messages_per_read == 0 {
            return Err(CoreError::new(
                codes::CHANNEL_INVALID_ARGUMENT,
                "max_messages_per_read must be positive",
            ));
        }
        self.set_water_mark(marks);
        self.set_auto_read(options.auto_read);
        self.max_messages_per_read
            .store(options.max_messages_per_read, Ordering::Release);
        Ok(())
    }
}

/// 配置的平面快照，面向装配与序列化。
///
/// # 契约说明（What）
/// - 字段为裸值，不携带校验状态；经 [`ChannelConfig::apply`] 写回时统一校验；
/// - serde 往返保持字段名稳定，供宿主配置文件直接映射。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    pub low_water_mark: usize,
    pub high_water_mark: usize,
    pub auto_read: bool,
    pub max_messages_per_read: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            low_water_mark: WriteBufferWaterMark::DEFAULT_LOW,
            high_water_mark: WriteBufferWaterMark::DEFAULT_HIGH,
            auto_read: true,
            max_messages_per_read: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ChannelMetadata {
        ChannelMetadata::new(false, 4).expect("合法元数据")
    }

    #[test]
    fn defaults_come_from_metadata() {
        let config = ChannelConfig::new(&metadata());
        assert!(config.auto_read(), "自动读取默认开启");
        assert_eq!(config.max_messages_per_read(), 4, "读取上限缺省取自元数据");
        assert_eq!(config.water_mark(), WriteBufferWaterMark::default());
    }

    #[test]
    fn rejects_invalid_mutations_without_partial_apply() {
        let config = ChannelConfig::new(&metadata());
        assert!(config.set_max_messages_per_read(0).is_err());
        assert_eq!(config.max_messages_per_read(), 4, "非法修改不得生效");

        let bad = ChannelOptions {
            low_water_mark: 1024,
            high_water_mark: 512,
            auto_read: false,
            max_messages_per_read: 2,
        };
        let err = config.apply(&bad).expect_err("倒置水位必须整体拒绝");
        assert_eq!(err.code(), codes::CHANNEL_INVALID_ARGUMENT);
        assert!(config.auto_read(), "拒绝时不得留下半套配置");
    }

    #[test]
    fn snapshot_round_trips_through_apply() {
        let config = ChannelConfig::new(&metadata());
        let options = ChannelOptions {
            low_water_mark: 4096,
            high_water_mark: 8192,
            auto_read: false,
            max_messages_per_read: 16,
        };
        config.apply(&options).expect("合法快照必须接受");
        assert_eq!(config.snapshot(), options);
    }
}
