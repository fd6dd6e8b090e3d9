use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, codes};

/// 写缓冲高低水位对，驱动可写性闸门的全部阈值判定。
///
/// # 设计背景（Why）
/// - 背压信号若只有单一阈值，占用量在阈值附近抖动会引发可写性高频翻转，
///   管道观察者被事件风暴淹没；引入低水位形成滞回区间，跃迁只在穿越区间边界时发生；
/// - 阈值对是纯数据，判定函数无分配、无阻塞，可在每次队列变动时调用。
///
/// # 契约说明（What）
/// - **不变量**：`low < high`，构造时校验，违反返回 `channel.invalid_argument`；
/// - `is_exceeded(pending)`：占用量达到高水位（`pending >= high`）即应转入不可写；
/// - `is_relieved(pending)`：占用量回落到低水位及以下（`pending <= low`）方可恢复可写；
/// - `bytes_before_unwritable(pending)`：距离不可写还可容纳的字节数，饱和为 0；
/// - `bytes_before_writable(pending)`：不可写期间仍需排空的字节数，饱和为 0。
///
/// # 风险提示（Trade-offs）
/// - 区间 `(low, high)` 内的占用量不触发任何跃迁——这是滞回的本意，
///   调用方不应依赖该区间内的事件。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBufferWaterMark {
    low: usize,
    high: usize,
}

impl WriteBufferWaterMark {
    /// 默认低水位：32 KiB。
    pub const DEFAULT_LOW: usize = 32 * 1024;
    /// 默认高水位：64 KiB。
    pub const DEFAULT_HIGH: usize = 64 * 1024;

    /// 构造水位对；要求 `low < high`。
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if low >= high {
            return Err(CoreError::new(
                codes::CHANNEL_INVALID_ARGUMENT,
                "low water mark must be strictly below high water mark",
            ));
        }
        Ok(Self { low, high })
    }

    /// 低水位。
    pub const fn low(&self) -> usize {
        self.low
    }

    /// 高水位。
    pub const fn high(&self) -> usize {
        self.high
    }

    /// 占用量是否已触及高水位（应转入不可写）。
    pub const fn is_exceeded(&self, pending: usize) -> bool {
        pending >= self.high
    }

    /// 占用量是否已回落到低水位及以下（可恢复可写）。
    pub const fn is_relieved(&self, pending: usize) -> bool {
        pending <= self.low
    }

    /// 距离不可写还可容纳的字节数。
    pub const fn bytes_before_unwritable(&self, pending: usize) -> usize {
        self.high.saturating_sub(pending)
    }

    /// 不可写期间仍需排空的字节数。
    pub const fn bytes_before_writable(&self, pending: usize) -> usize {
        pending.saturating_sub(self.low)
    }
}

impl Default for WriteBufferWaterMark {
    fn default() -> Self {
        Self {
            low: Self::DEFAULT_LOW,
            high: Self::DEFAULT_HIGH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_or_equal_marks() {
        let err = WriteBufferWaterMark::new(8, 8).expect_err("低水位不得等于高水位");
        assert_eq!(err.code(), codes::CHANNEL_INVALID_ARGUMENT);
        assert!(WriteBufferWaterMark::new(16, 8).is_err(), "倒置水位必须被拒绝");
    }

    #[test]
    fn threshold_predicates_form_hysteresis_band() {
        let marks = WriteBufferWaterMark::new(4096, 8192).expect("合法水位");

        assert!(!marks.is_exceeded(8191), "未触及高水位不应转入不可写");
        assert!(marks.is_exceeded(8192), "达到高水位即应转入不可写");

        assert!(!marks.is_relieved(4097), "仍高于低水位不应恢复可写");
        assert!(marks.is_relieved(4096), "回落到低水位即可恢复可写");
    }

    #[test]
    fn byte_distances_saturate_at_zero() {
        let marks = WriteBufferWaterMark::new(4096, 8192).expect("合法水位");

        assert_eq!(marks.bytes_before_unwritable(3000), 5192);
        assert_eq!(marks.bytes_before_unwritable(9000), 0, "超过高水位后距离饱和为 0");

        assert_eq!(marks.bytes_before_writable(9000), 4904);
        assert_eq!(marks.bytes_before_writable(4000), 0, "低于低水位后距离饱和为 0");
    }
}
