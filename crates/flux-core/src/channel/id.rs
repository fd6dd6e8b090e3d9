use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// 进程内唯一、可排序的通道标识。
///
/// # 设计背景（Why）
/// - 日志、指标与父子层级都需要一个稳定的键来指代通道；
/// - 标识在构造时一次性分配、终生不变，因而可以安全地跨线程按值复制。
///
/// # 逻辑解析（How）
/// - 由全局单调递增的原子序列分配，进程生命周期内不重复；
/// - 派生全序（`Ord`），使通道集合可以按创建先后稳定排序。
///
/// # 契约说明（What）
/// - **后置条件**：同一进程内两次 [`ChannelId::next`] 的返回值必不相等；
/// - 序列号不编码任何传输语义，仅用于同一性与排序。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

impl ChannelId {
    /// 分配下一个进程内唯一标识。
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 返回底层序列号，供日志与诊断输出使用。
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{:08x}", self.0)
    }
}
