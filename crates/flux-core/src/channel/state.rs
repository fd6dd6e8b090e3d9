use core::sync::atomic::{AtomicU8, Ordering};

/// 通道生命周期的五个状态。
///
/// # 契约说明（What）
/// - `Unregistered`：尚未（或已不再）绑定执行器；
/// - `Registered`：已绑定执行器，但未建立端到端连接；
/// - `Active`：连接已建立（或监听已生效），可收发数据；
/// - `Inactive`：对端断开或读到 EOF，连接不再可用但资源未释放；
/// - `Closed`：终态，资源已释放，关闭通知已兑现。
///
/// # 跃迁图（How）
/// - `Unregistered → Registered`（注册）；
/// - `Registered → Active`（bind/connect 成功，或注册时传输已连接）；
/// - `Active ⇄ Inactive`（EOF 进入 Inactive；支持 disconnect 的传输重新 connect 可回到 Active）；
/// - `Active → Registered`（仅 disconnect 语义的传输断开而不关闭）；
/// - `Registered/Active/Inactive → Unregistered`（deregister，线程池迁移）；
/// - 除 `Closed` 外任意状态 → `Closed`（close）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelLifecycle {
    Unregistered = 0,
    Registered = 1,
    Active = 2,
    Inactive = 3,
    Closed = 4,
}

impl ChannelLifecycle {
    /// 是否尚未进入终态。
    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// 是否处于已绑定执行器的阶段。
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Registered | Self::Active | Self::Inactive)
    }

    /// 是否可收发数据。
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Unregistered,
            1 => Self::Registered,
            2 => Self::Active,
            3 => Self::Inactive,
            _ => Self::Closed,
        }
    }

    /// 判定一条跃迁是否在状态机允许的边集合内。
    pub const fn can_transition(from: Self, to: Self) -> bool {
        match (from, to) {
            (Self::Unregistered, Self::Registered) => true,
            (Self::Registered, Self::Active) => true,
            (Self::Inactive, Self::Active) => true,
            (Self::Active, Self::Inactive) => true,
            (Self::Active, Self::Registered) => true,
            (Self::Registered | Self::Active | Self::Inactive, Self::Unregistered) => true,
            (from, Self::Closed) => !matches!(from, Self::Closed),
            _ => false,
        }
    }
}

/// 生命周期的原子载体：跃迁在执行器上发起，读取可发生在任意线程。
///
/// # 设计背景（Why）
/// - `is_open`/`is_active` 一类谓词被任意线程高频查询，必须无锁且不可撕裂；
/// - 跃迁虽由执行器串行驱动，但关闭可能与强制关闭在极端场景下竞争，
///   以 compare-exchange 收敛保证状态只进不退。
///
/// # 契约说明（What）
/// - [`LifecycleCell::try_advance`] 仅接受状态机允许的边，返回跃迁前状态；
///   当前状态不允许该跃迁时返回 `Err(当前状态)`，载体保持不变；
/// - [`LifecycleCell::close`] 无条件推进到 `Closed`，返回先前状态；
///   重复关闭返回 `Closed`，调用方据此实现幂等。
#[derive(Debug)]
pub struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    /// 以 `Unregistered` 起始构造。
    pub const fn new() -> Self {
        Self(AtomicU8::new(ChannelLifecycle::Unregistered as u8))
    }

    /// 读取当前状态快照。
    pub fn load(&self) -> ChannelLifecycle {
        ChannelLifecycle::from_raw(self.0.load(Ordering::Acquire))
    }

    /// 尝试沿允许的边推进到 `to`，返回跃迁前状态。
    pub fn try_advance(
        &self,
        to: ChannelLifecycle,
    ) -> core::result::Result<ChannelLifecycle, ChannelLifecycle> {
        let mut current = self.load();
        loop {
            if !ChannelLifecycle::can_transition(current, to) {
                return Err(current);
            }
            match self.0.compare_exchange(
                current as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current),
                Err(raw) => current = ChannelLifecycle::from_raw(raw),
            }
        }
    }

    /// 无条件推进到 `Closed`，返回先前状态。
    pub fn close(&self) -> ChannelLifecycle {
        ChannelLifecycle::from_raw(self.0.swap(ChannelLifecycle::Closed as u8, Ordering::AcqRel))
    }
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_traverses_all_states() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.load(), ChannelLifecycle::Unregistered);

        cell.try_advance(ChannelLifecycle::Registered)
            .expect("注册必须被接受");
        cell.try_advance(ChannelLifecycle::Active)
            .expect("连接建立必须被接受");
        cell.try_advance(ChannelLifecycle::Inactive)
            .expect("EOF 必须被接受");
        assert_eq!(cell.close(), ChannelLifecycle::Inactive, "关闭返回先前状态");
        assert_eq!(cell.load(), ChannelLifecycle::Closed);
    }

    #[test]
    fn rejects_edges_outside_the_machine() {
        let cell = LifecycleCell::new();
        let current = cell
            .try_advance(ChannelLifecycle::Active)
            .expect_err("未注册不得直接激活");
        assert_eq!(current, ChannelLifecycle::Unregistered, "拒绝时报告当前状态");
        assert_eq!(cell.load(), ChannelLifecycle::Unregistered, "载体保持不变");
    }

    #[test]
    fn disconnect_edge_returns_to_registered() {
        let cell = LifecycleCell::new();
        cell.try_advance(ChannelLifecycle::Registered).unwrap();
        cell.try_advance(ChannelLifecycle::Active).unwrap();
        cell.try_advance(ChannelLifecycle::Registered)
            .expect("disconnect 应退回已注册态");
        assert_eq!(cell.load(), ChannelLifecycle::Registered);
    }

    #[test]
    fn close_is_terminal_and_idempotent() {
        let cell = LifecycleCell::new();
        cell.close();
        assert_eq!(cell.close(), ChannelLifecycle::Closed, "重复关闭观测到终态");
        assert!(
            cell.try_advance(ChannelLifecycle::Registered).is_err(),
            "终态之后不允许任何跃迁"
        );
    }

    #[test]
    fn predicates_match_states() {
        assert!(ChannelLifecycle::Registered.is_open());
        assert!(ChannelLifecycle::Registered.is_registered());
        assert!(!ChannelLifecycle::Registered.is_active());
        assert!(ChannelLifecycle::Active.is_active());
        assert!(!ChannelLifecycle::Closed.is_open());
        assert!(!ChannelLifecycle::Unregistered.is_registered());
    }
}
