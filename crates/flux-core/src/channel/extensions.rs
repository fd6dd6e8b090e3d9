use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::any::{Any, TypeId};

use spin::RwLock;

/// 按类型索引的用户附件容器，随通道生命周期存续。
///
/// # 设计背景（Why）
/// - 上层协议经常需要在通道上挂接会话态（鉴权结果、限速桶、协商参数），
///   而核心不可能预先为它们建模；以 `TypeId` 为键的 any-map 是稳定的扩展点；
/// - 附件以 `Arc` 持有：读取方拿到共享引用即可跨越锁边界使用，
///   容器锁只覆盖查找本身。
///
/// # 契约说明（What）
/// - 每个类型至多一个附件，重复插入返回被替换的旧值；
/// - 读写可发生在任意线程；附件自身的内部可变性由附件自行负责；
/// - 通道关闭不会主动清空附件，引用计数归零后随通道一起回收。
#[derive(Default)]
pub struct Extensions {
    entries: RwLock<BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Extensions {
    /// 构造空容器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入附件，返回同类型的旧值。
    pub fn insert<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.entries
            .write()
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// 按类型读取附件。
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    /// 移除并返回附件。
    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .write()
            .remove(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    /// 查询是否存在指定类型的附件。
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<T>())
    }

    /// 清空全部附件。
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl core::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.entries.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct SessionTag(&'static str);

    #[test]
    fn insert_get_remove_round_trip() {
        let extensions = Extensions::new();
        assert!(extensions.insert(Arc::new(SessionTag("alpha"))).is_none());
        assert!(extensions.contains::<SessionTag>());

        let read = extensions.get::<SessionTag>().expect("附件必须可读取");
        assert_eq!(*read, SessionTag("alpha"));

        let replaced = extensions
            .insert(Arc::new(SessionTag("beta")))
            .expect("重复插入应返回旧值");
        assert_eq!(*replaced, SessionTag("alpha"));

        let removed = extensions.remove::<SessionTag>().expect("移除应返回附件");
        assert_eq!(*removed, SessionTag("beta"));
        assert!(!extensions.contains::<SessionTag>());
    }

    #[test]
    fn types_do_not_collide() {
        let extensions = Extensions::new();
        extensions.insert(Arc::new(SessionTag("tag")));
        extensions.insert(Arc::new(42usize));

        assert_eq!(*extensions.get::<usize>().expect("整型附件"), 42);
        assert_eq!(
            *extensions.get::<SessionTag>().expect("标签附件"),
            SessionTag("tag")
        );
    }
}
