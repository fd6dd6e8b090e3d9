use crate::{CoreError, Result, sealed::Sealed};

use super::TransportSocketAddr;

/// 具体传输种类的驱动契约：绑定、连接与就绪式读写的系统调用面。
///
/// # 设计背景（Why）
/// - 通道核心不关心 TCP、UDP 或进程内管道的差异，只要求一套窄接口完成
///   地址绑定、连接建立与非阻塞写出；具体 syscalls 留给各传输 crate；
/// - 以“封闭的传输种类集合实现统一驱动契约”的方式表达多态，
///   避免以继承深度编码传输差异。
///
/// # 逻辑解析（How）
/// - 所有方法在通道的执行器线程上被调用（受限操作面转投后触达），
///   实现无需自带互斥；
/// - `write` 采用就绪式语义：返回实际接受的字节数，`0` 表示底层暂时饱和，
///   调用方保留剩余数据待下一轮刷新；
/// - 读路径是事件驱动的：`begin_read` 仅声明兴趣，数据到达、读轮结束、EOF
///   与异步故障由驱动回调受限操作面的入站入口上报。
///
/// # 契约说明（What）
/// - **前置条件**：除 `is_connected`/地址查询外，方法仅在通道执行器上调用；
/// - **后置条件**：`Ok` 表示操作符合协议语义；`Err` 必须携带稳定错误码
///   （通常为 `transport.io`）以便核心统一失败整队写出；
/// - `connect` 返回 `Ok(true)` 表示连接即刻建立，`Ok(false)` 表示进行中，
///   稍后由驱动通过 finish-connect 入口回报结果；
/// - `shutdown` 为终局资源释放，之后驱动不得再触发任何回调。
///
/// # 风险提示（Trade-offs）
/// - 契约不提供批量/向量化写入；需要聚合的实现可在驱动内部自行合并，
///   核心的队列语义不受影响；
/// - `write` 返回 `Ok(0)` 与返回 `Err` 的区别是“稍后重试”与“传输已坏”，
///   实现混用两者会导致积压被误判。
pub trait TransportDriver: Send + 'static + Sealed {
    /// 是否已处于连接建立状态（如监听通道接受产生的子通道）。
    fn is_connected(&self) -> bool;

    /// 查询本端地址。
    fn local_addr(&self) -> Option<TransportSocketAddr>;

    /// 查询对端地址。
    fn remote_addr(&self) -> Option<TransportSocketAddr>;

    /// 绑定本地地址。
    fn bind(&mut self, local: &TransportSocketAddr) -> Result<(), CoreError>;

    /// 发起连接；`Ok(true)` 表示即刻建立，`Ok(false)` 表示进行中。
    fn connect(
        &mut self,
        remote: &TransportSocketAddr,
        local: Option<&TransportSocketAddr>,
    ) -> Result<bool, CoreError>;

    /// 断开连接但保留底层资源，仅支持 disconnect 语义的传输实现。
    fn disconnect(&mut self) -> Result<(), CoreError>;

    /// 终局关闭并释放底层资源。
    fn shutdown(&mut self) -> Result<(), CoreError>;

    /// 声明下一轮入站读取兴趣。
    fn begin_read(&mut self) -> Result<(), CoreError>;

    /// 写出一段字节，返回实际接受的数量；`0` 表示底层暂时饱和。
    fn write(&mut self, buf: &[u8]) -> Result<usize, CoreError>;
}
