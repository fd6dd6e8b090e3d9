//! # Contract-only Runtime Surface
//!
//! ## 契约声明
//! * **Contract-only：** 本模块仅定义执行上下文的抽象 API，约束通道核心只能依赖这些接口而非具体事件循环实现。
//! * **禁止实现：** 本模块不落地具体调度逻辑，实现由宿主事件循环或测试替身在独立位置提供。
//! * **解耦外设：** 接口以 `Send + Sync + 'static` 能力描述，对具体 reactor、线程池完全解耦。
//!
//! ## 并发与顺序语义
//! * 单个执行器对其全部通道的任务串行执行；同一提交方的任务保持提交顺序。
//! * 通道核心依赖 `in_executor()` 判定是否需要跨线程转投，禁止实现返回含糊答案。

mod executor;

pub use executor::{EventExecutor, Task};
