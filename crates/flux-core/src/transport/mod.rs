//! 传输层协作方契约：统一地址表示与具体传输种类的驱动接口。
//!
//! 真正的 socket 系统调用、事件循环轮询都发生在实现 [`TransportDriver`] 的
//! 具体传输 crate 中；通道核心只通过这里定义的窄接口与之交互。

mod address;
mod driver;

pub use address::{AddressFamily, TransportSocketAddr};
pub use driver::TransportDriver;
