//! 关闭语义契约测试：幂等、积压处置、强制关闭与关闭后快速失败。
//!
//! # 教案级导览
//!
//! - **Why**：关闭是唯一的终态跃迁，牵连写出积压、挂起连接与关闭通知三方；
//!   事件重复或积压悬挂都会让上层资源管理失效。
//! - **How**：同步执行器 + 脚本驱动；以回调注册顺序记录“写出通知先于关闭通知”的兑现次序。
//! - **What**：覆盖重复 close 的幂等、关闭积压策略（在途尽力排空、未刷新以
//!   `channel.closed` 失败）、close_forcibly 的静默释放、关闭后各操作的快速失败。

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use flux_core::error::codes;
use flux_core::test_stubs::{
    ImmediateExecutor, PipelineEventRecord, RecordingPipeline, ScriptedDriver,
    ScriptedDriverHandle,
};
use flux_core::{
    Channel, ChannelBuilder, ChannelMetadata, ChannelPromise, Pipeline, TransportSocketAddr,
};

struct Fixture {
    channel: Channel,
    pipeline: Arc<RecordingPipeline>,
    driver: ScriptedDriverHandle,
}

fn active_channel(metadata: ChannelMetadata) -> Fixture {
    let pipeline = Arc::new(RecordingPipeline::new());
    let driver = ScriptedDriver::connected();
    let handle = driver.handle();
    let channel = ChannelBuilder::new(metadata, driver, pipeline.clone() as Arc<dyn Pipeline>)
        .build()
        .expect("必须可装配");
    channel
        .unsafe_ops()
        .register(Arc::new(ImmediateExecutor), ChannelPromise::new());
    assert!(channel.is_active());
    pipeline.clear();
    Fixture {
        channel,
        pipeline,
        driver: handle,
    }
}

fn stream_metadata() -> ChannelMetadata {
    ChannelMetadata::new(false, 1).expect("合法元数据")
}

#[test]
fn close_twice_yields_one_closed_event_and_two_successes() {
    let fx = active_channel(stream_metadata());

    let first = fx.channel.close();
    let second = fx.channel.close();

    assert!(first.outcome().expect("首次关闭必须完成").is_success());
    assert!(
        second.outcome().expect("重复关闭必须立即完成").is_success(),
        "幂等：重复关闭同样观察到成功"
    );
    assert_eq!(fx.pipeline.count(&PipelineEventRecord::Closed), 1);
    assert_eq!(fx.pipeline.count(&PipelineEventRecord::Deactivated), 1);
    assert_eq!(fx.driver.shutdown_calls(), 1, "传输资源恰好释放一次");
    assert!(fx.channel.close_future().is_done());
}

#[test]
fn close_with_backlog_drains_inflight_and_fails_unflushed() {
    let fx = active_channel(stream_metadata());

    // 在途条目：刷新后传输饱和，余量留在队首。
    let inflight = fx.channel.write(Bytes::from_static(b"sent"));
    fx.driver.script_accept_sizes(vec![0]);
    fx.channel.flush();
    assert!(!inflight.is_done(), "饱和的在途条目保持挂起");

    // 未刷新条目：只入队，从未 flush。
    let queued = fx.channel.write(Bytes::from_static(b"wait"));

    // 关闭时传输恢复：在途条目经最后一次尽力排空完成。
    let close = fx.channel.close();

    assert!(
        inflight.outcome().expect("在途条目必须完成").is_success(),
        "关闭前的最后一次排空应写完在途条目"
    );
    let cause = queued
        .outcome()
        .expect("未刷新条目必须完成")
        .failure()
        .expect("必须失败")
        .clone();
    assert_eq!(cause.code(), codes::CHANNEL_CLOSED, "未刷新条目以关闭失败");
    assert!(close.outcome().expect("关闭必须完成").is_success());
    assert_eq!(fx.driver.written(), b"sent");
}

#[test]
fn write_notifications_complete_before_the_close_notification() {
    let fx = active_channel(stream_metadata());
    let order = Arc::new(Mutex::new(Vec::new()));

    let write = fx.channel.write(Bytes::from_static(b"pending"));
    {
        let order = Arc::clone(&order);
        write.on_complete(move |_| order.lock().unwrap().push("write"));
    }
    {
        let order = Arc::clone(&order);
        fx.channel
            .close_future()
            .on_complete(move |_| order.lock().unwrap().push("closed"));
    }

    fx.channel.close();

    assert_eq!(
        order.lock().unwrap().as_slice(),
        &["write", "closed"],
        "全部写出通知先于关闭通知兑现"
    );
}

#[test]
fn close_forcibly_releases_without_any_pipeline_event() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let driver = ScriptedDriver::new();
    let handle = driver.handle();
    let channel = ChannelBuilder::new(
        stream_metadata(),
        driver,
        pipeline.clone() as Arc<dyn Pipeline>,
    )
    .build()
    .expect("必须可装配");

    // 注册之前入队的写出（装配阶段单线程，就地执行）。
    let write = channel.write(Bytes::from_static(b"doomed"));

    channel.unsafe_ops().close_forcibly();

    assert!(pipeline.events().is_empty(), "强制关闭不得产生任何管道事件");
    assert_eq!(
        write
            .outcome()
            .expect("积压写出必须完成")
            .failure()
            .expect("必须失败")
            .code(),
        codes::CHANNEL_CLOSED
    );
    assert!(channel.close_future().is_done(), "关闭通知仍然兑现");
    assert!(!channel.is_open());
    assert_eq!(handle.shutdown_calls(), 1);
}

#[test]
fn operations_after_close_fail_fast_with_channel_closed() {
    let fx = active_channel(ChannelMetadata::new(true, 1).expect("合法元数据"));
    fx.channel.close();
    fx.pipeline.clear();
    let ops = fx.channel.unsafe_ops();

    let write = fx.channel.write(Bytes::from_static(b"late"));
    assert_eq!(
        write
            .outcome()
            .expect("关闭后的写出必须立即完成")
            .failure()
            .expect("必须失败")
            .code(),
        codes::CHANNEL_CLOSED
    );

    let connect = ChannelPromise::new();
    ops.connect(
        TransportSocketAddr::v4([10, 0, 0, 1], 80),
        None,
        connect.clone(),
    );
    assert_eq!(
        connect
            .outcome()
            .expect("必须立即完成")
            .failure()
            .expect("必须失败")
            .code(),
        codes::CHANNEL_CLOSED
    );

    let disconnect = ChannelPromise::new();
    ops.disconnect(disconnect.clone());
    assert_eq!(
        disconnect
            .outcome()
            .expect("必须立即完成")
            .failure()
            .expect("必须失败")
            .code(),
        codes::CHANNEL_CLOSED
    );

    // 提示类与幂等操作不产生新事件。
    fx.channel.read();
    fx.channel.flush();
    assert!(fx.pipeline.events().is_empty(), "关闭后不得再有管道事件");

    // 只读访问保持可用。
    assert!(!fx.channel.is_open());
    assert_eq!(fx.channel.remote_addr(), None, "地址查询在关闭后仍可调用");
}

#[test]
fn eof_then_close_emits_each_lifecycle_event_once() {
    let fx = active_channel(stream_metadata());

    fx.channel.unsafe_ops().inbound_eof();
    assert_eq!(fx.pipeline.count(&PipelineEventRecord::Deactivated), 1);

    fx.channel.close();
    assert_eq!(
        fx.pipeline.count(&PipelineEventRecord::Deactivated),
        1,
        "EOF 已触发过 deactivated，关闭不得重复"
    );
    assert_eq!(fx.pipeline.count(&PipelineEventRecord::Closed), 1);
}

#[test]
fn flush_while_open_but_not_connected_fails_entries_with_not_connected() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let driver = ScriptedDriver::new();
    let channel = ChannelBuilder::new(
        stream_metadata(),
        driver,
        pipeline.clone() as Arc<dyn Pipeline>,
    )
    .build()
    .expect("必须可装配");
    channel
        .unsafe_ops()
        .register(Arc::new(ImmediateExecutor), ChannelPromise::new());
    assert!(channel.is_registered() && !channel.is_active());

    let write = channel.write(Bytes::from_static(b"early"));
    channel.flush();

    assert_eq!(
        write
            .outcome()
            .expect("未连接的刷新必须兑现失败")
            .failure()
            .expect("必须失败")
            .code(),
        codes::CHANNEL_NOT_CONNECTED
    );
    assert!(channel.is_open(), "未连接的刷新失败不关闭通道");
    assert_eq!(
        channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        0,
        "失败条目退出记账"
    );
}
