//! 写出背压契约测试：字节记账、水位闸门、FIFO 兑现与整队失败。
//!
//! # 教案级导览
//!
//! - **Why**：背压是通道核心最容易出错的部分——计数撕裂、跃迁重复上报、
//!   短写丢字节都会让上游限流失真；本套件以端到端方式锁定这些行为。
//! - **How**：通道全部使用 [`ImmediateExecutor`]（同步语义），
//!   [`ScriptedDriver`] 编剧传输的接受量与失败，[`RecordingPipeline`] 断言事件次数。
//! - **What**：覆盖水位场景（4096/8192，三笔 3000 字节）、FIFO 法则、
//!   短写续传、取消丢弃、传输报错整队失败并强制关闭。

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use flux_core::error::codes;
use flux_core::test_stubs::{
    ImmediateExecutor, PipelineEventRecord, RecordingPipeline, ScriptedDriver,
    ScriptedDriverHandle,
};
use flux_core::{
    Channel, ChannelBuilder, ChannelMetadata, ChannelOptions, ChannelPromise, Pipeline,
};

struct Fixture {
    channel: Channel,
    pipeline: Arc<RecordingPipeline>,
    driver: ScriptedDriverHandle,
}

/// 组装一条已注册、已激活、水位 4096/8192 的流式通道。
fn active_channel() -> Fixture {
    let pipeline = Arc::new(RecordingPipeline::new());
    let driver = ScriptedDriver::connected();
    let handle = driver.handle();
    let metadata = ChannelMetadata::new(false, 1).expect("合法元数据");
    let channel = ChannelBuilder::new(metadata, driver, pipeline.clone() as Arc<dyn Pipeline>)
        .options(ChannelOptions {
            low_water_mark: 4096,
            high_water_mark: 8192,
            auto_read: false,
            max_messages_per_read: 1,
        })
        .build()
        .expect("必须可装配");
    channel
        .unsafe_ops()
        .register(Arc::new(ImmediateExecutor), ChannelPromise::new());
    assert!(channel.is_active(), "前置条件：通道已激活");
    pipeline.clear();
    Fixture {
        channel,
        pipeline,
        driver: handle,
    }
}

#[test]
fn pending_bytes_equal_the_sum_of_enqueued_writes() {
    let fx = active_channel();
    let sizes = [100usize, 3000, 17, 1, 900];
    for size in sizes {
        fx.channel.write(Bytes::from(vec![0u8; size]));
    }
    let total: usize = sizes.iter().sum();
    assert_eq!(
        fx.channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        total,
        "刷新之前计数必须等于写入总字节"
    );
}

#[test]
fn watermark_scenario_three_writes_then_full_drain() {
    let fx = active_channel();

    fx.channel.write(Bytes::from(vec![0u8; 3000]));
    assert!(fx.channel.is_writable(), "3000 字节未触及高水位");

    fx.channel.write(Bytes::from(vec![0u8; 3000]));
    assert!(fx.channel.is_writable(), "6000 字节仍低于高水位 8192");
    assert_eq!(fx.channel.bytes_before_unwritable(), 8192 - 6000);

    fx.channel.write(Bytes::from(vec![0u8; 3000]));
    assert!(!fx.channel.is_writable(), "9000 字节穿越高水位转入不可写");
    assert_eq!(fx.channel.bytes_before_unwritable(), 0);
    assert_eq!(fx.channel.bytes_before_writable(), 9000 - 4096);
    assert_eq!(
        fx.pipeline.count(&PipelineEventRecord::WritabilityChanged(false)),
        1,
        "转入不可写恰好上报一次"
    );

    fx.channel.flush();
    assert!(fx.channel.is_writable(), "全量排空后恢复可写");
    assert_eq!(fx.channel.bytes_before_writable(), 0);
    assert_eq!(fx.channel.bytes_before_unwritable(), 8192);
    assert_eq!(
        fx.pipeline.count(&PipelineEventRecord::WritabilityChanged(true)),
        1,
        "恢复可写恰好上报一次"
    );
}

#[test]
fn fluctuation_between_the_marks_stays_unwritable() {
    let fx = active_channel();
    // 一笔 9000 字节转入不可写。
    fx.channel.write(Bytes::from(vec![0u8; 9000]));
    assert!(!fx.channel.is_writable());

    // 传输只接受 3000 字节：余量 6000 落在两水位之间，滞回要求保持不可写。
    fx.driver.script_accept_sizes(vec![3000, 0]);
    fx.channel.flush();
    assert_eq!(
        fx.channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        6000
    );
    assert!(
        !fx.channel.is_writable(),
        "区间内波动不得恢复可写（滞回语义）"
    );

    // 继续排空到 2000（低于低水位 4096）才恢复。
    fx.driver.script_accept_sizes(vec![4000, 0]);
    fx.channel.flush();
    assert!(fx.channel.is_writable(), "回落到低水位以下必须恢复可写");
    assert_eq!(
        fx.pipeline.count(&PipelineEventRecord::WritabilityChanged(true)),
        1
    );
}

#[test]
fn writes_complete_in_fifo_order() {
    let fx = active_channel();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["a", "b", "c"] {
        let future = fx.channel.write(Bytes::from(tag.as_bytes().to_vec()));
        let order = Arc::clone(&order);
        future.on_complete(move |outcome| {
            assert!(outcome.is_success());
            order.lock().unwrap().push(tag);
        });
    }
    fx.channel.flush();

    assert_eq!(
        order.lock().unwrap().as_slice(),
        &["a", "b", "c"],
        "先写者的通知不得晚于后写者兑现"
    );
    assert_eq!(fx.driver.written(), b"abc", "字节流同样保持写入顺序");
}

#[test]
fn short_write_keeps_remainder_and_later_flush_completes() {
    let fx = active_channel();
    let future = fx.channel.write(Bytes::from_static(b"abcdef"));

    fx.driver.script_accept_sizes(vec![4, 0]);
    fx.channel.flush();
    assert!(!future.is_done(), "短写不得提前兑现");
    assert_eq!(
        fx.channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        2,
        "余量留在计数内"
    );

    fx.channel.flush();
    assert!(future.outcome().expect("续传后必须完成").is_success());
    assert_eq!(fx.driver.written(), b"abcdef", "两轮排空拼出完整载荷");
}

#[test]
fn cancelled_write_is_dropped_before_reaching_the_transport() {
    let fx = active_channel();
    let kept = fx.channel.write(Bytes::from_static(b"keep"));
    let dropped = fx.channel.write(Bytes::from_static(b"drop"));

    assert!(dropped.cancel(), "未刷新的写出必须可取消");
    fx.channel.flush();

    assert!(kept.outcome().expect("保留的写出必须完成").is_success());
    assert!(
        dropped.outcome().expect("取消必须立即可见").is_cancelled(),
        "被取消的写出以取消结局收场"
    );
    assert_eq!(fx.driver.written(), b"keep", "被取消的载荷绝不触网");
    assert_eq!(
        fx.channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        0,
        "取消条目的字节退出记账"
    );
}

#[test]
fn transport_error_fails_the_whole_queue_and_closes_the_channel() {
    let fx = active_channel();
    let first = fx.channel.write(Bytes::from_static(b"xxxx"));
    let second = fx.channel.write(Bytes::from_static(b"yyyy"));

    fx.driver.fail_next_write("connection reset by peer");
    fx.channel.flush();

    let first_cause = first
        .outcome()
        .expect("首条必须完成")
        .failure()
        .expect("必须失败")
        .clone();
    let second_cause = second
        .outcome()
        .expect("后续条目必须一并完成")
        .failure()
        .expect("必须失败")
        .clone();
    assert!(
        Arc::ptr_eq(&first_cause, &second_cause),
        "整队失败必须共享同一根因"
    );
    assert_eq!(first_cause.code(), codes::TRANSPORT_IO);

    assert!(!fx.channel.is_open(), "传输报错必须强制关闭通道");
    assert!(fx.channel.close_future().is_done());
    assert_eq!(
        fx.pipeline.count(&PipelineEventRecord::Exception(codes::TRANSPORT_IO)),
        1,
        "异常事件恰好一次"
    );
    assert_eq!(fx.pipeline.count(&PipelineEventRecord::Closed), 1);
}

#[test]
fn writability_snapshot_is_consistent_from_other_threads() {
    let fx = active_channel();
    fx.channel.write(Bytes::from(vec![0u8; 9000]));
    assert!(!fx.channel.is_writable());

    let channel = fx.channel.clone();
    let observed = std::thread::spawn(move || {
        (
            channel.is_writable(),
            channel.bytes_before_writable(),
            channel.unsafe_ops().outbound_snapshot().pending_bytes(),
        )
    })
    .join()
    .expect("只读访问不得 panic");

    assert_eq!(observed, (false, 9000 - 4096, 9000), "任意线程读到一致快照");
}
