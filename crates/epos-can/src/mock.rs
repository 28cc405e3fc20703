//! 内存中的模拟 CAN 通道（测试用）
//!
//! `MockCanAdapter` 可以 `clone()`：所有副本共享同一个发送记录和接收队列，
//! 测试代码把一个副本交给被测对象，用另一个副本注入帧、检查发出的帧。
//!
//! 可以挂一个 responder：每发送一帧就调用一次，返回的帧进入接收队列，
//! 用来模拟驱动器对 SDO 请求的应答。

use crate::{CanAdapter, CanError, EposFrame, IdFilter, ReceiveTimeout};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

type Responder = Box<dyn FnMut(&EposFrame) -> Vec<EposFrame> + Send>;

#[derive(Default)]
struct MockBus {
    sent: Vec<EposFrame>,
    rx_queue: VecDeque<EposFrame>,
    responder: Option<Responder>,
    /// 剩余多少次 send 之后开始失败（`None` 表示永不失败）
    fail_after: Option<usize>,
}

/// 模拟 CAN 适配器
#[derive(Clone, Default)]
pub struct MockCanAdapter {
    bus: Arc<Mutex<MockBus>>,
    filters: Vec<IdFilter>,
}

impl std::fmt::Debug for MockCanAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bus = self.bus.lock();
        f.debug_struct("MockCanAdapter")
            .field("sent", &bus.sent.len())
            .field("queued", &bus.rx_queue.len())
            .field("filters", &self.filters)
            .finish()
    }
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带接收过滤器：不匹配的入队帧在接收时被丢弃
    pub fn with_filters(filters: &[IdFilter]) -> Self {
        Self {
            bus: Arc::default(),
            filters: filters.to_vec(),
        }
    }

    /// 设置应答器
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&EposFrame) -> Vec<EposFrame> + Send + 'static,
    {
        self.bus.lock().responder = Some(Box::new(responder));
    }

    /// 注入一帧到接收队列
    pub fn push_rx(&self, frame: EposFrame) {
        self.bus.lock().rx_queue.push_back(frame);
    }

    /// 已发送帧的快照
    pub fn sent_frames(&self) -> Vec<EposFrame> {
        self.bus.lock().sent.clone()
    }

    /// 取出并清空发送记录
    pub fn take_sent(&self) -> Vec<EposFrame> {
        std::mem::take(&mut self.bus.lock().sent)
    }

    /// 接收队列中剩余的帧数
    pub fn pending_rx(&self) -> usize {
        self.bus.lock().rx_queue.len()
    }

    /// 成功发送 `n` 帧之后，后续 send 全部返回 `CanError::Io`
    pub fn fail_sends_after(&self, n: usize) {
        self.bus.lock().fail_after = Some(n);
    }

    /// 取消发送失败注入
    pub fn clear_send_failure(&self) {
        self.bus.lock().fail_after = None;
    }

    fn accepts(&self, id: u32) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(id))
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: EposFrame) -> Result<(), CanError> {
        let mut bus = self.bus.lock();

        match &mut bus.fail_after {
            Some(0) => {
                return Err(CanError::Io(std::io::Error::other(format!(
                    "mock send failure for ID 0x{:X}",
                    frame.id
                ))));
            },
            Some(n) => *n -= 1,
            None => {},
        }

        trace!("Mock sent frame: ID=0x{:X}, len={}", frame.id, frame.len);
        bus.sent.push(frame);

        // 调用 responder 时不持有锁，responder 内部可以访问同一条总线
        let Some(mut responder) = bus.responder.take() else {
            return Ok(());
        };
        drop(bus);
        let replies = responder(&frame);

        let mut bus = self.bus.lock();
        if bus.responder.is_none() {
            bus.responder = Some(responder);
        }
        bus.rx_queue.extend(replies);
        Ok(())
    }

    /// 队列为空时立即返回 `CanError::Timeout`，不会真正阻塞
    fn receive_timeout(&mut self, _timeout: ReceiveTimeout) -> Result<EposFrame, CanError> {
        loop {
            let frame = self.bus.lock().rx_queue.pop_front().ok_or(CanError::Timeout)?;
            if self.accepts(frame.id) {
                return Ok(frame);
            }
            trace!("Mock dropped filtered frame: ID=0x{:X}", frame.id);
        }
    }
}
