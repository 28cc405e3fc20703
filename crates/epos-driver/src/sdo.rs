//! 配置通道：SDO 客户端与 NMT 主站
//!
//! 两个 trait 是配置通道的接缝：生产代码由 [`SdoClient`] 在 CAN 上实现，
//! 测试可以直接替换成记录调用的替身。

use crate::error::DriverError;
use epos_can::{CanAdapter, CanError, ReceiveTimeout};
use epos_protocol::{
    NmtCommand, NmtTarget, NodeId, ObjectEntry, ObjectValue, SdoDownloadRequest, SdoResponse,
    nmt_frame, sdo_response_id,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 默认 SDO 应答超时
pub const DEFAULT_SDO_TIMEOUT: Duration = Duration::from_millis(500);

/// 对象字典写入
pub trait ObjectDictionary {
    /// 写一个对象，驱动器确认后返回
    fn write(
        &mut self,
        node: NodeId,
        entry: ObjectEntry,
        value: ObjectValue,
    ) -> Result<(), DriverError>;
}

/// NMT 状态切换
pub trait NetworkManagement {
    /// 发送 NMT 命令（无应答）
    fn change_state(&mut self, target: NmtTarget, command: NmtCommand) -> Result<(), DriverError>;
}

/// 基于 CAN 适配器的 SDO 客户端（加速下载）
///
/// 同时承担 NMT 主站：二者共用配置通道。
#[derive(Debug)]
pub struct SdoClient<A: CanAdapter> {
    adapter: A,
    timeout: Duration,
}

impl<A: CanAdapter> SdoClient<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_timeout(adapter, DEFAULT_SDO_TIMEOUT)
    }

    pub fn with_timeout(adapter: A, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn into_inner(self) -> A {
        self.adapter
    }

    /// 等待指定对象的应答，其它帧一律跳过
    fn await_response(&mut self, node: NodeId, entry: ObjectEntry) -> Result<(), DriverError> {
        let deadline = Instant::now() + self.timeout;
        let response_id = sdo_response_id(node);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::SdoTimeout { entry });
            }

            let frame = match self.adapter.receive_timeout(ReceiveTimeout::After(remaining)) {
                Ok(frame) => frame,
                Err(CanError::Timeout) => return Err(DriverError::SdoTimeout { entry }),
                Err(e) => return Err(e.into()),
            };

            if frame.id != response_id {
                trace!("Ignoring frame 0x{:X} while waiting for SDO response", frame.id);
                continue;
            }

            let response = SdoResponse::from_frame(&frame, node)?;
            if response.entry() != entry {
                trace!(
                    "Ignoring stale SDO response for {} while waiting for {}",
                    response.entry(),
                    entry
                );
                continue;
            }

            return match response {
                SdoResponse::DownloadAck { .. } => Ok(()),
                SdoResponse::Abort { code, .. } => {
                    warn!("Node {} aborted SDO write to {}: 0x{:08X}", node, entry, code);
                    Err(DriverError::SdoAbort {
                        index: entry.index,
                        subindex: entry.subindex,
                        code,
                    })
                },
            };
        }
    }
}

impl<A: CanAdapter> ObjectDictionary for SdoClient<A> {
    fn write(
        &mut self,
        node: NodeId,
        entry: ObjectEntry,
        value: ObjectValue,
    ) -> Result<(), DriverError> {
        debug!("SDO write node {} {} = {:?}", node, entry, value);
        let request = SdoDownloadRequest::new(node, entry, value);
        self.adapter.send(request.to_frame())?;
        self.await_response(node, entry)
    }
}

impl<A: CanAdapter> NetworkManagement for SdoClient<A> {
    fn change_state(&mut self, target: NmtTarget, command: NmtCommand) -> Result<(), DriverError> {
        debug!("NMT {:?} -> {:?}", command, target);
        self.adapter.send(nmt_frame(target, command))?;
        Ok(())
    }
}
