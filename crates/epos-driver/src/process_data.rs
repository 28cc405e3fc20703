//! 过程数据通道（PDO）
//!
//! 发送：RxPDO1（控制字 + 电流设定值）。
//! 接收：按 CAN ID 分派到 TxPDO1~4，一次调用最多解析一帧。

use crate::error::DriverError;
use crate::state::FeedbackSample;
use epos_can::{CanAdapter, CanError, ReceiveTimeout};
use epos_protocol::{
    ControlwordCommand, CurrentCommandFrame, DeviceCondition, NodeId, TxPdo, UnitConverter,
};
use tracing::{error, trace, warn};

/// 单个节点的 PDO 通道
#[derive(Debug)]
pub struct PdoChannel<A: CanAdapter> {
    adapter: A,
    node: NodeId,
}

impl<A: CanAdapter> PdoChannel<A> {
    pub(crate) fn new(adapter: A, node: NodeId) -> Self {
        Self { adapter, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// 发送 RxPDO1：`[控制字, 设定值]`
    ///
    /// 发送失败原样返回 CAN 层错误。
    pub fn transmit(&mut self, command: ControlwordCommand, value: i16) -> Result<(), DriverError> {
        let frame = CurrentCommandFrame::new(command, value).to_frame(self.node);
        trace!(
            "PDO transmit node {}: cw=0x{:04X} value={}",
            self.node,
            command.word(),
            value
        );
        self.adapter.send(frame)?;
        Ok(())
    }

    /// 丢弃接收队列中已有的帧，返回丢弃的帧数
    ///
    /// 非致命错误结束清空并被忽略，致命错误原样返回。
    pub fn discard_pending(&mut self) -> Result<usize, DriverError> {
        let mut discarded = 0;
        loop {
            match self.adapter.try_receive() {
                Ok(Some(frame)) => {
                    trace!(
                        "Node {} discarded stale PDO 0x{:X}, len={}",
                        self.node, frame.id, frame.len
                    );
                    discarded += 1;
                },
                Ok(None) => return Ok(discarded),
                Err(e) => {
                    let e = DriverError::from(e);
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!("Node {} stopped discarding stale PDOs: {}", self.node, e);
                    return Ok(discarded);
                },
            }
        }
    }

    /// 接收并解析一帧
    ///
    /// 不属于本节点的帧返回 `TxPdo::Unknown`（记录日志，不是错误）。
    /// 这里不检查状态字，见 [`PdoChannel::check_condition`]。
    pub fn receive(&mut self, timeout: ReceiveTimeout) -> Result<TxPdo, DriverError> {
        let frame = match self.adapter.receive_timeout(timeout) {
            Ok(frame) => frame,
            Err(CanError::Timeout) => return Err(DriverError::Timeout),
            Err(e) => return Err(e.into()),
        };

        let pdo = TxPdo::decode(&frame, self.node)?;
        if let TxPdo::Unknown { cob_id } = pdo {
            warn!("Node {} received unknown PDO 0x{:X}", self.node, cob_id);
        }
        Ok(pdo)
    }

    /// 检查帧中状态字的故障/警告位，故障优先
    ///
    /// 所有携带状态字的槽位（包括 TX3 位置帧）都会检查。
    pub fn check_condition(&self, pdo: &TxPdo) -> Result<(), DriverError> {
        let (Some(statusword), Some(slot)) = (pdo.statusword(), pdo.slot()) else {
            return Ok(());
        };

        match statusword.condition() {
            DeviceCondition::Normal => Ok(()),
            DeviceCondition::Fault => {
                error!(
                    "EPOS node {} reported a fault on {}, status=0x{:04X}",
                    self.node,
                    slot,
                    statusword.raw()
                );
                Err(DriverError::DeviceFault {
                    node_id: self.node,
                    statusword: statusword.raw(),
                })
            },
            DeviceCondition::Warning => {
                warn!(
                    "EPOS node {} reported a warning on {}, status=0x{:04X}",
                    self.node,
                    slot,
                    statusword.raw()
                );
                Err(DriverError::DeviceWarning {
                    node_id: self.node,
                    statusword: statusword.raw(),
                })
            },
        }
    }

    /// 接收一帧、更新反馈样本、检查状态字
    ///
    /// 即使返回故障/警告，本帧携带的字段也已写入 `sample`。
    pub fn read_into(
        &mut self,
        sample: &mut FeedbackSample,
        converter: &UnitConverter,
        timeout: ReceiveTimeout,
    ) -> Result<TxPdo, DriverError> {
        let pdo = self.receive(timeout)?;
        sample.apply(&pdo, converter);
        self.check_condition(&pdo)?;
        Ok(pdo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epos_can::mock::MockCanAdapter;
    use epos_protocol::EposFrame;

    fn channel() -> (MockCanAdapter, PdoChannel<MockCanAdapter>) {
        let bus = MockCanAdapter::new();
        let channel = PdoChannel::new(bus.clone(), NodeId::new(1).unwrap());
        (bus, channel)
    }

    #[test]
    fn test_transmit_layout() {
        let (bus, mut channel) = channel();
        channel
            .transmit(ControlwordCommand::SwitchOnAndEnableOperation, -250)
            .unwrap();

        let sent = bus.sent_frames();
        assert_eq!(sent[0].id, 0x201);
        assert_eq!(sent[0].data_slice(), &[0x0F, 0x00, 0x06, 0xFF]);
    }

    #[test]
    fn test_receive_timeout() {
        let (_bus, mut channel) = channel();
        assert!(matches!(
            channel.receive(ReceiveTimeout::Poll),
            Err(DriverError::Timeout)
        ));
    }

    #[test]
    fn test_receive_short_frame_is_protocol_error() {
        let (bus, mut channel) = channel();
        bus.push_rx(EposFrame::new_standard(0x381, &[0x00, 0x00, 0x01]));
        assert!(matches!(
            channel.receive(ReceiveTimeout::Poll),
            Err(DriverError::Protocol(_))
        ));
    }

    #[test]
    fn test_warning_on_status_slot() {
        let (bus, mut channel) = channel();
        bus.push_rx(EposFrame::new_standard(0x281, &[0x80, 0x00, 0xFD, 0xFD]));

        let pdo = channel.receive(ReceiveTimeout::Poll).unwrap();
        assert!(matches!(pdo, TxPdo::Status { .. }));
        assert!(matches!(
            channel.check_condition(&pdo),
            Err(DriverError::DeviceWarning {
                statusword: 0x0080,
                ..
            })
        ));
    }

    #[test]
    fn test_position_slot_checks_statusword() {
        let (bus, mut channel) = channel();
        bus.push_rx(EposFrame::new_standard(
            0x381,
            &[0x08, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00],
        ));

        let mut sample = FeedbackSample::default();
        let err = channel
            .read_into(&mut sample, &UnitConverter::default(), ReceiveTimeout::Poll)
            .unwrap_err();
        assert!(matches!(err, DriverError::DeviceFault { .. }));
        // 帧内数据仍然写入
        assert_eq!(sample.position_raw, 1);
    }

    #[test]
    fn test_unknown_has_no_condition() {
        let (_bus, channel) = channel();
        assert!(
            channel
                .check_condition(&TxPdo::Unknown { cob_id: 0x182 })
                .is_ok()
        );
    }

    #[test]
    fn test_discard_pending_empties_queue() {
        let (bus, mut channel) = channel();
        bus.push_rx(EposFrame::new_standard(0x181, &[0x08, 0x00, 0x34, 0x12]));
        bus.push_rx(EposFrame::new_standard(0x481, &[0x00, 0x00, 0x01, 0x00, 0x00, 0x00]));

        assert_eq!(channel.discard_pending().unwrap(), 2);
        assert_eq!(bus.pending_rx(), 0);
        assert_eq!(channel.discard_pending().unwrap(), 0);
        assert!(matches!(
            channel.receive(ReceiveTimeout::Poll),
            Err(DriverError::Timeout)
        ));
    }
}
