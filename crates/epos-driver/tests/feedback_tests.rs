//! 过程数据通道端到端测试
//!
//! 模拟驱动器在 PDO 总线上发出 TxPDO，验证反馈样本的更新与故障/警告上报。

mod common;

use common::*;
use epos_can::ReceiveTimeout;
use epos_driver::{DriverError, FeedbackSample, LifecycleState};
use epos_protocol::{ObjectEntry, ObjectValue};

fn enabled() -> (SimulatedDrive, MockNode) {
    let drive = SimulatedDrive::new();
    let mut node = drive.init_quiet();
    node.enable().unwrap();
    drive.cfg_bus.take_sent();
    (drive, node)
}

fn previous() -> FeedbackSample {
    FeedbackSample {
        position_raw: 1000,
        velocity_mm_s: 42,
        current_ma: -7,
    }
}

#[test]
fn test_set_current_then_read_feedback() {
    let (drive, mut node) = enabled();

    node.set_current(250).unwrap();
    let sent = drive.pdo_bus.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 0x201);
    assert_eq!(sent[0].data_slice(), &[0x0F, 0x00, 0xFA, 0x00]);

    drive.emit(0x181, &[0x00, 0x00, 0xFA, 0x00]);
    let mut sample = FeedbackSample::default();
    node.read_feedback(&mut sample, ReceiveTimeout::from_millis(5))
        .unwrap();
    assert_eq!(sample.current_ma, 250);
    assert_eq!(sample.position_raw, 0);
    assert_eq!(sample.velocity_mm_s, 0);
}

#[test]
fn test_frames_before_init_are_discarded() {
    let drive = SimulatedDrive::new();
    // 上一次会话残留的故障帧
    drive.emit(0x181, &[0x08, 0x00, 0x34, 0x12]);
    drive.emit(0x381, &[0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);

    let mut node = drive.init_quiet();
    assert_eq!(drive.pdo_bus.pending_rx(), 0);
    node.enable().unwrap();

    let mut sample = previous();
    assert!(matches!(
        node.read_feedback(&mut sample, ReceiveTimeout::Poll),
        Err(DriverError::Timeout)
    ));
    assert_eq!(sample, previous());
    assert_eq!(node.state(), LifecycleState::OperationalEnabled);
}

#[test]
fn test_stop_current() {
    let (drive, mut node) = enabled();
    node.stop_current().unwrap();
    assert_eq!(
        drive.pdo_bus.take_sent()[0].data_slice(),
        &[0x0F, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_negative_current_reinterpreted() {
    let (drive, mut node) = enabled();
    // 0xFF06 = -250
    drive.emit(0x181, &[0x37, 0x02, 0x06, 0xFF]);
    let mut sample = FeedbackSample::default();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(sample.current_ma, -250);
}

#[test]
fn test_position_frame_updates_only_position() {
    let (drive, mut node) = enabled();
    drive.emit(0x381, &[0x37, 0x02, 0x01, 0x00, 0x00, 0x00, 0xAA, 0xBB]);

    let mut sample = previous();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(
        sample,
        FeedbackSample {
            position_raw: 1,
            ..previous()
        }
    );
    assert_eq!(sample.position_mm(node.converter()), 12);
}

#[test]
fn test_velocity_frame_converted_to_mm_per_sec() {
    let (drive, mut node) = enabled();
    // 496 rpm
    drive.emit(0x481, &[0x37, 0x02, 0xF0, 0x01, 0x00, 0x00]);

    let mut sample = previous();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(
        sample,
        FeedbackSample {
            velocity_mm_s: 99,
            ..previous()
        }
    );
}

#[test]
fn test_status_frame_updates_nothing() {
    let (drive, mut node) = enabled();
    drive.emit(0x281, &[0x37, 0x02, 0xFD, 0xFD]);

    let mut sample = previous();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(sample, previous());
}

#[test]
fn test_unknown_id_is_ignored() {
    let (drive, mut node) = enabled();
    // 另一个节点的 TxPDO1
    drive.emit(0x182, &[0x08, 0x00, 0xFA, 0x00]);

    let mut sample = previous();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(sample, previous());
    assert_eq!(node.state(), LifecycleState::OperationalEnabled);
}

#[test]
fn test_fault_takes_precedence_over_warning() {
    for id in [0x181u16, 0x281, 0x381, 0x481] {
        let (drive, mut node) = enabled();
        drive.emit(id, &[0x88, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut sample = FeedbackSample::default();
        let err = node
            .read_feedback(&mut sample, ReceiveTimeout::Poll)
            .unwrap_err();
        assert!(
            matches!(err, DriverError::DeviceFault { statusword: 0x0088, .. }),
            "slot 0x{:X}: {:?}",
            id,
            err
        );
        assert_eq!(node.state(), LifecycleState::Fault);
    }
}

#[test]
fn test_warning_reported_without_fault() {
    let (drive, mut node) = enabled();
    drive.emit(0x481, &[0x80, 0x00, 0x0A, 0x00, 0x00, 0x00]);

    let mut sample = FeedbackSample::default();
    let err = node
        .read_feedback(&mut sample, ReceiveTimeout::Poll)
        .unwrap_err();
    assert!(matches!(err, DriverError::DeviceWarning { statusword: 0x0080, .. }));
    assert!(!err.is_fatal());
    // 警告不改变状态，数据照常更新
    assert_eq!(node.state(), LifecycleState::OperationalEnabled);
    assert_eq!(sample.velocity_mm_s, 2);
}

#[test]
fn test_fault_blocks_motion_until_reset() {
    let (drive, mut node) = enabled();
    drive.emit(0x181, &[0x08, 0x00, 0x00, 0x00]);
    let mut sample = FeedbackSample::default();
    assert!(node.read_feedback(&mut sample, ReceiveTimeout::Poll).is_err());

    assert!(matches!(
        node.set_current(100),
        Err(DriverError::InvalidState { .. })
    ));
    assert!(matches!(
        node.enable(),
        Err(DriverError::InvalidState { .. })
    ));

    // halt 不会清除故障状态
    node.halt().unwrap();
    assert_eq!(node.state(), LifecycleState::Fault);

    node.fault_reset().unwrap();
    assert_eq!(node.state(), LifecycleState::OperationalDisabled);
    assert_eq!(
        decode_config_frames(&drive.cfg_bus.take_sent()).last(),
        Some(&sdo(0x6040, 0, ObjectValue::U16(0x0080)))
    );

    node.enable().unwrap();
    node.set_current(100).unwrap();
}

#[test]
fn test_fault_reset_failure_keeps_fault() {
    let (drive, mut node) = enabled();
    drive.emit(0x181, &[0x08, 0x00, 0x00, 0x00]);
    let mut sample = FeedbackSample::default();
    assert!(node.read_feedback(&mut sample, ReceiveTimeout::Poll).is_err());

    drive.abort_on(ObjectEntry::new(0x6040, 0), Some(ObjectValue::U16(0x0080)));
    assert!(node.fault_reset().is_err());
    assert_eq!(node.state(), LifecycleState::Fault);
}

#[test]
fn test_read_timeout_is_not_fatal() {
    let (_drive, mut node) = enabled();
    let mut sample = previous();
    let err = node
        .read_feedback(&mut sample, ReceiveTimeout::from_millis(5))
        .unwrap_err();
    assert!(matches!(err, DriverError::Timeout));
    assert!(!err.is_fatal());
    assert_eq!(sample, previous());
}

#[test]
fn test_one_frame_per_call() {
    let (drive, mut node) = enabled();
    drive.emit(0x181, &[0x00, 0x00, 0x0A, 0x00]);
    drive.emit(0x381, &[0x00, 0x00, 0x05, 0x00, 0x00, 0x00]);

    let mut sample = FeedbackSample::default();
    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(sample.current_ma, 10);
    assert_eq!(sample.position_raw, 0);
    assert_eq!(drive.pdo_bus.pending_rx(), 1);

    node.read_feedback(&mut sample, ReceiveTimeout::Poll).unwrap();
    assert_eq!(sample.position_raw, 5);
}

#[test]
fn test_set_current_requires_enable() {
    let drive = SimulatedDrive::new();
    let mut node = drive.init_quiet();
    assert!(matches!(
        node.set_current(250),
        Err(DriverError::InvalidState {
            operation: "set_current",
            state: LifecycleState::OperationalDisabled
        })
    ));
    assert!(drive.pdo_bus.sent_frames().is_empty());
}

#[test]
fn test_transmit_error_returned() {
    let (drive, mut node) = enabled();
    drive.pdo_bus.fail_sends_after(0);
    assert!(matches!(node.set_current(250), Err(DriverError::Can(_))));
}
