//! PDO 映射配置
//!
//! 初始化时通过配置通道写入：
//! 1. 运动参数（最大速度单独先写，失败即视为驱动器未上电）
//! 2. 8 个 PDO 的 COB-ID 与传输类型
//! 3. 8 个 PDO 的映射表
//!
//! 配置不是事务性的：中途失败时，已写入的对象保持生效。

use crate::config::ProfileConfig;
use crate::error::DriverError;
use crate::sdo::ObjectDictionary;
use epos_protocol::*;
use tracing::{debug, error, info};

fn write<D: ObjectDictionary + ?Sized>(
    od: &mut D,
    node: NodeId,
    entry: ObjectEntry,
    value: ObjectValue,
) -> Result<(), DriverError> {
    od.write(node, entry, value).map_err(|e| e.writing(entry))
}

/// 写运动参数
///
/// 最大速度失败立即返回；其余参数全部尝试，返回第一个错误。
pub fn write_profile<D: ObjectDictionary + ?Sized>(
    od: &mut D,
    node: NodeId,
    profile: &ProfileConfig,
) -> Result<(), DriverError> {
    let max_velocity = ObjectEntry::new(OD_MAX_PROFILE_VELOCITY, 0x00);
    if let Err(e) = write(od, node, max_velocity, ObjectValue::U32(profile.max_velocity)) {
        error!("Error configuring node {}, no power? ({})", node, e);
        return Err(e);
    }

    let scalars = [
        (
            OD_QUICKSTOP_DECELERATION,
            ObjectValue::U32(profile.quickstop_deceleration),
        ),
        (
            OD_PROFILE_ACCELERATION,
            ObjectValue::U32(profile.profile_acceleration),
        ),
        (
            OD_PROFILE_DECELERATION,
            ObjectValue::U32(profile.profile_deceleration),
        ),
        (
            OD_MOTION_PROFILE_TYPE,
            ObjectValue::I16(profile.motion_profile_type.into()),
        ),
        (
            OD_MISCELLANEOUS_CONFIGURATION,
            ObjectValue::U16(profile.sensor_configuration.bits()),
        ),
    ];

    let mut first_error = None;
    for (index, value) in scalars {
        if let Err(e) = write(od, node, ObjectEntry::new(index, 0x00), value) {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => {
            error!("Error configuring node {}: {}", node, e);
            Err(e)
        },
        None => Ok(()),
    }
}

/// 写一个槽位的通讯参数：COB-ID 与异步传输类型
pub fn write_pdo_parameter<D: ObjectDictionary + ?Sized>(
    od: &mut D,
    node: NodeId,
    slot: PdoSlot,
) -> Result<(), DriverError> {
    let index = slot.comm_index();
    write(
        od,
        node,
        ObjectEntry::new(index, PDO_COMM_SUB_COB_ID),
        ObjectValue::U32(slot.cob_id(node)),
    )?;
    write(
        od,
        node,
        ObjectEntry::new(index, PDO_COMM_SUB_TRANSMISSION_TYPE),
        ObjectValue::U8(PDO_TRANSMISSION_ASYNC),
    )
}

/// 写一个槽位的映射表：子索引 0 清零，逐条写入，再写入条目数
pub fn write_pdo_mapping<D: ObjectDictionary + ?Sized>(
    od: &mut D,
    node: NodeId,
    mapping: &PdoMapping,
) -> Result<(), DriverError> {
    mapping.validate()?;

    let index = mapping.slot.mapping_index();
    write(od, node, ObjectEntry::new(index, 0x00), ObjectValue::U8(0))?;
    for (sub, field) in (1u8..).zip(mapping.fields) {
        write(
            od,
            node,
            ObjectEntry::new(index, sub),
            ObjectValue::U32(field.encode()),
        )?;
    }
    write(
        od,
        node,
        ObjectEntry::new(index, 0x00),
        ObjectValue::U8(mapping.fields.len() as u8),
    )?;

    debug!(
        "Mapped PDO {} of node {} ({} bits)",
        mapping.slot,
        node,
        mapping.total_bits()
    );
    Ok(())
}

/// 完整配置一个节点
///
/// 映射表在任何写入之前先整体校验。任意一步失败后节点不可用于运动控制。
pub fn configure_node<D: ObjectDictionary + ?Sized>(
    od: &mut D,
    node: NodeId,
    profile: &ProfileConfig,
) -> Result<(), DriverError> {
    for mapping in pdo_mapping_table() {
        mapping.validate()?;
    }

    write_profile(od, node, profile)?;

    for mapping in pdo_mapping_table() {
        write_pdo_parameter(od, node, mapping.slot)?;
    }
    for mapping in pdo_mapping_table() {
        write_pdo_mapping(od, node, mapping)?;
    }

    info!("Node {} configured", node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 记录所有写入，可按对象索引注入失败
    #[derive(Default)]
    struct RecordingDictionary {
        writes: Vec<(ObjectEntry, ObjectValue)>,
        fail_on: Vec<u16>,
    }

    impl ObjectDictionary for RecordingDictionary {
        fn write(
            &mut self,
            _node: NodeId,
            entry: ObjectEntry,
            value: ObjectValue,
        ) -> Result<(), DriverError> {
            self.writes.push((entry, value));
            if self.fail_on.contains(&entry.index) {
                return Err(DriverError::SdoAbort {
                    index: entry.index,
                    subindex: entry.subindex,
                    code: 0x0800_0000,
                });
            }
            Ok(())
        }
    }

    fn node() -> NodeId {
        NodeId::new(1).unwrap()
    }

    #[test]
    fn test_profile_writes() {
        let mut od = RecordingDictionary::default();
        write_profile(&mut od, node(), &ProfileConfig::default()).unwrap();

        let expected = vec![
            (ObjectEntry::new(0x607F, 0), ObjectValue::U32(100)),
            (ObjectEntry::new(0x6085, 0), ObjectValue::U32(10_000)),
            (ObjectEntry::new(0x6083, 0), ObjectValue::U32(10_000)),
            (ObjectEntry::new(0x6084, 0), ObjectValue::U32(10_000)),
            (ObjectEntry::new(0x6086, 0), ObjectValue::I16(0)),
            (ObjectEntry::new(0x2008, 0), ObjectValue::U16(0x0008)),
        ];
        assert_eq!(od.writes, expected);
    }

    #[test]
    fn test_max_velocity_failure_stops_immediately() {
        let mut od = RecordingDictionary {
            fail_on: vec![OD_MAX_PROFILE_VELOCITY],
            ..Default::default()
        };
        let err = configure_node(&mut od, node(), &ProfileConfig::default()).unwrap_err();

        assert_eq!(od.writes.len(), 1);
        match err {
            DriverError::ConfigurationWrite { entry, source } => {
                assert_eq!(entry, ObjectEntry::new(0x607F, 0));
                assert!(matches!(*source, DriverError::SdoAbort { .. }));
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_scalar_failures_first_wins_but_all_attempted() {
        let mut od = RecordingDictionary {
            fail_on: vec![OD_PROFILE_ACCELERATION, OD_MOTION_PROFILE_TYPE],
            ..Default::default()
        };
        let err = configure_node(&mut od, node(), &ProfileConfig::default()).unwrap_err();

        // 6 个标量都尝试了，PDO 参数一个也没写
        assert_eq!(od.writes.len(), 6);
        assert!(matches!(
            err,
            DriverError::ConfigurationWrite { entry, .. } if entry.index == OD_PROFILE_ACCELERATION
        ));
    }

    #[test]
    fn test_pdo_parameters() {
        let mut od = RecordingDictionary::default();
        let node = NodeId::new(5).unwrap();
        write_pdo_parameter(&mut od, node, PdoSlot::tx(SlotNumber::Three)).unwrap();
        assert_eq!(
            od.writes,
            vec![
                (ObjectEntry::new(0x1802, 1), ObjectValue::U32(0x385)),
                (ObjectEntry::new(0x1802, 2), ObjectValue::U8(0xFF)),
            ]
        );
    }

    #[test]
    fn test_mapping_procedure() {
        let mut od = RecordingDictionary::default();
        write_pdo_mapping(&mut od, node(), &TX_PDO_MAPPING[1]).unwrap();
        assert_eq!(
            od.writes,
            vec![
                (ObjectEntry::new(0x1A01, 0), ObjectValue::U8(0)),
                (ObjectEntry::new(0x1A01, 1), ObjectValue::U32(0x6041_0010)),
                (ObjectEntry::new(0x1A01, 2), ObjectValue::U32(0x6060_0008)),
                (ObjectEntry::new(0x1A01, 3), ObjectValue::U32(0x6061_0008)),
                (ObjectEntry::new(0x1A01, 0), ObjectValue::U8(3)),
            ]
        );
    }

    #[test]
    fn test_invalid_mapping_rejected_before_writing() {
        const BAD: PdoMapping = PdoMapping {
            slot: PdoSlot::rx(SlotNumber::One),
            fields: &[
                PdoField::new(OD_CONTROLWORD, 0, 16),
                PdoField::new(OD_TARGET_POSITION, 0, 32),
                PdoField::new(OD_TARGET_VELOCITY, 0, 32),
            ],
        };
        let mut od = RecordingDictionary::default();
        let err = write_pdo_mapping(&mut od, node(), &BAD).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Protocol(ProtocolError::MappingOverflow { bits: 80, .. })
        ));
        assert!(od.writes.is_empty());
    }

    #[test]
    fn test_configure_node_write_count() {
        let mut od = RecordingDictionary::default();
        configure_node(&mut od, node(), &ProfileConfig::default()).unwrap();

        // 6 个标量 + 8 × 2 通讯参数 + 8 个映射（每个 2 + 条目数）
        let entries: usize = pdo_mapping_table().map(|m| m.fields.len() + 2).sum();
        assert_eq!(od.writes.len(), 6 + 16 + entries);
    }
}
