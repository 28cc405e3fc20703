//! Builder 模式实现
//!
//! 提供链式构造 `EposNode` 的便捷方式。

use crate::config::{EposConfig, ProfileConfig};
use crate::error::DriverError;
use crate::node::EposNode;
#[cfg(target_os = "linux")]
use epos_can::SocketCanAdapter;
use epos_can::{CanAdapter, IdFilter};
use epos_protocol::{
    ID_NMT, ID_NMT_ERROR_CONTROL, NodeId, PdoSlot, SlotNumber, UnitConverter, sdo_response_id,
};
use std::path::Path;
use std::time::Duration;

/// 过程数据通道的过滤器：本节点的 TxPDO1~4
pub fn pdo_filters(node: NodeId) -> [IdFilter; 4] {
    SlotNumber::ALL.map(|n| IdFilter::exact(PdoSlot::tx(n).cob_id(node)))
}

/// 配置通道的过滤器：NMT、心跳/启动报文、SDO 应答
pub fn config_filters(node: NodeId) -> [IdFilter; 3] {
    [
        IdFilter::exact(ID_NMT),
        IdFilter::exact(ID_NMT_ERROR_CONTROL + node.get() as u32),
        IdFilter::exact(sdo_response_id(node)),
    ]
}

/// EPOS Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use epos_driver::EposBuilder;
///
/// let mut node = EposBuilder::new()
///     .interface("can0")
///     .node_id(1)
///     .build()
///     .unwrap();
/// node.enable().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EposBuilder {
    config: EposConfig,
}

impl EposBuilder {
    /// 使用默认配置（can0，节点 1）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: EposConfig) -> Self {
        Self { config }
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        Ok(Self::from_config(EposConfig::load(path)?))
    }

    /// 设置 SocketCAN 接口（如 "can0" 或 "vcan0"）
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.config.interface = interface.into();
        self
    }

    pub fn node_id(mut self, node_id: u8) -> Self {
        self.config.node_id = node_id;
        self
    }

    pub fn sdo_timeout(mut self, timeout: Duration) -> Self {
        self.config.sdo_timeout_ms = timeout.as_millis().max(1) as u64;
        self
    }

    pub fn profile(mut self, profile: ProfileConfig) -> Self {
        self.config.profile = profile;
        self
    }

    /// 轮半径与减速比
    pub fn geometry(mut self, geometry: UnitConverter) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn config(&self) -> &EposConfig {
        &self.config
    }

    /// 使用给定的适配器初始化节点（测试或自定义后端）
    pub fn build_with<P: CanAdapter, C: CanAdapter>(
        &self,
        pdo: P,
        cfg: C,
    ) -> Result<EposNode<P, C>, DriverError> {
        EposNode::init(pdo, cfg, &self.config)
    }

    /// 打开两个 SocketCAN 通道并初始化节点
    ///
    /// # 错误
    /// - `DriverError::InvalidNodeId`: 节点 ID 不在 1~127
    /// - `DriverError::ChannelOpen`: 任一通道打开失败
    /// - 其余见 [`EposNode::init`]
    #[cfg(target_os = "linux")]
    pub fn build(&self) -> Result<EposNode<SocketCanAdapter, SocketCanAdapter>, DriverError> {
        let node = self.config.node().map_err(|_| DriverError::InvalidNodeId(self.config.node_id))?;
        let interface = self.config.interface.as_str();

        let pdo = SocketCanAdapter::open(interface, &pdo_filters(node)).map_err(|source| {
            DriverError::ChannelOpen {
                channel: "process data",
                source,
            }
        })?;
        let cfg = SocketCanAdapter::open(interface, &config_filters(node)).map_err(|source| {
            DriverError::ChannelOpen {
                channel: "configuration",
                source,
            }
        })?;

        self.build_with(pdo, cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let node = NodeId::new(1).unwrap();
        let ids: Vec<u32> = pdo_filters(node).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x181, 0x281, 0x381, 0x481]);
        assert!(pdo_filters(node).iter().all(|f| f.mask == 0x7FF));

        let ids: Vec<u32> = config_filters(node).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x000, 0x701, 0x581]);
    }

    #[test]
    fn test_builder_chain() {
        let builder = EposBuilder::new()
            .interface("vcan0")
            .node_id(7)
            .sdo_timeout(Duration::from_millis(50))
            .geometry(UnitConverter::new(40.0, 10.0));

        let config = builder.config();
        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.node_id, 7);
        assert_eq!(config.sdo_timeout_ms, 50);
        assert_eq!(config.geometry.gear_ratio, 10.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_build_invalid_node_id() {
        let err = EposBuilder::new().node_id(0).build().unwrap_err();
        assert!(matches!(err, DriverError::InvalidNodeId(0)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_build_missing_interface() {
        let err = EposBuilder::new()
            .interface("nonexistent_can99")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::ChannelOpen {
                channel: "process data",
                ..
            }
        ));
        assert!(err.is_fatal());
    }
}
