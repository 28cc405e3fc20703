//! SocketCAN CAN 适配器实现
//!
//! Linux 平台下基于内核 SocketCAN 子系统的通道实现。
//!
//! ## 特性
//!
//! - 打开时设置内核级 ID/掩码过滤器，只接收本通道关心的 COB-ID
//! - 使用 `poll(2)` 实现与 `ReceiveTimeout` 对应的超时语义
//! - 自动过滤错误帧（Bus Off / 缓冲区溢出除外）
//!
//! ## 限制
//!
//! - **接口配置**：波特率等由系统工具（`ip link`）完成，不在应用层设置
//! - **超时上限**：有限超时最长 65535ms

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, EposFrame, IdFilter, ReceiveTimeout};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{
    CanError as SocketCanError, CanErrorFrame, CanFilter, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Socket, SocketOptions, StandardId,
};
use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;
use tracing::{debug, error, trace, warn};

/// SocketCAN 适配器
///
/// 一个实例对应一个带过滤器的 CAN 通道（socket）。同一接口上可以
/// 打开多个实例，例如一个用于 PDO、一个用于 NMT/SDO。
///
/// # 示例
///
/// ```no_run
/// use epos_can::{CanAdapter, EposFrame, IdFilter, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::open("can0", &[IdFilter::exact(0x181)]).unwrap();
/// adapter.send(EposFrame::new_standard(0x201, &[0x0F, 0x00, 0x00, 0x00])).unwrap();
/// let rx_frame = adapter.receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 打开时设置的过滤器
    filters: Vec<IdFilter>,
}

impl SocketCanAdapter {
    /// 打开带过滤器的 SocketCAN 通道
    ///
    /// `filters` 为空时接收所有帧。
    ///
    /// # 错误
    /// - `CanError::Device(NotFound)`: 接口不存在
    /// - `CanError::Device(AccessDenied)`: 权限不足
    /// - `CanError::Device(UnsupportedConfig)`: 设置过滤器失败
    pub fn open(interface: impl Into<String>, filters: &[IdFilter]) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            let kind = match e.raw_os_error() {
                Some(libc::ENODEV) => CanDeviceErrorKind::NotFound,
                Some(libc::ENETDOWN) => CanDeviceErrorKind::NotUp,
                Some(libc::EPERM) | Some(libc::EACCES) => CanDeviceErrorKind::AccessDenied,
                _ => CanDeviceErrorKind::Backend,
            };
            CanError::Device(CanDeviceError::new(
                kind,
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        if !filters.is_empty() {
            let can_filters: Vec<CanFilter> =
                filters.iter().map(|f| CanFilter::new(f.id, f.mask)).collect();
            socket.set_filters(&can_filters).map_err(|e| {
                CanError::Device(CanDeviceError::new(
                    CanDeviceErrorKind::UnsupportedConfig,
                    format!("Failed to set CAN filters on '{}': {}", interface, e),
                ))
            })?;
        }

        debug!(
            "SocketCAN channel opened on '{}' with {} filter(s)",
            interface,
            filters.len()
        );

        Ok(Self {
            socket,
            interface,
            filters: filters.to_vec(),
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取过滤器
    pub fn filters(&self) -> &[IdFilter] {
        &self.filters
    }

    /// 等待 socket 可读
    fn wait_readable(&self, timeout: ReceiveTimeout) -> Result<(), CanError> {
        let fd = self.socket.as_raw_fd();
        let pollfd = PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN);

        let poll_timeout = match timeout {
            ReceiveTimeout::Poll => PollTimeout::ZERO,
            ReceiveTimeout::Forever => PollTimeout::NONE,
            ReceiveTimeout::After(_) => {
                PollTimeout::from(timeout.as_poll_millis().min(u16::MAX as i32) as u16)
            },
        };

        match poll(&mut [pollfd], poll_timeout) {
            Ok(0) => Err(CanError::Timeout),
            Ok(_) => Ok(()),
            Err(nix::errno::Errno::EINTR) => Err(CanError::Timeout),
            Err(e) => Err(CanError::Io(std::io::Error::other(format!(
                "poll failed: {}",
                e
            )))),
        }
    }

    /// 错误帧分类：致命的返回错误，其余记录后忽略
    fn check_error_frame(&self, can_frame: CanFrame) -> Result<(), CanError> {
        let Ok(error_frame) = CanErrorFrame::try_from(can_frame) else {
            warn!("Received CAN error frame but failed to parse, ignoring");
            return Ok(());
        };

        let socketcan_error = SocketCanError::from(error_frame);
        match &socketcan_error {
            SocketCanError::BusOff => {
                error!("CAN Bus Off error detected on '{}'", self.interface);
                Err(CanError::BusOff)
            },
            SocketCanError::ControllerProblem(problem) => {
                let problem_str = format!("{}", problem);
                if problem_str.contains("overflow") || problem_str.contains("Overflow") {
                    error!("CAN Buffer Overflow detected: {}", problem);
                    Err(CanError::BufferOverflow)
                } else {
                    warn!("CAN Controller Problem: {}, ignoring", problem);
                    Ok(())
                }
            },
            _ => {
                warn!("CAN Error Frame received: {}, ignoring", socketcan_error);
                Ok(())
            },
        }
    }
}

impl Drop for SocketCanAdapter {
    /// 离开作用域时 socket 自动关闭
    fn drop(&mut self) {
        trace!("SocketCAN channel on '{}' closed", self.interface);
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: EposFrame) -> Result<(), CanError> {
        let payload = &frame.data[..frame.len as usize];
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id)
                .and_then(|id| CanFrame::new(id, payload))
                .ok_or_else(|| {
                    CanError::Device(
                        format!("Failed to create extended frame with ID 0x{:X}", frame.id).into(),
                    )
                })?
        } else {
            StandardId::new(frame.id as u16)
                .and_then(|id| CanFrame::new(id, payload))
                .ok_or_else(|| {
                    CanError::Device(
                        format!("Failed to create standard frame with ID 0x{:X}", frame.id).into(),
                    )
                })?
        };

        self.socket.write_frame(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧（阻塞直到收到有效数据帧或超时）
    ///
    /// 非致命错误帧会被跳过，并以完整超时重新等待。
    fn receive_timeout(&mut self, timeout: ReceiveTimeout) -> Result<EposFrame, CanError> {
        loop {
            self.wait_readable(timeout)?;

            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(CanError::Timeout);
                },
                Err(e) => return Err(CanError::Io(e)),
            };

            if can_frame.is_error_frame() {
                self.check_error_frame(can_frame)?;
                continue;
            }

            let mut data = [0u8; 8];
            let frame_data = can_frame.data();
            let len = frame_data.len().min(8);
            data[..len].copy_from_slice(&frame_data[..len]);

            let epos_frame = EposFrame {
                id: can_frame.raw_id(),
                data,
                len: len as u8,
                is_extended: can_frame.is_extended(),
            };

            trace!(
                "Received CAN frame: ID=0x{:X}, len={}",
                epos_frame.id, epos_frame.len
            );
            return Ok(epos_frame);
        }
    }
}
