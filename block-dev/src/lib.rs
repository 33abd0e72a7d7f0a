//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、镜像文件、一段内存；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过两个原语访问设备：读出若干连续块、写入若干连续块，
//! 均以绝对块号寻址。

#![no_std]

extern crate alloc;

mod memory;

use core::any::Any;
use core::fmt;

pub use self::memory::MemoryDevice;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 每块字节数
    fn block_size(&self) -> usize;

    /// 设备总块数
    fn block_count(&self) -> usize;

    /// 从`start`起读出`count`个连续块，`buf`长度须为`count * block_size`
    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// 从`start`起写入`count`个连续块，`buf`长度须为`count * block_size`
    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// 检查一次访问是否落在设备之内，缓冲区大小是否匹配
    fn check_access(&self, start: usize, count: usize, len: usize) -> Result<(), DeviceError> {
        let total = self.block_count();
        if start.checked_add(count).map_or(true, |end| end > total) {
            return Err(DeviceError::OutOfRange {
                start,
                count,
                total,
            });
        }

        let expected = count * self.block_size();
        if len != expected {
            return Err(DeviceError::BufferSize {
                expected,
                actual: len,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 访问越过了设备末尾
    OutOfRange {
        start: usize,
        count: usize,
        total: usize,
    },
    /// 缓冲区长度不是`count * block_size`
    BufferSize { expected: usize, actual: usize },
    /// 底层介质读写失败，细节由驱动自行记录
    Io,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                start,
                count,
                total,
            } => write!(
                f,
                "blocks {start}..{} out of device range (0..{total})",
                start + count
            ),
            Self::BufferSize { expected, actual } => {
                write!(f, "buffer of {actual} bytes, expected {expected}")
            }
            Self::Io => f.write_str("device i/o failure"),
        }
    }
}
