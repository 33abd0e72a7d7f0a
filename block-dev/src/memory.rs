use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, DeviceError};

/// 以一段内存充当的块设备，新建时全部清零
#[derive(Debug)]
pub struct MemoryDevice {
    block_size: usize,
    block_count: usize,
    data: Mutex<Vec<u8>>,
}

impl MemoryDevice {
    pub fn new(block_size: usize, block_count: usize) -> Self {
        Self {
            block_size,
            block_count,
            data: Mutex::new(vec![0; block_size * block_count]),
        }
    }

    /// 复制出整个设备的内容
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BlockDevice for MemoryDevice {
    #[inline]
    fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.check_access(start, count, buf.len())?;
        let begin = start * self.block_size;
        buf.copy_from_slice(&self.data.lock()[begin..begin + buf.len()]);
        Ok(())
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.check_access(start, count, buf.len())?;
        let begin = start * self.block_size;
        self.data.lock()[begin..begin + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_round_trip() {
        let dev = MemoryDevice::new(16, 4);
        let data = [7u8; 32];
        dev.write_blocks(1, 2, &data).unwrap();

        let mut buf = [0u8; 48];
        dev.read_blocks(0, 3, &mut buf).unwrap();
        assert!(buf[..16].iter().all(|&b| b == 0));
        assert!(buf[16..].iter().all(|&b| b == 7));
    }

    #[test]
    fn rejects_bad_access() {
        let dev = MemoryDevice::new(16, 4);
        let mut buf = [0u8; 32];
        assert_eq!(
            dev.read_blocks(3, 2, &mut buf),
            Err(DeviceError::OutOfRange {
                start: 3,
                count: 2,
                total: 4
            })
        );
        assert_eq!(
            dev.write_blocks(0, 1, &buf),
            Err(DeviceError::BufferSize {
                expected: 16,
                actual: 32
            })
        );
    }
}
