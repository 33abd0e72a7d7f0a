use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{BlockDevice, DeviceError};
use log::error;
use send_wrapper::SendWrapper;

/// 以宿主机上的镜像文件充当块设备
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    block_size: usize,
    block_count: usize,
}

impl BlockFile {
    /// 新建（或截断）镜像文件，长度恰为`block_size * block_count`
    pub fn create(path: &Path, block_size: usize, block_count: usize) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len((block_size * block_count) as u64)?;
        Ok(Self::new(fd, block_size, block_count))
    }

    /// 打开已有的镜像文件，块数由文件长度决定；长度须是块大小的整数倍
    pub fn open(path: &Path, block_size: usize) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let len = fd.metadata()?.len() as usize;
        if len % block_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image of {len} bytes is not a whole number of {block_size}-byte blocks"),
            ));
        }
        Ok(Self::new(fd, block_size, len / block_size))
    }

    fn new(fd: File, block_size: usize, block_count: usize) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            block_size,
            block_count,
        }
    }
}

impl BlockDevice for BlockFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.check_access(start, count, buf.len())?;

        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((start * self.block_size) as u64))
            .and_then(|_| file.read_exact(buf))
            .map_err(|err| {
                error!("reading blocks {start}..{}: {err}", start + count);
                DeviceError::Io
            })
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.check_access(start, count, buf.len())?;

        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((start * self.block_size) as u64))
            .and_then(|_| file.write_all(buf))
            .map_err(|err| {
                error!("writing blocks {start}..{}: {err}", start + count);
                DeviceError::Io
            })
    }
}
