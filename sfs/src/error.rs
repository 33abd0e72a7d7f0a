use block_dev::DeviceError;
use derive_more::Display;

/// 资源池耗尽时指明是哪一种资源
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    #[display(fmt = "inode")]
    Inode,
    #[display(fmt = "directory slot")]
    DirectorySlot,
    #[display(fmt = "data block")]
    DataBlock,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum FsError {
    #[display(fmt = "file name of {} bytes exceeds the limit of {}", len, limit)]
    NameTooLong { len: usize, limit: usize },
    #[display(fmt = "invalid file name {:?}", _0)]
    InvalidName(String),
    #[display(fmt = "no such file: {}", _0)]
    NotFound(String),
    /// 打开文件表已满
    #[display(fmt = "open-file table is full")]
    OpenLimitReached,
    #[display(fmt = "no free {} left", _0)]
    ResourceExhausted(Resource),
    /// 逻辑块号超出了直接索引加一级索引的容量
    #[display(fmt = "maximum file size exceeded")]
    MaxFileSizeExceeded,
    #[display(fmt = "handle {} is not open", _0)]
    InvalidHandle(usize),
    #[display(fmt = "seek to {} beyond file size {}", offset, size)]
    SeekOutOfRange { offset: usize, size: usize },
    #[display(fmt = "cannot remove {}: no such file", _0)]
    RemoveNotFound(String),
    #[display(fmt = "invalid geometry: {}", _0)]
    InvalidGeometry(&'static str),
    #[display(fmt = "corrupt volume: {}", _0)]
    Corrupt(String),
    #[display(fmt = "device error: {}", _0)]
    Device(DeviceError),
}

impl std::error::Error for FsError {}

impl From<DeviceError> for FsError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl From<binrw::Error> for FsError {
    fn from(err: binrw::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}
