//! 卷的几何参数以及由它推导出的各区域位置。

use crate::layout::{DirEntry, DiskInode, SuperBlock, NAME_FIELD_LEN, POINTER_SIZE};
use crate::{FsError, DIRECT_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// 每块字节数
    pub block_size: usize,
    /// 卷的总块数
    pub block_count: usize,
    /// 索引节点个数，含保留的根节点
    pub inode_count: usize,
    /// 目录区域占用块数
    pub dir_blocks: usize,
    /// 文件名的最大字节数
    pub name_limit: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: Self::BLOCK_SIZE,
            block_count: Self::BLOCK_COUNT,
            inode_count: Self::INODE_COUNT,
            dir_blocks: Self::DIR_BLOCKS,
            name_limit: Self::NAME_LIMIT,
        }
    }
}

impl Geometry {
    pub const BLOCK_SIZE: usize = 1024;
    pub const BLOCK_COUNT: usize = 2048;
    pub const INODE_COUNT: usize = 160;
    pub const DIR_BLOCKS: usize = 11;
    pub const NAME_LIMIT: usize = 32;

    pub fn new(
        block_size: usize,
        block_count: usize,
        inode_count: usize,
        dir_blocks: usize,
    ) -> Result<Self, FsError> {
        let geometry = Self {
            block_size,
            block_count,
            inode_count,
            dir_blocks,
            name_limit: Self::NAME_LIMIT,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), FsError> {
        if self.block_size % POINTER_SIZE != 0 {
            return Err(FsError::InvalidGeometry(
                "block size must be a multiple of 4",
            ));
        }
        if self.block_size < SuperBlock::SIZE.max(DirEntry::SIZE) {
            return Err(FsError::InvalidGeometry("block size too small"));
        }
        if self.inode_count < 2 {
            return Err(FsError::InvalidGeometry(
                "need the root inode and at least one file inode",
            ));
        }
        if self.dir_capacity() == 0 {
            return Err(FsError::InvalidGeometry("directory region holds no entry"));
        }
        if self.name_limit == 0 || self.name_limit >= NAME_FIELD_LEN {
            return Err(FsError::InvalidGeometry("file name limit out of range"));
        }
        if self.data_start() >= self.block_count {
            return Err(FsError::InvalidGeometry("no room left for data blocks"));
        }
        // 磁盘上的块号与文件大小都以 i32 存储
        let limit = i32::MAX as usize;
        if self.block_count > limit
            || self.inode_count > limit
            || self.max_file_blocks().saturating_mul(self.block_size) > limit
        {
            return Err(FsError::InvalidGeometry("volume too large"));
        }
        Ok(())
    }

    /// 索引节点表的起始块
    #[inline]
    pub fn inode_start(&self) -> usize {
        1
    }

    pub fn inode_blocks(&self) -> usize {
        self.inode_count * DiskInode::SIZE / self.block_size + 1
    }

    #[inline]
    pub fn bitmap_start(&self) -> usize {
        self.inode_start() + self.inode_blocks()
    }

    pub fn bitmap_blocks(&self) -> usize {
        self.block_count / self.block_size + 1
    }

    #[inline]
    pub fn dir_start(&self) -> usize {
        self.bitmap_start() + self.bitmap_blocks()
    }

    /// 数据区的起始块，在此之前都是元数据
    #[inline]
    pub fn data_start(&self) -> usize {
        self.dir_start() + self.dir_blocks
    }

    /// 目录区域可容纳的目录项数
    pub fn dir_capacity(&self) -> usize {
        self.dir_blocks * self.block_size / DirEntry::SIZE
    }

    /// 同时打开的文件数上限，与目录容量一致
    #[inline]
    pub fn open_capacity(&self) -> usize {
        self.dir_capacity()
    }

    /// 一级索引块可容纳的块编号个数
    #[inline]
    pub fn indirect_capacity(&self) -> usize {
        self.block_size / POINTER_SIZE
    }

    /// 单个文件最多可占用的数据块数
    #[inline]
    pub fn max_file_blocks(&self) -> usize {
        DIRECT_COUNT + self.indirect_capacity()
    }

    #[inline]
    pub fn max_file_size(&self) -> usize {
        self.max_file_blocks() * self.block_size
    }

    /// 卷的总字节数
    #[inline]
    pub fn volume_size(&self) -> usize {
        self.block_count * self.block_size
    }
}
