//! # 磁盘数据结构层
//!
//! sfs 的磁盘布局：
//! 超级块 | 索引节点表 | 空闲块位图 | 目录区域 | 数据块区域
//!
//! 各区域的起始块与长度由 [`Geometry`](crate::Geometry) 推导，
//! 所有整数均以小端序存储。

use derive_more::{Display, From, Into};

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::FreeBitmap;

mod inode;
pub use inode::{DiskInode, IndirectBlock, InodeTable};

/// 文件项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_FIELD_LEN};

/// 磁盘上一个块编号所占的字节数
pub const POINTER_SIZE: usize = 4;

/// 磁盘上表示“未分配”的块编号
const UNALLOCATED: i32 = -1;

/// 物理块编号
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<BlockId> for usize {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.index()
    }
}

/// 磁盘上的 −1 即未分配，其余负值同样视作未分配
#[inline]
pub(crate) fn decode_ptr(raw: i32) -> Option<BlockId> {
    u32::try_from(raw).ok().map(BlockId)
}

#[inline]
pub(crate) fn encode_ptr(ptr: &Option<BlockId>) -> i32 {
    ptr.map_or(UNALLOCATED, |id| id.0 as i32)
}
