//! 索引节点与一级索引块
//!
//! - 直接索引：索引节点内的 [`DIRECT_COUNT`] 个块编号，各指向一个数据块
//! - 一级索引：整个块连续存储**块编号**，每个编号都指向一个**数据块**
//!
//! 逻辑块号小于 [`DIRECT_COUNT`] 时走直接索引，
//! 其余减去 [`DIRECT_COUNT`] 后即为一级索引块内的槽位。

use std::io::Cursor;

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};

use super::{decode_ptr, encode_ptr, BlockId, POINTER_SIZE};
use crate::{FsError, DIRECT_COUNT};

#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DiskInode {
    /// 保留字段，恒为 0
    mode: i32,
    /// 1 为使用中，0 为空闲；不支持硬链接
    pub link_cnt: i32,
    /// 文件字节数
    #[br(map = |raw: i32| raw.max(0) as usize)]
    #[bw(map = |size: &usize| *size as i32)]
    pub size: usize,
    /// 直接索引
    #[br(map = |raw: [i32; DIRECT_COUNT]| raw.map(decode_ptr))]
    #[bw(map = |ptrs: &[Option<BlockId>; DIRECT_COUNT]| ptrs.map(|ptr| encode_ptr(&ptr)))]
    pub direct: [Option<BlockId>; DIRECT_COUNT],
    /// 指向一个一级索引块
    #[br(map = decode_ptr)]
    #[bw(map = encode_ptr)]
    pub indirect: Option<BlockId>,
}

impl Default for DiskInode {
    fn default() -> Self {
        Self {
            mode: 0,
            link_cnt: 0,
            size: 0,
            direct: [None; DIRECT_COUNT],
            indirect: None,
        }
    }
}

impl DiskInode {
    /// 磁盘上所占字节数
    pub const SIZE: usize = 64;

    /// 清空大小、链接数以及全部 13 个块编号
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.link_cnt != 0
    }

    /// 计算容纳指定数据量需要多少个**数据块**
    #[inline]
    pub fn count_data_block(size: usize, block_size: usize) -> usize {
        size.div_ceil(block_size)
    }
}

/// 一级索引块，每个槽位为空或一个数据块编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectBlock {
    slots: Vec<Option<BlockId>>,
}

impl IndirectBlock {
    /// 全部槽位未分配
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    #[inline]
    pub fn get(&self, slot: usize) -> Option<BlockId> {
        self.slots.get(slot).copied().flatten()
    }

    #[inline]
    pub fn set(&mut self, slot: usize, ptr: Option<BlockId>) {
        self.slots[slot] = ptr;
    }

    /// 已分配的数据块
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn encode(&self) -> Result<Vec<u8>, FsError> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.slots.len() * POINTER_SIZE));
        for slot in &self.slots {
            cursor.write_le(&encode_ptr(slot))?;
        }
        Ok(cursor.into_inner())
    }

    pub fn decode(block: &[u8]) -> Result<Self, FsError> {
        let mut cursor = Cursor::new(block);
        let slots = (0..block.len() / POINTER_SIZE)
            .map(|_| cursor.read_le::<i32>().map(decode_ptr))
            .collect::<Result<_, _>>()?;
        Ok(Self { slots })
    }
}

/// 内存中的索引节点表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeTable {
    inodes: Vec<DiskInode>,
}

impl InodeTable {
    pub fn new(count: usize) -> Self {
        Self {
            inodes: vec![DiskInode::default(); count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    #[inline]
    pub fn get(&self, id: usize) -> &DiskInode {
        &self.inodes[id]
    }

    #[inline]
    pub fn get_mut(&mut self, id: usize) -> &mut DiskInode {
        &mut self.inodes[id]
    }

    #[inline]
    pub fn reset(&mut self, id: usize) {
        self.inodes[id].reset();
    }

    /// 编号最小的空闲索引节点
    pub fn find_free(&self) -> Option<usize> {
        self.inodes.iter().position(|inode| !inode.is_live())
    }

    /// 重置并占用一个索引节点
    pub fn claim(&mut self, id: usize) {
        let inode = &mut self.inodes[id];
        inode.reset();
        inode.link_cnt = 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &DiskInode)> {
        self.inodes.iter().enumerate()
    }

    pub fn encode(&self, region_len: usize) -> Result<Vec<u8>, FsError> {
        let mut cursor = Cursor::new(Vec::with_capacity(region_len));
        for inode in &self.inodes {
            inode.write(&mut cursor)?;
        }
        let mut region = cursor.into_inner();
        region.resize(region_len, 0);
        Ok(region)
    }

    pub fn decode(region: &[u8], count: usize) -> Result<Self, FsError> {
        let mut cursor = Cursor::new(region);
        let inodes = (0..count)
            .map(|_| DiskInode::read(&mut cursor))
            .collect::<Result<_, _>>()?;
        Ok(Self { inodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_record_is_64_bytes() {
        let mut table = InodeTable::new(2);
        table.claim(1);
        let inode = table.get_mut(1);
        inode.size = 2000;
        inode.direct[0] = Some(BlockId::new(26));
        inode.direct[1] = Some(BlockId::new(27));

        let region = table.encode(DiskInode::SIZE * 2).unwrap();
        assert_eq!(region.len(), 128);
        let record = &region[DiskInode::SIZE..];
        assert_eq!(&record[0..4], &0i32.to_le_bytes());
        assert_eq!(&record[4..8], &1i32.to_le_bytes());
        assert_eq!(&record[8..12], &2000i32.to_le_bytes());
        assert_eq!(&record[12..16], &26i32.to_le_bytes());
        assert_eq!(&record[16..20], &27i32.to_le_bytes());
        assert_eq!(&record[20..24], &(-1i32).to_le_bytes());
        assert_eq!(&record[60..64], &(-1i32).to_le_bytes());

        assert_eq!(InodeTable::decode(&region, 2).unwrap(), table);
    }

    #[test]
    fn claim_takes_lowest_free() {
        let mut table = InodeTable::new(3);
        assert_eq!(table.find_free(), Some(0));
        table.claim(0);
        table.claim(1);
        assert_eq!(table.find_free(), Some(2));
        table.reset(0);
        assert_eq!(table.find_free(), Some(0));
        table.claim(0);
        table.claim(2);
        assert_eq!(table.find_free(), None);
    }

    #[test]
    fn indirect_slots() {
        let mut block = IndirectBlock::new(256);
        block.set(0, Some(BlockId::new(40)));
        block.set(255, Some(BlockId::new(41)));

        let bytes = block.encode().unwrap();
        assert_eq!(bytes.len(), 1024);
        assert_eq!(&bytes[0..4], &40i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-1i32).to_le_bytes());

        let decoded = IndirectBlock::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.get(255), Some(BlockId::new(41)));
        assert_eq!(decoded.get(1), None);
        assert_eq!(
            decoded.blocks().collect::<Vec<_>>(),
            [BlockId::new(40), BlockId::new(41)]
        );
    }
}
