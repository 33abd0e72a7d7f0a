use std::io::Cursor;

use binrw::{BinRead, BinWrite};

use crate::{FsError, Geometry, MAGIC, ROOT_INODE};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录卷的几何参数；
/// - 持久化目录枚举的游标
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u64,
    pub block_size: u64,
    /// 卷的总字节数
    pub volume_size: u64,
    /// 索引节点表的长度（个数）
    pub inode_table_len: u64,
    pub root_inode: u64,
    /// 下一次枚举文件名时开始扫描的目录槽位
    pub dir_cursor: u64,
}

impl SuperBlock {
    /// 磁盘上所占字节数
    pub const SIZE: usize = 48;

    pub fn new(geometry: &Geometry) -> Self {
        Self {
            magic: MAGIC,
            block_size: geometry.block_size as u64,
            volume_size: geometry.volume_size() as u64,
            inode_table_len: geometry.inode_count as u64,
            root_inode: ROOT_INODE as u64,
            dir_cursor: 0,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// 校验磁盘上的超级块与挂载时给出的几何参数一致
    pub fn check(&self, geometry: &Geometry) -> Result<(), FsError> {
        if !self.is_valid() {
            return Err(FsError::Corrupt(format!(
                "bad magic number {:#x}",
                self.magic
            )));
        }
        if self.block_size != geometry.block_size as u64
            || self.volume_size != geometry.volume_size() as u64
            || self.inode_table_len != geometry.inode_count as u64
        {
            return Err(FsError::Corrupt(format!(
                "superblock describes {} blocks of {} bytes with {} inodes",
                self.volume_size / self.block_size.max(1),
                self.block_size,
                self.inode_table_len
            )));
        }
        if self.root_inode != ROOT_INODE as u64 {
            return Err(FsError::Corrupt(format!(
                "unexpected root inode {}",
                self.root_inode
            )));
        }
        Ok(())
    }

    /// 编码为一整块
    pub fn encode(&self, block_size: usize) -> Result<Vec<u8>, FsError> {
        let mut cursor = Cursor::new(Vec::with_capacity(block_size));
        self.write(&mut cursor)?;
        let mut block = cursor.into_inner();
        block.resize(block_size, 0);
        Ok(block)
    }

    pub fn decode(block: &[u8]) -> Result<Self, FsError> {
        Ok(Self::read(&mut Cursor::new(block))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_layout() {
        let geometry = Geometry::default();
        let mut super_block = SuperBlock::new(&geometry);
        super_block.dir_cursor = 5;

        let block = super_block.encode(geometry.block_size).unwrap();
        assert_eq!(block.len(), 1024);
        assert_eq!(&block[..8], &MAGIC.to_le_bytes());
        assert_eq!(&block[8..16], &1024u64.to_le_bytes());
        assert_eq!(&block[16..24], &(2048u64 * 1024).to_le_bytes());
        assert_eq!(&block[24..32], &160u64.to_le_bytes());
        assert_eq!(&block[32..40], &0u64.to_le_bytes());
        assert_eq!(&block[40..48], &5u64.to_le_bytes());
        assert!(block[SuperBlock::SIZE..].iter().all(|&b| b == 0));

        let decoded = SuperBlock::decode(&block).unwrap();
        assert_eq!(decoded, super_block);
        assert!(decoded.check(&geometry).is_ok());
    }

    #[test]
    fn rejects_foreign_volume() {
        let geometry = Geometry::default();
        let block = vec![0u8; geometry.block_size];
        let super_block = SuperBlock::decode(&block).unwrap();
        assert!(!super_block.is_valid());
        assert!(matches!(
            super_block.check(&geometry),
            Err(FsError::Corrupt(_))
        ));

        let other = Geometry {
            inode_count: 64,
            ..Geometry::default()
        };
        assert!(matches!(
            SuperBlock::new(&other).check(&geometry),
            Err(FsError::Corrupt(_))
        ));
    }
}
