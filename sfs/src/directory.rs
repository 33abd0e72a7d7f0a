//! # 目录层
//!
//! 整个卷只有一个目录：定长的目录项表，占据目录区域的全部块。
//! 查找、分配都按槽位升序线性扫描。

use std::io::Cursor;

use binrw::{BinRead, BinWrite};

use crate::layout::DirEntry;
use crate::{FsError, Resource};

/// 检查文件名能否写进目录项
pub fn validate_name(name: &str, limit: usize) -> Result<(), FsError> {
    if name.len() > limit {
        return Err(FsError::NameTooLong {
            len: name.len(),
            limit,
        });
    }
    if name.is_empty() || name.contains('\0') {
        return Err(FsError::InvalidName(name.to_owned()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<DirEntry>,
    name_limit: usize,
}

impl Directory {
    /// 全部槽位空闲的目录
    pub fn new(capacity: usize, name_limit: usize) -> Self {
        Self {
            entries: vec![DirEntry::default(); capacity],
            name_limit,
        }
    }

    /// 使用中的目录项个数
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_available()).count()
    }

    /// 通过文件名获取索引节点编号
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_available())
            .find(|entry| entry.name() == name)
            .and_then(DirEntry::inode)
    }

    /// 编号最小的空闲槽位
    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(DirEntry::is_available)
    }

    /// 在首个空闲槽位登记`name`，返回槽位
    pub fn allocate_entry(&mut self, name: &str, inode: usize) -> Result<usize, FsError> {
        validate_name(name, self.name_limit)?;
        let slot = self
            .free_slot()
            .ok_or(FsError::ResourceExhausted(Resource::DirectorySlot))?;
        self.entries[slot] = DirEntry::new(name, inode);
        Ok(slot)
    }

    /// 清除指向`inode`的目录项，返回其槽位
    pub fn remove_entry(&mut self, inode: usize) -> Option<usize> {
        let slot = self
            .entries
            .iter()
            .position(|entry| entry.inode() == Some(inode))?;
        self.entries[slot] = DirEntry::default();
        Some(slot)
    }

    /// 从槽位`cursor`起寻找下一个使用中的目录项，
    /// 返回文件名与下一次扫描的起点
    pub fn next_name(&self, cursor: usize) -> Option<(String, usize)> {
        self.entries
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|(_, entry)| !entry.is_available())
            .map(|(slot, entry)| (entry.name().to_owned(), slot + 1))
    }

    /// 按槽位顺序遍历使用中的目录项：(槽位, 文件名, 索引节点)
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, Option<usize>)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_available())
            .map(|(slot, entry)| (slot, entry.name(), entry.inode()))
    }

    pub fn encode(&self, region_len: usize) -> Result<Vec<u8>, FsError> {
        let mut cursor = Cursor::new(Vec::with_capacity(region_len));
        for entry in &self.entries {
            entry.write(&mut cursor)?;
        }
        let mut region = cursor.into_inner();
        region.resize(region_len, 0);
        Ok(region)
    }

    pub fn decode(region: &[u8], capacity: usize, name_limit: usize) -> Result<Self, FsError> {
        let mut cursor = Cursor::new(region);
        let entries = (0..capacity)
            .map(|_| DirEntry::read(&mut cursor))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            entries,
            name_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("a.txt", 32).is_ok());
        assert!(validate_name(&"x".repeat(32), 32).is_ok());
        assert_eq!(
            validate_name(&"x".repeat(33), 32),
            Err(FsError::NameTooLong { len: 33, limit: 32 })
        );
        assert!(matches!(validate_name("", 32), Err(FsError::InvalidName(_))));
        assert!(matches!(
            validate_name("a\0b", 32),
            Err(FsError::InvalidName(_))
        ));
    }

    #[test]
    fn slots_fill_in_order() {
        let mut dir = Directory::new(3, 32);
        assert_eq!(dir.allocate_entry("a", 1), Ok(0));
        assert_eq!(dir.allocate_entry("b", 2), Ok(1));
        assert_eq!(dir.allocate_entry("c", 3), Ok(2));
        assert_eq!(
            dir.allocate_entry("d", 4),
            Err(FsError::ResourceExhausted(Resource::DirectorySlot))
        );

        assert_eq!(dir.lookup("b"), Some(2));
        assert_eq!(dir.remove_entry(2), Some(1));
        assert_eq!(dir.lookup("b"), None);
        assert_eq!(dir.remove_entry(2), None);
        assert_eq!(dir.free_slot(), Some(1));
        assert_eq!(dir.allocate_entry("e", 5), Ok(1));
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn cursor_skips_free_slots() {
        let mut dir = Directory::new(5, 32);
        dir.allocate_entry("a", 1).unwrap();
        dir.allocate_entry("b", 2).unwrap();
        dir.allocate_entry("c", 3).unwrap();
        dir.remove_entry(2);

        assert_eq!(dir.next_name(0), Some(("a".to_owned(), 1)));
        assert_eq!(dir.next_name(1), Some(("c".to_owned(), 3)));
        assert_eq!(dir.next_name(3), None);
        assert_eq!(dir.next_name(99), None);
    }

    #[test]
    fn region_round_trip() {
        let mut dir = Directory::new(16, 32);
        dir.allocate_entry("kept", 4).unwrap();
        let region = dir.encode(1024).unwrap();
        assert_eq!(region.len(), 1024);
        assert_eq!(Directory::decode(&region, 16, 32).unwrap(), dir);
    }
}
