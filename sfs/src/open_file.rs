//! # 打开文件表
//!
//! 仅存在于内存中的定长表，句柄即槽位下标。
//! 同一索引节点最多占据一个槽位。

use derive_more::{Display, From, Into};

use crate::FsError;

/// 打开文件的句柄
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct FileHandle(usize);

impl FileHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 一个打开的文件：索引节点与读写游标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub inode: usize,
    /// 读写位置（字节偏移）
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
}

impl OpenFileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// 正在打开的文件数
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// 若`inode`已被打开，返回其句柄
    pub fn find_by_inode(&self, inode: usize) -> Option<FileHandle> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|file| file.inode == inode))
            .map(FileHandle)
    }

    #[inline]
    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// 在首个空闲槽位登记打开的文件
    pub fn claim(&mut self, inode: usize, offset: usize) -> Result<FileHandle, FsError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::OpenLimitReached)?;
        self.slots[index] = Some(OpenFile { inode, offset });
        Ok(FileHandle(index))
    }

    pub fn get(&self, handle: FileHandle) -> Result<OpenFile, FsError> {
        self.slots
            .get(handle.0)
            .copied()
            .flatten()
            .ok_or(FsError::InvalidHandle(handle.0))
    }

    pub fn set_offset(&mut self, handle: FileHandle, offset: usize) -> Result<(), FsError> {
        match self.slots.get_mut(handle.0) {
            Some(Some(file)) => {
                file.offset = offset;
                Ok(())
            }
            _ => Err(FsError::InvalidHandle(handle.0)),
        }
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<OpenFile, FsError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(FsError::InvalidHandle(handle.0))
    }

    /// 强制关闭指向`inode`的句柄，返回被关闭的句柄
    pub fn invalidate(&mut self, inode: usize) -> Option<FileHandle> {
        let handle = self.find_by_inode(inode)?;
        self.slots[handle.0] = None;
        Some(handle)
    }
}
