//! # 文件操作层
//!
//! 对外提供的文件原语。读写按块推进，每一块的物理地址都由
//! [`SimpleFileSystem::translate`] 给出。

use log::{debug, info, warn};

use crate::directory::validate_name;
use crate::open_file::OpenFile;
use crate::{FileHandle, FsError, Resource, SimpleFileSystem, ROOT_INODE};

impl SimpleFileSystem {
    /// 打开文件；文件不存在时创建之。
    ///
    /// - 已打开的文件直接返回原句柄，游标不变；
    /// - 已存在的文件以追加方式打开，游标位于文件末尾；
    /// - 新文件的游标为 0。
    pub fn open(&mut self, name: &str) -> Result<FileHandle, FsError> {
        validate_name(name, self.geometry.name_limit)?;

        if let Some(inode) = self.directory.lookup(name) {
            if let Some(handle) = self.open_files.find_by_inode(inode) {
                return Ok(handle);
            }
            let size = self.inodes.get(inode).size;
            let handle = self.open_files.claim(inode, size)?;
            debug!("open {name:?}: inode {inode}, handle {handle}, offset {size}");
            return Ok(handle);
        }

        // 先确认三张表都有空位，再做修改
        let inode = self
            .inodes
            .find_free()
            .ok_or(FsError::ResourceExhausted(Resource::Inode))?;
        if self.directory.free_slot().is_none() {
            return Err(FsError::ResourceExhausted(Resource::DirectorySlot));
        }
        if !self.open_files.has_free_slot() {
            return Err(FsError::OpenLimitReached);
        }

        self.inodes.claim(inode);
        self.directory.allocate_entry(name, inode)?;
        let handle = self.open_files.claim(inode, 0)?;
        self.persist_all()?;
        info!("create {name:?}: inode {inode}, handle {handle}");
        Ok(handle)
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<(), FsError> {
        let file = self.open_files.close(handle)?;
        debug!("close handle {handle} (inode {})", file.inode);
        Ok(())
    }

    /// 从游标处写入`data`，返回实际写入的字节数。
    ///
    /// 触及文件大小上限或数据块耗尽时提前停止，返回较短的计数；
    /// 一个字节都写不进去时才返回错误。
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize, FsError> {
        let OpenFile { inode, offset } = self.open_files.get(handle)?;
        if data.is_empty() {
            return Ok(0);
        }

        let bs = self.geometry.block_size;
        let mut block = vec![0; bs];
        let mut written = 0;
        let mut stopped = None;

        while written < data.len() {
            let position = offset + written;
            let block_offset = position % bs;
            let block_id = match self.translate(inode, position / bs) {
                Ok(block_id) => block_id,
                Err(err @ (FsError::MaxFileSizeExceeded | FsError::ResourceExhausted(_))) => {
                    stopped = Some(err);
                    break;
                }
                Err(err) => return Err(err),
            };

            let chunk = (bs - block_offset).min(data.len() - written);
            // 只覆盖块的一部分时，先读出原有内容
            if chunk < bs {
                self.read_block(block_id, &mut block)?;
            }
            block[block_offset..block_offset + chunk]
                .copy_from_slice(&data[written..written + chunk]);
            self.write_block(block_id, &block)?;

            written += chunk;
        }

        if let Some(err) = stopped {
            if written == 0 {
                warn!("write to handle {handle} rejected: {err}");
                return Err(err);
            }
            warn!(
                "short write to handle {handle}: {written} of {} bytes ({err})",
                data.len()
            );
        }

        let end = offset + written;
        let disk_inode = self.inodes.get_mut(inode);
        disk_inode.size = disk_inode.size.max(end);
        self.open_files.set_offset(handle, end)?;
        self.persist_all()?;
        Ok(written)
    }

    /// 从游标处读出至多`buf.len()`字节，不越过文件末尾，返回读出的字节数
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, FsError> {
        let OpenFile { inode, offset } = self.open_files.get(handle)?;
        let size = self.inodes.get(inode).size;
        let len = buf.len().min(size.saturating_sub(offset));

        let bs = self.geometry.block_size;
        let mut block = vec![0; bs];
        let mut read = 0;

        while read < len {
            let position = offset + read;
            let block_offset = position % bs;
            let block_id = match self.translate(inode, position / bs) {
                Ok(block_id) => block_id,
                Err(err @ (FsError::MaxFileSizeExceeded | FsError::ResourceExhausted(_))) => {
                    if read == 0 {
                        return Err(err);
                    }
                    warn!("short read from handle {handle}: {read} of {len} bytes ({err})");
                    break;
                }
                Err(err) => return Err(err),
            };

            let chunk = (bs - block_offset).min(len - read);
            self.read_block(block_id, &mut block)?;
            buf[read..read + chunk].copy_from_slice(&block[block_offset..block_offset + chunk]);

            read += chunk;
        }

        self.open_files.set_offset(handle, offset + read)?;
        Ok(read)
    }

    /// 把游标移动到距文件开头`offset`字节处，不得越过文件末尾
    pub fn seek(&mut self, handle: FileHandle, offset: usize) -> Result<(), FsError> {
        let file = self.open_files.get(handle)?;
        if file.inode == ROOT_INODE {
            return Err(FsError::InvalidHandle(handle.index()));
        }

        let size = self.inodes.get(file.inode).size;
        if offset > size {
            return Err(FsError::SeekOutOfRange { offset, size });
        }
        self.open_files.set_offset(handle, offset)
    }

    /// 删除文件：清除目录项，归还全部块，重置索引节点，并强制关闭其句柄
    pub fn remove(&mut self, name: &str) -> Result<(), FsError> {
        let inode = self
            .directory
            .lookup(name)
            .ok_or_else(|| FsError::RemoveNotFound(name.to_owned()))?;

        // 先完成所有可能失败的设备读写，再修改各张表
        let blocks = self.file_blocks(inode)?;
        let zeroed = vec![0; self.geometry.block_size];
        for &block in &blocks {
            self.write_block(block, &zeroed)?;
        }

        self.directory.remove_entry(inode);
        self.release_blocks(&blocks);
        self.inodes.reset(inode);
        if let Some(handle) = self.open_files.invalidate(inode) {
            debug!("remove {name:?}: closed handle {handle}");
        }

        self.persist_all()?;
        info!("remove {name:?}: inode {inode}, released {} blocks", blocks.len());
        Ok(())
    }

    pub fn file_size(&self, name: &str) -> Result<usize, FsError> {
        self.directory
            .lookup(name)
            .map(|inode| self.inodes.get(inode).size)
            .ok_or_else(|| FsError::NotFound(name.to_owned()))
    }

    /// 按目录槽位顺序返回下一个文件名，枚举完毕时返回空。
    ///
    /// 游标保存在超级块中，跨挂载保持；用 [`Self::rewind_filenames`] 从头开始。
    pub fn next_filename(&mut self) -> Result<Option<String>, FsError> {
        let cursor = self.super_block.dir_cursor as usize;
        let Some((name, next)) = self.directory.next_name(cursor) else {
            return Ok(None);
        };

        self.super_block.dir_cursor = next as u64;
        self.persist_all()?;
        Ok(Some(name))
    }

    pub fn rewind_filenames(&mut self) -> Result<(), FsError> {
        self.super_block.dir_cursor = 0;
        self.persist_all()
    }

    /// 按目录槽位顺序列出全部文件名及大小，不移动枚举游标
    pub fn filenames(&self) -> Vec<(String, usize)> {
        self.directory
            .iter()
            .map(|(_, name, inode)| {
                let size = inode.map_or(0, |inode| self.inodes.get(inode).size);
                (name.to_owned(), size)
            })
            .collect()
    }
}
