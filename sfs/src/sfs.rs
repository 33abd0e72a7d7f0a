//! # 卷管理层
//!
//! 构建出磁盘的布局并使用：格式化或载入卷，在内存中维护全部元数据的镜像，
//! 每次修改后整体写回；同时负责把文件的逻辑块翻译为物理块。

use std::fmt;
use std::sync::Arc;

use block_dev::BlockDevice;
use log::{debug, info};

use crate::directory::Directory;
use crate::layout::{BlockId, FreeBitmap, IndirectBlock, InodeTable, SuperBlock};
use crate::open_file::OpenFileTable;
use crate::{FsError, Geometry, Resource, DIRECT_COUNT, ROOT_INODE};

pub struct SimpleFileSystem {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) geometry: Geometry,
    pub(crate) super_block: SuperBlock,
    pub(crate) inodes: InodeTable,
    pub(crate) bitmap: FreeBitmap,
    pub(crate) directory: Directory,
    pub(crate) open_files: OpenFileTable,
}

/// 卷的使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub volume_size: usize,
    pub block_size: usize,
    pub total_blocks: usize,
    /// 元数据占用的块数
    pub metadata_blocks: usize,
    pub free_blocks: usize,
    pub files: usize,
    pub free_inodes: usize,
    pub open_files: usize,
}

impl SimpleFileSystem {
    /// `fresh`为真时格式化卷，否则载入卷上已有的元数据
    pub fn mount(
        device: Arc<dyn BlockDevice>,
        geometry: Geometry,
        fresh: bool,
    ) -> Result<Self, FsError> {
        if fresh {
            Self::format(device, geometry)
        } else {
            Self::load(device, geometry)
        }
    }

    /// 在设备上建立全新的文件系统
    pub fn format(device: Arc<dyn BlockDevice>, geometry: Geometry) -> Result<Self, FsError> {
        let mut fs = Self::empty(device, geometry)?;

        // 根目录占用保留的 0 号索引节点，指向目录区域
        fs.inodes.claim(ROOT_INODE);
        fs.inodes.get_mut(ROOT_INODE).direct[0] = Some(BlockId::new(geometry.dir_start() as u32));

        fs.persist_all()?;
        info!(
            "formatted volume: {} blocks of {} bytes, data region starts at block {}",
            geometry.block_count,
            geometry.block_size,
            geometry.data_start()
        );
        Ok(fs)
    }

    /// 从设备上载入已有的文件系统
    pub fn load(device: Arc<dyn BlockDevice>, geometry: Geometry) -> Result<Self, FsError> {
        let mut fs = Self::empty(device, geometry)?;
        fs.load_all()?;
        info!(
            "loaded volume: {} files, {} free blocks",
            fs.directory.len(),
            fs.bitmap.free_count()
        );
        Ok(fs)
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn usage(&self) -> Usage {
        let geometry = &self.geometry;
        Usage {
            volume_size: geometry.volume_size(),
            block_size: geometry.block_size,
            total_blocks: geometry.block_count,
            metadata_blocks: geometry.data_start(),
            free_blocks: self.bitmap.free_count(),
            files: self.directory.len(),
            free_inodes: self.inodes.iter().filter(|(_, inode)| !inode.is_live()).count(),
            open_files: self.open_files.len(),
        }
    }

    /// 依次写回超级块、索引节点表、位图与目录区域
    pub(crate) fn persist_all(&self) -> Result<(), FsError> {
        let g = &self.geometry;
        let bs = g.block_size;

        self.write_region(0, 1, &self.super_block.encode(bs)?)?;
        self.write_region(
            g.inode_start(),
            g.inode_blocks(),
            &self.inodes.encode(g.inode_blocks() * bs)?,
        )?;
        self.write_region(
            g.bitmap_start(),
            g.bitmap_blocks(),
            &self.bitmap.encode(g.bitmap_blocks() * bs),
        )?;
        self.write_region(
            g.dir_start(),
            g.dir_blocks,
            &self.directory.encode(g.dir_blocks * bs)?,
        )?;
        Ok(())
    }

    /// 读回全部元数据区域；枚举游标随超级块一同恢复
    fn load_all(&mut self) -> Result<(), FsError> {
        let g = self.geometry;

        let super_block = SuperBlock::decode(&self.read_region(0, 1)?)?;
        super_block.check(&g)?;

        let inodes = InodeTable::decode(
            &self.read_region(g.inode_start(), g.inode_blocks())?,
            g.inode_count,
        )?;
        if !inodes.get(ROOT_INODE).is_live() {
            return Err(FsError::Corrupt("root inode is free".into()));
        }
        let bitmap = FreeBitmap::decode(
            &self.read_region(g.bitmap_start(), g.bitmap_blocks())?,
            g.block_count,
        )?;
        let directory = Directory::decode(
            &self.read_region(g.dir_start(), g.dir_blocks)?,
            g.dir_capacity(),
            g.name_limit,
        )?;

        self.verify_references(&inodes, &directory)?;

        self.super_block = super_block;
        self.inodes = inodes;
        self.bitmap = bitmap;
        self.directory = directory;
        self.open_files = OpenFileTable::new(g.open_capacity());
        Ok(())
    }

    /// 目录项须指向使用中的索引节点，索引节点中的块编号须落在数据区内
    fn verify_references(
        &self,
        inodes: &InodeTable,
        directory: &Directory,
    ) -> Result<(), FsError> {
        let g = &self.geometry;

        for (slot, name, inode) in directory.iter() {
            match inode {
                Some(inode)
                    if inode != ROOT_INODE
                        && inode < inodes.len()
                        && inodes.get(inode).is_live() => {}
                _ => {
                    return Err(FsError::Corrupt(format!(
                        "directory slot {slot} ({name:?}) refers to inode {inode:?}"
                    )))
                }
            }
        }

        let data_region = g.data_start()..g.block_count;
        let in_data_region = |block: BlockId| data_region.contains(&block.index());
        for (id, inode) in inodes.iter() {
            if id == ROOT_INODE || !inode.is_live() {
                continue;
            }
            let mut blocks: Vec<BlockId> = inode.direct.iter().flatten().copied().collect();
            if let Some(indirect) = inode.indirect {
                if !in_data_region(indirect) {
                    return Err(FsError::Corrupt(format!(
                        "inode {id} has indirect block {indirect} outside the data region"
                    )));
                }
                blocks.extend(self.read_indirect(indirect)?.blocks());
            }
            if let Some(block) = blocks.into_iter().find(|&block| !in_data_region(block)) {
                return Err(FsError::Corrupt(format!(
                    "inode {id} points to block {block} outside the data region"
                )));
            }
        }
        Ok(())
    }

    /// 把文件的逻辑块号翻译为物理块号，必要时分配直接块、一级索引块或数据块。
    ///
    /// 所有数据块地址都经由此处获得。
    pub(crate) fn translate(
        &mut self,
        inode_id: usize,
        block_index: usize,
    ) -> Result<BlockId, FsError> {
        if block_index >= self.geometry.max_file_blocks() {
            return Err(FsError::MaxFileSizeExceeded);
        }

        /******************** 直接索引 ********************/
        if block_index < DIRECT_COUNT {
            if let Some(block) = self.inodes.get(inode_id).direct[block_index] {
                return Ok(block);
            }

            let block = self.allocate_block()?;
            self.inodes.get_mut(inode_id).direct[block_index] = Some(block);
            debug!("inode {inode_id}: direct[{block_index}] -> block {block}");
            self.persist_all()?;
            return Ok(block);
        }
        /******************** END ********************/

        /******************** 一级索引 ********************/
        // 剔去直接索引的部分
        let slot = block_index - DIRECT_COUNT;

        let Some(indirect) = self.inodes.get(inode_id).indirect else {
            // 首次越过直接索引：索引块与数据块一并分配，缺一则都不分配
            let indirect = self.allocate_block()?;
            let block = match self.allocate_block() {
                Ok(block) => block,
                Err(err) => {
                    self.bitmap.release(indirect);
                    return Err(err);
                }
            };

            let mut table = IndirectBlock::new(self.geometry.indirect_capacity());
            table.set(slot, Some(block));
            self.write_indirect(indirect, &table)?;
            self.inodes.get_mut(inode_id).indirect = Some(indirect);
            debug!("inode {inode_id}: indirect block {indirect}, slot {slot} -> block {block}");
            self.persist_all()?;
            return Ok(block);
        };

        let mut table = self.read_indirect(indirect)?;
        if let Some(block) = table.get(slot) {
            return Ok(block);
        }

        let block = self.allocate_block()?;
        table.set(slot, Some(block));
        self.write_indirect(indirect, &table)?;
        debug!("inode {inode_id}: indirect slot {slot} -> block {block}");
        self.persist_all()?;
        Ok(block)
        /******************** END ********************/
    }

    /// 文件占用的全部数据块以及一级索引块
    pub(crate) fn file_blocks(&self, inode_id: usize) -> Result<Vec<BlockId>, FsError> {
        let inode = self.inodes.get(inode_id);
        let mut blocks: Vec<BlockId> = inode.direct.iter().flatten().copied().collect();
        if let Some(indirect) = inode.indirect {
            blocks.extend(self.read_indirect(indirect)?.blocks());
            blocks.push(indirect);
        }
        Ok(blocks)
    }

    /// 在位图中归还`blocks`；索引节点本身不做修改
    pub(crate) fn release_blocks(&mut self, blocks: &[BlockId]) {
        for &block in blocks {
            self.bitmap.release(block);
        }
    }

    pub(crate) fn read_block(&self, block: BlockId, buf: &mut [u8]) -> Result<(), FsError> {
        self.device
            .read_blocks(block.index(), 1, buf)
            .map_err(FsError::from)
    }

    pub(crate) fn write_block(&self, block: BlockId, buf: &[u8]) -> Result<(), FsError> {
        self.device
            .write_blocks(block.index(), 1, buf)
            .map_err(FsError::from)
    }

    pub(crate) fn read_indirect(&self, block: BlockId) -> Result<IndirectBlock, FsError> {
        let mut buf = vec![0; self.geometry.block_size];
        self.read_block(block, &mut buf)?;
        IndirectBlock::decode(&buf)
    }
}

impl SimpleFileSystem {
    /// 元数据全部处于初始状态的卷，尚未写入设备
    fn empty(device: Arc<dyn BlockDevice>, geometry: Geometry) -> Result<Self, FsError> {
        geometry.validate()?;
        if device.block_size() != geometry.block_size {
            return Err(FsError::InvalidGeometry(
                "device block size differs from the volume block size",
            ));
        }
        if device.block_count() < geometry.block_count {
            return Err(FsError::InvalidGeometry("device smaller than the volume"));
        }

        Ok(Self {
            device,
            geometry,
            super_block: SuperBlock::new(&geometry),
            inodes: InodeTable::new(geometry.inode_count),
            bitmap: FreeBitmap::new(geometry.block_count, geometry.data_start()),
            directory: Directory::new(geometry.dir_capacity(), geometry.name_limit),
            open_files: OpenFileTable::new(geometry.open_capacity()),
        })
    }

    /// 占用编号最小的空闲块
    fn allocate_block(&mut self) -> Result<BlockId, FsError> {
        let block = self
            .bitmap
            .find_free()
            .ok_or(FsError::ResourceExhausted(Resource::DataBlock))?;
        self.bitmap.reserve(block);
        Ok(block)
    }

    fn write_indirect(&self, block: BlockId, table: &IndirectBlock) -> Result<(), FsError> {
        self.write_block(block, &table.encode()?)
    }

    fn read_region(&self, start: usize, count: usize) -> Result<Vec<u8>, FsError> {
        let mut region = vec![0; count * self.geometry.block_size];
        self.device.read_blocks(start, count, &mut region)?;
        Ok(region)
    }

    #[inline]
    fn write_region(&self, start: usize, count: usize, region: &[u8]) -> Result<(), FsError> {
        self.device
            .write_blocks(start, count, region)
            .map_err(FsError::from)
    }
}

impl fmt::Debug for SimpleFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleFileSystem")
            .field("geometry", &self.geometry)
            .field("files", &self.directory.len())
            .field("free_blocks", &self.bitmap.free_count())
            .field("open_files", &self.open_files.len())
            .finish_non_exhaustive()
    }
}
