//! # 一致性检查
//!
//! 对照内存中的元数据镜像核对：
//! - 每个被引用的块都已在位图中标记占用，且只被引用一次；
//! - 位图中占用的数据块都有引用者；
//! - 文件大小与已分配的数据块数相符；
//! - 目录项与索引节点一一对应，文件名不重复。

use std::collections::HashSet;

use derive_more::Display;

use crate::layout::{BlockId, DiskInode};
use crate::{FsError, SimpleFileSystem, DIRECT_COUNT, ROOT_INODE};

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// 位图标记占用，但没有任何结构引用
    #[display(fmt = "block {} is marked used but unreferenced", _0)]
    LeakedBlock(BlockId),
    /// 被引用，但位图标记空闲
    #[display(fmt = "block {} is referenced but marked free", _0)]
    UnmarkedBlock(BlockId),
    #[display(fmt = "block {} is referenced more than once", _0)]
    SharedBlock(BlockId),
    #[display(fmt = "inode {} points outside the data region: block {}", inode, block)]
    PointerOutOfRange { inode: usize, block: BlockId },
    #[display(fmt = "inode {} has {} bytes but {} data blocks", inode, size, blocks)]
    SizeMismatch {
        inode: usize,
        size: usize,
        blocks: usize,
    },
    /// 一级索引中有块而直接索引尚未填满
    #[display(fmt = "inode {} has holes in its block pointers", _0)]
    Sparse(usize),
    #[display(fmt = "directory slot {} refers to a free or invalid inode", _0)]
    DanglingEntry(usize),
    #[display(fmt = "inode {} is referenced by several directory entries", _0)]
    DuplicateInode(usize),
    #[display(fmt = "file name {:?} appears more than once", _0)]
    DuplicateName(String),
    #[display(fmt = "inode {} is in use but has no directory entry", _0)]
    OrphanInode(usize),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub problems: Vec<Inconsistency>,
    /// 被文件占用的数据块与索引块个数
    pub referenced_blocks: usize,
}

impl CheckReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

impl SimpleFileSystem {
    pub fn check(&self) -> Result<CheckReport, FsError> {
        let g = &self.geometry;
        let mut report = CheckReport::default();
        let mut referenced = vec![false; g.block_count];

        let mut claim = |report: &mut CheckReport, inode: usize, block: BlockId| {
            if block.index() < g.data_start() || block.index() >= g.block_count {
                report
                    .problems
                    .push(Inconsistency::PointerOutOfRange { inode, block });
                return false;
            }
            if referenced[block.index()] {
                report.problems.push(Inconsistency::SharedBlock(block));
            } else {
                referenced[block.index()] = true;
                report.referenced_blocks += 1;
            }
            true
        };

        for (id, inode) in self.inodes.iter() {
            if id == ROOT_INODE || !inode.is_live() {
                continue;
            }

            let mut data_blocks = 0;
            for &block in inode.direct.iter().flatten() {
                claim(&mut report, id, block);
                data_blocks += 1;
            }

            if let Some(indirect) = inode.indirect {
                if claim(&mut report, id, indirect) {
                    for block in self.read_indirect(indirect)?.blocks() {
                        claim(&mut report, id, block);
                        data_blocks += 1;
                    }
                }
                if inode.direct.iter().any(Option::is_none) {
                    report.problems.push(Inconsistency::Sparse(id));
                }
            }

            let expected = DiskInode::count_data_block(inode.size, g.block_size);
            let filled = inode.direct.iter().take_while(|ptr| ptr.is_some()).count();
            if data_blocks != expected {
                report.problems.push(Inconsistency::SizeMismatch {
                    inode: id,
                    size: inode.size,
                    blocks: data_blocks,
                });
            } else if inode.indirect.is_none() && filled < expected.min(DIRECT_COUNT) {
                report.problems.push(Inconsistency::Sparse(id));
            }
        }

        for (index, &is_referenced) in referenced.iter().enumerate() {
            let block = BlockId::new(index as u32);
            let used = !self.bitmap.is_free(block);
            let metadata = index < g.data_start();
            if used && !metadata && !is_referenced {
                report.problems.push(Inconsistency::LeakedBlock(block));
            } else if !used && (metadata || is_referenced) {
                report.problems.push(Inconsistency::UnmarkedBlock(block));
            }
        }

        let mut names = HashSet::new();
        let mut owners = HashSet::new();
        for (slot, name, inode) in self.directory.iter() {
            match inode {
                Some(inode)
                    if inode != ROOT_INODE
                        && inode < self.inodes.len()
                        && self.inodes.get(inode).is_live() =>
                {
                    if !owners.insert(inode) {
                        report.problems.push(Inconsistency::DuplicateInode(inode));
                    }
                }
                _ => report.problems.push(Inconsistency::DanglingEntry(slot)),
            }
            if !names.insert(name) {
                report
                    .problems
                    .push(Inconsistency::DuplicateName(name.to_owned()));
            }
        }

        for (id, inode) in self.inodes.iter() {
            if id != ROOT_INODE && inode.is_live() && !owners.contains(&id) {
                report.problems.push(Inconsistency::OrphanInode(id));
            }
        }

        Ok(report)
    }
}
