//! # sfs
//!
//! 建立在块设备之上的单卷、扁平命名空间文件系统。
//!
//! 磁盘布局：
//! 超级块 | 索引节点表 | 空闲块位图 | 目录区域 | 数据块区域

/* sfs 的整体架构，自上而下 */

// 文件操作层：打开、关闭、读写、定位、删除、枚举
mod file;

// 一致性检查：核对位图、索引节点与目录之间的约束
mod check;

// 卷管理层：挂载、持久化以及逻辑块到物理块的翻译
mod sfs;

// 目录层：文件名到索引节点的扁平映射
mod directory;

// 打开文件表：会话内的文件句柄
mod open_file;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;

// 卷的几何参数
mod config;

mod error;

pub use block_dev::{BlockDevice, DeviceError};

pub use self::{
    check::{CheckReport, Inconsistency},
    config::Geometry,
    error::{FsError, Resource},
    layout::BlockId,
    open_file::FileHandle,
    sfs::{SimpleFileSystem, Usage},
};

/// 超级块魔数
pub const MAGIC: u64 = 0xACBD_0005;

/// 每个索引节点的直接索引个数
pub const DIRECT_COUNT: usize = 12;

/// 根目录所占的保留索引节点
pub const ROOT_INODE: usize = 0;
