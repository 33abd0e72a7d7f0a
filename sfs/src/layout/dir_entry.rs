use binrw::{BinRead, BinWrite};

/// 文件名字段的宽度，最后一字节留给 \0
pub const NAME_FIELD_LEN: usize = 56;

/// 目录项：文件名、是否空闲、索引节点编号
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DirEntry {
    name: [u8; NAME_FIELD_LEN],
    #[br(map = |raw: i32| raw != 0)]
    #[bw(map = |available: &bool| i32::from(*available))]
    available: bool,
    #[br(map = |raw: i32| usize::try_from(raw).ok())]
    #[bw(map = |inode: &Option<usize>| inode.map_or(-1, |id| id as i32))]
    inode: Option<usize>,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            name: [0; NAME_FIELD_LEN],
            available: true,
            inode: None,
        }
    }
}

impl DirEntry {
    /// 目录项大小恒为64字节
    pub const SIZE: usize = 64;

    /// 调用者须保证`name`不超过[`NAME_FIELD_LEN`]` - 1`字节
    pub fn new(name: &str, inode: usize) -> Self {
        let bytes = name.as_bytes();
        let mut field = [0; NAME_FIELD_LEN];
        field[..bytes.len()].copy_from_slice(bytes);

        Self {
            name: field,
            available: false,
            inode: Some(inode),
        }
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_FIELD_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// 使用中的目录项所指的索引节点
    #[inline]
    pub fn inode(&self) -> Option<usize> {
        if self.available {
            None
        } else {
            self.inode
        }
    }
}
