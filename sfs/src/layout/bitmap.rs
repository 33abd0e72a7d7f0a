use log::debug;

use super::BlockId;
use crate::FsError;

/// 空闲块
const FREE: u8 = b'1';
/// 已占用块
const USED: u8 = b'0';

/// 空闲块位图，每个物理块对应一个字符：`'1'`空闲，`'0'`占用。
///
/// 分配总是取编号最小的空闲块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBitmap {
    map: Vec<u8>,
}

impl FreeBitmap {
    /// 前`reserved`块（元数据区域）标记为占用，其余空闲
    pub fn new(block_count: usize, reserved: usize) -> Self {
        let mut map = vec![FREE; block_count];
        map[..reserved.min(block_count)].fill(USED);
        Self { map }
    }

    /// 寻找编号最小的空闲块；位图用尽时返回空
    pub fn find_free(&self) -> Option<BlockId> {
        self.map
            .iter()
            .position(|&flag| flag == FREE)
            .map(|index| BlockId::new(index as u32))
    }

    pub fn reserve(&mut self, id: BlockId) {
        debug!("reserve block {id}");
        self.map[id.index()] = USED;
    }

    /// 归还一个块。调用者须先清除所有指向它的索引。
    pub fn release(&mut self, id: BlockId) {
        debug!("release block {id}");
        self.map[id.index()] = FREE;
    }

    #[inline]
    pub fn is_free(&self, id: BlockId) -> bool {
        self.map.get(id.index()) == Some(&FREE)
    }

    pub fn free_count(&self) -> usize {
        self.map.iter().filter(|&&flag| flag == FREE).count()
    }

    /// 编码为位图区域，区域尾部以 0 填充
    pub fn encode(&self, region_len: usize) -> Vec<u8> {
        let mut region = self.map.clone();
        region.resize(region_len, 0);
        region
    }

    pub fn decode(region: &[u8], block_count: usize) -> Result<Self, FsError> {
        let map = region
            .get(..block_count)
            .ok_or_else(|| FsError::Corrupt("bitmap region too short".into()))?;
        if let Some(index) = map.iter().position(|&flag| flag != FREE && flag != USED) {
            return Err(FsError::Corrupt(format!(
                "bitmap entry {index} is {:#04x}",
                map[index]
            )));
        }
        Ok(Self { map: map.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_free_wins() {
        let mut bitmap = FreeBitmap::new(8, 3);
        assert_eq!(bitmap.free_count(), 5);
        assert_eq!(bitmap.find_free(), Some(BlockId::new(3)));

        bitmap.reserve(BlockId::new(3));
        bitmap.reserve(BlockId::new(4));
        assert_eq!(bitmap.find_free(), Some(BlockId::new(5)));

        bitmap.release(BlockId::new(3));
        assert!(bitmap.is_free(BlockId::new(3)));
        assert_eq!(bitmap.find_free(), Some(BlockId::new(3)));
    }

    #[test]
    fn exhaustion() {
        let mut bitmap = FreeBitmap::new(4, 2);
        bitmap.reserve(BlockId::new(2));
        bitmap.reserve(BlockId::new(3));
        assert_eq!(bitmap.find_free(), None);
        assert_eq!(bitmap.free_count(), 0);
        assert!(!bitmap.is_free(BlockId::new(9)));
    }

    #[test]
    fn character_encoding() {
        let bitmap = FreeBitmap::new(4, 1);
        assert_eq!(bitmap.encode(6), b"0111\0\0".to_vec());
        assert_eq!(FreeBitmap::decode(b"0111\0\0", 4).unwrap(), bitmap);
        assert!(matches!(
            FreeBitmap::decode(b"01x1", 4),
            Err(FsError::Corrupt(_))
        ));
        assert!(matches!(
            FreeBitmap::decode(b"01", 4),
            Err(FsError::Corrupt(_))
        ));
    }
}
