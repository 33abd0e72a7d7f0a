use std::sync::Arc;

use block_dev::{BlockDevice, MemoryDevice};
use sfs::{FsError, Geometry, SimpleFileSystem, MAGIC};

fn device() -> Arc<MemoryDevice> {
    Arc::new(MemoryDevice::new(Geometry::BLOCK_SIZE, Geometry::BLOCK_COUNT))
}

fn block(dev: &MemoryDevice, index: usize) -> Vec<u8> {
    let mut buf = vec![0; dev.block_size()];
    dev.read_blocks(index, 1, &mut buf).unwrap();
    buf
}

fn i32_at(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn metadata_survives_remount() {
    let dev = device();
    let geometry = Geometry::default();

    {
        let mut fs = SimpleFileSystem::mount(dev.clone(), geometry, true).unwrap();
        let a = fs.open("a.txt").unwrap();
        fs.write(a, &[1; 5000]).unwrap();
        let b = fs.open("b.txt").unwrap();
        fs.write(b, &[2; 20 * 1024]).unwrap();
        fs.open("c.txt").unwrap();
        fs.remove("c.txt").unwrap();
        // 第一次会话中枚举出一个文件名
        assert_eq!(fs.next_filename(), Ok(Some("a.txt".to_owned())));
    }

    let mut fs = SimpleFileSystem::mount(dev, geometry, false).unwrap();
    assert_eq!(fs.file_size("a.txt"), Ok(5000));
    assert_eq!(fs.file_size("b.txt"), Ok(20 * 1024));
    assert!(matches!(fs.file_size("c.txt"), Err(FsError::NotFound(_))));
    assert!(fs.check().unwrap().is_clean());

    // 游标跨会话保持
    assert_eq!(fs.next_filename(), Ok(Some("b.txt".to_owned())));
    assert_eq!(fs.next_filename(), Ok(None));

    // 打开文件表不会持久化；重新打开后游标位于文件末尾
    assert_eq!(fs.usage().open_files, 0);
    let b = fs.open("b.txt").unwrap();
    fs.seek(b, 20 * 1024 - 10).unwrap();
    let mut buf = [0; 64];
    assert_eq!(fs.read(b, &mut buf).unwrap(), 10);
    assert!(buf[..10].iter().all(|&x| x == 2));
}

#[test]
fn fresh_layout_on_disk() {
    let dev = device();
    let geometry = Geometry::default();
    let mut fs = SimpleFileSystem::format(dev.clone(), geometry).unwrap();

    let super_block = block(&dev, 0);
    assert_eq!(&super_block[..8], &MAGIC.to_le_bytes());
    assert_eq!(&super_block[8..16], &1024u64.to_le_bytes());

    // 根索引节点：使用中，直接索引 0 指向目录区域
    let inodes = block(&dev, geometry.inode_start());
    assert_eq!(i32_at(&inodes, 4), 1);
    assert_eq!(i32_at(&inodes, 12), geometry.dir_start() as i32);
    assert_eq!(i32_at(&inodes, 64 + 4), 0);
    assert_eq!(i32_at(&inodes, 64 + 12), -1);

    let bitmap = block(&dev, geometry.bitmap_start());
    let data_start = geometry.data_start();
    assert!(bitmap[..data_start].iter().all(|&flag| flag == b'0'));
    assert!(bitmap[data_start..].iter().all(|&flag| flag == b'1'));

    let dir = block(&dev, geometry.dir_start());
    assert_eq!(i32_at(&dir, 56), 1);
    assert_eq!(i32_at(&dir, 60), -1);

    // 新文件取 1 号索引节点、0 号目录槽位、编号最小的两个数据块
    let handle = fs.open("a.txt").unwrap();
    fs.write(handle, &[0x61; 2000]).unwrap();

    let inodes = block(&dev, geometry.inode_start());
    assert_eq!(i32_at(&inodes, 64 + 4), 1);
    assert_eq!(i32_at(&inodes, 64 + 8), 2000);
    assert_eq!(i32_at(&inodes, 64 + 12), data_start as i32);
    assert_eq!(i32_at(&inodes, 64 + 16), data_start as i32 + 1);
    assert_eq!(i32_at(&inodes, 64 + 60), -1);

    let dir = block(&dev, geometry.dir_start());
    assert_eq!(&dir[..6], b"a.txt\0");
    assert_eq!(i32_at(&dir, 56), 0);
    assert_eq!(i32_at(&dir, 60), 1);

    let bitmap = block(&dev, geometry.bitmap_start());
    assert_eq!(&bitmap[data_start..data_start + 3], b"001");

    assert!(block(&dev, data_start).iter().all(|&b| b == 0x61));
    let image = dev.snapshot();
    assert!(image[(data_start + 2) * geometry.block_size..]
        .iter()
        .all(|&b| b == 0));

    // 删除后位图复原，数据块被清零
    fs.remove("a.txt").unwrap();
    let bitmap = block(&dev, geometry.bitmap_start());
    assert_eq!(&bitmap[data_start..data_start + 3], b"111");
    assert!(block(&dev, data_start).iter().all(|&b| b == 0));
}

#[test]
fn refuses_unformatted_device() {
    let dev = device();
    assert!(matches!(
        SimpleFileSystem::load(dev, Geometry::default()),
        Err(FsError::Corrupt(_))
    ));
}

#[test]
fn refuses_mismatched_geometry() {
    let dev = device();
    SimpleFileSystem::format(dev.clone(), Geometry::default()).unwrap();

    let other = Geometry {
        inode_count: 96,
        ..Geometry::default()
    };
    assert!(matches!(
        SimpleFileSystem::load(dev, other),
        Err(FsError::Corrupt(_))
    ));

    let small_blocks = Arc::new(MemoryDevice::new(512, Geometry::BLOCK_COUNT));
    assert!(matches!(
        SimpleFileSystem::format(small_blocks, Geometry::default()),
        Err(FsError::InvalidGeometry(_))
    ));

    let too_small = Arc::new(MemoryDevice::new(Geometry::BLOCK_SIZE, 100));
    assert!(matches!(
        SimpleFileSystem::format(too_small, Geometry::default()),
        Err(FsError::InvalidGeometry(_))
    ));
}

#[test]
fn independent_volumes() {
    let mut first = SimpleFileSystem::format(device(), Geometry::default()).unwrap();
    let mut second = SimpleFileSystem::format(device(), Geometry::default()).unwrap();

    let handle = first.open("only-here").unwrap();
    first.write(handle, b"data").unwrap();

    assert_eq!(first.file_size("only-here"), Ok(4));
    assert!(matches!(
        second.file_size("only-here"),
        Err(FsError::NotFound(_))
    ));
    assert_eq!(second.next_filename(), Ok(None));
}

/// 含一个 14 块文件（用到一级索引）的卷
fn volume_with_file() -> Arc<MemoryDevice> {
    let dev = device();
    let mut fs = SimpleFileSystem::format(dev.clone(), Geometry::default()).unwrap();
    let handle = fs.open("a").unwrap();
    fs.write(handle, &[3; 14 * 1024]).unwrap();
    dev
}

fn patch_i32(dev: &MemoryDevice, index: usize, offset: usize, value: i32) {
    let mut buf = block(dev, index);
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    dev.write_blocks(index, 1, &buf).unwrap();
}

#[test]
fn refuses_dangling_references() {
    let geometry = Geometry::default();
    let data_start = geometry.data_start();
    let inode_block = geometry.inode_start();
    let dir_block = geometry.dir_start();

    let cases: [(&str, usize, usize, i32); 6] = [
        ("entry beyond the inode table", dir_block, 60, 5000),
        ("entry to a free inode", dir_block, 60, 7),
        ("entry to the root inode", dir_block, 60, 0),
        ("direct pointer beyond the volume", inode_block, 64 + 12, 100_000),
        ("indirect pointer into metadata", inode_block, 64 + 60, 3),
        ("indirect slot beyond the volume", data_start + 12, 4, 4096),
    ];

    for (what, index, offset, value) in cases {
        let dev = volume_with_file();
        assert!(SimpleFileSystem::load(dev.clone(), geometry).is_ok());

        patch_i32(&dev, index, offset, value);
        assert!(
            matches!(
                SimpleFileSystem::load(dev, geometry),
                Err(FsError::Corrupt(_))
            ),
            "{what}"
        );
    }
}
