mod block_file;
mod cli;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use log::{info, warn};
use sfs::{FsError, Geometry, SimpleFileSystem};
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command, GeometryArgs},
};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let geometry = geometry(&cli.geometry)?;

    match cli.command {
        Command::Format => {
            let fs = format(&cli.image, geometry)?;
            print_usage(&fs);
        }
        Command::Pack { source } => {
            let mut fs = format(&cli.image, geometry)?;
            let mut entries = fs::read_dir(&source)?.collect::<Result<Vec<_>, _>>()?;
            entries.sort_by_key(|entry| entry.file_name());

            for entry in entries {
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    warn!("skipping non UTF-8 file name {:?}", entry.file_name());
                    continue;
                };
                let written = put(&mut fs, &entry.path(), &name)?;
                info!("packed {name:?}: {written} bytes");
            }
            print_usage(&fs);
        }
        Command::Ls => {
            let fs = load(&cli.image, geometry)?;
            for (name, size) in fs.filenames() {
                println!("{size:>10}  {name}");
            }
        }
        Command::Put { host, name } => {
            let mut fs = load(&cli.image, geometry)?;
            let name = match name {
                Some(name) => name,
                None => host
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("cannot derive a file name from {host:?}"),
                        )
                    })?,
            };
            let written = put(&mut fs, &host, &name)?;
            println!("{name}: {written} bytes");
        }
        Command::Get { name, out } => {
            let mut fs = load(&cli.image, geometry)?;
            let data = get(&mut fs, &name)?;

            let out = out.unwrap_or_else(|| name.clone().into());
            fs::write(&out, &data)?;
            println!("{name}: {} bytes -> {out:?}", data.len());
        }
        Command::Rm { name } => {
            let mut fs = load(&cli.image, geometry)?;
            fs.remove(&name).map_err(fs_error)?;
        }
        Command::Info => {
            let fs = load(&cli.image, geometry)?;
            print_usage(&fs);
        }
        Command::Check => {
            let fs = load(&cli.image, geometry)?;
            let report = fs.check().map_err(fs_error)?;
            for problem in &report.problems {
                println!("{problem}");
            }
            if !report.is_clean() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} inconsistencies found", report.problems.len()),
                ));
            }
            println!("clean: {} blocks referenced", report.referenced_blocks);
        }
    }

    Ok(())
}

fn geometry(args: &GeometryArgs) -> io::Result<Geometry> {
    Geometry::new(
        args.block_size,
        args.block_count,
        args.inodes,
        args.dir_blocks,
    )
    .map_err(fs_error)
}

fn format(image: &Path, geometry: Geometry) -> io::Result<SimpleFileSystem> {
    let device: Arc<dyn BlockDevice> = Arc::new(BlockFile::create(
        image,
        geometry.block_size,
        geometry.block_count,
    )?);
    SimpleFileSystem::format(device, geometry).map_err(fs_error)
}

fn load(image: &Path, geometry: Geometry) -> io::Result<SimpleFileSystem> {
    let device: Arc<dyn BlockDevice> = Arc::new(BlockFile::open(image, geometry.block_size)?);
    SimpleFileSystem::load(device, geometry).map_err(fs_error)
}

/// 把宿主机文件整体写入卷中的`name`，返回写入的字节数。
///
/// 写入不会截短文件，同名文件须先删除。
fn put(fs: &mut SimpleFileSystem, host: &Path, name: &str) -> io::Result<usize> {
    let data = fs::read(host)?;
    if fs.file_size(name).is_ok() {
        fs.remove(name).map_err(fs_error)?;
        info!("replacing {name:?}");
    }

    let handle = fs.open(name).map_err(fs_error)?;
    let written = fs.write(handle, &data).map_err(fs_error)?;
    fs.close(handle).map_err(fs_error)?;

    if written < data.len() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{name:?}: only {written} of {} bytes fit", data.len()),
        ));
    }
    Ok(written)
}

/// 读出卷中`name`的全部内容
fn get(fs: &mut SimpleFileSystem, name: &str) -> io::Result<Vec<u8>> {
    let size = fs.file_size(name).map_err(fs_error)?;
    let handle = fs.open(name).map_err(fs_error)?;
    fs.seek(handle, 0).map_err(fs_error)?;

    let mut data = vec![0; size];
    let read = fs.read(handle, &mut data).map_err(fs_error)?;
    data.truncate(read);
    fs.close(handle).map_err(fs_error)?;
    Ok(data)
}

fn print_usage(fs: &SimpleFileSystem) {
    let usage = fs.usage();
    let free_bytes = (usage.free_blocks * usage.block_size) as u64;

    println!("volume size:     {}", ByteSizeIec(usage.volume_size as u64));
    println!("block size:      {}", usage.block_size);
    println!("blocks:          {}", usage.total_blocks);
    println!("metadata blocks: {}", usage.metadata_blocks);
    println!(
        "free blocks:     {} ({})",
        usage.free_blocks,
        ByteSizeIec(free_bytes)
    );
    println!("files:           {}", usage.files);
    println!("free inodes:     {}", usage.free_inodes);
}

fn fs_error(err: FsError) -> io::Error {
    let kind = match err {
        FsError::NotFound(_) | FsError::RemoveNotFound(_) => io::ErrorKind::NotFound,
        FsError::NameTooLong { .. } | FsError::InvalidName(_) | FsError::InvalidGeometry(_) => {
            io::ErrorKind::InvalidInput
        }
        FsError::Corrupt(_) => io::ErrorKind::InvalidData,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}
