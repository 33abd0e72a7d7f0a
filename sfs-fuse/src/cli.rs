use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sfs::Geometry;

#[derive(Parser)]
pub struct Cli {
    /// Volume image file
    #[arg(long, short)]
    pub image: PathBuf,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GeometryArgs {
    /// Bytes per block
    #[arg(long, default_value_t = Geometry::BLOCK_SIZE)]
    pub block_size: usize,

    /// Blocks in the volume
    #[arg(long, default_value_t = Geometry::BLOCK_COUNT)]
    pub block_count: usize,

    /// Inodes, including the reserved root
    #[arg(long, default_value_t = Geometry::INODE_COUNT)]
    pub inodes: usize,

    /// Blocks reserved for the directory
    #[arg(long, default_value_t = Geometry::DIR_BLOCKS)]
    pub dir_blocks: usize,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a fresh, empty volume
    Format,

    /// Create a fresh volume holding every regular file of a host directory
    Pack {
        #[arg(long, short)]
        source: PathBuf,
    },

    /// List files and their sizes
    Ls,

    /// Copy a host file into the volume
    Put {
        host: PathBuf,

        /// Name inside the volume, defaults to the host file name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Copy a file out of the volume
    Get {
        name: String,

        /// Host path, defaults to the file name in the current directory
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Remove a file
    Rm { name: String },

    /// Show volume usage
    Info,

    /// Verify bitmap, inode and directory consistency
    Check,
}
