//! isoscope CLI - inspect ISO 9660 images without mounting them

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use isoscope_core::{format_size, sanitize_extracted_filename, Filesystem};
use isoscope_iso9660::{CaseSensitivity, GeometryMode, ImageConfig, IsoImage};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "isoscope")]
#[command(about = "Read ISO 9660 CD-ROM images without mounting them", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Read the image with positioned reads instead of memory mapping
    #[arg(long, global = true)]
    no_mmap: bool,

    /// Sector layout of the image
    #[arg(long, value_enum, default_value = "auto", global = true)]
    geometry: GeometryArg,

    /// Match names case-sensitively
    #[arg(long, global = true)]
    case_sensitive: bool,

    /// Keep ";1" version suffixes in names
    #[arg(long, global = true)]
    keep_version: bool,

    /// Use the path table to locate directories
    #[arg(long, global = true)]
    path_table: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum GeometryArg {
    Auto,
    Cooked,
    Raw1,
    Raw2,
}

#[derive(Subcommand)]
enum Command {
    /// Show volume information
    Info { image: PathBuf },

    /// List a directory
    Ls {
        image: PathBuf,
        #[arg(default_value = "/")]
        path: String,
        /// List the whole subtree
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show the attributes of one entry
    Stat { image: PathBuf, path: String },

    /// Write a file to standard output
    Cat { image: PathBuf, path: String },

    /// Copy a file out of the image
    Extract {
        image: PathBuf,
        path: String,
        /// Output file (defaults to the file's name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the SHA-256 of the extracted data
        #[arg(long)]
        sha256: bool,
    },
}

impl Cli {
    fn image_config(&self) -> ImageConfig {
        ImageConfig {
            use_mmap: !self.no_mmap,
            geometry: match self.geometry {
                GeometryArg::Auto => GeometryMode::Auto,
                GeometryArg::Cooked => GeometryMode::Cooked,
                GeometryArg::Raw1 => GeometryMode::RawMode1,
                GeometryArg::Raw2 => GeometryMode::RawMode2Form1,
            },
            case_sensitivity: if self.case_sensitive {
                CaseSensitivity::Sensitive
            } else {
                CaseSensitivity::Insensitive
            },
            strip_version: !self.keep_version,
            use_path_table: self.path_table,
            ..ImageConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = cli.image_config();
    let open = |path: &PathBuf| {
        IsoImage::open(path, config).with_context(|| format!("Failed to open {}", path.display()))
    };

    match &cli.command {
        Command::Info { image } => cmd_info(&open(image)?, cli.json),
        Command::Ls {
            image,
            path,
            recursive,
        } => cmd_ls(&open(image)?, path, *recursive, cli.json),
        Command::Stat { image, path } => cmd_stat(&open(image)?, path, cli.json),
        Command::Cat { image, path } => cmd_cat(&open(image)?, path),
        Command::Extract {
            image,
            path,
            output,
            sha256,
        } => cmd_extract(&open(image)?, path, output.clone(), *sha256),
    }
}

fn cmd_info(image: &IsoImage, json: bool) -> Result<()> {
    let pvd = image.primary_descriptor();
    let created = pvd.volume_creation_date.to_utc();
    let descriptors: Vec<String> = image
        .descriptors()
        .descriptors
        .iter()
        .map(|(sector, kind)| format!("{:?}@{}", kind, sector))
        .collect();

    if json {
        let info = serde_json::json!({
            "path": image.source_location(),
            "volume_name": image.volume_name(),
            "system_identifier": pvd.system_identifier,
            "publisher": pvd.publisher_identifier,
            "application": pvd.application_identifier,
            "image_size": image.image_size(),
            "volume_size": image.domain_size(),
            "block_size": image.block_size(),
            "geometry": image.geometry(),
            "created": created,
            "descriptors": descriptors,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("=== Volume Information ===");
    if let Some(path) = image.source_location() {
        println!("Path:        {}", path.display());
    }
    println!("Volume:      {}", image.volume_name());
    println!("System:      {}", pvd.system_identifier);
    println!("Publisher:   {}", pvd.publisher_identifier);
    println!("Application: {}", pvd.application_identifier);
    println!("Image size:  {}", format_size(image.image_size()));
    println!(
        "Volume size: {} ({} blocks)",
        format_size(image.domain_size()),
        pvd.volume_space_size
    );
    println!("Block size:  {}", image.block_size());
    println!("Geometry:    {}", image.geometry());
    if let Some(created) = created {
        println!("Created:     {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Descriptors: {}", descriptors.join(", "));

    Ok(())
}

fn cmd_ls(image: &IsoImage, path: &str, recursive: bool, json: bool) -> Result<()> {
    if recursive {
        let mut entries = Vec::new();
        for entry in image.walk(path)? {
            let entry = entry?;
            let mut attributes = image.attributes_of(&entry.record);
            attributes.name = entry.path;
            entries.push(attributes);
        }
        return print_listing(&entries, json);
    }

    let entries = image.list_directory(path)?;
    print_listing(&entries, json)
}

fn print_listing(entries: &[isoscope_core::FileAttributes], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for entry in entries {
            println!("{}", entry);
        }
    }
    Ok(())
}

fn cmd_stat(image: &IsoImage, path: &str, json: bool) -> Result<()> {
    let attributes = image.attributes_of_file(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attributes)?);
        return Ok(());
    }

    println!("Name:     {}", attributes.name);
    println!("Type:     {}", if attributes.is_directory { "directory" } else { "file" });
    println!("Size:     {} ({} bytes)", format_size(attributes.size), attributes.size);
    println!("LBA:      {}", attributes.location);
    println!("Hidden:   {}", if attributes.hidden { "yes" } else { "no" });
    println!("Flags:    0x{:02X}", attributes.attributes);
    if let Some(modified) = attributes.modified {
        println!("Modified: {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

fn cmd_cat(image: &IsoImage, path: &str) -> Result<()> {
    let mut reader = image.open_file(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut reader, &mut out)?;
    out.flush()?;
    Ok(())
}

fn cmd_extract(image: &IsoImage, path: &str, output: Option<PathBuf>, sha256: bool) -> Result<()> {
    let attributes = image.attributes_of_file(path)?;
    if attributes.is_directory {
        bail!("{} is a directory", path);
    }

    let output = match output {
        Some(output) => output,
        None => {
            let name = sanitize_extracted_filename(&attributes.name);
            if name.is_empty() {
                bail!("Cannot derive an output file name from {}", attributes.name);
            }
            PathBuf::from(name)
        }
    };

    let mut reader = image.open_file(path)?;
    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    let mut buf = vec![0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        if sha256 {
            hasher.update(&buf[..n]);
        }
        written += n as u64;
    }
    writer.flush()?;

    tracing::info!("Extracted {} to {}", path, output.display());
    println!("{} -> {} ({})", path, output.display(), format_size(written));
    if sha256 {
        println!("SHA-256: {}", hex::encode(hasher.finalize()));
    }

    Ok(())
}
