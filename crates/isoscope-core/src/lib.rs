//! # isoscope Core
//!
//! Core traits, types, and error handling shared by the isoscope crates.
//!
//! - **ImageSource**: positioned, cursor-free reads over an image file
//! - **Filesystem**: read-only file system surface (attributes, contents, listing)
//! - **FileAttributes**: generic attribute record for one entry
//!
//! ## Example
//!
//! ```rust,no_run
//! use isoscope_core::{Filesystem, Result};
//!
//! fn summarize(fs: &dyn Filesystem) -> Result<()> {
//!     println!("Volume: {}", fs.volume_name());
//!     for entry in fs.list_directory("/")? {
//!         println!("{}", entry);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod security;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, ErrorKind, Result};
pub use security::*;
pub use traits::{Filesystem, ImageSource, ReadSeek};
pub use types::{format_size, FileAttributes};
