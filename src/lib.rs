//! A FAT12 disk image inspector.
//!
//! The crate decodes the boot sector geometry, unpacks the 12-bit allocation table and walks the
//! directory tree of a FAT12 image, handing every entry and the text of `README` files to a
//! [`Visitor`].
//!
//! # Usage
//!
//! ```no_run
//! use fat12dump::{FileSystem, Listing, WalkOptions};
//!
//! # fn main() -> Result<(), fat12dump::Error> {
//! let fs = FileSystem::open("floppy.img", WalkOptions::new())?;
//! let mut listing = Listing::new();
//! fs.walk(&mut listing)?;
//! for entry in listing.entries() {
//!     println!("{:indent$}{}", "", entry.file_name(), indent = entry.depth() * 3);
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

mod boot_sector;
mod dir;
mod dir_entry;
mod error;
mod fs;
mod io;
mod table;
mod time;

pub use crate::boot_sector::*;
pub use crate::dir::*;
pub use crate::dir_entry::*;
pub use crate::error::*;
pub use crate::fs::*;
pub use crate::io::ReadSeek;
pub use crate::table::*;
pub use crate::time::*;
