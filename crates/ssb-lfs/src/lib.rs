//! The logical filesystem: directories and files expressed as nested
//! tangles, built on `ssb-tangle`.

pub mod drive;
pub mod entries;
pub mod error;
pub mod lfs;
pub mod listing;

pub use drive::{discover_drives, drive_uuid};
pub use entries::DirEntry;
pub use error::LfsError;
pub use lfs::Drive;
pub use listing::{items, ListedEntry};
