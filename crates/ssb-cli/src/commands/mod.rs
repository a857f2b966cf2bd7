//! One module per CLI subcommand group: `drive`, directory/file operations
//! (`fs`), and networking (`net`).

pub mod drive;
pub mod fs;
pub mod net;
