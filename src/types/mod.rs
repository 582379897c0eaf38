pub mod archive_id;

pub use archive_id::{ArchiveId, ArchiveIdGenerator};
