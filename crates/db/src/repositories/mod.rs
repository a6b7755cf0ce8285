//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or a `&mut PgConnection` when the call must join an
//! enclosing transaction) as the first argument.

pub mod asset_archive_repo;
pub mod generation_task_repo;
pub mod points_repo;

pub use asset_archive_repo::AssetArchiveRepo;
pub use generation_task_repo::GenerationTaskRepo;
pub use points_repo::PointsRepo;
