//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus the plain structs used to insert or transition it.

pub mod asset_archive;
pub mod generation_task;
pub mod points;
pub mod status;
