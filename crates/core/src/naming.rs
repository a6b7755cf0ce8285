//! Object key convention for archived generation outputs.

use crate::channels::MediaType;
use crate::types::TaskId;

/// Build the object key an archived asset is stored under.
///
/// Convention: `ai/{media}/{model}/{owner}/{task_id}-{index}.{ext}`
///
/// The key is a pure function of its inputs, so re-archiving the same asset
/// always lands on the same object.
///
/// ```
/// use mediagen_core::channels::MediaType;
/// use mediagen_core::naming::archive_key;
///
/// let id = uuid::Uuid::nil();
/// assert_eq!(
///     archive_key(MediaType::Video, "kling-v2-1", "u1", id, 0, "mp4"),
///     "ai/video/kling-v2-1/u1/00000000-0000-0000-0000-000000000000-0.mp4",
/// );
/// ```
pub fn archive_key(
    media_type: MediaType,
    model: &str,
    owner_id: &str,
    task_id: TaskId,
    index: usize,
    extension: &str,
) -> String {
    format!(
        "ai/{}/{}/{}/{}-{}.{}",
        media_type.name(),
        sanitize_segment(model),
        sanitize_segment(owner_id),
        task_id,
        index,
        extension.trim_start_matches('.'),
    )
}

/// Keep a path segment from introducing extra directories.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
