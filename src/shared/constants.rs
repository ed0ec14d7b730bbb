/// Part size used when streaming uploads of unknown length (10 MiB)
pub const UPLOAD_PART_SIZE: usize = 10 * 1024 * 1024;

/// Default presigned URL lifetime: 7 days, the longest S3 accepts
pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u32 = 7 * 24 * 60 * 60;

/// Keys requested per ListObjectsV2 page
pub const LIST_OBJECTS_PAGE_SIZE: usize = 1000;

/// Content type sent when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
