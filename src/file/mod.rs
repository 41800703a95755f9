//! File storage: blob store, folders, metadata and the upload/download
//! gateway.

pub mod folder;
pub mod metadata;
pub mod service;
pub mod storage;

pub use service::FileService;
pub use storage::BlobStore;

/// Extensions accepted for upload, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "odt", "ods", "odp",
    // archives
    "zip", "rar", "7z", "tar", "gz",
    // audio
    "mp3", "wav", "ogg", "flac", "aac",
    // video
    "mp4", "avi", "mov", "wmv", "flv", "mkv",
    // other
    "csv", "json", "xml", "html", "htm", "js", "css", "py", "php",
];

/// Lowercased extension of a filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Whether a filename carries an accepted extension.
pub fn is_allowed_filename(filename: &str) -> bool {
    match extension_of(filename) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}
