use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};

use crate::chat::Attachment;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A picked file, split by whether it can be shown to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedFile {
    Image(Vec<u8>),
    Attachment(Attachment),
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttachmentError {
    #[snafu(display("failed to read selected file {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn load_selected_file(path: &Path) -> Result<SelectedFile, AttachmentError> {
    let data = std::fs::read(path).context(ReadFileSnafu {
        stage: "read-selected-file",
        path: path.to_path_buf(),
    })?;

    Ok(classify_file(path, data))
}

/// Image bytes are recognised by content, not by extension.
pub fn classify_file(path: &Path, data: Vec<u8>) -> SelectedFile {
    if image::guess_format(&data).is_ok() {
        return SelectedFile::Image(data);
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    SelectedFile::Attachment(Attachment::new(name, data, mime_type_for(path)))
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => DEFAULT_MIME_TYPE,
    }
}
