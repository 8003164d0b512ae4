use base64::{engine::general_purpose::STANDARD, Engine as _};
use picker_core::MediaKind;
use url::Url;

use crate::classify::path_extension;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a data URL")]
    MissingPrefix,
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("data URL carries no bytes")]
    Empty,
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn decode_data_url(input: &str) -> Result<DataUrl, DataUrlError> {
    let rest = input
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUrlError::MissingPrefix)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPrefix)?;
    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return Err(DataUrlError::NotBase64);
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    if bytes.is_empty() {
        return Err(DataUrlError::Empty);
    }
    Ok(DataUrl {
        mime: if mime.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime.to_ascii_lowercase()
        },
        bytes,
    })
}

/// Best-effort MIME type when the server did not send one.
pub fn guess_mime(url: &str, kind: MediaKind) -> &'static str {
    let ext = Url::parse(url).ok().and_then(|url| path_extension(&url));
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("avif") => "image/avif",
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg") => "video/ogg",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => match kind {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes_payload() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.mime, "image/png");
        assert_eq!(decoded.bytes, b"\x89PNG");
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert_eq!(decode_data_url("hello"), Err(DataUrlError::MissingPrefix));
        assert_eq!(
            decode_data_url("data:text/plain,hello"),
            Err(DataUrlError::NotBase64)
        );
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(DataUrlError::Decode(_))
        ));
        assert_eq!(decode_data_url("data:image/png;base64,"), Err(DataUrlError::Empty));
    }

    #[test]
    fn guesses_mime_from_extension_then_kind() {
        assert_eq!(guess_mime("https://a.example/x.WEBM", MediaKind::Video), "video/webm");
        assert_eq!(guess_mime("https://a.example/x", MediaKind::Video), "video/mp4");
    }
}
