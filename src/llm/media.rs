use base64::{engine::general_purpose, Engine as _};

/// Sniffs the MIME type of an uploaded photo. `infer` misses HEIC brands inside the
/// ftyp box, so probe for those first.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_supported_photo(data: &[u8]) -> bool {
    detect_mime_type(data)
        .map(|mime| mime.starts_with("image/"))
        .unwrap_or(false)
}

/// Builds the `data:` URL sent to the vision model for an uploaded photo.
pub fn photo_data_url(data: &[u8]) -> String {
    let mime_type = detect_mime_type(data).unwrap_or_else(|| "image/jpeg".to_string());
    let encoded = general_purpose::STANDARD.encode(data);
    format!("data:{mime_type};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52,
    ];

    #[test]
    fn detects_png_uploads() {
        assert_eq!(detect_mime_type(PNG_HEADER).as_deref(), Some("image/png"));
        assert!(is_supported_photo(PNG_HEADER));
    }

    #[test]
    fn detects_heic_via_ftyp_probe() {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/heic"));
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(!is_supported_photo(b"just some text, not an image"));
    }

    #[test]
    fn data_url_carries_detected_mime_type() {
        let url = photo_data_url(PNG_HEADER);
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
