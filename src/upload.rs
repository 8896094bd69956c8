//! Attachment uploader (C4): URL-referenced and inline-bytes upload modes,
//! grounded on `base.py::post_message_attachment`/`_make_file_attachment_request`.

use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::Client;

use crate::error::UploadError;

#[derive(Debug, Clone)]
pub struct UploadedAttachment {
    pub attachment_url: String,
    pub mime_type: String,
    /// Present only for inline uploads; the caller announces this ref to
    /// the peer via a `file` event before referencing it in response text.
    pub inline_ref: Option<String>,
}

/// What to upload: exactly one of a remote URL or raw bytes.
pub enum UploadSource<'a> {
    Url {
        download_url: &'a str,
        download_filename: Option<&'a str>,
    },
    Bytes {
        filename: &'a str,
        content_type: Option<&'a str>,
        bytes: Vec<u8>,
    },
}

pub struct Uploader {
    client: Client,
    endpoint: String,
    access_key: String,
    max_attempts: u32,
}

impl Uploader {
    pub fn new(client: Client, endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Upload `source`, retrying `max_attempts` times on transport or
    /// non-200 failures. `is_inline` selects whether an `inline_ref` is
    /// minted for ordering-sensitive announcement by the server dispatcher.
    pub async fn upload(
        &self,
        source: UploadSource<'_>,
        is_inline: bool,
    ) -> Result<UploadedAttachment, UploadError> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match self.try_upload(&source).await {
                Ok((attachment_url, mime_type)) => {
                    let inline_ref = is_inline.then(generate_inline_ref);
                    return Ok(UploadedAttachment {
                        attachment_url,
                        mime_type,
                        inline_ref,
                    });
                }
                Err(err) => {
                    log::warn!(
                        "attachment upload attempt {attempt}/{} failed: {err}",
                        self.max_attempts
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }

    async fn try_upload(&self, source: &UploadSource<'_>) -> Result<(String, String), UploadError> {
        let request = match source {
            UploadSource::Url {
                download_url,
                download_filename,
            } => {
                let mut form = vec![("download_url", download_url.to_string())];
                if let Some(filename) = download_filename {
                    form.push(("download_filename", filename.to_string()));
                }
                self.client
                    .post(&self.endpoint)
                    .header("Authorization", &self.access_key)
                    .form(&form)
            }
            UploadSource::Bytes {
                filename,
                content_type,
                bytes,
            } => {
                let mut part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.to_string());
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(content_type)
                        .map_err(|_| UploadError::InvalidParameter(format!("invalid content type: {content_type}")))?;
                }
                let form = reqwest::multipart::Form::new().part("file", part);
                self.client
                    .post(&self.endpoint)
                    .header("Authorization", &self.access_key)
                    .multipart(form)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::UploadFailed {
                status: status.as_u16(),
                body,
            });
        }
        let body: UploadResponseBody = response.json().await?;
        Ok((body.attachment_url, body.mime_type))
    }
}

#[derive(serde::Deserialize)]
struct UploadResponseBody {
    attachment_url: String,
    mime_type: String,
}

/// Validate the two upload modes are mutually exclusive before calling
/// [`Uploader::upload`]; mirrors `base.py`'s conflicting-parameter check.
pub fn validate_upload_request(
    download_url: Option<&str>,
    file_data: Option<&[u8]>,
    filename: Option<&str>,
) -> Result<(), UploadError> {
    match (download_url, file_data) {
        (Some(_), Some(_)) => Err(UploadError::InvalidParameter(
            "cannot specify both download_url and file_data".to_string(),
        )),
        (None, None) => Err(UploadError::InvalidParameter(
            "must specify either download_url or file_data".to_string(),
        )),
        (None, Some(_)) if filename.is_none() => Err(UploadError::InvalidParameter(
            "filename is required when uploading file_data".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Fallback filename for a URL upload with no explicit filename hint: the
/// last percent-decoded path segment, or `"downloaded_file"`.
pub fn default_filename_for_url(url: &str) -> String {
    let decoded = percent_decode(url);
    decoded
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded_file".to_string())
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(value) = u8::from_str_radix(hex, 16) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn generate_inline_ref() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_ref_is_eight_alphanumeric_chars() {
        let reference = generate_inline_ref();
        assert_eq!(reference.len(), 8);
        assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn default_filename_falls_back_when_path_is_empty() {
        assert_eq!(default_filename_for_url("https://example.com/"), "downloaded_file");
    }

    #[test]
    fn default_filename_uses_last_segment() {
        assert_eq!(default_filename_for_url("https://example.com/a/report.pdf"), "report.pdf");
    }

    #[test]
    fn default_filename_percent_decodes() {
        assert_eq!(
            default_filename_for_url("https://example.com/a%20b.txt"),
            "a b.txt"
        );
    }

    #[test]
    fn validate_rejects_both_sources() {
        let result = validate_upload_request(Some("https://x"), Some(&[1, 2]), Some("a.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_neither_source() {
        assert!(validate_upload_request(None, None, None).is_err());
    }

    #[test]
    fn validate_requires_filename_for_bytes() {
        assert!(validate_upload_request(None, Some(&[1, 2]), None).is_err());
    }

    #[test]
    fn validate_accepts_url_without_filename() {
        assert!(validate_upload_request(Some("https://x"), None, None).is_ok());
    }
}
