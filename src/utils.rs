//! Utility functions for HTTP responses and human-readable formatting

/// Extract the payload file name from an HTTP response
///
/// Tries the Content-Disposition header first (`filename=` and the RFC 5987
/// `filename*=` form), then falls back to the last segment of the URL path.
/// Unlike a display title, the extension is kept because it decides how the
/// payload is classified.
///
/// # Examples
///
/// ```ignore
/// let response = reqwest::get("https://example.com/files/730.zip").await?;
/// let name = extract_filename_from_response(&response, "https://example.com/files/730.zip");
/// // Returns Some("730.zip")
/// ```
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> Option<String> {
    if let Some(content_disposition) = response.headers().get(reqwest::header::CONTENT_DISPOSITION)
        && let Ok(value) = content_disposition.to_str()
        && let Some(name) = filename_from_content_disposition(value)
    {
        return Some(name);
    }

    filename_from_url(url)
}

/// Parse `attachment; filename="730.zip"` or `filename*=UTF-8''730.zip`
fn filename_from_content_disposition(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(raw) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename
            if let Some(idx) = raw.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&raw[idx + 1..])
            {
                return base_name(decoded.as_ref());
            }
        } else if let Some(raw) = part.strip_prefix("filename=") {
            return base_name(raw.trim_matches('"'));
        }
    }
    None
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last).ok()?;
    base_name(decoded.as_ref())
}

// Servers occasionally send a path; only the final component is meaningful
fn base_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Format a throughput value in bytes per second
///
/// ```
/// use manifest_dl::utils::format_throughput;
/// assert_eq!(format_throughput(512.0), "512 B/s");
/// assert_eq!(format_throughput(2048.0), "2.0 KB/s");
/// ```
pub fn format_throughput(bytes_per_second: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        "0 B/s".to_string()
    } else if bytes_per_second >= MB {
        format!("{:.1} MB/s", bytes_per_second / MB)
    } else if bytes_per_second >= KB {
        format!("{:.1} KB/s", bytes_per_second / KB)
    } else {
        format!("{:.0} B/s", bytes_per_second)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // =========================================================================
    // extract_filename_from_response
    // =========================================================================

    /// Helper: start a mock server, register a response, make a GET request, return the response.
    async fn mock_response(
        path_str: &str,
        template: ResponseTemplate,
    ) -> (reqwest::Response, String) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(template)
            .mount(&server)
            .await;

        let url = format!("{}{}", server.uri(), path_str);
        let resp = reqwest::get(&url).await.unwrap();
        (resp, url)
    }

    #[tokio::test]
    async fn extract_filename_from_content_disposition_quoted() {
        let (resp, url) = mock_response(
            "/download/730",
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="730.zip""#),
        )
        .await;

        assert_eq!(
            extract_filename_from_response(&resp, &url).as_deref(),
            Some("730.zip"),
            "extension must be kept"
        );
    }

    #[tokio::test]
    async fn extract_filename_from_content_disposition_rfc5987() {
        let (resp, url) = mock_response(
            "/download/730",
            ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                "attachment; filename*=UTF-8''manifest%20730.7z",
            ),
        )
        .await;

        assert_eq!(
            extract_filename_from_response(&resp, &url).as_deref(),
            Some("manifest 730.7z")
        );
    }

    #[tokio::test]
    async fn extract_filename_strips_directories_from_header() {
        let (resp, url) = mock_response(
            "/download/730",
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="../../730.lua""#),
        )
        .await;

        assert_eq!(
            extract_filename_from_response(&resp, &url).as_deref(),
            Some("730.lua")
        );
    }

    #[tokio::test]
    async fn extract_filename_falls_back_to_url_path() {
        let (resp, url) = mock_response("/repo/branch/730.lua", ResponseTemplate::new(200)).await;

        assert_eq!(
            extract_filename_from_response(&resp, &url).as_deref(),
            Some("730.lua")
        );
    }

    #[tokio::test]
    async fn extract_filename_none_for_trailing_slash() {
        let (resp, url) = mock_response("/files/", ResponseTemplate::new(200)).await;

        assert_eq!(extract_filename_from_response(&resp, &url), None);
    }

    // =========================================================================
    // format_throughput
    // =========================================================================

    #[test]
    fn format_throughput_picks_unit() {
        assert_eq!(format_throughput(0.0), "0 B/s");
        assert_eq!(format_throughput(f64::NAN), "0 B/s");
        assert_eq!(format_throughput(999.4), "999 B/s");
        assert_eq!(format_throughput(1536.0), "1.5 KB/s");
        assert_eq!(format_throughput(3.0 * 1024.0 * 1024.0), "3.0 MB/s");
    }
}
