#[derive(Debug, thiserror::Error)]
#[error("{status_code} status code")]
pub struct ServerError {
    pub status_code: u16,
}

pub fn check_status(res: &reqwest::Response) -> Result<(), ServerError> {
    let status = res.status();
    if !status.is_success() {
        return Err(ServerError {
            status_code: status.as_u16(),
        });
    }
    Ok(())
}

/// Base URL of a workspace. Bare hostnames get `https://`.
pub fn workspace_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_owned()
    } else {
        format!("https://{}", host)
    }
}

/// Files API URL for a path such as `/Volumes/catalog/schema/volume/file.pmtiles`.
///
/// Each path segment is percent-encoded.
pub fn files_url(host: &str, file_path: &str) -> String {
    let path = file_path
        .trim_start_matches('/')
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "{workspace}/api/2.0/fs/files/{path}",
        workspace = workspace_url(host),
        path = path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_url_adds_scheme() {
        assert_eq!(workspace_url("adb-1.net"), "https://adb-1.net");
        assert_eq!(workspace_url("https://adb-1.net/"), "https://adb-1.net");
        assert_eq!(workspace_url("http://127.0.0.1:9000"), "http://127.0.0.1:9000");
    }

    #[test]
    fn files_url_joins_path() {
        let expected = "https://adb-1.net/api/2.0/fs/files/Volumes/x/y/z.pmtiles";
        assert_eq!(files_url("adb-1.net", "/Volumes/x/y/z.pmtiles"), expected);
        assert_eq!(files_url("adb-1.net", "Volumes/x/y/z.pmtiles"), expected);
    }

    #[test]
    fn files_url_encodes_segments() {
        assert_eq!(
            files_url("adb-1.net", "/Volumes/x/my files/a?b#c.pmtiles"),
            "https://adb-1.net/api/2.0/fs/files/Volumes/x/my%20files/a%3Fb%23c.pmtiles"
        );
    }
}
