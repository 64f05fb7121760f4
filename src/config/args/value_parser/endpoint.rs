use url::Url;

const INVALID_SCHEME: &str = "URL scheme must be https:// or http://";

pub fn check_scheme(url: &str) -> Result<String, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("endpoint URL has no host: {url}"));
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert_eq!(
            check_scheme("http://localhost:9000").unwrap(),
            "http://localhost:9000"
        );
        assert!(check_scheme("https://s3.example.com").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(
            check_scheme("ftp://example.com").unwrap_err(),
            INVALID_SCHEME
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(check_scheme("not a url").is_err());
    }
}
