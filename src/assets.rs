//! Asset URIs and fetching.
//!
//! Photos and the music track are both addressed by URI: `file://` URIs,
//! bare paths, or `http(s)://` URLs. Remote assets are fetched with a
//! blocking [`ureq::Agent`], so callers do this off the render thread.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AssetError;

/// Largest body accepted over HTTP.
const MAX_DOWNLOAD_BYTES: u64 = 32 * 1024 * 1024;
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// HTTP agent shared by the photo and music loaders.
pub fn http_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .build();
    config.into()
}

/// Where an asset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    File(PathBuf),
    Http(String),
}

impl AssetSource {
    pub fn parse(uri: &str) -> Result<Self, AssetError> {
        if let Some(rest) = uri.strip_prefix("file://") {
            // `file:///C:/x` carries an extra slash before the drive letter.
            let path = match rest.as_bytes() {
                [b'/', _, b':', ..] => &rest[1..],
                _ => rest,
            };
            return Ok(AssetSource::File(PathBuf::from(percent_decode(path))));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(AssetSource::Http(uri.to_string()));
        }
        if uri.is_empty() || uri.contains("://") {
            return Err(AssetError::UnsupportedScheme(uri.to_string()));
        }
        Ok(AssetSource::File(PathBuf::from(uri)))
    }

    /// Read the raw bytes.
    pub fn fetch(&self, agent: &ureq::Agent) -> Result<Vec<u8>, AssetError> {
        match self {
            AssetSource::File(path) => Ok(std::fs::read(path)?),
            AssetSource::Http(url) => {
                let response = agent.get(url).call()?;
                let mut bytes = Vec::new();
                response
                    .into_body()
                    .into_reader()
                    .take(MAX_DOWNLOAD_BYTES)
                    .read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::File(path) => write!(f, "{}", path.display()),
            AssetSource::Http(url) => f.write_str(url),
        }
    }
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources() {
        assert_eq!(
            AssetSource::parse("file:///tmp/a%20b.png").unwrap(),
            AssetSource::File(PathBuf::from("/tmp/a b.png"))
        );
        assert_eq!(
            AssetSource::parse("file:///C:/photos/x.jpg").unwrap(),
            AssetSource::File(PathBuf::from("C:/photos/x.jpg"))
        );
        assert_eq!(
            AssetSource::parse("photos/x.jpg").unwrap(),
            AssetSource::File(PathBuf::from("photos/x.jpg"))
        );
        assert!(matches!(
            AssetSource::parse("https://picsum.photos/id/13/500/500").unwrap(),
            AssetSource::Http(_)
        ));
        assert!(matches!(
            AssetSource::parse("blob:abc://x"),
            Err(AssetError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_percent_decode_keeps_bad_escapes() {
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("100%zz"), "100%zz");
        assert_eq!(percent_decode("%41%42"), "AB");
    }

    #[test]
    fn test_fetch_missing_file() {
        let agent = http_agent();
        let source = AssetSource::parse("/definitely/not/here.ogg").unwrap();
        assert!(matches!(source.fetch(&agent), Err(AssetError::Io(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(AssetSource::Http("https://a/b.ogg".into()).to_string(), "https://a/b.ogg");
        assert_eq!(AssetSource::File(PathBuf::from("/x/y.png")).to_string(), "/x/y.png");
    }
}
