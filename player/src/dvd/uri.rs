//! `dvd://` URI parsing

use common::DVD_SCHEME;

/// A parsed `dvd://<device>[#<chapter>]` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvdUri<'a> {
    /// Device node (or image path) the disc is read from
    pub device: &'a str,

    /// Chapter suffix after `#`, when it is a number
    pub chapter: Option<u32>,
}

impl<'a> DvdUri<'a> {
    /// Parse a URI, returning `None` when it is not a DVD URI
    pub fn parse(uri: &'a str) -> Option<Self> {
        let rest = uri.strip_prefix(DVD_SCHEME)?;

        let (device, chapter) = match rest.split_once('#') {
            Some((device, suffix)) => (device, suffix.trim().parse().ok()),
            None => (rest, None),
        };

        Some(Self { device, chapter })
    }
}

/// Whether a URI uses the `dvd://` scheme
pub fn is_dvd_uri(uri: &str) -> bool {
    uri.starts_with(DVD_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_only() {
        let uri = DvdUri::parse("dvd:///dev/sr0").unwrap();
        assert_eq!(uri.device, "/dev/sr0");
        assert_eq!(uri.chapter, None);
    }

    #[test]
    fn test_parse_with_chapter() {
        let uri = DvdUri::parse("dvd:///dev/sr0#2").unwrap();
        assert_eq!(uri.device, "/dev/sr0");
        assert_eq!(uri.chapter, Some(2));
    }

    #[test]
    fn test_parse_non_numeric_chapter() {
        let uri = DvdUri::parse("dvd:///dev/sr0#intro").unwrap();
        assert_eq!(uri.device, "/dev/sr0");
        assert_eq!(uri.chapter, None);
    }

    #[test]
    fn test_parse_empty_device() {
        let uri = DvdUri::parse("dvd://").unwrap();
        assert_eq!(uri.device, "");
        assert_eq!(uri.chapter, None);
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(DvdUri::parse("file:///music/a.ogg").is_none());
        assert!(DvdUri::parse("cdda://1#/dev/sr0").is_none());
        assert!(DvdUri::parse("").is_none());
        assert!(!is_dvd_uri("DVD:///dev/sr0"));
        assert!(is_dvd_uri("dvd:///dev/sr0"));
    }
}
