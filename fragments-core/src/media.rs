/*!
Supported media types.

A fragment's type is a full media type string (possibly carrying parameters
such as `charset`), but every decision in this crate is made on the base
type alone, resolved to a [`MediaKind`].
*/

use mime::Mime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of media types a fragment may be stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    Plain,
    Markdown,
    Html,
    Csv,
    Json,
    Yaml,
    Png,
    Jpeg,
    Webp,
    Gif,
    Avif,
}

impl MediaKind {
    pub const ALL: [MediaKind; 11] = [
        MediaKind::Plain,
        MediaKind::Markdown,
        MediaKind::Html,
        MediaKind::Csv,
        MediaKind::Json,
        MediaKind::Yaml,
        MediaKind::Png,
        MediaKind::Jpeg,
        MediaKind::Webp,
        MediaKind::Gif,
        MediaKind::Avif,
    ];

    pub const IMAGES: [MediaKind; 5] = [
        MediaKind::Png,
        MediaKind::Jpeg,
        MediaKind::Webp,
        MediaKind::Gif,
        MediaKind::Avif,
    ];

    /// Resolve a full media type string, ignoring any parameters.
    ///
    /// Returns `None` for unparseable or unsupported values.
    pub fn parse(value: &str) -> Option<Self> {
        let mime: Mime = value.trim().parse().ok()?;
        Self::from_essence(&mime.essence_str().to_ascii_lowercase())
    }

    fn from_essence(essence: &str) -> Option<Self> {
        let kind = match essence {
            "text/plain" => MediaKind::Plain,
            "text/markdown" => MediaKind::Markdown,
            "text/html" => MediaKind::Html,
            "text/csv" => MediaKind::Csv,
            "application/json" => MediaKind::Json,
            "application/yaml" | "application/x-yaml" | "text/yaml" => MediaKind::Yaml,
            "image/png" => MediaKind::Png,
            "image/jpeg" => MediaKind::Jpeg,
            "image/webp" => MediaKind::Webp,
            "image/gif" => MediaKind::Gif,
            "image/avif" => MediaKind::Avif,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolve a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext.to_ascii_lowercase().as_str() {
            "txt" => MediaKind::Plain,
            "md" => MediaKind::Markdown,
            "html" => MediaKind::Html,
            "csv" => MediaKind::Csv,
            "json" => MediaKind::Json,
            "yaml" | "yml" => MediaKind::Yaml,
            "png" => MediaKind::Png,
            "jpg" | "jpeg" => MediaKind::Jpeg,
            "webp" => MediaKind::Webp,
            "gif" => MediaKind::Gif,
            "avif" => MediaKind::Avif,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical media type
    pub fn media_type(&self) -> &'static str {
        match self {
            MediaKind::Plain => "text/plain",
            MediaKind::Markdown => "text/markdown",
            MediaKind::Html => "text/html",
            MediaKind::Csv => "text/csv",
            MediaKind::Json => "application/json",
            MediaKind::Yaml => "application/yaml",
            MediaKind::Png => "image/png",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Webp => "image/webp",
            MediaKind::Gif => "image/gif",
            MediaKind::Avif => "image/avif",
        }
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Plain => "txt",
            MediaKind::Markdown => "md",
            MediaKind::Html => "html",
            MediaKind::Csv => "csv",
            MediaKind::Json => "json",
            MediaKind::Yaml => "yaml",
            MediaKind::Png => "png",
            MediaKind::Jpeg => "jpg",
            MediaKind::Webp => "webp",
            MediaKind::Gif => "gif",
            MediaKind::Avif => "avif",
        }
    }

    pub fn is_image(&self) -> bool {
        Self::IMAGES.contains(self)
    }

    pub fn is_text(&self) -> bool {
        !self.is_image()
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_types_are_supported() {
        for value in [
            "text/plain",
            "text/markdown",
            "text/html",
            "text/csv",
            "application/json",
            "application/yaml",
        ] {
            let kind = MediaKind::parse(value).expect("supported text type");
            assert!(kind.is_text(), "{value} should be text");
        }
    }

    #[test]
    fn test_image_types_are_supported() {
        for value in ["image/png", "image/jpeg", "image/webp", "image/gif", "image/avif"] {
            let kind = MediaKind::parse(value).expect("supported image type");
            assert!(kind.is_image(), "{value} should be an image");
        }
    }

    #[test]
    fn test_parameters_are_ignored() {
        assert_eq!(
            MediaKind::parse("text/plain; charset=utf-8"),
            Some(MediaKind::Plain)
        );
        assert_eq!(
            MediaKind::parse("Text/HTML; charset=ISO-8859-1"),
            Some(MediaKind::Html)
        );
    }

    #[test]
    fn test_unsupported_and_malformed_types() {
        assert_eq!(MediaKind::parse("application/msword"), None);
        assert_eq!(MediaKind::parse("image/tiff"), None);
        assert_eq!(MediaKind::parse("not a media type"), None);
        assert_eq!(MediaKind::parse(""), None);
    }

    #[test]
    fn test_yaml_aliases_resolve_to_canonical() {
        for value in ["application/x-yaml", "text/yaml"] {
            let kind = MediaKind::parse(value).unwrap();
            assert_eq!(kind, MediaKind::Yaml);
            assert_eq!(kind.media_type(), "application/yaml");
        }
    }

    #[test]
    fn test_extensions_round_trip_through_canonical_kind() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_extension(kind.extension()), Some(kind));
        }
        assert_eq!(MediaKind::from_extension("JPEG"), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_extension("yml"), Some(MediaKind::Yaml));
        assert_eq!(MediaKind::from_extension("exe"), None);
    }
}
