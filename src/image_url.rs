//! Decides whether a URL points at a still image format we know how to save.

use std::fmt;

use url::Url;

/// A still image extension we're willing to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageExtension {
    /// Matches a lower-cased extension, including its leading dot.
    fn from_dotted(extension: &str) -> Option<Self> {
        match extension {
            ".jpg" => Some(Self::Jpg),
            ".jpeg" => Some(Self::Jpeg),
            ".png" => Some(Self::Png),
            ".webp" => Some(Self::Webp),
            ".gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => ".jpg",
            Self::Jpeg => ".jpeg",
            Self::Png => ".png",
            Self::Webp => ".webp",
            Self::Gif => ".gif",
        }
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Classifies a URL by the extension of its last path segment, falling back
/// to a `format` query parameter like the ones on preview.redd.it links.
pub fn classify(raw_url: &str) -> Option<ImageExtension> {
    let url = Url::parse(raw_url).ok()?;

    if let Some(extension) = path_extension(&url) {
        if let Some(extension) = ImageExtension::from_dotted(&extension) {
            return Some(extension);
        }
    }

    let format = url
        .query_pairs()
        .find(|(key, _)| key == "format")
        .map(|(_, value)| value.to_lowercase())?;

    if format.is_empty() {
        return None;
    }

    if format.starts_with('.') {
        ImageExtension::from_dotted(&format)
    } else {
        ImageExtension::from_dotted(&format!(".{}", format))
    }
}

fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let dot = segment.rfind('.')?;

    Some(segment[dot..].to_lowercase())
}
