use std::collections::{HashMap, HashSet};

use crate::image_url::{classify, ImageExtension};

/// One rendition of a post's preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// A ranked post, reduced to the fields that can reference an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Post {
    pub title: String,
    pub primary_url: String,
    pub overridden_url: Option<String>,
    pub is_gallery: bool,
    pub preview_source: Option<PreviewImage>,
    pub preview_resolutions: Vec<PreviewImage>,
    pub gallery_item_ids: Vec<String>,
    pub media_metadata_by_id: HashMap<String, String>,
}

/// A URL that plausibly references a downloadable still image. Width and
/// height are zero when unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub extension: ImageExtension,
}

impl ImageCandidate {
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Collects every image URL a post references, in source order, keeping the
/// first occurrence of each URL.
pub fn extract(post: &Post) -> Vec<ImageCandidate> {
    let mut collector = CandidateCollector::default();

    if let Some(url) = &post.overridden_url {
        collector.add(url, 0, 0);
    }
    collector.add(&post.primary_url, 0, 0);

    if let Some(source) = &post.preview_source {
        collector.add(&source.url, source.width, source.height);
    }
    for resolution in &post.preview_resolutions {
        collector.add(&resolution.url, resolution.width, resolution.height);
    }

    if post.is_gallery {
        for id in &post.gallery_item_ids {
            match post.media_metadata_by_id.get(id) {
                Some(url) => collector.add(url, 0, 0),
                None => log::trace!("gallery item {} has no media metadata", id),
            }
        }
    }

    collector.candidates
}

#[derive(Default)]
struct CandidateCollector {
    seen: HashSet<String>,
    candidates: Vec<ImageCandidate>,
}

impl CandidateCollector {
    fn add(&mut self, raw_url: &str, width: u32, height: u32) {
        let url = unescape_html(raw_url.trim());
        if url.is_empty() || self.seen.contains(&url) {
            return;
        }

        let Some(extension) = classify(&url) else {
            log::trace!("discarding {}, not a supported image", url);
            return;
        };

        self.seen.insert(url.clone());
        self.candidates.push(ImageCandidate {
            url,
            width,
            height,
            extension,
        });
    }
}

/// Reverses the entity escaping reddit applies to URLs embedded in listing
/// JSON. Unknown entities are kept as-is.
fn unescape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        rest = &rest[start..];

        let decoded = rest
            .find(';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                output.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let hex = numeric
                .strip_prefix('x')
                .or_else(|| numeric.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
