//! Wire format of reddit's listing JSON, before it's reduced to a `Post`.

use std::collections::HashMap;

use serde::Deserialize;

use super::Page;
use crate::candidates::{Post, PreviewImage};

#[derive(Debug, Deserialize)]
pub(super) struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,

    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: RawPost,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPost {
    title: Option<String>,
    url: Option<String>,
    url_overridden_by_dest: Option<String>,
    is_gallery: Option<bool>,
    preview: Option<RawPreview>,
    gallery_data: Option<RawGalleryData>,
    media_metadata: Option<HashMap<String, RawMediaMetadata>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPreview {
    images: Vec<RawPreviewImage>,
}

#[derive(Debug, Deserialize)]
struct RawPreviewImage {
    source: Option<RawImageSource>,

    #[serde(default)]
    resolutions: Vec<RawImageSource>,
}

#[derive(Debug, Deserialize)]
struct RawImageSource {
    url: String,

    #[serde(default)]
    width: u32,

    #[serde(default)]
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGalleryData {
    items: Vec<RawGalleryItem>,
}

#[derive(Debug, Deserialize)]
struct RawGalleryItem {
    media_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMediaMetadata {
    s: Option<RawMediaSource>,
}

/// `u` is set for still images, `gif` for animated ones.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMediaSource {
    u: Option<String>,
    gif: Option<String>,
}

impl From<RawImageSource> for PreviewImage {
    fn from(raw: RawImageSource) -> Self {
        PreviewImage {
            url: raw.url,
            width: raw.width,
            height: raw.height,
        }
    }
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        // Only the first preview image is the post's own; reddit never sends
        // more than one in practice.
        let first_preview = raw
            .preview
            .and_then(|preview| preview.images.into_iter().next());

        let (preview_source, preview_resolutions) = match first_preview {
            Some(image) => (
                image.source.map(PreviewImage::from),
                image
                    .resolutions
                    .into_iter()
                    .map(PreviewImage::from)
                    .collect(),
            ),
            None => (None, Vec::new()),
        };

        let gallery_item_ids = raw
            .gallery_data
            .map(|gallery| gallery.items.into_iter().map(|item| item.media_id).collect())
            .unwrap_or_default();

        let media_metadata_by_id = raw
            .media_metadata
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, metadata)| {
                let source = metadata.s?;
                source.u.or(source.gif).map(|url| (id, url))
            })
            .collect();

        Post {
            title: raw.title.unwrap_or_default(),
            primary_url: raw.url.unwrap_or_default(),
            overridden_url: raw.url_overridden_by_dest,
            is_gallery: raw.is_gallery.unwrap_or(false),
            preview_source,
            preview_resolutions,
            gallery_item_ids,
            media_metadata_by_id,
        }
    }
}

impl From<Listing> for Page {
    fn from(listing: Listing) -> Self {
        Page {
            posts: listing
                .data
                .children
                .into_iter()
                .map(|thing| Post::from(thing.data))
                .collect(),
            after: listing.data.after.unwrap_or_default(),
        }
    }
}
