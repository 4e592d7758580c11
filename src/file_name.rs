//! Turns post titles into names that are safe to create on any file system.

use unicode_general_category::{get_general_category, GeneralCategory};

use crate::image_url::ImageExtension;

/// Used when a title has nothing usable left after sanitizing.
pub const FALLBACK_NAME: &str = "reddit_image";

pub fn sanitize(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if is_letter_or_digit(c) || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Letters of any case or script and decimal digits. Other numerics like `½`,
/// `²` or `Ⅻ` and combining marks don't count.
fn is_letter_or_digit(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Destination file name for the `index`th image saved from a post. Images
/// after the first get a `_2`, `_3`, ... suffix so they don't collide.
pub fn file_name_for(title: &str, index: usize, extension: ImageExtension) -> String {
    let base = sanitize(title);

    if index == 0 {
        format!("{}{}", base, extension)
    } else {
        format!("{}_{}{}", base, index + 1, extension)
    }
}
