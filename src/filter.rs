use std::num::NonZeroU32;

use thiserror::Error;

use crate::candidates::ImageCandidate;

/// A width/height pair where both sides are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("invalid {field} format: expected width{separator}height")]
    Format {
        field: &'static str,
        separator: char,
    },

    #[error("invalid {field} width value")]
    Width { field: &'static str },

    #[error("invalid {field} height value")]
    Height { field: &'static str },
}

/// Parses a resolution in the `WIDTHxHEIGHT` form, e.g. `1920x1080`.
pub fn parse_resolution(raw: &str) -> Result<Dimensions, FilterParseError> {
    parse_pair(raw, 'x', "resolution")
}

/// Parses an aspect ratio in the `WIDTH:HEIGHT` form, e.g. `16:9`.
pub fn parse_aspect_ratio(raw: &str) -> Result<Dimensions, FilterParseError> {
    parse_pair(raw, ':', "aspect-ratio")
}

fn parse_pair(
    raw: &str,
    separator: char,
    field: &'static str,
) -> Result<Dimensions, FilterParseError> {
    let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let parts: Vec<&str> = stripped.split(separator).collect();

    let &[width, height] = parts.as_slice() else {
        return Err(FilterParseError::Format { field, separator });
    };

    let width = width
        .parse::<NonZeroU32>()
        .map_err(|_| FilterParseError::Width { field })?;
    let height = height
        .parse::<NonZeroU32>()
        .map_err(|_| FilterParseError::Height { field })?;

    Ok(Dimensions { width, height })
}

/// Restricts which candidates get downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Accepts every candidate, including ones with unknown dimensions.
    #[default]
    Unconstrained,

    /// Every present constraint must match exactly. Candidates with unknown
    /// dimensions never pass.
    Constrained {
        resolution: Option<Dimensions>,
        aspect_ratio: Option<Dimensions>,
    },
}

impl Filter {
    pub fn new(resolution: Option<Dimensions>, aspect_ratio: Option<Dimensions>) -> Self {
        match (resolution, aspect_ratio) {
            (None, None) => Filter::Unconstrained,
            (resolution, aspect_ratio) => Filter::Constrained {
                resolution,
                aspect_ratio,
            },
        }
    }

    pub fn passes(&self, candidate: &ImageCandidate) -> bool {
        let (resolution, aspect_ratio) = match self {
            Filter::Unconstrained => return true,
            Filter::Constrained {
                resolution,
                aspect_ratio,
            } => (resolution, aspect_ratio),
        };

        if !candidate.has_dimensions() {
            return false;
        }

        let width = u64::from(candidate.width);
        let height = u64::from(candidate.height);

        let resolution_match = resolution.map_or(true, |wanted| {
            width == u64::from(wanted.width.get()) && height == u64::from(wanted.height.get())
        });

        // Cross-multiplied so 16:9 matches 1920x1080 without any rounding.
        let aspect_ratio_match = aspect_ratio.map_or(true, |wanted| {
            width * u64::from(wanted.height.get()) == height * u64::from(wanted.width.get())
        });

        resolution_match && aspect_ratio_match
    }
}
