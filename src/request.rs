//! Generation Request - Immutable Run Input

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_THEME_CHARS: usize = 100;
pub const MAX_PAGE_COUNT: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Theme must not be empty")]
    EmptyTheme,

    #[error("Theme must be at most 100 characters, got {0}")]
    ThemeTooLong(usize),

    #[error("Page count must be between 1 and 10, got {0}")]
    PageCountOutOfRange(u32),
}

/// One pipeline run: a theme and how many pages to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    theme: String,
    page_count: u32,
}

impl GenerationRequest {
    pub fn new(theme: impl Into<String>, page_count: u32) -> Result<Self, RequestError> {
        let theme = theme.into().trim().to_string();
        if theme.is_empty() {
            return Err(RequestError::EmptyTheme);
        }
        let chars = theme.chars().count();
        if chars > MAX_THEME_CHARS {
            return Err(RequestError::ThemeTooLong(chars));
        }
        if page_count == 0 || page_count > MAX_PAGE_COUNT {
            return Err(RequestError::PageCountOutOfRange(page_count));
        }
        Ok(Self { theme, page_count })
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}
