//! Selectors for locating elements, and the calendar-day resolution order.
//!
//! Plain CSS covers most of the portal. The calendar needs text matching as
//! well, which CSS cannot express, so a [`Selector`] renders to a page-script
//! query that drivers evaluate.

use crate::config::TargetDate;
use crate::site;
use std::fmt;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector (e.g., "#UC_Login_TXTUser")
    Css(String),
    /// CSS selector whose trimmed text content equals `text`
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Exact text to match
        text: String,
    },
    /// CSS selector whose text content contains `text`
    CssContainingText {
        /// Base CSS selector
        css: String,
        /// Substring to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a selector matching exact text
    #[must_use]
    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a selector matching contained text
    #[must_use]
    pub fn containing_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssContainingText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// The CSS part of the selector
    #[must_use]
    pub fn base_css(&self) -> &str {
        match self {
            Self::Css(css)
            | Self::CssWithText { css, .. }
            | Self::CssContainingText { css, .. } => css,
        }
    }

    /// Script expression evaluating to the array of matching elements
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({css:?})).filter(el => (el.textContent || '').trim() === {text:?})"
            ),
            Self::CssContainingText { css, text } => format!(
                "Array.from(document.querySelectorAll({css:?})).filter(el => (el.textContent || '').includes({text:?}))"
            ),
        }
    }

    /// Script expression evaluating to the first match, or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("({}[0] || null)", self.to_all_query())
    }

    /// Script expression evaluating to the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("{}.length", self.to_all_query())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::CssWithText { css, text } => write!(f, "{css}:text-is({text:?})"),
            Self::CssContainingText { css, text } => write!(f, "{css}:has-text({text:?})"),
        }
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Self::css(css)
    }
}

/// Ways of finding the target day inside the calendar, in preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayTarget {
    day: u32,
    month_name: &'static str,
}

impl DayTarget {
    /// Target for a configured date
    #[must_use]
    pub fn new(date: TargetDate) -> Self {
        Self {
            day: date.day(),
            month_name: date.month_name(),
        }
    }

    /// Day of month
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// Anchor titled "`{day} {month}`", e.g. `a[title="5 marzo"]`
    #[must_use]
    pub fn title_anchor(&self) -> Selector {
        Selector::css(format!(
            "{} a[title=\"{} {}\"]",
            site::CALENDAR,
            self.day,
            self.month_name
        ))
    }

    /// Any calendar anchor whose text is the day number
    #[must_use]
    pub fn text_anchor(&self) -> Selector {
        Selector::with_text(format!("{} a", site::CALENDAR), self.day.to_string())
    }

    /// Any calendar cell containing the day number; last resort
    #[must_use]
    pub fn cell(&self) -> Selector {
        Selector::containing_text(format!("{} td", site::CALENDAR), self.day.to_string())
    }

    /// Anchor selectors, most specific first
    #[must_use]
    pub fn anchors(&self) -> [Selector; 2] {
        [self.title_anchor(), self.text_anchor()]
    }
}
