//! Pagination cursor and exhaustion counter

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::sources::PageLinks;

/// Threshold of consecutive empty pages; the walker stops once it is exceeded
pub const DEFAULT_EXHAUSTION_THRESHOLD: u32 = 5;

/// How a source moves from one listing page to the next
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum Pagination {
    /// Poll the same URL forever
    #[default]
    Fixed,
    /// Follow the `next` link advertised by each page
    LinkRelation,
    /// Add `step` to a numeric query parameter (`PAGEN_1`, `f`, ...)
    QueryParam {
        param: String,
        #[serde(default = "default_step")]
        step: i64,
    },
}

fn default_step() -> i64 {
    1
}

/// Cursor errors; the cursor stays where it was
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CursorError {
    #[error("Invalid cursor URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Query parameter {param} missing in {url}")]
    MissingParam { param: String, url: String },

    #[error("Query parameter {param}={value} is not numeric")]
    NonNumericParam { param: String, value: String },

    #[error("Query parameter {param}={value} overflows when stepped by {step}")]
    Overflow { param: String, value: i64, step: i64 },
}

/// Result of advancing the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The cursor now points at a new page
    Moved,
    /// The cursor intentionally stays on the same URL
    Stay,
    /// No further page exists
    Finished,
}

/// Per-walker pagination state
#[derive(Debug, Clone)]
pub struct Cursor {
    current: String,
    pagination: Pagination,
}

impl Cursor {
    pub fn new(url: impl Into<String>, pagination: Pagination) -> Self {
        Self {
            current: url.into(),
            pagination,
        }
    }

    /// URL of the page to request next
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Move to the following page using the links of the page just read
    pub fn advance(&mut self, links: &PageLinks) -> Result<Advance, CursorError> {
        match &self.pagination {
            Pagination::Fixed => Ok(Advance::Stay),
            Pagination::LinkRelation => match links.next_link() {
                Some(next) => {
                    self.current = next.to_string();
                    Ok(Advance::Moved)
                }
                None => Ok(Advance::Finished),
            },
            Pagination::QueryParam { param, step } => {
                self.current = step_query_param(&self.current, param, *step)?;
                Ok(Advance::Moved)
            }
        }
    }
}

/// Add `step` to the numeric query parameter `param` of `url`
///
/// Other parameters keep their order.
pub fn step_query_param(url: &str, param: &str, step: i64) -> Result<String, CursorError> {
    let mut parsed = Url::parse(url).map_err(|e| CursorError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let slot = pairs
        .iter_mut()
        .find(|(k, _)| k == param)
        .ok_or_else(|| CursorError::MissingParam {
            param: param.to_string(),
            url: url.to_string(),
        })?;

    let value: i64 = slot
        .1
        .trim()
        .parse()
        .map_err(|_| CursorError::NonNumericParam {
            param: param.to_string(),
            value: slot.1.clone(),
        })?;
    let next = value.checked_add(step).ok_or_else(|| CursorError::Overflow {
        param: param.to_string(),
        value,
        step,
    })?;
    slot.1 = next.to_string();

    parsed.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Ok(parsed.to_string())
}

/// Consecutive empty page counter
#[derive(Debug, Clone)]
pub struct Exhaustion {
    consecutive_empty: u32,
    threshold: u32,
}

impl Default for Exhaustion {
    fn default() -> Self {
        Self::new(DEFAULT_EXHAUSTION_THRESHOLD)
    }
}

impl Exhaustion {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_empty: 0,
            threshold,
        }
    }

    /// Record a page with `entries` items; returns `true` once exhausted
    pub fn observe(&mut self, entries: usize) -> bool {
        if entries == 0 {
            self.consecutive_empty += 1;
        } else {
            self.consecutive_empty = 0;
        }
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.consecutive_empty > self.threshold
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_page_number() {
        let next = step_query_param(
            "https://mid.ru/ru/foreign_policy/news/?PAGEN_1=2&lang=ru",
            "PAGEN_1",
            1,
        )
        .unwrap();
        assert_eq!(next, "https://mid.ru/ru/foreign_policy/news/?PAGEN_1=3&lang=ru");
    }

    #[test]
    fn test_step_offset() {
        let next = step_query_param("https://mil.ru/api/news?l=20&f=40", "f", 20).unwrap();
        assert_eq!(next, "https://mil.ru/api/news?l=20&f=60");
    }

    #[test]
    fn test_step_errors() {
        assert!(matches!(
            step_query_param("https://mid.ru/news/?lang=ru", "PAGEN_1", 1),
            Err(CursorError::MissingParam { .. })
        ));
        assert!(matches!(
            step_query_param("https://mid.ru/news/?PAGEN_1=abc", "PAGEN_1", 1),
            Err(CursorError::NonNumericParam { .. })
        ));
        assert!(matches!(
            step_query_param("not a url", "PAGEN_1", 1),
            Err(CursorError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_step_overflow() {
        let url = format!("https://mid.ru/news/?PAGEN_1={}", i64::MAX);
        assert_eq!(
            step_query_param(&url, "PAGEN_1", 1),
            Err(CursorError::Overflow {
                param: "PAGEN_1".into(),
                value: i64::MAX,
                step: 1,
            })
        );
        assert_eq!(
            step_query_param("https://mid.ru/news/?f=-9223372036854775808", "f", -1),
            Err(CursorError::Overflow {
                param: "f".into(),
                value: i64::MIN,
                step: -1,
            })
        );

        let mut cursor = Cursor::new(
            url.clone(),
            Pagination::QueryParam {
                param: "PAGEN_1".into(),
                step: 1,
            },
        );
        assert!(cursor.advance(&PageLinks::default()).is_err());
        assert_eq!(cursor.current(), url);
    }

    #[test]
    fn test_cursor_error_leaves_position() {
        let url = "https://mid.ru/news/?PAGEN_1=x";
        let mut cursor = Cursor::new(
            url,
            Pagination::QueryParam {
                param: "PAGEN_1".into(),
                step: 1,
            },
        );
        assert!(cursor.advance(&PageLinks::default()).is_err());
        assert_eq!(cursor.current(), url);
    }

    #[test]
    fn test_link_relation_cursor() {
        let mut cursor = Cursor::new("http://kremlin.ru/feed", Pagination::LinkRelation);

        let mut links = PageLinks::default();
        links.set("next", "http://kremlin.ru/feed?page=2");
        assert_eq!(cursor.advance(&links).unwrap(), Advance::Moved);
        assert_eq!(cursor.current(), "http://kremlin.ru/feed?page=2");

        assert_eq!(
            cursor.advance(&PageLinks::default()).unwrap(),
            Advance::Finished
        );
        assert_eq!(cursor.current(), "http://kremlin.ru/feed?page=2");
    }

    #[test]
    fn test_fixed_cursor_stays() {
        let mut cursor = Cursor::new("http://kremlin.ru/feed", Pagination::Fixed);
        let mut links = PageLinks::default();
        links.set("next", "http://kremlin.ru/feed?page=2");
        assert_eq!(cursor.advance(&links).unwrap(), Advance::Stay);
        assert_eq!(cursor.current(), "http://kremlin.ru/feed");
    }

    #[test]
    fn test_exhaustion_threshold() {
        let mut exhaustion = Exhaustion::default();
        for _ in 0..5 {
            assert!(!exhaustion.observe(0));
        }
        assert!(exhaustion.observe(0));
        assert_eq!(exhaustion.consecutive_empty(), 6);
    }

    #[test]
    fn test_exhaustion_resets_on_entries() {
        let mut exhaustion = Exhaustion::default();
        for _ in 0..5 {
            exhaustion.observe(0);
        }
        assert!(!exhaustion.observe(3));
        assert_eq!(exhaustion.consecutive_empty(), 0);
        assert!(!exhaustion.observe(0));
    }

    #[test]
    fn test_pagination_deserialize() {
        let p: Pagination = toml::from_str("style = \"query_param\"\nparam = \"f\"\nstep = 20").unwrap();
        assert_eq!(
            p,
            Pagination::QueryParam {
                param: "f".into(),
                step: 20
            }
        );
        let p: Pagination = toml::from_str("style = \"link_relation\"").unwrap();
        assert_eq!(p, Pagination::LinkRelation);
    }
}
