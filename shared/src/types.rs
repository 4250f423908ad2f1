//! Common types used across the ledger and document services

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest page a list endpoint will return
pub const MAX_PAGE_SIZE: u32 = 200;

/// Pagination parameters (`pageNo` is 1-based)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageParam {
    #[validate(range(min = 1))]
    #[serde(default = "default_page_no")]
    pub page_no: u32,
    #[validate(range(min = 1, max = 200))]
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_no() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

impl Default for PageParam {
    fn default() -> Self {
        Self {
            page_no: default_page_no(),
            page_size: default_page_size(),
        }
    }
}

impl PageParam {
    pub fn new(page_no: u32, page_size: u32) -> Self {
        Self { page_no, page_size }
    }

    /// Builds a page from optional query-string values
    pub fn from_query(page_no: Option<u32>, page_size: Option<u32>) -> Self {
        Self::new(
            page_no.unwrap_or_else(default_page_no),
            page_size.unwrap_or_else(default_page_size),
        )
    }

    /// Number of rows to skip
    pub fn offset(&self) -> usize {
        (self.page_no.max(1) as usize - 1) * self.limit()
    }

    pub fn limit(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE) as usize
    }

    /// Cut one page out of an already filtered and ordered result set
    pub fn slice<T>(&self, items: Vec<T>) -> PageResult<T> {
        let total = items.len() as u64;
        let list = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect();
        PageResult { list, total }
    }
}

/// Paginated response: `{ list, total }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub list: Vec<T>,
    pub total: u64,
}

impl<T> PageResult<T> {
    pub fn empty() -> Self {
        Self {
            list: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Inclusive date range for report queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Longest range a report query may cover, in days
pub const MAX_REPORT_DAYS: i64 = 366;

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, &'static str> {
        if start > end {
            return Err("Start date must not be after end date");
        }
        if (end - start).num_days() >= MAX_REPORT_DAYS {
            return Err("Date range cannot span more than 366 days");
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Every day in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Half-open timestamp range used by movement log queries; either bound may be open
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Who is performing a transition
///
/// Passed explicitly to every state-machine call; never read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorContext {
    pub operator_id: i64,
    pub operator_name: String,
}

impl OperatorContext {
    pub fn new(operator_id: i64, operator_name: impl Into<String>) -> Self {
        Self {
            operator_id,
            operator_name: operator_name.into(),
        }
    }

    /// Identity used by background jobs
    pub fn system() -> Self {
        Self::new(0, "system")
    }
}
