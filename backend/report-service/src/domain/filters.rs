//! Listing filters and the listing cache key space
//!
//! Every listing key is derived from a [`ListingQuery`], and the invalidation key set for a
//! user is generated from the same enumerations, so adding a filter value widens both.

use super::models::{IssueType, ReportStatus};
use crate::error::{ServiceError, ServiceResult};
use civic_cache::{CacheKey, ALL, ANONYMOUS};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    All,
    Only(ReportStatus),
}

impl StatusFilter {
    /// Every filter value the listing endpoint accepts
    pub fn variants() -> impl Iterator<Item = StatusFilter> {
        std::iter::once(StatusFilter::All).chain(ReportStatus::ALL.into_iter().map(StatusFilter::Only))
    }

    /// Missing, empty or `all` selects everything; anything unknown is rejected
    pub fn parse(raw: Option<&str>) -> ServiceResult<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(StatusFilter::All),
            Some(value) if value.eq_ignore_ascii_case(ALL) => Ok(StatusFilter::All),
            Some(value) => ReportStatus::parse(value)
                .map(StatusFilter::Only)
                .ok_or_else(|| ServiceError::InvalidInput(format!("unknown status filter: {}", value))),
        }
    }

    pub fn key_component(&self) -> &'static str {
        match self {
            StatusFilter::All => ALL,
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn status(&self) -> Option<ReportStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(*status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    All,
    Only(IssueType),
}

impl TypeFilter {
    pub fn variants() -> impl Iterator<Item = TypeFilter> {
        std::iter::once(TypeFilter::All).chain(IssueType::ALL.into_iter().map(TypeFilter::Only))
    }

    pub fn parse(raw: Option<&str>) -> ServiceResult<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(TypeFilter::All),
            Some(value) if value.eq_ignore_ascii_case(ALL) => Ok(TypeFilter::All),
            Some(value) => IssueType::parse(value)
                .map(TypeFilter::Only)
                .ok_or_else(|| ServiceError::InvalidInput(format!("unknown issue type filter: {}", value))),
        }
    }

    pub fn key_component(&self) -> &'static str {
        match self {
            TypeFilter::All => ALL,
            TypeFilter::Only(issue_type) => issue_type.as_str(),
        }
    }

    pub fn issue_type(&self) -> Option<IssueType> {
        match self {
            TypeFilter::All => None,
            TypeFilter::Only(issue_type) => Some(*issue_type),
        }
    }
}

/// Store-level report selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub issue_type: Option<IssueType>,
}

impl ReportFilter {
    pub fn matches(&self, status: ReportStatus, issue_type: IssueType) -> bool {
        self.status.map_or(true, |s| s == status) && self.issue_type.map_or(true, |t| t == issue_type)
    }
}

/// One listing request: filters plus the requester the result is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingQuery {
    pub status: StatusFilter,
    pub issue_type: TypeFilter,
    pub requester: Option<Uuid>,
}

impl ListingQuery {
    pub fn new(status: StatusFilter, issue_type: TypeFilter, requester: Option<Uuid>) -> Self {
        Self {
            status,
            issue_type,
            requester,
        }
    }

    /// Parse raw query-string values, rejecting unknown filters before any I/O
    pub fn parse(status: Option<&str>, issue_type: Option<&str>, requester: Option<Uuid>) -> ServiceResult<Self> {
        Ok(Self::new(StatusFilter::parse(status)?, TypeFilter::parse(issue_type)?, requester))
    }

    pub fn cache_key(&self) -> String {
        let requester = self.requester.map(|id| id.to_string());
        CacheKey::report_listing(
            self.status.key_component(),
            self.issue_type.key_component(),
            requester.as_deref().unwrap_or(ANONYMOUS),
        )
    }

    pub fn store_filter(&self) -> ReportFilter {
        ReportFilter {
            status: self.status.status(),
            issue_type: self.issue_type.issue_type(),
        }
    }

    /// Every listing query a user can issue: the full (status x type) product
    pub fn all_for(requester: Uuid) -> impl Iterator<Item = ListingQuery> {
        StatusFilter::variants().flat_map(move |status| {
            TypeFilter::variants().map(move |issue_type| ListingQuery::new(status, issue_type, Some(requester)))
        })
    }
}
