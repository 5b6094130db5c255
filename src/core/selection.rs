//! Quota-bounded selection of catalog videos.
//!
//! Budget arithmetic: the selection costs `ceil(total_minutes / 60)` whole
//! video-hours, and it fits as long as that cost does not exceed the
//! user's remaining hours. The same check runs when a box is ticked and
//! again when the selection is submitted for transcription.

use thiserror::Error;

use crate::domain::duration::hours_for_minutes;
use crate::domain::{CatalogItem, Quota};

/// A selection needs more video-hours than remain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Selection needs {required_hours} video-hours but only {available_hours} remain")]
pub struct QuotaExceeded {
    pub required_hours: u32,
    pub available_hours: u32,
}

/// Hours needed for `total_minutes`, or [`QuotaExceeded`] when that is
/// more than `hours_left`
pub fn check_budget(total_minutes: u32, hours_left: u32) -> Result<u32, QuotaExceeded> {
    let required_hours = hours_for_minutes(total_minutes);
    if required_hours > hours_left {
        return Err(QuotaExceeded {
            required_hours,
            available_hours: hours_left,
        });
    }
    Ok(required_hours)
}

/// Whether one more video still fits next to what is already selected
pub fn can_add(candidate_minutes: u32, selected_minutes: u32, quota: &Quota) -> bool {
    check_budget(
        selected_minutes.saturating_add(candidate_minutes),
        quota.video_hours_left,
    )
    .is_ok()
}

/// Outcome of a select-all pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectAllReport {
    /// Candidates offered
    pub requested: usize,
    /// Candidates that ended up selected
    pub selected: usize,
}

impl SelectAllReport {
    /// True when some candidates were left out for budget reasons
    pub fn truncated(&self) -> bool {
        self.selected < self.requested
    }
}

/// An ordered set of catalog items the user wants transcribed
#[derive(Debug, Clone, Default)]
pub struct Selection {
    items: Vec<CatalogItem>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.items.iter().any(|item| item.video_id == video_id)
    }

    pub fn total_minutes(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.duration_in_minutes))
    }

    /// Whole video-hours this selection would cost
    pub fn hours_required(&self) -> u32 {
        hours_for_minutes(self.total_minutes())
    }

    /// Add `item` if it is new and still fits the quota
    pub fn try_add(&mut self, item: CatalogItem, quota: &Quota) -> bool {
        if self.contains(&item.video_id) {
            return false;
        }
        if !can_add(item.duration_in_minutes, self.total_minutes(), quota) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, video_id: &str) -> Option<CatalogItem> {
        let index = self.items.iter().position(|item| item.video_id == video_id)?;
        Some(self.items.remove(index))
    }

    /// Greedily add candidates in order, skipping any that would overflow
    /// the quota
    pub fn select_all(&mut self, candidates: &[CatalogItem], quota: &Quota) -> SelectAllReport {
        let selected = candidates
            .iter()
            .filter(|item| self.try_add((*item).clone(), quota))
            .count();

        SelectAllReport {
            requested: candidates.len(),
            selected,
        }
    }
}

/// Fresh selection built from `candidates` in order
pub fn select_all(candidates: &[CatalogItem], quota: &Quota) -> (Selection, SelectAllReport) {
    let mut selection = Selection::new();
    let report = selection.select_all(candidates, quota);
    (selection, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuotaDefaults;
    use chrono::Utc;

    fn quota(hours: u32) -> Quota {
        let mut quota = Quota::fresh("a@x.com", &QuotaDefaults::default(), Utc::now());
        quota.video_hours_left = hours;
        quota
    }

    fn item(id: &str, minutes: u32) -> CatalogItem {
        CatalogItem {
            video_id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            thumbnail_url: None,
            duration_in_minutes: minutes,
        }
    }

    #[test]
    fn test_can_add_boundaries() {
        let q = quota(10);
        // 560 + 30 = 590 min → 10 h
        assert!(can_add(30, 560, &q));
        // 590 + 10 = 600 min → 10 h
        assert!(can_add(10, 590, &q));
        // 600 + 1 min → 11 h
        assert!(!can_add(1, 600, &q));
    }

    #[test]
    fn test_check_budget_reports_shortfall() {
        assert_eq!(check_budget(61, 2), Ok(2));
        assert_eq!(
            check_budget(125, 2),
            Err(QuotaExceeded {
                required_hours: 3,
                available_hours: 2
            })
        );
        assert_eq!(check_budget(0, 0), Ok(0));
    }

    #[test]
    fn test_can_add_is_monotone_in_selection() {
        let q = quota(3);
        let mut last = true;
        for selected in (0..=300).step_by(15) {
            let fits = can_add(20, selected, &q);
            // once false, stays false
            assert!(last || !fits);
            last = fits;
        }
        assert!(!last);
    }

    #[test]
    fn test_try_add_rejects_duplicates_and_overflow() {
        let q = quota(1);
        let mut selection = Selection::new();

        assert!(selection.try_add(item("a", 40), &q));
        assert!(!selection.try_add(item("a", 1), &q));
        assert!(selection.try_add(item("b", 20), &q));
        assert!(!selection.try_add(item("c", 1), &q));

        assert_eq!(selection.total_minutes(), 60);
        assert_eq!(selection.hours_required(), 1);
    }

    #[test]
    fn test_remove_frees_budget() {
        let q = quota(1);
        let mut selection = Selection::new();
        selection.try_add(item("a", 50), &q);

        assert!(!selection.try_add(item("b", 20), &q));
        assert!(selection.remove("a").is_some());
        assert!(selection.try_add(item("b", 20), &q));
        assert!(selection.remove("missing").is_none());
    }

    #[test]
    fn test_select_all_skips_what_does_not_fit() {
        let q = quota(2);
        let candidates = vec![item("a", 70), item("b", 60), item("c", 30), item("d", 20)];

        let (selection, report) = select_all(&candidates, &q);

        // a(70) fits, b would make 130 (3h), c makes 100, d makes 120
        let ids: Vec<_> = selection.items().iter().map(|i| i.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(report.requested, 4);
        assert_eq!(report.selected, 3);
        assert!(report.truncated());
        assert!(selection.hours_required() <= q.video_hours_left);
    }
}
