//! Dashboard view state: tabs, sort, pagination, modal, delete confirmation.
//!
//! Mutations are applied only after the API call that caused them succeeded,
//! so the local list never shows a half-applied change.

use crate::reminder::{ListQuery, ReminderPage, ReminderRecord, SortOrder, StatusFilter};

pub const DEFAULT_PER_PAGE: u32 = 25;
pub const LOAD_ERROR: &str = "Failed to load reminders. Please try again.";

/// `Default` leaves ordering to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortChoice {
    #[default]
    Default,
    Ascending,
    Descending,
}

impl SortChoice {
    pub fn next(self) -> Self {
        match self {
            SortChoice::Default => SortChoice::Ascending,
            SortChoice::Ascending => SortChoice::Descending,
            SortChoice::Descending => SortChoice::Default,
        }
    }

    pub fn order(self) -> Option<SortOrder> {
        match self {
            SortChoice::Default => None,
            SortChoice::Ascending => Some(SortOrder::Ascending),
            SortChoice::Descending => Some(SortOrder::Descending),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortChoice::Default => "-",
            SortChoice::Ascending => "ascending",
            SortChoice::Descending => "descending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Closed,
    Create,
    QuickCreate,
    Edit(String),
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub reminders: Vec<ReminderRecord>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub tab: StatusFilter,
    pub sort: SortChoice,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub modal: Modal,
    pending_delete: Option<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl DashboardState {
    pub fn new(per_page: u32) -> Self {
        Self {
            reminders: Vec::new(),
            is_loading: true,
            error: None,
            tab: StatusFilter::All,
            sort: SortChoice::Default,
            page: 1,
            per_page: per_page.max(1),
            total_items: 0,
            modal: Modal::Closed,
            pending_delete: None,
        }
    }

    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            status: self.tab,
            page: self.page,
            per_page: self.per_page,
            sort: self.sort.order(),
        }
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.total_items.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// Switching tabs always goes back to the first page.
    pub fn set_tab(&mut self, tab: StatusFilter) {
        if self.tab != tab {
            self.tab = tab;
            self.page = 1;
        }
    }

    pub fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
    }

    pub fn set_sort(&mut self, sort: SortChoice) {
        self.sort = sort;
    }

    /// Returns whether the page changed.
    pub fn next_page(&mut self) -> bool {
        if self.page < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn begin_load(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    pub fn apply_loaded(&mut self, page: ReminderPage) {
        self.reminders = page.items;
        self.total_items = page.total_items;
        self.is_loading = false;
        self.error = None;
        if self.page > self.total_pages() {
            self.page = self.total_pages();
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.is_loading = false;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn apply_created(&mut self, record: ReminderRecord) {
        if self.tab.matches(record.status) {
            self.reminders.insert(0, record);
            self.total_items += 1;
        }
        self.modal = Modal::Closed;
    }

    pub fn apply_updated(&mut self, record: ReminderRecord) {
        if let Some(slot) = self.reminders.iter_mut().find(|r| r.id == record.id) {
            *slot = record;
        }
        self.modal = Modal::Closed;
    }

    pub fn apply_deleted(&mut self, id: &str) {
        let before = self.reminders.len();
        self.reminders.retain(|r| r.id != id);
        if self.reminders.len() < before {
            self.total_items = self.total_items.saturating_sub(1);
        }
        if self.pending_delete.as_deref() == Some(id) {
            self.pending_delete = None;
        }
    }

    pub fn open_create(&mut self) {
        self.modal = Modal::Create;
    }

    pub fn open_quick_create(&mut self) {
        self.modal = Modal::QuickCreate;
    }

    pub fn open_edit(&mut self, id: impl Into<String>) {
        self.modal = Modal::Edit(id.into());
    }

    pub fn close_modal(&mut self) {
        self.modal = Modal::Closed;
    }

    pub fn request_delete(&mut self, id: impl Into<String>) {
        self.pending_delete = Some(id.into());
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Hand back the id to delete. It stays listed until `apply_deleted`.
    pub fn confirm_delete(&mut self) -> Option<String> {
        self.pending_delete.take()
    }

    pub fn find(&self, id: &str) -> Option<&ReminderRecord> {
        self.reminders.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderStatus;

    fn rec(id: &str, status: ReminderStatus) -> ReminderRecord {
        ReminderRecord {
            id: id.into(),
            title: format!("reminder {id}"),
            message: "hello".into(),
            phone_number: "+15550000000".into(),
            masked_phone_number: None,
            scheduled_time_utc: "2026-01-06T19:57:00Z".into(),
            timezone: "America/New_York".into(),
            status,
            time_remaining_seconds: 0.0,
            failure_reason: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn page_of(total: u64, items: Vec<ReminderRecord>) -> ReminderPage {
        ReminderPage {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            total_items: total,
            items,
        }
    }

    #[test]
    fn pages_round_up_and_never_drop_below_one() {
        let mut s = DashboardState::default();
        assert_eq!(s.total_pages(), 1);
        s.apply_loaded(page_of(51, vec![]));
        assert_eq!(s.total_pages(), 3);
        assert!(s.next_page());
        assert!(s.next_page());
        assert!(!s.next_page());
        assert_eq!(s.page, 3);
        assert_eq!(s.list_query().page, 3);
    }

    #[test]
    fn tab_switch_resets_page() {
        let mut s = DashboardState::default();
        s.apply_loaded(page_of(100, vec![]));
        s.next_page();
        s.set_tab(StatusFilter::Failed);
        assert_eq!(s.page, 1);
        assert_eq!(s.list_query().status, StatusFilter::Failed);
    }

    #[test]
    fn sort_cycles_through_server_default() {
        let mut s = DashboardState::default();
        assert_eq!(s.list_query().sort, None);
        s.cycle_sort();
        assert_eq!(s.list_query().sort, Some(SortOrder::Ascending));
        s.cycle_sort();
        s.cycle_sort();
        assert_eq!(s.sort, SortChoice::Default);
    }

    #[test]
    fn mutations_apply_to_local_list() {
        let mut s = DashboardState::default();
        s.apply_loaded(page_of(1, vec![rec("a", ReminderStatus::Scheduled)]));

        s.open_create();
        s.apply_created(rec("b", ReminderStatus::Scheduled));
        assert_eq!(s.reminders[0].id, "b");
        assert_eq!(s.total_items, 2);
        assert_eq!(s.modal, Modal::Closed);

        let mut changed = rec("a", ReminderStatus::Scheduled);
        changed.title = "renamed".into();
        s.apply_updated(changed);
        assert_eq!(s.find("a").map(|r| r.title.as_str()), Some("renamed"));

        s.request_delete("a");
        assert_eq!(s.confirm_delete().as_deref(), Some("a"));
        assert!(s.find("a").is_some());
        s.apply_deleted("a");
        assert!(s.find("a").is_none());
        assert_eq!(s.total_items, 1);
    }

    #[test]
    fn created_reminder_hidden_on_other_tab() {
        let mut s = DashboardState::default();
        s.set_tab(StatusFilter::Completed);
        s.apply_loaded(page_of(0, vec![]));
        s.apply_created(rec("x", ReminderStatus::Scheduled));
        assert!(s.reminders.is_empty());
        assert_eq!(s.total_items, 0);
    }

    #[test]
    fn cancel_delete_keeps_row() {
        let mut s = DashboardState::default();
        s.apply_loaded(page_of(1, vec![rec("a", ReminderStatus::Failed)]));
        s.request_delete("a");
        s.cancel_delete();
        assert_eq!(s.confirm_delete(), None);
        assert_eq!(s.reminders.len(), 1);
    }

    #[test]
    fn load_error_is_single_message() {
        let mut s = DashboardState::default();
        s.begin_load();
        s.set_error(LOAD_ERROR);
        assert!(!s.is_loading);
        assert_eq!(s.error.as_deref(), Some(LOAD_ERROR));
        s.begin_load();
        assert!(s.error.is_none());
    }
}
