use chrono::NaiveDate;

use crate::event::EventRecord;

/// Search inputs collected from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free text matched against title, description, and organizer.
    pub text: String,
    /// Tags every result must carry.
    pub required_tags: Vec<String>,
    /// Inclusive date bounds; events without a date always pass.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Compiled predicate over [`EventRecord`]s.
#[derive(Debug, Clone)]
pub struct EventSearchFilter {
    needle: String,
    required_tags: Vec<String>,
    date_range: Option<(NaiveDate, NaiveDate)>,
}

impl EventSearchFilter {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            needle: query.text.trim().to_lowercase(),
            required_tags: query.required_tags,
            date_range: query.date_range,
        }
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        self.matches_text(event) && self.matches_tags(event) && self.matches_date(event)
    }

    /// Matching events in their original order.
    pub fn apply<'a>(&self, events: &'a [EventRecord]) -> Vec<&'a EventRecord> {
        events.iter().filter(|event| self.matches(event)).collect()
    }

    fn matches_text(&self, event: &EventRecord) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        [&event.title, &event.description, &event.organizer]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&self.needle))
    }

    fn matches_tags(&self, event: &EventRecord) -> bool {
        self.required_tags
            .iter()
            .all(|tag| event.tags.contains(tag))
    }

    fn matches_date(&self, event: &EventRecord) -> bool {
        match (self.date_range, event.date) {
            (Some((start, end)), Some(date)) => start <= date && date <= end,
            _ => true,
        }
    }
}

/// Events whose text matches `query` and whose tags cover `required_tags`.
pub fn filter<'a>(
    events: &'a [EventRecord],
    query: &str,
    required_tags: &[&str],
) -> Vec<&'a EventRecord> {
    EventSearchFilter::new(SearchQuery {
        text: query.to_string(),
        required_tags: required_tags.iter().map(|tag| tag.to_string()).collect(),
        date_range: None,
    })
    .apply(events)
}

/// The `n` events with the largest waitlists; ties keep input order.
pub fn popular(events: &[EventRecord], n: usize) -> Vec<&EventRecord> {
    let mut ranked: Vec<&EventRecord> = events.iter().collect();
    ranked.sort_by(|a, b| b.waitlist_user_ids.len().cmp(&a.waitlist_user_ids.len()));
    ranked.truncate(n);
    ranked
}
