// src/services/extractor.rs

//! Event listing extractor.
//!
//! Parses a live-music listing page into [`Event`]s. The page is expected to
//! look like this:
//!
//! ```text
//! .event-list
//! ├── h2        "Monday, March 3"       -> one Event
//! ├── p         "4 events"              -> event count
//! └── ul
//!     ├── h4    "The Vault"             -> one Show
//!     ├── p     "9pm · $10"             -> show info
//!     ├── p > strong "Band A"           -> artist
//!     └── p > strong "Band B"           -> artist
//! ```

use std::collections::HashMap;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Event, Show};
use crate::utils::clean_artist_name;
use crate::utils::dates::{parse_date_header, resolve_year};
use crate::utils::normalize_whitespace;

const CONTAINER_SELECTOR: &str = ".event-list";
const DATE_HEADER: &str = "h2";
const COUNT_BLOCK: &str = "p";
const SHOW_LIST: &str = "ul";
const SHOW_HEADER: &str = "h4";
const INFO_BLOCK: &str = "p";
const EMPHASIS: &str = "strong";

/// Parses listing markup into events.
#[derive(Debug, Clone)]
pub struct EventExtractor {
    /// Date used to infer the year of "weekday, month day" headers
    reference: NaiveDate,
}

impl EventExtractor {
    /// Create an extractor that resolves header years around `reference`.
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    /// Extract events in document order.
    pub fn extract(&self, markup: &str) -> Result<Vec<Event>> {
        let document = Html::parse_document(markup);
        let container_sel = Self::parse_selector(CONTAINER_SELECTOR)?;
        let emphasis_sel = Self::parse_selector(EMPHASIS)?;

        let container = document.select(&container_sel).next().ok_or_else(|| {
            AppError::parse(
                format!("listing container '{CONTAINER_SELECTOR}' not found"),
                markup,
            )
        })?;

        // Flatten the container into document order once; all "next element"
        // lookups below are index scans over this list.
        let elements: Vec<ElementRef> = container
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let header_positions: Vec<usize> = positions(&elements, DATE_HEADER, 0, elements.len());

        let mut events: Vec<Event> = Vec::new();
        let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();

        for (i, &start) in header_positions.iter().enumerate() {
            let end = header_positions
                .get(i + 1)
                .copied()
                .unwrap_or(elements.len());
            let event = self.parse_event(&elements, start, end, &emphasis_sel)?;

            match by_date.get(&event.date) {
                Some(&existing) => {
                    log::warn!(
                        "Date {} listed more than once; merging {} show(s)",
                        event.date,
                        event.shows.len()
                    );
                    let target = &mut events[existing];
                    target.event_count += event.event_count;
                    target.shows.extend(event.shows);
                }
                None => {
                    by_date.insert(event.date, events.len());
                    events.push(event);
                }
            }
        }

        let total_reported: u32 = events.iter().map(|e| e.event_count).sum();
        let total_shows: usize = events.iter().map(|e| e.shows.len()).sum();
        log::info!(
            "Extracted {} date(s), {} show(s); listing reports {} event(s)",
            events.len(),
            total_shows,
            total_reported
        );

        Ok(events)
    }

    /// Parse one date section spanning `elements[start..end]`.
    fn parse_event(
        &self,
        elements: &[ElementRef],
        start: usize,
        end: usize,
        emphasis_sel: &Selector,
    ) -> Result<Event> {
        let header_text = normalize_whitespace(&text_of(&elements[start]));
        let header = parse_date_header(&header_text).ok_or_else(|| {
            AppError::parse("date header does not match 'weekday, month day'", &header_text)
        })?;
        let date = resolve_year(header, self.reference).ok_or_else(|| {
            AppError::parse("date header names a day that does not exist", &header_text)
        })?;

        let list_pos = first_position(elements, SHOW_LIST, start + 1, end);

        // The count sits between the header and the show list, never inside it.
        let count_text = first_after(elements, COUNT_BLOCK, start + 1, list_pos.unwrap_or(end))
            .map(|p| normalize_whitespace(&text_of(p)))
            .unwrap_or_default();

        let shows = match list_pos {
            Some(list_pos) => {
                let nested = elements[list_pos]
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .count();
                let list_end = (list_pos + 1 + nested).min(end);
                self.parse_shows(elements, list_pos + 1, list_end, emphasis_sel)
            }
            None => Vec::new(),
        };

        log::debug!("{}: {} show(s)", date, shows.len());

        Ok(Event {
            date,
            event_count: leading_count(&count_text),
            event_count_text: count_text,
            shows,
        })
    }

    /// Parse the shows inside one show list spanning `elements[start..end]`.
    fn parse_shows(
        &self,
        elements: &[ElementRef],
        start: usize,
        end: usize,
        emphasis_sel: &Selector,
    ) -> Vec<Show> {
        let show_positions = positions(elements, SHOW_HEADER, start, end);

        show_positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                let next = show_positions.get(i + 1).copied().unwrap_or(end);
                let venue = &elements[pos];
                let info = first_after(elements, INFO_BLOCK, pos + 1, next);
                let anchor = info.unwrap_or(venue);

                let artists = anchor
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .take_while(|sibling| !is_or_contains(sibling, SHOW_HEADER))
                    .filter_map(|sibling| emphasized_text(&sibling, emphasis_sel))
                    .map(|raw| clean_artist_name(&raw))
                    .filter(|name| !name.is_empty())
                    .collect();

                Show {
                    location: normalize_whitespace(&text_of(venue)),
                    artists,
                    info: info
                        .map(|p| normalize_whitespace(&text_of(p)))
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect()
}

fn positions(elements: &[ElementRef], tag: &str, start: usize, end: usize) -> Vec<usize> {
    (start..end.min(elements.len()))
        .filter(|&i| elements[i].value().name() == tag)
        .collect()
}

fn first_position(elements: &[ElementRef], tag: &str, start: usize, end: usize) -> Option<usize> {
    (start..end.min(elements.len())).find(|&i| elements[i].value().name() == tag)
}

fn first_after<'a, 'b>(
    elements: &'b [ElementRef<'a>],
    tag: &str,
    start: usize,
    end: usize,
) -> Option<&'b ElementRef<'a>> {
    first_position(elements, tag, start, end).map(|i| &elements[i])
}

fn is_or_contains(element: &ElementRef, tag: &str) -> bool {
    element.value().name() == tag
        || element
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|e| e.value().name() == tag)
}

/// Text of the element itself when it is emphasis, else of its first
/// emphasized descendant.
fn emphasized_text(element: &ElementRef, emphasis_sel: &Selector) -> Option<String> {
    if element.value().name() == EMPHASIS {
        return Some(text_of(element));
    }
    element.select(emphasis_sel).next().map(|e| text_of(&e))
}

/// Leading integer of the count paragraph ("4 events" -> 4); 0 if absent.
fn leading_count(text: &str) -> u32 {
    text.split_whitespace()
        .find_map(|word| {
            let digits: String = word.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .unwrap_or(0)
}
