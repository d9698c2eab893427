use crate::error::{NotionAssistantError, Result};
use crate::types::{LogEntry, NotionBlock, PageContent};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Splits a journal page into dated entries at date headings.
pub struct LogEntryParser {
    date_patterns: Vec<DatePattern>,
    default_year: i32,
}

#[derive(Clone, Copy)]
enum DateFormat {
    /// 2024-03-28
    Iso,
    /// 28 Mar 2024, 28 March 2024
    DayMonthYear,
    /// 3/28 or 3-28, year taken from the parser
    MonthDay,
}

struct DatePattern {
    regex: Regex,
    format: DateFormat,
}

impl LogEntryParser {
    pub fn new(default_year: Option<i32>) -> Result<Self> {
        // Most specific first so "2024-03-28" is never read as "24-03".
        let date_patterns = vec![
            DatePattern {
                regex: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap(),
                format: DateFormat::Iso,
            },
            DatePattern {
                regex: Regex::new(
                    r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{4})\b",
                )
                .unwrap(),
                format: DateFormat::DayMonthYear,
            },
            DatePattern {
                regex: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})\b").unwrap(),
                format: DateFormat::MonthDay,
            },
        ];

        let default_year = default_year.unwrap_or_else(|| chrono::Local::now().year());
        if !(1..=9999).contains(&default_year) {
            return Err(NotionAssistantError::Config {
                reason: format!("Default year {} is out of range", default_year),
            });
        }

        Ok(Self {
            date_patterns,
            default_year,
        })
    }

    pub fn parse_entries(&self, page: &PageContent) -> Vec<LogEntry> {
        info!("Parsing log entries from page: {}", page.title);

        let mut entries = Vec::new();
        let mut current: Option<(NaiveDate, Vec<NotionBlock>)> = None;

        for block in &page.blocks {
            if self.is_date_heading(block) {
                if let Some((date, blocks)) = current.take() {
                    entries.push(LogEntry::new(date, blocks));
                }

                let text = block.plain_text();
                match self.parse_date(&text) {
                    Some(date) => current = Some((date, vec![block.clone()])),
                    None => warn!("Ignoring heading with an impossible date: {}", text),
                }
            } else if let Some((_, blocks)) = current.as_mut() {
                blocks.push(block.clone());
            }
        }

        if let Some((date, blocks)) = current {
            entries.push(LogEntry::new(date, blocks));
        }

        debug!("Found {} log entries", entries.len());
        entries
    }

    pub fn is_date_heading(&self, block: &NotionBlock) -> bool {
        if !block.is_heading() {
            return false;
        }
        let text = block.plain_text();
        self.date_patterns
            .iter()
            .any(|pattern| pattern.regex.is_match(&text))
    }

    /// Returns the first date found in `text`, trying formats in order.
    /// A match that names an impossible day yields `None`.
    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let (pattern, captures) = self
            .date_patterns
            .iter()
            .find_map(|pattern| pattern.regex.captures(text).map(|c| (pattern, c)))?;

        let number = |i: usize| captures.get(i)?.as_str().parse::<u32>().ok();

        match pattern.format {
            DateFormat::Iso => {
                NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)
            }
            DateFormat::DayMonthYear => {
                let month = Self::month_number(captures.get(2)?.as_str())?;
                NaiveDate::from_ymd_opt(number(3)? as i32, month, number(1)?)
            }
            DateFormat::MonthDay => {
                NaiveDate::from_ymd_opt(self.default_year, number(1)?, number(2)?)
            }
        }
    }

    fn month_number(name: &str) -> Option<u32> {
        let month = match name.to_ascii_lowercase().get(..3)? {
            "jan" => 1,
            "feb" => 2,
            "mar" => 3,
            "apr" => 4,
            "may" => 5,
            "jun" => 6,
            "jul" => 7,
            "aug" => 8,
            "sep" => 9,
            "oct" => 10,
            "nov" => 11,
            "dec" => 12,
            _ => return None,
        };
        Some(month)
    }

    pub fn get_parsing_stats(&self, entries: &[LogEntry]) -> HashMap<String, serde_json::Value> {
        let mut stats = HashMap::new();

        stats.insert("total_entries".to_string(), entries.len().into());

        let total_blocks: usize = entries.iter().map(|e| e.blocks.len()).sum();
        stats.insert("total_blocks".to_string(), total_blocks.into());

        let avg_blocks_per_entry = if entries.is_empty() {
            0.0
        } else {
            total_blocks as f64 / entries.len() as f64
        };
        stats.insert("avg_blocks_per_entry".to_string(), avg_blocks_per_entry.into());

        if let (Some(first), Some(last)) = (
            entries.iter().map(|e| e.date).min(),
            entries.iter().map(|e| e.date).max(),
        ) {
            stats.insert("first_date".to_string(), first.to_string().into());
            stats.insert("last_date".to_string(), last.to_string().into());
        }

        stats
    }
}
