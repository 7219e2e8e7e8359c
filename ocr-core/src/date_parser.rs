use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of date formats the parser may try, named the way the
/// configuration schema spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    DdMmYyyySlash,
    DdMmYySlash,
    DdMmYyyyDot,
    DdMmYyyyDash,
    YyyyMmDdDash,
}

impl DateFormat {
    fn all() -> &'static [DateFormat] {
        &[
            DateFormat::DdMmYyyySlash,
            DateFormat::DdMmYySlash,
            DateFormat::DdMmYyyyDot,
            DateFormat::DdMmYyyyDash,
            DateFormat::YyyyMmDdDash,
        ]
    }

    fn pattern(self) -> &'static str {
        match self {
            DateFormat::DdMmYyyySlash => r"(\d{1,2})/(\d{1,2})/(\d{4})",
            DateFormat::DdMmYySlash => r"(\d{1,2})/(\d{1,2})/(\d{2})\b",
            DateFormat::DdMmYyyyDot => r"(\d{1,2})\.(\d{1,2})\.(\d{4})",
            DateFormat::DdMmYyyyDash => r"(\d{1,2})-(\d{1,2})-(\d{4})",
            DateFormat::YyyyMmDdDash => r"(\d{4})-(\d{1,2})-(\d{1,2})",
        }
    }

    /// Canonical reformat used for the round-trip law: formatting a parsed
    /// date back with the format that matched it must reproduce the same
    /// date.
    fn format(self, date: NaiveDate) -> String {
        match self {
            DateFormat::DdMmYyyySlash => date.format("%d/%m/%Y").to_string(),
            DateFormat::DdMmYySlash => date.format("%d/%m/%y").to_string(),
            DateFormat::DdMmYyyyDot => date.format("%d.%m.%Y").to_string(),
            DateFormat::DdMmYyyyDash => date.format("%d-%m-%Y").to_string(),
            DateFormat::YyyyMmDdDash => date.format("%Y-%m-%d").to_string(),
        }
    }

    fn extract(self, captures: &regex::Captures) -> Option<NaiveDate> {
        let a: i32 = captures.get(1)?.as_str().parse().ok()?;
        let b: u32 = captures.get(2)?.as_str().parse().ok()?;
        let c: i32 = captures.get(3)?.as_str().parse().ok()?;
        match self {
            DateFormat::YyyyMmDdDash => NaiveDate::from_ymd_opt(a, b, c as u32),
            DateFormat::DdMmYySlash => {
                let year = if c < 70 { 2000 + c } else { 1900 + c };
                NaiveDate::from_ymd_opt(year, b, a as u32)
            }
            _ => NaiveDate::from_ymd_opt(c, b, a as u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateParserConfig {
    #[serde(default = "DateFormat::all_vec")]
    pub date_formats: Vec<DateFormat>,
    pub min_year: i32,
    pub max_year: i32,
    #[serde(default = "default_true")]
    pub allow_past: bool,
}

fn default_true() -> bool {
    true
}

impl DateFormat {
    fn all_vec() -> Vec<DateFormat> {
        Self::all().to_vec()
    }
}

impl Default for DateParserConfig {
    fn default() -> Self {
        Self {
            date_formats: DateFormat::all_vec(),
            min_year: 1970,
            max_year: 2100,
            allow_past: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub date_str: String,
    pub parse_confidence: f32,
}

pub struct DateParser {
    config: DateParserConfig,
    ambiguity_map: Vec<(char, char)>,
}

impl DateParser {
    pub fn new(config: DateParserConfig) -> Self {
        Self {
            config,
            ambiguity_map: vec![('O', '0'), ('I', '1'), ('l', '1'), ('S', '5'), ('B', '8')],
        }
    }

    /// Tries each configured format, validates the year range and
    /// (optionally) rejects past dates, and returns the most confident
    /// candidate. Confidence is `1 - edit_distance / len` between the
    /// matched substring and its canonical reformat.
    pub fn parse(&self, text: &str, today: NaiveDate) -> Option<ParsedDate> {
        let prepared = self.apply_ambiguity_map(text);
        let mut best: Option<ParsedDate> = None;
        for format in &self.config.date_formats {
            let re = Regex::new(format.pattern()).expect("static pattern is valid");
            for captures in re.captures_iter(&prepared) {
                let Some(date) = format.extract(&captures) else {
                    continue;
                };
                if date.year() < self.config.min_year || date.year() > self.config.max_year {
                    continue;
                }
                if !self.config.allow_past && date < today {
                    continue;
                }
                let matched = captures.get(0).unwrap().as_str();
                let canonical = format.format(date);
                let distance = edit_distance(matched, &canonical);
                let confidence = 1.0 - (distance as f32 / canonical.len().max(1) as f32);
                let candidate = ParsedDate {
                    date,
                    date_str: canonical,
                    parse_confidence: confidence.clamp(0.0, 1.0),
                };
                if best.as_ref().map(|b| candidate.parse_confidence > b.parse_confidence).unwrap_or(true) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn apply_ambiguity_map(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(chars.len());
        for i in 0..chars.len() {
            let c = chars[i];
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = if i + 1 < chars.len() { Some(chars[i + 1]) } else { None };
            let flanked_by_digits = prev.map(|p| p.is_ascii_digit()).unwrap_or(false)
                && next.map(|n| n.is_ascii_digit()).unwrap_or(false);
            if flanked_by_digits {
                if let Some((_, mapped)) = self.ambiguity_map.iter().find(|(k, _)| *k == c) {
                    out.push(*mapped);
                    continue;
                }
            }
            out.push(c);
        }
        out
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());
    let mut matrix = vec![vec![0usize; lb + 1]; la + 1];
    for i in 0..=la {
        matrix[i][0] = i;
    }
    for j in 0..=lb {
        matrix[0][j] = j;
    }
    for i in 1..=la {
        for j in 1..=lb {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[la][lb]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DateParserConfig {
        DateParserConfig { min_year: 2024, max_year: 2030, allow_past: false, ..Default::default() }
    }

    #[test]
    fn rejects_dates_outside_year_window_or_past() {
        let parser = DateParser::new(config());
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        assert!(parser.parse("01/01/2023", today).is_none());
    }

    #[test]
    fn accepts_valid_future_date_with_full_confidence() {
        let parser = DateParser::new(config());
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let parsed = parser.parse("31/12/2026", today).unwrap();
        assert_eq!(parsed.parse_confidence, 1.0);
        assert_eq!(parsed.date_str, "31/12/2026");
    }

    #[test]
    fn round_trip_reformat_reparses_to_same_date() {
        let parser = DateParser::new(DateParserConfig::default());
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let parsed = parser.parse("18/06/2026", today).unwrap();
        let reparsed = parser.parse(&parsed.date_str, today).unwrap();
        assert_eq!(parsed.date, reparsed.date);
    }
}
