//! Registration date and registrar extraction from unstructured text.
//!
//! Both WHOIS replies and scraped lookup pages end up here. Extraction is a
//! fixed, ordered list of labelled patterns; the first pattern that yields a
//! valid calendar date wins, regardless of where in the text it matched.
//!
//! Date pattern order:
//! 1. `Creation Date`
//! 2. `Registration Date`
//! 3. `Registration Time`
//! 4. `Record created on`
//! 5. `Registered on` (`09-Mar-2001` style)
//! 6. CJK labels (`註冊日期`, `注册时间`, `登録年月日`, ...) with `年月日` or `./-` separators
//!
//! Registrar pattern order: `Registrar`, `Registrar Name`, `Sponsoring Registrar`,
//! `Registration Service Provider`.

use chrono::NaiveDate;
use regex::Regex;

/// How a date pattern's captures turn into `YYYY-MM-DD`.
enum DateCapture {
    /// Groups 1, 2 and 3 are year, month and day; month and day may be unpadded.
    YearMonthDay,
    /// Group 1 is a complete date in the given chrono format.
    Formatted(&'static str),
}

struct DatePattern {
    label: &'static str,
    regex: Regex,
    capture: DateCapture,
}

const YMD: &str = r"(\d{4})\s*[-/.]\s*(\d{1,2})\s*[-/.]\s*(\d{1,2})";

lazy_static::lazy_static! {
    static ref DATE_PATTERNS: Vec<DatePattern> = vec![
        DatePattern {
            label: "Creation Date",
            regex: Regex::new(&format!(r"(?i)creation\s+date[ \t]*[:：]?[ \t]*{}", YMD)).unwrap(),
            capture: DateCapture::YearMonthDay,
        },
        DatePattern {
            label: "Registration Date",
            regex: Regex::new(&format!(r"(?i)registration\s+date[ \t]*[:：]?[ \t]*{}", YMD)).unwrap(),
            capture: DateCapture::YearMonthDay,
        },
        DatePattern {
            label: "Registration Time",
            regex: Regex::new(&format!(r"(?i)registration\s+time[ \t]*[:：]?[ \t]*{}", YMD)).unwrap(),
            capture: DateCapture::YearMonthDay,
        },
        DatePattern {
            label: "Record created on",
            regex: Regex::new(&format!(r"(?i)record\s+created\s+on[ \t]*[:：]?[ \t]*{}", YMD)).unwrap(),
            capture: DateCapture::YearMonthDay,
        },
        DatePattern {
            label: "Registered on",
            regex: Regex::new(r"(?i)registered\s+on[ \t]*[:：]?[ \t]*(\d{1,2}-[a-z]{3}-\d{4})").unwrap(),
            capture: DateCapture::Formatted("%d-%b-%Y"),
        },
        DatePattern {
            label: "CJK registration label",
            regex: Regex::new(
                r"(?:註冊日期|注册日期|註冊時間|注册时间|創建日期|创建日期|登録年月日)[\]】]?[ \t]*[:：]?[ \t]*(\d{4})\s*[年./-]\s*(\d{1,2})\s*[月./-]\s*(\d{1,2})"
            ).unwrap(),
            capture: DateCapture::YearMonthDay,
        },
    ];

    static ref REGISTRAR_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?im)^[ \t]*Registrar[ \t]*[:：][ \t]*(\S[^\r\n]*)").unwrap(),
        Regex::new(r"(?im)^[ \t]*Registrar[ \t]+Name[ \t]*[:：][ \t]*(\S[^\r\n]*)").unwrap(),
        Regex::new(r"(?im)^[ \t]*Sponsoring[ \t]+Registrar[ \t]*[:：][ \t]*(\S[^\r\n]*)").unwrap(),
        Regex::new(r"(?im)^[ \t]*Registration[ \t]+Service[ \t]+Provider[ \t]*[:：][ \t]*(\S[^\r\n]*)").unwrap(),
    ];

    static ref SCRIPT_OR_STYLE: Regex =
        Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)\s*>").unwrap();
    static ref LINE_BREAK_TAG: Regex =
        Regex::new(r"(?i)<\s*(?:br|/p|/div|/tr|/li|/h[1-6]|/dt|/dd|/pre|/table)\b[^>]*>").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Extract a registration date as `YYYY-MM-DD`.
///
/// ```rust
/// use domain_verify_lib::extract_date;
///
/// assert_eq!(extract_date("Creation Date: 2023-1-5T00:00:00Z").as_deref(), Some("2023-01-05"));
/// assert_eq!(extract_date("no dates here"), None);
/// ```
pub fn extract_date(text: &str) -> Option<String> {
    for pattern in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(text) else {
            continue;
        };

        let date = calendar_date(&pattern.capture, &caps);

        match date {
            Some(date) => {
                tracing::debug!(pattern = pattern.label, %date, "registration date matched");
                return Some(date.format("%Y-%m-%d").to_string());
            }
            None => {
                tracing::debug!(pattern = pattern.label, "matched text is not a calendar date");
            }
        }
    }

    None
}

fn calendar_date(capture: &DateCapture, caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    match capture {
        DateCapture::YearMonthDay => {
            let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
            let month = caps.get(2)?.as_str().parse::<u32>().ok()?;
            let day = caps.get(3)?.as_str().parse::<u32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateCapture::Formatted(format) => {
            NaiveDate::parse_from_str(caps.get(1)?.as_str(), format).ok()
        }
    }
}

/// Extract the registrar name from a `Registrar:`-style line.
pub fn extract_registrar(text: &str) -> Option<String> {
    REGISTRAR_PATTERNS.iter().find_map(|re| {
        let raw = re.captures(text)?.get(1)?.as_str();
        let name = raw.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}

/// Reduce an HTML page to text lines that the extractors can read.
///
/// Script and style bodies are dropped, block-level closing tags become line
/// breaks, every other tag becomes a space and a handful of entities are decoded.
pub fn strip_markup(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = LINE_BREAK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, " ");

    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
