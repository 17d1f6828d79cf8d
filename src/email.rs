//! Email loading: `.eml` files into subject/sender/date/plain-text body

use chrono::NaiveDate;
use mailparse::{MailHeaderMap, ParsedMail};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::types::ValidationError;
use crate::utils::validation::parse_observed_date;

/// Errors that can occur while loading emails
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed email: {0}")]
    Parse(#[from] mailparse::MailParseError),
}

/// A parsed email reduced to what receipt detection needs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmailMessage {
    pub subject: String,
    pub from: String,
    /// Raw `Date` header
    pub date: String,
    /// Text content with markup, links and blank-line runs removed
    pub body: String,
}

impl EmailMessage {
    /// Calendar date the email was sent, in the sender's offset
    pub fn observed_date(&self) -> Result<NaiveDate, ValidationError> {
        parse_observed_date(&self.date)
    }

    /// Headers and body laid out as plain text for a language model
    pub fn to_prompt_text(&self) -> String {
        format!(
            "Subject: {}\nFrom: {}\nDate: {}\n\n{}",
            self.subject, self.from, self.date, self.body
        )
    }
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^\s>][^>]*>").expect("valid regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\n\s*){2,}").expect("valid regex"))
}

/// Strip markup and links from an email body
pub fn scrub_body(raw: &str) -> String {
    let text = script_style_re().replace_all(raw, "");
    let text = comment_re().replace_all(&text, "");
    let text = tag_re().replace_all(&text, "");
    let text = link_re().replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("\r\n", "\n");
    blank_lines_re().replace_all(&text, "\n").trim().to_string()
}

/// Concatenate every text/plain and text/html part
fn collect_text(mail: &ParsedMail, out: &mut String) {
    if mail.subparts.is_empty() {
        let mime = mail.ctype.mimetype.to_ascii_lowercase();
        if mime == "text/plain" || mime == "text/html" {
            match mail.get_body() {
                Ok(body) => {
                    out.push_str(&body);
                    out.push('\n');
                }
                Err(e) => debug!("skipping undecodable {} part: {}", mime, e),
            }
        }
        return;
    }
    for part in &mail.subparts {
        collect_text(part, out);
    }
}

/// Parse raw `.eml` bytes
pub fn parse_eml(raw: &[u8]) -> Result<EmailMessage, EmailError> {
    let mail = mailparse::parse_mail(raw)?;
    let header = |name: &str| mail.headers.get_first_value(name).unwrap_or_default();

    let mut body = String::new();
    collect_text(&mail, &mut body);

    Ok(EmailMessage {
        subject: header("Subject"),
        from: header("From"),
        date: header("Date"),
        body: scrub_body(&body),
    })
}

/// Parse every `*.eml` file in a directory, in file-name order.
///
/// Files that cannot be read or parsed are logged and skipped.
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<EmailMessage>, EmailError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    paths.sort();

    let mut emails = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = std::fs::read(&path)
            .map_err(EmailError::from)
            .and_then(|bytes| parse_eml(&bytes));
        match parsed {
            Ok(email) => emails.push(email),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    debug!("Loaded {} emails", emails.len());
    Ok(emails)
}
