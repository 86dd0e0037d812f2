//! Path template resolution
//!
//! Templates contain `${Name}` or `${Name:Format}` macros:
//!
//! - `${VirtualHost}` - virtual host name
//! - `${Application}` - application name, without the `#<host>#` prefix
//! - `${Stream}` - stream name
//! - `${Sequence}` - sequence number, always `0`
//! - `${StartTime:YYYYMMDDhhmmss}` / `${EndTime:...}` - local time, where
//!   `YYYY` year, `MM` month, `DD` day, `hh` hour (00-23), `mm` minute and
//!   `ss` second are replaced by zero-padded fields
//!
//! Unknown macros are left in the output untouched. Substituted text is never
//! scanned again.

use crate::config::StreamIdentity;
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Time format used by `${StartTime}` / `${EndTime}` without a format
pub const DEFAULT_TIME_FORMAT: &str = "YYYYMMDDhhmmss";

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct MacroContext<'a> {
    pub virtual_host: &'a str,
    /// Application name with the host prefix already removed
    pub application: &'a str,
    pub stream: &'a str,
    pub now: NaiveDateTime,
}

impl<'a> MacroContext<'a> {
    pub fn new(identity: &'a StreamIdentity, now: NaiveDateTime) -> Self {
        Self {
            virtual_host: &identity.virtual_host,
            application: identity.application_name(),
            stream: &identity.stream,
            now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Macro<'t> {
    VirtualHost,
    Application,
    Stream,
    Sequence,
    StartTime(&'t str),
    EndTime(&'t str),
}

impl<'t> Macro<'t> {
    fn parse(body: &'t str) -> Option<Self> {
        let (name, format) = match body.split_once(':') {
            Some((name, format)) => (name, Some(format)),
            None => (body, None),
        };

        match (name, format) {
            ("VirtualHost", None) => Some(Macro::VirtualHost),
            ("Application", None) => Some(Macro::Application),
            ("Stream", None) => Some(Macro::Stream),
            ("Sequence", None) => Some(Macro::Sequence),
            ("StartTime", format) => Some(Macro::StartTime(format.unwrap_or(DEFAULT_TIME_FORMAT))),
            ("EndTime", format) => Some(Macro::EndTime(format.unwrap_or(DEFAULT_TIME_FORMAT))),
            _ => None,
        }
    }

    fn expand(self, ctx: &MacroContext<'_>) -> String {
        match self {
            Macro::VirtualHost => ctx.virtual_host.to_string(),
            Macro::Application => ctx.application.to_string(),
            Macro::Stream => ctx.stream.to_string(),
            // No per-recording counter exists yet
            Macro::Sequence => "0".to_string(),
            Macro::StartTime(format) | Macro::EndTime(format) => format_time(format, ctx.now),
        }
    }
}

/// Replace the date/time placeholders in `format`. Other text passes through.
fn format_time(format: &str, now: NaiveDateTime) -> String {
    format
        .replace("YYYY", &format!("{:04}", now.year()))
        .replace("MM", &format!("{:02}", now.month()))
        .replace("DD", &format!("{:02}", now.day()))
        .replace("hh", &format!("{:02}", now.hour()))
        .replace("mm", &format!("{:02}", now.minute()))
        .replace("ss", &format!("{:02}", now.second()))
}

fn is_body_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b':'
}

/// Length of the `${body}` token at the start of `rest`, with its body
fn scan_token(rest: &str) -> Option<(usize, &str)> {
    let bytes = rest.as_bytes();
    if !rest.starts_with("${") {
        return None;
    }

    let body_len = bytes[2..].iter().take_while(|&&c| is_body_char(c)).count();
    if body_len == 0 || bytes.get(2 + body_len) != Some(&b'}') {
        return None;
    }

    Some((body_len + 3, &rest[2..2 + body_len]))
}

/// Resolve every macro in `template` against `ctx`
pub fn resolve(template: &str, ctx: &MacroContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    while let Some(offset) = template[pos..].find('$') {
        let start = pos + offset;
        out.push_str(&template[pos..start]);

        match scan_token(&template[start..]) {
            Some((len, body)) => {
                let token = &template[start..start + len];
                match Macro::parse(body) {
                    Some(m) => out.push_str(&m.expand(ctx)),
                    None => out.push_str(token),
                }
                pos = start + len;
            }
            None => {
                out.push('$');
                pos = start + 1;
            }
        }
    }
    out.push_str(&template[pos..]);

    tracing::debug!("Resolved path template {:?} -> {:?}", template, out);

    out
}
