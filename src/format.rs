//! Locale-sensitive formatting (C10) and HTML escaping (§4.5).
//!
//! `FormatSettings` is an explicit, cloneable handle — no global or
//! thread-local state — threaded through compile/render by the caller.

use std::collections::HashMap;
use std::rc::Rc;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;

use crate::value::Value;

/// A `now()` source for filters that need the current moment. The
/// baseline filter library doesn't use this yet, but it's the seam
/// `date`/`time`/`datetime` filters and the `Date`/`DateTime`/`Time`
/// scalars format through.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Clone)]
pub struct FormatSettings {
    pub decimal_separator: char,
    pub thousands_separator: char,
    pub currency_symbol: String,
    /// `strftime`-compatible short-date format, e.g. `"%Y-%m-%d"`.
    pub short_date_format: String,
    pub clock: Rc<dyn Clock>,
}

impl Default for FormatSettings {
    fn default() -> FormatSettings {
        FormatSettings {
            decimal_separator: '.',
            thousands_separator: ',',
            currency_symbol: String::new(),
            short_date_format: "%Y-%m-%d".to_string(),
            clock: Rc::new(SystemClock),
        }
    }
}

impl FormatSettings {
    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(&self.short_date_format).to_string()
    }

    pub fn format_time(&self, time: NaiveTime) -> String {
        time.format("%H:%M:%S").to_string()
    }

    pub fn format_datetime(&self, dt: NaiveDateTime) -> String {
        dt.format(&format!("{} %H:%M:%S", self.short_date_format)).to_string()
    }

    pub fn format_currency(&self, minor_units: i64) -> String {
        let major = minor_units / 100;
        let cents = (minor_units % 100).abs();
        format!("{}{}{}{:02}", self.currency_symbol, major, self.decimal_separator, cents)
    }

    /// Render a [`Value`] through locale-sensitive formatting, falling
    /// back to [`Value::to_display_string`] for kinds with no special
    /// formatting rule.
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Date(d) => self.format_date(*d),
            Value::Time(t) => self.format_time(*t),
            Value::DateTime(dt) => self.format_datetime(*dt),
            Value::Currency(minor) => self.format_currency(*minor),
            other => other.to_display_string(),
        }
    }
}

lazy_static! {
    /// Latin-1 named-entity table used by HTML escaping, keyed by code
    /// point (0xA0..=0xFF, minus the entries handled by the primary
    /// escape table below).
    static ref LATIN1_ENTITIES: HashMap<u32, &'static str> = {
        let mut m = HashMap::new();
        m.insert(0x00A0, "nbsp");
        m.insert(0x00A1, "iexcl");
        m.insert(0x00A2, "cent");
        m.insert(0x00A3, "pound");
        m.insert(0x00A4, "curren");
        m.insert(0x00A5, "yen");
        m.insert(0x00A6, "brvbar");
        m.insert(0x00A7, "sect");
        m.insert(0x00A8, "uml");
        m.insert(0x00A9, "copy");
        m.insert(0x00AA, "ordf");
        m.insert(0x00AB, "laquo");
        m.insert(0x00AC, "not");
        m.insert(0x00AD, "shy");
        m.insert(0x00AE, "reg");
        m.insert(0x00AF, "macr");
        m.insert(0x00B0, "deg");
        m.insert(0x00B1, "plusmn");
        m.insert(0x00B2, "sup2");
        m.insert(0x00B3, "sup3");
        m.insert(0x00B4, "acute");
        m.insert(0x00B5, "micro");
        m.insert(0x00B6, "para");
        m.insert(0x00B7, "middot");
        m.insert(0x00B8, "cedil");
        m.insert(0x00B9, "sup1");
        m.insert(0x00BA, "ordm");
        m.insert(0x00BB, "raquo");
        m.insert(0x00BC, "frac14");
        m.insert(0x00BD, "frac12");
        m.insert(0x00BE, "frac34");
        m.insert(0x00BF, "iquest");
        m.insert(0x00D7, "times");
        m.insert(0x00F7, "divide");
        m
    };
}

const EURO_CODE_POINT: u32 = 0x20AC;

/// HTML-escape `text`: the five standard special characters, the
/// Latin-1 named-entity table, the Euro sign, and everything else above
/// 0xFF as a numeric character reference.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => {
                let code = c as u32;
                if code == EURO_CODE_POINT {
                    out.push_str("&euro;");
                } else if let Some(name) = LATIN1_ENTITIES.get(&code) {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                } else if code > 0xFF {
                    out.push_str(&format!("&#{code};"));
                } else {
                    out.push(c);
                }
            }
        }
    }
    out
}
