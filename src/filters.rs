//! The filter pipeline (C7): a case-insensitive registry of named pure
//! functions applied to a value with a resolved parameter list, plus the
//! baseline filter library described in SPEC_FULL.md §4.4.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;
use crate::format::{html_escape, FormatSettings};
use crate::value::Value;

pub type Filter = Rc<dyn Fn(&Value, &[Value], &FormatSettings) -> Result<Value, RenderError>>;

/// Case-insensitive filter name -> function map. Duplicate registration
/// replaces the prior entry.
pub struct FilterRegistry {
    filters: HashMap<String, Filter>,
}

impl Default for FilterRegistry {
    fn default() -> FilterRegistry {
        let mut registry = FilterRegistry { filters: HashMap::new() };
        registry.register_defaults();
        registry
    }
}

impl FilterRegistry {
    pub fn new() -> FilterRegistry {
        FilterRegistry { filters: HashMap::new() }
    }

    pub fn register(&mut self, name: &str, f: impl Fn(&Value, &[Value], &FormatSettings) -> Result<Value, RenderError> + 'static) {
        self.filters.insert(name.to_ascii_lowercase(), Rc::new(f));
    }

    pub fn call(
        &self,
        name: &str,
        value: &Value,
        params: &[Value],
        settings: &FormatSettings,
    ) -> Result<Value, RenderError> {
        let f = self.filters.get(&name.to_ascii_lowercase()).ok_or_else(|| RenderError::Filter {
            filter: name.to_string(),
            message: "unknown filter".to_string(),
        })?;
        f(value, params, settings)
    }

    fn register_defaults(&mut self) {
        self.register("uppercase", |v, _, _| Ok(Value::string(v.to_display_string().to_uppercase())));
        self.register("lowercase", |v, _, _| Ok(Value::string(v.to_display_string().to_lowercase())));
        self.register("capitalize", |v, _, _| Ok(Value::string(capitalize(&v.to_display_string()))));
        self.register("trim", |v, _, _| Ok(Value::string(v.to_display_string().trim().to_string())));
        self.register("ltrim", |v, _, _| Ok(Value::string(v.to_display_string().trim_start().to_string())));
        self.register("rtrim", |v, _, _| Ok(Value::string(v.to_display_string().trim_end().to_string())));
        self.register("padleft", |v, params, _| pad(v, params, true));
        self.register("padright", |v, params, _| pad(v, params, false));
        self.register("substr", |v, params, _| substr(v, params));
        self.register("length", |v, _, _| Ok(Value::Integer(v.to_display_string().chars().count() as i64)));
        self.register("contains", |v, params, _| {
            let needle = param_string(params, 0, "contains")?;
            Ok(Value::Boolean(v.to_display_string().contains(&needle)))
        });
        self.register("startswith", |v, params, _| {
            let needle = param_string(params, 0, "startswith")?;
            Ok(Value::Boolean(v.to_display_string().starts_with(&needle)))
        });
        self.register("endswith", |v, params, _| {
            let needle = param_string(params, 0, "endswith")?;
            Ok(Value::Boolean(v.to_display_string().ends_with(&needle)))
        });
        self.register("isempty", |v, _, _| Ok(Value::Boolean(!v.has_value() || v.to_display_string().is_empty())));
        self.register("number", |v, params, _| number(v, params));
        self.register("currency", |v, _, settings| currency(v, settings));
        self.register("date", |v, _, settings| match v {
            Value::Date(d) => Ok(Value::string(settings.format_date(*d))),
            Value::DateTime(dt) => Ok(Value::string(settings.format_date(dt.date()))),
            other => Ok(Value::string(other.to_display_string())),
        });
        self.register("time", |v, _, settings| match v {
            Value::Time(t) => Ok(Value::string(settings.format_time(*t))),
            Value::DateTime(dt) => Ok(Value::string(settings.format_time(dt.time()))),
            other => Ok(Value::string(other.to_display_string())),
        });
        self.register("datetime", |v, _, settings| match v {
            Value::DateTime(dt) => Ok(Value::string(settings.format_datetime(*dt))),
            other => Ok(Value::string(other.to_display_string())),
        });
        self.register("htmlescape", |v, _, settings| Ok(Value::string(html_escape(&settings.format_value(v)))));
        self.register("jsonescape", |v, _, _| Ok(Value::string(json_escape(&v.to_display_string()))));
        self.register("count", |v, _, _| Ok(Value::Integer(v.len().unwrap_or(0) as i64)));
        self.register("eq", |v, params, settings| compare_filter(v, params, settings, "eq", |o| o == Ordering::Equal, false));
        self.register("ne", |v, params, settings| compare_filter(v, params, settings, "ne", |o| o != Ordering::Equal, true));
        self.register("gt", |v, params, settings| compare_filter(v, params, settings, "gt", |o| o == Ordering::Greater, false));
        self.register("ge", |v, params, settings| {
            compare_filter(v, params, settings, "ge", |o| o != Ordering::Less, false)
        });
        self.register("lt", |v, params, settings| compare_filter(v, params, settings, "lt", |o| o == Ordering::Less, false));
        self.register("le", |v, params, settings| {
            compare_filter(v, params, settings, "le", |o| o != Ordering::Greater, false)
        });
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn param_string(params: &[Value], index: usize, filter: &str) -> Result<String, RenderError> {
    params
        .get(index)
        .map(|v| v.to_display_string())
        .ok_or_else(|| RenderError::Filter { filter: filter.to_string(), message: "missing parameter".to_string() })
}

fn param_int(params: &[Value], index: usize, filter: &str) -> Result<i64, RenderError> {
    match params.get(index) {
        Some(Value::Integer(n)) => Ok(*n),
        Some(other) => other.to_display_string().parse().map_err(|_| RenderError::Filter {
            filter: filter.to_string(),
            message: "expected integer parameter".to_string(),
        }),
        None => Err(RenderError::Filter { filter: filter.to_string(), message: "missing parameter".to_string() }),
    }
}

fn pad(v: &Value, params: &[Value], left: bool) -> Result<Value, RenderError> {
    let width = param_int(params, 0, if left { "padleft" } else { "padright" })? as usize;
    let pad_char = params.get(1).map(|v| v.to_display_string()).and_then(|s| s.chars().next()).unwrap_or(' ');
    let text = v.to_display_string();
    let deficit = width.saturating_sub(text.chars().count());
    let padding: String = std::iter::repeat(pad_char).take(deficit).collect();
    Ok(Value::string(if left { format!("{padding}{text}") } else { format!("{text}{padding}") }))
}

fn substr(v: &Value, params: &[Value]) -> Result<Value, RenderError> {
    let start = param_int(params, 0, "substr")?.max(0) as usize;
    let text: Vec<char> = v.to_display_string().chars().collect();
    let end = match params.get(1) {
        Some(_) => (start + param_int(params, 1, "substr")?.max(0) as usize).min(text.len()),
        None => text.len(),
    };
    if start >= text.len() {
        return Ok(Value::string(""));
    }
    Ok(Value::string(text[start..end].iter().collect::<String>()))
}

fn number(v: &Value, params: &[Value]) -> Result<Value, RenderError> {
    let decimals = match params.first() {
        Some(_) => param_int(params, 0, "number")?.max(0) as usize,
        None => 0,
    };
    let value = match v {
        Value::Integer(n) => *n as f64,
        Value::Float(f) => *f,
        other => other.to_display_string().parse().map_err(|_| RenderError::Filter {
            filter: "number".to_string(),
            message: "expected numeric value".to_string(),
        })?,
    };
    Ok(Value::string(format!("{value:.decimals$}")))
}

fn currency(v: &Value, settings: &FormatSettings) -> Result<Value, RenderError> {
    match v {
        Value::Currency(minor) => Ok(Value::string(settings.format_currency(*minor))),
        Value::Integer(n) => Ok(Value::string(settings.format_currency(n * 100))),
        Value::Float(f) => Ok(Value::string(settings.format_currency((f * 100.0).round() as i64))),
        other => Err(RenderError::Filter {
            filter: "currency".to_string(),
            message: format!("cannot format {other:?} as currency"),
        }),
    }
}

fn json_escape(s: &str) -> String {
    let quoted = serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"));
    quoted.trim_start_matches('"').trim_end_matches('"').to_string()
}

fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(n) => Some(*n),
        Value::Float(f) => Some(*f as i64),
        other => other.to_display_string().parse().ok(),
    }
}

fn coerce_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        other => other.to_display_string().parse().ok(),
    }
}

/// Compare `value` against `param` per SPEC_FULL.md §6's comparison-filter
/// contract. Returns `None` if `value` is `Empty` (a missing variable),
/// which the caller resolves to a per-operator default.
fn compare(value: &Value, param: &Value, settings: &FormatSettings) -> Option<Ordering> {
    if !value.has_value() {
        return None;
    }
    match value {
        Value::Integer(a) => coerce_i64(param).map(|b| a.cmp(&b)),
        Value::Float(a) => coerce_f64(param).and_then(|b| a.partial_cmp(&b)),
        Value::Date(d) => Some(settings.format_date(*d).cmp(&param.to_display_string())),
        Value::DateTime(dt) => Some(settings.format_datetime(*dt).cmp(&param.to_display_string())),
        Value::Time(t) => Some(settings.format_time(*t).cmp(&param.to_display_string())),
        other => Some(other.to_display_string().cmp(&param.to_display_string())),
    }
}

fn compare_filter(
    v: &Value,
    params: &[Value],
    settings: &FormatSettings,
    name: &str,
    test: impl Fn(Ordering) -> bool,
    default_on_missing: bool,
) -> Result<Value, RenderError> {
    let param = params
        .first()
        .ok_or_else(|| RenderError::Filter { filter: name.to_string(), message: "missing comparand".to_string() })?;
    Ok(Value::Boolean(match compare(v, param, settings) {
        Some(ordering) => test(ordering),
        None => default_on_missing,
    }))
}
