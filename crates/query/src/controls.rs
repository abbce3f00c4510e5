//! Search controls: what each configured filter currently shows, and how
//! user input turns into draft parameter writes.

#![forbid(unsafe_code)]

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use smallvec::{smallvec, SmallVec};
use tabula_core::{is_blank, Params, RangeUi, SearchItemConfig, SearchItemKind};
use tracing::debug;

use crate::controller::{number, ListQueryController};

const SELECT_PLACEHOLDER: &str = "— Select —";
const SLIDER_MIN: f64 = 0.0;
const SLIDER_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Current display state of one control, derived from the draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlValue {
    Text { value: String },
    Integer { value: String, min: Option<i64>, max: Option<i64> },
    Date { value: Option<NaiveDate> },
    Toggle { on: bool },
    /// `choices[0]` is the empty placeholder entry.
    Select { value: String, choices: Vec<Choice> },
    Range { lower: f64, upper: f64, min: f64, max: f64, step: Option<f64>, ui: RangeUi },
}

/// Raw user input against one control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    Text(String),
    Toggle(bool),
    Range(f64, f64),
    Clear,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("{kind} control does not accept {input}")]
    Mismatch { kind: SearchItemKind, input: &'static str },
    #[error("not a whole number: {0:?}")]
    Integer(String),
    #[error("not a date: {0:?}")]
    Date(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
}

fn text_of(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn bound(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
}

/// What `item` shows for the current draft.
pub fn control_value(item: &SearchItemConfig, draft: &Params) -> ControlValue {
    match item {
        SearchItemConfig::Text { item_value, .. } => {
            ControlValue::Text { value: draft.get(item_value).map(text_of).unwrap_or_default() }
        }
        SearchItemConfig::Integer { item_value, min, max, .. } => ControlValue::Integer {
            value: draft.get(item_value).map(text_of).unwrap_or_default(),
            min: *min,
            max: *max,
        },
        SearchItemConfig::Date { item_value, .. } => ControlValue::Date {
            value: draft.get(item_value).and_then(Value::as_str).and_then(normalize_date),
        },
        SearchItemConfig::Boolean { item_value, .. } => ControlValue::Toggle { on: truthy(draft.get(item_value)) },
        SearchItemConfig::Select { item_value, options, placeholder, .. } => {
            let mut choices = Vec::with_capacity(options.len() + 1);
            choices.push(Choice {
                value: String::new(),
                label: placeholder.clone().unwrap_or_else(|| SELECT_PLACEHOLDER.to_string()),
            });
            choices.extend(options.iter().map(|o| Choice { value: text_of(&o.value), label: o.label.clone() }));
            ControlValue::Select { value: draft.get(item_value).map(text_of).unwrap_or_default(), choices }
        }
        SearchItemConfig::Range { item_value, ui, slider_min, slider_max, slider_step, slider_default, .. } => {
            let min = slider_min.unwrap_or(SLIDER_MIN);
            let max = slider_max.unwrap_or(SLIDER_MAX);
            let lower = bound(draft.get(&item_value.lower))
                .or(slider_default.map(|d| d.0))
                .unwrap_or(min);
            let upper = bound(draft.get(&item_value.upper))
                .or(slider_default.map(|d| d.1))
                .unwrap_or(max);
            ControlValue::Range { lower, upper, min, max, step: *slider_step, ui: *ui }
        }
    }
}

/// Translate `input` into draft writes for `item`.
pub fn edits(item: &SearchItemConfig, input: ControlInput) -> Result<SmallVec<[(String, Value); 2]>, ControlError> {
    let kind = item.kind();
    let mismatch = |input| ControlError::Mismatch { kind, input };
    let out = match (item, input) {
        (SearchItemConfig::Range { item_value, .. }, ControlInput::Range(lo, hi)) => {
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            smallvec![(item_value.lower.clone(), number(lo)), (item_value.upper.clone(), number(hi))]
        }
        (SearchItemConfig::Range { item_value, .. }, ControlInput::Clear) => {
            smallvec![(item_value.lower.clone(), Value::Null), (item_value.upper.clone(), Value::Null)]
        }
        (SearchItemConfig::Range { .. }, _) => return Err(mismatch("a single value")),
        (_, ControlInput::Range(..)) => return Err(mismatch("a range")),

        (SearchItemConfig::Boolean { item_value, .. }, ControlInput::Toggle(on)) => {
            smallvec![(item_value.clone(), Value::Bool(on))]
        }
        (SearchItemConfig::Boolean { item_value, .. }, ControlInput::Clear) => {
            smallvec![(item_value.clone(), Value::Bool(false))]
        }
        (SearchItemConfig::Boolean { .. }, ControlInput::Text(_)) => return Err(mismatch("text")),
        (_, ControlInput::Toggle(_)) => return Err(mismatch("a toggle")),

        (SearchItemConfig::Text { item_value, .. }, ControlInput::Text(s)) => smallvec![(item_value.clone(), Value::String(s))],

        (SearchItemConfig::Integer { item_value, min, max, .. }, ControlInput::Text(s)) => {
            if s.trim().is_empty() {
                smallvec![(item_value.clone(), Value::String(String::new()))]
            } else {
                let n: i64 = s.trim().parse().map_err(|_| ControlError::Integer(s.clone()))?;
                let n = max.map_or(n, |m| n.min(m));
                let n = min.map_or(n, |m| n.max(m));
                smallvec![(item_value.clone(), Value::from(n))]
            }
        }

        (SearchItemConfig::Date { item_value, .. }, ControlInput::Text(s)) => {
            if s.trim().is_empty() {
                smallvec![(item_value.clone(), Value::Null)]
            } else {
                let d = normalize_date(&s).ok_or(ControlError::Date(s))?;
                smallvec![(item_value.clone(), Value::String(d.format("%Y-%m-%d").to_string()))]
            }
        }

        (SearchItemConfig::Select { item_value, options, .. }, ControlInput::Text(s)) => {
            if !s.is_empty() && !options.iter().any(|o| text_of(&o.value) == s) {
                return Err(ControlError::UnknownOption(s));
            }
            smallvec![(item_value.clone(), Value::String(s))]
        }

        (item, ControlInput::Clear) => item.param_keys().into_iter().map(|k| (k.to_string(), Value::Null)).collect(),
    };
    Ok(out)
}

impl ListQueryController {
    /// Feed one control's input into the draft.
    pub fn edit(&mut self, item: &SearchItemConfig, input: ControlInput) -> Result<(), ControlError> {
        for (k, v) in edits(item, input)? {
            debug!(key = %k, blank = is_blank(&v), "query: draft edit");
            self.update_param(k, v);
        }
        Ok(())
    }

    /// Current display state of every item, in configuration order.
    pub fn controls<'a>(&self, items: &'a [SearchItemConfig]) -> Vec<(&'a SearchItemConfig, ControlValue)> {
        items.iter().map(|i| (i, control_value(i, self.draft()))).collect()
    }
}

/// Accordion of search sections; at most one is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPanel {
    sections: usize,
    open: Option<usize>,
}

impl SearchPanel {
    pub fn new(sections: usize) -> Self { Self { sections, open: None } }

    pub fn open_section(&self) -> Option<usize> { self.open }
    pub fn is_open(&self, index: usize) -> bool { self.open == Some(index) }

    /// Open `index`, closing any other. Out-of-range indices are ignored.
    pub fn open(&mut self, index: usize) {
        if index < self.sections {
            self.open = Some(index);
        }
    }

    /// Clicking the open section closes it.
    pub fn toggle(&mut self, index: usize) {
        if self.is_open(index) { self.open = None } else { self.open(index) }
    }

    pub fn close(&mut self) { self.open = None; }
}
