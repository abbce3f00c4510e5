//! Display formatting for resolved values.
//!
//! Formatting never fails: anything that cannot be rendered falls back to the
//! configured fallback or to [`NO_VALUE`].

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker rendered for absent, null and empty values.
pub const NO_VALUE: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformOp {
    Multiply,
    Divide,
}

/// Numeric transform applied before decoration, e.g. metres to kilometres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTransform {
    pub op: TransformOp,
    pub by: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl ValueTransform {
    pub fn multiply(by: f64) -> Self { Self { op: TransformOp::Multiply, by, decimals: None, fallback: None } }
    pub fn divide(by: f64) -> Self { Self { op: TransformOp::Divide, by, decimals: None, fallback: None } }
    pub fn decimals(mut self, d: u32) -> Self { self.decimals = Some(d); self }
    pub fn fallback(mut self, f: impl Into<String>) -> Self { self.fallback = Some(f.into()); self }

    /// `None` on division by zero or a non-finite result.
    pub fn apply(&self, n: f64) -> Option<f64> {
        let out = match self.op {
            TransformOp::Multiply => n * self.by,
            TransformOp::Divide if self.by == 0.0 => return None,
            TransformOp::Divide => n / self.by,
        };
        out.is_finite().then_some(out)
    }

    fn fallback_text(&self) -> String {
        self.fallback.clone().unwrap_or_else(|| NO_VALUE.to_string())
    }
}

/// Decoration shared by every configured field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, alias = "measurement", skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<ValueTransform>,
}

impl ValueFormat {
    pub fn suffix(s: impl Into<String>) -> Self { Self { suffix: Some(s.into()), ..Self::default() } }

    pub fn format(&self, raw: Option<&Value>) -> String { format_value(raw, Some(self)) }

    fn decorate(&self, body: &str) -> String {
        let mut out = String::with_capacity(body.len() + 8);
        if let Some(p) = &self.prefix { out.push_str(p); }
        out.push_str(body);
        if let Some(s) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            out.push(' ');
            out.push_str(s);
        }
        out
    }
}

/// Render a resolved value for display.
pub fn format_value(raw: Option<&Value>, format: Option<&ValueFormat>) -> String {
    let raw = match raw {
        None | Some(Value::Null) => return NO_VALUE.to_string(),
        Some(Value::String(s)) if s.is_empty() => return NO_VALUE.to_string(),
        Some(v) => v,
    };
    let plain = ValueFormat::default();
    let format = format.unwrap_or(&plain);
    let n = as_number(raw);

    if let Some(t) = &format.transform {
        let Some(out) = n.and_then(|n| t.apply(n)) else { return t.fallback_text() };
        let body = match t.decimals {
            Some(d) => to_fixed(out, d),
            None => number_to_string(out),
        };
        return format.decorate(&body);
    }

    let body = match (raw, n) {
        (Value::Number(num), _) if num.is_i64() || num.is_u64() => num.to_string(),
        (_, Some(n)) => number_to_string(n),
        (v, None) => display_raw(v),
    };
    format.decorate(&body)
}

/// Plain text of a resolved value with no numeric coercion; `None` for
/// absent, null and empty values. Used for titles, descriptions and image paths.
pub fn format_text(raw: Option<&Value>) -> Option<String> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(display_raw(v)),
    }
}

/// Numbers pass through, numeric-looking strings parse, everything else is non-numeric.
fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() { return None; }
            t.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn display_raw(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(display_raw).collect::<Vec<_>>().join(","),
        Value::Object(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

/// Shortest round-trip rendering; exponent form outside [1e-6, 1e21).
fn number_to_string(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{:e}", n);
        return match s.split_once('e') {
            Some((m, e)) if !e.starts_with('-') => format!("{m}e+{e}"),
            _ => s,
        };
    }
    format!("{}", n)
}

/// Fixed-point rendering; exact ties round away from zero.
fn to_fixed(n: f64, decimals: u32) -> String {
    let d = decimals.min(100) as usize;
    if d <= 15 {
        let factor = 10f64.powi(d as i32);
        let scaled = n.abs() * factor;
        if scaled.is_finite() && scaled.fract() == 0.5 {
            let up = (scaled.trunc() + 1.0) / factor;
            let sign = if n < 0.0 { "-" } else { "" };
            return format!("{sign}{:.*}", d, up);
        }
    }
    format!("{:.*}", d, n)
}
