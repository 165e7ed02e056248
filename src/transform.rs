use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::Expr;
use crate::jsx_lowerer::literal_value;

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE RULES
// Shared by template substitution, the materializer and the reference evaluator
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed truthiness: `null`, `false`, `0`, `NaN` and `""` are false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if f == 0.0 {
        "0".to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{:.0}", f)
    } else {
        format!("{}", f)
    }
}

/// String conversion of a value, as `String(value)` does.
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_default(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| if v.is_null() { String::new() } else { to_js_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// How a value renders as a child: `null` and booleans render empty, arrays concatenate.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) => String::new(),
        Value::Array(items) => items.iter().map(display).collect(),
        Value::Object(_) => value.to_string(),
        other => to_js_string(other),
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECOGNIZED TRANSFORMS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformMethod {
    ToFixed,
    ToUpperCase,
    ToLowerCase,
    Trim,
    ToString,
    PadStart,
    PadEnd,
    Join,
    Substring,
}

impl TransformMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "toFixed" => TransformMethod::ToFixed,
            "toUpperCase" => TransformMethod::ToUpperCase,
            "toLowerCase" => TransformMethod::ToLowerCase,
            "trim" => TransformMethod::Trim,
            "toString" => TransformMethod::ToString,
            "padStart" => TransformMethod::PadStart,
            "padEnd" => TransformMethod::PadEnd,
            "join" => TransformMethod::Join,
            "substring" => TransformMethod::Substring,
            _ => return None,
        };
        Some(method)
    }

    /// Accepted argument counts (min, max).
    fn arity(&self) -> (usize, usize) {
        match self {
            TransformMethod::ToFixed => (0, 1),
            TransformMethod::ToUpperCase
            | TransformMethod::ToLowerCase
            | TransformMethod::Trim
            | TransformMethod::ToString => (0, 0),
            TransformMethod::PadStart | TransformMethod::PadEnd => (1, 2),
            TransformMethod::Join => (0, 1),
            TransformMethod::Substring => (1, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub method: TransformMethod,
    pub args: Vec<Value>,
}

/// Splits `receiver.method(literal args)` into the receiver and a transform descriptor.
pub fn recognize(expr: &Expr) -> Option<(&Expr, Transform)> {
    let Expr::Call { callee, args, .. } = expr else {
        return None;
    };
    let Expr::Member {
        object, property, ..
    } = callee.as_ref()
    else {
        return None;
    };
    let method = TransformMethod::from_name(property)?;
    let (min, max) = method.arity();
    if args.len() < min || args.len() > max {
        return None;
    }
    let args = args.iter().map(literal_value).collect::<Option<Vec<_>>>()?;
    Some((object.as_ref(), Transform { method, args }))
}

fn arg_usize(args: &[Value], index: usize, default: usize) -> usize {
    match args.get(index) {
        Some(v) => {
            let n = to_number(v);
            if n.is_nan() || n < 0.0 {
                0
            } else {
                n as usize
            }
        }
        None => default,
    }
}

fn pad(text: &str, target: usize, filler: &str, at_start: bool) -> String {
    let len = text.chars().count();
    if target <= len || filler.is_empty() {
        return text.to_string();
    }
    let padding: String = filler.chars().cycle().take(target - len).collect();
    if at_start {
        format!("{}{}", padding, text)
    } else {
        format!("{}{}", text, padding)
    }
}

/// Applies a transform to a bound value.
pub fn apply(transform: &Transform, value: &Value) -> Value {
    let args = &transform.args;
    let text = || to_js_string(value);
    let result = match transform.method {
        TransformMethod::ToFixed => {
            let digits = arg_usize(args, 0, 0).min(100);
            let n = to_number(value);
            if n.is_finite() {
                format!("{:.*}", digits, n)
            } else {
                format_number(n)
            }
        }
        TransformMethod::ToUpperCase => text().to_uppercase(),
        TransformMethod::ToLowerCase => text().to_lowercase(),
        TransformMethod::Trim => text().trim().to_string(),
        TransformMethod::ToString => text(),
        TransformMethod::PadStart | TransformMethod::PadEnd => {
            let filler = args.get(1).map(to_js_string).unwrap_or_else(|| " ".to_string());
            pad(
                &text(),
                arg_usize(args, 0, 0),
                &filler,
                transform.method == TransformMethod::PadStart,
            )
        }
        TransformMethod::Join => {
            let separator = args.first().map(to_js_string).unwrap_or_else(|| ",".to_string());
            match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| if v.is_null() { String::new() } else { to_js_string(v) })
                    .collect::<Vec<_>>()
                    .join(&separator),
                other => to_js_string(other),
            }
        }
        TransformMethod::Substring => {
            let chars: Vec<char> = text().chars().collect();
            let len = chars.len();
            let a = arg_usize(args, 0, 0).min(len);
            let b = arg_usize(args, 1, len).min(len);
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            chars[start..end].iter().collect()
        }
    };
    Value::String(result)
}
