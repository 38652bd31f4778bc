//! Evaluates filter trees against stored rows with PostgreSQL semantics:
//! three-valued logic, `->>` text extraction and the casts the emitter writes.

use crate::traits::{Result, StoreError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use docfilter_core::{CompareOp, SqlType, SqlValue};
use docfilter_sql::{Filter, SqlExpr};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// `None` is SQL's unknown.
pub type Truth = Option<bool>;

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub body: &'a JsonValue,
    pub columns: &'a BTreeMap<String, SqlValue>,
}

pub fn json_pointer_from_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(&seg.as_ref().replace('~', "~0").replace('/', "~1"));
    }
    out
}

/// `$.a.b` or `a.b` -> `/a/b`
pub fn json_pointer_from_path(path: &str) -> String {
    let p = path.trim();
    let p = p.trim_start_matches('$').trim_start_matches('.');
    let parts: Vec<&str> = p.split('.').filter(|s| !s.is_empty()).collect();
    json_pointer_from_segments(&parts)
}

pub fn eval_expr(expr: &SqlExpr, row: Row<'_>) -> Result<SqlValue> {
    match expr {
        SqlExpr::JsonText { segments } => {
            let found = row.body.pointer(&json_pointer_from_segments(segments));
            Ok(match found {
                None | Some(JsonValue::Null) => SqlValue::Null,
                Some(JsonValue::String(s)) => SqlValue::Text(s.clone()),
                Some(other) => SqlValue::Text(other.to_string()),
            })
        }
        SqlExpr::Column(name) => Ok(row.columns.get(name).cloned().unwrap_or(SqlValue::Null)),
        SqlExpr::Cast { inner, to } => cast(eval_expr(inner, row)?, *to),
        SqlExpr::AtUtc(inner) => Ok(match eval_expr(inner, row)? {
            SqlValue::Timestamp(naive) => SqlValue::TimestampTz(Utc.from_utc_datetime(&naive)),
            SqlValue::TimestampTz(instant) => SqlValue::Timestamp(instant.naive_utc()),
            SqlValue::Null => SqlValue::Null,
            other => return Err(cast_error(&other, SqlType::TimestampTz)),
        }),
    }
}

pub fn cast(value: SqlValue, to: SqlType) -> Result<SqlValue> {
    use SqlValue::*;
    let out = match (to, &value) {
        (_, Null) => Null,
        (SqlType::Text, Text(_)) => value.clone(),
        (SqlType::Text, Int(i)) => Text(i.to_string()),
        (SqlType::Text, Float(f)) => Text(f.to_string()),
        (SqlType::Text, Bool(b)) => Text(b.to_string()),
        (SqlType::Text, Uuid(u)) => Text(u.to_string()),
        (SqlType::Integer, Int(i)) => {
            Int(i32::try_from(*i).map_err(|_| cast_error(&value, to))?.into())
        }
        (SqlType::Integer, Text(s)) => {
            Int(s.trim().parse::<i32>().map_err(|_| cast_error(&value, to))?.into())
        }
        (SqlType::BigInt, Int(_)) => value.clone(),
        (SqlType::BigInt, Text(s)) => {
            Int(s.trim().parse().map_err(|_| cast_error(&value, to))?)
        }
        (SqlType::DoublePrecision, Float(_)) => value.clone(),
        (SqlType::DoublePrecision, Int(i)) => Float(*i as f64),
        (SqlType::DoublePrecision, Text(s)) => {
            Float(s.trim().parse().map_err(|_| cast_error(&value, to))?)
        }
        (SqlType::Boolean, Bool(_)) => value.clone(),
        (SqlType::Boolean, Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" => Bool(true),
            "false" | "f" => Bool(false),
            _ => return Err(cast_error(&value, to)),
        },
        (SqlType::Uuid, Uuid(_)) => value.clone(),
        (SqlType::Uuid, Text(s)) => {
            Uuid(uuid::Uuid::parse_str(s.trim()).map_err(|_| cast_error(&value, to))?)
        }
        (SqlType::Timestamp, Timestamp(_)) => value.clone(),
        // the session time zone is UTC
        (SqlType::Timestamp, TimestampTz(t)) => Timestamp(t.naive_utc()),
        (SqlType::Timestamp, Text(s)) => {
            Timestamp(parse_timestamp(s).ok_or_else(|| cast_error(&value, to))?)
        }
        (SqlType::TimestampTz, TimestampTz(_)) => value.clone(),
        (SqlType::TimestampTz, Timestamp(n)) => TimestampTz(Utc.from_utc_datetime(n)),
        (SqlType::TimestampTz, Text(s)) => {
            TimestampTz(parse_timestamptz(s).ok_or_else(|| cast_error(&value, to))?)
        }
        _ => return Err(cast_error(&value, to)),
    };
    Ok(out)
}

fn cast_error(value: &SqlValue, to: SqlType) -> StoreError {
    StoreError::Cast {
        value: format!("{:?}", value),
        to,
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Text to `timestamp without time zone`: an explicit offset is ignored.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

/// Text to `timestamp with time zone`: zone-less text is read in the UTC session zone.
fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|n| Utc.from_utc_datetime(&n))
        })
}

fn compare(op: CompareOp, left: &SqlValue, right: &SqlValue) -> Truth {
    let ord = left.sql_cmp(right)?;
    Some(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    })
}

fn and(values: impl IntoIterator<Item = Truth>) -> Truth {
    let mut unknown = false;
    for v in values {
        match v {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(true)
    }
}

fn or(values: impl IntoIterator<Item = Truth>) -> Truth {
    let mut unknown = false;
    for v in values {
        match v {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(false)
    }
}

pub fn eval_filter(filter: &Filter, row: Row<'_>) -> Result<Truth> {
    let truth = match filter {
        Filter::And(children) => and(eval_all(children, row)?),
        Filter::Or(children) => or(eval_all(children, row)?),
        Filter::Not(inner) => eval_filter(inner, row)?.map(|b| !b),
        Filter::Compare { field, op, param } => {
            compare(*op, &eval_expr(&field.expr, row)?, &param.value)
        }
        Filter::CompareFields { left, op, right } => compare(
            *op,
            &eval_expr(&left.expr, row)?,
            &eval_expr(&right.expr, row)?,
        ),
        Filter::In {
            field,
            params,
            negated,
        } => {
            let x = eval_expr(&field.expr, row)?;
            let hit = or(params.iter().map(|p| compare(CompareOp::Eq, &x, &p.value)));
            if *negated {
                hit.map(|b| !b)
            } else {
                hit
            }
        }
        Filter::Between { field, low, high } => {
            let x = eval_expr(&field.expr, row)?;
            and([
                compare(CompareOp::Ge, &x, &low.value),
                compare(CompareOp::Le, &x, &high.value),
            ])
        }
        Filter::IsNull { field, negated } => {
            Some(eval_expr(&field.expr, row)?.is_null() != *negated)
        }
        Filter::Like {
            field,
            pattern,
            case_insensitive,
        } => match (eval_expr(&field.expr, row)?, &pattern.value) {
            (SqlValue::Text(text), SqlValue::Text(pattern)) => {
                Some(like_match(pattern, &text, *case_insensitive))
            }
            _ => None,
        },
    };
    Ok(truth)
}

fn eval_all(children: &[Filter], row: Row<'_>) -> Result<Vec<Truth>> {
    children.iter().map(|c| eval_filter(c, row)).collect()
}

#[derive(Debug, PartialEq)]
enum LikeToken {
    Any,
    One,
    Lit(char),
}

/// `LIKE` with `\` as the escape character.
/// `ILIKE` compares the lowercased strings, so a character whose lowercase
/// form is longer than one char folds in full.
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Lit(chars.next().unwrap_or('\\')),
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            other => LikeToken::Lit(other),
        });
    }
    let text: Vec<char> = text.chars().collect();

    // matched[j]: tokens so far match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            LikeToken::Any => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= matched[j];
                    next[j] = seen;
                }
            }
            LikeToken::One => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            LikeToken::Lit(c) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn timestamp_cast_drops_the_offset_but_timestamptz_keeps_it() {
        let text = SqlValue::Text("2026-03-01T14:00:00+02:00".into());
        assert_eq!(
            cast(text.clone(), SqlType::Timestamp).unwrap(),
            SqlValue::Timestamp(noon() + chrono::Duration::hours(2))
        );
        assert_eq!(
            cast(text, SqlType::TimestampTz).unwrap(),
            SqlValue::TimestampTz(Utc.from_utc_datetime(&noon()))
        );
    }

    #[test]
    fn json_text_extraction_follows_postgres() {
        let body = json!({"A": {"B": 5}, "S": "x", "N": null});
        let columns = BTreeMap::new();
        let row = Row {
            body: &body,
            columns: &columns,
        };
        let nested = SqlExpr::JsonText {
            segments: vec!["A".into(), "B".into()],
        };
        assert_eq!(eval_expr(&nested, row).unwrap(), SqlValue::Text("5".into()));
        let null = SqlExpr::JsonText {
            segments: vec!["N".into()],
        };
        assert_eq!(eval_expr(&null, row).unwrap(), SqlValue::Null);
        let missing = SqlExpr::JsonText {
            segments: vec!["Z".into()],
        };
        assert_eq!(eval_expr(&missing, row).unwrap(), SqlValue::Null);
    }

    #[test]
    fn bad_casts_are_errors() {
        let err = cast(SqlValue::Text("soon".into()), SqlType::Timestamp).unwrap_err();
        assert!(matches!(err, StoreError::Cast { .. }));
    }

    #[test]
    fn three_valued_logic() {
        assert_eq!(and([Some(true), None]), None);
        assert_eq!(and([Some(false), None]), Some(false));
        assert_eq!(or([Some(false), None]), None);
        assert_eq!(or([Some(true), None]), Some(true));
        assert_eq!(and(Vec::<Truth>::new()), Some(true));
        assert_eq!(or(Vec::<Truth>::new()), Some(false));
    }

    #[test]
    fn int4_casts_are_range_checked() {
        assert_eq!(
            cast(SqlValue::Text("2147483647".into()), SqlType::Integer).unwrap(),
            SqlValue::Int(2_147_483_647)
        );
        assert!(matches!(
            cast(SqlValue::Int(5_000_000_000), SqlType::Integer),
            Err(StoreError::Cast { .. })
        ));
        assert!(cast(SqlValue::Text("2147483648".into()), SqlType::Integer).is_err());
        assert_eq!(
            cast(SqlValue::Int(5_000_000_000), SqlType::BigInt).unwrap(),
            SqlValue::Int(5_000_000_000)
        );
    }

    #[test]
    fn ilike_folds_multi_char_lowercase_forms() {
        // 'İ' lowercases to "i\u{307}"
        assert!(like_match("i\u{307}stanbul", "İstanbul", true));
        assert!(like_match("%İST%", "xi\u{307}stanbul", true));
        assert!(!like_match("istanbul", "İstanbul", true));
        assert!(!like_match("İstanbul", "i\u{307}stanbul", false));
    }

    #[test]
    fn like_patterns() {
        assert!(like_match("%bc%", "abcd", false));
        assert!(like_match("a_c", "abc", false));
        assert!(!like_match("a_c", "abbc", false));
        assert!(like_match("50\\%%", "50% off", false));
        assert!(!like_match("50\\%%", "500 off", false));
        assert!(like_match("AB%", "abc", true));
        assert!(!like_match("AB%", "abc", false));
    }

    #[test]
    fn pointer_paths() {
        assert_eq!(json_pointer_from_path("$.a.b"), "/a/b");
        assert_eq!(json_pointer_from_segments(&["a/b", "c~"]), "/a~1b/c~0");
    }
}
