//! Typed parse of remote subscription documents.
//!
//! The server sends subscriptions as loosely-typed JSON. Every field is read
//! with an explicit default, so parsing never fails and never yields a
//! half-built document. Each default that had to be substituted is recorded
//! as a [`ParseIssue`], which keeps a malformed document observable without
//! rejecting it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::subscription::SubscriptionKind;

// ─── Issues ──────────────────────────────────────────────────────────────────

/// Why a field of a remote document fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
  /// The key was absent or `null`.
  Missing,
  /// The key was present with a value of the wrong shape.
  TypeMismatch { expected: &'static str },
  /// The other participant of a direct message could not be derived
  /// unambiguously from the room reference.
  AmbiguousParticipant,
}

/// A single field that did not parse cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseIssue {
  /// Dotted path of the remote key, e.g. `"unread"` or `"ts.$date"`.
  pub field: &'static str,
  #[serde(flatten)]
  pub kind:  IssueKind,
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A remote subscription record with every field resolved to a concrete
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDocument {
  /// `_id`; `None` leaves the local identifier untouched.
  pub identifier:           Option<String>,
  /// `rid`
  pub room_reference:       String,
  /// `name`
  pub display_name:         String,
  /// `unread`
  pub unread_count:         u32,
  /// `open`
  pub is_open:              bool,
  /// `alert`
  pub has_alert:            bool,
  /// `f`
  pub is_favorite:          bool,
  /// `t`, kept raw. See [`SubscriptionKind::resolve`].
  pub kind_code:            String,
  /// `ts.$date`; `None` leaves the local value untouched.
  pub created_at:           Option<DateTime<Utc>>,
  /// `ls.$date`; `None` leaves the local value untouched.
  pub last_seen_at:         Option<DateTime<Utc>>,
  /// Derived from `rid` and `u._id`; only `Some` for direct messages.
  pub other_participant_id: Option<String>,
}

/// The outcome of [`SubscriptionDocument::parse`].
#[derive(Debug, Clone)]
pub struct Parsed {
  pub document: SubscriptionDocument,
  pub issues:   Vec<ParseIssue>,
}

impl Parsed {
  /// `true` when no field had to be defaulted.
  pub fn is_clean(&self) -> bool { self.issues.is_empty() }
}

impl SubscriptionDocument {
  /// Parse a remote document. Never fails; see [`Parsed::issues`].
  pub fn parse(value: &Value) -> Parsed {
    let mut r = Reader { root: value, issues: Vec::new() };

    if !value.is_object() {
      r.issues.push(ParseIssue {
        field: "$",
        kind:  IssueKind::TypeMismatch { expected: "object" },
      });
    }

    let identifier = r.string("_id");
    let room_reference = r.string("rid").unwrap_or_default();
    let display_name = r.string("name").unwrap_or_default();
    let unread_count = r.count("unread").unwrap_or(0);
    let is_open = r.bool("open").unwrap_or(false);
    let has_alert = r.bool("alert").unwrap_or(false);
    let is_favorite = r.bool("f").unwrap_or(false);
    let kind_code = r
      .string("t")
      .unwrap_or_else(|| SubscriptionKind::Channel.code().to_owned());
    let created_at = r.date("ts", "ts.$date");
    let last_seen_at = r.date("ls", "ls.$date");

    let other_participant_id =
      if SubscriptionKind::resolve(&kind_code) == SubscriptionKind::DirectMessage {
        let user_id = r.nested_string("u", "_id", "u._id").unwrap_or_default();
        if participant_is_ambiguous(&room_reference, &user_id) {
          r.issues.push(ParseIssue {
            field: "rid",
            kind:  IssueKind::AmbiguousParticipant,
          });
        }
        Some(other_participant(&room_reference, &user_id))
      } else {
        None
      };

    Parsed {
      document: SubscriptionDocument {
        identifier,
        room_reference,
        display_name,
        unread_count,
        is_open,
        has_alert,
        is_favorite,
        kind_code,
        created_at,
        last_seen_at,
        other_participant_id,
      },
      issues:   r.issues,
    }
  }
}

// ─── Direct-message participant ──────────────────────────────────────────────

/// Remove every occurrence of `user_id` from `room_reference`.
///
/// Direct-message room ids are the two participant ids concatenated, so what
/// remains is the other participant. This is a plain substring replace and
/// must stay one for wire compatibility.
pub fn other_participant(room_reference: &str, user_id: &str) -> String {
  if user_id.is_empty() {
    return room_reference.to_owned();
  }
  room_reference.replace(user_id, "")
}

/// The replace in [`other_participant`] is only trustworthy when the user id
/// occurs exactly once and something is left over.
fn participant_is_ambiguous(room_reference: &str, user_id: &str) -> bool {
  user_id.is_empty()
    || room_reference.matches(user_id).count() != 1
    || room_reference.len() == user_id.len()
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// `0000-01-01T00:00:00Z` and `9999-12-31T23:59:59Z` as epoch seconds. Dates
/// outside this range have no four-digit RFC 3339 year.
const MIN_EPOCH_SECS: f64 = -62_167_219_200.0;
const MAX_EPOCH_SECS: f64 = 253_402_300_799.0;

/// Convert a double-precision epoch-millisecond value into a UTC timestamp.
/// Returns `None` for non-finite input or a year outside 0000 to 9999.
pub fn datetime_from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
  if !millis.is_finite() {
    return None;
  }
  let secs = (millis / 1000.0).floor();
  if !(MIN_EPOCH_SECS..=MAX_EPOCH_SECS).contains(&secs) {
    return None;
  }
  let nanos = ((millis - secs * 1000.0) * 1_000_000.0).round() as u32;
  DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}

// ─── Reader ──────────────────────────────────────────────────────────────────

struct Reader<'a> {
  root:   &'a Value,
  issues: Vec<ParseIssue>,
}

impl Reader<'_> {
  fn present(&self, key: &str) -> Option<&Value> {
    self.root.get(key).filter(|v| !v.is_null())
  }

  fn missing(&mut self, field: &'static str) {
    self.issues.push(ParseIssue { field, kind: IssueKind::Missing });
  }

  fn mismatch(&mut self, field: &'static str, expected: &'static str) {
    self.issues.push(ParseIssue {
      field,
      kind: IssueKind::TypeMismatch { expected },
    });
  }

  fn string(&mut self, key: &'static str) -> Option<String> {
    match self.present(key) {
      Some(Value::String(s)) => Some(s.clone()),
      Some(_) => {
        self.mismatch(key, "string");
        None
      }
      None => {
        self.missing(key);
        None
      }
    }
  }

  fn bool(&mut self, key: &'static str) -> Option<bool> {
    match self.present(key) {
      Some(Value::Bool(b)) => Some(*b),
      Some(_) => {
        self.mismatch(key, "boolean");
        None
      }
      None => {
        self.missing(key);
        None
      }
    }
  }

  fn count(&mut self, key: &'static str) -> Option<u32> {
    let parsed = match self.present(key) {
      Some(Value::Number(n)) => match n.as_u64() {
        Some(u) => u32::try_from(u).ok(),
        None => n
          .as_f64()
          .filter(|f| *f >= 0.0 && *f <= f64::from(u32::MAX))
          .map(|f| f.trunc() as u32),
      },
      Some(_) => None,
      None => {
        self.missing(key);
        return None;
      }
    };
    if parsed.is_none() {
      self.mismatch(key, "non-negative integer");
    }
    parsed
  }

  /// Dates are optional: absence is not an issue, a wrong shape is.
  fn date(&mut self, key: &'static str, field: &'static str) -> Option<DateTime<Utc>> {
    let value = self.present(key)?;
    let parsed = value
      .get("$date")
      .and_then(Value::as_f64)
      .and_then(datetime_from_epoch_millis);
    if parsed.is_none() {
      self.mismatch(field, "{\"$date\": epoch milliseconds}");
    }
    parsed
  }

  fn nested_string(
    &mut self,
    outer: &str,
    inner: &str,
    field: &'static str,
  ) -> Option<String> {
    match self.present(outer).and_then(|o| o.get(inner)) {
      Some(Value::String(s)) => Some(s.clone()),
      Some(Value::Null) | None => {
        self.missing(field);
        None
      }
      Some(_) => {
        self.mismatch(field, "string");
        None
      }
    }
  }
}
