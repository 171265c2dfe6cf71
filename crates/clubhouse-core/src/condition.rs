//! Condition documents attached to mission and badge definitions.
//!
//! A document is a JSON object whose fields are all optional. Every present
//! field is a predicate; the document matches when all of them hold. A
//! document that cannot be parsed is treated exactly like a missing one, so a
//! broken definition never blocks progress.

use serde::{Deserialize, Serialize};

use crate::{
  metrics::SessionMetrics,
  session::{Role, Session, SessionTier},
};

/// The only event the engine currently raises.
pub const SESSION_COMPLETED: &str = "SessionCompleted";

/// Parsed form of a condition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
  /// `"Manager"` or `"Player"`, compared case-insensitively with the role
  /// being evaluated.
  pub applies_to:                  Option<String>,
  pub event:                       Option<String>,

  pub min_total_sessions:          Option<i64>,
  pub min_vip_sessions:            Option<i64>,
  pub min_cip_sessions:            Option<i64>,
  pub min_game_sessions:           Option<i64>,
  pub min_scenario_sessions:       Option<i64>,
  pub min_branch_sessions:         Option<i64>,
  pub min_room_sessions:           Option<i64>,

  pub require_current_session_vip: Option<bool>,
  pub require_current_session_cip: Option<bool>,
  pub require_current_game:        Option<bool>,
  pub require_current_scenario:    Option<bool>,
  pub require_current_branch:      Option<bool>,
  pub require_current_room:        Option<bool>,
}

impl Condition {
  /// Parse a raw document. Blank, missing, and malformed documents all yield
  /// `None`.
  pub fn parse(raw: Option<&str>) -> Option<Self> {
    let raw = raw?.trim();
    if raw.is_empty() {
      return None;
    }
    serde_json::from_str(raw).ok()
  }

  /// Whether this condition holds for `role` given the user's metrics and
  /// the triggering session.
  pub fn matches(&self, role: Role, metrics: &SessionMetrics, session: &Session) -> bool {
    if let Some(applies_to) = &self.applies_to
      && !applies_to.eq_ignore_ascii_case(role.as_ref())
    {
      return false;
    }
    if let Some(event) = &self.event
      && !event.eq_ignore_ascii_case(SESSION_COMPLETED)
    {
      return false;
    }

    let thresholds = [
      (self.min_total_sessions, metrics.total_sessions),
      (self.min_vip_sessions, metrics.vip_sessions),
      (self.min_cip_sessions, metrics.cip_sessions),
      (self.min_game_sessions, metrics.game_sessions),
      (self.min_scenario_sessions, metrics.scenario_sessions),
      (self.min_branch_sessions, metrics.branch_sessions),
      (self.min_room_sessions, metrics.room_sessions),
    ];
    if thresholds
      .iter()
      .any(|(min, actual)| min.is_some_and(|min| i64::from(*actual) < min))
    {
      return false;
    }

    let required = |flag: Option<bool>| flag == Some(true);

    if required(self.require_current_session_vip) && session.tier != SessionTier::Vip {
      return false;
    }
    if required(self.require_current_session_cip) && session.tier != SessionTier::Cip {
      return false;
    }
    if required(self.require_current_scenario) && session.scenario_id.is_none() {
      return false;
    }
    // The triggering session must itself count towards the scoped metric.
    let scoped = [
      (self.require_current_game, metrics.game_sessions),
      (self.require_current_scenario, metrics.scenario_sessions),
      (self.require_current_branch, metrics.branch_sessions),
      (self.require_current_room, metrics.room_sessions),
    ];
    !scoped
      .iter()
      .any(|(flag, count)| required(*flag) && *count == 0)
  }
}

/// Evaluate a raw document. A missing or unparseable document always
/// matches.
pub fn evaluate(
  raw: Option<&str>,
  role: Role,
  metrics: &SessionMetrics,
  session: &Session,
) -> bool {
  match Condition::parse(raw) {
    Some(condition) => condition.matches(role, metrics, session),
    None => true,
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use proptest::prelude::*;
  use uuid::Uuid;

  use super::*;
  use crate::session::SessionStatus;

  fn session(tier: SessionTier) -> Session {
    Session {
      session_id:  Uuid::new_v4(),
      branch_id:   Uuid::new_v4(),
      room_id:     Uuid::new_v4(),
      game_id:     Uuid::new_v4(),
      scenario_id: None,
      manager_id:  None,
      tier,
      status:      SessionStatus::Ended,
      starts_at:   Utc::now(),
      ends_at:     Utc::now(),
    }
  }

  fn metrics(total: u32, vip: u32) -> SessionMetrics {
    SessionMetrics {
      total_sessions: total,
      vip_sessions: vip,
      game_sessions: 1,
      branch_sessions: 1,
      room_sessions: 1,
      ..Default::default()
    }
  }

  #[test]
  fn parses_camel_case_fields() {
    let c = Condition::parse(Some(
      r#"{"appliesTo":"Player","minVipSessions":1,"requireCurrentSessionVip":true}"#,
    ))
    .unwrap();
    assert_eq!(c.applies_to.as_deref(), Some("Player"));
    assert_eq!(c.min_vip_sessions, Some(1));
    assert_eq!(c.require_current_session_vip, Some(true));
  }

  #[test]
  fn blank_and_malformed_documents_parse_to_none() {
    assert!(Condition::parse(None).is_none());
    assert!(Condition::parse(Some("   ")).is_none());
    assert!(Condition::parse(Some("{invalid json")).is_none());
    assert!(Condition::parse(Some("[1, 2]")).is_none());
    assert!(Condition::parse(Some(r#"{"minVipSessions":"three"}"#)).is_none());
  }

  #[test]
  fn unknown_fields_are_ignored() {
    let c = Condition::parse(Some(r#"{"colour":"red","minTotalSessions":2}"#)).unwrap();
    assert_eq!(c.min_total_sessions, Some(2));
  }

  #[test]
  fn malformed_document_always_matches() {
    let s = session(SessionTier::Normal);
    assert!(evaluate(Some("{invalid json"), Role::Manager, &metrics(0, 0), &s));
  }

  #[test]
  fn applies_to_is_case_insensitive_and_scoped() {
    let s = session(SessionTier::Normal);
    let m = metrics(1, 0);
    assert!(evaluate(Some(r#"{"appliesTo":"player"}"#), Role::Player, &m, &s));
    assert!(!evaluate(Some(r#"{"appliesTo":"Player"}"#), Role::Manager, &m, &s));
  }

  #[test]
  fn other_events_never_match() {
    let s = session(SessionTier::Normal);
    let m = metrics(1, 0);
    assert!(evaluate(Some(r#"{"event":"sessioncompleted"}"#), Role::Player, &m, &s));
    assert!(!evaluate(Some(r#"{"event":"SessionCanceled"}"#), Role::Player, &m, &s));
  }

  #[test]
  fn thresholds_are_inclusive() {
    let s = session(SessionTier::Vip);
    let doc = Some(r#"{"minTotalSessions":3,"minVipSessions":1}"#);
    assert!(evaluate(doc, Role::Player, &metrics(3, 1), &s));
    assert!(!evaluate(doc, Role::Player, &metrics(2, 1), &s));
    assert!(!evaluate(doc, Role::Player, &metrics(3, 0), &s));
  }

  #[test]
  fn current_session_tier_flags() {
    let m = metrics(1, 1);
    let doc = Some(r#"{"requireCurrentSessionVip":true}"#);
    assert!(evaluate(doc, Role::Player, &m, &session(SessionTier::Vip)));
    assert!(!evaluate(doc, Role::Player, &m, &session(SessionTier::Cip)));

    let doc = Some(r#"{"requireCurrentSessionCip":true}"#);
    assert!(evaluate(doc, Role::Player, &m, &session(SessionTier::Cip)));
    assert!(!evaluate(doc, Role::Player, &m, &session(SessionTier::Normal)));
  }

  #[test]
  fn require_current_scenario_needs_a_scenario() {
    let mut s = session(SessionTier::Normal);
    let doc = Some(r#"{"requireCurrentScenario":true}"#);
    let mut m = metrics(1, 0);
    assert!(!evaluate(doc, Role::Player, &m, &s));

    s.scenario_id = Some(Uuid::new_v4());
    m.scenario_sessions = 1;
    assert!(evaluate(doc, Role::Player, &m, &s));
  }

  #[test]
  fn false_flags_impose_nothing() {
    let doc = Some(r#"{"requireCurrentSessionVip":false,"requireCurrentScenario":false}"#);
    assert!(evaluate(doc, Role::Manager, &metrics(1, 0), &session(SessionTier::Normal)));
  }

  fn arb_metrics() -> impl Strategy<Value = SessionMetrics> {
    (0u32..50, 0u32..50, 0u32..50, 0u32..50, 0u32..50, 0u32..50, 0u32..50).prop_map(
      |(t, v, c, g, s, b, r)| SessionMetrics {
        total_sessions:    t,
        vip_sessions:      v,
        cip_sessions:      c,
        game_sessions:     g,
        scenario_sessions: s,
        branch_sessions:   b,
        room_sessions:     r,
      },
    )
  }

  fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Manager), Just(Role::Player)]
  }

  proptest! {
    /// Absent, empty-object, and garbage documents all match for any input.
    #[test]
    fn prop_absent_and_malformed_always_match(
      m in arb_metrics(),
      role in arb_role(),
      garbage in "[^{}]*",
    ) {
      let s = session(SessionTier::Normal);
      prop_assert!(evaluate(None, role, &m, &s));
      let empty_obj = evaluate(Some("{}"), role, &m, &s);
      prop_assert!(empty_obj);
      let malformed = evaluate(Some(&format!("{{{garbage}")), role, &m, &s);
      prop_assert!(malformed);
    }

    /// Raising a minimum threshold can only turn a match into a non-match.
    #[test]
    fn prop_thresholds_are_monotonic(m in arb_metrics(), min in 0i64..60) {
      let s = session(SessionTier::Normal);
      let lower = Condition { min_total_sessions: Some(min), ..Default::default() };
      let higher = Condition { min_total_sessions: Some(min + 1), ..Default::default() };
      if higher.matches(Role::Player, &m, &s) {
        prop_assert!(lower.matches(Role::Player, &m, &s));
      }
    }
  }
}
