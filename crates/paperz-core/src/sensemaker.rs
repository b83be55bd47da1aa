//! Sense-maker model: expression entries and well-known anchor paths.
//!
//! Expressions are opaque source text on this side of the wire. The hub cell
//! parses and evaluates them; clients only submit source and read back the
//! cached evaluation output.

use serde::{Deserialize, Serialize};

/// Anchor path for the per-annotation review machines.
pub const ANNOTATIONZ_PATH: &str = "annotationz";
/// Anchor path for per-agent machines (keyed by base64 agent key).
pub const AGENT_PATH: &str = "agent";
/// Anchor path for meme scoring machines.
pub const MEMEZ_PATH: &str = "memez";

/// Starting state for the default annotation review machine.
pub const DEFAULT_SM_INIT_EXPR: &str = "0";

/// Default review transition: two states (0 = unreviewed, 1 = reviewed),
/// driven by actions "0" and "1".
pub const DEFAULT_SM_COMP_EXPR: &str = "\
(lam [st act]
  (if (== st 0)
    (if (== act 0)
      0
      (if (== act 1)
        1
        st))
    (if (== st 1)
      (if (== act 0)
        0
        (if (== act 1)
          1
          st))
      st)))";

/// Default meme feed scorer: applied to the meme's clap count and the
/// uploader's per-agent score, so the feed ranks by their sum.
pub const DEFAULT_FEED_SCORE_COMP: &str = "+";

/// An evaluation output a client knows how to read.
///
/// The hub's value space is larger; anything the clients consume is one of
/// these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
}

impl SmValue {
    /// The integer inside, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SmValue::Int(x) => Some(*x),
            _ => None,
        }
    }
}

/// A stored expression plus the hub's cached evaluation of it.
///
/// Returned for `sm_init`, `sm_comp`, and `sm_data` lookups alike. Clients
/// treat `expr_str` as display text and only interpret `output_flat_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensemakerEntry {
    pub expr_str: String,
    pub output_flat_value: SmValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_int_only_matches_ints() {
        assert_eq!(SmValue::Int(5).as_int(), Some(5));
        assert_eq!(SmValue::Bool(true).as_int(), None);
        assert_eq!(SmValue::Unit.as_int(), None);
    }

    #[test]
    fn entry_round_trips_through_msgpack() {
        let entry = SensemakerEntry {
            expr_str: DEFAULT_SM_INIT_EXPR.into(),
            output_flat_value: SmValue::Int(0),
        };
        let bytes = rmp_serde::to_vec_named(&entry).unwrap();
        let back: SensemakerEntry = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entry, back);
    }

    #[test]
    fn default_comp_expr_mentions_both_states() {
        assert!(DEFAULT_SM_COMP_EXPR.starts_with("(lam [st act]"));
        assert!(DEFAULT_SM_COMP_EXPR.contains("(== st 1)"));
    }
}
