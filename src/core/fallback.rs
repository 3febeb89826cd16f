//! Offline responder used whenever no completion backend can answer.
//!
//! Each model carries an ordered list of keyword rules and a pool of generic
//! replies. Rules are evaluated top to bottom and the first hit wins, so the
//! reply for a matching message is fully deterministic; only the no-match case
//! draws from the pool at random.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::models::ModelRef;

/// Used when a model has no table or its pool is empty.
pub const LAST_RESORT_REPLY: &str =
    "Le service est momentanément indisponible. Votre message a été enregistré, réessayez plus tard.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub keywords: Vec<String>,
    pub response: String,
}

impl FallbackRule {
    /// Case-insensitive substring match against any keyword. `text` must
    /// already be lowercased.
    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .map(|keyword| keyword.trim().to_lowercase())
            .any(|keyword| !keyword.is_empty() && text.contains(&keyword))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTable {
    #[serde(default)]
    pub rules: Vec<FallbackRule>,
    #[serde(default)]
    pub replies: Vec<String>,
}

impl FallbackTable {
    fn respond(&self, message: &str, random: &dyn RandomSource) -> String {
        let lowered = message.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(&lowered)) {
            if !rule.response.trim().is_empty() {
                return rule.response.clone();
            }
        }

        let pool: Vec<&String> = self
            .replies
            .iter()
            .filter(|reply| !reply.trim().is_empty())
            .collect();
        if pool.is_empty() {
            return LAST_RESORT_REPLY.to_string();
        }
        let index = random.pick(pool.len()).min(pool.len() - 1);
        pool[index].clone()
    }
}

/// Uniform index source for the no-match case.
pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Draws from the operating system RNG, falling back to the clock if the
/// RNG is unavailable so the responder never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn pick(&self, len: usize) -> usize {
        let mut bytes = [0_u8; 8];
        let value = match getrandom::fill(&mut bytes) {
            Ok(()) => u64::from_le_bytes(bytes),
            Err(_) => chrono::Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .unsigned_abs(),
        };
        (value % len as u64) as usize
    }
}

pub struct FallbackResponder {
    tables: HashMap<String, FallbackTable>,
    random: Box<dyn RandomSource>,
}

impl FallbackResponder {
    pub fn new(tables: HashMap<String, FallbackTable>) -> Self {
        Self::with_random(tables, Box::new(OsRandom))
    }

    pub fn with_random(
        tables: HashMap<String, FallbackTable>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let tables = tables
            .into_iter()
            .map(|(name, table)| (name.to_lowercase(), table))
            .collect();
        Self { tables, random }
    }

    /// Canned reply for `latest_user_message` under `model`. Always non-empty.
    pub fn respond(&self, model: &ModelRef, latest_user_message: &str) -> String {
        match self.tables.get(&model.display_name.to_lowercase()) {
            Some(table) => table.respond(latest_user_message, self.random.as_ref()),
            None => LAST_RESORT_REPLY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIndex(usize);

    impl RandomSource for FixedIndex {
        fn pick(&self, _len: usize) -> usize {
            self.0
        }
    }

    fn model(name: &str) -> ModelRef {
        ModelRef {
            display_name: name.to_string(),
            provider_id: format!("test/{name}"),
            supports_image_input: false,
            description: None,
        }
    }

    fn responder(index: usize) -> FallbackResponder {
        let table = FallbackTable {
            rules: vec![
                FallbackRule {
                    keywords: vec!["bonjour".into(), "hello".into()],
                    response: "greeting".into(),
                },
                FallbackRule {
                    keywords: vec!["code".into(), "hello world".into()],
                    response: "code".into(),
                },
            ],
            replies: vec!["first".into(), "second".into(), "third".into()],
        };
        FallbackResponder::with_random(
            HashMap::from([("Alpha".to_string(), table)]),
            Box::new(FixedIndex(index)),
        )
    }

    #[test]
    fn first_matching_rule_wins() {
        let responder = responder(0);
        // Both rules match; the earlier one takes precedence.
        assert_eq!(responder.respond(&model("Alpha"), "Hello world"), "greeting");
        assert_eq!(responder.respond(&model("alpha"), "Some CODE please"), "code");
    }

    #[test]
    fn unmatched_messages_draw_from_the_pool() {
        assert_eq!(responder(1).respond(&model("Alpha"), "quoi de neuf"), "second");
        assert_eq!(responder(2).respond(&model("Alpha"), ""), "third");
        // Out-of-range picks are clamped rather than panicking.
        assert_eq!(responder(99).respond(&model("Alpha"), "rien"), "third");
    }

    #[test]
    fn unknown_models_and_empty_pools_still_answer() {
        let responder = responder(0);
        assert_eq!(responder.respond(&model("Beta"), "hi"), LAST_RESORT_REPLY);

        let empty = FallbackResponder::new(HashMap::from([(
            "Gamma".to_string(),
            FallbackTable::default(),
        )]));
        assert_eq!(empty.respond(&model("Gamma"), "hi"), LAST_RESORT_REPLY);
    }

    #[test]
    fn os_random_stays_in_bounds() {
        for len in 1..20 {
            assert!(OsRandom.pick(len) < len);
        }
    }
}
