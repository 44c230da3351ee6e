//! Property-based tests.
//!
//! Uses proptest to throw arbitrary inputs at the pure parts of the store -
//! obfuscation, saved-field copying, document JSON round-trips - and verify
//! they never panic and always hold their invariants.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use sandbank::obfuscation::{looks_obfuscated, obfuscate, unobfuscate};
use sandbank::{Persistable, Sandbank};

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
struct FuzzDoc {
    uid: String,
    health: f64,
    name: String,
    tags: Vec<String>,
    score: i64,
}

impl Persistable for FuzzDoc {
    fn uid(&self) -> &str { &self.uid }
    fn set_uid(&mut self, uid: String) { self.uid = uid; }
    fn type_label() -> &'static str { "fuzz.FuzzDoc" }
}

fn fuzz_doc_strategy() -> impl Strategy<Value = FuzzDoc> {
    (
        "[a-f0-9]{0,32}",
        prop::num::f64::NORMAL | prop::num::f64::ZERO,
        ".*",
        prop::collection::vec("[a-zA-Z0-9 ]{0,12}", 0..5),
        any::<i64>(),
    )
        .prop_map(|(uid, health, name, tags, score)| FuzzDoc {
            uid,
            health,
            name,
            tags,
            score,
        })
}

// =============================================================================
// Obfuscation
// =============================================================================

proptest! {
    #[test]
    fn obfuscation_round_trips_arbitrary_text(text in ".*") {
        let obfuscated = obfuscate(&text);
        prop_assert!(looks_obfuscated(&obfuscated));
        prop_assert_eq!(unobfuscate(&obfuscated).unwrap(), text);
    }

    #[test]
    fn obfuscation_round_trips_embedded_sentinels(
        prefix in ".*",
        shifts in prop::collection::vec(0u8..=255, 0..40),
        suffix in ".*",
    ) {
        // Adversarial inputs containing the OBFS header pattern as data.
        let joined = shifts.iter().map(u8::to_string).collect::<Vec<_>>().join("-");
        let text = format!("{prefix}OBFS|{joined}|{suffix}");
        prop_assert_eq!(unobfuscate(&obfuscate(&text)).unwrap(), text);
    }

    #[test]
    fn obfuscation_of_json_is_never_mistaken_for_plain(text in ".*") {
        // Document files are JSON objects; whatever the payload, the
        // obfuscated form must still be detected.
        let json = format!("{{\"data\": {:?}}}", text);
        let obfuscated = obfuscate(&json);
        prop_assert!(looks_obfuscated(&obfuscated));
        prop_assert!(!looks_obfuscated(json.as_bytes()));
    }

    #[test]
    fn unobfuscate_never_panics_on_garbage(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        // Garbage either decodes (if it happens to be well-formed) or
        // errors; it must never panic.
        let _ = unobfuscate(&bytes);
    }
}

// =============================================================================
// Saved-field copying & document JSON
// =============================================================================

proptest! {
    #[test]
    fn copy_saved_fields_transfers_everything(source in fuzz_doc_strategy()) {
        let mut destination = FuzzDoc::default();
        Sandbank::copy_saved_fields(&source, &mut destination).unwrap();
        prop_assert_eq!(destination, source);
    }

    #[test]
    fn copy_saved_fields_overwrites_previous_state(
        source in fuzz_doc_strategy(),
        stale in fuzz_doc_strategy(),
    ) {
        let mut destination = stale;
        Sandbank::copy_saved_fields(&source, &mut destination).unwrap();
        prop_assert_eq!(destination, source);
    }

    #[test]
    fn document_json_round_trips(doc in fuzz_doc_strategy()) {
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: FuzzDoc = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, doc);
    }
}
