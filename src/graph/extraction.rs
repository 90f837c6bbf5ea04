//! Entity and relation extraction from chunk text (regex-based, with an optional
//! NER collaborator).

use regex::{Match, Regex};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use super::{EntityType, Relation, RelationType};
use crate::error::Result;

/// Weight of a relation inferred from two entities sharing a chunk.
pub const CO_OCCURRENCE_WEIGHT: f64 = 1.0;
/// Weight of a relation stated by an explicit verb or list pattern.
pub const EXPLICIT_WEIGHT: f64 = 2.0;
/// Characters of chunk text kept as a relation's context snippet.
const CONTEXT_CHARS: usize = 200;

/// NER labels that name graph-worthy concepts.
const NER_LABELS: [&str; 6] = ["PERSON", "ORG", "PRODUCT", "GPE", "WORK_OF_ART", "EVENT"];

/// Pulls `(name, type)` entity mentions out of text, in text order.
pub trait EntityExtractor: Send + Sync {
    fn extract_entities(&self, text: &str) -> Vec<(String, EntityType)>;
}

/// External named-entity recognizer: `(text) -> [(span, label)]`.
pub trait NerEngine: Send + Sync {
    fn recognize(&self, text: &str) -> Result<Vec<(String, String)>>;
}

struct EntityPatterns {
    proper_noun: Regex,
    camel_case: Regex,
    service: Regex,
}

fn entity_patterns() -> &'static EntityPatterns {
    static PATTERNS: OnceLock<EntityPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| EntityPatterns {
        proper_noun: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("Invalid regex pattern"),
        camel_case: Regex::new(r"\b[A-Z][a-z]+(?:[A-Z][a-z]+)+\b").expect("Invalid regex pattern"),
        service: Regex::new(r"\b([A-Z][a-zA-Z]*(?:Service|Router|Module|Manager|Controller|Handler))\b")
            .expect("Invalid regex pattern"),
    })
}

/// Deterministic fallback extractor.
///
/// Recognizes proper-noun spans longer than two characters, CamelCase identifiers
/// and suffix-cued service names. A span hit by several patterns is reported once,
/// with the strongest type (SERVICE > IDENTIFIER > ENTITY).
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl EntityExtractor for PatternExtractor {
    fn extract_entities(&self, text: &str) -> Vec<(String, EntityType)> {
        let patterns = entity_patterns();
        let mut spans: BTreeMap<(usize, usize), (String, EntityType)> = BTreeMap::new();

        let mut record = |m: Match<'_>, entity_type: EntityType| {
            spans
                .entry((m.start(), m.end()))
                .and_modify(|(_, existing)| {
                    if entity_type > *existing {
                        *existing = entity_type;
                    }
                })
                .or_insert_with(|| (m.as_str().to_string(), entity_type));
        };

        for m in patterns.proper_noun.find_iter(text) {
            if m.as_str().chars().count() > 2 {
                record(m, EntityType::Entity);
            }
        }
        for m in patterns.camel_case.find_iter(text) {
            record(m, EntityType::Identifier);
        }
        for cap in patterns.service.captures_iter(text) {
            if let Some(m) = cap.get(1) {
                record(m, EntityType::Service);
            }
        }

        spans.into_values().collect()
    }
}

/// NER-backed extractor. Falls back to [`PatternExtractor`] for any text the
/// engine fails on.
pub struct NerExtractor<E> {
    engine: E,
}

impl<E: NerEngine> NerExtractor<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: NerEngine> EntityExtractor for NerExtractor<E> {
    fn extract_entities(&self, text: &str) -> Vec<(String, EntityType)> {
        match self.engine.recognize(text) {
            Ok(spans) => spans
                .into_iter()
                .filter(|(_, label)| NER_LABELS.contains(&label.as_str()))
                .map(|(span, _)| {
                    let entity_type = EntityType::classify(&span, Some(EntityType::Entity));
                    (span, entity_type)
                })
                .collect(),
            Err(e) => {
                log::warn!("NER engine failed, using pattern extraction: {}", e);
                PatternExtractor.extract_entities(text)
            }
        }
    }
}

struct RelationPattern {
    regex: Regex,
    relation_type: RelationType,
    /// Second capture is a comma/`and` separated list of targets.
    list: bool,
}

fn relation_patterns() -> &'static [RelationPattern] {
    static PATTERNS: OnceLock<Vec<RelationPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: [(&str, RelationType, bool); 7] = [
            (
                r"(?i)\b(\w+(?:Service|Router|Module|Manager))\s+depends?\s+on\s+(\w+(?:Service|Router|Module|Manager))\b",
                RelationType::DependsOn,
                false,
            ),
            (
                r"(?i)\b(\w+(?:Service|Router|Module))\s+uses?\s+(\w+(?:Service|Router|Module))\b",
                RelationType::Uses,
                false,
            ),
            (
                r"(?i)\b(\w+(?:Service|Router))\s+calls?\s+(\w+(?:Service|Router))\b",
                RelationType::Calls,
                false,
            ),
            (r"(?i)\b(\w+)\s+extends?\s+(\w+)\b", RelationType::Extends, false),
            (r"(?i)\b(\w+)\s+implements?\s+(\w+)\b", RelationType::Implements, false),
            (r"(?i)\b(\w+)\s+depends?\s+on:\s*([^.\n]+)", RelationType::DependsOnList, true),
            (r"(?i)\b(\w+)\s+(?:is\s+)?used\s+by:\s*([^.\n]+)", RelationType::UsedByList, true),
        ];
        table
            .into_iter()
            .map(|(pattern, relation_type, list)| RelationPattern {
                regex: Regex::new(pattern).expect("Invalid regex pattern"),
                relation_type,
                list,
            })
            .collect()
    })
}

fn list_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*(?:,|;|\band\b)\s*").expect("Invalid regex pattern"))
}

fn list_items(list: &str) -> impl Iterator<Item = &str> {
    list_separator()
        .split(list)
        .map(|item| item.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|item| !item.is_empty())
}

fn snippet(text: &str) -> String {
    text.chars().take(CONTEXT_CHARS).collect()
}

/// Extract relations between `known_entities` mentioned in `text`.
///
/// Emits one CO_OCCURS relation per unordered pair of distinct known entities
/// (source = earlier in `known_entities`), then explicit pattern relations whose
/// captured names are both known. Never introduces a new entity.
pub fn extract_relations(text: &str, known_entities: &[String]) -> Vec<Relation> {
    let mut seen = HashSet::new();
    let entities: Vec<&str> = known_entities
        .iter()
        .map(String::as_str)
        .filter(|e| seen.insert(*e))
        .collect();

    let context = vec![snippet(text)];
    let make = |source: &str, target: &str, relation_type: RelationType, weight: f64| Relation {
        source: source.to_string(),
        target: target.to_string(),
        relation_type,
        weight,
        context: context.clone(),
    };

    let mut relations = Vec::new();

    for (i, &source) in entities.iter().enumerate() {
        for &target in &entities[i + 1..] {
            relations.push(make(source, target, RelationType::CoOccurs, CO_OCCURRENCE_WEIGHT));
        }
    }

    let known: HashSet<&str> = entities.iter().copied().collect();

    for pattern in relation_patterns() {
        for cap in pattern.regex.captures_iter(text) {
            let (Some(source), Some(rest)) = (cap.get(1), cap.get(2)) else {
                continue;
            };
            let source = source.as_str();
            if !known.contains(source) {
                continue;
            }

            if pattern.list {
                for target in list_items(rest.as_str()) {
                    if target != source && known.contains(target) {
                        relations.push(make(source, target, pattern.relation_type, EXPLICIT_WEIGHT));
                    }
                }
            } else if known.contains(rest.as_str()) {
                relations.push(make(source, rest.as_str(), pattern.relation_type, EXPLICIT_WEIGHT));
            }
        }
    }

    relations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphRagError;

    fn names(found: &[(String, EntityType)]) -> Vec<&str> {
        found.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn known(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pattern_extraction_types_and_order() {
        let text = "The AuthService uses TokenService. Payment Gateway talks to UserProfile.";
        let found = PatternExtractor.extract_entities(text);

        assert_eq!(
            found,
            vec![
                ("The".to_string(), EntityType::Entity),
                ("AuthService".to_string(), EntityType::Service),
                ("TokenService".to_string(), EntityType::Service),
                ("Payment Gateway".to_string(), EntityType::Entity),
                ("UserProfile".to_string(), EntityType::Identifier),
            ]
        );
    }

    #[test]
    fn test_pattern_extraction_counts_each_occurrence_once() {
        let found = PatternExtractor.extract_entities("AuthService then AuthService again");
        assert_eq!(names(&found), vec!["AuthService", "AuthService"]);
        assert!(found.iter().all(|(_, t)| *t == EntityType::Service));
    }

    #[test]
    fn test_pattern_extraction_drops_short_words() {
        let found = PatternExtractor.extract_entities("An apple, ok. Be quick, Tom.");
        assert_eq!(names(&found), vec!["Tom"]);
    }

    #[test]
    fn test_pattern_extraction_is_deterministic() {
        let text = "OrderManager calls BillingHandler. Orders flow through Kafka.";
        assert_eq!(
            PatternExtractor.extract_entities(text),
            PatternExtractor.extract_entities(text)
        );
    }

    #[test]
    fn test_pattern_extraction_no_matches() {
        assert!(PatternExtractor.extract_entities("no capitals here, just text.").is_empty());
    }

    struct FixedNer(Vec<(&'static str, &'static str)>);

    impl NerEngine for FixedNer {
        fn recognize(&self, _text: &str) -> Result<Vec<(String, String)>> {
            Ok(self.0.iter().map(|(s, l)| (s.to_string(), l.to_string())).collect())
        }
    }

    struct BrokenNer;

    impl NerEngine for BrokenNer {
        fn recognize(&self, _text: &str) -> Result<Vec<(String, String)>> {
            Err(GraphRagError::Extraction("model not loaded".into()))
        }
    }

    #[test]
    fn test_ner_extractor_filters_labels() {
        let extractor = NerExtractor::new(FixedNer(vec![
            ("Acme Corp", "ORG"),
            ("yesterday", "DATE"),
            ("CheckoutService", "PRODUCT"),
        ]));
        let found = extractor.extract_entities("ignored");
        assert_eq!(
            found,
            vec![
                ("Acme Corp".to_string(), EntityType::Entity),
                ("CheckoutService".to_string(), EntityType::Service),
            ]
        );
    }

    #[test]
    fn test_ner_extractor_falls_back_to_patterns() {
        let extractor = NerExtractor::new(BrokenNer);
        let found = extractor.extract_entities("AuthService is up");
        assert_eq!(found, vec![("AuthService".to_string(), EntityType::Service)]);
    }

    #[test]
    fn test_co_occurrence_pairs() {
        let relations = extract_relations(
            "AuthService, TokenService and UserManager",
            &known(&["AuthService", "TokenService", "UserManager", "AuthService"]),
        );
        let pairs: Vec<_> = relations
            .iter()
            .filter(|r| r.relation_type == RelationType::CoOccurs)
            .map(|r| (r.source.as_str(), r.target.as_str(), r.weight))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("AuthService", "TokenService", 1.0),
                ("AuthService", "UserManager", 1.0),
                ("TokenService", "UserManager", 1.0),
            ]
        );
    }

    #[test]
    fn test_explicit_relations_require_known_entities() {
        let text = "AuthService depends on TokenService. PaymentRouter calls AuthService.";
        let relations = extract_relations(text, &known(&["AuthService", "TokenService"]));

        let explicit: Vec<_> = relations
            .iter()
            .filter(|r| r.relation_type != RelationType::CoOccurs)
            .collect();
        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit[0].source, "AuthService");
        assert_eq!(explicit[0].target, "TokenService");
        assert_eq!(explicit[0].relation_type, RelationType::DependsOn);
        assert_eq!(explicit[0].weight, 2.0);
        assert!(relations.iter().all(|r| r.source != "PaymentRouter" && r.target != "PaymentRouter"));
    }

    #[test]
    fn test_verb_patterns_case_insensitive() {
        let text = "OrderService USES CartService; BillingRouter Calls LedgerRouter.";
        let relations = extract_relations(
            text,
            &known(&["OrderService", "CartService", "BillingRouter", "LedgerRouter"]),
        );
        assert!(relations.iter().any(|r| r.relation_type == RelationType::Uses
            && r.source == "OrderService"
            && r.target == "CartService"));
        assert!(relations.iter().any(|r| r.relation_type == RelationType::Calls
            && r.source == "BillingRouter"
            && r.target == "LedgerRouter"));
    }

    #[test]
    fn test_extends_and_implements() {
        let text = "AdminProfile extends UserProfile and CacheStore implements KeyStore.";
        let relations = extract_relations(
            text,
            &known(&["AdminProfile", "UserProfile", "CacheStore", "KeyStore"]),
        );
        assert!(relations.iter().any(|r| r.relation_type == RelationType::Extends
            && r.source == "AdminProfile"
            && r.target == "UserProfile"));
        assert!(relations.iter().any(|r| r.relation_type == RelationType::Implements
            && r.source == "CacheStore"
            && r.target == "KeyStore"));
    }

    #[test]
    fn test_dependency_lists() {
        let text = "OrderService depends on: AuthService, TokenService and CartService.\n\
                    AuthService used by: OrderService, ReportModule";
        let relations = extract_relations(
            text,
            &known(&["OrderService", "AuthService", "TokenService", "ReportModule"]),
        );

        let listed: Vec<_> = relations
            .iter()
            .filter(|r| matches!(r.relation_type, RelationType::DependsOnList | RelationType::UsedByList))
            .map(|r| (r.relation_type, r.source.as_str(), r.target.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (RelationType::DependsOnList, "OrderService", "AuthService"),
                (RelationType::DependsOnList, "OrderService", "TokenService"),
                (RelationType::UsedByList, "AuthService", "OrderService"),
                (RelationType::UsedByList, "AuthService", "ReportModule"),
            ]
        );
    }

    #[test]
    fn test_relation_context_is_truncated() {
        let text = format!("AuthService uses TokenService. {}", "x".repeat(500));
        let relations = extract_relations(&text, &known(&["AuthService", "TokenService"]));
        assert!(!relations.is_empty());
        assert!(relations.iter().all(|r| r.context.len() == 1 && r.context[0].chars().count() == 200));
    }

    #[test]
    fn test_no_relations_without_known_entities() {
        assert!(extract_relations("AuthService uses TokenService", &[]).is_empty());
    }
}
