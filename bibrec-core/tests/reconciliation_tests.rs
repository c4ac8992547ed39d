//! Reconciliation Tests
//! Test File: reconciliation_tests.rs
//! Covers: aggregation, deduplication and completeness over whole candidate sets

use bibrec_core::fusion::{CandidateAggregator, Deduplicator};
use bibrec_core::validators::{CompletenessValidator, CountValidationResult, PageRelationshipHints};
use bibrec_core::workflow::Reconciler;
use bibrec_core::{CandidateEntity, DetectionMethod};

fn candidate(chunk: usize, method: DetectionMethod) -> CandidateEntity {
    CandidateEntity::new(chunk, chunk as u32 + 1, method)
}

/// Four inventors spread over three chunks, with one repeated on the continuation sheet
fn inventor_sheet() -> Vec<CandidateEntity> {
    vec![
        candidate(0, DetectionMethod::Table)
            .with_given_name("Jane")
            .with_family_name("Doe")
            .with_address("city", "Austin")
            .with_address("country", "US")
            .with_sequence_hint(1),
        candidate(0, DetectionMethod::Table)
            .with_given_name("Akira")
            .with_family_name("Tanaka")
            .with_address("city", "Tokyo")
            .with_address("country", "Japan")
            .with_sequence_hint(2),
        candidate(1, DetectionMethod::TextPattern)
            .with_full_name("Akira Tanaka")
            .with_address("postal_code", "100-0001")
            .with_scores(0.7, 0.5),
        candidate(1, DetectionMethod::FormField)
            .with_given_name("Maria")
            .with_family_name("Garcia")
            .with_sequence_hint(3),
        candidate(4, DetectionMethod::Layout)
            .with_given_name("JANE")
            .with_family_name("DOE")
            .with_address("postal_code", "78701")
            .with_scores(0.8, 0.9),
    ]
}

/// TC-REC-001: Split inventor is reunited
#[test]
fn tc_rec_001_split_inventor_scenario() {
    // Given: JOHN SMITH in chunk 0 and SMITH with a city in chunk 1
    let candidates = vec![
        candidate(0, DetectionMethod::Table)
            .with_given_name("JOHN")
            .with_family_name("SMITH"),
        candidate(1, DetectionMethod::Table)
            .with_family_name("SMITH")
            .with_address("city", "Boston")
            .with_sequence_hint(1),
    ];

    // When: Reconciled
    let result = Reconciler::default().reconcile(&candidates, None, &PageRelationshipHints::default());

    // Then: One canonical entity carrying all three values
    assert_eq!(result.entities.len(), 1);
    let entity = &result.entities[0];
    assert_eq!(entity.field("family_name"), Some("SMITH"));
    assert_eq!(entity.field("given_name"), Some("JOHN"));
    assert_eq!(entity.field("city"), Some("Boston"));
    assert_eq!(entity.provenance.get("city"), Some(&1));
    assert_eq!(entity.sequence_hint, Some(1));
}

/// TC-REC-002: Every candidate lands in exactly one aggregated entity
#[test]
fn tc_rec_002_total_coverage() {
    // Given: A realistic inventor sheet
    let candidates = inventor_sheet();

    // When: Aggregated
    let aggregated = CandidateAggregator::default().aggregate(&candidates);

    // Then: Member counts add up and every candidate appears once
    let members: usize = aggregated.iter().map(|e| e.members.len()).sum();
    assert_eq!(members, candidates.len());
    for c in &candidates {
        let hits = aggregated
            .iter()
            .flat_map(|e| e.members.iter())
            .filter(|m| *m == c)
            .count();
        assert_eq!(hits, 1, "candidate {:?} appears {} times", c.display_name(), hits);
    }
    for entity in &aggregated {
        assert!(entity.members.contains(&entity.primary));
        assert!(entity.aggregate_confidence <= 1.0);
    }
}

/// TC-REC-003: Repeated inventor far apart is merged by the deduplicator
#[test]
fn tc_rec_003_global_merge() {
    // Given: Jane Doe on the first sheet and again in chunk 4
    let candidates = inventor_sheet();

    // When: Reconciled with the known count
    let result = Reconciler::default().reconcile(&candidates, Some(3), &PageRelationshipHints::default());

    // Then: Three inventors in printed order, Jane with both chunks
    let names: Vec<String> = result
        .entities
        .iter()
        .map(|e| e.field("family_name").unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["Doe", "Tanaka", "Garcia"]);
    assert_eq!(result.entities[0].source_chunks, vec![0, 4]);
    assert_eq!(result.entities[0].field("postal_code"), Some("78701"));
    assert_eq!(result.completeness.count, CountValidationResult::Ok { found: 3 });
    assert!(!result.completeness.generation_blocked);
}

/// TC-REC-004: Same input twice gives identical output
#[test]
fn tc_rec_004_idempotence() {
    // Given: The same candidates
    let candidates = inventor_sheet();
    let reconciler = Reconciler::default();

    // When: Reconciled twice
    let first = reconciler.reconcile(&candidates, None, &PageRelationshipHints::default());
    let second = reconciler.reconcile(&candidates, None, &PageRelationshipHints::default());

    // Then: Entities are equal field for field
    assert_eq!(first.entities, second.entities);
}

/// TC-REC-005: Corroboration never lowers confidence
#[test]
fn tc_rec_005_monotonic_confidence() {
    // Given: One candidate, then the same plus a corroborating weaker one
    let base = vec![candidate(0, DetectionMethod::Table)
        .with_full_name("Jane Doe")
        .with_scores(0.8, 1.0)];
    let mut corroborated = base.clone();
    corroborated.push(
        candidate(1, DetectionMethod::TextPattern)
            .with_full_name("Jane Doe")
            .with_scores(0.4, 0.5),
    );

    // When: Each set is aggregated
    let aggregator = CandidateAggregator::default();
    let before = aggregator.aggregate(&base);
    let after = aggregator.aggregate(&corroborated);

    // Then: One group each, confidence did not drop
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1);
    assert!(after[0].aggregate_confidence >= before[0].aggregate_confidence);
}

/// TC-REC-006: Count mismatch blocks generation
#[test]
fn tc_rec_006_count_mismatch() {
    // Given: Three distinct inventors but an expected count of 2
    let candidates = vec![
        candidate(0, DetectionMethod::Table).with_full_name("Alice Adams"),
        candidate(0, DetectionMethod::Table).with_full_name("Bob Brown"),
        candidate(1, DetectionMethod::Table).with_full_name("Carol Chen"),
    ];

    // When: Reconciled
    let result = Reconciler::default().reconcile(&candidates, Some(2), &PageRelationshipHints::default());

    // Then: Count mismatch, generation blocked
    assert_eq!(
        result.completeness.count,
        CountValidationResult::Mismatch { expected: 2, found: 3 }
    );
    assert!(result.completeness.generation_blocked);
}

/// TC-REC-007: Gap in printed sequence is advisory
#[test]
fn tc_rec_007_missing_inventor_indicator() {
    // Given: Inventors printed as #1, #2, #4
    let candidates = vec![
        candidate(0, DetectionMethod::Table).with_full_name("Alice Adams").with_sequence_hint(1),
        candidate(0, DetectionMethod::Table).with_full_name("Bob Brown").with_sequence_hint(2),
        candidate(1, DetectionMethod::Table).with_full_name("Dan Drake").with_sequence_hint(4),
    ];

    // When: Reconciled without an expected count
    let result = Reconciler::default().reconcile(&candidates, None, &PageRelationshipHints::default());

    // Then: Position 3 suspected, nothing blocked
    assert_eq!(result.completeness.indicators.len(), 1);
    assert_eq!(result.completeness.indicators[0].suspected_position, 3);
    assert!(!result.completeness.generation_blocked);
}

/// TC-REC-008: Candidate without a name is reported, not dropped
#[test]
fn tc_rec_008_malformed_candidate_flows_through() {
    // Given: A candidate parsed from JSON with only an address
    let candidates: Vec<CandidateEntity> =
        serde_json::from_str(r#"[{"address": {"city": "Boston"}, "chunk": 0}]"#).unwrap();

    // When: Reconciled and checked for completeness
    let result = Reconciler::default().reconcile(&candidates, None, &PageRelationshipHints::default());
    let missing = CompletenessValidator::default().validate_field_completeness(&result.entities, &[]);

    // Then: One entity, flagged for its missing name
    assert_eq!(result.entities.len(), 1);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].missing, vec!["name"]);
}

/// TC-REC-009: Deduplicator alone keeps distinct people apart
#[test]
fn tc_rec_009_distinct_people_not_merged() {
    // Given: Two people sharing a family name, one chunk apart
    let aggregated = CandidateAggregator::default().aggregate(&[
        candidate(0, DetectionMethod::Table).with_given_name("John").with_family_name("Smith"),
        candidate(1, DetectionMethod::Table).with_given_name("Mary").with_family_name("Smith"),
    ]);

    // When: Deduplicated
    let canonical = Deduplicator::default().deduplicate(&aggregated);

    // Then: Both survive
    assert_eq!(canonical.len(), 2);
}

/// TC-REC-010: Family-first printing is the same person
#[test]
fn tc_rec_010_family_first_name_order() {
    // Given: John Smith as given/family fields, then printed "SMITH, John" on the next chunk
    let candidates = vec![
        candidate(0, DetectionMethod::Table)
            .with_given_name("John")
            .with_family_name("Smith"),
        candidate(1, DetectionMethod::TextPattern)
            .with_full_name("SMITH, John")
            .with_address("city", "Boston"),
    ];

    // When: Reconciled
    let result = Reconciler::default().reconcile(&candidates, Some(1), &PageRelationshipHints::default());

    // Then: One inventor, count gate passes
    assert_eq!(result.aggregated, 1);
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].field("city"), Some("Boston"));
    assert!(!result.completeness.generation_blocked);
}

/// TC-REC-011: Co-inventors sharing an employer address stay separate
#[test]
fn tc_rec_011_shared_address_co_inventors() {
    // Given: Two named inventors and a nameless fragment, all at the same address, far apart
    let at_office = |c: CandidateEntity| c.with_address("postal_code", "02139").with_address("city", "Cambridge");
    let candidates = vec![
        at_office(candidate(0, DetectionMethod::Table).with_full_name("John Smith")),
        at_office(candidate(3, DetectionMethod::Layout)),
        at_office(candidate(6, DetectionMethod::Table).with_full_name("Mary Major")),
    ];

    // When: Reconciled with the known count
    let result = Reconciler::default().reconcile(&candidates, Some(2), &PageRelationshipHints::default());

    // Then: Both inventors survive
    let names: Vec<&str> = result.entities.iter().filter_map(|e| e.field("full_name")).collect();
    assert_eq!(names, vec!["John Smith", "Mary Major"]);
    assert!(!result.completeness.generation_blocked);
}
