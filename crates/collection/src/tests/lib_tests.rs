use super::*;

fn pdf(name: &str) -> IncomingDocument {
    IncomingDocument::new(name, format!("%PDF-1.5\n% {name}\n").into_bytes())
}

fn collection_of(names: &[&str]) -> (DocumentCollection, Vec<DocumentId>) {
    let mut collection = DocumentCollection::new();
    let report = collection.append(names.iter().map(|name| pdf(name)));
    assert!(report.rejected.is_empty());
    (collection, report.accepted)
}

fn names(collection: &DocumentCollection) -> Vec<String> {
    collection.iter().map(|doc| doc.name().to_string()).collect()
}

#[test]
fn append_assigns_fresh_ids_in_input_order() {
    let (collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf"]);
    assert_eq!(ids, vec![DocumentId(1), DocumentId(2), DocumentId(3)]);
    assert_eq!(collection.ordered_snapshot(), ids);
    assert_eq!(names(&collection), vec!["a.pdf", "b.pdf", "c.pdf"]);
}

#[test]
fn append_of_nothing_is_a_no_op() {
    let (mut collection, ids) = collection_of(&["a.pdf"]);
    let report = collection.append(Vec::<IncomingDocument>::new());
    assert!(report.is_empty());
    assert_eq!(collection.ordered_snapshot(), ids);
}

#[test]
fn invalid_items_are_rejected_without_touching_valid_ones() {
    let (mut collection, _) = collection_of(&["a.pdf"]);
    let report = collection.append(vec![
        IncomingDocument::new("empty.pdf", Vec::<u8>::new()),
        pdf("b.pdf"),
        IncomingDocument::new("notes.txt", b"hello".to_vec()),
        pdf("c.pdf"),
    ]);

    assert_eq!(report.accepted, vec![DocumentId(2), DocumentId(3)]);
    assert_eq!(
        report.rejected,
        vec![
            IngestionError::EmptyPayload {
                name: "empty.pdf".into()
            },
            IngestionError::UnsupportedFormat {
                name: "notes.txt".into()
            },
        ]
    );
    assert_eq!(names(&collection), vec!["a.pdf", "b.pdf", "c.pdf"]);
}

#[test]
fn header_after_leading_junk_is_accepted() {
    let mut payload = vec![b' '; 100];
    payload.extend_from_slice(b"%PDF-1.7");
    assert!(validate_payload("junk.pdf", &payload).is_ok());

    let mut too_late = vec![b' '; HEADER_SEARCH_WINDOW];
    too_late.extend_from_slice(b"%PDF-1.7");
    assert!(validate_payload("late.pdf", &too_late).is_err());
}

#[test]
fn remove_preserves_relative_order_and_ignores_absent_ids() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);

    let removed = collection.remove_at(ids[1]).expect("removed");
    assert_eq!(removed.name(), "b.pdf");
    assert_eq!(collection.ordered_snapshot(), vec![ids[0], ids[2], ids[3]]);

    assert!(collection.remove_at(ids[1]).is_none());
    assert!(collection.remove_at(DocumentId(99)).is_none());
    assert_eq!(collection.len(), 3);
}

#[test]
fn removed_identity_is_never_reissued() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf"]);
    collection.remove_at(ids[1]);

    let report = collection.append(vec![pdf("b.pdf")]);
    let new_id = report.accepted[0];
    assert!(!ids.contains(&new_id));
    assert_eq!(collection.ordered_snapshot(), vec![ids[0], ids[2], new_id]);

    collection.clear();
    let report = collection.append(vec![pdf("a.pdf")]);
    assert_eq!(report.accepted, vec![DocumentId(5)]);
}

#[test]
fn move_to_shifts_intervening_documents() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);

    let outcome = collection.move_to(ids[3], 1).expect("moved");
    assert_eq!(outcome, MoveOutcome { from: 3, to: 1 });
    assert_eq!(names(&collection), vec!["a.pdf", "d.pdf", "b.pdf", "c.pdf"]);

    collection.move_to(ids[0], 2).expect("moved");
    assert_eq!(names(&collection), vec!["d.pdf", "b.pdf", "a.pdf", "c.pdf"]);
}

#[test]
fn move_to_clamps_out_of_range_targets() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf"]);
    let outcome = collection.move_to(ids[0], 40).expect("moved");
    assert_eq!(outcome, MoveOutcome { from: 0, to: 2 });
    assert_eq!(names(&collection), vec!["b.pdf", "c.pdf", "a.pdf"]);
}

#[test]
fn move_to_current_position_is_idempotent() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf"]);
    let outcome = collection.move_to(ids[1], 1).expect("present");
    assert!(!outcome.changed());
    assert_eq!(collection.ordered_snapshot(), ids);
    assert!(collection.move_to(DocumentId(42), 0).is_none());
}

#[test]
fn move_sequences_are_permutations() {
    let (mut collection, ids) = collection_of(&["a", "b", "c", "d", "e", "f", "g"]);
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;

    for _ in 0..500 {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let pick = ids[(seed >> 33) as usize % ids.len()];
        let target = (seed >> 13) as usize % (ids.len() + 3);
        collection.move_to(pick, target);

        let mut order = collection.ordered_snapshot();
        assert_eq!(order.len(), ids.len());
        order.sort();
        assert_eq!(order, ids);
    }
}

#[test]
fn snapshot_is_independent_of_later_mutation() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf", "c.pdf"]);
    let order = collection.ordered_snapshot();
    let snapshot = collection.merge_snapshot();

    collection.move_to(ids[2], 0);
    collection.remove_at(ids[1]);

    assert_eq!(order, ids);
    assert_eq!(snapshot.document_ids(), ids);
    assert_eq!(snapshot.entries()[1].name, "b.pdf");
    assert!(snapshot.entries()[1].payload.starts_with(b"%PDF-"));
}

#[test]
fn summaries_report_positions_and_sizes() {
    let (mut collection, ids) = collection_of(&["a.pdf", "b.pdf"]);
    collection.move_to(ids[1], 0);

    let summaries = collection.summaries();
    assert_eq!(summaries[0].document_id, ids[1]);
    assert_eq!(summaries[0].position, 0);
    assert_eq!(summaries[1].document_id, ids[0]);
    assert_eq!(summaries[1].position, 1);
    assert_eq!(
        summaries[1].size_bytes,
        collection.get(ids[0]).expect("doc").size_bytes()
    );
}
