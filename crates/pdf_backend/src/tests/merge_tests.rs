use super::*;
use crate::fixtures::{build_pdf, page_labels, pages_are_self_contained, truncated_pdf};

async fn merge_all(collaborator: &LopdfMergeCollaborator, payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut output = collaborator.create_empty().await.expect("create output");
    for payload in payloads {
        let source = collaborator.load(payload).await.expect("load source");
        let pages = collaborator.page_indices(&source);
        let copied = collaborator
            .copy_pages(&mut output, source, &pages)
            .await
            .expect("copy pages");
        for page in copied {
            collaborator.append(&mut output, page).await.expect("append");
        }
    }
    collaborator.serialize(output).await.expect("serialize")
}

#[tokio::test]
async fn page_indices_follow_native_order() {
    let collaborator = LopdfMergeCollaborator::new();
    let source = collaborator
        .load(&build_pdf(&["A1", "A2", "A3"]))
        .await
        .expect("load");
    assert_eq!(collaborator.page_indices(&source), vec![1, 2, 3]);
    assert_eq!(source.page_count(), 3);
}

#[tokio::test]
async fn copies_pages_in_source_then_append_order() {
    let collaborator = LopdfMergeCollaborator::new();
    let merged = merge_all(
        &collaborator,
        &[
            build_pdf(&["A1", "A2", "A3"]),
            build_pdf(&["B1"]),
            build_pdf(&["C1", "C2"]),
        ],
    )
    .await;

    assert_eq!(
        page_labels(&merged).expect("labels"),
        vec!["A1", "A2", "A3", "B1", "C1", "C2"]
    );
}

#[tokio::test]
async fn uncompressed_output_is_readable_too() {
    let collaborator = LopdfMergeCollaborator::new().with_compression(false);
    let merged = merge_all(&collaborator, &[build_pdf(&["X1"]), build_pdf(&["Y1"])]).await;
    assert_eq!(page_labels(&merged).expect("labels"), vec!["X1", "Y1"]);
}

#[tokio::test]
async fn inherited_resources_travel_with_each_page() {
    let source = build_pdf(&["A1", "A2"]);
    assert!(!pages_are_self_contained(&source).expect("inspect source"));

    let merged = merge_all(&LopdfMergeCollaborator::new(), &[source]).await;
    assert!(pages_are_self_contained(&merged).expect("inspect output"));
}

#[tokio::test]
async fn single_source_round_trips_every_page() {
    let collaborator = LopdfMergeCollaborator::new();
    let merged = merge_all(&collaborator, &[build_pdf(&["P1", "P2", "P3", "P4"])]).await;
    assert_eq!(page_count(&merged).expect("count"), 4);
    assert_eq!(
        page_labels(&merged).expect("labels"),
        vec!["P1", "P2", "P3", "P4"]
    );
}

#[tokio::test]
async fn output_is_only_as_long_as_what_was_appended() {
    let collaborator = LopdfMergeCollaborator::new();
    let mut output = collaborator.create_empty().await.expect("create");
    let source = collaborator
        .load(&build_pdf(&["A1", "A2", "A3"]))
        .await
        .expect("load");

    let mut copied = collaborator
        .copy_pages(&mut output, source, &[3, 1])
        .await
        .expect("copy");
    let first = copied.remove(0);
    collaborator.append(&mut output, first).await.expect("append");
    assert_eq!(output.page_count(), 1);

    let merged = collaborator.serialize(output).await.expect("serialize");
    assert_eq!(page_labels(&merged).expect("labels"), vec!["A3"]);
}

#[tokio::test]
async fn copying_a_missing_page_fails() {
    let collaborator = LopdfMergeCollaborator::new();
    let mut output = collaborator.create_empty().await.expect("create");
    let source = collaborator
        .load(&build_pdf(&["A1"]))
        .await
        .expect("load");

    let err = collaborator
        .copy_pages(&mut output, source, &[2])
        .await
        .expect_err("page 2 does not exist");
    assert!(err.to_string().contains("page 2"));
}

#[tokio::test]
async fn malformed_payload_fails_to_load() {
    let collaborator = LopdfMergeCollaborator::new();
    assert!(collaborator.load(&truncated_pdf()).await.is_err());
    assert!(collaborator.load(b"not a pdf").await.is_err());
}

#[tokio::test]
async fn empty_output_serializes_to_a_zero_page_document() {
    let collaborator = LopdfMergeCollaborator::new();
    let output = collaborator.create_empty().await.expect("create");
    let bytes = collaborator.serialize(output).await.expect("serialize");
    assert!(bytes.starts_with(b"%PDF-1.5"));
    assert_eq!(page_count(&bytes).expect("count"), 0);
}
