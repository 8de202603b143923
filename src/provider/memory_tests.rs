// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `provider/memory.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::record::{DesiredRecord, RecordKey};

    const ZONE: &str = "example-zone";

    fn provider() -> MemoryDnsProvider {
        MemoryDnsProvider::new(vec![ManagedZone::new(ZONE, "example.com.")])
    }

    fn record(addrs: &[&str]) -> DesiredRecord {
        let addrs: Vec<String> = addrs.iter().map(|s| (*s).to_string()).collect();
        DesiredRecord::new(RecordKey::new("web", "prod", "example.com"), &addrs, 300)
    }

    #[tokio::test]
    async fn test_addition_then_done() {
        let provider = provider().with_pending_polls(1);
        let desired = record(&["10.0.0.1"]);

        let submitted = provider
            .create_change(ZONE, &Change::add(&desired))
            .await
            .unwrap();
        assert_eq!(submitted.status, ChangeStatus::Pending);

        let first = provider.get_change(ZONE, &submitted.id).await.unwrap();
        assert_eq!(first.status, ChangeStatus::Pending);
        let second = provider.get_change(ZONE, &submitted.id).await.unwrap();
        assert_eq!(second.status, ChangeStatus::Done);

        assert_eq!(
            provider.record("web.prod.example.com.", "A"),
            Some(desired.to_record_set())
        );
    }

    #[tokio::test]
    async fn test_duplicate_addition_is_rejected() {
        let provider = provider();
        let desired = record(&["10.0.0.1"]);
        provider.seed_record(desired.to_record_set());

        let err = provider
            .create_change(ZONE, &Change::add(&desired))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Rejected { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_stale_deletion_is_rejected_atomically() {
        let provider = provider();
        provider.seed_record(record(&["10.0.0.9"]).to_record_set());

        let change = Change::replace(&record(&["10.0.0.1"]), &record(&["10.0.0.2"]));
        let err = provider.create_change(ZONE, &change).await.unwrap_err();

        assert!(matches!(err, ProviderError::Rejected { status: 412, .. }));
        assert_eq!(
            provider.record("web.prod.example.com.", "A").unwrap().rrdatas,
            vec!["10.0.0.9".to_string()]
        );
        assert!(provider.submitted_changes().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_matches_regardless_of_order() {
        let provider = provider();
        provider.seed_record(record(&["10.0.0.2", "10.0.0.1"]).to_record_set());

        provider
            .create_change(ZONE, &Change::delete(&record(&["10.0.0.1", "10.0.0.2"])))
            .await
            .unwrap();

        assert!(provider.records().is_empty());
    }

    #[tokio::test]
    async fn test_failing_polls() {
        let provider = provider();
        let submitted = provider
            .create_change(ZONE, &Change::add(&record(&["10.0.0.1"])))
            .await
            .unwrap();

        provider.fail_next_polls(1);
        let err = provider.get_change(ZONE, &submitted.id).await.unwrap_err();
        assert!(err.is_retryable());

        let done = provider.get_change(ZONE, &submitted.id).await.unwrap();
        assert!(done.status.is_done());
    }

    #[tokio::test]
    async fn test_unknown_zone_is_rejected() {
        let err = provider().list_records("other", "x.", "A").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_overlapping_submissions_are_counted() {
        let provider = provider().with_pending_polls(5);

        provider
            .create_change(ZONE, &Change::add(&record(&["10.0.0.1"])))
            .await
            .unwrap();
        provider
            .create_change(
                ZONE,
                &Change::replace(&record(&["10.0.0.1"]), &record(&["10.0.0.2"])),
            )
            .await
            .unwrap();

        assert_eq!(provider.overlapping_submissions(), 1);
    }

    #[tokio::test]
    async fn test_failed_poll_ends_in_flight_tracking() {
        let provider = provider().with_pending_polls(5);
        let submitted = provider
            .create_change(ZONE, &Change::add(&record(&["10.0.0.1"])))
            .await
            .unwrap();

        provider.fail_next_polls(1);
        provider.get_change(ZONE, &submitted.id).await.unwrap_err();
        provider
            .create_change(
                ZONE,
                &Change::replace(&record(&["10.0.0.1"]), &record(&["10.0.0.2"])),
            )
            .await
            .unwrap();

        assert_eq!(provider.overlapping_submissions(), 0);
    }
}
