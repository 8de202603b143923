// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `drift.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::provider::memory::MemoryDnsProvider;
    use crate::provider::ManagedZone;
    use crate::zone::ZoneBinding;
    use std::sync::Arc;
    use std::time::Duration;

    fn key() -> RecordKey {
        RecordKey::new("web", "prod", "example.com")
    }

    fn record(addrs: &[&str]) -> DesiredRecord {
        let addrs: Vec<String> = addrs.iter().map(|s| (*s).to_string()).collect();
        DesiredRecord::new(key(), &addrs, 300)
    }

    fn setup() -> (Arc<MemoryDnsProvider>, DriftReconciler) {
        let provider = Arc::new(MemoryDnsProvider::new(vec![ManagedZone::new(
            "public",
            "example.com.",
        )]));
        let binding = ZoneBinding {
            domain: "example.com".to_string(),
            zone: "public".to_string(),
            dns_name: "example.com.".to_string(),
        };
        let applier = ChangeApplier::new(provider.clone(), binding, Duration::from_millis(5));
        (provider, DriftReconciler::new(applier))
    }

    #[test]
    fn test_correction_none_when_matching() {
        let desired = record(&["10.0.0.1", "10.0.0.2"]);
        let actual = vec![record(&["10.0.0.2", "10.0.0.1"]).to_record_set()];

        assert_eq!(correction(&key(), Some(&desired), &actual), None);
    }

    #[test]
    fn test_correction_none_when_nothing_expected_and_nothing_present() {
        assert_eq!(correction(&key(), None, &[]), None);
    }

    #[test]
    fn test_correction_replaces_drifted_addresses() {
        let desired = record(&["10.0.0.1"]);
        let drifted = record(&["10.9.9.9"]).to_record_set();

        let change = correction(&key(), Some(&desired), &[drifted.clone()]).unwrap();

        assert_eq!(change.deletions, vec![drifted]);
        assert_eq!(change.additions, vec![desired.to_record_set()]);
    }

    #[test]
    fn test_correction_detects_ttl_drift() {
        let desired = record(&["10.0.0.1"]);
        let mut actual = desired.to_record_set();
        actual.ttl = 60;

        let change = correction(&key(), Some(&desired), &[actual.clone()]).unwrap();

        assert_eq!(change.deletions, vec![actual]);
        assert_eq!(change.additions[0].ttl, 300);
    }

    #[test]
    fn test_correction_recreates_missing_record() {
        let desired = record(&["10.0.0.1"]);

        let change = correction(&key(), Some(&desired), &[]).unwrap();

        assert!(change.deletions.is_empty());
        assert_eq!(change.additions, vec![desired.to_record_set()]);
    }

    #[test]
    fn test_correction_removes_unexpected_record() {
        let stale = record(&["10.0.0.1"]).to_record_set();

        let change = correction(&key(), None, &[stale.clone()]).unwrap();

        assert_eq!(change.deletions, vec![stale]);
        assert!(change.additions.is_empty());
    }

    #[test]
    fn test_correction_ignores_other_names() {
        let other = DesiredRecord::new(
            RecordKey::new("api", "prod", "example.com"),
            &["10.0.0.5".to_string()],
            300,
        )
        .to_record_set();

        assert_eq!(correction(&key(), None, &[other]), None);
    }

    #[tokio::test]
    async fn test_reconcile_in_sync_submits_nothing() {
        let (provider, reconciler) = setup();
        let desired = record(&["10.0.0.1"]);
        provider.seed_record(desired.to_record_set());

        let outcome = reconciler.reconcile(&key(), Some(&desired)).await.unwrap();

        assert_eq!(outcome, DriftOutcome::InSync);
        assert!(provider.submitted_changes().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_repairs_manual_edit() {
        let (provider, reconciler) = setup();
        provider.seed_record(record(&["192.0.2.10"]).to_record_set());
        let desired = record(&["10.0.0.1"]);

        let outcome = reconciler.reconcile(&key(), Some(&desired)).await.unwrap();

        assert!(matches!(
            outcome,
            DriftOutcome::Corrected(ApplyOutcome::Done { .. })
        ));
        assert_eq!(
            provider.record(key().as_str(), "A"),
            Some(desired.to_record_set())
        );
    }

    #[tokio::test]
    async fn test_reconcile_deletes_record_of_removed_service() {
        let (provider, reconciler) = setup();
        provider.seed_record(record(&["10.0.0.1"]).to_record_set());

        reconciler.reconcile(&key(), None).await.unwrap();

        assert!(provider.records().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_list_failure() {
        let provider = Arc::new(MemoryDnsProvider::new(vec![]));
        let binding = ZoneBinding {
            domain: "example.com".to_string(),
            zone: "missing".to_string(),
            dns_name: "example.com.".to_string(),
        };
        let reconciler = DriftReconciler::new(ChangeApplier::new(
            provider,
            binding,
            Duration::from_millis(5),
        ));

        let err = reconciler.reconcile(&key(), None).await.unwrap_err();

        assert!(matches!(err, DriftError::List(_)));
    }
}
