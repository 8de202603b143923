// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `diff.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    fn planner() -> RecordPlanner {
        RecordPlanner::new("example.com", 300)
    }

    fn obs(addrs: &[&str]) -> ServiceObservation {
        ServiceObservation::new(
            "web",
            "prod",
            addrs.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_add_publishes_record() {
        let plan = planner().plan(&ServiceEvent::Added(obs(&["10.0.0.1"])));

        let Plan::Apply { change, desired } = plan else {
            panic!("expected apply, got {plan:?}");
        };
        assert!(change.deletions.is_empty());
        assert_eq!(change.additions.len(), 1);
        assert_eq!(change.additions[0].name, "web.prod.example.com.");
        assert_eq!(change.additions[0].record_type, "A");
        assert_eq!(change.additions[0].ttl, 300);
        assert_eq!(change.additions[0].rrdatas, strings(&["10.0.0.1"]));
        assert_eq!(desired.unwrap().key.as_str(), "web.prod.example.com.");
    }

    #[test]
    fn test_add_without_addresses_is_noop() {
        assert_eq!(planner().plan(&ServiceEvent::Added(obs(&[]))), Plan::Noop);
    }

    #[test]
    fn test_update_empty_to_empty_is_noop() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&[]),
            new: obs(&[]),
        });
        assert_eq!(plan, Plan::Noop);
    }

    #[test]
    fn test_update_empty_to_assigned_adds() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&[]),
            new: obs(&["10.0.0.1"]),
        });

        let Plan::Apply { change, .. } = plan else {
            panic!("expected apply");
        };
        assert!(change.deletions.is_empty());
        assert_eq!(change.additions[0].rrdatas, strings(&["10.0.0.1"]));
    }

    #[test]
    fn test_update_assigned_to_empty_deletes() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&["10.0.0.1"]),
            new: obs(&[]),
        });

        let Plan::Apply { change, desired } = plan else {
            panic!("expected apply");
        };
        assert!(change.additions.is_empty());
        assert_eq!(change.deletions[0].rrdatas, strings(&["10.0.0.1"]));
        assert!(desired.is_none());
    }

    #[test]
    fn test_update_same_set_reconciles() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&["10.0.0.1", "10.0.0.2"]),
            new: obs(&["10.0.0.2", "10.0.0.1"]),
        });

        let Plan::Reconcile(desired) = plan else {
            panic!("expected reconcile");
        };
        assert_eq!(desired.addresses, strings(&["10.0.0.2", "10.0.0.1"]));
    }

    #[test]
    fn test_update_different_set_replaces_in_one_change() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&["10.0.0.1"]),
            new: obs(&["10.0.0.1", "10.0.0.2"]),
        });

        let Plan::Apply { change, .. } = plan else {
            panic!("expected apply");
        };
        assert_eq!(change.deletions.len(), 1);
        assert_eq!(change.additions.len(), 1);
        assert_eq!(change.deletions[0].name, change.additions[0].name);
        assert_eq!(change.deletions[0].rrdatas, strings(&["10.0.0.1"]));
        assert_eq!(change.additions[0].rrdatas, strings(&["10.0.0.1", "10.0.0.2"]));
    }

    #[test]
    fn test_delete_retracts_own_addresses() {
        let plan = planner().plan(&ServiceEvent::Deleted(obs(&["10.0.0.1"])));

        let Plan::Apply { change, desired } = plan else {
            panic!("expected apply");
        };
        assert!(change.additions.is_empty());
        assert_eq!(change.deletions.len(), 1);
        assert_eq!(change.deletions[0].rrdatas, strings(&["10.0.0.1"]));
        assert!(desired.is_none());
    }

    #[test]
    fn test_delete_without_addresses_is_noop() {
        assert_eq!(planner().plan(&ServiceEvent::Deleted(obs(&[]))), Plan::Noop);
    }

    #[test]
    fn test_duplicate_addresses_do_not_count_as_a_change() {
        let plan = planner().plan(&ServiceEvent::Updated {
            old: obs(&["10.0.0.1"]),
            new: obs(&["10.0.0.1", "10.0.0.1"]),
        });

        assert!(matches!(plan, Plan::Reconcile(_)));
    }

    #[test]
    fn test_desired_for_uses_domain_and_ttl() {
        let planner = RecordPlanner::new("apps.example.com.", 60);
        let desired = planner.desired_for(&obs(&["10.0.0.1"])).unwrap();

        assert_eq!(desired.key.as_str(), "web.prod.apps.example.com.");
        assert_eq!(desired.ttl, 60);
        assert!(planner.desired_for(&obs(&[])).is_none());
    }
}
