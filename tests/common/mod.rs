// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Service, ServiceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::watcher::Event;
use kube::Client;
use kube_gce_dns::applier::ChangeApplier;
use kube_gce_dns::diff::RecordPlanner;
use kube_gce_dns::dispatcher::Dispatcher;
use kube_gce_dns::provider::memory::MemoryDnsProvider;
use kube_gce_dns::provider::ManagedZone;
use kube_gce_dns::watch::ServiceCache;
use kube_gce_dns::zone::resolve_zone;
use std::sync::Arc;
use std::time::Duration;

pub const DOMAIN: &str = "example.com";
pub const ZONE: &str = "public";
pub const TTL: u32 = 300;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// An in-memory zone for `example.com.` with a 5ms status poll interval.
pub fn memory_provider(pending_polls: usize) -> Arc<MemoryDnsProvider> {
    Arc::new(
        MemoryDnsProvider::new(vec![
            ManagedZone::new("root", "com."),
            ManagedZone::new(ZONE, "example.com."),
        ])
        .with_pending_polls(pending_polls),
    )
}

/// Build a dispatcher publishing into `provider`.
pub fn dispatcher_for(provider: Arc<MemoryDnsProvider>, recheck_delay: Duration) -> Dispatcher {
    let zones = vec![
        ManagedZone::new("root", "com."),
        ManagedZone::new(ZONE, "example.com."),
    ];
    let binding = resolve_zone(DOMAIN, &zones).expect("zone should resolve");
    let applier = ChangeApplier::new(provider, binding, Duration::from_millis(5));
    Dispatcher::new(RecordPlanner::new(DOMAIN, TTL), applier, recheck_delay)
}

/// Feeds watcher events through the decoder and dispatcher, like the watch loop does.
pub struct Harness {
    pub provider: Arc<MemoryDnsProvider>,
    pub dispatcher: Dispatcher,
    pub cache: ServiceCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(1, Duration::from_millis(50))
    }

    pub fn with(pending_polls: usize, recheck_delay: Duration) -> Self {
        let provider = memory_provider(pending_polls);
        let dispatcher = dispatcher_for(provider.clone(), recheck_delay);
        Self {
            provider,
            dispatcher,
            cache: ServiceCache::new(),
        }
    }

    /// Decode and dispatch one watcher event without waiting for the work to finish.
    pub fn watch(&mut self, event: Event<Service>) {
        for event in self.cache.observe(event) {
            self.dispatcher.dispatch(&event);
        }
    }

    /// Dispatch a resync of every cached service.
    pub fn resync(&self) {
        for event in self.cache.resync_events() {
            self.dispatcher.dispatch(&event);
        }
    }

    /// Wait for all queued work to finish.
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.dispatcher.wait_idle())
            .await
            .expect("dispatcher should drain");
    }

    /// Published addresses for a service, sorted.
    pub fn published(&self, name: &str, namespace: &str) -> Option<Vec<String>> {
        self.provider
            .record(&format!("{name}.{namespace}.{DOMAIN}."), "A")
            .map(|set| {
                let mut addrs = set.rrdatas;
                addrs.sort();
                addrs
            })
    }
}

/// A `Service` whose load balancer reports the given IPs.
pub fn service(name: &str, namespace: &str, ips: &[&str]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        status: Some(ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: Some(
                    ips.iter()
                        .map(|ip| LoadBalancerIngress {
                            ip: Some((*ip).to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}
