// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch boundary.
//!
//! Consumes the `kube` watcher stream for `Service` objects in every namespace and
//! turns it into [`ServiceEvent`]s. The watcher only reports the latest object, so
//! [`ServiceCache`] keeps the last observation of each service to recover the
//! previous state for updates.
//!
//! Relists (after the watch restarts) are compared against the cache: services
//! that disappeared while the watch was down are reported as deleted. The cache
//! also drives the periodic resync, which re-delivers every known service as an
//! unchanged update so the drift reconciler checks its record.

use crate::dispatcher::Dispatcher;
use crate::service::{ServiceEvent, ServiceObservation};
use anyhow::{bail, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::{self, watcher, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// (namespace, name)
type ObjectKey = (String, String);

fn object_key(obs: &ServiceObservation) -> ObjectKey {
    (obs.namespace.clone(), obs.name.clone())
}

/// Last observation of every service seen by the watch.
#[derive(Debug, Default)]
pub struct ServiceCache {
    known: BTreeMap<ObjectKey, ServiceObservation>,
    /// Objects seen during a relist that is still in progress
    relisted: Option<BTreeSet<ObjectKey>>,
}

impl ServiceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of services currently known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no service is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Decode one watcher event into the service events it implies.
    pub fn observe(&mut self, event: Event<Service>) -> Vec<ServiceEvent> {
        match event {
            Event::Apply(service) => vec![self.apply(ServiceObservation::from_service(&service))],
            Event::Delete(service) => {
                vec![self.delete(ServiceObservation::from_service(&service))]
            }
            Event::Init => {
                debug!("Service relist started");
                self.relisted = Some(BTreeSet::new());
                Vec::new()
            }
            Event::InitApply(service) => {
                let obs = ServiceObservation::from_service(&service);
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(object_key(&obs));
                }
                vec![self.apply(obs)]
            }
            Event::InitDone => self.finish_relist(),
        }
    }

    /// Record a created or modified service.
    pub fn apply(&mut self, obs: ServiceObservation) -> ServiceEvent {
        match self.known.insert(object_key(&obs), obs.clone()) {
            Some(old) => ServiceEvent::Updated { old, new: obs },
            None => ServiceEvent::Added(obs),
        }
    }

    /// Record a removed service.
    pub fn delete(&mut self, obs: ServiceObservation) -> ServiceEvent {
        self.known.remove(&object_key(&obs));
        ServiceEvent::Deleted(obs)
    }

    /// Re-deliver every known service as an unchanged update.
    #[must_use]
    pub fn resync_events(&self) -> Vec<ServiceEvent> {
        self.known
            .values()
            .map(|obs| ServiceEvent::Updated {
                old: obs.clone(),
                new: obs.clone(),
            })
            .collect()
    }

    fn finish_relist(&mut self) -> Vec<ServiceEvent> {
        let Some(relisted) = self.relisted.take() else {
            return Vec::new();
        };

        let vanished: Vec<ObjectKey> = self
            .known
            .keys()
            .filter(|key| !relisted.contains(*key))
            .cloned()
            .collect();

        debug!(
            services = relisted.len(),
            vanished = vanished.len(),
            "Service relist finished"
        );

        vanished
            .into_iter()
            .filter_map(|key| self.known.remove(&key))
            .map(ServiceEvent::Deleted)
            .collect()
    }
}

/// Watch services in every namespace and dispatch their events until the stream ends.
///
/// `resync` re-delivers every cached service at that period; `None` disables it.
///
/// # Errors
///
/// Returns an error if the watch stream terminates. Individual watch errors are
/// logged and retried with the watcher's default backoff.
pub async fn run_watch(
    client: Client,
    dispatcher: Dispatcher,
    resync: Option<Duration>,
) -> Result<()> {
    let api: Api<Service> = Api::all(client);
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    let mut cache = ServiceCache::new();
    let mut ticker = resync.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    info!(resync = ?resync, "Watching services in all namespaces");

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(event)) => {
                    for event in cache.observe(event) {
                        dispatcher.dispatch(&event);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Service watch error, retrying");
                }
                None => bail!("Service watch stream ended"),
            },
            () = next_tick(&mut ticker) => {
                debug!(services = cache.len(), "Resyncing services");
                for event in cache.resync_events() {
                    dispatcher.dispatch(&event);
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
