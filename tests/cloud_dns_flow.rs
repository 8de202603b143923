// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Startup and publication against a mocked Cloud DNS API.

use kube_gce_dns::applier::ChangeApplier;
use kube_gce_dns::auth::TokenSource;
use kube_gce_dns::diff::RecordPlanner;
use kube_gce_dns::dispatcher::Dispatcher;
use kube_gce_dns::errors::ZoneError;
use kube_gce_dns::provider::cloud_dns::CloudDnsClient;
use kube_gce_dns::provider::DnsProvider;
use kube_gce_dns::service::{ServiceEvent, ServiceObservation};
use kube_gce_dns::zone::bind_zone;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ZONES_PATH: &str = "/dns/v1/projects/my-project/managedZones";

fn provider(server: &MockServer) -> Arc<dyn DnsProvider> {
    Arc::new(
        CloudDnsClient::new(
            reqwest::Client::new(),
            &format!("{}/dns/v1", server.uri()),
            "my-project",
            TokenSource::fixed("test-token"),
        )
        .unwrap(),
    )
}

async fn mount_zones(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(ZONES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "managedZones": [
                {"name": "corp", "dnsName": "corp.example."},
                {"name": "public", "dnsName": "example.com."},
                {"name": "apps", "dnsName": "apps.example.com."}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_bind_zone_picks_most_specific_zone() {
    let server = MockServer::start().await;
    mount_zones(&server).await;

    let binding = bind_zone(provider(&server).as_ref(), "prod.apps.example.com")
        .await
        .unwrap();

    assert_eq!(binding.zone, "apps");
    assert_eq!(binding.dns_name, "apps.example.com.");
}

#[tokio::test]
async fn test_bind_zone_fails_without_matching_zone() {
    let server = MockServer::start().await;
    mount_zones(&server).await;

    let err = bind_zone(provider(&server).as_ref(), "example.org")
        .await
        .unwrap_err();

    assert!(matches!(err, ZoneError::NoMatchingZone { .. }));
}

#[tokio::test]
async fn test_new_service_is_submitted_and_polled() {
    let server = MockServer::start().await;
    mount_zones(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES_PATH}/public/changes")))
        .and(body_json(json!({
            "additions": [{
                "name": "web.prod.example.com.",
                "type": "A",
                "ttl": 300,
                "rrdatas": ["10.0.0.1"]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "17",
            "status": "pending"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ZONES_PATH}/public/changes/17")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "17",
            "status": "done"
        })))
        .expect(1..)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let binding = bind_zone(provider.as_ref(), "example.com").await.unwrap();
    let dispatcher = Dispatcher::new(
        RecordPlanner::new("example.com", 300),
        ChangeApplier::new(provider, binding, Duration::from_millis(5)),
        Duration::from_millis(50),
    );

    dispatcher.dispatch(&ServiceEvent::Added(ServiceObservation::new(
        "web",
        "prod",
        vec!["10.0.0.1".to_string()],
    )));
    dispatcher.wait_idle().await;

    server.verify().await;
}

#[tokio::test]
async fn test_drifted_record_is_corrected_through_api() {
    let server = MockServer::start().await;
    mount_zones(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{ZONES_PATH}/public/rrsets")))
        .and(query_param("name", "web.prod.example.com."))
        .and(query_param("type", "A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rrsets": [{
                "name": "web.prod.example.com.",
                "type": "A",
                "ttl": 300,
                "rrdatas": ["192.0.2.1"]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES_PATH}/public/changes")))
        .and(body_json(json!({
            "additions": [{
                "name": "web.prod.example.com.",
                "type": "A",
                "ttl": 300,
                "rrdatas": ["10.0.0.1"]
            }],
            "deletions": [{
                "name": "web.prod.example.com.",
                "type": "A",
                "ttl": 300,
                "rrdatas": ["192.0.2.1"]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "18",
            "status": "done"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let binding = bind_zone(provider.as_ref(), "example.com").await.unwrap();
    let dispatcher = Dispatcher::new(
        RecordPlanner::new("example.com", 300),
        ChangeApplier::new(provider, binding, Duration::from_millis(5)),
        Duration::from_millis(50),
    );
    let web = ServiceObservation::new("web", "prod", vec!["10.0.0.1".to_string()]);

    dispatcher.dispatch(&ServiceEvent::Updated {
        old: web.clone(),
        new: web,
    });
    dispatcher.wait_idle().await;

    server.verify().await;
}
