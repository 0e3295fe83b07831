// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle tests for StackableAdapter against the mock provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, addr_of, short_timeout};
use serde_json::{Value, json};
use stackable_itc::ItcError;
use stackable_runtime::config::TlsConfig;
use stackable_runtime::listener::CaptureError;
use stackable_runtime::meta::GET_SERVICE_META;
use stackable_runtime::provider::{MockProvider, ServerLogLevel};
use stackable_runtime::{AdapterOptions, Error, LifecycleState, ServiceConfig, Stackable};
use tokio::net::{TcpListener, TcpStream};

// ============================================================================
// Start Tests
// ============================================================================

#[tokio::test]
async fn test_start_returns_dialable_url() {
    let harness = Harness::new(MockProvider::new());
    let url = harness.running().await;

    assert!(url.starts_with("http://127.0.0.1:"));
    let addr = addr_of(&url);
    assert_ne!(addr.port(), 0);
    assert!(TcpStream::connect(addr).await.is_ok());

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let harness = Harness::new(MockProvider::new());
    let first = harness.running().await;
    let second = harness.adapter.start().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.provider.launch_count(), 1);

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_starts_share_one_launch() {
    let harness = Harness::new(MockProvider::new().with_launch_delay(Duration::from_millis(50)));
    harness.adapter.init().await.unwrap();

    let starts = (0..8).map(|_| harness.adapter.start());
    let urls: Vec<String> = futures::future::join_all(starts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert!(urls.iter().all(|u| u == &urls[0]));
    assert_eq!(harness.provider.launch_count(), 1);
    assert_eq!(harness.provider.open_servers(), 1);

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_starts_across_tasks() {
    let harness = Arc::new(Harness::new(
        MockProvider::new().with_launch_delay(Duration::from_millis(50)),
    ));
    harness.adapter.init().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let harness = harness.clone();
        tasks.push(tokio::spawn(async move { harness.adapter.start().await.unwrap() }));
    }

    let mut urls = Vec::new();
    for task in tasks {
        urls.push(task.await.unwrap());
    }

    assert!(urls.iter().all(|u| u == &urls[0]));
    assert_eq!(harness.provider.launch_count(), 1);

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_https_selects_secure_scheme() {
    let service = ServiceConfig::new("web", ".").with_https(TlsConfig {
        cert: "cert.pem".into(),
        key: "key.pem".into(),
    });
    let harness = Harness::with_service(MockProvider::new(), service);
    let url = harness.running().await;

    assert!(url.starts_with("https://127.0.0.1:"));
    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_fixed_port_is_honored() {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let harness = Harness::with_service(
        MockProvider::new(),
        ServiceConfig::new("web", ".").with_port(port),
    );
    let url = harness.running().await;

    assert_eq!(url, format!("http://127.0.0.1:{}", port));
    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_launch_receives_merged_options() {
    let service = ServiceConfig::new("web", ".")
        .with_hostname("localhost")
        .with_base("docs//v2/");
    let harness = Harness::with_service(MockProvider::new(), service);
    harness.running().await;

    let options = harness.provider.last_launch_options().await.unwrap();
    assert_eq!(options.base.as_deref(), Some("/docs/v2"));
    assert_eq!(options.server.host, "localhost");
    assert_eq!(options.server.port, 0);
    assert!(!options.server.strict_port);
    assert!(options.server.hmr);
    assert_eq!(options.server.origin, "http://localhost");

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_launch_receives_log_level() {
    let harness = Harness::with_options(
        MockProvider::new(),
        ServiceConfig::new("web", "."),
        AdapterOptions::default().with_log_level(ServerLogLevel::Error),
    );
    harness.running().await;

    let options = harness.provider.last_launch_options().await.unwrap();
    assert_eq!(options.log_level, ServerLogLevel::Error);
    assert!(!options.clear_screen);

    harness.adapter.stop().await.unwrap();
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_launch_failure_is_terminal() {
    let harness = Harness::new(MockProvider::failing());
    harness.adapter.init().await.unwrap();

    let err = harness.adapter.start().await.unwrap_err();
    assert_eq!(err.error_code(), "PROVIDER_ERROR");
    assert_eq!(harness.adapter.state().await, LifecycleState::Failed);
    assert!(!harness.adapter.service().id.is_empty());

    assert!(matches!(
        harness.adapter.start().await,
        Err(Error::InstanceFailed)
    ));
    assert_eq!(harness.provider.launch_count(), 1);
}

#[tokio::test]
async fn test_unsupported_version_blocks_start() {
    let harness = Harness::new(MockProvider::new().with_version("4.9.0"));

    match harness.adapter.init().await.unwrap_err() {
        Error::UnsupportedVersion {
            name,
            found,
            required,
        } => {
            assert_eq!(name, "vite");
            assert_eq!(found, "4.9.0");
            assert_eq!(required, "^5.0.0");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(matches!(
        harness.adapter.start().await,
        Err(Error::InstanceFailed)
    ));
    assert_eq!(harness.provider.launch_count(), 0);

    let err = harness
        .hub
        .request("web", GET_SERVICE_META, Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "HANDLER_NOT_FOUND");
}

#[tokio::test]
async fn test_cancelled_start_marks_instance_failed() {
    let harness = Harness::new(MockProvider::new().with_launch_delay(Duration::from_millis(300)));
    harness.adapter.init().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(50), harness.adapter.start()).await;
    assert!(outcome.is_err());

    assert_eq!(harness.adapter.state().await, LifecycleState::Failed);
    assert!(matches!(
        harness.adapter.start().await,
        Err(Error::InstanceFailed)
    ));
    assert!(matches!(
        harness.adapter.stop().await,
        Err(Error::InstanceFailed)
    ));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(harness.adapter.state().await, LifecycleState::Failed);
    assert_eq!(harness.provider.launch_count(), 1);
    assert_eq!(harness.provider.open_servers(), 0);
}

#[tokio::test]
async fn test_init_on_closed_hub_is_terminal() {
    let Harness { hub, adapter, .. } = Harness::new(MockProvider::new());
    drop(hub);

    let err = adapter.init().await.unwrap_err();
    assert!(matches!(err, Error::Itc(ItcError::HubClosed)));
    assert_eq!(adapter.state().await, LifecycleState::Failed);

    assert!(matches!(
        adapter.init().await,
        Err(Error::InvalidState {
            operation: "init",
            state: LifecycleState::Failed
        })
    ));
    assert!(matches!(adapter.start().await, Err(Error::InstanceFailed)));
}

#[tokio::test]
async fn test_bind_timeout_closes_server() {
    let harness = Harness::with_options(
        MockProvider::never_binding(),
        ServiceConfig::new("web", "."),
        short_timeout(),
    );
    harness.adapter.init().await.unwrap();

    let err = harness.adapter.start().await.unwrap_err();
    assert!(matches!(err, Error::BindTimeout(d) if d == Duration::from_millis(150)));
    assert_eq!(harness.adapter.state().await, LifecycleState::Failed);
    assert_eq!(harness.provider.open_servers(), 0);
}

#[tokio::test]
async fn test_abandoned_capture() {
    let mut provider = MockProvider::new();
    provider.abandon = true;
    let harness = Harness::new(provider);
    harness.adapter.init().await.unwrap();

    let err = harness.adapter.start().await.unwrap_err();
    assert!(matches!(err, Error::Capture(CaptureError::Abandoned)));
    assert_eq!(harness.provider.open_servers(), 0);
}

#[tokio::test]
async fn test_missing_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = ServiceConfig::new("web", dir.path()).with_config_file("vite.config.js");
    let harness = Harness::with_service(MockProvider::new(), service);
    harness.adapter.init().await.unwrap();

    let err = harness.adapter.start().await.unwrap_err();
    match err {
        Error::ConfigFileNotFound(path) => assert_eq!(path, dir.path().join("vite.config.js")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.provider.launch_count(), 0);
    assert_eq!(harness.adapter.state().await, LifecycleState::Failed);
}

#[tokio::test]
async fn test_port_in_use_falls_back_to_free_port() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let harness = Harness::with_service(
        MockProvider::new(),
        ServiceConfig::new("web", ".").with_port(port),
    );
    harness.adapter.init().await.unwrap();

    let url = harness.adapter.start().await.unwrap();
    assert_ne!(addr_of(&url).port(), port);
    assert!(TcpStream::connect(addr_of(&url)).await.is_ok());

    harness.adapter.stop().await.unwrap();
}

// ============================================================================
// Stop Tests
// ============================================================================

#[tokio::test]
async fn test_stop_releases_port() {
    let harness = Harness::new(MockProvider::new());
    let url = harness.running().await;
    let addr = addr_of(&url);

    harness.adapter.stop().await.unwrap();

    assert_eq!(harness.provider.open_servers(), 0);
    assert!(TcpListener::bind(addr).await.is_ok());
    assert_eq!(harness.adapter.url().await, None);
}

#[tokio::test]
async fn test_restart_after_stop_launches_fresh_server() {
    let harness = Harness::new(MockProvider::new());
    harness.running().await;
    harness.adapter.stop().await.unwrap();

    let url = harness.adapter.start().await.unwrap();

    assert_eq!(harness.provider.launch_count(), 2);
    assert_eq!(harness.adapter.state().await, LifecycleState::Running);
    assert!(TcpStream::connect(addr_of(&url)).await.is_ok());

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_on_same_fixed_port() {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let harness = Harness::with_service(
        MockProvider::new(),
        ServiceConfig::new("web", ".").with_port(port),
    );
    let first = harness.running().await;
    harness.adapter.stop().await.unwrap();

    let second = harness.adapter.start().await.unwrap();

    assert_eq!(first, format!("http://127.0.0.1:{}", port));
    assert_eq!(second, first);
    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_twice() {
    let harness = Harness::new(MockProvider::new());
    harness.running().await;

    harness.adapter.stop().await.unwrap();
    assert!(matches!(harness.adapter.stop().await, Err(Error::NotStarted)));
}

#[tokio::test]
async fn test_stop_during_start_is_rejected() {
    let harness = Arc::new(Harness::new(
        MockProvider::new().with_launch_delay(Duration::from_millis(300)),
    ));
    harness.adapter.init().await.unwrap();

    let starter = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.adapter.start().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        harness.adapter.stop().await,
        Err(Error::StartInFlight)
    ));

    starter.await.unwrap().unwrap();
    harness.adapter.stop().await.unwrap();
}

// ============================================================================
// Meta Tests
// ============================================================================

#[tokio::test]
async fn test_meta_absent_until_running() {
    let harness = Harness::new(MockProvider::new());
    assert_eq!(harness.adapter.meta().await, None);

    harness.adapter.init().await.unwrap();
    assert_eq!(harness.adapter.meta().await, None);

    let err = harness
        .hub
        .request("web", GET_SERVICE_META, Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_READY");
}

#[tokio::test]
async fn test_meta_over_channel() {
    let service = ServiceConfig::new("web", ".").with_base("foo//bar/");
    let harness = Harness::with_service(MockProvider::new(), service);
    let url = harness.running().await;

    let meta = harness
        .hub
        .request("web", GET_SERVICE_META, Value::Null)
        .await
        .unwrap();

    assert_eq!(
        meta,
        json!({
            "composer": {
                "tcp": true,
                "url": url,
                "prefix": "foo/bar",
                "wantsAbsoluteUrls": true
            }
        })
    );

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_meta_without_base_has_empty_prefix() {
    let harness = Harness::new(MockProvider::new());
    harness.running().await;

    let meta = harness.adapter.meta().await.unwrap();
    assert_eq!(meta.composer.prefix, "");

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_meta_prefix_follows_live_server_base() {
    let mut provider = MockProvider::new();
    provider.base_path = Some("/mounted/elsewhere/".to_string());
    let harness = Harness::with_service(provider, ServiceConfig::new("web", ".").with_base("/app"));
    harness.running().await;

    let meta = harness.adapter.meta().await.unwrap();
    assert_eq!(meta.composer.prefix, "mounted/elsewhere");

    harness.adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_meta_cleared_after_stop() {
    let harness = Harness::new(MockProvider::new());
    harness.running().await;
    harness.adapter.stop().await.unwrap();

    assert_eq!(harness.adapter.meta().await, None);
    let err = harness
        .hub
        .request("web", GET_SERVICE_META, Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_READY");
}

#[tokio::test]
async fn test_adapters_on_one_hub_do_not_collide() {
    let hub = stackable_itc::ItcHub::new();
    let mut adapters = Vec::new();
    for (id, base) in [("web", "/web"), ("docs", "/docs")] {
        let adapter = stackable_runtime::StackableAdapter::new(
            ServiceConfig::new(id, ".").with_base(base),
            Arc::new(MockProvider::new()),
            hub.channel(id).unwrap(),
        )
        .unwrap();
        adapter.init().await.unwrap();
        adapter.start().await.unwrap();
        adapters.push(adapter);
    }

    let web = hub.request("web", GET_SERVICE_META, Value::Null).await.unwrap();
    let docs = hub.request("docs", GET_SERVICE_META, Value::Null).await.unwrap();

    assert_eq!(web["composer"]["prefix"], "web");
    assert_eq!(docs["composer"]["prefix"], "docs");
    assert_ne!(web["composer"]["url"], docs["composer"]["url"]);

    for adapter in &adapters {
        adapter.stop().await.unwrap();
    }
}

// ============================================================================
// Trait Object Tests
// ============================================================================

#[tokio::test]
async fn test_adapter_as_trait_object() {
    let harness = Harness::new(MockProvider::new());
    let service: &dyn Stackable = &harness.adapter;

    assert_eq!(service.kind(), "vite");
    assert_eq!(service.service_id(), "web");
    assert!(!service.watch_config().enabled);

    service.init().await.unwrap();
    let url = service.start().await.unwrap();
    assert_eq!(service.meta().await.unwrap().composer.url, url);
    service.stop().await.unwrap();
}
