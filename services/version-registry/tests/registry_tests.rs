//! Publish/resolve scenarios across two regional stacks.

use std::sync::Arc;

use async_trait::async_trait;
use edge_common::CollaboratorError;
use version_registry::{
    DeploymentGraph, EdgeBinding, EdgeEventType, FunctionArn, InMemoryParameterStore, Parameter, ParameterStore,
    RegistryConfig, RegistryError, VersionRegistry,
};

const CHECK_AUTH_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:checkAuth-edge-prod";
const PARSE_OR_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:parseIdTokenToCredential-OR-edge-prod";
const PARSE_VR_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:parseIdTokenToCredential-VR-edge-prod";

fn config() -> RegistryConfig {
    RegistryConfig::new("edge-auth", "prod", "LambdaEdgeStack").unwrap()
}

fn bindings() -> Vec<EdgeBinding> {
    vec![
        EdgeBinding::new(EdgeEventType::ViewerRequest, "checkAuth"),
        EdgeBinding::new(EdgeEventType::OriginRequest, "parseIdTokenToCredential-OR"),
        EdgeBinding::new(EdgeEventType::ViewerResponse, "parseIdTokenToCredential-VR"),
    ]
}

/// Counts reads and fails on a chosen key.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryParameterStore,
    reads: parking_lot::Mutex<Vec<String>>,
    unavailable: Option<String>,
}

#[async_trait]
impl ParameterStore for RecordingStore {
    async fn get(&self, name: &str) -> Result<Option<Parameter>, CollaboratorError> {
        self.reads.lock().push(name.to_string());
        if self.unavailable.as_deref() == Some(name) {
            return Err(CollaboratorError::from_status("parameter-store", 503, ""));
        }
        self.inner.get(name).await
    }

    async fn put(&self, name: &str, value: &str) -> Result<u64, CollaboratorError> {
        self.inner.put(name, value).await
    }

    async fn put_if_version(&self, name: &str, value: &str, expected: u64) -> Result<Option<u64>, CollaboratorError> {
        self.inner.put_if_version(name, value, expected).await
    }
}

/// Hands control back to the runtime after every read, so two publishers
/// interleave between their read and their write.
#[derive(Default)]
struct YieldingStore {
    inner: InMemoryParameterStore,
}

#[async_trait]
impl ParameterStore for YieldingStore {
    async fn get(&self, name: &str) -> Result<Option<Parameter>, CollaboratorError> {
        let value = self.inner.get(name).await;
        tokio::task::yield_now().await;
        value
    }

    async fn put(&self, name: &str, value: &str) -> Result<u64, CollaboratorError> {
        self.inner.put(name, value).await
    }

    async fn put_if_version(&self, name: &str, value: &str, expected: u64) -> Result<Option<u64>, CollaboratorError> {
        self.inner.put_if_version(name, value, expected).await
    }
}

#[tokio::test]
async fn test_resolve_after_publish_in_other_region() {
    let store = Arc::new(InMemoryParameterStore::new());
    let publisher = VersionRegistry::new(store.clone(), config());
    let consumer = VersionRegistry::new(store.clone(), config());

    for (name, arn) in [
        ("checkAuth", CHECK_AUTH_ARN),
        ("parseIdTokenToCredential-OR", PARSE_OR_ARN),
        ("parseIdTokenToCredential-VR", PARSE_VR_ARN),
    ] {
        let arn: FunctionArn = arn.parse().unwrap();
        publisher.publish_version(name, &arn, 3).await.unwrap();
    }

    let resolved = consumer.resolve_bindings(&bindings()).await.unwrap();
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[1].event, EdgeEventType::OriginRequest);
    assert_eq!(resolved[1].record.version_arn(), format!("{PARSE_OR_ARN}:3"));
    assert_eq!(resolved[2].record.function_arn().region(), "us-east-1");
}

#[tokio::test]
async fn test_concurrent_publishes_do_not_share_an_ordinal() {
    let store = Arc::new(YieldingStore::default());
    let first = VersionRegistry::new(store.clone(), config());
    let second = VersionRegistry::new(store.clone(), config());
    let arn: FunctionArn = CHECK_AUTH_ARN.parse().unwrap();

    let (a, b) = tokio::join!(first.publish("checkAuth", &arn), second.publish("checkAuth", &arn));

    let (won, lost) = match (a, b) {
        (Ok(ordinal), Err(err)) | (Err(err), Ok(ordinal)) => (ordinal, err),
        other => panic!("expected exactly one publish to win, got {other:?}"),
    };
    assert_eq!(won, 1);
    assert!(matches!(lost, RegistryError::PublishConflict { expected: 0, .. }));
    assert_eq!(store.inner.version("/edge-auth/prod/LambdaEdgeStack/checkAuth"), Some(1));
    assert_eq!(first.read("checkAuth").await.unwrap().version_arn(), format!("{CHECK_AUTH_ARN}:1"));

    assert_eq!(second.publish("checkAuth", &arn).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_version_publishes_keep_one_writer() {
    let store = Arc::new(YieldingStore::default());
    let registry = VersionRegistry::new(store.clone(), config());
    let arn: FunctionArn = CHECK_AUTH_ARN.parse().unwrap();

    let (a, b) = tokio::join!(
        registry.publish_version("checkAuth", &arn, 4),
        registry.publish_version("checkAuth", &arn, 9),
    );

    let winner = match (a, b) {
        (Ok(record), Err(RegistryError::PublishConflict { .. }))
        | (Err(RegistryError::PublishConflict { .. }), Ok(record)) => record,
        other => panic!("expected exactly one publish to win, got {other:?}"),
    };
    assert_eq!(registry.read("checkAuth").await.unwrap(), winner);
}

#[tokio::test]
async fn test_read_before_publish_aborts_resolution() {
    let store = Arc::new(RecordingStore::default());
    let registry = VersionRegistry::new(store.clone(), config());
    let arn: FunctionArn = CHECK_AUTH_ARN.parse().unwrap();
    registry.publish("checkAuth", &arn).await.unwrap();

    match registry.resolve_bindings(&bindings()).await {
        Err(RegistryError::VersionNotPublished { key }) => {
            assert_eq!(key, "/edge-auth/prod/LambdaEdgeStack/parseIdTokenToCredential-OR");
        }
        other => panic!("expected VersionNotPublished, got {other:?}"),
    }

    // The viewer-response binding was never looked up.
    let reads = store.reads.lock();
    assert!(!reads.iter().any(|k| k.ends_with("parseIdTokenToCredential-VR")));
}

#[tokio::test]
async fn test_every_read_goes_to_the_store() {
    let store = Arc::new(RecordingStore::default());
    let registry = VersionRegistry::new(store.clone(), config());
    let arn: FunctionArn = CHECK_AUTH_ARN.parse().unwrap();

    registry.publish("checkAuth", &arn).await.unwrap();
    assert_eq!(registry.read("checkAuth").await.unwrap().ordinal(), 1);
    registry.publish("checkAuth", &arn).await.unwrap();
    assert_eq!(registry.read("checkAuth").await.unwrap().ordinal(), 2);
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let store = Arc::new(RecordingStore {
        unavailable: Some("/edge-auth/prod/LambdaEdgeStack/checkAuth".to_string()),
        ..RecordingStore::default()
    });
    let registry = VersionRegistry::new(store, config());

    let err = registry.read("checkAuth").await.unwrap_err();
    assert!(matches!(err, RegistryError::Store(CollaboratorError::Unavailable { .. })));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_environments_do_not_share_pointers() {
    let store = Arc::new(InMemoryParameterStore::new());
    let prod = VersionRegistry::new(store.clone(), config());
    let dev = VersionRegistry::new(store.clone(), RegistryConfig::new("edge-auth", "dev", "LambdaEdgeStack").unwrap());
    let arn: FunctionArn = CHECK_AUTH_ARN.parse().unwrap();

    prod.publish("checkAuth", &arn).await.unwrap();
    assert!(matches!(
        dev.read("checkAuth").await,
        Err(RegistryError::VersionNotPublished { .. })
    ));
}

#[test]
fn test_two_region_plan() {
    let mut graph = DeploymentGraph::new();
    graph.add_stage("edge-functions", "us-east-1").unwrap();
    graph.add_stage("api-and-distribution", "ap-northeast-1").unwrap();
    graph.require_before("edge-functions", "api-and-distribution").unwrap();

    let plan = graph.plan().unwrap();
    assert_eq!(plan[0].region, "us-east-1");
    assert_eq!(plan[1].name, "api-and-distribution");

    graph.require_before("api-and-distribution", "edge-functions").unwrap();
    let err = graph.plan().unwrap_err();
    assert_eq!(err.code(), "DEPLOYMENT_CYCLE");
}
