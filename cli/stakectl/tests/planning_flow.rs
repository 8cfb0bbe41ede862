//! Snapshot provider → session → plan file, against a mock provider.

use std::time::Duration;

use serde_json::json;
use stakectl::error::CliError;
use stakectl::export::{read_plan, write_plan, OperationKind, PlanDocument};
use stakectl::names::{apply_names, HttpNameResolver};
use stakectl::provider::{
    load_snapshot, HttpSnapshotProvider, SnapshotCache, SnapshotOrigin,
};
use stakectl::session::{Session, SessionOutcome};
use stakeplan_allocation::FeasibilityPolicy;
use stakeplan_id::{PoolAddress, ReserveAccount, StakeAccount, VoteAccount};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pool() -> PoolAddress {
    PoolAddress::from_bytes(&[11; 32])
}

fn vote(n: u8) -> VoteAccount {
    VoteAccount::from_bytes(&[n; 32])
}

fn snapshot_body() -> serde_json::Value {
    let validator = |n: u8, active: f64| {
        json!({
            "voteAccount": vote(n).to_string(),
            "stakeAccount": StakeAccount::from_bytes(&[n + 50; 32]).to_string(),
            "activeBalance": active,
            "transientStakeAccount": StakeAccount::from_bytes(&[n + 100; 32]).to_string(),
            "transientBalance": 0.0,
        })
    };
    json!({
        "reserveAccountId": ReserveAccount::from_bytes(&[200; 32]).to_string(),
        "reserveBalance": 0.0,
        "validators": [validator(1, 1000.0), validator(2, 500.0)],
    })
}

fn snapshot_path() -> String {
    format!("/pools/{}/snapshot", pool())
}

fn provider(server: &MockServer) -> HttpSnapshotProvider {
    HttpSnapshotProvider::new(&server.uri(), pool(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_plan_from_live_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(snapshot_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/names"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "voteAccount": vote(1).to_string(), "name": "Alpha" },
            { "voteAccount": vote(2).to_string(), "name": "Beta" },
            { "voteAccount": "garbage", "name": "Ignored" },
        ])))
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(cache_dir.path());
    let pool = pool();

    let provider = provider(&server);
    let loaded = load_snapshot(&provider, Some((&cache, &pool))).await.unwrap();
    assert_eq!(loaded.origin, SnapshotOrigin::Live);
    assert_eq!(loaded.snapshot.pool_address, Some(pool.clone()));
    assert!(loaded.snapshot.fetched_at.is_some());

    let mut allocation = loaded.snapshot.to_allocation().unwrap();
    let resolver =
        HttpNameResolver::new(&format!("{}/names", server.uri()), Duration::from_secs(5)).unwrap();
    assert_eq!(apply_names(&mut allocation, &resolver).await, 2);

    let mut out = Vec::new();
    let mut session = Session::new(allocation, FeasibilityPolicy::default(), &mut out)
        .with_pool(loaded.snapshot.pool_address.clone());
    let outcome = session.run("# drop Alpha\nr 1\nb\nv\ne\n".as_bytes()).unwrap();
    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("Alpha: marked for removal"), "{output}");

    let SessionOutcome::Exported(plan) = outcome else {
        panic!("session did not export:\n{output}");
    };
    assert_eq!(plan.pool, Some(pool.clone()));

    let out_dir = tempfile::tempdir().unwrap();
    let document = PlanDocument::new(*plan).unwrap();
    let written = write_plan(&document, out_dir.path()).unwrap();

    let reread = read_plan(&written).unwrap();
    reread.verify().unwrap();
    let kinds: Vec<_> = reread.operations.iter().map(|op| op.kind).collect();
    assert_eq!(kinds, vec![OperationKind::Remove, OperationKind::Increase]);
    assert_eq!(reread.operations[1].vote_account, vote(2));
    assert_eq!(reread.operations[1].lamports, 1_000_000_000_000);

    // the live fetch was cached for next time
    assert!(cache.load(&pool).is_some());
}

#[tokio::test]
async fn test_provider_outage_uses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(snapshot_path()))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(cache_dir.path());
    let pool = pool();
    let provider = provider(&server);

    let err = load_snapshot(&provider, Some((&cache, &pool)))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::SnapshotUnavailable { .. }), "{err}");

    let cached = serde_json::from_value(snapshot_body()).unwrap();
    cache.store(&pool, &cached).unwrap();

    let loaded = load_snapshot(&provider, Some((&cache, &pool))).await.unwrap();
    assert_eq!(loaded.origin, SnapshotOrigin::Cached);
    assert_eq!(loaded.snapshot.validators.len(), 2);
}

#[tokio::test]
async fn test_name_service_outage_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/names"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let snapshot: stakeplan_allocation::Snapshot =
        serde_json::from_value(snapshot_body()).unwrap();
    let mut allocation = snapshot.to_allocation().unwrap();
    let resolver =
        HttpNameResolver::new(&format!("{}/names", server.uri()), Duration::from_secs(5)).unwrap();

    assert_eq!(apply_names(&mut allocation, &resolver).await, 0);
    assert!(allocation.records().iter().all(|r| r.display_name().is_none()));
}

#[tokio::test]
async fn test_infeasible_session_never_exports() {
    let snapshot: stakeplan_allocation::Snapshot =
        serde_json::from_value(snapshot_body()).unwrap();
    let allocation = snapshot.to_allocation().unwrap();

    let mut out = Vec::new();
    let mut session = Session::new(allocation, FeasibilityPolicy::default(), &mut out);
    let outcome = session.run("+ 1 10\ne\nq\n".as_bytes()).unwrap();

    assert_eq!(outcome, SessionOutcome::Quit);
    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("nothing exported"));
}
