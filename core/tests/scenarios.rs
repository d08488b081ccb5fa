//! End-to-end scenarios against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and drives it through
//! the production wiring (`Harness::new`, ureq transport, attachment and log
//! directories in a temp dir). Entities created by a test are registered for
//! teardown deletion so a failed assertion does not leak state.

use std::path::Path;

use agency_core::{
    AbilityPatch, ApiError, Case, CasePatch, DetectivePatch, EntityGenerator, Harness,
    HttpMethod, Observation, TestConfig, Validate,
};
use rust_decimal::Decimal;

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/")
}

fn harness(base_url: &str, dir: &Path) -> Harness {
    let config = TestConfig::from_value(&serde_json::json!({
        "BaseUrl": base_url,
        "TestSettings": { "TimeoutSeconds": 5 },
        "Paths": {
            "Logs": dir.join("logs").to_str().unwrap(),
            "Attachments": dir.join("results").to_str().unwrap(),
            "Report": dir.join("report").to_str().unwrap(),
        }
    }))
    .unwrap();
    Harness::new(config)
}

#[test]
fn ability_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let case = harness.start("ability_lifecycle");
    let abilities = case.abilities();

    let fixture = agency_core::Ability {
        kind: "support".to_string(),
        danger_level: 5,
        ..EntityGenerator::seeded(1).ability()
    };
    let created = case
        .sink()
        .try_step("Create ability", || abilities.create(&fixture))
        .unwrap();
    assert!(created.validate().is_valid(), "{}", created.validate());

    let fetched = abilities.get(&created.id).unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.danger_level, 5);
    assert_eq!(fetched.kind, "support");

    let patch = AbilityPatch {
        danger_level: Some(8),
        ..AbilityPatch::default()
    };
    abilities.update(&created.id, &patch).unwrap();

    let fetched = abilities.get(&created.id).unwrap();
    assert_eq!(fetched.danger_level, 8);
    assert_eq!(fetched.kind, "support", "type is untouched by the patch");
    assert_eq!(fetched.name, fixture.name);
    assert_eq!(fetched.range, fixture.range);

    assert!(abilities.delete(&created.id).unwrap());
    let err = abilities.get(&created.id).unwrap_err();
    assert!(matches!(err, ApiError::Api { status: 404, .. }), "{err}");
    assert!(!abilities.delete(&created.id).unwrap(), "second delete is refused");

    let path = case.finish("PASSED").unwrap();
    let log = std::fs::read_to_string(path).unwrap();
    assert!(log.contains("Test PASSED: ability_lifecycle"));
    assert!(log.contains("STEP: Create ability"));
    assert!(log.contains(&format!("Deleted ability {}", created.id)));
}

#[test]
fn unknown_ability_id_is_an_api_failure() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let case = harness.start("unknown_ability_id");

    let err = case.abilities().get("invalid-ability-id-999").unwrap_err();
    match err {
        ApiError::Api {
            method,
            status,
            ref endpoint,
            ref body,
        } => {
            assert_eq!(method, HttpMethod::Get);
            assert_eq!(status, 404);
            assert!(endpoint.ends_with("/api/abilities/invalid-ability-id-999"));
            assert!(body.contains("not found"));
        }
        other => panic!("expected an API failure, got {other}"),
    }
}

#[test]
fn case_reward_is_kept_or_absent() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let mut case = harness.start("case_reward");
    let cases = case.cases();
    let mut generator = EntityGenerator::seeded(2);

    let rewarded = Case {
        reward: Some(Decimal::from(50_000i64)),
        ..generator.case()
    };
    let created = cases.create(&rewarded).unwrap();
    case.delete_on_teardown(&cases, &created.id);
    assert_eq!(created.reward, Some(Decimal::from(50_000i64)));

    let unrewarded = Case {
        reward: None,
        ..generator.case()
    };
    let created = cases.create(&unrewarded).unwrap();
    case.delete_on_teardown(&cases, &created.id);
    assert_eq!(created.reward, None);
    assert!(created.validate().is_valid(), "{}", created.validate());
}

#[test]
fn created_case_reads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let mut case = harness.start("create_get_consistency");
    let cases = case.cases();

    let created = cases.create(&EntityGenerator::new().case()).unwrap();
    case.delete_on_teardown(&cases, &created.id);
    let fetched = cases.get(&created.id).unwrap();
    case.check(fetched == created, "fetched case equals created case");
}

#[test]
fn partial_update_leaves_other_fields_alone() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let mut case = harness.start("partial_update");
    let cases = case.cases();

    let created = cases.create(&EntityGenerator::seeded(3).case()).unwrap();
    case.delete_on_teardown(&cases, &created.id);

    let patch = CasePatch {
        status: Some("closed".to_string()),
        ..CasePatch::default()
    };
    let updated = cases.update(&created.id, &patch).unwrap();
    assert_eq!(updated.status, "closed");
    assert_eq!(updated.title, created.title);
    assert_eq!(updated.priority, created.priority);
    assert_eq!(updated.location, created.location);
    assert_eq!(updated.reward, created.reward);
    assert_eq!(updated.created_at, created.created_at);
}

#[test]
fn detective_crud() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let mut case = harness.start("detective_crud");
    let detectives = case.detectives();

    let created = detectives.create(&EntityGenerator::seeded(4).detective()).unwrap();
    case.delete_on_teardown(&detectives, &created.id);
    assert!(created.validate().is_valid(), "{}", created.validate());

    let listed = detectives.list().unwrap();
    assert!(listed.iter().any(|d| d.id == created.id));

    let patch = DetectivePatch {
        age: Some(41),
        ..DetectivePatch::default()
    };
    let updated = detectives.update(&created.id, &patch).unwrap();
    assert_eq!(updated.age, 41);
    assert_eq!(updated.name, created.name);
}

#[test]
fn every_collection_lists_valid_entities() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let case = harness.start("list_collections");

    let detectives = case.detectives().list().unwrap();
    let cases = case.cases().list().unwrap();
    let abilities = case.abilities().list().unwrap();
    assert!(!detectives.is_empty() && !cases.is_empty() && !abilities.is_empty());
    for ability in &abilities {
        assert!(ability.validate().is_valid(), "{}", ability.validate());
    }
}

#[test]
fn admin_login_and_bogus_login() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let case = harness.start("auth");
    let auth = case.auth();

    let session = auth
        .login(&EntityGenerator::admin_credentials(harness.config()))
        .unwrap();
    assert!(session.validate().is_valid(), "{}", session.validate());
    assert_eq!(session.user.username, "admin");

    let bogus = EntityGenerator::new().bogus_credentials();
    assert!(!auth.login_succeeds(&bogus));
    let err = auth.login(&bogus).unwrap_err();
    assert!(matches!(err, ApiError::Api { status: 401, .. }), "{err}");
}

#[test]
fn observations_follow_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&start_server(), dir.path());
    let case = harness.start("observations");

    let _ = case.abilities().get("missing");
    let observations = case.sink().observations();
    assert_eq!(observations.len(), 2);
    assert!(matches!(observations[0], Observation::Request { method: HttpMethod::Get, .. }));
    assert!(matches!(observations[1], Observation::Response { status: 404, .. }));

    drop(case);
    let attachments = std::fs::read_dir(dir.path().join("results")).unwrap().count();
    assert!(attachments >= 2, "response body and status code are attached");
}

#[test]
fn failed_test_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = start_server();
    let harness = harness(&base_url, dir.path());
    let mut created_id = String::new();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut case = harness.start("failing_scenario");
        let abilities = case.abilities();
        let created = abilities.create(&EntityGenerator::new().ability()).unwrap();
        created_id = created.id.clone();
        case.delete_on_teardown(&abilities, &created.id);
        case.check(created.danger_level > 10, "danger level above the scale");
    }));
    assert!(outcome.is_err());

    let check = harness.start("verify_cleanup");
    let err = check.abilities().get(&created_id).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    drop(check);

    let logs: Vec<String> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
        .collect();
    assert!(logs.iter().any(|log| log.contains("Test FAILED: failing_scenario")));
}

#[test]
fn closed_port_is_a_transport_failure() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness("http://127.0.0.1:9", dir.path());
    let case = harness.start("closed_port");

    let err = case.cases().list().unwrap_err();
    assert!(matches!(err, ApiError::Transport { method: HttpMethod::Get, .. }), "{err}");
    assert!(matches!(
        case.sink().observations().last(),
        Some(Observation::Failure { .. })
    ));
}

#[test]
fn empty_id_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness("http://127.0.0.1:9", dir.path());
    let case = harness.start("empty_id");

    assert!(matches!(case.detectives().get(""), Err(ApiError::InvalidArgument(_))));
    assert!(case.sink().observations().is_empty());
}
