//! End-to-end provisioning runs against a mock platform.

use std::collections::BTreeMap;

use preview_deployer::config::{Config, OrganizationSelector};
use preview_deployer::deploy::{self, DeployRequest, DeploySecrets};
use preview_deployer::errors::DeployError;
use preview_deployer::run;
use fly_api::{ClientOptions, FlyClient};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> FlyClient {
    FlyClient::new(ClientOptions {
        token: SecretString::from("test-token".to_string()),
        graphql_endpoint: server.uri(),
        machines_endpoint: server.uri(),
    })
    .unwrap()
}

fn test_config(server: &MockServer, branch: &str) -> Config {
    Config {
        api_token: SecretString::from("test-token".to_string()),
        graphql_endpoint: server.uri(),
        machines_endpoint: server.uri(),
        organization: OrganizationSelector::Id("org_123".to_string()),
        region: "sin".to_string(),
        size: "shared-cpu-4x".to_string(),
        image: "sweatybridge/postgres:dev".to_string(),
        volume_size_gb: 1,
        db_only: false,
        fork_from: None,
        supabase_api_url: "https://api.supabase.com".to_string(),
        postgres_password: "postgres".to_string(),
        jwt_secret: "super-secret-jwt-token-with-at-least-32-characters-long".to_string(),
        anon_key: None,
        service_role_key: None,
        deploy_url: None,
        repository: None,
        branch: Some(branch.to_string()),
        output_file: None,
    }
}

fn test_request(name: &str, organization: OrganizationSelector) -> DeployRequest {
    DeployRequest {
        name: name.to_string(),
        region: "sin".to_string(),
        size: "shared-cpu-4x".to_string(),
        image: "sweatybridge/postgres:dev".to_string(),
        volume_size_gb: 1,
        db_only: false,
        fork_from: None,
        organization,
        supabase_api_url: "https://api.supabase.com".to_string(),
        secrets: DeploySecrets {
            postgres_password: "postgres".to_string(),
            jwt_secret: "jwt-secret".to_string(),
            admin_api_key: "admin".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: "service".to_string(),
            extra: BTreeMap::new(),
        },
        env: BTreeMap::from([("PROJECT_REF".to_string(), name.to_string())]),
    }
}

fn machine_body(app: &str, volume: &str) -> serde_json::Value {
    json!({
        "id": "9080e966ae7487",
        "name": app,
        "state": "created",
        "region": "sin",
        "instance_id": "01GSYXD50E7F114CX7SRCT2H41",
        "private_ip": "fdaa:1:698b:a7b:a8:33bd:e6da:2",
        "config": {
            "env": {"PGDATA": "/mnt/postgresql/data"},
            "image": "sweatybridge/postgres:dev",
            "mounts": [{"path": "/mnt/postgresql", "volume": volume, "size_gb": 1}],
            "services": [],
            "size": "shared-cpu-4x"
        },
        "image_ref": {
            "registry": "registry-1.docker.io",
            "repository": "sweatybridge/postgres",
            "tag": "dev",
            "digest": "sha256:0000000000000000000000000000000000000000000000000000000000000000"
        },
        "created_at": "2023-02-23T10:34:20Z"
    })
}

fn volume_payload(mutation: &str, app: &str, id: &str) -> serde_json::Value {
    json!({
        "data": {
            mutation: {
                "app": {"name": app},
                "volume": {
                    "id": id,
                    "name": format!("{}_pgdata", app.replace('-', "_")),
                    "app": {"name": app},
                    "region": "sin",
                    "sizeGb": 1,
                    "encrypted": true,
                    "createdAt": "2023-02-23T10:34:20Z",
                    "host": {"id": "host_1"}
                }
            }
        }
    })
}

async fn mount_provisioning_mocks(server: &MockServer, app: &str) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("organization(slug:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "organization": {
                    "id": "org_123",
                    "slug": "personal",
                    "name": "Personal",
                    "type": "PERSONAL",
                    "viewerRole": "admin"
                }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("createApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "createApp": {
                    "app": {
                        "id": app,
                        "name": app,
                        "organization": {"slug": "personal"},
                        "regions": []
                    }
                }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("createVolume"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(volume_payload("createVolume", app, "vol_1")),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("allocateIpAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "allocateIpAddress": {
                    "ipAddress": {
                        "id": "ip_1",
                        "address": "66.241.124.21",
                        "type": "v4",
                        "region": "global",
                        "createdAt": "2023-02-23T10:34:20Z"
                    }
                }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("setSecrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"setSecrets": {"release": null}}
        })))
        .mount(server)
        .await;
}

fn graphql_bodies(requests: &[wiremock::Request]) -> Vec<serde_json::Value> {
    requests
        .iter()
        .filter(|r| r.url.path() == "/graphql")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn fresh_deployment_provisions_everything_and_returns_the_set() {
    let server = MockServer::start().await;
    mount_provisioning_mocks(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/v1/apps/abc/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_body("abc", "vol_1")))
        .expect(1)
        .mount(&server)
        .await;

    let fly = client(&server);
    let request = test_request("abc", OrganizationSelector::Slug("personal".to_string()));
    let deployed = deploy::deploy_database(&fly, &request).await.unwrap();

    assert_eq!(deployed.machine.id, "9080e966ae7487");
    assert_eq!(deployed.volume.id, "vol_1");
    let ip = deployed.ip.unwrap();
    assert_eq!(ip.address, "66.241.124.21");

    let requests = server.received_requests().await.unwrap();

    // Both address families were requested.
    let gql = graphql_bodies(&requests);
    let ip_types: Vec<&str> = gql
        .iter()
        .filter(|b| b["query"].as_str().unwrap().contains("allocateIpAddress"))
        .map(|b| b["variables"]["input"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(ip_types.len(), 2);
    assert!(ip_types.contains(&"v4"));
    assert!(ip_types.contains(&"v6"));

    // The fresh volume follows the naming rule.
    let create_volume = gql
        .iter()
        .find(|b| b["query"].as_str().unwrap().contains("createVolume"))
        .unwrap();
    assert_eq!(create_volume["variables"]["input"]["name"], "abc_pgdata");
    assert_eq!(create_volume["variables"]["input"]["sizeGb"], 1);

    // Secrets went out filtered and upper-cased.
    let secrets = gql
        .iter()
        .find(|b| b["query"].as_str().unwrap().contains("setSecrets"))
        .unwrap();
    let sent: Vec<&str> = secrets["variables"]["input"]["secrets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["key"].as_str().unwrap())
        .collect();
    assert!(sent.contains(&"POSTGRES_PASSWORD"));
    assert!(sent.contains(&"SERVICE_ROLE_KEY"));

    // The machine request carries the five services in order and mounts the
    // new volume at the fixed path.
    let create_machine = requests
        .iter()
        .find(|r| r.url.path() == "/v1/apps/abc/machines")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&create_machine.body).unwrap();
    let services = body["config"]["services"].as_array().unwrap();
    assert_eq!(services.len(), 5);
    let ports: Vec<u64> = services
        .iter()
        .map(|s| s["ports"][0]["port"].as_u64().unwrap())
        .collect();
    assert_eq!(ports, vec![5432, 8085, 80, 443, 6543]);
    assert_eq!(body["config"]["mounts"][0]["volume"], "vol_1");
    assert_eq!(body["config"]["mounts"][0]["path"], "/mnt/postgresql");
    assert_eq!(body["config"]["size"], "shared-cpu-4x");

    // App creation preceded every provisioning call.
    let create_app_at = requests
        .iter()
        .position(|r| String::from_utf8_lossy(&r.body).contains("createApp"))
        .unwrap();
    let volume_at = requests
        .iter()
        .position(|r| String::from_utf8_lossy(&r.body).contains("createVolume"))
        .unwrap();
    assert!(create_app_at < volume_at);
}

#[tokio::test]
async fn failed_machine_create_rolls_back_the_app_and_keeps_the_original_error() {
    let server = MockServer::start().await;
    mount_provisioning_mocks(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/v1/apps/abc/machines"))
        .respond_with(ResponseTemplate::new(500).set_body_string("machine boom"))
        .mount(&server)
        .await;
    // Both the pre-clean and the rollback hit deleteApp; both fail, and
    // neither failure may replace the machine-creation error.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("deleteApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Could not find App"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = run(test_config(&server, "abc")).await.unwrap_err();
    assert!(err.to_string().contains("machine boom"), "got: {err}");

    // The pre-clean delete ran before the app was recreated.
    let requests = server.received_requests().await.unwrap();
    let delete_at = requests
        .iter()
        .position(|r| String::from_utf8_lossy(&r.body).contains("deleteApp"))
        .unwrap();
    let create_at = requests
        .iter()
        .position(|r| String::from_utf8_lossy(&r.body).contains("createApp"))
        .unwrap();
    assert!(delete_at < create_at);
}

#[tokio::test]
async fn successful_run_reports_keys_and_hostname() {
    let server = MockServer::start().await;
    mount_provisioning_mocks(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/v1/apps/abc/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_body("abc", "vol_1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("deleteApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Could not find App"}]
        })))
        .mount(&server)
        .await;

    let outputs = run(test_config(&server, "abc")).await.unwrap();
    assert_eq!(outputs.hostname, "abc.fly.dev");
    // Minted keys are JWTs.
    assert_eq!(outputs.anon_key.split('.').count(), 3);
    assert_eq!(outputs.service_key.split('.').count(), 3);
}

#[tokio::test]
async fn rerun_precleans_the_previous_deployment() {
    let server = MockServer::start().await;
    mount_provisioning_mocks(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/v1/apps/abc/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_body("abc", "vol_1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("deleteApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"deleteApp": {"organization": {"id": "org_123"}}}
        })))
        .expect(2)
        .mount(&server)
        .await;

    run(test_config(&server, "abc")).await.unwrap();
    run(test_config(&server, "abc")).await.unwrap();

    // Each run deletes whatever app exists before recreating it, so two
    // runs interleave delete, create, delete, create.
    let requests = server.received_requests().await.unwrap();
    let ordered: Vec<&str> = requests
        .iter()
        .filter_map(|r| {
            let body = String::from_utf8_lossy(&r.body);
            if body.contains("deleteApp") {
                Some("delete")
            } else if body.contains("createApp") {
                Some("create")
            } else {
                None
            }
        })
        .collect();
    assert_eq!(ordered, vec!["delete", "create", "delete", "create"]);
}

#[tokio::test]
async fn pre_supplied_keys_bypass_minting() {
    let server = MockServer::start().await;
    mount_provisioning_mocks(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/v1/apps/abc/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_body("abc", "vol_1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("deleteApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"deleteApp": {"organization": {"id": "org_123"}}}
        })))
        .mount(&server)
        .await;

    let mut config = test_config(&server, "abc");
    config.anon_key = Some("anon-from-env".to_string());
    config.service_role_key = Some("service-from-env".to_string());

    let outputs = run(config).await.unwrap();
    assert_eq!(outputs.anon_key, "anon-from-env");
    assert_eq!(outputs.service_key, "service-from-env");
}

#[tokio::test]
async fn forked_deployment_clones_the_sibling_volume() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/apps/prod-app/machines"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([machine_body("prod-app", "vol_src")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("forkVolume"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(volume_payload("forkVolume", "abc-def", "vol_fork")),
        )
        .mount(&server)
        .await;

    let fly = client(&server);
    let volume = deploy::make_volume(&fly, "abc-def", "sin", 1, Some("prod-app"))
        .await
        .unwrap();
    assert_eq!(volume.id, "vol_fork");

    let requests = server.received_requests().await.unwrap();
    let fork = graphql_bodies(&requests)
        .into_iter()
        .find(|b| b["query"].as_str().unwrap().contains("forkVolume"))
        .unwrap();
    assert_eq!(fork["variables"]["input"]["sourceVolId"], "vol_src");
    assert_eq!(fork["variables"]["input"]["name"], "abc_def_pgdata");
    assert_eq!(fork["variables"]["input"]["machinesOnly"], true);
}

#[tokio::test]
async fn fork_source_without_mounts_is_a_resolution_error() {
    let server = MockServer::start().await;
    let mut bare = machine_body("prod-app", "unused");
    bare["config"]["mounts"] = json!([]);
    Mock::given(method("GET"))
        .and(path("/v1/apps/prod-app/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bare])))
        .mount(&server)
        .await;

    let fly = client(&server);
    let err = deploy::make_volume(&fly, "abc", "sin", 1, Some("prod-app"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::NoSourceVolume(app) if app == "prod-app"));
}
