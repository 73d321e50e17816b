//! End-to-end behavior of the config service over real files.

mod common;

use std::fs;

use common::Fixture;
use serde_yaml::Value;
use sub_stub::{Format, ServiceError};

fn proxies(yaml: &str) -> Vec<Value> {
    let doc: Value = serde_yaml::from_str(yaml).unwrap();
    doc["proxies"].as_sequence().unwrap().clone()
}

#[test]
fn test_rule_engine_one_stanza_per_visible_server() {
    let fixture = Fixture::new();
    let service = fixture.service();

    let alice = proxies(&service.get("alice", "clash").unwrap().body);
    assert_eq!(alice.len(), 3);
    let bob = proxies(&service.get("bob", "clash").unwrap().body);
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0]["server"].as_str(), Some("de.example.net"));
}

#[test]
fn test_proxy_group_receives_all_names() {
    let fixture = Fixture::new();
    let body = fixture.service().get("dave", "mihomo").unwrap().body;
    let doc: Value = serde_yaml::from_str(&body).unwrap();

    let group = &doc["proxy-groups"][0]["proxies"];
    assert_eq!(group.as_sequence().unwrap().len(), 1);
    assert_eq!(group[0].as_str(), Some("Germany"));
    assert!(doc.get("proxy-template").is_none());
}

#[test]
fn test_duplicate_descriptions_get_distinct_names() {
    let fixture = Fixture::new();
    fs::write(
        fixture.path("servers"),
        "a.example.net||||Edge|\nb.example.net||||Edge|\nc.example.net||||Edge|\n",
    )
    .unwrap();

    let names: Vec<String> = proxies(&fixture.service().get("bob", "clash").unwrap().body)
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Edge", "Edge (2)", "Edge (3)"]);
}

#[test]
fn test_external_server_uses_its_own_identity() {
    let fixture = Fixture::new();
    let body = fixture.service().get("alice", "v2ray").unwrap().body;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);

    let partner = lines
        .iter()
        .find(|l| l.contains("partner.example.org"))
        .unwrap();
    assert!(partner.starts_with("vless://ext-uuid@partner.example.org:443"));
    assert!(partner.contains("sid=ext-sid"));
    assert!(partner.contains("spx=&"));

    let internal = lines.iter().find(|l| l.contains("de.example.net")).unwrap();
    assert!(internal.contains("sid=a1b2c3d4"));
    assert!(internal.contains("spx=%2F"));
}

#[test]
fn test_obfuscation_paths_unique_within_output() {
    let fixture = Fixture::new();
    let body = fixture.service().get("alice", "json").unwrap().body;
    let configs: serde_json::Value = serde_json::from_str(&body).unwrap();

    let paths: Vec<&str> = configs
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            c["outbounds"][0]["streamSettings"]["realitySettings"]["spiderX"]
                .as_str()
                .unwrap()
        })
        .filter(|p| !p.is_empty())
        .collect();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);
    assert!(paths.iter().all(|p| p.starts_with('/') && p.len() == 13));
}

#[test]
fn test_json_patches_identity_and_dns() {
    let fixture = Fixture::new();
    let body = fixture.service().get("bob", "").unwrap().body;
    let configs: serde_json::Value = serde_json::from_str(&body).unwrap();
    let config = &configs[0];

    assert_eq!(config["remarks"], "Germany | reality");
    assert_eq!(config["dns"]["servers"][0], "1.1.1.1");
    let vnext = &config["outbounds"][0]["settings"]["vnext"][0];
    assert_eq!(vnext["address"], "de.example.net");
    assert_eq!(vnext["users"][0]["id"], "550e8400-e29b-41d4-a716-446655440002");
    let reality = &config["outbounds"][0]["streamSettings"]["realitySettings"];
    assert_eq!(reality["serverName"], "www.microsoft.com");
    assert_eq!(reality["password"], "pbk-de");
    assert_eq!(reality["fingerprint"], "chrome");
}

#[test]
fn test_custom_template_fallback_matches_default() {
    let fixture = Fixture::new();
    let service = fixture.service();

    let dave = service.get("dave", "clash").unwrap();
    assert_eq!(dave.template_fallback.as_ref().unwrap().requested, "gone.yaml");

    let (user, servers) = service.servers_for("dave").unwrap();
    let mut plain = user.clone();
    plain.custom_template = None;
    let default = service.render(&plain, &servers, Format::RuleEngine).unwrap();
    assert_eq!(dave.body, default.body);
}

#[test]
fn test_edits_are_picked_up() {
    let fixture = Fixture::new();
    let service = fixture.service();
    assert!(matches!(service.get("carol", "json"), Err(ServiceError::NotFound(_))));

    let mut users = fs::read_to_string(fixture.path("users")).unwrap();
    users.push_str("550e8400-e29b-41d4-a716-446655440004|d4e5f6a7|carol|Carol||\n");
    fs::write(fixture.path("users"), users).unwrap();

    assert!(service.get("carol", "json").is_ok());
}

#[test]
fn test_unchanged_files_are_not_reread() {
    let fixture = Fixture::new();
    let service = fixture.service();

    service.get("alice", "clash").unwrap();
    let before = service.caches().stats();
    service.get("alice", "clash").unwrap();
    let after = service.caches().stats();

    assert_eq!(after.misses, before.misses);
    assert!(after.hits > before.hits);
}
