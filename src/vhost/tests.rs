// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::core::GateRequest;
use reqwest::Method;
use serde_json::json;
use std::io::Write;

fn factory() -> HandlerFactory {
    HandlerFactory::with_defaults().unwrap()
}

fn load(text: &str) -> Result<RoutingTable, VhostError> {
    RoutingTable::from_json(text, &factory())
}

async fn status_for(table: &RoutingTable, host: &str) -> u16 {
    table
        .route(host)
        .serve(GateRequest::new(Method::GET, "/").with_header("host", host))
        .await
        .status
}

#[test]
fn test_location_documents() {
    let cases = [
        (r#"{}"#, false),
        (r#"{"default": null}"#, false),
        (r#"{"default": ""}"#, false),
        (r#"{"default": "."}"#, true),
        (r#"{"default": "$"}"#, false),
        (r#"{"foo.com": "http://bar.com"}"#, false),
        (r#"{"default": ".", "foo.com": "http://bar.com"}"#, true),
        (r#"{"default": ".", "foo.com": "bar.com"}"#, false),
        (r#"{"default": ".", "foo.com": "https://bar.com"}"#, true),
        (r#"{"default": ".", "foo.com": "http://bar"}"#, true),
        (r#"{"default": ".", "foo": "http://bar"}"#, true),
    ];

    for (document, ok) in cases {
        let result = load(document);
        assert_eq!(result.is_ok(), ok, "{document}: {:?}", result.err());
    }
}

#[test]
fn test_load_errors_name_the_problem() {
    assert!(matches!(load("{}"), Err(VhostError::NoHosts)));
    assert_eq!(
        load(r#"{"foo.com": {"simple_code": 200}}"#).unwrap_err().to_string(),
        "nothing configured for 'default' host"
    );
    assert_eq!(
        load(r#"{"default": ".", "foo.com": "bar.com"}"#)
            .unwrap_err()
            .to_string(),
        "foo.com: can't parse 'bar.com'"
    );
    assert!(matches!(load("[1, 2]"), Err(VhostError::Parse(_))));
    assert!(matches!(load("{ nope"), Err(VhostError::Parse(_))));
}

#[test]
fn test_host_error_keeps_nested_path() {
    let err = load(
        r#"{
            "default": {"simple_code": 200},
            "admin.example.com": {"basic_auth": {"user": "a", "pass": "b",
                "next": {"simple_log": {"next": {"bogus": 1}}}}}
        }"#,
    )
    .unwrap_err();

    match err {
        VhostError::Host { hosts, source } => {
            assert_eq!(hosts, "admin.example.com");
            assert_eq!(source.path(), "basic_auth.next.simple_log.next");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_host_lists_share_one_handler() {
    let table = load(
        r#"{
            "default": {"simple_code": 404},
            "a.com, b.com ,c.com": {"simple_code": 200}
        }"#,
    )
    .unwrap();

    assert_eq!(table.hosts(), vec!["a.com", "b.com", "c.com", "default"]);
    assert_eq!(table.len(), 4);
    assert!(!table.is_empty());
    assert!(Arc::ptr_eq(table.route("a.com"), table.route("b.com")));
    assert!(Arc::ptr_eq(table.route("a.com"), table.route("c.com")));
    assert!(!Arc::ptr_eq(table.route("a.com"), table.route("default")));
}

#[test]
fn test_default_can_share_a_host_list() {
    let table = load(r#"{"default, www.example.com": {"simple_code": 200}}"#).unwrap();
    assert!(Arc::ptr_eq(table.route("www.example.com"), table.route("other.org")));
}

#[test]
fn test_empty_and_duplicate_hosts_are_rejected() {
    let err = load(r#"{"default": ".", "a.com,,b.com": "."}"#).unwrap_err();
    assert!(matches!(err, VhostError::EmptyHost(ref hosts) if hosts == "a.com,,b.com"));

    let err = load(r#"{"default": ".", " ": "."}"#).unwrap_err();
    assert!(matches!(err, VhostError::EmptyHost(_)));

    let err = load(r#"{"default": ".", "a.com": ".", "b.com, a.com": "."}"#).unwrap_err();
    assert!(matches!(err, VhostError::DuplicateHost { ref host, .. } if host == "a.com"));
}

#[test]
fn test_normalize_host() {
    assert_eq!(normalize_host("example.com"), "example.com");
    assert_eq!(normalize_host("example.com:8080"), "example.com");
    assert_eq!(normalize_host("example.com:"), "example.com");
    assert_eq!(normalize_host(""), "");
}

#[tokio::test]
async fn test_dispatch_by_host() {
    let table = load(
        r#"{
            "default": {"simple_code": 404},
            "foo.com": {"simple_code": 200},
            "bar.com": {"simple_code": 202}
        }"#,
    )
    .unwrap();

    assert_eq!(status_for(&table, "foo.com").await, 200);
    assert_eq!(status_for(&table, "foo.com:8080").await, 200);
    assert_eq!(status_for(&table, "bar.com").await, 202);
    assert_eq!(status_for(&table, "baz.com").await, 404);
    assert_eq!(status_for(&table, "").await, 404);
    // Host keys match exactly.
    assert_eq!(status_for(&table, "FOO.com").await, 404);
    assert_eq!(status_for(&table, "www.foo.com").await, 404);

    assert!(table.contains("foo.com:80"));
    assert!(!table.contains("baz.com"));
}

#[test]
fn test_loading_is_repeatable() {
    let document = json!({
        "default": {"simple_code": 404},
        "x.org,y.org": {"redirect": {"to": "https://z.org/"}}
    });
    let factory = factory();

    let first = RoutingTable::from_value(&document, &factory).unwrap();
    let second = RoutingTable::from_value(&document, &factory).unwrap();
    assert_eq!(first.hosts(), second.hosts());
    assert_eq!(first.route("x.org").kind(), second.route("x.org").kind());
}

#[test]
fn test_from_file_formats() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    yaml.write_all(b"default:\n  simple_code: 200\n\"a.com, b.com\":\n  simple_code: 204\n")
        .unwrap();
    let table = RoutingTable::from_file(yaml.path(), &factory()).unwrap();
    assert_eq!(table.hosts(), vec!["a.com", "b.com", "default"]);

    let mut toml = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    toml.write_all(b"default = \".\"\n\n[\"api.example.com\".redirect]\nto = \"/v2\"\ncode = 308\n")
        .unwrap();
    let table = RoutingTable::from_file(toml.path(), &factory()).unwrap();
    assert_eq!(table.route("api.example.com").kind(), "redirect");

    let err = RoutingTable::from_file(Path::new("/no/such/rp.json"), &factory()).unwrap_err();
    assert!(matches!(err, VhostError::Io(_)));
}

#[tokio::test]
async fn test_table_built_in_code() {
    let factory = factory();
    let ok: Arc<dyn Handler> = factory.generate(&json!({"simple_code": 200})).unwrap().into();
    let gone: Arc<dyn Handler> = factory.generate(&json!({"simple_code": 410})).unwrap().into();

    let table = RoutingTable::new(gone.clone()).with_host("live.test:8080", ok.clone());
    assert_eq!(table.hosts(), vec!["default", "live.test"]);
    assert!(table.contains("live.test"));
    assert_eq!(status_for(&table, "live.test").await, 200);
    assert_eq!(status_for(&table, "other.test").await, 410);

    let table = table.with_host("default", ok);
    assert_eq!(status_for(&table, "other.test").await, 200);
    assert!(!Arc::ptr_eq(table.route("other.test"), &gone));
}
