//! Publish-path scenarios: a browser's POST body all the way to a new
//! published catalog and SSID.

use lantern_publish::{replace_catalog, url_decode, ServiceScanner, POST_KEY};
use lantern_store::StoreError;

use crate::*;

/// The body as a browser would send it: the form key, then the serialized
/// triples with spaces as `+` and reserved bytes percent-encoded.
const BROWSER_BODY: &[u8] = b"serializedServices=\
    0:0:3:1:1\
    6:4:uri1\
    0:0:3:1:2\
    6:4:uri2\
    4:8:service2\
    5:10:service+2%21\
    0:0:3:1:3\
    6:4:uri3";

fn decode_body(body: &[u8]) -> Vec<u8> {
    let stream = body.strip_prefix(POST_KEY).expect("missing form key");
    url_decode(stream)
}

#[test]
fn browser_body_replaces_the_catalog() {
    let store = TestStore::new();
    let mut list = store.open();
    // Pre-existing catalog that the POST wipes.
    list.add_last(&draft(9, "old-uri")).unwrap();
    list.commit().unwrap();

    let decoded = decode_body(BROWSER_BODY);
    let drafts = ServiceScanner::new(&decoded)
        .unwrap()
        .collect_services()
        .unwrap();
    assert_eq!(drafts.len(), 3);
    assert_eq!(drafts[1].long_desc(), Some("service 2!"));

    let mut list = store.open();
    replace_catalog(&mut list, &drafts).unwrap();

    assert_eq!(store.advertised(), b"##^1^2,service2^3");
    let mut reader = store.open();
    assert_eq!(reader.count().unwrap(), 3);
    assert_eq!(reader.get(0).unwrap().unwrap().uri, "uri1");
    assert_eq!(
        reader.get(1).unwrap().unwrap().long_desc.as_deref(),
        Some("service 2!")
    );
}

#[test]
fn oversized_submission_reports_ssid_too_long_and_keeps_the_old_catalog() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);

    let body = b"serializedServices=\
        0:0:3:10:4294967295\
        6:5:uri-a\
        4:27:a+rather+verbose+blurb+here";
    let decoded = decode_body(body);
    let drafts = ServiceScanner::new(&decoded)
        .unwrap()
        .collect_services()
        .unwrap();

    let mut writer = store.open();
    assert!(matches!(
        replace_catalog(&mut writer, &drafts),
        Err(StoreError::SsidTooLong)
    ));

    // Published state untouched.
    assert_eq!(store.advertised(), b"##^1^2,service2^3");
    let reader = store.open();
    assert_eq!(reader.count().unwrap(), 3);
}

#[test]
fn malformed_submission_never_reaches_the_store() {
    let decoded = decode_body(b"serializedServices=0:0:6:40:uri-too-short");
    let result = ServiceScanner::new(&decoded).and_then(ServiceScanner::collect_services);
    assert!(result.is_err());
}

#[test]
fn page_reflects_the_published_catalog() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);

    let mut reader = store.open();
    let mut services = Vec::new();
    let mut pos = 0;
    while let Some(service) = reader.get(pos).unwrap() {
        services.push(service);
        pos += 1;
    }

    let block = lantern_publish::page::script_block(&[], &services, None);
    assert!(block.contains(r#"services[0] = new Service(1, "uri1", null, "service1");"#));
    assert!(block.contains(r#"services[1] = new Service(2, "uri2", "service2", "service2");"#));
    assert!(block.contains(r#"services[2] = new Service(3, "uri3", null, null);"#));
}
