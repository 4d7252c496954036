//! End-to-end behavior across the binary codec, the tree, and the JSON bridge.

use fieldwire_codec::{
    data_to_string, fields, json, string_to_data, string_to_data_with, DecodeConfig, Decode,
    Dict, Encode, EncodeSize, Error, Format, FromDict, JsonConfig, MissingKey, ToDict, TypeKind,
    INDEX_THRESHOLD,
};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq)]
struct Record {
    id: u32,
    name: String,
    tags: Vec<String>,
}

fields!(Record { id, name, tags });

fn record() -> Record {
    Record {
        id: 7,
        name: "alpha".into(),
        tags: vec!["x".into(), "y".into()],
    }
}

fn tree_of<T: ToDict>(value: &T) -> Dict {
    let mut dict = Dict::new();
    value.to_dict(&mut dict);
    dict
}

#[test]
fn test_binary_roundtrip() {
    let value = record();
    let encoded = value.encode();
    assert_eq!(encoded.len(), value.encode_size());

    let mut expected = Vec::new();
    expected.extend_from_slice(&7u32.to_le_bytes());
    expected.extend_from_slice(b"alpha\0");
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.extend_from_slice(b"x\0y\0");
    assert_eq!(&encoded[..], &expected[..]);

    let decoded = Record::decode(&encoded[..]).unwrap();
    assert_eq!(decoded.id, 7);
    assert_eq!(decoded.name, "alpha");
    assert_eq!(decoded.tags, vec!["x".to_owned(), "y".to_owned()]);
}

#[test]
fn test_json_roundtrip() {
    let dict = tree_of(&record());
    let pretty = json::to_string(&dict, &JsonConfig::pretty()).unwrap();
    let compact: String = pretty.split_whitespace().collect();
    assert_eq!(compact, r#"{"id":7,"name":"alpha","tags":["x","y"]}"#);

    let parsed = json::from_str(&pretty).unwrap();
    let decoded = Record::from_dict(&parsed, &DecodeConfig::strict()).unwrap();
    assert_eq!(decoded, record());
}

#[test]
fn test_lookup_cache_agrees_with_scan() {
    let mut dict = Dict::new();
    for i in 0..50 {
        dict.add_child(format!("child{i}"))
            .set_leaf(TypeKind::Integral { signed: false }, i.to_string().as_bytes());
    }
    assert!(dict.len() >= INDEX_THRESHOLD);

    let scan = |dict: &Dict, name: &str| {
        dict.children()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, node)| node.payload().to_vec())
    };
    let find = |dict: &Dict, name: &str| dict.find(name).map(|node| node.payload().to_vec());

    assert!(!dict.is_indexed());
    let present_before = find(&dict, "child31");
    assert!(dict.is_indexed());
    let absent_before = find(&dict, "child50");
    let present_after = find(&dict, "child31");
    let absent_after = find(&dict, "child50");

    assert_eq!(present_before, scan(&dict, "child31"));
    assert_eq!(present_before, Some(b"31".to_vec()));
    assert_eq!(present_after, present_before);
    assert_eq!(absent_before, None);
    assert_eq!(absent_after, scan(&dict, "child50"));

    // Mutations drop the cache, and later lookups see the new children.
    dict.remove_child("child31");
    assert!(!dict.is_indexed());
    assert_eq!(find(&dict, "child31"), None);
    dict.add_child("child50").set_leaf(TypeKind::String, b"new");
    assert_eq!(find(&dict, "child50"), Some(b"new".to_vec()));
    assert_eq!(find(&dict, "child50"), scan(&dict, "child50"));
}

#[test]
fn test_optional_null_symmetry() {
    #[derive(Clone, Debug, Default, PartialEq)]
    struct Holder {
        value: Option<u16>,
    }
    fields!(Holder { value });

    let json = data_to_string(&Holder { value: None }, false).unwrap();
    assert_eq!(json, r#"{"value":null}"#);

    let mut parsed = Holder { value: Some(1) };
    string_to_data(r#"{"value": null}"#, &mut parsed).unwrap();
    assert_eq!(parsed.value, None);

    string_to_data(r#"{"value": 12}"#, &mut parsed).unwrap();
    assert_eq!(parsed.value, Some(12));

    let encoded = Holder { value: None }.encode();
    assert_eq!(&encoded[..], &[0, 0, 0, 0]);
}

#[test]
fn test_strict_and_lenient() {
    #[derive(Clone, Debug, PartialEq)]
    struct Settings {
        retries: u8,
        endpoint: String,
    }
    impl Default for Settings {
        fn default() -> Self {
            Self {
                retries: 3,
                endpoint: "localhost".into(),
            }
        }
    }
    fields!(Settings { retries, endpoint });

    // Surface the substitution warnings in test output.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let json = r#"{"endpoint": "example.com"}"#;
    let mut settings = Settings::default();
    assert!(matches!(
        string_to_data(json, &mut settings),
        Err(Error::MissingKey(key)) if key == "retries"
    ));

    let lenient = JsonConfig {
        missing: MissingKey::Lenient,
        ..JsonConfig::default()
    };
    string_to_data_with(json, &mut settings, &lenient).unwrap();
    assert_eq!(settings.retries, 3);
    assert_eq!(settings.endpoint, "example.com");
}

#[test]
fn test_nested_containers() {
    #[derive(Clone, Debug, Default, PartialEq)]
    struct Scene {
        records: Vec<Record>,
        index: BTreeMap<u32, String>,
        origin: (f32, f32, f32),
        parent: Option<Box<Record>>,
    }
    fields!(Scene {
        records,
        index,
        origin,
        parent
    });

    let scene = Scene {
        records: vec![record(), Record::default()],
        index: [(1, "one".to_owned()), (2, "two".to_owned())].into(),
        origin: (0.5, -1.0, 2.25),
        parent: Some(Box::new(record())),
    };

    let decoded = Scene::decode(&scene.encode()[..]).unwrap();
    assert_eq!(decoded, scene);

    let json = data_to_string(&scene, true).unwrap();
    let mut parsed = Scene::default();
    string_to_data(&json, &mut parsed).unwrap();
    assert_eq!(parsed, scene);
}

#[test]
fn test_binary_tree_matches_text_tree() {
    let mut binary = Dict::with_format(Format::Binary);
    record().to_dict(&mut binary);
    let text = tree_of(&record());
    assert_ne!(binary, text);

    binary.coerce(Format::Text).unwrap();
    assert_eq!(binary, text);
}

#[test]
fn test_truncated_input() {
    let encoded = record().encode();
    for len in 0..encoded.len() {
        assert!(matches!(
            Record::decode(&encoded[..len]),
            Err(Error::EndOfBuffer)
        ));
    }
    let mut extended = Vec::from(encoded);
    extended.push(0);
    assert!(matches!(
        Record::decode(&extended[..]),
        Err(Error::ExtraData(1))
    ));
}
