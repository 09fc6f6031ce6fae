use ferrule_gen::{
    GenerateError, config::GeneratorConfig, generate, generate_from_descriptor_set,
    ir::FileBindings, write_all,
};
use prost::Message;
use prost_types::FileDescriptorProto;


use descriptors::*;

fn store_bindings() -> String {
    let files = generate(&store_pool(), &[], &GeneratorConfig::default()).unwrap();
    assert_eq!(files.len(), 1);
    files.into_iter().next().unwrap().content
}

#[test]
fn test_only_files_with_services_are_generated_by_default() {
    let files = generate(&store_pool(), &[], &GeneratorConfig::default()).unwrap();

    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["acme/kv.ferrule.rs"]);
}

#[test]
fn test_output_is_deterministic() {
    let bytes = {
        let mut files = imports();
        files.push(store_file());
        encode(files)
    };
    let config = GeneratorConfig::default();

    let first = generate_from_descriptor_set(&bytes, &[], &config).unwrap();
    let second = generate_from_descriptor_set(&bytes, &[], &config).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_output_carries_the_generated_marker() {
    let content = store_bindings();

    assert!(content.starts_with("// Code generated by ferrule-gen. DO NOT EDIT.\n// source: acme/kv.proto\n"));
    assert!(content.contains("pub const STORE_SERVICE_NAME: &str = \"acme.kv.Store\";"));
    assert!(content.contains("pub struct StoreClient {"));
    assert!(content.contains("pub trait StoreServer:"));
}

#[test]
fn test_every_method_is_wired_once_per_handler_family() {
    let content = store_bindings();

    assert!(content.contains("pub fn build_store_procedures<S: StoreServer>("));
    assert_eq!(content.matches("new_unary_handler(").count(), 2);
    assert_eq!(content.matches("new_oneway_handler(").count(), 1);
    assert_eq!(content.matches("new_stream_handler(").count(), 3);
    assert_eq!(content.matches("::ferrule_core::registry::build_procedures(").count(), 1);
}

#[test]
fn test_streaming_methods_get_companion_types() {
    let content = store_bindings();

    assert!(content.contains(
        "pub type StoreUploadCall = ::ferrule_core::stream::ClientStreamingCall<Entry, GetResponse>;"
    ));
    assert!(content.contains(
        "pub type StoreListStream<'a> = ::ferrule_core::stream::ServerStreamingResponses<'a, Entry>;"
    ));
    assert!(content.contains(
        "pub type StoreSyncStream<'a> = ::ferrule_core::stream::BidiStreamingServer<'a, Entry, Entry>;"
    ));
    assert!(!content.contains("StoreGetCall"));
    assert!(!content.contains("StoreDropCall"));
}

#[test]
fn test_message_references_resolve_to_rust_paths() {
    let content = store_bindings();

    assert!(content.contains("request: &super::super::acme::common::page::Cursor,"));
    assert!(content.contains("::std::result::Result<::ferrule_core::Ack, ::ferrule_core::CallError>"));
    assert!(content.contains("fn ping(\n        &self,\n        ctx: ::ferrule_core::CallContext,\n        request: (),"));
}

#[test]
fn test_descriptors_of_the_file_and_its_imports_are_embedded() {
    let pool = store_pool();
    let file = pool.get_file_by_name(STORE_FILE).unwrap();

    let bindings = FileBindings::build(&file, &GeneratorConfig::default()).unwrap();

    assert_eq!(bindings.descriptors_const, "KV_FILE_DESCRIPTORS");
    assert_eq!(bindings.descriptors.len(), 4);
    let first = FileDescriptorProto::decode(bindings.descriptors[0].as_slice()).unwrap();
    assert_eq!(first.name(), STORE_FILE);
    assert!(store_bindings().contains("pub const KV_FILE_DESCRIPTORS: &[&[u8]] = &["));
}

#[test]
fn test_config_changes_paths_and_naming() {
    let config = GeneratorConfig {
        file_suffix: ".rpc.rs".to_string(),
        core_path: "crate::rpc".to_string(),
        emit_descriptors: false,
        ..GeneratorConfig::default()
    };

    let files = generate(&store_pool(), &[STORE_FILE.to_string()], &config).unwrap();

    assert_eq!(files[0].name, "acme/kv.rpc.rs");
    assert!(files[0].content.contains("crate::rpc::client::Client"));
    assert!(!files[0].content.contains("::ferrule_core"));
    assert!(!files[0].content.contains("FILE_DESCRIPTORS"));
}

#[test]
fn test_unknown_file_is_rejected() {
    let result = generate(&store_pool(), &["acme/missing.proto".to_string()], &GeneratorConfig::default());

    assert!(matches!(result, Err(GenerateError::FileNotFound(name)) if name == "acme/missing.proto"));
}

#[test]
fn test_colliding_method_names_are_rejected() {
    let broken = file(
        "acme/broken.proto",
        "acme.broken",
        &[],
        vec![message("Request")],
        vec![service(
            "Broken",
            vec![
                method("GetValue", ".acme.broken.Request", ".acme.broken.Request", false, false),
                method("get_value", ".acme.broken.Request", ".acme.broken.Request", false, false),
            ],
        )],
    );

    let result = generate(&pool(vec![broken]), &[], &GeneratorConfig::default());

    match result {
        Err(GenerateError::MethodNameCollision {
            service,
            first,
            second,
            ident,
        }) => {
            assert_eq!(service, "acme.broken.Broken");
            assert_eq!((first.as_str(), second.as_str()), ("GetValue", "get_value"));
            assert_eq!(ident, "get_value");
        }
        other => panic!("Expected a name collision, got {other:?}"),
    }
}

#[test]
fn test_nothing_is_written_when_any_file_fails() {
    let broken = file(
        "acme/broken.proto",
        "acme.broken",
        &[],
        vec![message("Request")],
        vec![service(
            "Broken",
            vec![
                method("Put", ".acme.broken.Request", ".acme.broken.Request", false, false),
                method("PUT", ".acme.broken.Request", ".acme.broken.Request", false, false),
            ],
        )],
    );
    let mut files = imports();
    files.push(store_file());
    files.push(broken);
    let dir = tempfile::tempdir().unwrap();

    let result = generate(&pool(files), &[], &GeneratorConfig::default())
        .and_then(|generated| write_all(&generated, dir.path()));

    assert!(result.is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_files_are_written_under_their_package_directory() {
    let dir = tempfile::tempdir().unwrap();
    let files = generate(&store_pool(), &[], &GeneratorConfig::default()).unwrap();

    write_all(&files, dir.path()).unwrap();

    let written = std::fs::read_to_string(dir.path().join("acme/kv.ferrule.rs")).unwrap();
    assert_eq!(written, files[0].content);
}
