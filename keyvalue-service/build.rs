use ferrule_gen::config::GeneratorConfig;
use prost::Message;
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use std::env::var;
use std::path::PathBuf;

// The KeyValue schema, as `protoc --include_imports` would describe it:
//
// package kv;
// import "ferrule/oneway.proto";
//
// service KeyValue {
//   rpc GetValue(GetValueRequest) returns (GetValueResponse);
//   rpc SetValue(SetValueRequest) returns (SetValueResponse);
//   rpc Forget(GetValueRequest) returns (ferrule.Oneway);
//   rpc SetMany(stream SetValueRequest) returns (SetManyResponse);
//   rpc Watch(WatchRequest) returns (stream Entry);
//   rpc Sync(stream Entry) returns (stream Entry);
// }
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(var("OUT_DIR").expect("Missing OUT_DIR environment variable"));
    let descriptor_set = FileDescriptorSet {
        file: vec![oneway_file(), kv_file()],
    }
    .encode_to_vec();

    let files = ferrule_gen::generate_from_descriptor_set(
        &descriptor_set,
        &["kv.proto".to_string()],
        &GeneratorConfig::default(),
    )
    .expect("KeyValue bindings must generate");

    ferrule_gen::write_all(&files, &out_dir).expect("Failed to write KeyValue bindings");
}

fn oneway_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("ferrule/oneway.proto".to_string()),
        package: Some("ferrule".to_string()),
        message_type: vec![message("Oneway", vec![])],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn kv_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("kv.proto".to_string()),
        package: Some("kv".to_string()),
        dependency: vec!["ferrule/oneway.proto".to_string()],
        message_type: vec![
            message("GetValueRequest", vec![string("key", 1)]),
            message("GetValueResponse", vec![string("value", 1)]),
            message("SetValueRequest", vec![string("key", 1), string("value", 2)]),
            message("SetValueResponse", vec![]),
            message(
                "SetManyResponse",
                vec![field("count", 1, Type::Uint32, Label::Optional), field("keys", 2, Type::String, Label::Repeated)],
            ),
            message("WatchRequest", vec![field("keys", 1, Type::String, Label::Repeated)]),
            message("Entry", vec![string("key", 1), string("value", 2)]),
            message("KeyNotFound", vec![string("key", 1)]),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("KeyValue".to_string()),
            method: vec![
                method("GetValue", ".kv.GetValueRequest", ".kv.GetValueResponse", false, false),
                method("SetValue", ".kv.SetValueRequest", ".kv.SetValueResponse", false, false),
                method("Forget", ".kv.GetValueRequest", ".ferrule.Oneway", false, false),
                method("SetMany", ".kv.SetValueRequest", ".kv.SetManyResponse", true, false),
                method("Watch", ".kv.WatchRequest", ".kv.Entry", false, true),
                method("Sync", ".kv.Entry", ".kv.Entry", true, true),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn string(name: &str, number: i32) -> FieldDescriptorProto {
    field(name, number, Type::String, Label::Optional)
}

fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str, client: bool, server: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        client_streaming: Some(client),
        server_streaming: Some(server),
        ..Default::default()
    }
}
