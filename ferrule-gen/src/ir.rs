//! # Binding IR
//!
//! The intermediate representation rendered by the templates. Building it is where every
//! decision is taken: each method is classified into its [`CallingShape`], every message
//! reference is resolved to a Rust path and every Rust identifier is chosen. Rendering only
//! substitutes these values into fragments.
use crate::{GenerateError, config::GeneratorConfig};
use ferrule_core::shape::{CallingShape, MethodDescriptor, classify_with};
use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use prost::Message as _;
use prost_reflect::{FileDescriptor, MessageDescriptor, ServiceDescriptor};
use std::collections::BTreeSet;

/// Everything generated for one input file.
#[derive(Debug, Clone)]
pub struct FileBindings {
    /// Name of the input file inside the descriptor set (e.g. `kv/kv.proto`).
    pub source: String,
    pub package: String,
    /// Name of the generated file (e.g. `kv/kv.ferrule.rs`).
    pub output_name: String,
    /// Name of the constant holding the encoded descriptors (e.g. `KV_FILE_DESCRIPTORS`).
    pub descriptors_const: String,
    pub services: Vec<ServiceBindings>,
    /// Encoded `FileDescriptorProto` of the input file, followed by its transitive imports.
    pub descriptors: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ServiceBindings {
    /// Fully qualified service name (e.g. `kv.KeyValue`).
    pub full_name: String,
    /// Prefix of every generated type (e.g. `KeyValue`).
    pub rust_name: String,
    /// Name of the constant holding the fully qualified name (e.g. `KEY_VALUE_SERVICE_NAME`).
    pub name_const: String,
    /// Name of the procedure builder (e.g. `build_key_value_procedures`).
    pub procedures_fn: String,
    pub methods: Vec<MethodBinding>,
}

#[derive(Debug, Clone)]
pub struct MethodBinding {
    pub descriptor: MethodDescriptor,
    pub shape: CallingShape,
    /// Rust method name (e.g. `get_value`).
    pub ident: String,
    /// Infix of the per-method types (e.g. `GetValue`).
    pub camel: String,
    /// Rust path of the request message, relative to the file's package module.
    pub request: String,
    /// Rust path of the response message, relative to the file's package module.
    pub response: String,
}

impl FileBindings {
    pub fn build(file: &FileDescriptor, config: &GeneratorConfig) -> Result<Self, GenerateError> {
        let source = file.name().to_string();
        let stem = file_stem(&source);
        let services = file
            .services()
            .map(|service| ServiceBindings::build(&service, file.package_name(), config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            output_name: format!("{}{}", strip_extension(&source), config.file_suffix),
            descriptors_const: format!("{}_FILE_DESCRIPTORS", stem.to_shouty_snake_case()),
            package: file.package_name().to_string(),
            descriptors: descriptor_closure(file),
            services,
            source,
        })
    }
}

impl ServiceBindings {
    fn build(
        service: &ServiceDescriptor,
        package: &str,
        config: &GeneratorConfig,
    ) -> Result<Self, GenerateError> {
        let mut methods: Vec<MethodBinding> = Vec::new();

        for method in service.methods() {
            let descriptor = MethodDescriptor::from(&method);
            let binding = MethodBinding {
                shape: classify_with(&descriptor, &config.oneway_type),
                ident: rust_ident(method.name().to_snake_case()),
                camel: method.name().to_upper_camel_case(),
                request: rust_type(&method.input(), package, config),
                response: rust_type(&method.output(), package, config),
                descriptor,
            };

            if let Some(existing) = methods
                .iter()
                .find(|m| m.ident == binding.ident || m.camel == binding.camel)
            {
                return Err(GenerateError::MethodNameCollision {
                    service: service.full_name().to_string(),
                    first: existing.descriptor.method_name.clone(),
                    second: binding.descriptor.method_name.clone(),
                    ident: binding.ident,
                });
            }
            methods.push(binding);
        }

        let snake = service.name().to_snake_case();
        Ok(Self {
            full_name: service.full_name().to_string(),
            rust_name: service.name().to_upper_camel_case(),
            name_const: format!("{}_SERVICE_NAME", service.name().to_shouty_snake_case()),
            procedures_fn: format!("build_{snake}_procedures"),
            methods,
        })
    }
}

/// Resolves the Rust path of a message as seen from the module of `from_package`.
///
/// Generated files are expected to be included in the module of their package, laid out the
/// way `prost` lays out packages (`a.b` → `a::b`) and nested messages (`Outer.Inner` →
/// `outer::Inner`). Well-known types map to `prost_types`, `google.protobuf.Empty` to `()`.
pub fn rust_type(message: &MessageDescriptor, from_package: &str, config: &GeneratorConfig) -> String {
    if message.full_name() == config.oneway_type.trim_start_matches('.') {
        return format!("{}::Oneway", config.core_path);
    }

    let package = message.package_name();
    if package == "google.protobuf" {
        return match message.name() {
            "Empty" => "()".to_string(),
            name => format!("::prost_types::{}", name.to_upper_camel_case()),
        };
    }

    let mut segments: Vec<String> = Vec::new();
    if package != from_package {
        let depth = from_package.split('.').filter(|s| !s.is_empty()).count();
        segments.extend(std::iter::repeat_n("super".to_string(), depth));
        segments.extend(
            package
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| rust_ident(s.to_snake_case())),
        );
    }

    let mut parents = Vec::new();
    let mut parent = message.parent_message();
    while let Some(p) = parent {
        parents.push(rust_ident(p.name().to_snake_case()));
        parent = p.parent_message();
    }
    segments.extend(parents.into_iter().rev());

    segments.push(message.name().to_upper_camel_case());
    segments.join("::")
}

/// Encodes `file` and every file it imports, transitively, in depth-first order.
fn descriptor_closure(file: &FileDescriptor) -> Vec<Vec<u8>> {
    fn visit(file: &FileDescriptor, seen: &mut BTreeSet<String>, out: &mut Vec<Vec<u8>>) {
        if !seen.insert(file.name().to_string()) {
            return;
        }
        out.push(file.file_descriptor_proto().encode_to_vec());
        for dependency in file.dependencies() {
            visit(&dependency, seen, out);
        }
    }

    let mut out = Vec::new();
    visit(file, &mut BTreeSet::new(), &mut out);
    out
}

fn strip_extension(name: &str) -> &str {
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &name[..file_start + dot],
        _ => name,
    }
}

fn file_stem(name: &str) -> &str {
    let stem = strip_extension(name);
    stem.rsplit('/').next().unwrap_or(stem)
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "false", "fn",
    "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try", "typeof",
    "unsized", "virtual", "yield",
];

/// Escapes identifiers that collide with Rust keywords, as `prost` does.
fn rust_ident(ident: String) -> String {
    match ident.as_str() {
        "self" | "super" | "crate" | "extern" => format!("{ident}_"),
        s if KEYWORDS.contains(&s) => format!("r#{ident}"),
        _ => ident,
    }
}
