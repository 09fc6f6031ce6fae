//! # Rendering
//!
//! Turns [`FileBindings`] into Rust source. Each [`CallingShape`] owns exactly one row of the
//! fragment table; a method is rendered by substituting its bindings into the fragments of its
//! row, so what a shape generates can be read off the table below.
use crate::{
    GenerateError,
    config::GeneratorConfig,
    ir::{FileBindings, MethodBinding, ServiceBindings},
    template::{TemplateError, Vars, render},
};
use ferrule_core::{CallingShape, handler::HandlerKind};

/// The fragments generated for one calling shape.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShapeFragments {
    /// Method of the generated client.
    pub client: &'static str,
    /// Companion stream types, for streaming shapes only.
    pub aliases: Option<&'static str>,
    /// Method of the generated server trait.
    pub server: &'static str,
    /// Typed glue between the core adapters and the server trait.
    pub handler: &'static str,
    /// Entry of the procedure builder.
    pub entry: &'static str,
}

const FILE_HEADER: &str = "\
// Code generated by ferrule-gen. DO NOT EDIT.
// source: {{source}}
";

const SERVICE_OPEN: &str = "
/// Fully qualified name of the `{{full_name}}` service.
pub const {{name_const}}: &str = \"{{full_name}}\";

/// Typed client of the `{{full_name}}` service.
#[derive(Debug, Clone)]
pub struct {{service}}Client {
    client: {{core}}::client::Client,
}

impl {{service}}Client {
    pub fn new(config: {{core}}::client::ClientConfig) -> Self {
        Self {
            client: {{core}}::client::Client::new({{name_const}}, config),
        }
    }
";

const UNARY_CLIENT: &str = "
    pub async fn {{method}}(
        &self,
        ctx: &{{core}}::CallContext,
        request: &{{request}},
        options: {{core}}::client::CallOptions,
    ) -> ::std::result::Result<{{response}}, {{core}}::CallError> {
        self.client.call(ctx, \"{{proto_method}}\", request, options).await
    }
";

const ONEWAY_CLIENT: &str = "
    pub async fn {{method}}(
        &self,
        ctx: &{{core}}::CallContext,
        request: &{{request}},
        options: {{core}}::client::CallOptions,
    ) -> ::std::result::Result<{{core}}::Ack, {{core}}::CallError> {
        self.client.call_oneway(ctx, \"{{proto_method}}\", request, options).await
    }
";

const CLIENT_STREAMING_CLIENT: &str = "
    pub async fn {{method}}(
        &self,
        ctx: &{{core}}::CallContext,
        options: {{core}}::client::CallOptions,
    ) -> ::std::result::Result<{{service}}{{camel}}Call, {{core}}::CallError> {
        self.client.client_streaming(ctx, \"{{proto_method}}\", options).await
    }
";

const SERVER_STREAMING_CLIENT: &str = "
    pub async fn {{method}}(
        &self,
        ctx: &{{core}}::CallContext,
        request: &{{request}},
        options: {{core}}::client::CallOptions,
    ) -> ::std::result::Result<{{service}}{{camel}}Call, {{core}}::CallError> {
        self.client
            .server_streaming::<{{request}}, {{response}}>(ctx, \"{{proto_method}}\", request, options)
            .await
    }
";

const BIDI_STREAMING_CLIENT: &str = "
    pub async fn {{method}}(
        &self,
        ctx: &{{core}}::CallContext,
        options: {{core}}::client::CallOptions,
    ) -> ::std::result::Result<{{service}}{{camel}}Call, {{core}}::CallError> {
        self.client.bidi_streaming(ctx, \"{{proto_method}}\", options).await
    }
";

const CLIENT_STREAMING_ALIASES: &str = "
/// Caller side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Call = {{core}}::stream::ClientStreamingCall<{{request}}, {{response}}>;
/// Handler side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Stream<'a> = {{core}}::stream::ClientStreamingRequests<'a, {{request}}>;
";

const SERVER_STREAMING_ALIASES: &str = "
/// Caller side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Call = {{core}}::stream::ServerStreamingCall<{{response}}>;
/// Handler side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Stream<'a> = {{core}}::stream::ServerStreamingResponses<'a, {{response}}>;
";

const BIDI_STREAMING_ALIASES: &str = "
/// Caller side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Call = {{core}}::stream::BidiStreamingCall<{{request}}, {{response}}>;
/// Handler side of `{{full_name}}/{{proto_method}}`.
pub type {{service}}{{camel}}Stream<'a> = {{core}}::stream::BidiStreamingServer<'a, {{request}}, {{response}}>;
";

const SERVER_OPEN: &str = "
/// Business logic of the `{{full_name}}` service.
pub trait {{service}}Server: ::std::marker::Send + ::std::marker::Sync + 'static {";

const UNARY_SERVER: &str = "
    fn {{method}}(
        &self,
        ctx: {{core}}::CallContext,
        request: {{request}},
    ) -> impl ::std::future::Future<Output = ::std::result::Result<{{response}}, {{core}}::CallError>>
    + ::std::marker::Send;
";

const ONEWAY_SERVER: &str = "
    fn {{method}}(
        &self,
        ctx: {{core}}::CallContext,
        request: {{request}},
    ) -> impl ::std::future::Future<Output = ::std::result::Result<(), {{core}}::CallError>>
    + ::std::marker::Send;
";

const CLIENT_STREAMING_SERVER: &str = "
    /// Reads requests until the caller half-closes, then returns the single response.
    fn {{method}}(
        &self,
        requests: {{service}}{{camel}}Stream<'_>,
    ) -> impl ::std::future::Future<Output = ::std::result::Result<{{response}}, {{core}}::CallError>>
    + ::std::marker::Send;
";

const SERVER_STREAMING_SERVER: &str = "
    fn {{method}}(
        &self,
        request: {{request}},
        responses: {{service}}{{camel}}Stream<'_>,
    ) -> impl ::std::future::Future<Output = ::std::result::Result<(), {{core}}::CallError>>
    + ::std::marker::Send;
";

const BIDI_STREAMING_SERVER: &str = "
    fn {{method}}(
        &self,
        stream: {{service}}{{camel}}Stream<'_>,
    ) -> impl ::std::future::Future<Output = ::std::result::Result<(), {{core}}::CallError>>
    + ::std::marker::Send;
";

const UNARY_HANDLER: &str = "
struct {{service}}{{camel}}Handler<S>(::std::sync::Arc<S>);

impl<S: {{service}}Server> {{core}}::handler::UnaryMethod for {{service}}{{camel}}Handler<S> {
    fn call(
        &self,
        ctx: {{core}}::CallContext,
        request: ::std::boxed::Box<dyn {{core}}::codec::AnyMessage>,
    ) -> {{core}}::BoxFuture<
        '_,
        ::std::result::Result<::std::boxed::Box<dyn {{core}}::codec::AnyMessage>, {{core}}::CallError>,
    > {
        ::std::boxed::Box::pin(async move {
            let request = {{core}}::codec::downcast::<{{request}}>(request)?;
            let response = self.0.{{method}}(ctx, request).await?;
            ::std::result::Result::Ok(
                ::std::boxed::Box::new(response) as ::std::boxed::Box<dyn {{core}}::codec::AnyMessage>
            )
        })
    }
}
";

const ONEWAY_HANDLER: &str = "
struct {{service}}{{camel}}Handler<S>(::std::sync::Arc<S>);

impl<S: {{service}}Server> {{core}}::handler::OnewayMethod for {{service}}{{camel}}Handler<S> {
    fn call(
        &self,
        ctx: {{core}}::CallContext,
        request: ::std::boxed::Box<dyn {{core}}::codec::AnyMessage>,
    ) -> {{core}}::BoxFuture<'_, ::std::result::Result<(), {{core}}::CallError>> {
        ::std::boxed::Box::pin(async move {
            let request = {{core}}::codec::downcast::<{{request}}>(request)?;
            self.0.{{method}}(ctx, request).await
        })
    }
}
";

const CLIENT_STREAMING_HANDLER: &str = "
struct {{service}}{{camel}}Handler<S>(::std::sync::Arc<S>);

impl<S: {{service}}Server> {{core}}::handler::StreamMethod for {{service}}{{camel}}Handler<S> {
    fn call<'a>(
        &'a self,
        stream: &'a mut {{core}}::stream::ServerStream,
    ) -> {{core}}::BoxFuture<'a, ::std::result::Result<(), {{core}}::CallError>> {
        ::std::boxed::Box::pin(async move {
            let response = self
                .0
                .{{method}}({{core}}::stream::ClientStreamingRequests::new(&mut *stream))
                .await?;
            stream.send(&response).await
        })
    }
}
";

const SERVER_STREAMING_HANDLER: &str = "
struct {{service}}{{camel}}Handler<S>(::std::sync::Arc<S>);

impl<S: {{service}}Server> {{core}}::handler::StreamMethod for {{service}}{{camel}}Handler<S> {
    fn call<'a>(
        &'a self,
        stream: &'a mut {{core}}::stream::ServerStream,
    ) -> {{core}}::BoxFuture<'a, ::std::result::Result<(), {{core}}::CallError>> {
        ::std::boxed::Box::pin(async move {
            let request = stream.recv_first::<{{request}}>().await?;
            self.0
                .{{method}}(request, {{core}}::stream::ServerStreamingResponses::new(stream))
                .await
        })
    }
}
";

const BIDI_STREAMING_HANDLER: &str = "
struct {{service}}{{camel}}Handler<S>(::std::sync::Arc<S>);

impl<S: {{service}}Server> {{core}}::handler::StreamMethod for {{service}}{{camel}}Handler<S> {
    fn call<'a>(
        &'a self,
        stream: &'a mut {{core}}::stream::ServerStream,
    ) -> {{core}}::BoxFuture<'a, ::std::result::Result<(), {{core}}::CallError>> {
        ::std::boxed::Box::pin(async move {
            self.0
                .{{method}}({{core}}::stream::BidiStreamingServer::new(stream))
                .await
        })
    }
}
";

const PROCEDURES_OPEN: &str = "
/// Expands a `{{full_name}}` server into its procedures, one per method and encoding.
pub fn {{procedures_fn}}<S: {{service}}Server>(
    server: ::std::sync::Arc<S>,
) -> ::std::vec::Vec<{{core}}::registry::Procedure> {
    {{core}}::registry::build_procedures({{core}}::registry::BuildProceduresParams {
        service_name: {{name_const}}.to_string(),
";

const UNARY_ENTRY: &str = "\
            {{core}}::registry::UnaryHandlerEntry {
                method_name: \"{{proto_method}}\".to_string(),
                handler: {{core}}::handler::new_unary_handler({{core}}::handler::UnaryHandlerParams {
                    handle: {{service}}{{camel}}Handler(::std::sync::Arc::clone(&server)),
                    new_request: {{core}}::codec::MessageFactory::of::<{{request}}>(),
                }),
            },
";

const ONEWAY_ENTRY: &str = "\
            {{core}}::registry::OnewayHandlerEntry {
                method_name: \"{{proto_method}}\".to_string(),
                handler: {{core}}::handler::new_oneway_handler({{core}}::handler::OnewayHandlerParams {
                    handle: {{service}}{{camel}}Handler(::std::sync::Arc::clone(&server)),
                    new_request: {{core}}::codec::MessageFactory::of::<{{request}}>(),
                }),
            },
";

const STREAM_ENTRY: &str = "\
            {{core}}::registry::StreamHandlerEntry {
                method_name: \"{{proto_method}}\".to_string(),
                handler: {{core}}::handler::new_stream_handler({{service}}{{camel}}Handler(
                    ::std::sync::Arc::clone(&server),
                )),
            },
";

const DESCRIPTORS_OPEN: &str = "
/// Encoded `FileDescriptorProto` of `{{source}}`, followed by every file it imports.
pub const {{descriptors_const}}: &[&[u8]] = &[
";

/// Returns the fragment row of `shape`.
pub(crate) fn fragments(shape: CallingShape) -> ShapeFragments {
    match shape {
        CallingShape::Unary => ShapeFragments {
            client: UNARY_CLIENT,
            aliases: None,
            server: UNARY_SERVER,
            handler: UNARY_HANDLER,
            entry: UNARY_ENTRY,
        },
        CallingShape::Oneway => ShapeFragments {
            client: ONEWAY_CLIENT,
            aliases: None,
            server: ONEWAY_SERVER,
            handler: ONEWAY_HANDLER,
            entry: ONEWAY_ENTRY,
        },
        CallingShape::ClientStreaming => ShapeFragments {
            client: CLIENT_STREAMING_CLIENT,
            aliases: Some(CLIENT_STREAMING_ALIASES),
            server: CLIENT_STREAMING_SERVER,
            handler: CLIENT_STREAMING_HANDLER,
            entry: STREAM_ENTRY,
        },
        CallingShape::ServerStreaming => ShapeFragments {
            client: SERVER_STREAMING_CLIENT,
            aliases: Some(SERVER_STREAMING_ALIASES),
            server: SERVER_STREAMING_SERVER,
            handler: SERVER_STREAMING_HANDLER,
            entry: STREAM_ENTRY,
        },
        CallingShape::BidiStreaming => ShapeFragments {
            client: BIDI_STREAMING_CLIENT,
            aliases: Some(BIDI_STREAMING_ALIASES),
            server: BIDI_STREAMING_SERVER,
            handler: BIDI_STREAMING_HANDLER,
            entry: STREAM_ENTRY,
        },
    }
}

/// Renders the whole generated file for `file`.
pub(crate) fn render_file(file: &FileBindings, config: &GeneratorConfig) -> Result<String, GenerateError> {
    let mut vars = Vars::new();
    vars.set("source", file.source.as_str())
        .set("core", config.core_path.as_str())
        .set("descriptors_const", file.descriptors_const.as_str());

    let mut out = fragment(FILE_HEADER, &vars, &file.source)?;

    for service in &file.services {
        render_service(&mut out, service, &vars)?;
    }

    if config.emit_descriptors {
        out.push_str(&fragment(DESCRIPTORS_OPEN, &vars, &file.source)?);
        for descriptor in &file.descriptors {
            push_bytes(&mut out, descriptor);
        }
        out.push_str("];\n");
    }

    Ok(out)
}

fn render_service(out: &mut String, service: &ServiceBindings, file_vars: &Vars) -> Result<(), GenerateError> {
    let mut vars = file_vars.clone();
    vars.set("service", service.rust_name.as_str())
        .set("full_name", service.full_name.as_str())
        .set("name_const", service.name_const.as_str())
        .set("procedures_fn", service.procedures_fn.as_str());

    let methods = service
        .methods
        .iter()
        .map(|method| (method, fragments(method.shape), method_vars(&vars, method)))
        .collect::<Vec<_>>();
    let render_method = |template: &str, method: &MethodBinding, vars: &Vars| {
        render(template, vars).map_err(|source| GenerateError::FragmentMismatch {
            fragment: format!("{} method {}/{}", method.shape, service.full_name, method.descriptor.method_name),
            source,
        })
    };

    out.push_str(&fragment(SERVICE_OPEN, &vars, &service.full_name)?);
    for (method, row, vars) in &methods {
        out.push_str(&render_method(row.client, method, vars)?);
    }
    out.push_str("}\n");

    for (method, row, vars) in &methods {
        if let Some(aliases) = row.aliases {
            out.push_str(&render_method(aliases, method, vars)?);
        }
    }

    out.push_str(&fragment(SERVER_OPEN, &vars, &service.full_name)?);
    for (method, row, vars) in &methods {
        out.push_str(&render_method(row.server, method, vars)?);
    }
    out.push_str("}\n");

    for (method, row, vars) in &methods {
        out.push_str(&render_method(row.handler, method, vars)?);
    }

    out.push_str(&fragment(PROCEDURES_OPEN, &vars, &service.full_name)?);
    for (field, kind) in [
        ("unary_handlers", HandlerKind::Unary),
        ("oneway_handlers", HandlerKind::Oneway),
        ("stream_handlers", HandlerKind::Stream),
    ] {
        out.push_str(&format!("        {field}: ::std::vec![\n"));
        for (method, row, vars) in &methods {
            if HandlerKind::for_shape(method.shape) == kind {
                out.push_str(&render_method(row.entry, method, vars)?);
            }
        }
        out.push_str("        ],\n");
    }
    out.push_str("    })\n}\n");

    Ok(())
}

fn method_vars(service_vars: &Vars, method: &MethodBinding) -> Vars {
    let mut vars = service_vars.clone();
    vars.set("method", method.ident.as_str())
        .set("proto_method", method.descriptor.method_name.as_str())
        .set("camel", method.camel.as_str())
        .set("request", method.request.as_str())
        .set("response", method.response.as_str());
    vars
}

fn fragment(template: &str, vars: &Vars, owner: &str) -> Result<String, GenerateError> {
    render(template, vars).map_err(|source: TemplateError| GenerateError::FragmentMismatch {
        fragment: owner.to_string(),
        source,
    })
}

fn push_bytes(out: &mut String, bytes: &[u8]) {
    out.push_str("    &[\n");
    for line in bytes.chunks(16) {
        out.push_str("       ");
        for byte in line {
            out.push_str(&format!(" 0x{byte:02x},"));
        }
        out.push('\n');
    }
    out.push_str("    ],\n");
}
