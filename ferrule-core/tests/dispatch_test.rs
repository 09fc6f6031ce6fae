use ferrule_core::{
    CallContext, CallError, Encoding, ErrorKind, Headers, Request,
    client::CallOptions,
    codec::MessageFactory,
    handler::{HandlerKind, UnaryHandlerParams, new_unary_handler, unary_fn},
    registry::{
        BuildProceduresParams, ProcedureKey, ProcedureRegistry, RegistryError, UnaryHandlerEntry,
        build_procedures,
    },
};
use keyvalue_impl::{
    GetValueRequest, GetValueResponse, KeyNotFound, SERVICE, SetValueRequest, SetValueResponse,
    client, dispatcher, init_tracing, procedures, store_with,
};
use std::time::Duration;


fn request(method: &str, encoding: &str, body: Vec<u8>) -> Request {
    Request {
        caller: "tests".to_string(),
        service: SERVICE.to_string(),
        method: method.to_string(),
        encoding: encoding.to_string(),
        headers: Headers::new(),
        body: body.into(),
    }
}

#[tokio::test]
async fn test_get_value_under_every_registered_encoding() {
    init_tracing();
    let dispatcher = dispatcher(store_with(&[("foo", "bar")]));

    let json = request("GetValue", "json", br#"{"key":"foo"}"#.to_vec());
    let response = dispatcher
        .dispatch_unary(CallContext::new(), json)
        .await
        .unwrap();
    let decoded: GetValueResponse = Encoding::Json.decode(&response.body).unwrap();
    assert_eq!(decoded.value, "bar");

    let body = Encoding::Proto
        .encode(&GetValueRequest {
            key: "foo".to_string(),
        })
        .unwrap();
    let proto = request("GetValue", "proto", body.to_vec());
    let response = dispatcher
        .dispatch_unary(CallContext::new(), proto)
        .await
        .unwrap();
    let decoded: GetValueResponse = Encoding::Proto.decode(&response.body).unwrap();
    assert_eq!(decoded.value, "bar");
}

#[tokio::test]
async fn test_unregistered_encoding_is_not_found() {
    let dispatcher = dispatcher(store_with(&[("foo", "bar")]));

    let xml = request("GetValue", "xml", b"<key>foo</key>".to_vec());
    let err = dispatcher
        .dispatch_unary(CallContext::new(), xml)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unroutable);
    match err {
        CallError::ProcedureNotFound(key) => {
            assert_eq!(key, ProcedureKey::new(SERVICE, "GetValue", "xml"))
        }
        other => panic!("Expected ProcedureNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_of_the_wrong_kind_is_rejected() {
    let dispatcher = dispatcher(store_with(&[]));

    let err = dispatcher
        .dispatch_unary(CallContext::new(), request("Watch", "json", Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::UnexpectedHandler {
            expected: HandlerKind::Unary,
            actual: HandlerKind::Stream,
            ..
        }
    ));
}

#[test]
fn test_registering_a_service_twice_fails() {
    let store = store_with(&[]);
    let mut registry = ProcedureRegistry::new();
    registry.register_all(procedures(store.clone())).unwrap();

    // 2 unary + 1 oneway + 3 stream handlers, under 2 encodings each
    assert_eq!(registry.len(), 12);

    let err = registry.register_all(procedures(store)).unwrap_err();
    let RegistryError::DuplicateRegistration(key) = err;
    assert_eq!(key, ProcedureKey::new(SERVICE, "GetValue", "proto"));
}

#[tokio::test]
async fn test_client_round_trip_under_every_encoding() {
    let store = store_with(&[]);

    for encoding in Encoding::ALL {
        let client = client(dispatcher(store.clone()), |config| {
            config.with_encoding(encoding).with_caller("kv-tests")
        });
        let ctx = CallContext::new().with_timeout(Duration::from_secs(5));

        let _: SetValueResponse = client
            .call(
                &ctx,
                "SetValue",
                &SetValueRequest {
                    key: encoding.name().to_string(),
                    value: "stored".to_string(),
                },
                CallOptions::default(),
            )
            .await
            .unwrap();

        let response: GetValueResponse = client
            .call(
                &ctx,
                "GetValue",
                &GetValueRequest {
                    key: encoding.name().to_string(),
                },
                CallOptions::default().with_header("trace-id", "1"),
            )
            .await
            .unwrap();
        assert_eq!(response.value, "stored");
    }
}

#[tokio::test]
async fn test_application_error_reaches_the_caller_with_details() {
    let client = client(dispatcher(store_with(&[])), |config| {
        config.with_encoding(Encoding::Json)
    });

    let result = client
        .call::<_, GetValueResponse>(
            &CallContext::new(),
            "GetValue",
            &GetValueRequest {
                key: "missing".to_string(),
            },
            CallOptions::default(),
        )
        .await;

    match result {
        Err(CallError::Application(err)) => {
            assert_eq!(err.name(), "NotFound");
            assert_eq!(err.message(), "no value for 'missing'");
            assert_eq!(
                err.details::<KeyNotFound>().unwrap(),
                Some(KeyNotFound {
                    key: "missing".to_string()
                })
            );
        }
        other => panic!("Expected an application error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oneway_call_is_acknowledged_and_served() {
    let store = store_with(&[("foo", "bar")]);
    let client = client(dispatcher(store.clone()), |config| config);

    client
        .call_oneway(
            &CallContext::new(),
            "Forget",
            &GetValueRequest {
                key: "foo".to_string(),
            },
            CallOptions::default(),
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while store.lock().unwrap().contains_key("foo") {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("Oneway handler never ran");
}

#[tokio::test]
async fn test_oneway_call_to_an_unknown_method_is_unroutable() {
    let client = client(dispatcher(store_with(&[])), |config| config);

    let err = client
        .call_oneway(
            &CallContext::new(),
            "Vanish",
            &GetValueRequest::default(),
            CallOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unroutable);
    match err {
        CallError::ProcedureNotFound(key) => {
            assert_eq!(key, ProcedureKey::new(SERVICE, "Vanish", "proto"))
        }
        other => panic!("Expected ProcedureNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oneway_call_to_a_unary_method_is_rejected_before_the_ack() {
    let store = store_with(&[("foo", "bar")]);
    let client = client(dispatcher(store.clone()), |config| config);

    let err = client
        .call_oneway(
            &CallContext::new(),
            "SetValue",
            &SetValueRequest {
                key: "foo".to_string(),
                value: "baz".to_string(),
            },
            CallOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::UnexpectedHandler {
            expected: HandlerKind::Oneway,
            actual: HandlerKind::Unary,
            ..
        }
    ));
    assert_eq!(store.lock().unwrap().get("foo").map(String::as_str), Some("bar"));
}

#[tokio::test]
async fn test_json_body_may_omit_default_fields() {
    let store = store_with(&[("foo", "bar")]);
    let dispatcher = dispatcher(store.clone());

    let set = request("SetValue", "json", br#"{"key":"foo"}"#.to_vec());
    let response = dispatcher
        .dispatch_unary(CallContext::new(), set)
        .await
        .unwrap();

    assert!(!response.application_error);
    assert_eq!(store.lock().unwrap().get("foo").map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_mismatched_request_factory_is_a_cast_error() {
    let handler = new_unary_handler(UnaryHandlerParams {
        handle: unary_fn(|_ctx: CallContext, request: GetValueRequest| async move {
            Ok::<_, CallError>(GetValueResponse { value: request.key })
        }),
        new_request: MessageFactory::of::<SetValueRequest>(),
    });
    let mut params = BuildProceduresParams::new(SERVICE);
    params.unary_handlers.push(UnaryHandlerEntry {
        method_name: "GetValue".to_string(),
        handler,
    });
    let mut registry = ProcedureRegistry::new();
    registry.register_all(build_procedures(params)).unwrap();
    let dispatcher = ferrule_core::dispatch::Dispatcher::new(registry.seal());
    let body = SetValueRequest {
        key: "foo".to_string(),
        value: "bar".to_string(),
    };

    for encoding in Encoding::ALL {
        let bytes = encoding.encode(&body).unwrap();
        let err = dispatcher
            .dispatch_unary(
                CallContext::new(),
                request("GetValue", encoding.name(), bytes.to_vec()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_retryable());
        match err {
            CallError::Cast(cast) => {
                assert_eq!(cast.expected, std::any::type_name::<GetValueRequest>());
                assert_eq!(cast.actual, std::any::type_name::<SetValueRequest>());
            }
            other => panic!("Expected a cast error under {encoding}, got {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unary_call_honours_the_deadline() {
    let client = client(dispatcher(store_with(&[])), |config| config);
    let ctx = CallContext::new().with_timeout(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = client
        .call::<_, GetValueResponse>(
            &ctx,
            "GetValue",
            &GetValueRequest::default(),
            CallOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}
