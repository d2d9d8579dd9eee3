//! JSON-RPC 2.0 wire behaviour, following the examples of the JSON-RPC 2.0
//! specification.

use rpcwire_core::{
    BatchRequest, CodedError, ErrorCode, JsonRpcProtocol, ParsedRequest, Request, RequestId,
    Response, RpcError, RpcProtocol,
};
use serde_json::{json, Map, Value};

fn parse(data: &str) -> Result<ParsedRequest, RpcError> {
    JsonRpcProtocol::new().parse_request(data.as_bytes())
}

fn single(data: &str) -> Request {
    match parse(data).unwrap() {
        ParsedRequest::Single(request) => request,
        other => panic!("Expected single request, got {:?}", other),
    }
}

fn batch(data: &str) -> BatchRequest {
    match parse(data).unwrap() {
        ParsedRequest::Batch(batch) => batch,
        other => panic!("Expected batch, got {:?}", other),
    }
}

fn to_json(response: &Response) -> Value {
    serde_json::from_slice(&response.serialize().unwrap()).unwrap()
}

#[test]
fn test_positional_parameters() {
    let req = single(r#"{"jsonrpc": "2.0", "method": "subtract", "params": [42, 23], "id": 1}"#);
    assert_eq!(req.method, "subtract");
    assert_eq!(req.args(), &[json!(42), json!(23)]);
    assert_eq!(req.unique_id, Some(RequestId::Number(1)));

    let reply = req.respond(json!(19)).unwrap();
    assert_eq!(to_json(&reply), json!({"jsonrpc": "2.0", "result": 19, "id": 1}));

    let req = single(r#"{"jsonrpc": "2.0", "method": "subtract", "params": [23, 42], "id": 2}"#);
    let reply = req.respond(json!(-19)).unwrap();
    assert_eq!(to_json(&reply), json!({"jsonrpc": "2.0", "result": -19, "id": 2}));
}

#[test]
fn test_named_parameters() {
    let req = single(
        r#"{"jsonrpc": "2.0", "method": "subtract", "params": {"subtrahend": 23, "minuend": 42}, "id": 4}"#,
    );
    let kwargs = req.kwargs().unwrap();
    assert_eq!(kwargs["subtrahend"], json!(23));
    assert_eq!(kwargs["minuend"], json!(42));

    let reply = req.respond(json!(19)).unwrap();
    assert_eq!(to_json(&reply), json!({"jsonrpc": "2.0", "result": 19, "id": 4}));
}

#[test]
fn test_notification() {
    let req = single(r#"{"jsonrpc": "2.0", "method": "update", "params": [1, 2, 3, 4, 5]}"#);
    assert!(req.one_way);
    assert!(req.respond(json!(true)).is_none());
    assert!(req.error_respond(&RpcError::internal_error()).is_none());

    let req = single(r#"{"jsonrpc": "2.0", "method": "foobar"}"#);
    assert!(req.one_way);
    assert!(req.args().is_empty());
}

#[test]
fn test_parse_error() {
    let err = parse(r#"{"jsonrpc": "2.0", "method": "foobar, "params": "bar", "baz]"#).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ParseError);
    assert_eq!(
        to_json(&err.error_respond()),
        json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null})
    );
}

#[test]
fn test_invalid_request_object() {
    let err = parse(r#"{"jsonrpc": "2.0", "method": 1, "params": "bar"}"#).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    assert_eq!(
        to_json(&err.error_respond()),
        json!({"jsonrpc": "2.0", "error": {"code": -32600, "message": "Invalid Request"}, "id": null})
    );
}

#[test]
fn test_invalid_request_keeps_readable_id() {
    let err = parse(r#"{"jsonrpc": "2.0", "id": 42, "method": 1}"#).unwrap_err();
    assert_eq!(to_json(&err.error_respond())["id"], json!(42));
}

#[test]
fn test_unsigned_id_is_echoed() {
    let req = single(r#"{"jsonrpc": "2.0", "method": "m", "id": 18446744073709551615}"#);
    assert_eq!(req.unique_id, Some(RequestId::Unsigned(u64::MAX)));

    let reply = req.respond(json!(1)).unwrap();
    assert_eq!(
        to_json(&reply),
        json!({"jsonrpc": "2.0", "result": 1, "id": 18446744073709551615u64})
    );

    let reply = JsonRpcProtocol::new()
        .parse_reply(br#"{"jsonrpc": "2.0", "result": 1, "id": 18446744073709551615}"#)
        .unwrap();
    assert_eq!(reply.unique_id(), Some(&RequestId::Unsigned(u64::MAX)));
}

#[test]
fn test_non_integer_ids_are_invalid() {
    for id in ["1.5", "true", "[1]", "{}"] {
        let data = format!(r#"{{"jsonrpc": "2.0", "method": "m", "id": {}}}"#, id);
        let err = parse(&data).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest, "{}", id);
    }
}

#[test]
fn test_empty_method_is_invalid() {
    let err = parse(r#"{"jsonrpc": "2.0", "method": "", "id": 1}"#).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    assert_eq!(
        to_json(&err.error_respond()),
        json!({"jsonrpc": "2.0", "error": {"code": -32600, "message": "Invalid Request"}, "id": 1})
    );

    let batch = batch(r#"[{"jsonrpc": "2.0", "method": "", "id": 2}, {"jsonrpc": "2.0", "method": "a", "id": 3}]"#);
    assert!(batch[0].is_err());
    assert!(batch[1].is_ok());

    let mut prot = JsonRpcProtocol::new();
    assert!(matches!(
        prot.create_request("", None, None, false),
        Err(rpcwire_core::Error::InvalidRequest(_))
    ));
}

#[test]
fn test_missing_version() {
    let err = parse(r#"{"method": "subtract", "params": [42, 23], "id": 1}"#).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
}

#[test]
fn test_invalid_params_type() {
    let err = parse(r#"{"jsonrpc": "2.0", "method": "update", "params": 9, "id": 2}"#).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidParams);
    assert_eq!(
        to_json(&err.error_respond()),
        json!({"jsonrpc": "2.0", "error": {"code": -32602, "message": "Invalid params"}, "id": 2})
    );
}

#[test]
fn test_batch_invalid_json() {
    let err = parse(
        r#"[{"jsonrpc": "2.0", "method": "sum", "params": [1,2,4], "id": "1"},{"jsonrpc": "2.0", "method""#,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ParseError);
}

#[test]
fn test_empty_batch() {
    let err = parse("[]").unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    assert_eq!(
        to_json(&err.error_respond()),
        json!({"jsonrpc": "2.0", "error": {"code": -32600, "message": "Invalid Request"}, "id": null})
    );
}

#[test]
fn test_invalid_batch_elements() {
    let single_bad = batch("[1]");
    assert_eq!(single_bad.len(), 1);

    let all_bad = batch("[1, 2, 3]");
    assert_eq!(all_bad.len(), 3);

    let mut response = all_bad.create_batch_response().unwrap();
    for item in all_bad.iter() {
        let err = item.as_ref().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
        response.push(Some(err.error_respond()));
    }

    let wire: Value = serde_json::from_slice(&response.serialize().unwrap()).unwrap();
    let expected = json!({"jsonrpc": "2.0", "error": {"code": -32600, "message": "Invalid Request"}, "id": null});
    assert_eq!(wire, json!([expected, expected, expected]));
}

#[test]
fn test_mixed_batch() {
    let requests = batch(
        r#"[
            {"jsonrpc": "2.0", "method": "sum", "params": [1,2,4], "id": "1"},
            {"jsonrpc": "2.0", "method": "notify_hello", "params": [7]},
            {"jsonrpc": "2.0", "method": "subtract", "params": [42,23], "id": "2"},
            {"foo": "boo"},
            {"jsonrpc": "2.0", "method": "foo.get", "params": {"name": "myself"}, "id": "5"},
            {"jsonrpc": "2.0", "method": "get_data", "id": "9"}
        ]"#,
    );
    assert_eq!(requests.len(), 6);

    for (index, item) in requests.iter().enumerate() {
        if index == 3 {
            assert_eq!(
                item.as_ref().unwrap_err().error_code(),
                ErrorCode::InvalidRequest
            );
        } else {
            assert!(item.is_ok());
        }
    }

    let results = [
        json!(7),
        Value::Null,
        json!(19),
        Value::Null,
        Value::Null,
        json!(["hello", 5]),
    ];

    let mut response = requests.create_batch_response().unwrap();
    for (index, item) in requests.iter().enumerate() {
        match item {
            Ok(request) if request.method == "foo.get" => {
                response.push(request.error_respond(&RpcError::method_not_found()))
            }
            Ok(request) => response.push(request.respond(results[index].clone())),
            Err(err) => response.push(Some(err.error_respond())),
        }
    }
    assert_eq!(response.len(), 6);

    let wire: Value = serde_json::from_slice(&response.serialize().unwrap()).unwrap();
    assert_eq!(
        wire,
        json!([
            {"jsonrpc": "2.0", "result": 7, "id": "1"},
            {"jsonrpc": "2.0", "result": 19, "id": "2"},
            {"jsonrpc": "2.0", "error": {"code": -32600, "message": "Invalid Request"}, "id": null},
            {"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": "5"},
            {"jsonrpc": "2.0", "result": ["hello", 5], "id": "9"}
        ])
    );
}

#[test]
fn test_batch_of_notifications() {
    let requests = batch(
        r#"[
            {"jsonrpc": "2.0", "method": "notify_sum", "params": [1,2,4]},
            {"jsonrpc": "2.0", "method": "notify_hello", "params": [7]}
        ]"#,
    );
    assert!(!requests.expects_response());
    assert!(requests.create_batch_response().is_none());
}

#[test]
fn test_error_code_table() {
    let table = [
        (RpcError::parse_error(), -32700, "Parse error"),
        (RpcError::invalid_request(), -32600, "Invalid Request"),
        (RpcError::method_not_found(), -32601, "Method not found"),
        (RpcError::invalid_params(), -32602, "Invalid params"),
        (RpcError::internal_error(), -32603, "Internal error"),
    ];

    for (error, code, message) in table {
        let wire = to_json(&error.error_respond());
        assert_eq!(wire["error"]["code"], json!(code));
        assert_eq!(wire["error"]["message"], json!(message));
    }
}

#[test]
fn test_server_error_passthrough() {
    let req = single(r#"{"jsonrpc": "2.0", "method": "boom", "id": 3}"#);

    let err: RpcError = ("msg", json!({"pi": 3.14})).into();
    let wire = to_json(&req.error_respond(&err).unwrap());
    assert_eq!(wire["error"]["code"], json!(-32000));
    assert_eq!(wire["error"]["message"], json!("msg"));
    assert_eq!(wire["error"]["data"], json!({"pi": 3.14}));

    let wire = to_json(&req.error_respond("plain failure").unwrap());
    assert_eq!(wire["error"]["message"], json!("plain failure"));
    assert!(wire["error"].get("data").is_none());
}

#[test]
fn test_custom_message_overrides_default() {
    let req = single(r#"{"jsonrpc": "2.0", "method": "x", "id": 1}"#);
    let err = RpcError::method_not_found().with_message("No such thing: x");
    let wire = to_json(&req.error_respond(&err).unwrap());
    assert_eq!(wire["error"]["code"], json!(-32601));
    assert_eq!(wire["error"]["message"], json!("No such thing: x"));
}

#[test]
fn test_create_request_round_trip() {
    let mut prot = JsonRpcProtocol::new();

    let req = prot
        .create_request("subtract", Some(vec![json!(42), json!(23)]), None, false)
        .unwrap();
    let parsed = single(std::str::from_utf8(&req.serialize().unwrap()).unwrap());
    assert_eq!(parsed, req);

    let mut kwargs = Map::new();
    kwargs.insert("a".to_string(), json!([1, 2]));
    let req = prot.create_request("foo", None, Some(kwargs), false).unwrap();
    let parsed = single(std::str::from_utf8(&req.serialize().unwrap()).unwrap());
    assert_eq!(parsed, req);
}

#[test]
fn test_one_way_request_has_no_id() {
    let mut prot = JsonRpcProtocol::new();
    let req = prot.create_request("update", None, None, true).unwrap();
    let wire: Value = serde_json::from_slice(&req.serialize().unwrap()).unwrap();
    assert_eq!(wire, json!({"jsonrpc": "2.0", "method": "update"}));
    assert!(req.respond(json!(1)).is_none());
}

#[test]
fn test_ids_are_unique_per_instance() {
    let mut prot = JsonRpcProtocol::new();
    let first = prot.create_request("a", None, None, false).unwrap();
    let second = prot.create_request("a", None, None, false).unwrap();
    assert_eq!(first.unique_id, Some(RequestId::Number(1)));
    assert_eq!(second.unique_id, Some(RequestId::Number(2)));
}

#[test]
fn test_args_and_kwargs_are_exclusive() {
    let mut prot = JsonRpcProtocol::new();
    let mut kwargs = Map::new();
    kwargs.insert("a".to_string(), json!(1));
    assert!(prot
        .create_request("m", Some(vec![json!(1)]), Some(kwargs), false)
        .is_err());
}

#[test]
fn test_batch_request_serialization() {
    let mut prot = JsonRpcProtocol::new();
    let requests = vec![
        prot.create_request("sum", Some(vec![json!(1), json!(2)]), None, false)
            .unwrap(),
        prot.create_request("notify", None, None, true).unwrap(),
    ];
    let batch = prot.create_batch_request(requests).unwrap();

    let wire: Value = serde_json::from_slice(&batch.serialize().unwrap()).unwrap();
    assert_eq!(
        wire,
        json!([
            {"jsonrpc": "2.0", "method": "sum", "params": [1, 2], "id": 1},
            {"jsonrpc": "2.0", "method": "notify"}
        ])
    );
}

#[test]
fn test_parse_success_reply() {
    let mut prot = JsonRpcProtocol::new();
    match prot
        .parse_reply(br#"{"jsonrpc": "2.0", "result": 19, "id": 1}"#)
        .unwrap()
    {
        Response::Success(success) => {
            assert_eq!(success.result, json!(19));
            assert_eq!(success.unique_id, RequestId::Number(1));
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[test]
fn test_parse_error_reply_round_trips_bytes() {
    let mut prot = JsonRpcProtocol::new();
    let data = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"msg","data":{"pi":3.14}}}"#;
    let reply = prot.parse_reply(data).unwrap();

    match &reply {
        Response::Error(error) => {
            assert_eq!(error.code, -32000);
            assert_eq!(error.message, "msg");
            assert_eq!(error.data, Some(json!({"pi": 3.14})));
        }
        other => panic!("Expected error, got {:?}", other),
    }
    assert_eq!(reply.serialize().unwrap(), data.to_vec());
}

#[test]
fn test_invalid_replies() {
    let mut prot = JsonRpcProtocol::new();
    for data in [
        r#"garbage"#,
        r#"[1]"#,
        r#"{"result": 1, "id": 1}"#,
        r#"{"jsonrpc": "1.0", "result": 1, "id": 1}"#,
        r#"{"jsonrpc": "2.0", "result": 1}"#,
        r#"{"jsonrpc": "2.0", "result": 1, "id": 1, "extra": true}"#,
        r#"{"jsonrpc": "2.0", "error": {"code": "x", "message": "y"}, "id": 1}"#,
        r#"{"jsonrpc": "2.0", "error": {"code": 1, "message": 2}, "id": 1}"#,
    ] {
        assert!(prot.parse_reply(data.as_bytes()).is_err(), "{}", data);
    }
}

#[test]
fn test_reply_message_code_lookup() {
    let mut prot = JsonRpcProtocol::new();
    let reply = prot
        .parse_reply(
            br#"{"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": "1"}"#,
        )
        .unwrap();
    match reply {
        Response::Error(error) => assert_eq!(error.error_code(), ErrorCode::MethodNotFound),
        other => panic!("Expected error, got {:?}", other),
    }
}

#[test]
fn test_coded_error_default_data() {
    let err = RpcError::custom(-32050, "quota");
    assert_eq!(err.code(), -32050);
    assert_eq!(err.data(), None);
}
