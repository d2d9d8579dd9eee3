use anyhow::Result;
use rpcwire_client::{ClientError, RpcCall, RpcClient, UnixSocketClientTransport};
use rpcwire_core::config::Framing;
use rpcwire_core::protocols::protocol_for;
use rpcwire_core::{JsonRpcProtocol, MsgPackRpcProtocol, WireFormat};
use rpcwire_server::demo::demo_dispatcher;
use rpcwire_server::{RpcServer, UnixSocketServerTransport};
use serde_json::{json, Map};
use std::path::Path;
use tempfile::TempDir;
use tokio::task::JoinHandle;

fn start_server(socket_path: &Path, format: WireFormat, framing: Framing) -> Result<JoinHandle<()>> {
    let transport = UnixSocketServerTransport::bind(socket_path, framing)?;
    let server = RpcServer::new(transport, protocol_for(format), demo_dispatcher()?);

    Ok(tokio::spawn(async move {
        server.serve_forever().await.unwrap();
    }))
}

async fn wait_for_socket(socket_path: &Path) {
    let mut retries = 0;
    while !socket_path.exists() && retries < 50 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        retries += 1;
    }
    if !socket_path.exists() {
        panic!("Socket was not created");
    }
}

#[tokio::test]
async fn test_jsonrpc_over_unix_socket() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("rpcwire_test.sock");
    let server_handle = start_server(&socket_path, WireFormat::JsonRpc, Framing::Lines)?;
    wait_for_socket(&socket_path).await;

    let client = RpcClient::new(
        JsonRpcProtocol::new(),
        UnixSocketClientTransport::new(&socket_path, Framing::Lines),
    );

    let result = client
        .call("subtract", Some(vec![json!(42), json!(23)]), None, false)
        .await?;
    assert_eq!(result, json!(19));

    let mut kwargs = Map::new();
    kwargs.insert("subtrahend".to_string(), json!(23));
    kwargs.insert("minuend".to_string(), json!(42));
    let result = client.call("subtract", None, Some(kwargs), false).await?;
    assert_eq!(result, json!(19));

    let err = client.call("foobar", None, None, false).await.unwrap_err();
    assert_eq!(err.code(), Some(-32601));

    client.call_one_way("notify_hello", vec![json!(7)]).await?;

    let result = client.call("get_data", None, None, false).await?;
    assert_eq!(result, json!(["hello", 5]));

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_batch_over_unix_socket() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("batch.sock");
    let server_handle = start_server(&socket_path, WireFormat::JsonRpc, Framing::Lines)?;
    wait_for_socket(&socket_path).await;

    let client = RpcClient::new(
        JsonRpcProtocol::new(),
        UnixSocketClientTransport::new(&socket_path, Framing::Lines),
    );

    let results = client
        .batch_call(vec![
            RpcCall::new("sum", vec![json!(1), json!(2), json!(4)]),
            RpcCall::new("notify_hello", vec![json!(7)]).one_way(),
            RpcCall::new("subtract", vec![json!(42), json!(23)]),
            RpcCall::new("foo.get", vec![json!("myself")]),
            RpcCall::new("get_data", vec![]),
        ])
        .await?;

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].as_ref().unwrap(), &json!(7));
    assert_eq!(results[1].as_ref().unwrap(), &json!(null));
    assert_eq!(results[2].as_ref().unwrap(), &json!(19));
    assert!(matches!(
        results[3],
        Err(ClientError::Rpc { code: -32601, .. })
    ));
    assert_eq!(results[4].as_ref().unwrap(), &json!(["hello", 5]));

    // nothing comes back for an all-notification batch, and the connection
    // stays usable
    let results = client
        .batch_call(vec![
            RpcCall::new("notify_hello", vec![json!(1)]).one_way(),
            RpcCall::new("notify_hello", vec![json!(2)]).one_way(),
        ])
        .await?;
    assert_eq!(results.len(), 2);
    assert_eq!(client.call("sum", Some(vec![json!(1)]), None, false).await?, json!(1));

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_msgpackrpc_over_unix_socket() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("msgpack.sock");
    let server_handle =
        start_server(&socket_path, WireFormat::MsgPackRpc, Framing::LengthDelimited)?;
    wait_for_socket(&socket_path).await;

    let client = RpcClient::new(
        MsgPackRpcProtocol::new(),
        UnixSocketClientTransport::new(&socket_path, Framing::LengthDelimited),
    );

    let result = client
        .call("subtract", Some(vec![json!(42), json!(23)]), None, false)
        .await?;
    assert_eq!(result, json!(19));

    let math = client.get_proxy("math.", false);
    assert_eq!(math.call("multiply", vec![json!(6), json!(7)]).await?, json!(42));

    let err = math
        .call("divide", vec![json!(1), json!(0)])
        .await
        .unwrap_err();
    match err {
        ClientError::Rpc { code, message, data } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "Division by zero");
            assert_eq!(data, None);
        }
        other => panic!("Expected RPC error, got {:?}", other),
    }

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_concurrent_clients() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("concurrent.sock");
    let server_handle = start_server(&socket_path, WireFormat::JsonRpc, Framing::Lines)?;
    wait_for_socket(&socket_path).await;

    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let socket_path = socket_path.clone();
        tasks.push(tokio::spawn(async move {
            let client = RpcClient::new(
                JsonRpcProtocol::new(),
                UnixSocketClientTransport::new(&socket_path, Framing::Lines),
            );
            // earlier clients sleep longer, so they finish last
            client
                .call("sleep", Some(vec![json!((8 - i) * 10)]), None, false)
                .await?;
            client.call("sum", Some(vec![json!(i), json!(i)]), None, false).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await??, json!(2 * i as i64));
    }

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_rejects_wrong_protocol_bytes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("mixed.sock");
    let server_handle =
        start_server(&socket_path, WireFormat::MsgPackRpc, Framing::LengthDelimited)?;
    wait_for_socket(&socket_path).await;

    // JSON text sent to a MessagePack server is answered with a parse error
    let client = RpcClient::new(
        JsonRpcProtocol::new(),
        UnixSocketClientTransport::new(&socket_path, Framing::LengthDelimited),
    );
    let err = client.call("sum", None, None, false).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidReply(_)));

    server_handle.abort();
    Ok(())
}
