use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use wirerpc::config::{PoolConfig, ServerConfig};
use wirerpc::engine_core::errors::HandlerError;
use wirerpc::engine_core::models::Request;
use wirerpc::engine_core::traits::Service;
use wirerpc::rpc::{Client, RunningServer, Server};
use wirerpc::services::Calculator;

struct Flaky;

#[async_trait]
impl Service for Flaky {
    fn methods(&self) -> &'static [&'static str] {
        &["fail", "explode", "sleep", "blob"]
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, HandlerError> {
        match method {
            "fail" => Err(HandlerError::new(42, "boom")),
            "explode" => panic!("handler exploded"),
            "blob" => {
                let len = params.first().and_then(Value::as_u64).unwrap_or(0) as usize;
                Ok(json!("x".repeat(len)))
            }
            _ => {
                let ms = params.first().and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(ms))
            }
        }
    }
}

async fn start_server() -> RunningServer {
    let mut server = Server::new(ServerConfig::new("127.0.0.1", 0));
    server.register(Calculator).register(Flaky);
    server.start().await.unwrap()
}

fn client_for(server: &RunningServer, max_open: usize) -> Client {
    let config = PoolConfig::new("127.0.0.1", server.local_addr().port())
        .max_open(max_open)
        .request_timeout(Some(Duration::from_secs(5)));
    Client::connect(config)
}

/// Raw line-oriented peer, to check the exact bytes on the wire.
struct RawPeer {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl RawPeer {
    async fn connect(server: &RunningServer) -> Self {
        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, payload: &str) {
        self.writer.write_all(payload.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("reply within 5s")
            .unwrap();
        line
    }

    async fn recv(&mut self) -> Value {
        serde_json::from_str(&self.recv_line().await).unwrap()
    }
}

#[tokio::test]
async fn test_single_call_exact_reply() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":[1,3],"id":0}"#)
        .await;
    assert_eq!(
        peer.recv_line().await,
        "{\"jsonrpc\":\"2.0\",\"result\":[4],\"id\":0}\n"
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_reply_contains_every_id() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(
        r#"[{"jsonrpc":"2.0","method":"Calculator.sum","params":[1,3],"id":0},{"jsonrpc":"2.0","method":"Calculator.sum","params":[2,3],"id":1}]"#,
    )
    .await;
    let reply = peer.recv().await;
    let items = reply.as_array().expect("batch reply is an array");
    assert_eq!(items.len(), 2);
    for item in items {
        match item["id"].as_i64().unwrap() {
            0 => assert_eq!(item["result"], json!([4])),
            1 => assert_eq!(item["result"], json!([5])),
            other => panic!("unexpected id {other}"),
        }
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_single_element_batch_is_still_a_batch() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(r#"[{"jsonrpc":"2.0","method":"Calculator.sum","params":[2,2],"id":"a"}]"#)
        .await;
    assert_eq!(
        peer.recv().await,
        json!([{"jsonrpc":"2.0","result":[4],"id":"a"}])
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_parse_error_keeps_connection_open() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send("not json").await;
    assert_eq!(
        peer.recv_line().await,
        "{\"jsonrpc\":\"2.0\",\"error\":{\"code\":-32700,\"message\":\"Parse error\"},\"id\":null}\n"
    );

    peer.send(r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":[5],"id":2}"#)
        .await;
    assert_eq!(peer.recv().await["result"], json!([5]));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_method_not_found_and_invalid_request() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(r#"{"jsonrpc":"2.0","method":"Unknown.Op","params":[],"id":3}"#)
        .await;
    let reply = peer.recv().await;
    assert_eq!(
        reply["error"],
        json!({"code": -32601, "message": "Method not found"})
    );
    assert_eq!(reply["id"], json!(3));

    peer.send(r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":{"a":1},"id":4}"#)
        .await;
    let reply = peer.recv().await;
    assert_eq!(reply["error"]["code"], json!(-32600));
    assert_eq!(reply["id"], json!(4));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_is_passed_through() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(r#"{"jsonrpc":"2.0","method":"Flaky.fail","params":[],"id":5}"#)
        .await;
    assert_eq!(
        peer.recv().await,
        json!({"jsonrpc":"2.0","error":{"code":42,"message":"boom"},"id":5})
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panicking_handler_does_not_affect_siblings() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(
        r#"[{"jsonrpc":"2.0","method":"Flaky.explode","params":[],"id":1},{"jsonrpc":"2.0","method":"Calculator.sum","params":[1,1],"id":2}]"#,
    )
    .await;
    let reply = peer.recv().await;
    let items = reply.as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        if item["id"] == json!(1) {
            assert_eq!(item["error"]["code"], json!(-32603));
        } else {
            assert_eq!(item["result"], json!([2]));
        }
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notification_still_gets_a_reply() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":[1,1]}"#)
        .await;
    assert_eq!(
        peer.recv().await,
        json!({"jsonrpc":"2.0","result":[2],"id":null})
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_messages_in_one_segment_are_answered_in_order() {
    let server = start_server().await;
    let mut peer = RawPeer::connect(&server).await;

    peer.send(concat!(
        r#"{"jsonrpc":"2.0","method":"Flaky.sleep","params":[50],"id":1}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":[7],"id":2}"#
    ))
    .await;
    // Payloads of one connection are dispatched one after another
    assert_eq!(peer.recv().await["id"], json!(1));
    assert_eq!(peer.recv().await["id"], json!(2));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_call() {
    let server = start_server().await;
    let client = client_for(&server, 2);

    let response = client
        .call(Request::new("Calculator.sum", vec![json!(1), json!(3)], 0))
        .await
        .unwrap();
    assert_eq!(response.result, Some(vec![json!(4)]));
    assert_eq!(response.id, json!(0));

    let failed = client
        .call(Request::new("Calculator.divide", vec![json!(1), json!(0)], 1))
        .await
        .unwrap();
    assert_eq!(failed.error.unwrap().message, "Division by zero");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_batch_is_aligned_with_requests() {
    let server = start_server().await;
    let client = client_for(&server, 2);

    // Completes in reverse order on the server
    let requests: Vec<Request> = [90u64, 45, 0]
        .iter()
        .enumerate()
        .map(|(i, ms)| Request::new("Flaky.sleep", vec![json!(ms)], i as u64))
        .collect();
    let responses = client.call_multiple(requests).await.unwrap();
    let ids: Vec<Value> = responses.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![json!(0), json!(1), json!(2)]);
    assert_eq!(responses[0].result, Some(vec![json!(90)]));
    assert_eq!(responses[2].result, Some(vec![json!(0)]));

    let unordered = client
        .call_unordered(vec![
            Request::new("Calculator.sum", vec![json!(1)], "x"),
            Request::new("Calculator.sum", vec![json!(2)], "y"),
        ])
        .await
        .unwrap();
    let ids: HashSet<String> = unordered.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, HashSet::from(["\"x\"".to_string(), "\"y\"".to_string()]));

    assert!(client.call_multiple(Vec::new()).await.unwrap().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls_share_a_bounded_pool() {
    let server = start_server().await;
    let client = std::sync::Arc::new(client_for(&server, 2));

    let mut tasks = Vec::new();
    for i in 0..16i64 {
        let client = std::sync::Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let id = client.next_id();
            client
                .call(Request::new("Calculator.sum", vec![json!(i), json!(1)], id))
                .await
                .map(|r| (id, r))
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let (id, response) = task.await.unwrap().unwrap();
        assert_eq!(response.id, json!(id));
        assert_eq!(response.result, Some(vec![json!(i as i64 + 1)]));
    }
    assert_eq!(client.pool().available(), 2);
    assert!(client.pool().idle_count() <= 2);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_connections_and_listener() {
    let server = start_server().await;
    let addr = server.local_addr();
    let mut peer = RawPeer::connect(&server).await;
    peer.send(r#"{"jsonrpc":"2.0","method":"Calculator.sum","params":[1],"id":1}"#)
        .await;
    peer.recv().await;

    server.shutdown().await.unwrap();

    let mut rest = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), peer.reader.read_line(&mut rest))
        .await
        .expect("connection closed after shutdown");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_does_not_wait_for_a_peer_that_stopped_reading() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    for id in 0..32 {
        let request = format!(
            r#"{{"jsonrpc":"2.0","method":"Flaky.blob","params":[1048576],"id":{id}}}"#
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }
    // Half-close and never read the replies
    stream.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(5), server.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown hung on a stalled connection");
    drop(stream);
}

#[tokio::test]
async fn test_client_reports_unreachable_server() {
    let server = start_server().await;
    let client = client_for(&server, 1);
    server.shutdown().await.unwrap();

    let err = client
        .call(Request::new("Calculator.sum", vec![], 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        wirerpc::engine_core::errors::ClientError::Transport(_)
    ));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_reuse_port_allows_a_second_listener() {
    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.reuse_port = true;
    let first = Server::new(config.clone()).start().await.unwrap();

    config.port = first.local_addr().port();
    let second = Server::new(config).start().await.unwrap();
    assert_eq!(first.local_addr(), second.local_addr());

    second.shutdown().await.unwrap();
    first.shutdown().await.unwrap();
}
