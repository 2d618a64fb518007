use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    routing::{get, post},
};
use rs_block_enricher::{
    chains::evm::{client::EvmClient, metadata::MetadataClient, rpc::RpcClient},
    core::{
        error::{FetchError, FetchErrorKind, RpcError},
        types::FetchOutcome,
    },
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// JSON-RPC node that records every request and answers with `reply`.
async fn rpc_node(
    reply: impl Fn(&Value) -> (StatusCode, String) + Clone + Send + Sync + 'static,
) -> (String, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let app = Router::new().route(
        "/",
        post(move |Json(body): Json<Value>| {
            let reply = reply.clone();
            let recorded = Arc::clone(&recorded);
            async move {
                let response = reply(&body);
                recorded.lock().unwrap().push(body);
                response
            }
        }),
    );
    (serve(app).await, seen)
}

fn ok_result(result: Value) -> (StatusCode, String) {
    (
        StatusCode::OK,
        json!({"jsonrpc": "2.0", "id": 0, "result": result}).to_string(),
    )
}

#[tokio::test]
async fn rpc_request_envelope_and_head_parsing() {
    let (url, seen) = rpc_node(|_| ok_result(json!("0x10f6301"))).await;
    let client = EvmClient::new(&url, TIMEOUT).unwrap();

    assert_eq!(client.get_latest_block_number().await.unwrap(), 17785601);

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["jsonrpc"], "2.0");
    assert_eq!(requests[0]["id"], 0);
    assert_eq!(requests[0]["method"], "eth_blockNumber");
    assert_eq!(requests[0]["params"], json!([]));
}

#[tokio::test]
async fn block_lookups_send_hex_height_and_full_tx_flag() {
    let (url, seen) = rpc_node(|_| {
        ok_result(json!({
            "hash": "0xabc",
            "miner": "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
            "extraData": "0x546974616e2028746974616e6275696c6465722e78797a29",
            "timestamp": "0x64c25c4b",
            "transactions": [{"hash": "0x01", "gasPrice": "0x3b9aca00"}]
        }))
    })
    .await;
    let client = EvmClient::new(&url, TIMEOUT).unwrap();

    let header = client.get_header_by_number(17785601).await.unwrap();
    assert_eq!(header.extra_data_text().unwrap(), "Titan (titanbuilder.xyz)");
    let block = client.get_block_by_number(17785601).await.unwrap();
    assert_eq!(block.transactions.len(), 1);

    let requests = seen.lock().unwrap();
    assert_eq!(requests[0]["method"], "eth_getHeaderByNumber");
    assert_eq!(requests[0]["params"], json!(["0x10f6301", true]));
    assert_eq!(requests[1]["method"], "eth_getBlockByNumber");
    assert_eq!(requests[1]["params"], json!(["0x10f6301", true]));
}

#[tokio::test]
async fn rpc_http_error_is_status() {
    let (url, _) = rpc_node(|_| (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())).await;
    let client = EvmClient::new(&url, TIMEOUT).unwrap();

    let err = client.get_latest_block_number().await.unwrap_err();
    assert_eq!(
        err,
        RpcError::Status {
            method: "eth_blockNumber".to_string(),
            status: 500
        }
    );
}

#[tokio::test]
async fn rpc_garbage_body_is_decode_error() {
    let (url, _) = rpc_node(|_| (StatusCode::OK, "<html>not json</html>".to_string())).await;
    let client = EvmClient::new(&url, TIMEOUT).unwrap();

    let err = client.get_latest_block_number().await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Decode);
}

#[tokio::test]
async fn rpc_error_object_is_decode_error() {
    let (url, _) = rpc_node(|_| {
        (
            StatusCode::OK,
            json!({"jsonrpc": "2.0", "id": 0, "error": {"code": -32601, "message": "method not found"}})
                .to_string(),
        )
    })
    .await;
    let rpc = RpcClient::new(&url, TIMEOUT).unwrap();

    let err = rpc.call("eth_getHeaderByNumber", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Decode);
    assert_eq!(err.method(), "eth_getHeaderByNumber");
    assert!(err.to_string().contains("-32601"));
}

#[tokio::test]
async fn unknown_block_is_decode_error() {
    let (url, _) = rpc_node(|_| ok_result(Value::Null)).await;
    let client = EvmClient::new(&url, TIMEOUT).unwrap();

    let err = client.get_block_by_number(99_999_999).await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Decode);
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn unreachable_node_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = EvmClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();
    let err = client.get_latest_block_number().await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Transport);
}

/// Metadata service keyed by block number:
/// 1 → not indexed, 2 → 500, 3 → 404, 4 → bad JSON, anything else → info.
async fn metadata_service() -> String {
    let app = Router::new().route(
        "/blocks/:block",
        get(|Path(block): Path<u64>| async move {
            match block {
                1 => (StatusCode::BAD_REQUEST, "block not processed".to_string()),
                2 => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
                3 => (StatusCode::NOT_FOUND, "gone".to_string()),
                4 => (StatusCode::OK, "{\"block_number\":".to_string()),
                n => (
                    StatusCode::OK,
                    json!({
                        "block_number": n,
                        "builder": "beaverbuild",
                        "block_value": "3.0",
                        "tx_count": "2",
                        "txs": [{"hash": "0x01", "type": "mev", "value": "1.5"}]
                    })
                    .to_string(),
                ),
            }
        }),
    );
    serve(app).await
}

#[tokio::test]
async fn metadata_statuses_map_to_outcomes() {
    let base = metadata_service().await;
    let client = MetadataClient::new(&format!("{base}/blocks/{{block}}"), TIMEOUT).unwrap();

    assert!(client.get_block_info(1).await.is_not_ready());
    assert_eq!(
        client.get_block_info(2).await,
        FetchOutcome::Failure(FetchError::Status(500))
    );
    assert_eq!(
        client.get_block_info(3).await,
        FetchOutcome::Failure(FetchError::Status(404))
    );
    assert!(matches!(
        client.get_block_info(4).await,
        FetchOutcome::Failure(FetchError::Decode(_))
    ));

    match client.get_block_info(17785601).await {
        FetchOutcome::Success(info) => {
            assert_eq!(info.block_number.unwrap().parse_count().unwrap(), 17785601);
            assert_eq!(info.tx_count.unwrap().parse_count().unwrap(), 2);
            assert_eq!(info.builder.as_deref(), Some("beaverbuild"));
            assert_eq!(info.transactions.len(), 1);
            assert_eq!(info.transactions[0].class.as_deref(), Some("mev"));
        }
        other => panic!("expected block info, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_metadata_service_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = MetadataClient::new(&format!("http://{addr}/blocks/{{block}}"), TIMEOUT).unwrap();
    assert!(matches!(
        client.get_block_info(1).await,
        FetchOutcome::Failure(FetchError::Transport(_))
    ));
}
