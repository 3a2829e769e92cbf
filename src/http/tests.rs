use super::protocol::{HttpConnection, HttpProtocolError};
use super::response::HttpResponse;
use http::{StatusCode, Version};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

const MAX_HEADER_SIZE: usize = 1024;
const MAX_BODY_SIZE: usize = 64;

fn connection() -> (HttpConnection<DuplexStream>, DuplexStream) {
    let (server, client) = duplex(16 * 1024);
    (
        HttpConnection::with_limits(server, MAX_HEADER_SIZE, MAX_BODY_SIZE),
        client,
    )
}

#[tokio::test]
async fn test_parse_simple_get() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"get /hello?x=1&y=two HTTP/1.1\r\nHost: localhost:3003\r\nX-Test: abc\r\n\r\n")
        .await
        .unwrap();

    let parsed = conn.read_request().await.unwrap().unwrap();
    let request = parsed.request;

    assert!(parsed.keep_alive);
    assert_eq!(request.method, "GET");
    assert_eq!(request.host, "localhost");
    assert_eq!(request.path, "/hello");
    assert_eq!(request.queries["x"], "1");
    assert_eq!(request.queries["y"], "two");
    assert_eq!(request.header("x-test"), Some("abc"));
    assert_eq!(request.version, Version::HTTP_11);
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_content_length_body() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST /submit HTTP/1.1\r\nHost: h\r\nContent-Length: 11\r\n\r\nhello world")
        .await
        .unwrap();

    let request = conn.read_request().await.unwrap().unwrap().request;
    assert_eq!(&request.body[..], b"hello world");
}

#[tokio::test]
async fn test_body_split_across_reads() {
    let (mut conn, mut client) = connection();
    let reader = tokio::spawn(async move { conn.read_request().await });

    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 6\r\n\r\nabc")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    client.write_all(b"def").await.unwrap();

    let request = reader.await.unwrap().unwrap().unwrap().request;
    assert_eq!(&request.body[..], b"abcdef");
}

#[tokio::test]
async fn test_chunked_body() {
    let (mut conn, mut client) = connection();
    client
        .write_all(
            b"POST /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
              5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n",
        )
        .await
        .unwrap();

    let request = conn.read_request().await.unwrap().unwrap().request;
    assert_eq!(&request.body[..], b"hello world");
}

#[tokio::test]
async fn test_pipelined_requests() {
    let (mut conn, mut client) = connection();
    client
        .write_all(
            b"POST /one HTTP/1.1\r\nContent-Length: 1\r\n\r\nAGET /two HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();

    let first = conn.read_request().await.unwrap().unwrap().request;
    assert_eq!(first.path, "/one");
    assert_eq!(&first.body[..], b"A");
    assert!(conn.has_buffered_data());

    let second = conn.read_request().await.unwrap().unwrap().request;
    assert_eq!(second.method, "GET");
    assert_eq!(second.path, "/two");
}

#[tokio::test]
async fn test_clean_close_between_requests() {
    let (mut conn, client) = connection();
    drop(client);

    assert!(conn.read_request().await.unwrap().is_none());
}

#[tokio::test]
async fn test_truncated_request() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab")
        .await
        .unwrap();
    drop(client);

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::IncompleteRequest));
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_declared_body_over_limit() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 65\r\n\r\n")
        .await
        .unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::BodyTooLarge(_)));
    assert_eq!(err.status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
}

#[tokio::test]
async fn test_chunked_body_over_limit() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n40\r\n")
        .await
        .unwrap();
    client.write_all(&[b'a'; 64]).await.unwrap();
    client.write_all(b"\r\n1\r\n").await.unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::BodyTooLarge(_)));
}

#[tokio::test]
async fn test_oversized_head() {
    let (mut conn, mut client) = connection();
    let filler = "a".repeat(MAX_HEADER_SIZE);
    client
        .write_all(format!("GET / HTTP/1.1\r\nX-Filler: {filler}\r\n").as_bytes())
        .await
        .unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::HeadersTooLarge));
    assert_eq!(err.status(), Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
}

#[tokio::test]
async fn test_conflicting_content_length() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab")
        .await
        .unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_unknown_transfer_coding() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip, chunked\r\n\r\n")
        .await
        .unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_IMPLEMENTED));
}

#[tokio::test]
async fn test_garbage_request_line() {
    let (mut conn, mut client) = connection();
    client.write_all(b"\x01\x02 nonsense\r\n\r\n").await.unwrap();

    let err = conn.read_request().await.unwrap_err();
    assert!(matches!(err, HttpProtocolError::HttpParse(_)));
}

#[tokio::test]
async fn test_expect_continue() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"PUT /up HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\n")
        .await
        .unwrap();
    let reader = tokio::spawn(async move { conn.read_request().await });

    let mut interim = [0u8; 25];
    client.read_exact(&mut interim).await.unwrap();
    assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

    client.write_all(b"ok").await.unwrap();
    let request = reader.await.unwrap().unwrap().unwrap().request;
    assert_eq!(&request.body[..], b"ok");
}

#[tokio::test]
async fn test_connection_persistence_rules() {
    let cases: [(&[u8], bool); 4] = [
        (b"GET / HTTP/1.1\r\n\r\n", true),
        (b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n", false),
        (b"GET / HTTP/1.0\r\n\r\n", false),
        (b"GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n", true),
    ];

    for (raw, expected) in cases {
        let (mut conn, mut client) = connection();
        client.write_all(raw).await.unwrap();
        let parsed = conn.read_request().await.unwrap().unwrap();
        assert_eq!(parsed.keep_alive, expected, "{}", String::from_utf8_lossy(raw));
    }
}

#[tokio::test]
async fn test_absolute_form_supplies_host() {
    let (mut conn, mut client) = connection();
    client
        .write_all(b"GET http://example.org:8080/p?q=1 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let request = conn.read_request().await.unwrap().unwrap().request;
    assert_eq!(request.host, "example.org");
    assert_eq!(request.path, "/p");
    assert_eq!(request.queries["q"], "1");
}

#[tokio::test]
async fn test_write_response() {
    let (mut conn, mut client) = connection();
    let response = HttpResponse::new(StatusCode::OK).with_body("hi");

    conn.write_response(&response, false, false).await.unwrap();
    drop(conn);

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.ends_with("\r\n\r\nhi"));
}
