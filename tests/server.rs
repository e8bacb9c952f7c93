use futures::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use trailhead::{Body, Router, Server};

struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
}

impl RawResponse {
    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

async fn start(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Server::new(&router).serve(listener));
    addr
}

async fn call(addr: SocketAddr, method: &str, path: &str, body: Option<(&str, &str)>) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut raw = format!("{method} {path} HTTP/1.1\r\nhost: localhost\r\n");
    match body {
        Some((content_type, payload)) => {
            raw += &format!("content-type: {content_type}\r\ncontent-length: {}\r\n\r\n", payload.len());
            raw += payload;
        }
        None => raw += "\r\n",
    }
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    parse(&String::from_utf8(buf).unwrap())
}

fn parse(raw: &str) -> RawResponse {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let mut lines = head.lines();
    let status = lines.next().unwrap().split_whitespace().nth(1).unwrap().parse().unwrap();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let body = if headers.get("transfer-encoding").map(String::as_str) == Some("chunked") {
        dechunk(body)
    } else {
        body.to_string()
    };
    RawResponse { status, headers, body }
}

fn dechunk(mut rest: &str) -> String {
    let mut out = String::new();
    loop {
        let (size, tail) = rest.split_once("\r\n").unwrap();
        let size = usize::from_str_radix(size, 16).unwrap();
        if size == 0 {
            return out;
        }
        out += &tail[..size];
        rest = &tail[size + 2..];
    }
}

#[tokio::test]
async fn catchall_request() {
    let router = Router::new().add(|r| async move { Ok(r.status(200).send("hi").into()) });
    let addr = start(router).await;

    for method in ["GET", "POST"] {
        let res = call(addr, method, "/aoeuaoe-anything", None).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, "hi");
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.header("connection"), Some("close"));
        assert!(res.header("date").is_some());
    }
}

#[tokio::test]
async fn post_echo() {
    let router = Router::new().add(|r| async move {
        match r.request().url() {
            "/text" => {
                let text = r.text().await?;
                Ok(r.send(text).into())
            }
            "/json" => {
                let value: Value = r.json().await?;
                Ok(r.send(value).into())
            }
            _ => Ok(r.fail()),
        }
    });
    let addr = start(router).await;

    let res = call(addr, "POST", "/text", Some(("text/plain", "cool stuff"))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "cool stuff");

    let res = call(addr, "POST", "/json", Some(("application/json", r#"{"x":10}"#))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.body, r#"{"x":10}"#);

    let res = call(addr, "POST", "/other", Some(("text/plain", "unread"))).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body, r#"{"statusCode":404,"error":"Not Found","message":"not_found"}"#);
}

#[tokio::test]
async fn post_body_type_coercion() {
    #[derive(serde::Deserialize)]
    struct Payload {
        abc: u32,
    }

    let router = Router::new().add(|r| async move {
        let body: Payload = r.json().await?;
        Ok(r.send(body.abc.to_string()).into())
    });
    let addr = start(router).await;

    let res = call(addr, "POST", "/coerce", Some(("application/json", r#"{"abc":123}"#))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "123");
}

#[tokio::test]
async fn json_parse_errors() {
    let router = Router::new().add(|r| async move {
        let value: Value = r.json().await?;
        Ok(r.send(value).into())
    });
    let addr = start(router).await;

    let res = call(addr, "POST", "/err", Some(("text/plain", "baad"))).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(
        res.body,
        r#"{"statusCode":400,"error":"Bad Request","message":"body_parse_error"}"#
    );
}

#[tokio::test]
async fn handler_errors_are_internal() {
    let router = Router::new().add(|_r| async move { Err(trailhead::RouteError::internal("db down")) });
    let addr = start(router).await;

    let res = call(addr, "GET", "/", None).await;
    assert_eq!(res.status, 500);
    assert_eq!(
        res.body,
        r#"{"statusCode":500,"error":"Internal Server Error","message":"unexpected_error"}"#
    );
}

#[tokio::test]
async fn handler_panics_are_internal() {
    let router = Router::new().add(|r| async move {
        let empty: Vec<u8> = Vec::new();
        let byte = empty[3];
        Ok(r.send(byte.to_string()).into())
    });
    let addr = start(router).await;

    let res = call(addr, "GET", "/", None).await;
    assert_eq!(res.status, 500);
    assert_eq!(
        res.body,
        r#"{"statusCode":500,"error":"Internal Server Error","message":"unexpected_error"}"#
    );

    // the server keeps serving after a panic
    let res = call(addr, "GET", "/", None).await;
    assert_eq!(res.status, 500);
}

#[tokio::test]
async fn handler_content_length_is_replaced() {
    let router = Router::new().add(|r| async move {
        Ok(r.set_header("content-length", "999").send("short").into())
    });
    let addr = start(router).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let raw = String::from_utf8(buf).unwrap();

    assert_eq!(raw.matches("content-length").count(), 1);
    assert!(raw.contains("content-length: 5\r\n"));
    assert!(raw.ends_with("\r\n\r\nshort"));
}

#[tokio::test]
async fn headers_get_set() {
    let router = Router::new().add(|r| async move {
        let branch = match r.request().url() {
            "/1" => r.clone().set_header("x", "10").status(999).get_header("x").map(str::to_string),
            "/2" => r.clone().status(999).set_header("x", "20").get_header("x").map(str::to_string),
            "/3" => r
                .clone()
                .status(999)
                .send("nope")
                .set_header("x", "30")
                .get_header("x")
                .map(str::to_string),
            other => return Err(trailhead::RouteError::internal(format!("unexpected url {other}"))),
        };
        Ok(r.status(200).send(branch.unwrap_or_default()).into())
    });
    let addr = start(router).await;

    for (path, expected) in [("/1", "10"), ("/2", "20"), ("/3", "30")] {
        let res = call(addr, "GET", path, None).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, expected);
    }
}

#[tokio::test]
async fn headers_immutability() {
    let router = Router::new().add(|r| async move {
        let _discarded = r.clone().set_header("x", "10");
        Ok(r.set_header("x", "20").send("imm").into())
    });
    let addr = start(router).await;

    let res = call(addr, "GET", "/123132", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "imm");
    assert_eq!(res.header("x"), Some("20"));
}

#[tokio::test]
async fn stream_response() {
    let router = Router::new().add(|r| async move {
        let chunks = vec![
            Ok::<_, io::Error>(b"body { color: ".to_vec()),
            Ok(b"blue; }\n".to_vec()),
        ];
        Ok(r.status(200).send(Body::stream(stream::iter(chunks))).into())
    });
    let addr = start(router).await;

    let res = call(addr, "GET", "/streammm", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("transfer-encoding"), Some("chunked"));
    assert_eq!(res.body, "body { color: blue; }\n");
}

#[tokio::test]
async fn match_failures() {
    let router = Router::new()
        .add(|r| async move { Ok(r.fail()) })
        .add(|r| async move { Ok(r.status(300).fail()) })
        .add(|r| async move { Ok(r.status(200).send("hi").into()) });
    let addr = start(router).await;

    let res = call(addr, "GET", "/aoeuaoe-anything", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "hi");
    assert_eq!(res.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn error_statuses_use_structured_bodies() {
    let router = Router::new()
        .get("/gone")
        .end(|r| async move { Ok(r.status(410).send("moved away").into()) })
        .get("/teapot")
        .end(|r| async move { Ok(r.status(418).send("").into()) });
    let addr = start(router).await;

    let res = call(addr, "GET", "/gone", None).await;
    assert_eq!(res.status, 410);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.body, r#"{"statusCode":410,"error":"Gone","message":"moved away"}"#);

    let res = call(addr, "GET", "/teapot", None).await;
    assert_eq!(res.status, 418);
    assert_eq!(res.body, r#"{"statusCode":418,"error":"I'm a teapot"}"#);
}
