use pulse_probe::{HttpProber, Prober};
use pulse_types::{ProbeErrorKind, Target};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// 启动一个只返回固定状态行的 HTTP 服务
async fn spawn_http_server(status_line: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                // 读到请求头结束
                while let Ok(n) = socket.read(&mut buf[read..]).await {
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// 接受连接但从不响应
async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

fn website(addr: SocketAddr) -> Target {
    Target::website(format!("http://{}/health", addr)).with_name("api")
}

#[tokio::test]
async fn test_http_200_is_up() {
    let addr = spawn_http_server("200 OK").await;
    let prober = HttpProber::new(Duration::from_secs(2));

    let result = prober.check(&website(addr)).await;
    assert!(result.success);
    assert_eq!(result.target, "api");
    assert!(result.latency_ms.unwrap() >= 0.0);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_http_503_is_failure_not_error() {
    let addr = spawn_http_server("503 Service Unavailable").await;
    let prober = HttpProber::new(Duration::from_secs(2));

    let result = prober
        .check(&website(addr).with_expected_status(200))
        .await;
    assert!(!result.success);
    assert_eq!(result.error, Some(ProbeErrorKind::UnexpectedStatus(503)));
}

#[tokio::test]
async fn test_any_2xx_accepted_without_expected_status() {
    let addr = spawn_http_server("204 No Content").await;
    let prober = HttpProber::new(Duration::from_secs(2));

    assert!(prober.check(&website(addr)).await.success);

    // 指定期望状态码后必须完全一致
    let result = prober
        .check(&website(addr).with_expected_status(200))
        .await;
    assert_eq!(result.error, Some(ProbeErrorKind::UnexpectedStatus(204)));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = HttpProber::new(Duration::from_secs(2));
    let result = prober.check(&website(addr)).await;
    assert!(!result.success);
    assert_eq!(result.error, Some(ProbeErrorKind::ConnectionFailed));
}

#[tokio::test]
async fn test_timeout() {
    let addr = spawn_silent_server().await;
    let prober = HttpProber::new(Duration::from_millis(200));

    let result = prober.check(&website(addr)).await;
    assert!(!result.success);
    assert_eq!(result.error, Some(ProbeErrorKind::Timeout));
}
