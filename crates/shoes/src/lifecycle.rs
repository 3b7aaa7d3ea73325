// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Listening and shutdown.
//!
//! A server listens either on a TCP address or on a Unix domain socket
//! (typical behind nginx). Both stop accepting connections when
//! [`shutdown_signal`] resolves.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Result, ShoesError};

#[cfg(unix)]
const ACCEPT_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

#[cfg(unix)]
const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Where to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listen {
    /// A TCP socket address.
    Tcp(SocketAddr),
    /// A Unix domain socket path.
    Unix(PathBuf),
}

impl FromStr for Listen {
    type Err = ShoesError;

    /// `3000` listens on `0.0.0.0:3000`, `127.0.0.1:3000` on that address,
    /// anything else is taken as a socket path.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ShoesError::InvalidConfig("empty listen address".to_string()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            let port: u16 = s
                .parse()
                .map_err(|_| ShoesError::InvalidConfig(format!("invalid port: {}", s)))?;
            return Ok(Listen::Tcp(SocketAddr::from(([0, 0, 0, 0], port))));
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Listen::Tcp(addr));
        }
        Ok(Listen::Unix(PathBuf::from(s)))
    }
}

impl fmt::Display for Listen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listen::Tcp(addr) => write!(f, "http://{}", addr),
            Listen::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Serves `router` on `listen` until [`shutdown_signal`] resolves.
pub async fn serve(router: Router, listen: &Listen) -> Result<()> {
    match listen {
        Listen::Tcp(addr) => {
            let listener = TcpListener::bind(addr).await?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Listen::Unix(path) => serve_unix(router, path.clone()).await?,
    }
    debug!("Server stopped");
    Ok(())
}

#[cfg(unix)]
async fn serve_unix(router: Router, path: PathBuf) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder;
    use hyper_util::server::graceful::GracefulShutdown;
    use hyper_util::service::TowerToHyperService;
    use tokio::net::UnixListener;

    match std::fs::remove_file(&path) {
        Ok(()) => debug!("Removed stale socket {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(&path)?;
    // The proxy in front runs as another user.
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777))?;
    info!("Listening on unix:{}", path.display());

    let builder = Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let service = TowerToHyperService::new(router.clone());
        let connection = builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let connection = graceful.watch(connection);
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Connection error: {}", e);
            }
        });
    }

    drop(listener);
    tokio::select! {
        _ = graceful.shutdown() => debug!("All connections closed"),
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
            warn!("Connections still open after {:?}, exiting", DRAIN_TIMEOUT)
        }
    }

    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix(_router: Router, path: PathBuf) -> Result<()> {
    Err(ShoesError::InvalidConfig(format!(
        "unix sockets are not supported on this platform: {}",
        path.display()
    )))
}

/// Resolves when the process receives SIGINT, SIGTERM, SIGQUIT or SIGHUP
/// (Ctrl-C on other platforms).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;

        let name = tokio::select! {
            _ = wait_for(SignalKind::interrupt()) => "SIGINT",
            _ = wait_for(SignalKind::terminate()) => "SIGTERM",
            _ = wait_for(SignalKind::quit()) => "SIGQUIT",
            _ = wait_for(SignalKind::hangup()) => "SIGHUP",
        };
        info!("Received {}, shutting down", name);
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
        }
    }
}

#[cfg(unix)]
async fn wait_for(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            debug!("Cannot listen for signal {:?}: {}", kind, e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port() {
        assert_eq!(
            "3000".parse::<Listen>().unwrap(),
            Listen::Tcp(SocketAddr::from(([0, 0, 0, 0], 3000)))
        );
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            "127.0.0.1:8080".parse::<Listen>().unwrap(),
            Listen::Tcp(SocketAddr::from(([127, 0, 0, 1], 8080)))
        );
    }

    #[test]
    fn test_parse_socket_path() {
        assert_eq!(
            "/tmp/app.sock".parse::<Listen>().unwrap(),
            Listen::Unix(PathBuf::from("/tmp/app.sock"))
        );
        assert!("".parse::<Listen>().is_err());
        assert!("99999".parse::<Listen>().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_serves_and_drains() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        use axum::routing::get;
        use nix::sys::signal::{raise, Signal};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::UnixStream;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        std::fs::write(&path, "stale").unwrap();

        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "done"
            }),
        );
        let handle = tokio::spawn(serve_unix(router, path.clone()));

        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(&path).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = stream.expect("socket never came up");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);

        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        raise(Signal::SIGHUP).unwrap();

        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("done"));

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!path.exists());
    }
}
