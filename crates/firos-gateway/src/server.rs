//! [`GatewayServer`] – HTTP front door of the gateway.
//!
//! Listens on `0.0.0.0:10100` (configurable via [`GatewayServer::with_port`]
//! and [`GatewayServer::with_bind_address`]). Each connection is served on its
//! own task: one request is read, dispatched through the [`Gateway`] route
//! table, and answered.
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | `/robots/` | robot catalog (JSON + CORS) |
//! | GET | `/robot/{id}/` | robot snapshot or relayed broker error (JSON + CORS) |
//! | POST | `/firos/` | `Received by firos` (text/plain, always 200) |
//! | anything else | | `GENERIC PAGE` (text/html, 200) |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use firos_middleware::{PublishSink, QuerySink, RobotRegistry, ValueCodec};
use firos_types::FirosError;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::UpdateDedupCache;
use crate::handlers::{NotificationIngest, RobotCatalog, RobotSnapshot};
use crate::http::{HttpRequest, HttpResponse, Method, read_request};
use crate::response;
use crate::router::RouteTable;

/// Default TCP port of the gateway.
pub const DEFAULT_PORT: u16 = 10100;

/// Handler selected by the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    RobotCatalog,
    RobotSnapshot,
    Notification,
}

/// The gateway's public routes, in evaluation order.
pub fn default_routes() -> Result<RouteTable<Endpoint>, FirosError> {
    RouteTable::new()
        .route(Method::Get, r"^/robots/*$", Endpoint::RobotCatalog)?
        .route(Method::Get, r"^/robot/((?-u:\w)+)/*$", Endpoint::RobotSnapshot)?
        .route(Method::Post, r"^/firos/*$", Endpoint::Notification)
}

/// External systems the handlers talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn RobotRegistry>,
    pub publisher: Arc<dyn PublishSink>,
    pub query: Arc<dyn QuerySink>,
    pub codec: Arc<dyn ValueCodec>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Route table plus handlers. Independent of any socket, so it can be
/// driven directly with [`HttpRequest`] values.
pub struct Gateway {
    routes: RouteTable<Endpoint>,
    ingest: NotificationIngest,
    catalog: RobotCatalog,
    snapshot: RobotSnapshot,
}

impl Gateway {
    /// Build a gateway on the [`default_routes`]. The dedup cache is owned by
    /// the caller so its lifetime is the caller's choice.
    pub fn new(
        collaborators: Collaborators,
        dedup: Arc<UpdateDedupCache>,
    ) -> Result<Self, FirosError> {
        Ok(Self::with_routes(collaborators, dedup, default_routes()?))
    }

    pub fn with_routes(
        collaborators: Collaborators,
        dedup: Arc<UpdateDedupCache>,
        routes: RouteTable<Endpoint>,
    ) -> Self {
        Self {
            routes,
            ingest: NotificationIngest::new(collaborators.codec, collaborators.publisher, dedup),
            catalog: RobotCatalog::new(collaborators.registry),
            snapshot: RobotSnapshot::new(collaborators.query),
        }
    }

    /// Route `request` and run the matched handler.
    #[instrument(name = "dispatch", skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let Some(matched) = self.routes.lookup(&request.method, &request.path) else {
            debug!("no route, serving generic page");
            return response::generic_page();
        };
        debug!(
            endpoint = ?matched.handler,
            query = ?request.query_params(),
            "route matched"
        );

        match matched.handler {
            Endpoint::RobotCatalog => self.catalog.handle(),
            Endpoint::RobotSnapshot => match matched.param(0) {
                Some(robot_id) => self.snapshot.handle(robot_id).await,
                None => response::generic_page(),
            },
            Endpoint::Notification => self.ingest.handle(request).await,
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayServer
// ---------------------------------------------------------------------------

pub struct GatewayServer {
    gateway: Arc<Gateway>,
    bind_address: IpAddr,
    port: u16,
}

impl GatewayServer {
    /// Create a server for `gateway` on `0.0.0.0:`[`DEFAULT_PORT`].
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listening address (builder-style).
    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FirosError::Io`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), FirosError> {
        let addr = SocketAddr::new(self.bind_address, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FirosError::Io(format!("bind error on {addr}: {e}")))?;
        info!(%addr, "FIROS gateway listening");
        self.serve(listener).await
    }

    /// Serve connections accepted on an already-bound `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), FirosError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let gateway = Arc::clone(&self.gateway);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, gateway).await {
                            warn!(peer = %peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

#[instrument(name = "connection", skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    gateway: Arc<Gateway>,
) -> Result<(), FirosError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match read_request(&mut reader).await {
        Ok(request) => gateway.dispatch(&request).await,
        Err(err @ FirosError::Io(_)) => return Err(err),
        Err(err) => {
            warn!(error = %err, "rejecting malformed request");
            response::bad_request(&err)
        }
    };

    write_half.write_all(&response.to_bytes()).await?;
    write_half.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
