//! # Command Server
//!
//! HTTP surface used by the messaging platform:
//! - `GET /image?file=<name>`: snapshot bytes (`image/jpeg`)
//! - `GET /video?file=<name>`: recorded clip bytes (`video/mp4`)
//! - `POST /webhook`: inbound message events, executed as commands
//!
//! Media checks run in a fixed order: monitoring disabled (403), missing
//! `file` parameter (400), unknown artifact (404).
//!
//! ## Concurrency
//! - Listener bound with `socket2` (address reuse), served by `tiny_http`
//! - One thread per request; handlers share only `ServerContext`
//! - `ServerHandle::stop` unblocks the accept loop; `join` waits for it

use std::{
    fs::File,
    io::{self, Read},
    net::{SocketAddr, TcpListener},
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{debug, error, info, warn};
use reqwest::Url;
use socket2::{Domain, SockAddr, Socket, Type};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::control::state::SharedControl;
use crate::media::store::{MediaKind, MediaStore};
use crate::notify::dispatcher::NotificationDispatcher;
use crate::server::command::{handle_events, parse_webhook};
use crate::utils::error::ServerError;

const LISTEN_BACKLOG: i32 = 128;
/// Largest webhook body accepted; LINE event batches are far smaller.
pub const MAX_BODY_BYTES: u64 = 256 * 1024;
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Everything a request handler may touch, injected at construction.
#[derive(Clone)]
pub struct ServerContext {
    pub control: SharedControl,
    pub notifier: Arc<NotificationDispatcher>,
    pub store: MediaStore,
}

impl ServerContext {
    pub fn new(control: SharedControl, notifier: Arc<NotificationDispatcher>, store: MediaStore) -> Self {
        Self {
            control,
            notifier,
            store,
        }
    }
}

pub enum Body {
    Text(&'static str),
    File(File),
}

pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Body,
}

impl Reply {
    fn text(status: u16, text: &'static str) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN,
            body: Body::Text(text),
        }
    }

    /// The body text, if this is a text reply.
    pub fn text_body(&self) -> Option<&'static str> {
        match self.body {
            Body::Text(t) => Some(t),
            Body::File(_) => None,
        }
    }
}

/// Maps one request onto a reply. `url` is the raw request target
/// (path plus query); `body` is only read for the webhook.
pub fn route(ctx: &ServerContext, method: &Method, url: &str, body: &[u8]) -> Reply {
    let Some(target) = parse_target(url) else {
        return Reply::text(400, "Bad Request");
    };

    match (method, target.path()) {
        (Method::Get, "/image") => serve_media(ctx, MediaKind::Photo, &target),
        (Method::Get, "/video") => serve_media(ctx, MediaKind::Video, &target),
        (Method::Post, "/webhook") => match parse_webhook(body) {
            Ok(webhook) => {
                handle_events(&webhook, &ctx.control, &ctx.notifier);
                Reply::text(200, "OK")
            }
            Err(e) => {
                warn!("[Server] rejected webhook body: {}", e);
                Reply::text(400, "Bad Request")
            }
        },
        _ => Reply::text(404, "Not Found"),
    }
}

fn parse_target(url: &str) -> Option<Url> {
    Url::parse(&format!("http://localhost{}", url)).ok()
}

fn serve_media(ctx: &ServerContext, kind: MediaKind, target: &Url) -> Reply {
    if !ctx.control.is_monitoring() {
        return Reply::text(403, "Monitoring stopped");
    }

    let Some(name) = target
        .query_pairs()
        .find(|(k, _)| k == "file")
        .map(|(_, v)| v.into_owned())
    else {
        return Reply::text(400, "missing file parameter");
    };

    let not_found = match kind {
        MediaKind::Photo => "Image not found",
        MediaKind::Video => "Video not found",
    };

    let Some(path) = ctx.store.resolve(kind, &name) else {
        debug!("[Server] {} {:?} not found", kind.label(), name);
        return Reply::text(404, not_found);
    };

    match File::open(&path) {
        Ok(file) => Reply {
            status: 200,
            content_type: kind.content_type(),
            body: Body::File(file),
        },
        Err(e) => {
            warn!("[Server] could not open {}: {}", path.display(), e);
            Reply::text(404, not_found)
        }
    }
}

pub struct CommandServer {
    server: Arc<Server>,
    ctx: ServerContext,
    local_addr: SocketAddr,
}

impl CommandServer {
    pub fn bind(addr: SocketAddr, ctx: ServerContext) -> Result<Self, ServerError> {
        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let bind_err = |source: io::Error| ServerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let socket = Socket::new(domain, Type::STREAM, None).map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&SockAddr::from(addr)).map_err(bind_err)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(bind_err)?;
        let server = Server::from_listener(listener, None).map_err(|e| ServerError::Setup(e.to_string()))?;

        info!("[Server] listening on http://{}", local_addr);
        Ok(Self {
            server: Arc::new(server),
            ctx,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests on the current thread until stopped.
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            let ctx = self.ctx.clone();
            thread::spawn(move || handle_request(&ctx, request));
        }
        info!("[Server] accept loop exited");
    }

    /// Moves the server onto its own thread.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let server = self.server.clone();
        let thread = thread::Builder::new()
            .name("command-server".to_string())
            .spawn(move || self.run())?;
        Ok(ServerHandle {
            server,
            thread: Some(thread),
        })
    }
}

pub struct ServerHandle {
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stops accepting; requests already in flight complete on their own threads.
    pub fn stop(&self) {
        self.server.unblock();
    }

    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("[Server] server thread panicked");
            }
        }
    }
}

fn handle_request(ctx: &ServerContext, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = if method == Method::Post {
        match read_body(request.as_reader(), MAX_BODY_BYTES) {
            Ok(Some(body)) => route(ctx, &method, &url, &body),
            Ok(None) => {
                warn!("[Server] request body over {} bytes rejected", MAX_BODY_BYTES);
                Reply::text(400, "Bad Request")
            }
            Err(e) => {
                warn!("[Server] failed to read request body: {}", e);
                Reply::text(400, "Bad Request")
            }
        }
    } else {
        route(ctx, &method, &url, &[])
    };

    debug!("[Server] {:?} {} -> {}", method, url, reply.status);
    if let Err(e) = respond(request, reply) {
        warn!("[Server] failed to write response: {}", e);
    }
}

/// Reads at most `limit` bytes; `None` when the body is longer than that.
pub fn read_body(reader: impl Read, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(body))
}

fn respond(request: Request, reply: Reply) -> io::Result<()> {
    let status = StatusCode(reply.status);
    let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()).ok();

    match reply.body {
        Body::Text(text) => {
            let mut response = Response::from_data(text.as_bytes().to_vec()).with_status_code(status);
            if let Some(h) = header {
                response.add_header(h);
            }
            request.respond(response)
        }
        Body::File(file) => {
            let mut response = Response::from_file(file).with_status_code(status);
            if let Some(h) = header {
                response.add_header(h);
            }
            request.respond(response)
        }
    }
}
