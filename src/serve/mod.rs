//! File server unit: serves the output tree over HTTP.
//!
//! The accept loop runs on its own thread and hands requests to a small
//! rayon pool. Stopping unblocks the listener; responses already being
//! written finish, and anything still queued gets a 503.

mod lifecycle;
mod mime;
mod path;
mod reload;
mod response;


pub use reload::Revision;

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use tiny_http::{Request, Server};

use crate::{
    debug, log,
    supervisor::{ExitNotice, Unit, UnitHandle},
};
use path::Resolved;

const REQUEST_THREADS: usize = 4;

/// A bound listener whose accept loop has not started yet.
pub struct FileServer {
    server: Arc<Server>,
    addr: SocketAddr,
    context: Arc<ServeContext>,
}

/// Everything a request handler needs.
struct ServeContext {
    root: PathBuf,
    live_reload: bool,
    revision: Revision,
    stopping: AtomicBool,
}

impl FileServer {
    /// Bind `interface:port`, trying the following ports if it is taken.
    pub fn bind(
        interface: IpAddr,
        port: u16,
        root: PathBuf,
        live_reload: bool,
        revision: Revision,
    ) -> Result<Self> {
        let (server, addr) = lifecycle::bind_with_retry(interface, port)?;
        Ok(Self {
            server: Arc::new(server),
            addr,
            context: Arc::new(ServeContext {
                root,
                live_reload,
                revision,
                stopping: AtomicBool::new(false),
            }),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the accept loop on a dedicated thread.
    pub fn spawn(self, exit: ExitNotice) -> Result<ServerHandle> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("http-{i}"))
            .build()
            .context("failed to create request pool")?;

        let server = Arc::clone(&self.server);
        let context = Arc::clone(&self.context);
        let thread = thread::Builder::new()
            .name("server".into())
            .spawn(move || {
                let _exit = exit.arm(Unit::Server);
                run_request_loop(&server, &pool, &context);
            })
            .context("failed to spawn server thread")?;

        Ok(ServerHandle {
            server: self.server,
            context: self.context,
            thread,
        })
    }
}

/// Serve until the listener is unblocked. Returns once every accepted
/// request has been answered.
fn run_request_loop(server: &Server, pool: &rayon::ThreadPool, context: &Arc<ServeContext>) {
    pool.in_place_scope(|scope| {
        for request in server.incoming_requests() {
            let context = Arc::clone(context);
            scope.spawn(move |_| {
                if let Err(e) = handle_request(request, &context) {
                    log!("serve"; "request error: {e:#}");
                }
            });
        }
    });
    debug!("serve"; "stopped");
}

fn handle_request(request: Request, context: &ServeContext) -> Result<()> {
    if context.stopping.load(Ordering::SeqCst) {
        return response::respond_unavailable(request);
    }
    if !response::is_get_or_head(&request) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_owned();
    debug!("serve"; "{} {}", request.method(), url);

    if context.live_reload && url.split('?').next() == Some(reload::REVISION_PATH) {
        return response::respond_revision(request, context.revision.current());
    }

    let live_reload = context.live_reload;
    match path::resolve_path(&url, &context.root) {
        Some(Resolved::File(path)) => response::respond_file(request, &path, live_reload),
        Some(Resolved::Directory { dir, url }) => {
            response::respond_listing(request, &dir, &url, live_reload)
        }
        Some(Resolved::Redirect(location)) => response::respond_redirect(request, &location),
        None => response::respond_not_found(request, &context.root, live_reload),
    }
}

/// Owner side of a running file server.
pub struct ServerHandle {
    server: Arc<Server>,
    context: Arc<ServeContext>,
    thread: JoinHandle<()>,
}

impl UnitHandle for ServerHandle {
    /// Stop accepting connections. Requests accepted after this point get 503.
    fn stop(&self) {
        self.context.stopping.store(true, Ordering::SeqCst);
        self.server.unblock();
    }

    fn join(self: Box<Self>) {
        if self.thread.join().is_err() {
            log!("error"; "server thread panicked");
        }
    }
}
