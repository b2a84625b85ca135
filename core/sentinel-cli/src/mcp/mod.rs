//! Stdio request/response server exposing the sentinel tools.

mod server;
mod tools;
mod transport;

use std::io;

use sentinel_core::CancelToken;

use crate::commands::AppContext;
use server::{serve, Server};
use transport::{StdioTransport, TransportError};

pub fn run(ctx: AppContext, cancel: &CancelToken) -> Result<(), TransportError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut transport = StdioTransport::new(stdin.lock(), stdout.lock());
    let server = Server::new(ctx);

    tracing::info!(pid = std::process::id(), "Stdio server started");
    let result = serve(&server, &mut transport, cancel);
    tracing::info!(framing = ?transport.framing(), "Stdio server stopped");
    result
}
