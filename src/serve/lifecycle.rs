//! Listener binding.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Result, anyhow};
use tiny_http::Server;

use crate::log;

/// Maximum number of port binding attempts.
pub const MAX_PORT_RETRIES: u16 = 10;

/// Bind to `interface:base_port`, moving to the next port while the
/// current one is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                // port 0 asks the OS for any free port
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    let last = base_port.saturating_add(MAX_PORT_RETRIES - 1);
    Err(anyhow!(
        "failed to bind {interface} after {MAX_PORT_RETRIES} attempts (ports {base_port}-{last}): {}",
        last_error.map_or_else(|| "port out of range".to_owned(), |e| e.to_string())
    ))
}
