//! Budgeted direction probing.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::DiscoveryError;
use crate::models::PortDirection;

/// Upper bound on a single trial connection.
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(250);

/// Retry `attempt` with exponential backoff until it succeeds or `budget` is
/// spent. Returns the last error when the budget runs out.
pub fn retry_with_budget<T, E, F>(budget: Duration, initial_backoff: Duration, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let started = Instant::now();
    let mut backoff = initial_backoff.max(Duration::from_millis(1));
    let mut tries = 0u32;
    loop {
        tries += 1;
        let err = match attempt() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        let elapsed = started.elapsed();
        if elapsed >= budget {
            log::debug!("[Probe] Budget of {:?} spent after {} attempts", budget, tries);
            return Err(err);
        }
        thread::sleep(backoff.min(budget - elapsed));
        backoff = backoff.saturating_mul(2);
    }
}

/// Probe a `host:port` address with trial TCP connections.
///
/// A port that accepts a connection can carry traffic both ways, so success
/// reports `InputOutput`. Exhausting the budget is a `ProbeTimeout`.
pub fn probe_tcp(
    address: &str,
    budget: Duration,
    initial_backoff: Duration,
) -> Result<PortDirection, DiscoveryError> {
    let target = resolve(address)?;
    retry_with_budget(budget, initial_backoff, || {
        TcpStream::connect_timeout(&target, MAX_ATTEMPT_TIMEOUT.min(budget.max(Duration::from_millis(1))))
            .map(|_| PortDirection::InputOutput)
    })
    .map_err(|e| {
        log::debug!("[Probe] {} unreachable: {}", address, e);
        DiscoveryError::ProbeTimeout(budget.as_millis() as u64)
    })
}

fn resolve(address: &str) -> Result<SocketAddr, DiscoveryError> {
    address
        .to_socket_addrs()
        .map_err(|_| DiscoveryError::UnknownEndpoint(address.to_string()))?
        .next()
        .ok_or_else(|| DiscoveryError::UnknownEndpoint(address.to_string()))
}
