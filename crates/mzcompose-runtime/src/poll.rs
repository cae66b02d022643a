//! Bounded readiness polling.
//!
//! [`wait_for`] retries a fallible probe until it produces an acceptable
//! result or the timeout elapses. Timeouts are checked between attempts
//! only; an attempt in flight is never interrupted.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use mzcompose_common::error::{ComposeError, Result};

/// Interval between TCP connection attempts.
const TCP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on a single TCP connection attempt.
const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// What a probe must return to count as ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect<T> {
    /// Any successful result.
    Any,
    /// Exactly this result.
    Exact(T),
}

impl<T: PartialEq> Expect<T> {
    fn is_satisfied_by(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
        }
    }
}

/// Polls `probe` every `interval` until it satisfies `expect`.
///
/// The probe always runs at least once. Another attempt is only made if it
/// can start before `timeout` has elapsed.
///
/// # Errors
///
/// Returns [`ComposeError::ReadinessTimeout`] carrying the most recent probe
/// error (or unexpected result) if readiness is never observed.
pub fn wait_for<T, E, F>(
    target: &str,
    timeout: Duration,
    interval: Duration,
    expect: &Expect<T>,
    mut probe: F,
) -> Result<T>
where
    T: PartialEq + fmt::Debug,
    E: fmt::Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    tracing::info!(%target, ?timeout, "waiting for readiness");
    let start = Instant::now();
    let mut last_error: Option<String> = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match probe() {
            Ok(value) if expect.is_satisfied_by(&value) => {
                tracing::info!(%target, attempt, "ready");
                return Ok(value);
            }
            Ok(value) => {
                last_error = Some(format!("unexpected result {value:?}"));
            }
            Err(e) => {
                last_error = Some(e.to_string());
            }
        }

        let elapsed = start.elapsed();
        if elapsed.checked_add(interval).is_none_or(|next| next > timeout) {
            break;
        }
        let remaining = timeout.saturating_sub(elapsed);
        tracing::debug!(
            %target,
            attempt,
            remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            last_error = last_error.as_deref().unwrap_or(""),
            "not ready yet"
        );
        std::thread::sleep(interval);
    }

    tracing::warn!(%target, attempt, "readiness timeout");
    Err(ComposeError::ReadinessTimeout {
        target: target.to_string(),
        last_error,
    })
}

/// Waits until a TCP connection to `host:port` succeeds.
///
/// # Errors
///
/// Returns [`ComposeError::ReadinessTimeout`] if no connection succeeds
/// within `timeout`.
pub fn wait_for_tcp(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let target = format!("{host}:{port}");
    wait_for(&target, timeout, TCP_POLL_INTERVAL, &Expect::Any, || {
        connect(host, port)
    })
}

fn connect(host: &str, port: u16) -> std::io::Result<()> {
    let mut last = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, TCP_CONNECT_TIMEOUT) {
            Ok(_) => return Ok(()),
            Err(e) => last = Some(e),
        }
    }
    Err(last.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    /// A probe that fails until its `succeed_on`-th call.
    fn flaky(succeed_on: u32) -> impl FnMut() -> std::result::Result<u32, String> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls >= succeed_on {
                Ok(calls)
            } else {
                Err(format!("connection refused (attempt {calls})"))
            }
        }
    }

    #[test]
    fn succeeds_on_third_attempt_within_timeout() {
        let got = wait_for("flaky", Duration::from_secs(5), TICK, &Expect::Any, flaky(3))
            .expect("ready");
        assert_eq!(got, 3);
    }

    #[test]
    fn times_out_with_last_error() {
        // Room for two attempts only.
        let err = wait_for(
            "flaky",
            Duration::from_millis(15),
            TICK,
            &Expect::Any,
            flaky(3),
        )
        .unwrap_err();
        match err {
            ComposeError::ReadinessTimeout { target, last_error } => {
                assert_eq!(target, "flaky");
                let last = last_error.expect("last error");
                assert_eq!(last, "connection refused (attempt 2)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exact_expectation_rejects_other_values() {
        let mut n = 0;
        let got = wait_for(
            "counter",
            Duration::from_secs(5),
            TICK,
            &Expect::Exact(4),
            || -> std::result::Result<i32, String> {
                n += 1;
                Ok(n)
            },
        )
        .expect("ready");
        assert_eq!(got, 4);

        let err = wait_for(
            "constant",
            Duration::from_millis(5),
            TICK,
            &Expect::Exact(1),
            || -> std::result::Result<i32, String> { Ok(0) },
        )
        .unwrap_err();
        assert!(err.to_string().contains("unexpected result 0"), "got: {err}");
    }

    #[test]
    fn zero_timeout_still_probes_once() {
        let mut calls = 0;
        let _ = wait_for(
            "once",
            Duration::ZERO,
            TICK,
            &Expect::Any,
            || -> std::result::Result<(), &str> {
                calls += 1;
                Err("down")
            },
        )
        .unwrap_err();
        assert_eq!(calls, 1);
    }

    #[test]
    fn unbounded_interval_tries_once_and_times_out() {
        let mut calls = 0;
        let err = wait_for(
            "once",
            Duration::from_millis(5),
            Duration::MAX,
            &Expect::Any,
            || -> std::result::Result<(), &str> {
                calls += 1;
                Err("down")
            },
        )
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, ComposeError::ReadinessTimeout { .. }), "got: {err}");
    }

    #[test]
    fn tcp_wait_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        wait_for_tcp("127.0.0.1", port, Duration::from_secs(2)).expect("connect");
    }

    #[test]
    fn tcp_wait_times_out_on_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let err = wait_for_tcp("127.0.0.1", port, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ComposeError::ReadinessTimeout { .. }));
    }
}
