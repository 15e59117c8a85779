//! Loopback availability check for tests that serve pages from a local mock.
//!
//! Sandboxed CI runners sometimes forbid binding sockets. By default such
//! tests are skipped there; `LINKHIVE_REQUIRE_SOCKET_TESTS=1` turns the skip
//! into a failure.

use std::future::Future;
use std::net::{Ipv4Addr, TcpListener};
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "LINKHIVE_REQUIRE_SOCKET_TESTS";

/// What to do when no loopback socket can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoLoopback {
    Skip,
    Fail,
}

impl NoLoopback {
    fn from_env() -> Self {
        Self::parse(std::env::var(REQUIRE_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if ["1", "true", "yes"].iter().any(|on| v.eq_ignore_ascii_case(on)) => {
                Self::Fail
            }
            _ => Self::Skip,
        }
    }
}

fn loopback_available() -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).is_ok()
}

/// Starts a mock server, or returns `None` when the test should be skipped.
///
/// Panics instead of skipping when sockets are required by the environment.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let usable = loopback_available() || {
        match NoLoopback::from_env() {
            NoLoopback::Fail => panic!("{caller}: loopback bind failed and {REQUIRE_ENV} is set"),
            NoLoopback::Skip => eprintln!("{caller}: loopback bind failed, skipping mock-server test"),
        }
        false
    };
    async move {
        if usable {
            Some(MockServer::start().await)
        } else {
            None
        }
    }
}

#[test]
fn test_require_flag_parsing() {
    assert_eq!(NoLoopback::parse(None), NoLoopback::Skip);
    assert_eq!(NoLoopback::parse(Some("0")), NoLoopback::Skip);
    assert_eq!(NoLoopback::parse(Some(" TRUE ")), NoLoopback::Fail);
    assert_eq!(NoLoopback::parse(Some("yes")), NoLoopback::Fail);
}
