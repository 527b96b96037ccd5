use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use tarpc::context;

/// Concurrent client connections a server drives at once.
pub(crate) const MAX_CONNECTIONS: usize = 64;

/// Deadline used for RPCs when no timeout is configured.
const UNBOUNDED_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24);

pub(crate) async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

/// tarpc defaults to a 10s deadline; map calls over large inputs need longer.
pub(crate) fn rpc_context(timeout: Option<Duration>) -> context::Context {
    let mut ctx = context::current();
    ctx.deadline = SystemTime::now() + timeout.unwrap_or(UNBOUNDED_DEADLINE);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_follows_configured_timeout() {
        let before = SystemTime::now();
        let ctx = rpc_context(Some(Duration::from_secs(5)));
        let after = SystemTime::now();

        assert!(ctx.deadline >= before + Duration::from_secs(5));
        assert!(ctx.deadline <= after + Duration::from_secs(5));
    }

    #[test]
    fn no_timeout_outlives_tarpc_default() {
        let ctx = rpc_context(None);
        assert!(ctx.deadline > SystemTime::now() + Duration::from_secs(60 * 60));
    }
}
