pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub(crate) const PEER_TIMEOUT_SECS: u64 = 5;
