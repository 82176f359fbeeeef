//! Well-known event identifiers used in structured log fields across the
//! server, eviction and waiter lifecycle.

pub mod ids {
    pub const SERVER_STARTED: &str = "server.started";
    pub const SERVER_STOPPED: &str = "server.stopped";
    pub const OBJECT_CREATED: &str = "object.created";
    pub const OBJECT_CLOSED: &str = "object.closed";
    pub const OBJECT_EVICTED: &str = "object.evicted";
    pub const WAITER_SATISFIED: &str = "waiter.satisfied";
    pub const WAITER_EXPIRED: &str = "waiter.expired";
}
