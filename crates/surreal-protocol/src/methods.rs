//! RPC method name constants.
//!
//! Each constant is the exact string sent as the `method` field of a request.

/// All RPC method names, grouped by purpose.
pub struct Methods;

impl Methods {
    // ── Session ─────────────────────────────────────────────────────────
    pub const USE: &str = "use";
    pub const LET: &str = "let";
    pub const UNSET: &str = "unset";
    pub const INFO: &str = "info";

    // ── Authentication ──────────────────────────────────────────────────
    pub const SIGNIN: &str = "signin";
    pub const SIGNUP: &str = "signup";
    pub const AUTHENTICATE: &str = "authenticate";
    pub const INVALIDATE: &str = "invalidate";

    // ── Data ────────────────────────────────────────────────────────────
    pub const QUERY: &str = "query";
    pub const SELECT: &str = "select";
    pub const CREATE: &str = "create";
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const MERGE: &str = "merge";
    pub const PATCH: &str = "patch";
    pub const DELETE: &str = "delete";

    // ── Live queries ────────────────────────────────────────────────────
    pub const LIVE: &str = "live";
    pub const KILL: &str = "kill";

    // ── Server ──────────────────────────────────────────────────────────
    pub const PING: &str = "ping";
    pub const VERSION: &str = "version";
}
