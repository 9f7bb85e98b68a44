/// Router Module Index
///
/// Routing is split by access level. `create_router` layers the auth gate over the
/// authenticated and admin routers; the public router is left open.

/// Routes open to anonymous callers: health, signup/signin, the course catalog.
pub mod public;

/// Routes behind the auth gate, available to any resolved admin or user.
pub mod authenticated;

/// Routes behind the auth gate that additionally require the admin role.
pub mod admin;
