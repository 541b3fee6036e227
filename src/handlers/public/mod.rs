// Public handlers: no session required.
//
// Database selection happens here; the session cookie issued by
// `session_post` is what the tenant middleware reads on later requests.

pub mod session;

pub use session::{databases_get, session_delete, session_post};
