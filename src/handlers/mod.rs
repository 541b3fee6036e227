// Handlers are split by what they need from the request:
// public  -> database selection and logout, no session required
// protected -> tenant introspection through the bound tenant
pub mod protected;
pub mod public;
