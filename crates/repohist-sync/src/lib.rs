pub mod coordinator;
pub mod dircache;
pub mod paginator;
pub mod resolver;
