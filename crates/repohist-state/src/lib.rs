pub mod changesets;
pub mod db;
pub mod fileset_cache;
pub mod repositories;
pub mod schema;
