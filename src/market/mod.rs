pub mod catalogue;
pub mod compare;
pub mod insight;
pub mod models;
pub mod summary;
