// Library exports for blastnr
pub mod filter;
pub mod hit;
pub mod reader;
pub mod reconcile;
