pub mod aggregate;
pub mod check;
pub mod flatten;
pub mod mutation;
pub mod search;
pub mod sort;
pub mod store;
pub mod tree_build;
pub mod validate;
