//! Daemon settings and how they are loaded.

mod load;
mod schema;

pub use schema::*;

#[cfg(test)]
mod tests;
