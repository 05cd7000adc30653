//! Fuzzy entity search.

mod resolver;

pub use resolver::{
    MAX_CHOICES, Resolution, ResolveOptions, choose, rank, resolve, search, similarity,
};
