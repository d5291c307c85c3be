pub mod roomcache;

pub use roomcache::*;
