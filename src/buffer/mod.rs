pub mod buffer_pool;
mod clock_replacer;

pub type PoolPos = usize;
