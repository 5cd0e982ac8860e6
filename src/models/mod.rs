pub mod activity;
pub mod book;

pub use activity::*;
pub use book::*;
