pub mod event_loop;
pub mod shutdown;

pub use event_loop::run;
pub use shutdown::graceful_shutdown;
