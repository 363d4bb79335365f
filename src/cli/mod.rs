pub mod check;
pub mod output;
pub mod watch;
