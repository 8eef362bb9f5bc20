mod block_height;
mod env;
mod execution_node;
mod log;
mod output;
mod prompt;
mod run;
mod scanner;
#[cfg(test)]
mod test_server;
mod units;
mod wallet;

pub use run::{start_interactive_scan, start_scan};
