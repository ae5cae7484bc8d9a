mod common;
mod kernel_tests;
mod pipeline_tests;
mod watch_tests;
