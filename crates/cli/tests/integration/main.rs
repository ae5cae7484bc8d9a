mod common;
mod configure_tests;
mod run_tests;
mod shell_tests;
