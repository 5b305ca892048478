//! Background worker for Brain Intake: claims `process_file_and_notify` and
//! `process_crawl_and_notify` jobs from the broker and runs them.

pub mod config;
pub mod crawl;
pub mod runner;
pub mod tasks;
