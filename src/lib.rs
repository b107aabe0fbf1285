pub mod app;
pub mod bundle;
pub mod config;
pub mod domain;
pub mod error;
pub mod filename;
pub mod fs_util;
pub mod http;
pub mod input;
pub mod listing;
pub mod mapping;
pub mod matching;
pub mod normalize;
pub mod output;
pub mod report;
pub mod resolver;
pub mod tui;
