pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod db;
pub mod response;
pub mod storage;
pub mod tabular;
