//! 领域服务定义

pub mod auth_service;

pub use auth_service::*;
