//! Live hockey game tracking engine with its HTTP and SSE surface.

pub mod config;
pub mod dao;
mod dto;
pub mod engine;
mod error;
pub mod routes;
pub mod services;
pub mod state;
