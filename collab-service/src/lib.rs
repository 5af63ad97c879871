//! collab-service: brokers collaborative editing sessions on an external pad
//! service for documents owned by the content service.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
