//! Souq Commerce
//!
//! Trilingual (Arabic/English/French) storefront and back-office REST API.
//!
//! ## Features
//! - Product catalog with multilingual categories
//! - Guest and authenticated ordering
//! - Order lifecycle with transactional stock reconciliation
//! - Admin dashboard aggregates
//! - Image uploads to local disk

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
