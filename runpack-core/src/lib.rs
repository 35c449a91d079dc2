//! Runpack Core
//!
//! Core types shared by the Runpack runner and its queue client.
//!
//! This crate contains:
//! - Domain types: runner identity, job descriptors, heartbeats and outcomes
//! - DTOs: request and response bodies exchanged with the queue service

pub mod domain;
pub mod dto;
