//! A library for studying upstream dynamic bandwidth assignment in XG-PON (ITU-T G.987.3).
//!
//! The crate models the upstream data plane of a PON: XGEM and XGTC codecs, ONU connection queues
//! and T-CONT schedulers, and the OLT DBA producing bandwidth maps with the XGIANT family of
//! algorithms. [`simulation::XgponSimulation`] runs the whole loop frame by frame.
//!
//! ## Examples
//!
//! - [xgpon-dba](../../demos/xgpon-dba): runs a PON described by a YAML config and compares DBA engines.

#![allow(clippy::type_complexity)]

pub mod config;
pub mod connection;
pub mod context;
pub mod dba;
pub mod error;
pub mod link_info;
pub mod log;
pub mod onu;
pub mod packet;
pub mod phy;
pub mod qos;
pub mod queue;
pub mod simulation;
pub mod stats;
pub mod tcont;
pub mod traffic;
pub mod xgem;
pub mod xgtc;

pub use colored;
