//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with equipment.

pub mod arm;
