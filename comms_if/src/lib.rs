//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the text command protocol
//! spoken by operators, the binary frames exchanged with the arm, and the network publisher used
//! to broadcast arm status.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Text command (telecommand) protocol
pub mod tc;

/// Frame definitions for equipment (like the robot arm)
pub mod eqpt;

/// Network module
pub mod net;
