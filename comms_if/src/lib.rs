//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the binary frames exchanged
//! with the vehicle's boards and sensors, and the messages exchanged with the operator console.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Messages exchanged with the operator console
pub mod console;

/// Frame formats and decoders for the onboard equipment (sensors, boards, joystick)
pub mod eqpt;

/// Controller gain tables, shared between the console and the core
pub mod gains;

/// Network module
pub mod net;
