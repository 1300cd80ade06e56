//! Particle-size-distribution evolution engine for a circum-planetary dust disk.
//!
//! Leaf modules: dynamics, kernel, disruption, fragments, gain
//! Step modules: shielding, supply, sublimation, radiation, integrator
//! Drivers: cell, ensemble, surface, diagnostics

pub mod cell;
pub mod diagnostics;
pub mod disruption;
pub mod dynamics;
pub mod ensemble;
pub mod fragments;
pub mod gain;
pub mod integrator;
pub mod kernel;
pub mod radiation;
pub mod shielding;
pub mod sublimation;
pub mod supply;
pub mod surface;
