//! deepracer-setup, first-boot provisioning for the DeepRacer
//! vehicle image. Makes sure the SSH server has host keys and
//! that nginx has a self-signed certificate and console password,
//! delegating the actual generation to distro tooling.
//!
//! The checks are idempotent: once every guarded file exists,
//! a run invokes nothing. See [crate::provision::ProvisioningRunner].

#![warn(missing_docs)]
#[macro_use]
extern crate log;

pub mod command;
pub mod config;
pub mod doctor;
pub mod error;
pub mod provision;
