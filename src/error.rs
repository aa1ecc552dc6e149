// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `usb_hotplug` library.
//!
//! This module provides the error hierarchy for handling failures across the
//! library: configuration values, bus enumeration, per-device workers, and
//! detector lifecycle misuse.

use thiserror::Error;

use crate::detector::DetectorState;
use crate::device::UsbDevice;

/// Boxed error type returned by per-device worker handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value was rejected.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Listing the devices on the bus failed.
    #[error("enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    /// A per-device worker failed and the failure policy asked to propagate it.
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// No enumeration backend is available on this platform.
    #[error("no suitable USB enumeration backend for this platform")]
    NoBackend,

    /// The detector was started outside of a Tokio runtime.
    #[error("no Tokio runtime available to run the detector")]
    NoRuntime,

    /// The requested operation is not allowed in the detector's current state.
    #[error("cannot {operation} a detector that is {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the detector was in.
        state: DetectorState,
    },
}

/// Errors related to configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A vendor or product ID string is not a 16-bit hexadecimal number.
    #[error("invalid USB ID: {0:?}")]
    InvalidUsbId(String),

    /// The poll interval must be greater than zero.
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Errors returned by a device enumeration backend.
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// The OS reported an I/O or permission error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The USB subsystem is not available right now.
    #[error("USB subsystem unavailable: {0}")]
    Unavailable(String),

    /// The blocking enumeration task did not complete.
    #[error("enumeration task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by per-device workers.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The handler returned an error.
    #[error("worker for {device} failed: {source}")]
    Failed {
        /// The device the worker was started for.
        device: UsbDevice,
        /// The error returned by the handler.
        source: BoxError,
    },

    /// The handler panicked.
    #[error("worker for {device} panicked: {message}")]
    Panicked {
        /// The device the worker was started for.
        device: UsbDevice,
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl WorkerError {
    /// Returns the device whose worker failed.
    #[must_use]
    pub fn device(&self) -> &UsbDevice {
        match self {
            Self::Failed { device, .. } | Self::Panicked { device, .. } => device,
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
