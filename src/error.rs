// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error taxonomy of the engine.
//!
//! Errors come in two tiers. *Hard* errors (protocol/header mismatch, missing
//! default-type-set provider, identity collisions at registration) abort the
//! current call and are returned as `Err`. *Soft* errors (framing corruption,
//! unresolved type identities, field-level failures inside a record) are
//! recovered locally: the archive routes them through an [`ErrorSink`] and
//! keeps going, so one bad record never takes its siblings down with it.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;

/// Error type for all serialization and deserialization operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Read past the end of the underlying buffer.
    #[error("buffer out of bound: {0} + {1} > {2}")]
    BufferOutOfBound(usize, usize, usize),

    /// Stream header carries an unsupported protocol byte.
    #[error("protocol mismatch: expected {expected}, found {found}")]
    ProtocolMismatch { expected: u8, found: u8 },

    /// The stream declares a default type set but no provider was supplied.
    /// This is a caller contract violation, not a data error.
    #[error("stream declares default type set version {0} but no provider was given")]
    MissingTypeSetProvider(i32),

    /// Two registrations claimed the same wire identity.
    #[error("duplicate type identity: {0}")]
    DuplicateIdentity(Cow<'static, str>),

    /// A section's declared extent did not match what was consumed.
    /// The cursor has already been repositioned at the section end.
    #[error("section framing mismatch: {0}")]
    FramingMismatch(Cow<'static, str>),

    /// A wire identity could not be resolved to a registered type.
    #[error("unresolved type identity: {0}")]
    UnknownType(Cow<'static, str>),

    /// Malformed or corrupted wire data.
    #[error("{0}")]
    InvalidData(Cow<'static, str>),

    /// Operation not supported by this backend or configuration.
    #[error("{0}")]
    Unsupported(Cow<'static, str>),

    /// Operation not allowed in the current state.
    #[error("{0}")]
    NotAllowed(Cow<'static, str>),

    /// A record's own field (de)serialization failed.
    #[error("record field error: {0}")]
    FieldError(Cow<'static, str>),

    /// I/O failure in a streaming backend.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped cause from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    #[cold]
    pub fn buffer_out_of_bound(offset: usize, length: usize, capacity: usize) -> Self {
        Error::BufferOutOfBound(offset, length, capacity)
    }

    #[cold]
    pub fn unknown_type<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::UnknownType(s.into())
    }

    #[cold]
    pub fn invalid_data<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::InvalidData(s.into())
    }

    #[cold]
    pub fn duplicate_identity<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::DuplicateIdentity(s.into())
    }

    #[cold]
    pub fn unsupported<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::Unsupported(s.into())
    }

    #[cold]
    pub fn not_allowed<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::NotAllowed(s.into())
    }

    #[cold]
    pub fn field_error<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::FieldError(s.into())
    }

    #[cold]
    pub fn framing_mismatch<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Error::FramingMismatch(s.into())
    }

    /// Whether this error belongs to the soft tier the archive recovers from.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Error::FramingMismatch(_) | Error::UnknownType(_) | Error::FieldError(_)
        )
    }
}

/// Returns early unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::invalid_data(format!($fmt, $($arg)*)));
        }
    };
}

/// Shared callback invoked for every soft error.
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Collector for soft errors raised during one (de)serialization pass.
///
/// Every reported error is retained so batch callers can finish and inspect a
/// summary, and forwarded to the optional callback as it happens.
#[derive(Default)]
pub struct ErrorSink {
    errors: Vec<Error>,
    callback: Option<ErrorCallback>,
}

impl ErrorSink {
    pub fn new(callback: Option<ErrorCallback>) -> Self {
        ErrorSink {
            errors: Vec::new(),
            callback,
        }
    }

    pub fn report(&mut self, err: Error) {
        log::warn!("soft serialization error: {err}");
        if let Some(cb) = &self.callback {
            cb(&err);
        }
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn take(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }
}
