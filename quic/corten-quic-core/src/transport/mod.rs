// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod error;
#[cfg(feature = "alloc")]
pub mod parameters;

pub use error::Error;
