// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[macro_use]
pub mod decoder;
#[macro_use]
pub mod encoder;

pub use decoder::*;
pub use encoder::*;
