// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod id;

pub use id::Id;
