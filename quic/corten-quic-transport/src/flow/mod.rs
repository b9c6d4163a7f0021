// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Flow control accounting for the connection and stream scopes

pub mod rx;
pub mod stream;
pub mod tx;
