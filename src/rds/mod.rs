// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `rds` module implements the RDS link layer of §4.E: block synchronization and Meggitt
//! correction ([`block_sync`]), the systematic (26,16) cyclic code ([`offsets`]), group payload
//! decoding ([`group`]), and the PI-keyed station database ([`database`]).

pub mod block_sync;
pub mod database;
pub mod group;
pub mod offsets;

pub use block_sync::{BlockSync, RdsGroup};
pub use database::{ClockTime, Station, StationDatabase};
pub use group::{decode_group, DecodedGroup, GroupHeader, GroupPayload};
