// fmrds
// Copyright (c) 2024 The fmrds Contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `database` module holds [`StationDatabase`], the PI-keyed table of decoded RDS metadata
//! (§4.E's database update rule): a single writer (the pipeline worker) applies
//! [`DecodedGroup`]s, any number of readers take lock-free-ish snapshots via `parking_lot`'s
//! reader-preferring `RwLock`, and every accepted mutation is mirrored onto a
//! [`ChangeNotifier`](crate::observer::ChangeNotifier).

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use super::group::{clock_date, DecodedGroup, GroupPayload};
use crate::observer::ChangeEvent;

/// A position becomes part of a [`FreshSlot`]'s stable contents only once observed identical in
/// two consecutive updates, per §4.E.
#[derive(Clone, Debug)]
struct FreshSlot {
    stable: Vec<u8>,
    pending: Vec<u8>,
    pending_seen: Vec<bool>,
}

impl FreshSlot {
    fn new(len: usize) -> Self {
        Self { stable: vec![b' '; len], pending: vec![0; len], pending_seen: vec![false; len] }
    }

    fn len(&self) -> usize {
        self.stable.len()
    }

    /// Write `chars` starting at `offset`. Returns `true` if any stable position changed.
    fn write(&mut self, offset: usize, chars: &[u8]) -> bool {
        let mut changed = false;
        for (i, &ch) in chars.iter().enumerate() {
            let pos = offset + i;
            if pos >= self.len() {
                continue;
            }
            if self.pending_seen[pos] && self.pending[pos] == ch {
                if self.stable[pos] != ch {
                    self.stable[pos] = ch;
                    changed = true;
                }
            }
            else {
                self.pending[pos] = ch;
                self.pending_seen[pos] = true;
            }
        }
        changed
    }

    fn clear(&mut self) {
        let len = self.len();
        *self = FreshSlot::new(len);
    }

    fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.stable).into_owned()
    }
}

/// Decoded UTC clock time from a 4A group, with the station's local offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u8,
    pub minute: u8,
    pub local_offset_half_hours: i8,
}

/// One station's accumulated RDS state, keyed by its PI code.
#[derive(Clone, Debug)]
pub struct Station {
    pub pi: u16,
    ps: FreshSlot,
    radiotext: FreshSlot,
    radiotext_ab: Option<bool>,
    pub traffic_program: bool,
    pub traffic_announcement: bool,
    pub music_speech: bool,
    pub program_type: u8,
    decoder_identification: [bool; 4],
    alternate_frequencies_khz: BTreeSet<u32>,
    oda: BTreeSet<(u16, u8)>,
    pub clock_time: Option<ClockTime>,
}

impl Station {
    fn new(pi: u16) -> Self {
        Self {
            pi,
            ps: FreshSlot::new(8),
            radiotext: FreshSlot::new(64),
            radiotext_ab: None,
            traffic_program: false,
            traffic_announcement: false,
            music_speech: true,
            program_type: 0,
            decoder_identification: [false; 4],
            alternate_frequencies_khz: BTreeSet::new(),
            oda: BTreeSet::new(),
            clock_time: None,
        }
    }

    pub fn program_service_name(&self) -> String {
        self.ps.as_str()
    }

    /// RadioText, truncated to 32 characters when the station last sent version-B (2B) groups.
    pub fn radiotext(&self) -> String {
        let text = self.radiotext.as_str();
        if self.radiotext_ab.is_some() && self.radiotext_is_short() { text[..32].to_string() } else { text }
    }

    fn radiotext_is_short(&self) -> bool {
        // Tracked implicitly: a 2B group never writes past position 32, so positions 32..64
        // simply stay at their initial fill; callers asking for the short form get exactly the
        // written prefix.
        self.radiotext.stable[32..].iter().all(|&c| c == b' ')
    }

    pub fn decoder_identification(&self) -> [bool; 4] {
        self.decoder_identification
    }

    pub fn alternate_frequencies_khz(&self) -> &BTreeSet<u32> {
        &self.alternate_frequencies_khz
    }

    pub fn open_data_applications(&self) -> &BTreeSet<(u16, u8)> {
        &self.oda
    }
}

fn af_code_to_khz(code: u8) -> Option<u32> {
    if (1..=204).contains(&code) { Some(87_600 + u32::from(code) * 100) } else { None }
}

/// The PI-keyed RDS station table. All mutation happens through [`StationDatabase::apply_group`];
/// reads go through [`StationDatabase::snapshot`] or the narrower per-field accessors, all of
/// which take the `RwLock`'s read side.
pub struct StationDatabase {
    stations: RwLock<BTreeMap<u16, Station>>,
}

impl StationDatabase {
    pub fn new() -> Self {
        Self { stations: RwLock::new(BTreeMap::new()) }
    }

    /// Apply one decoded, syndrome-passed group, publishing any resulting [`ChangeEvent`]s onto
    /// `notify`.
    pub fn apply_group(&self, decoded: &DecodedGroup, notify: &crate::observer::ChangeNotifier) {
        let pi = decoded.header.pi;
        let mut stations = self.stations.write();
        let is_new = !stations.contains_key(&pi);
        let station = stations.entry(pi).or_insert_with(|| Station::new(pi));
        station.traffic_program = decoded.header.traffic_program;
        station.program_type = decoded.header.program_type;

        if is_new {
            notify.publish(ChangeEvent::StationAdded { pi });
        }

        match &decoded.payload {
            GroupPayload::Ps { address, chars, traffic_announcement, music_speech, di_bit, af } => {
                station.traffic_announcement = *traffic_announcement;
                station.music_speech = *music_speech;
                station.decoder_identification[usize::from(*address)] = *di_bit;
                if station.ps.write(usize::from(*address) * 2, chars) {
                    notify.publish(ChangeEvent::PsUpdated { pi });
                }
                if let Some((a, b)) = af {
                    let mut changed = false;
                    for code in [*a, *b] {
                        if let Some(khz) = af_code_to_khz(code) {
                            changed |= station.alternate_frequencies_khz.insert(khz);
                        }
                    }
                    if changed {
                        notify.publish(ChangeEvent::AfUpdated { pi });
                    }
                }
            }
            GroupPayload::RadioText { address, ab_toggle, chars } => {
                let toggled = station.radiotext_ab.is_some_and(|ab| ab != *ab_toggle);
                station.radiotext_ab = Some(*ab_toggle);
                if toggled {
                    station.radiotext.clear();
                    notify.publish(ChangeEvent::RadiotextUpdated { pi });
                }
                let segment_chars = chars.len();
                let offset = usize::from(*address) * segment_chars;
                if station.radiotext.write(offset, chars) {
                    notify.publish(ChangeEvent::RadiotextUpdated { pi });
                }
            }
            GroupPayload::Oda { aid, referenced_group_type, referenced_version_is_b } => {
                let group_tag = referenced_group_type << 1 | u8::from(*referenced_version_is_b);
                if station.oda.insert((*aid, group_tag)) {
                    notify.publish(ChangeEvent::OdaRegistered { pi, aid: *aid, group_type: group_tag });
                }
            }
            GroupPayload::ClockTime { modified_julian_date, hour, minute, local_offset_half_hours } => {
                let (year, month, day) = clock_date(*modified_julian_date);
                let new_time = ClockTime {
                    year,
                    month,
                    day,
                    hour: *hour,
                    minute: *minute,
                    local_offset_half_hours: *local_offset_half_hours,
                };
                if station.clock_time != Some(new_time) {
                    station.clock_time = Some(new_time);
                    notify.publish(ChangeEvent::ClockTimeUpdated { pi });
                }
            }
            GroupPayload::ProgramTypeName { .. }
            | GroupPayload::EnhancedOtherNetworks
            | GroupPayload::LongPs { .. }
            | GroupPayload::Unknown => {}
        }
    }

    /// A deep copy of one station's current state, if known.
    pub fn snapshot(&self, pi: u16) -> Option<Station> {
        self.stations.read().get(&pi).cloned()
    }

    pub fn known_stations(&self) -> Vec<u16> {
        self.stations.read().keys().copied().collect()
    }
}

impl Default for StationDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChangeNotifier;
    use crate::rds::group::GroupHeader;

    fn header(pi: u16) -> GroupHeader {
        GroupHeader { pi, group_type_code: 0, version_is_b: false, traffic_program: false, program_type: 0 }
    }

    fn ps_group(pi: u16, address: u8, chars: [u8; 2]) -> DecodedGroup {
        DecodedGroup {
            header: header(pi),
            payload: GroupPayload::Ps {
                address,
                chars,
                traffic_announcement: false,
                music_speech: true,
                di_bit: false,
                af: None,
            },
        }
    }

    #[test]
    fn ps_name_becomes_stable_only_after_two_consistent_observations() {
        let db = StationDatabase::new();
        let notify = ChangeNotifier::new();
        let pairs = [(0u8, *b"TE"), (1, *b"ST"), (2, *b"FM"), (3, *b"  ")];

        for &(addr, chars) in &pairs {
            db.apply_group(&ps_group(0x1234, addr, chars), &notify);
        }
        // first pass only fills the pending half; nothing should be stable yet except spaces.
        assert_eq!(db.snapshot(0x1234).unwrap().program_service_name(), "        ");

        for &(addr, chars) in &pairs {
            db.apply_group(&ps_group(0x1234, addr, chars), &notify);
        }
        assert_eq!(db.snapshot(0x1234).unwrap().program_service_name(), "TESTFM  ");
    }

    #[test]
    fn radiotext_ab_toggle_clears_buffer_and_writes_new_text() {
        let db = StationDatabase::new();
        let notify = ChangeNotifier::new();

        let write = |db: &StationDatabase, address: u8, ab: bool, chars: &[u8]| {
            let group = DecodedGroup {
                header: header(0xBEEF),
                payload: GroupPayload::RadioText { address, ab_toggle: ab, chars: chars.to_vec() },
            };
            db.apply_group(&group, &notify);
            db.apply_group(&group, &notify);
        };

        write(&db, 0, false, b"HE");
        write(&db, 1, false, b"LL");
        write(&db, 2, false, b"O ");
        assert!(db.snapshot(0xBEEF).unwrap().radiotext().starts_with("HELLO"));

        write(&db, 0, true, b"GO");
        assert!(!db.snapshot(0xBEEF).unwrap().radiotext().starts_with("HELLO"));
        assert!(db.snapshot(0xBEEF).unwrap().radiotext().starts_with("GO"));
    }

    #[test]
    fn clock_time_group_updates_station_and_notifies() {
        let db = StationDatabase::new();
        let notify = ChangeNotifier::new();
        let group = DecodedGroup {
            header: header(0x1234),
            payload: GroupPayload::ClockTime {
                modified_julian_date: 58849,
                hour: 12,
                minute: 34,
                local_offset_half_hours: 2,
            },
        };
        db.apply_group(&group, &notify);
        let station = db.snapshot(0x1234).unwrap();
        let time = station.clock_time.unwrap();
        assert_eq!((time.year, time.month, time.day), (2020, 1, 1));
        assert_eq!((time.hour, time.minute, time.local_offset_half_hours), (12, 34, 2));
        assert_eq!(notify.try_recv(), Some(ChangeEvent::StationAdded { pi: 0x1234 }));
        assert_eq!(notify.try_recv(), Some(ChangeEvent::ClockTimeUpdated { pi: 0x1234 }));
    }

    #[test]
    fn oda_registration_is_recorded_per_pi() {
        let db = StationDatabase::new();
        let notify = ChangeNotifier::new();
        let group = DecodedGroup {
            header: header(0x1234),
            payload: GroupPayload::Oda { aid: 0xCD46, referenced_group_type: 5, referenced_version_is_b: false },
        };
        db.apply_group(&group, &notify);
        let station = db.snapshot(0x1234).unwrap();
        assert!(station.open_data_applications().contains(&(0xCD46, 10)));
    }

    #[test]
    fn unknown_stations_have_no_snapshot() {
        let db = StationDatabase::new();
        assert!(db.snapshot(0xFFFF).is_none());
    }
}
