// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2026 PouchContainer Authors

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = pouchrobot_core::parse_travis(s);
        let _ = pouchrobot_core::parse_circleci(s);
    }
});
