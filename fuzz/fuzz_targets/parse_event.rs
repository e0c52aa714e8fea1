// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2026 PouchContainer Authors

#![no_main]

use libfuzzer_sys::fuzz_target;

const EVENT_TYPES: &[&str] = &["ping", "issues", "pull_request", "issue_comment", "fork"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let event_type = EVENT_TYPES[usize::from(selector) % EVENT_TYPES.len()];
    let _ = pouchrobot_core::parse_event(event_type, body);
});
