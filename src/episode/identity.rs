// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rand::Rng;

/// Generate a random RFC 4122 version 4 identifier in hyphenated form.
///
/// Unique enough to tell same-titled episodes apart locally; not meant as
/// a global identity.
pub fn generate_identity() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);

    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_has_uuid_shape() {
        let id = generate_identity();
        let groups: Vec<usize> = id.split('-').map(str::len).collect();

        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
        assert_eq!(id.as_bytes()[14], b'4');
    }

    #[test]
    fn identities_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_identity()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
