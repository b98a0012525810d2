//! C12: the permissions bitfield stored (as a signed 32-bit integer, for
//! historical reasons) in `/Encrypt /P`. Only bits 3-6 and 9-12 carry
//! meaning; everything else — including the reserved bits 1, 2, 7, 8 — must
//! be set to 1, and so must every bit above 12 (ISO 32000-1 Table 22).

use bitflags::bitflags;

bitflags! {
    /// The permission bits a Standard-security-handler document grants (or
    /// withholds) from a user who only knows the user password.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Bit 3: print the document (at all).
        const PRINT = 1 << 2;
        /// Bit 4: modify the document's contents, other than the operations
        /// controlled by bits 6, 9, and 11.
        const MODIFY_CONTENTS = 1 << 3;
        /// Bit 5: copy or otherwise extract text and graphics.
        const COPY = 1 << 4;
        /// Bit 6: add or modify text annotations and form fields.
        const MODIFY_ANNOTATIONS = 1 << 5;
        /// Bit 9: fill in existing form fields (revision 3+).
        const FILL_FORMS = 1 << 8;
        /// Bit 10: extract text/graphics for accessibility (revision 3+).
        const EXTRACT_FOR_ACCESSIBILITY = 1 << 9;
        /// Bit 11: assemble the document — insert, delete, rotate pages,
        /// create bookmarks or thumbnails (revision 3+).
        const ASSEMBLE_DOCUMENT = 1 << 10;
        /// Bit 12: print at full/high-resolution quality (revision 3+); if
        /// clear but `PRINT` is set, printing is limited to a low-res form.
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Bits 1, 2, 7, 8, and everything above bit 12 are reserved and must read
/// as 1 in a conforming `/P` value.
const RESERVED_ONE_BITS: u32 = 0xFFFF_F0C3;

impl Permissions {
    /// All meaningful bits granted — the default for an unprotected or
    /// owner-authenticated document.
    pub fn all_granted() -> Self {
        Permissions::all()
    }

    /// Decode a raw `/P` value, ignoring the reserved bits.
    pub fn from_bits_lenient(raw: i32) -> Self {
        Permissions::from_bits_truncate(raw as u32)
    }

    /// Encode as the signed 32-bit integer `/P` expects, with every reserved
    /// bit forced to 1 per the spec.
    pub fn to_raw(self) -> i32 {
        (self.bits() | RESERVED_ONE_BITS) as i32
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all_granted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_raw_with_reserved_bits_set() {
        let perms = Permissions::PRINT | Permissions::COPY;
        let raw = perms.to_raw();
        assert_eq!(raw & 0b11, 0b11); // bits 1,2 forced on
        let decoded = Permissions::from_bits_lenient(raw);
        assert!(decoded.contains(Permissions::PRINT));
        assert!(decoded.contains(Permissions::COPY));
        assert!(!decoded.contains(Permissions::MODIFY_CONTENTS));
    }

    #[test]
    fn all_granted_permits_everything_meaningful() {
        let perms = Permissions::all_granted();
        assert!(perms.contains(Permissions::ASSEMBLE_DOCUMENT));
        assert!(perms.contains(Permissions::PRINT_HIGH_QUALITY));
    }
}
