// VCDIFF address cache (RFC 3284, Section 5.3).
//
// Decompresses COPY addresses using the NEAR ring of recently used
// addresses and the SAME table keyed by `address mod (s_same * 256)`.
// Both tables are sized once per decode session from the code table
// header and only ever touched through index arithmetic.

use super::cursor::SectionCursor;
use super::error::WindowError;

/// Absolute address.
pub const VCD_SELF: u8 = 0;
/// Backward distance from "here".
pub const VCD_HERE: u8 = 1;

/// RFC 3284 default NEAR ring capacity.
pub const DEFAULT_NEAR_SIZE: u8 = 4;
/// RFC 3284 default number of SAME groups.
pub const DEFAULT_SAME_SIZE: u8 = 3;

/// NEAR/SAME address cache.
///
/// Default configuration (s_near=4, s_same=3) gives 9 address modes:
///   0      VCD_SELF  absolute
///   1      VCD_HERE  here - value
///   2..5   NEAR      near\[mode-2\] + value
///   6..8   SAME      same\[(mode-6)*256 + byte\]
#[derive(Debug, Clone)]
pub struct AddressCache {
    near: Box<[u64]>,
    same: Box<[u64]>,
    next_slot: usize,
}

impl AddressCache {
    /// Default RFC 3284 cache: s_near=4, s_same=3.
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_NEAR_SIZE, DEFAULT_SAME_SIZE)
    }

    /// Cache sized by an application-defined code table.
    ///
    /// Both sizes come from single header bytes; callers must reject
    /// combinations whose mode count exceeds 256.
    pub fn with_sizes(s_near: u8, s_same: u8) -> Self {
        Self {
            near: vec![0; usize::from(s_near)].into_boxed_slice(),
            same: vec![0; usize::from(s_same) * 256].into_boxed_slice(),
            next_slot: 0,
        }
    }

    /// Clear both tables and rewind the NEAR ring.
    pub fn reset(&mut self) {
        self.near.fill(0);
        self.same.fill(0);
        self.next_slot = 0;
    }

    #[inline]
    pub fn near_size(&self) -> usize {
        self.near.len()
    }

    #[inline]
    pub fn same_size(&self) -> usize {
        self.same.len() / 256
    }

    /// Total number of address modes (2 + s_near + s_same).
    #[inline]
    pub fn mode_count(&self) -> usize {
        2 + self.near_size() + self.same_size()
    }

    #[inline]
    fn same_start(&self) -> usize {
        2 + self.near_size()
    }

    /// Record a resolved address in both tables.
    #[inline]
    fn update(&mut self, address: u64) {
        if !self.near.is_empty() {
            self.near[self.next_slot] = address;
            self.next_slot = (self.next_slot + 1) % self.near.len();
        }
        if !self.same.is_empty() {
            let idx = (address % self.same.len() as u64) as usize;
            self.same[idx] = address;
        }
    }

    /// Decode the address of a COPY instruction.
    ///
    /// `here` is the size of the addressable region at the time of the
    /// copy (source segment length plus bytes of this window already
    /// emitted); every valid address is strictly below it.
    pub fn resolve(
        &mut self,
        here: u64,
        mode: u8,
        addresses: &mut SectionCursor<'_>,
    ) -> Result<u64, WindowError> {
        let m = usize::from(mode);
        if m >= self.mode_count() {
            return Err(WindowError::UnknownMode(mode));
        }

        let address = if m >= self.same_start() {
            let byte = addresses.read_byte()?;
            self.same[(m - self.same_start()) * 256 + usize::from(byte)]
        } else {
            let raw = addresses.read_u64()?;
            match mode {
                VCD_SELF => raw,
                VCD_HERE => here.checked_sub(raw).ok_or(WindowError::InvalidAddress {
                    address: raw,
                    limit: here,
                })?,
                _ => {
                    let base = self.near[m - 2];
                    base.checked_add(raw).ok_or(WindowError::SizeOverflow {
                        section: addresses.section(),
                        offset: addresses.position(),
                    })?
                }
            }
        };

        if address >= here {
            return Err(WindowError::InvalidAddress {
                address,
                limit: here,
            });
        }

        self.update(address);
        Ok(address)
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcdiff::error::Section;
    use crate::vcdiff::varint;

    fn addr_section(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn default_cache_params() {
        let c = AddressCache::new();
        assert_eq!(c.near_size(), 4);
        assert_eq!(c.same_size(), 3);
        assert_eq!(c.mode_count(), 9);
    }

    #[test]
    fn self_and_here_modes() {
        let mut c = AddressCache::new();
        let data = addr_section(&[&varint::encode(42), &varint::encode(10)]);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        assert_eq!(c.resolve(1000, VCD_SELF, &mut cur), Ok(42));
        assert_eq!(c.resolve(1000, VCD_HERE, &mut cur), Ok(990));
        assert!(cur.is_empty());
    }

    #[test]
    fn near_mode_adds_to_slot() {
        let mut c = AddressCache::new();
        // SELF 500 lands in NEAR slot 0; mode 2 then reads slot 0 + 5.
        let data = addr_section(&[&varint::encode(500), &varint::encode(5)]);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        assert_eq!(c.resolve(10_000, VCD_SELF, &mut cur), Ok(500));
        assert_eq!(c.resolve(10_000, 2, &mut cur), Ok(505));
        // 505 went into slot 1.
        assert_eq!(c.near[1], 505);
    }

    #[test]
    fn same_mode_reads_one_raw_byte() {
        let mut c = AddressCache::new();
        // 12345 % 768 = 57 -> group 0, byte 57.
        let data = addr_section(&[&varint::encode(12345), &[57]]);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        c.resolve(20_000, VCD_SELF, &mut cur).unwrap();
        assert_eq!(c.resolve(20_000, 6, &mut cur), Ok(12345));
        assert!(cur.is_empty());
    }

    #[test]
    fn same_mode_group_selects_slot_range() {
        let mut c = AddressCache::new();
        // 300 % 768 = 300 -> group 1 (mode 7), byte 44.
        let data = addr_section(&[&varint::encode(300), &[44]]);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        c.resolve(1000, VCD_SELF, &mut cur).unwrap();
        assert_eq!(c.resolve(1000, 7, &mut cur), Ok(300));
    }

    #[test]
    fn address_at_or_past_here_is_invalid() {
        let mut c = AddressCache::new();
        let data = varint::encode(100);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        assert_eq!(
            c.resolve(100, VCD_SELF, &mut cur),
            Err(WindowError::InvalidAddress {
                address: 100,
                limit: 100
            })
        );
    }

    #[test]
    fn here_distance_past_zero_is_invalid() {
        let mut c = AddressCache::new();
        let data = varint::encode(11);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        assert!(matches!(
            c.resolve(10, VCD_HERE, &mut cur),
            Err(WindowError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn mode_out_of_range_is_unknown() {
        let mut c = AddressCache::new();
        let mut cur = SectionCursor::new(Section::Addr, &[0]);
        assert_eq!(
            c.resolve(10, 9, &mut cur),
            Err(WindowError::UnknownMode(9))
        );
    }

    #[test]
    fn empty_address_section_is_truncation() {
        let mut c = AddressCache::new();
        let mut cur = SectionCursor::new(Section::Addr, &[]);
        assert!(matches!(
            c.resolve(10, 6, &mut cur),
            Err(WindowError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn near_ring_is_circular() {
        let mut c = AddressCache::new();
        for i in 0..5u64 {
            c.update(i * 100);
        }
        assert_eq!(&c.near[..], &[400, 100, 200, 300]);
    }

    #[test]
    fn reset_clears_history() {
        let mut c = AddressCache::new();
        c.update(999);
        c.reset();
        assert!(c.near.iter().all(|&x| x == 0));
        assert!(c.same.iter().all(|&x| x == 0));
        assert_eq!(c.next_slot, 0);
    }

    #[test]
    fn resolution_is_deterministic_from_reset() {
        let data = addr_section(&[
            &varint::encode(7),
            &varint::encode(3),
            &[7],
            &varint::encode(2),
            &varint::encode(40),
        ]);
        let modes = [VCD_SELF, VCD_HERE, 6, 3, VCD_SELF];
        let run = |cache: &mut AddressCache| {
            cache.reset();
            let mut cur = SectionCursor::new(Section::Addr, &data);
            modes
                .iter()
                .map(|&m| cache.resolve(50, m, &mut cur).unwrap())
                .collect::<Vec<_>>()
        };
        let mut cache = AddressCache::new();
        let first = run(&mut cache);
        let second = run(&mut cache);
        assert_eq!(first, vec![7, 47, 7, 49, 40]);
        assert_eq!(first, second);
    }

    #[test]
    fn custom_sizes_shift_same_modes() {
        let mut c = AddressCache::with_sizes(0, 1);
        assert_eq!(c.mode_count(), 3);
        let data = addr_section(&[&varint::encode(513), &[1]]);
        let mut cur = SectionCursor::new(Section::Addr, &data);
        c.resolve(1000, VCD_SELF, &mut cur).unwrap();
        assert_eq!(c.resolve(1000, 2, &mut cur), Ok(513));
    }
}
