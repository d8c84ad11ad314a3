//! Linear probing shared by [`HashMap`](crate::hash_map::HashMap) and
//! [`HashMapLocal`](crate::hash_map_local::HashMapLocal).
//!
//! Slot states are packed two bits per slot, four slots per byte.

/// State of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum SlotState {
    Empty = 0,
    Placeholder = 1,
    Occupied = 2,
}

impl SlotState {
    #[inline]
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => SlotState::Empty,
            1 => SlotState::Placeholder,
            _ => SlotState::Occupied,
        }
    }
}

/// Number of bytes needed to hold `capacity` packed slot states.
#[inline]
pub(crate) fn info_bytes(capacity: usize) -> usize {
    capacity.div_ceil(4)
}

/// Extract the state of slot `index` from the byte that holds it.
#[inline]
pub(crate) fn slot_in_byte(byte: u8, index: usize) -> SlotState {
    SlotState::from_bits(byte >> ((index % 4) * 2))
}

/// Read slot `index` from a packed slot-info array.
#[inline]
pub(crate) fn read_slot(info: &[u8], index: usize) -> SlotState {
    slot_in_byte(info[index / 4], index)
}

/// Write slot `index` into a packed slot-info array.
#[inline]
pub(crate) fn write_slot(info: &mut [u8], index: usize, state: SlotState) {
    let shift = (index % 4) * 2;
    let byte = &mut info[index / 4];
    *byte = (*byte & !(0b11 << shift)) | ((state as u8) << shift);
}

/// Outcome of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// An occupied slot holds an equal key.
    Found(usize),
    /// Key absent; this is where it should be inserted. Prefers the first
    /// placeholder seen over the terminating empty slot.
    Vacant(usize),
    /// Key absent and no slot is free.
    Full,
}

/// Scan up to `capacity` slots starting at `hash % capacity`.
///
/// Stops at the first empty slot or at the first occupied slot whose key
/// matches. Placeholders are remembered as insertion points but scanning
/// continues past them, since the key may live further along.
pub(crate) fn probe(
    hash: u64,
    capacity: usize,
    mut state_at: impl FnMut(usize) -> SlotState,
    mut key_matches: impl FnMut(usize) -> bool,
) -> Probe {
    if capacity == 0 {
        return Probe::Full;
    }
    let base = (hash % capacity as u64) as usize;
    let mut first_free: Option<usize> = None;

    for offset in 0..capacity {
        let index = (base + offset) % capacity;
        match state_at(index) {
            SlotState::Empty => return Probe::Vacant(first_free.unwrap_or(index)),
            SlotState::Placeholder => {
                if first_free.is_none() {
                    first_free = Some(index);
                }
            }
            SlotState::Occupied => {
                if key_matches(index) {
                    return Probe::Found(index);
                }
            }
        }
    }

    first_free.map_or(Probe::Full, Probe::Vacant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_bits_roundtrip_without_disturbing_neighbours() {
        let mut info = vec![0u8; info_bytes(9)];
        assert_eq!(info.len(), 3);
        write_slot(&mut info, 5, SlotState::Occupied);
        write_slot(&mut info, 6, SlotState::Placeholder);
        assert_eq!(read_slot(&info, 4), SlotState::Empty);
        assert_eq!(read_slot(&info, 5), SlotState::Occupied);
        assert_eq!(read_slot(&info, 6), SlotState::Placeholder);
        assert_eq!(read_slot(&info, 7), SlotState::Empty);

        write_slot(&mut info, 5, SlotState::Empty);
        assert_eq!(read_slot(&info, 5), SlotState::Empty);
        assert_eq!(read_slot(&info, 6), SlotState::Placeholder);
    }

    #[test]
    fn probe_stops_at_first_empty() {
        let states = [SlotState::Occupied, SlotState::Empty, SlotState::Empty];
        let result = probe(0, 3, |i| states[i], |_| false);
        assert_eq!(result, Probe::Vacant(1));
    }

    #[test]
    fn probe_prefers_first_placeholder_but_keeps_scanning() {
        let states = [
            SlotState::Placeholder,
            SlotState::Placeholder,
            SlotState::Occupied,
            SlotState::Empty,
        ];
        assert_eq!(probe(0, 4, |i| states[i], |_| false), Probe::Vacant(0));
        // The match sits past the placeholders.
        assert_eq!(probe(0, 4, |i| states[i], |i| i == 2), Probe::Found(2));
    }

    #[test]
    fn probe_wraps_around() {
        let states = [SlotState::Empty, SlotState::Occupied, SlotState::Occupied];
        assert_eq!(probe(2, 3, |i| states[i], |_| false), Probe::Vacant(0));
    }

    #[test]
    fn probe_full_and_zero_capacity() {
        let states = [SlotState::Occupied; 3];
        assert_eq!(probe(1, 3, |i| states[i], |_| false), Probe::Full);
        assert_eq!(probe(1, 0, |_| SlotState::Empty, |_| false), Probe::Full);
    }
}
