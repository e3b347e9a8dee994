//! Interface vocabulary, slots and exported handles.
//!
//! Every command or state interface is addressed by a full name
//! `entity/interface` (e.g. `joint1/position`). Backends store values in
//! flat matrices per vocabulary bank; an exported handle carries the
//! [`Slot`] that indexes the owning cell.

/// Standard position interface name.
pub const HW_IF_POSITION: &str = "position";
/// Standard velocity interface name.
pub const HW_IF_VELOCITY: &str = "velocity";
/// Standard acceleration interface name.
pub const HW_IF_ACCELERATION: &str = "acceleration";
/// Standard effort interface name.
pub const HW_IF_EFFORT: &str = "effort";

/// The fixed standard interface vocabulary, in storage-row order.
pub const STANDARD_INTERFACES: [&str; 4] =
    [HW_IF_POSITION, HW_IF_VELOCITY, HW_IF_ACCELERATION, HW_IF_EFFORT];

/// Row of the position interface in the standard bank.
pub const POSITION_ROW: usize = 0;
/// Row of the velocity interface in the standard bank.
pub const VELOCITY_ROW: usize = 1;

/// Which value matrix a slot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    /// Fixed standard vocabulary, joint columns.
    Standard,
    /// Discovered non-standard vocabulary, joint columns.
    Other,
    /// Sensor vocabulary, sensor columns.
    Sensor,
}

/// Index of one storage cell: `(bank, interface row, entity column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Owning bank.
    pub bank: Bank,
    /// Interface row within the bank.
    pub row: usize,
    /// Entity column within the bank.
    pub col: usize,
}

/// An exported command or state interface.
///
/// Handles are plain indices plus names; the value itself stays in the
/// backend's storage and is reached through
/// [`InterfaceAccess`](crate::backend::InterfaceAccess).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    /// Owning entity (joint or sensor) name.
    pub entity: String,
    /// Interface name within the entity.
    pub interface: String,
    /// Storage cell the handle points at.
    pub slot: Slot,
}

impl InterfaceHandle {
    /// Full `entity/interface` name of this handle.
    pub fn full_name(&self) -> String {
        full_name(&self.entity, &self.interface)
    }
}

/// Build the full `entity/interface` name.
pub fn full_name(entity: &str, interface: &str) -> String {
    format!("{entity}/{interface}")
}

/// Split a full name into `(entity, interface)`.
///
/// The interface part may itself contain `/`; the split is on the first
/// separator only.
pub fn split_full_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_round_trip() {
        let name = full_name("joint1", "position");
        assert_eq!(name, "joint1/position");
        assert_eq!(split_full_name(&name), Some(("joint1", "position")));
    }

    #[test]
    fn split_rejects_bare_names() {
        assert_eq!(split_full_name("position"), None);
    }

    #[test]
    fn split_keeps_nested_interface_names() {
        assert_eq!(split_full_name("tcp/force.x"), Some(("tcp", "force.x")));
    }

    #[test]
    fn standard_rows_match_vocabulary() {
        assert_eq!(STANDARD_INTERFACES[POSITION_ROW], HW_IF_POSITION);
        assert_eq!(STANDARD_INTERFACES[VELOCITY_ROW], HW_IF_VELOCITY);
    }
}
