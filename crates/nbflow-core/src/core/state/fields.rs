use crate::core::models::flags::flag_set;

flag_set! {
    /// Marks which optional fields of a [`SimulationState`](super::SimulationState)
    /// hold meaningful data. A field whose bit is clear must not be read or compared.
    pub struct StateFields: u32 {
        const LAMBDA = 1 << 0;
        const BOX = 1 << 1;
        const BOX_REL = 1 << 2;
        const BOX_VELOCITY = 1 << 3;
        const PRESSURE_PREV = 1 << 4;
        const THERMOSTAT_CHAIN = 1 << 5;
        const THERMOSTAT_INTEGRAL = 1 << 6;
        const BAROSTAT_VELOCITY = 1 << 7;
        const BAROSTAT_CHAIN = 1 << 8;
        const POSITIONS = 1 << 9;
        const VELOCITIES = 1 << 10;
        const SHAKE_VIRIAL_PREV = 1 << 11;
        const FORCE_VIRIAL_PREV = 1 << 12;
        const FEP_STATE = 1 << 13;
    }
}

/// Interaction component a free-energy coupling parameter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreeEnergyComponent {
    Fep,
    Mass,
    Coulomb,
    Vdw,
    Bonded,
    Restraint,
    Temperature,
}

impl FreeEnergyComponent {
    pub const COUNT: usize = 7;

    pub const ALL: [FreeEnergyComponent; Self::COUNT] = [
        FreeEnergyComponent::Fep,
        FreeEnergyComponent::Mass,
        FreeEnergyComponent::Coulomb,
        FreeEnergyComponent::Vdw,
        FreeEnergyComponent::Bonded,
        FreeEnergyComponent::Restraint,
        FreeEnergyComponent::Temperature,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}
