//! Measurement kinds reported by Solivia inverters
//!
//! Every numeric field a Variant-15 measurement packet carries is identified
//! by a [`Measurement`] value. The kebab-case serde names are the ones used
//! in configuration files to enable fields per inverter.

use serde::{Deserialize, Serialize};

/// A numeric measurement field decoded from an inverter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Measurement {
    /// Lifetime supplied AC energy (kWh)
    SuppliedEnergyTotal,
    /// AC energy supplied today (Wh)
    SuppliedEnergyToday,
    /// Solar input voltage (V)
    SolarVoltage,
    /// Solar input current (A)
    SolarCurrent,
    /// AC output voltage (V)
    AcVoltage,
    /// AC output current (A)
    AcCurrent,
    /// AC output frequency (Hz)
    AcFrequency,
    /// AC output power (W)
    AcPower,
    /// Grid-side AC voltage (V)
    GridVoltage,
    /// Grid-side AC frequency (Hz)
    GridFrequency,
    /// Total inverter runtime (h)
    RuntimeHours,
    /// Inverter runtime today (min)
    RuntimeMinutes,
    /// Maximum AC power seen today (W)
    MaxAcPowerToday,
    /// Maximum solar input power seen today (W)
    MaxSolarInputPower,
}

impl Measurement {
    /// All measurement kinds, in payload order.
    pub const ALL: [Measurement; 14] = [
        Measurement::SolarVoltage,
        Measurement::SolarCurrent,
        Measurement::AcCurrent,
        Measurement::AcVoltage,
        Measurement::AcPower,
        Measurement::AcFrequency,
        Measurement::GridVoltage,
        Measurement::GridFrequency,
        Measurement::SuppliedEnergyToday,
        Measurement::RuntimeMinutes,
        Measurement::MaxAcPowerToday,
        Measurement::MaxSolarInputPower,
        Measurement::SuppliedEnergyTotal,
        Measurement::RuntimeHours,
    ];

    /// Unit symbol for the scaled value, as delivered to the telemetry sink.
    pub fn unit(&self) -> &'static str {
        match self {
            Measurement::SuppliedEnergyTotal => "kWh",
            Measurement::SuppliedEnergyToday => "Wh",
            Measurement::SolarVoltage | Measurement::AcVoltage | Measurement::GridVoltage => "V",
            Measurement::SolarCurrent | Measurement::AcCurrent => "A",
            Measurement::AcFrequency | Measurement::GridFrequency => "Hz",
            Measurement::AcPower
            | Measurement::MaxAcPowerToday
            | Measurement::MaxSolarInputPower => "W",
            Measurement::RuntimeHours => "h",
            Measurement::RuntimeMinutes => "min",
        }
    }

    /// Configuration/reporting name (kebab-case, matches the serde rename).
    pub fn name(&self) -> &'static str {
        match self {
            Measurement::SuppliedEnergyTotal => "supplied-energy-total",
            Measurement::SuppliedEnergyToday => "supplied-energy-today",
            Measurement::SolarVoltage => "solar-voltage",
            Measurement::SolarCurrent => "solar-current",
            Measurement::AcVoltage => "ac-voltage",
            Measurement::AcCurrent => "ac-current",
            Measurement::AcFrequency => "ac-frequency",
            Measurement::AcPower => "ac-power",
            Measurement::GridVoltage => "grid-voltage",
            Measurement::GridFrequency => "grid-frequency",
            Measurement::RuntimeHours => "runtime-hours",
            Measurement::RuntimeMinutes => "runtime-minutes",
            Measurement::MaxAcPowerToday => "max-ac-power-today",
            Measurement::MaxSolarInputPower => "max-solar-input-power",
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One-shot identification strings reported by an inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Identity {
    PartNumber,
    SerialNumber,
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::PartNumber => f.write_str("part-number"),
            Identity::SerialNumber => f.write_str("serial-number"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_are_kebab_case() {
        let yaml = serde_yaml::to_string(&Measurement::AcPower).unwrap();
        assert_eq!(yaml.trim(), "ac-power");
        let parsed: Measurement = serde_yaml::from_str("max-solar-input-power").unwrap();
        assert_eq!(parsed, Measurement::MaxSolarInputPower);
    }

    #[test]
    fn display_matches_serde_name() {
        for kind in Measurement::ALL {
            let yaml = serde_yaml::to_string(&kind).unwrap();
            assert_eq!(yaml.trim(), kind.name());
            assert_eq!(kind.to_string(), kind.name());
        }
    }

    #[test]
    fn all_kinds_have_units() {
        for kind in Measurement::ALL {
            assert!(!kind.unit().is_empty());
        }
    }
}
