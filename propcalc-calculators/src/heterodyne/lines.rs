//! Catalog of spectral lines commonly observed with the JCMT heterodyne
//! receivers.
//!
//! Species and their transitions are kept in declaration order, which is also
//! the order in which they are offered for selection.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("Unknown species '{0}'.")]
    UnknownSpecies(String),
    #[error("Unknown transition '{transition}' for species '{species}'.")]
    UnknownTransition { species: String, transition: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub name: &'static str,
    /// Rest frequency
    /// unit: GHz
    pub frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Species {
    pub name: &'static str,
    pub transitions: &'static [Transition],
}

const fn t(name: &'static str, frequency: f64) -> Transition {
    Transition { name, frequency }
}

pub static LINE_CATALOG: &[Species] = &[
    Species {
        name: "CO",
        transitions: &[t("2 - 1", 230.538_000), t("3 - 2", 345.795_990)],
    },
    Species {
        name: "13CO",
        transitions: &[t("2 - 1", 220.398_684), t("3 - 2", 330.587_965)],
    },
    Species {
        name: "C18O",
        transitions: &[t("2 - 1", 219.560_354), t("3 - 2", 329.330_552)],
    },
    Species {
        name: "HCN",
        transitions: &[t("3 - 2", 265.886_434), t("4 - 3", 354.505_477)],
    },
    Species {
        name: "HCO+",
        transitions: &[t("3 - 2", 267.557_626), t("4 - 3", 356.734_223)],
    },
    Species {
        name: "HNC",
        transitions: &[t("3 - 2", 271.981_142), t("4 - 3", 362.630_303)],
    },
    Species {
        name: "CS",
        transitions: &[t("5 - 4", 244.935_557), t("7 - 6", 342.882_850)],
    },
    Species {
        name: "SiO",
        transitions: &[t("5 - 4", 217.104_980), t("8 - 7", 347.330_581)],
    },
    Species {
        name: "CN",
        transitions: &[t("N=2-1, J=5/2-3/2", 226.874_781), t("N=3-2, J=7/2-5/2", 340.247_770)],
    },
    Species {
        name: "N2H+",
        transitions: &[t("3 - 2", 279.511_832)],
    },
    Species {
        name: "CI",
        transitions: &[t("3P1 - 3P0", 492.160_651)],
    },
];

pub fn species(name: &str) -> Result<&'static Species, LineError> {
    LINE_CATALOG
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| LineError::UnknownSpecies(name.to_string()))
}

/// Rest frequency in GHz of a transition.
pub fn rest_frequency(species_name: &str, transition: &str) -> Result<f64, LineError> {
    species(species_name)?
        .transitions
        .iter()
        .find(|t| t.name == transition)
        .map(|t| t.frequency)
        .ok_or_else(|| LineError::UnknownTransition {
            species: species_name.to_string(),
            transition: transition.to_string(),
        })
}

/// The catalog as a JSON object of species to transitions to frequency,
/// preserving catalog order.
pub fn catalog_json() -> serde_json::Result<String> {
    let catalog: IndexMap<&str, IndexMap<&str, f64>> = LINE_CATALOG
        .iter()
        .map(|s| {
            let transitions = s.transitions.iter().map(|t| (t.name, t.frequency)).collect();
            (s.name, transitions)
        })
        .collect();
    serde_json::to_string(&catalog)
}
