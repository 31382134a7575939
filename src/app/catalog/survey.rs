//! Per-survey portal parameters
//!
//! Each survey on the INEI portal is selected by a form name and a period
//! code. These values travel as an explicit `SurveyConfig` into the catalog
//! provider rather than living in process-wide state.

use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Portal parameters of one survey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Short identifier used for directories ("enaho")
    pub id: String,
    /// `_cmbEncuesta` form value, already percent-encoded as the portal expects
    pub form_name: String,
    /// `_cmbTrimestre` value used when no period is requested
    pub default_period: String,
    /// First year the portal lists for this survey
    pub first_year: u16,
}

const BUILTIN_IDS: [&str; 3] = ["enaho", "endes", "enapres"];

impl SurveyConfig {
    /// Parameters of a survey known to the portal
    pub fn builtin(id: &str) -> Option<Self> {
        let (form_name, default_period, first_year) = match id {
            "enaho" => ("Condiciones%20de%20Vida%20y%20Pobreza%20-%20ENAHO", "55", 2004),
            "endes" => (
                "Encuesta%20Demogr%E1fica%20y%20de%20Salud%20Familiar%20-%20ENDES",
                "5",
                2004,
            ),
            "enapres" => (
                "Encuesta%20Nacional%20de%20Programas%20Presupuestales%20-%20ENAPRES",
                "18",
                2010,
            ),
            _ => return None,
        };

        Some(Self {
            id: id.to_string(),
            form_name: form_name.to_string(),
            default_period: default_period.to_string(),
            first_year,
        })
    }

    /// Identifiers accepted by [`SurveyConfig::builtin`]
    pub fn builtin_ids() -> &'static [&'static str] {
        &BUILTIN_IDS
    }

    /// Whether the portal can have a complete listing for `year`
    ///
    /// Years before the survey started and the running year (whose data
    /// is not yet released) are out of range.
    pub fn supports_year(&self, year: u16, current_year: u16) -> bool {
        year >= self.first_year && year < current_year
    }

    /// Body of the period-selection form post
    pub fn period_form_body(&self, year: u16, period: Option<&str>) -> String {
        format!(
            "bandera=1&_cmbEncuesta={}&_cmbAnno={}&_cmbTrimestre={}",
            self.form_name,
            year,
            period.unwrap_or(&self.default_period)
        )
    }
}

impl FromStr for SurveyConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        Self::builtin(&id).ok_or_else(|| ConfigError::UnknownSurvey {
            survey: s.to_string(),
            supported: BUILTIN_IDS.join(", "),
        })
    }
}

/// Calendar year of the local clock
pub fn current_year() -> u16 {
    u16::try_from(chrono::Local::now().year()).unwrap_or(u16::MAX)
}
