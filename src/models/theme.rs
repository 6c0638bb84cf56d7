// Theme models - light/dark color schemes
// The active theme is a plain value handed to whoever needs it (see AppState)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two supported color schemes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub fn theme(self) -> Theme {
        match self {
            ColorScheme::Light => LIGHT,
            ColorScheme::Dark => DARK,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ColorScheme::Light),
            "dark" => Ok(ColorScheme::Dark),
            other => Err(format!("Unknown color scheme: {}", other)),
        }
    }
}

/// Fixed-shape palette (Material 3 color roles)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub scheme: ColorScheme,
    pub primary: &'static str,
    pub on_primary: &'static str,
    pub primary_container: &'static str,
    pub secondary: &'static str,
    pub on_secondary: &'static str,
    pub background: &'static str,
    pub on_background: &'static str,
    pub surface: &'static str,
    pub on_surface: &'static str,
    pub surface_variant: &'static str,
    pub on_surface_variant: &'static str,
    pub outline: &'static str,
    pub error: &'static str,
    pub error_container: &'static str,
    pub on_error_container: &'static str,
    pub inverse_surface: &'static str,
    pub inverse_on_surface: &'static str,
    pub inverse_primary: &'static str,
    pub scrim: &'static str,
}

const LIGHT: Theme = Theme {
    scheme: ColorScheme::Light,
    primary: "#6750A4",
    on_primary: "#FFFFFF",
    primary_container: "#EADDFF",
    secondary: "#625B71",
    on_secondary: "#FFFFFF",
    background: "#FFFBFE",
    on_background: "#1C1B1F",
    surface: "#FFFBFE",
    on_surface: "#1C1B1F",
    surface_variant: "#E7E0EC",
    on_surface_variant: "#49454F",
    outline: "#79747E",
    error: "#B3261E",
    error_container: "#F9DEDC",
    on_error_container: "#410E0B",
    inverse_surface: "#313033",
    inverse_on_surface: "#F4EFF4",
    inverse_primary: "#D0BCFF",
    scrim: "#000000",
};

const DARK: Theme = Theme {
    scheme: ColorScheme::Dark,
    primary: "#D0BCFF",
    on_primary: "#381E72",
    primary_container: "#4F378B",
    secondary: "#CCC2DC",
    on_secondary: "#332D41",
    background: "#1C1B1F",
    on_background: "#E6E1E5",
    surface: "#1C1B1F",
    on_surface: "#E6E1E5",
    surface_variant: "#49454F",
    on_surface_variant: "#CAC4D0",
    outline: "#938F99",
    error: "#F2B8B5",
    error_container: "#8C1D18",
    on_error_container: "#F9DEDC",
    inverse_surface: "#E6E1E5",
    inverse_on_surface: "#313033",
    inverse_primary: "#6750A4",
    scrim: "#000000",
};
