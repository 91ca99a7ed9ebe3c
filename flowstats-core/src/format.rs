//! Formatting helpers shared by reports and the CLI.

use serde::Deserialize;

/// Language used for month labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

impl Locale {
    /// Month name for `month` (1-12).
    pub fn month_name(&self, month: u32) -> Option<&'static str> {
        let names = match self {
            Locale::En => &MONTHS_EN,
            Locale::Es => &MONTHS_ES,
        };
        month
            .checked_sub(1)
            .and_then(|i| names.get(i as usize))
            .copied()
    }

    /// Label a `YYYY-MM` month key as "Month Year".
    ///
    /// Keys that don't parse are returned unchanged.
    pub fn month_label(&self, month_key: &str) -> String {
        let parsed = month_key.split_once('-').and_then(|(y, m)| {
            let year: i32 = y.parse().ok()?;
            let month: u32 = m.parse().ok()?;
            Some((year, self.month_name(month)?))
        });
        match parsed {
            Some((year, name)) => format!("{} {}", name, year),
            None => month_key.to_string(),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "en_us" | "en_gb" => Ok(Locale::En),
            "es" | "es_es" | "es_mx" => Ok(Locale::Es),
            _ => Err(format!("unsupported locale: {}", s)),
        }
    }
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Format an hour count for display (e.g. "1.5h").
pub fn format_hours(hours: f64) -> String {
    format!("{:.1}h", hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_label() {
        assert_eq!(Locale::En.month_label("2024-03"), "March 2024");
        assert_eq!(Locale::Es.month_label("2024-12"), "diciembre 2024");
        assert_eq!(Locale::En.month_label("2024-13"), "2024-13");
        assert_eq!(Locale::En.month_label("garbage"), "garbage");
        assert_eq!(Locale::En.month_name(0), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.4567, 2), 1.46);
        assert_eq!(round_to(1.46, 1), 1.5);
        assert_eq!(round_to(0.0, 1), 0.0);
        assert_eq!(format_hours(1.46), "1.5h");
    }

    #[test]
    fn test_parse_locale() {
        assert_eq!("ES".parse::<Locale>(), Ok(Locale::Es));
        assert!("fr".parse::<Locale>().is_err());
    }
}
