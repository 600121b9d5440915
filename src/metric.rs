use serde::{Deserialize, Serialize};
use std::fmt;

/// Header of the date column in every table the dashboard shows.
pub const DATE_LABEL: &str = "날짜";

/// The three cumulative counts reported by the upstream time series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    /// Stable key used in form fields, query strings and JSON.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// Column label of the cumulative count.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Confirmed => "확진자",
            Metric::Deaths => "사망자",
            Metric::Recovered => "회복자",
        }
    }

    /// Column label of the day-over-day delta.
    pub fn daily_label(self) -> &'static str {
        match self {
            Metric::Confirmed => "신규 확진자",
            Metric::Deaths => "신규 사망자",
            Metric::Recovered => "신규 회복자",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_key() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key("active"), None);
    }

    #[test]
    fn deserializes_from_lowercase_key() {
        let metric: Metric = serde_json::from_str("\"recovered\"").unwrap();
        assert_eq!(metric, Metric::Recovered);
        assert_eq!(metric.daily_label(), "신규 회복자");
    }
}
