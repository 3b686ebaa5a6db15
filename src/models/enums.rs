use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(VisitStatus {
    Draft => "draft",
    AwaitingResults => "awaiting_results",
    Completed => "completed",
});

str_enum!(ReportStatus {
    Draft => "draft",
    Finalized => "finalized",
});

str_enum!(ResultFlag {
    Normal => "normal",
    High => "high",
    Low => "low",
});

impl VisitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn visit_status_round_trips_through_storage_text() {
        for status in [VisitStatus::Draft, VisitStatus::AwaitingResults, VisitStatus::Completed] {
            assert_eq!(VisitStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = ReportStatus::from_str("archived").unwrap_err();
        match err {
            DatabaseError::InvalidEnum { field, value } => {
                assert_eq!(field, "ReportStatus");
                assert_eq!(value, "archived");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_completed_visits_are_terminal() {
        assert!(!VisitStatus::Draft.is_terminal());
        assert!(VisitStatus::Completed.is_terminal());
        assert!(!VisitStatus::AwaitingResults.is_terminal());
    }

    #[test]
    fn flag_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ResultFlag::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::to_string(&VisitStatus::AwaitingResults).unwrap(),
            "\"awaiting_results\""
        );
    }
}
