use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Answer given to a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationAnswer {
    Accept,
    Reject,
}

impl CancellationAnswer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationAnswer::Accept => "Aceptacion",
            CancellationAnswer::Reject => "Rechazo",
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, CancellationAnswer::Accept)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, CancellationAnswer::Reject)
    }
}

impl fmt::Display for CancellationAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationAnswer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Aceptacion" => Ok(CancellationAnswer::Accept),
            "Rechazo" => Ok(CancellationAnswer::Reject),
            other => Err(Error::UnknownAnswer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationAnswer;
    use crate::error::Error;

    #[test]
    fn maps_to_wire_strings() {
        assert_eq!(CancellationAnswer::Accept.as_str(), "Aceptacion");
        assert_eq!(CancellationAnswer::Reject.to_string(), "Rechazo");
        assert_eq!(
            "Rechazo".parse::<CancellationAnswer>().unwrap(),
            CancellationAnswer::Reject
        );
        assert!(CancellationAnswer::Accept.is_accept());
        assert!(!CancellationAnswer::Accept.is_reject());
    }

    #[test]
    fn parsing_is_strict() {
        for s in ["aceptacion", "Aceptación", " Rechazo", ""] {
            assert!(matches!(
                s.parse::<CancellationAnswer>(),
                Err(Error::UnknownAnswer(_))
            ));
        }
    }
}
