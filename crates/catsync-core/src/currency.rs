use serde::{Deserialize, Serialize};

/// Currencies a rate plan can be priced in.
///
/// The variant order is the column order of the text export and the index
/// into every price vector, so it must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Aud,
    Brl,
    Mxn,
}

impl Currency {
    pub const COUNT: usize = 6;

    pub const ALL: [Currency; Self::COUNT] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Aud,
        Currency::Brl,
        Currency::Mxn,
    ];

    #[must_use]
    pub fn ordinal(self) -> usize {
        match self {
            Currency::Usd => 0,
            Currency::Eur => 1,
            Currency::Gbp => 2,
            Currency::Aud => 3,
            Currency::Brl => 4,
            Currency::Mxn => 5,
        }
    }

    /// ISO 4217 code, e.g. `"USD"`.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Aud => "AUD",
            Currency::Brl => "BRL",
            Currency::Mxn => "MXN",
        }
    }

    /// Case-insensitive lookup by ISO code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
