//! Liability tags: `<person><IncomeTax|NI|CGT>`

use serde::{Deserialize, Serialize};

use super::tokens::{CGT, INCOME_TAX, NATIONAL_INSURANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxKind {
    IncomeTax,
    NationalInsurance,
    CapitalGains,
}

impl TaxKind {
    pub const ALL: [TaxKind; 3] = [
        TaxKind::IncomeTax,
        TaxKind::NationalInsurance,
        TaxKind::CapitalGains,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            TaxKind::IncomeTax => INCOME_TAX,
            TaxKind::NationalInsurance => NATIONAL_INSURANCE,
            TaxKind::CapitalGains => CGT,
        }
    }

    /// Name of the value-store subject holding this person's settled liability
    pub fn subject(self, person: &str) -> String {
        match self {
            TaxKind::IncomeTax => format!("{person} income tax"),
            TaxKind::NationalInsurance => format!("{person} NI"),
            TaxKind::CapitalGains => format!("{person} CGT"),
        }
    }
}

/// One person's liability for one kind of tax
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Liability {
    pub person: String,
    pub kind: TaxKind,
}

impl Liability {
    /// Parse a single liability word such as `JoeIncomeTax`
    pub fn parse(word: &str) -> Option<Liability> {
        TaxKind::ALL.iter().find_map(|&kind| {
            let person = word.strip_suffix(kind.suffix())?;
            (!person.is_empty()).then(|| Liability {
                person: person.to_string(),
                kind,
            })
        })
    }

    pub fn subject(&self) -> String {
        self.kind.subject(&self.person)
    }
}
