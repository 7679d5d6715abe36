use crate::models::Instrument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All instruments that share one underlying company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyGroup {
    pub base_symbol: String,
    pub name: String,
    pub symbols: Vec<Instrument>,
}

impl CompanyGroup {
    pub fn has_segment(&self, segment: &str) -> bool {
        self.symbols.iter().any(|s| s.segment == segment)
    }
}

/// Corporate action types recorded in an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorporateAction {
    Bonus,
    Split,
    Dividend,
    Rights,
    Merger,
    Demerger,
    Buyback,
    /// Free-form label for anything else
    Other(String),
}

impl CorporateAction {
    /// Parse from string (case-insensitive); unknown labels become `Other`
    pub fn from_str(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Please select a Corporate Action type before exporting".to_string());
        }

        let action = match trimmed.to_lowercase().replace(['_', '-'], " ").as_str() {
            "bonus" | "bonus issue" => CorporateAction::Bonus,
            "split" | "stock split" => CorporateAction::Split,
            "dividend" => CorporateAction::Dividend,
            "rights" | "rights issue" => CorporateAction::Rights,
            "merger" => CorporateAction::Merger,
            "demerger" => CorporateAction::Demerger,
            "buyback" | "buy back" => CorporateAction::Buyback,
            _ => CorporateAction::Other(trimmed.to_string()),
        };
        Ok(action)
    }

    pub fn label(&self) -> &str {
        match self {
            CorporateAction::Bonus => "Bonus",
            CorporateAction::Split => "Stock Split",
            CorporateAction::Dividend => "Dividend",
            CorporateAction::Rights => "Rights Issue",
            CorporateAction::Merger => "Merger",
            CorporateAction::Demerger => "Demerger",
            CorporateAction::Buyback => "Buyback",
            CorporateAction::Other(label) => label,
        }
    }
}

impl fmt::Display for CorporateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
