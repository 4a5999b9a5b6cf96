//! Display metadata for the currencies the screens know about

use crate::core::currency::CurrencyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub summary: &'static str,
}

const CATALOG: &[CurrencyInfo] = &[
    CurrencyInfo {
        code: "BRL",
        name: "Brazilian Real",
        symbol: "R$",
        summary: "Currency of Brazil, issued by the Central Bank of Brazil.",
    },
    CurrencyInfo {
        code: "USD",
        name: "US Dollar",
        symbol: "US$",
        summary: "Currency of the United States and the main global reserve currency.",
    },
    CurrencyInfo {
        code: "EUR",
        name: "Euro",
        symbol: "€",
        summary: "Currency of the euro area, used by 20 of the 27 European Union members.",
    },
    CurrencyInfo {
        code: "JPY",
        name: "Japanese Yen",
        symbol: "¥",
        summary: "Currency of Japan, one of the most traded currencies in the world.",
    },
    CurrencyInfo {
        code: "GBP",
        name: "Pound Sterling",
        symbol: "£",
        summary: "Currency of the United Kingdom and the oldest still in circulation.",
    },
    CurrencyInfo {
        code: "ARS",
        name: "Argentine Peso",
        symbol: "AR$",
        summary: "Currency of Argentina.",
    },
    CurrencyInfo {
        code: "CAD",
        name: "Canadian Dollar",
        symbol: "C$",
        summary: "Currency of Canada, closely tied to commodity prices.",
    },
    CurrencyInfo {
        code: "AUD",
        name: "Australian Dollar",
        symbol: "A$",
        summary: "Currency of Australia and several Pacific island states.",
    },
    CurrencyInfo {
        code: "CHF",
        name: "Swiss Franc",
        symbol: "CHF",
        summary: "Currency of Switzerland and Liechtenstein, regarded as a safe haven.",
    },
    CurrencyInfo {
        code: "CNY",
        name: "Chinese Yuan",
        symbol: "¥",
        summary: "Currency of China, the second largest economy in the world.",
    },
    CurrencyInfo {
        code: "PYG",
        name: "Paraguayan Guarani",
        symbol: "₲",
        summary: "Currency of Paraguay.",
    },
    CurrencyInfo {
        code: "CLP",
        name: "Chilean Peso",
        symbol: "CLP$",
        summary: "Currency of Chile.",
    },
    CurrencyInfo {
        code: "COP",
        name: "Colombian Peso",
        symbol: "COL$",
        summary: "Currency of Colombia.",
    },
];

pub fn describe(code: &CurrencyCode) -> Option<&'static CurrencyInfo> {
    CATALOG.iter().find(|info| info.code == code.as_str())
}

/// Display name, falling back to the code itself.
pub fn display_name(code: &CurrencyCode) -> String {
    describe(code).map_or_else(|| code.to_string(), |info| info.name.to_string())
}

pub fn symbol(code: &CurrencyCode) -> String {
    describe(code).map_or_else(|| code.to_string(), |info| info.symbol.to_string())
}
