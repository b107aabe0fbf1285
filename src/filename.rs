use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static STRICT_TMYX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^IND_([A-Z]{2})_([^.]+)\.[0-9]+_TMYx\.zip$")
        .expect("strict TMYx filename pattern is valid")
});

/// Fields of an archive name of the exact form `IND_<cc>_<city>.<id>_TMYx.zip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedFilename {
    pub region_code: String,
    pub city_token: String,
}

impl ParsedFilename {
    pub fn parse(filename: &str) -> Option<Self> {
        let captures = STRICT_TMYX.captures(filename.trim())?;
        Some(Self {
            region_code: captures.get(1)?.as_str().to_string(),
            city_token: captures.get(2)?.as_str().to_string(),
        })
    }

    pub fn region_matches(&self, code: &str) -> bool {
        self.region_code.eq_ignore_ascii_case(code.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_station_archive() {
        let parsed = ParsedFilename::parse("IND_MH_Mumbai.430030_TMYx.zip").unwrap();
        assert_eq!(parsed.region_code, "MH");
        assert_eq!(parsed.city_token, "Mumbai");
        assert!(parsed.region_matches("mh"));
    }

    #[test]
    fn is_case_insensitive() {
        let parsed = ParsedFilename::parse("ind_dl_New-Delhi.432950_tmyx.ZIP").unwrap();
        assert_eq!(parsed.region_code, "dl");
        assert_eq!(parsed.city_token, "New-Delhi");
    }

    #[test]
    fn rejects_suffixed_and_foreign_names() {
        assert!(ParsedFilename::parse("IND_DL_NewDelhi.Intl.AP.432950_TMYx.zip").is_none());
        assert!(ParsedFilename::parse("IND_DL_NewDelhi.432950_TMYx.2007-2021.zip").is_none());
        assert!(ParsedFilename::parse("DEL_ND_NewDelhi.432950_TMYx.zip").is_none());
        assert!(ParsedFilename::parse("IND_MAH_Pune.430630_TMYx.zip").is_none());
        assert!(ParsedFilename::parse("IND_MH_Pune_TMYx.zip").is_none());
    }
}
