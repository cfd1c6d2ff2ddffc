use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Is,
    Contains,
    Matches,
    Regex,
}

impl MatchType {
    pub fn as_sieve(&self) -> &'static str {
        match self {
            Self::Is => ":is",
            Self::Contains => ":contains",
            Self::Matches => ":matches",
            Self::Regex => ":regex",
        }
    }

    pub fn from_sieve(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            ":is" => Some(Self::Is),
            ":contains" => Some(Self::Contains),
            ":matches" => Some(Self::Matches),
            ":regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sieve())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressPart {
    All,
    Localpart,
    Domain,
    User,
    Detail,
}

impl AddressPart {
    pub fn as_sieve(&self) -> &'static str {
        match self {
            Self::All => ":all",
            Self::Localpart => ":localpart",
            Self::Domain => ":domain",
            Self::User => ":user",
            Self::Detail => ":detail",
        }
    }

    pub fn from_sieve(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            ":all" => Some(Self::All),
            ":localpart" => Some(Self::Localpart),
            ":domain" => Some(Self::Domain),
            ":user" => Some(Self::User),
            ":detail" => Some(Self::Detail),
            _ => None,
        }
    }
}

impl fmt::Display for AddressPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sieve())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeRelation {
    Over,
    Under,
}

impl SizeRelation {
    pub fn as_sieve(&self) -> &'static str {
        match self {
            Self::Over => ":over",
            Self::Under => ":under",
        }
    }

    pub fn from_sieve(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            ":over" => Some(Self::Over),
            ":under" => Some(Self::Under),
            _ => None,
        }
    }
}

impl fmt::Display for SizeRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sieve())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOperator {
    AllOf,
    AnyOf,
}

impl LogicOperator {
    pub fn as_sieve(&self) -> &'static str {
        match self {
            Self::AllOf => "allof",
            Self::AnyOf => "anyof",
        }
    }
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sieve())
    }
}

/// The imap4flags actions (RFC 5232).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagOperation {
    Set,
    Add,
    Remove,
}

impl FlagOperation {
    pub fn as_sieve(&self) -> &'static str {
        match self {
            Self::Set => "setflag",
            Self::Add => "addflag",
            Self::Remove => "removeflag",
        }
    }
}

impl fmt::Display for FlagOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sieve())
    }
}
