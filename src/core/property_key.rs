#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    Iterator,
}

impl std::fmt::Display for WellKnownSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WellKnownSymbol::Iterator => write!(f, "Symbol.iterator"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(String),
    Symbol(WellKnownSymbol),
}

impl PropertyKey {
    /// Array index encoded by this key, if it is a canonical numeric string.
    pub fn as_array_index(&self) -> Option<usize> {
        match self {
            PropertyKey::String(s) => {
                if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
                    return None;
                }
                s.parse::<usize>().ok()
            }
            PropertyKey::Symbol(_) => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(s)
    }
}

impl From<&String> for PropertyKey {
    fn from(s: &String) -> Self {
        PropertyKey::String(s.clone())
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::String(index.to_string())
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(sym: WellKnownSymbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Symbol(sym) => write!(f, "[{}]", sym),
        }
    }
}
